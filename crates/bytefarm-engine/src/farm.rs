//! `FarmEngine`: one farm, one program runtime, one scheduler.
//!
//! The engine binds the runtime's host callbacks to its own state before
//! every start, so queries made by the program thread read the live farm:
//!
//! - `measure`, `get_position`, `get_nearby`, `get_map_size`, `get_ground`
//!   and `get_purchasable` take a read lock on the state;
//! - `upgrade` takes the write lock for the duration of the purchase;
//! - the scheduler takes the write lock only while dequeuing or applying.
//!
//! The tick counter is shared with the callbacks as an atomic so `measure`
//! sees maturity at the current tick.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytefarm_runtime::{
    HostBindings, LoadOptions, OutputBuffer, ProgramRuntime, ProgramSource, RuntimeError,
    UserProgram,
};
use bytefarm_world::state::FarmState;

use crate::config::EngineConfig;
use crate::mutators::OperationRecord;
use crate::scheduler::{PendingOperation, TickScheduler};
use crate::EngineError;

/// Line written to the output buffer when a program starts.
pub const PROGRAM_STARTED: &str = ">>> program started";

pub struct FarmEngine {
    config: EngineConfig,
    state: Arc<RwLock<FarmState>>,
    tick: Arc<AtomicU64>,
    output: Arc<OutputBuffer>,
    runtime: ProgramRuntime,
    scheduler: TickScheduler,
}

impl FarmEngine {
    /// A fresh farm of `config.initial_map_size`.
    pub fn new(config: EngineConfig) -> Self {
        let state = FarmState::new(config.initial_map_size);
        Self::with_state(config, state)
    }

    /// An engine over an existing farm, starting at tick 0.
    pub fn with_state(config: EngineConfig, state: FarmState) -> Self {
        let state = Arc::new(RwLock::new(state));
        let tick = Arc::new(AtomicU64::new(0));
        let output = Arc::new(OutputBuffer::with_capacity(config.output_capacity));
        let bindings = bind_callbacks(&state, &tick, &output, config.nearby_radius);
        Self {
            scheduler: TickScheduler::new(config.durations),
            runtime: ProgramRuntime::with_bindings(bindings),
            config,
            state,
            tick,
            output,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn output(&self) -> &Arc<OutputBuffer> {
        &self.output
    }

    /// Read access to the farm. Do not hold across [`advance`](Self::advance).
    pub fn state(&self) -> RwLockReadGuard<'_, FarmState> {
        read(&self.state)
    }

    /// Write access to the farm, for host-side edits between frames.
    pub fn state_mut(&self) -> RwLockWriteGuard<'_, FarmState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn tick_count(&self) -> u64 {
        self.tick.load(Ordering::SeqCst)
    }

    pub fn pending(&self) -> Option<&PendingOperation> {
        self.scheduler.pending()
    }

    pub fn is_running(&self) -> bool {
        self.runtime.is_running()
    }

    /// Whether the last program's thread has exited.
    pub fn program_finished(&self) -> bool {
        self.runtime.thread_finished()
    }

    /// Stop any running program and start `program`.
    pub fn start_program<P: UserProgram>(&mut self, program: P) -> Result<(), EngineError> {
        self.stop_program();
        self.output.append_line(PROGRAM_STARTED);
        self.runtime.start(program)?;
        tracing::debug!(tick = self.tick_count(), "program started");
        Ok(())
    }

    /// Load a program from disk and start it.
    ///
    /// A load failure is written to the output buffer as well as returned;
    /// no thread is started.
    pub fn load_and_start(&mut self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        let options = LoadOptions {
            wasm_fuel: self.config.wasm_fuel,
        };
        match ProgramSource::load_with(path, &options) {
            Ok(program) => self.start_program(program),
            Err(e) => {
                tracing::warn!(error = %e, "program failed to load");
                self.output.append_line("");
                self.output.write(&format!("{e}\n"));
                Err(RuntimeError::from(e).into())
            }
        }
    }

    /// Stop the program and discard its in-flight operation. Idempotent.
    ///
    /// Effects already committed at issue (a started plant) stay.
    pub fn stop_program(&mut self) {
        self.scheduler.clear();
        self.runtime.stop();
    }

    /// One frame: advance the tick counter by `dt_ms`, then run one
    /// scheduler step.
    pub fn advance(&mut self, dt_ms: u64) -> Option<OperationRecord> {
        let tick = self.tick.fetch_add(dt_ms, Ordering::SeqCst) + dt_ms;
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        self.scheduler.step(&self.runtime, &mut state, tick)
    }

    /// Run fixed frames of `frame_ms` until `total_ms` simulated ticks have
    /// passed, collecting every applied operation.
    pub fn run_for(&mut self, total_ms: u64, frame_ms: u64) -> Vec<OperationRecord> {
        let frame_ms = frame_ms.max(1);
        let end = self.tick_count().saturating_add(total_ms);
        let mut records = Vec::new();
        while self.tick_count() < end {
            let step = frame_ms.min(end - self.tick_count());
            records.extend(self.advance(step));
        }
        records
    }

    /// Replace the farm and tick counter. Stops any running program first.
    pub(crate) fn reset_to(&mut self, state: FarmState, tick: u64) {
        self.stop_program();
        *self.state_mut() = state;
        self.tick.store(tick, Ordering::SeqCst);
    }
}

impl Drop for FarmEngine {
    fn drop(&mut self) {
        self.stop_program();
    }
}

impl std::fmt::Debug for FarmEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FarmEngine")
            .field("tick", &self.tick_count())
            .field("running", &self.is_running())
            .field("pending", &self.pending())
            .field("runtime", &self.runtime)
            .finish_non_exhaustive()
    }
}

fn bind_callbacks(
    state: &Arc<RwLock<FarmState>>,
    tick: &Arc<AtomicU64>,
    output: &Arc<OutputBuffer>,
    nearby_radius: i32,
) -> HostBindings {
    let mut bindings = HostBindings::new();
    let (s, t) = (Arc::clone(state), Arc::clone(tick));
    bindings.set_measure_fn(move || i64::from(read(&s).measure(t.load(Ordering::SeqCst))));
    let s = Arc::clone(state);
    bindings.set_position_fn(move || read(&s).avatar.position());
    let (s, t) = (Arc::clone(state), Arc::clone(tick));
    bindings.set_nearby_fn(move || read(&s).nearby(nearby_radius, t.load(Ordering::SeqCst)));
    let s = Arc::clone(state);
    bindings.set_map_size_fn(move || read(&s).map.size());
    let s = Arc::clone(state);
    bindings.set_ground_fn(move || read(&s).ground());
    let s = Arc::clone(state);
    bindings.set_purchasable_fn(move || read(&s).purchasable());

    let writable = Arc::clone(state);
    bindings.set_upgrade_fn(move |id| {
        let mut state = writable.write().unwrap_or_else(PoisonError::into_inner);
        match state.purchase_upgrade(id) {
            Ok(()) => {
                tracing::debug!(node = id, "upgrade purchased");
                true
            }
            Err(e) => {
                tracing::debug!(node = id, error = %e, "upgrade refused");
                false
            }
        }
    });
    bindings.set_output_buffer(Arc::clone(output));
    bindings
}

fn read(state: &RwLock<FarmState>) -> RwLockReadGuard<'_, FarmState> {
    state.read().unwrap_or_else(PoisonError::into_inner)
}
