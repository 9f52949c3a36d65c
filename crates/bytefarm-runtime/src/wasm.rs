//! WASM program backend.
//!
//! A module exports `run: () -> ()` and imports whatever it needs from the
//! `"farm"` namespace. Blocking imports enqueue one operation and return once
//! it has been applied; when the runtime stops, the pending import traps and
//! the module unwinds.
//!
//! # Host Functions (registered under `"farm"`)
//!
//! ## Actions
//! - `move(direction: i32)`: `0..=3` is east, west, north, south
//! - `collect()`, `till()`
//! - `plant(entity: i32)`: `0..=3` is grass, stone, bush, tree
//!
//! Out-of-range codes are still enqueued, as malformed operations.
//!
//! ## Queries
//! - `measure() -> i64`, `can_collect() -> i32`, `ground() -> i32`
//! - `position_x() -> i32`, `position_y() -> i32`
//! - `map_width() -> i32`, `map_height() -> i32`
//! - `nearby_count() -> i32` snapshots the nearby list, then
//!   `nearby_x(i)`, `nearby_y(i)`, `nearby_amount(i)` read from it
//! - `purchasable_count() -> i32` snapshots the purchasable ids, then
//!   `purchasable_id(i, ptr, cap) -> i32` copies id `i` into memory and
//!   returns its byte length (`-1` if out of range or too long)
//!
//! ## Mutators
//! - `upgrade(ptr, len) -> i32`
//! - `print(ptr, len)`

use std::path::Path;
use std::sync::Arc;

use bytefarm_world::kinds::{Direction, EntityKind};
use bytefarm_world::map::NearbyTile;
use wasmtime::{Caller, Engine, ExternType, Linker, Module, Store};

use crate::namespace::{ActionNamespace, FarmApi};
use crate::operation::{ActionKind, Operation};
use crate::program::{program_name, UserProgram};
use crate::script::SharedApi;
use crate::{ActionError, LoadError};

/// Import namespace for every host function.
pub const NAMESPACE: &str = "farm";

/// Required export.
pub const ENTRY: &str = "run";

const HOST_FUNCTIONS: [&str; 20] = [
    "move",
    "collect",
    "till",
    "plant",
    "measure",
    "can_collect",
    "ground",
    "position_x",
    "position_y",
    "map_width",
    "map_height",
    "nearby_count",
    "nearby_x",
    "nearby_y",
    "nearby_amount",
    "purchasable_count",
    "purchasable_id",
    "upgrade",
    "print",
    "log",
];

/// How a WASM `run` ended abnormally.
#[derive(Debug, thiserror::Error)]
pub enum WasmRunError {
    /// A blocking import was cancelled by `stop`.
    #[error("program stopped")]
    Stopped,

    /// The fuel budget was exhausted.
    #[error("out of fuel (budget: {budget})")]
    OutOfFuel { budget: u64 },

    /// A WASM trap such as `unreachable` or an out-of-bounds access.
    #[error("trap: {0}")]
    Trap(String),

    /// Instantiation or host-side failure.
    #[error("{0}")]
    Runtime(String),
}

// ---------------------------------------------------------------------------
// ProgramState
// ---------------------------------------------------------------------------

/// Data held in the Wasmtime [`Store`] while `run` executes.
pub struct ProgramState {
    api: SharedApi,
    nearby: Vec<NearbyTile>,
    purchasable: Vec<String>,
    /// Host function calls made during this run.
    pub host_calls: u64,
}

impl ProgramState {
    fn new(api: SharedApi) -> Self {
        Self {
            api,
            nearby: Vec::new(),
            purchasable: Vec::new(),
            host_calls: 0,
        }
    }

    fn submit(&mut self, operation: Operation) -> anyhow::Result<()> {
        self.host_calls += 1;
        self.api.submit(operation)?;
        Ok(())
    }

    fn query(&mut self) -> &dyn FarmApi {
        self.host_calls += 1;
        &*self.api
    }

    fn nearby(&self, index: i32) -> Option<&NearbyTile> {
        usize::try_from(index).ok().and_then(|i| self.nearby.get(i))
    }
}

impl std::fmt::Debug for ProgramState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramState")
            .field("host_calls", &self.host_calls)
            .field("nearby", &self.nearby.len())
            .field("purchasable", &self.purchasable.len())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// WasmProgram
// ---------------------------------------------------------------------------

/// A compiled WASM module with a verified `run` export.
pub struct WasmProgram {
    name: String,
    engine: Engine,
    module: Module,
    fuel: Option<u64>,
}

impl WasmProgram {
    /// Load a `.wasm` binary or `.wat` text file.
    pub fn from_file(path: &Path, fuel: Option<u64>) -> Result<Self, LoadError> {
        let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(program_name(path), &bytes, fuel)
    }

    /// Compile and validate a module. `bytes` may be binary or WAT text.
    pub fn from_bytes(
        name: impl Into<String>,
        bytes: &[u8],
        fuel: Option<u64>,
    ) -> Result<Self, LoadError> {
        let name = name.into();
        let compile_error = |message: String| LoadError::Compile {
            program: name.clone(),
            message,
        };

        let mut config = wasmtime::Config::new();
        config.consume_fuel(fuel.is_some());
        let engine = Engine::new(&config)
            .map_err(|e| compile_error(format!("failed to create Wasmtime engine: {e}")))?;
        let module = Module::new(&engine, bytes).map_err(|e| compile_error(format!("{e}")))?;

        let has_entry = module.exports().any(|export| {
            export.name() == ENTRY
                && matches!(export.ty(), ExternType::Func(f) if f.params().len() == 0)
        });
        if !has_entry {
            return Err(LoadError::MissingEntry {
                program: name,
                entry: ENTRY,
            });
        }

        // Reject unknown imports here rather than at instantiation.
        for import in module.imports() {
            if import.module() != NAMESPACE || !HOST_FUNCTIONS.contains(&import.name()) {
                return Err(compile_error(format!(
                    "unknown import {}.{}",
                    import.module(),
                    import.name()
                )));
            }
        }

        tracing::debug!(program = %name, fuel = ?fuel, "WASM program compiled");
        Ok(Self {
            name,
            engine,
            module,
            fuel,
        })
    }

    pub fn fuel(&self) -> Option<u64> {
        self.fuel
    }

    /// Instantiate and call `run` against `api`. Returns the number of host
    /// calls made.
    pub fn execute(&self, api: SharedApi) -> Result<u64, WasmRunError> {
        let mut store = Store::new(&self.engine, ProgramState::new(api));
        if let Some(fuel) = self.fuel {
            store
                .set_fuel(fuel)
                .map_err(|e| WasmRunError::Runtime(format!("failed to set fuel: {e}")))?;
        }

        let mut linker = Linker::new(&self.engine);
        register_farm_api(&mut linker)
            .map_err(|e| WasmRunError::Runtime(format!("failed to register host API: {e}")))?;
        let instance = linker
            .instantiate(&mut store, &self.module)
            .map_err(|e| self.classify_trap(e))?;
        let run = instance
            .get_typed_func::<(), ()>(&mut store, ENTRY)
            .map_err(|e| WasmRunError::Runtime(format!("failed to resolve {ENTRY}(): {e}")))?;

        run.call(&mut store, ()).map_err(|e| self.classify_trap(e))?;

        let host_calls = store.data().host_calls;
        tracing::trace!(program = %self.name, host_calls, "run() completed");
        Ok(host_calls)
    }

    fn classify_trap(&self, error: anyhow::Error) -> WasmRunError {
        if error.downcast_ref::<ActionError>().is_some() {
            return WasmRunError::Stopped;
        }
        for cause in error.chain() {
            if cause.downcast_ref::<ActionError>().is_some() {
                return WasmRunError::Stopped;
            }
            if let Some(trap) = cause.downcast_ref::<wasmtime::Trap>() {
                if *trap == wasmtime::Trap::OutOfFuel {
                    return WasmRunError::OutOfFuel {
                        budget: self.fuel.unwrap_or(0),
                    };
                }
                return WasmRunError::Trap(format!("{error}"));
            }
        }
        WasmRunError::Runtime(format!("{error:#}"))
    }
}

impl UserProgram for WasmProgram {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(self: Box<Self>, api: Arc<ActionNamespace>) -> anyhow::Result<()> {
        self.execute(api)?;
        Ok(())
    }
}

impl std::fmt::Debug for WasmProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmProgram")
            .field("name", &self.name)
            .field("fuel", &self.fuel)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Host function registration
// ---------------------------------------------------------------------------

/// Register every host function under [`NAMESPACE`].
pub fn register_farm_api(linker: &mut Linker<ProgramState>) -> anyhow::Result<()> {
    // -- Actions --------------------------------------------------------------

    linker.func_wrap(NAMESPACE, "move", host_move)?;
    linker.func_wrap(NAMESPACE, "collect", |mut caller: Caller<'_, ProgramState>| {
        caller.data_mut().submit(Operation::Collect)
    })?;
    linker.func_wrap(NAMESPACE, "till", |mut caller: Caller<'_, ProgramState>| {
        caller.data_mut().submit(Operation::Till)
    })?;
    linker.func_wrap(NAMESPACE, "plant", host_plant)?;

    // -- Queries --------------------------------------------------------------

    linker.func_wrap(NAMESPACE, "measure", |mut caller: Caller<'_, ProgramState>| {
        caller.data_mut().query().measure()
    })?;
    linker.func_wrap(NAMESPACE, "can_collect", |mut caller: Caller<'_, ProgramState>| {
        i32::from(caller.data_mut().query().can_collect())
    })?;
    linker.func_wrap(NAMESPACE, "ground", |mut caller: Caller<'_, ProgramState>| {
        caller.data_mut().query().get_ground().code()
    })?;
    linker.func_wrap(NAMESPACE, "position_x", |mut caller: Caller<'_, ProgramState>| {
        caller.data_mut().query().get_position().0
    })?;
    linker.func_wrap(NAMESPACE, "position_y", |mut caller: Caller<'_, ProgramState>| {
        caller.data_mut().query().get_position().1
    })?;
    linker.func_wrap(NAMESPACE, "map_width", |mut caller: Caller<'_, ProgramState>| {
        caller.data_mut().query().get_map_size().0
    })?;
    linker.func_wrap(NAMESPACE, "map_height", |mut caller: Caller<'_, ProgramState>| {
        caller.data_mut().query().get_map_size().1
    })?;
    linker.func_wrap(NAMESPACE, "nearby_count", |mut caller: Caller<'_, ProgramState>| {
        let state = caller.data_mut();
        state.nearby = state.query().get_nearby();
        state.nearby.len() as i32
    })?;
    linker.func_wrap(
        NAMESPACE,
        "nearby_x",
        |caller: Caller<'_, ProgramState>, index: i32| caller.data().nearby(index).map_or(-1, |t| t.x),
    )?;
    linker.func_wrap(
        NAMESPACE,
        "nearby_y",
        |caller: Caller<'_, ProgramState>, index: i32| caller.data().nearby(index).map_or(-1, |t| t.y),
    )?;
    linker.func_wrap(
        NAMESPACE,
        "nearby_amount",
        |caller: Caller<'_, ProgramState>, index: i32| {
            caller
                .data()
                .nearby(index)
                .map_or(0, |t| t.amount as i32)
        },
    )?;
    linker.func_wrap(
        NAMESPACE,
        "purchasable_count",
        |mut caller: Caller<'_, ProgramState>| {
            let state = caller.data_mut();
            state.purchasable = state.query().get_purchasable();
            state.purchasable.len() as i32
        },
    )?;
    linker.func_wrap(NAMESPACE, "purchasable_id", host_purchasable_id)?;

    // -- Mutators -------------------------------------------------------------

    linker.func_wrap(NAMESPACE, "upgrade", host_upgrade)?;
    linker.func_wrap(NAMESPACE, "print", host_print)?;
    linker.func_wrap(NAMESPACE, "log", host_print)?;

    Ok(())
}

fn host_move(mut caller: Caller<'_, ProgramState>, code: i32) -> anyhow::Result<()> {
    let operation = match Direction::from_code(code) {
        Some(direction) => Operation::Move { direction },
        None => Operation::Malformed {
            action: ActionKind::Move,
            argument: code.to_string(),
        },
    };
    caller.data_mut().submit(operation)
}

fn host_plant(mut caller: Caller<'_, ProgramState>, code: i32) -> anyhow::Result<()> {
    let operation = match EntityKind::from_code(code) {
        Some(entity) => Operation::Plant { entity },
        None => Operation::Malformed {
            action: ActionKind::Plant,
            argument: code.to_string(),
        },
    };
    caller.data_mut().submit(operation)
}

fn host_upgrade(mut caller: Caller<'_, ProgramState>, ptr: i32, len: i32) -> anyhow::Result<i32> {
    let node_id = read_wasm_string(&mut caller, ptr, len).map_err(anyhow::Error::msg)?;
    Ok(i32::from(caller.data_mut().query().upgrade(&node_id)))
}

fn host_print(mut caller: Caller<'_, ProgramState>, ptr: i32, len: i32) {
    match read_wasm_string(&mut caller, ptr, len) {
        Ok(text) => caller.data_mut().query().print(&text),
        Err(e) => tracing::warn!(error = %e, "print: failed to read text from WASM memory"),
    }
}

fn host_purchasable_id(
    mut caller: Caller<'_, ProgramState>,
    index: i32,
    ptr: i32,
    cap: i32,
) -> anyhow::Result<i32> {
    caller.data_mut().host_calls += 1;
    let Some(id) = usize::try_from(index)
        .ok()
        .and_then(|i| caller.data().purchasable.get(i).cloned())
    else {
        return Ok(-1);
    };
    if id.len() > cap.max(0) as usize {
        return Ok(-1);
    }
    let memory = caller
        .get_export("memory")
        .and_then(|e| e.into_memory())
        .ok_or_else(|| anyhow::anyhow!("module must export 'memory' to use purchasable_id"))?;
    memory.write(&mut caller, ptr as u32 as usize, id.as_bytes())?;
    Ok(id.len() as i32)
}

fn read_wasm_string(
    caller: &mut Caller<'_, ProgramState>,
    ptr: i32,
    len: i32,
) -> Result<String, String> {
    let memory = caller
        .get_export("memory")
        .and_then(|e| e.into_memory())
        .ok_or_else(|| {
            "module must export 'memory' to pass strings -- \
             add `(memory (export \"memory\") 1)`"
                .to_owned()
        })?;

    let data = memory.data(&*caller);
    let start = ptr as u32 as usize;
    let end = start + len.max(0) as usize;
    if end > data.len() {
        return Err(format!(
            "string read out of bounds: ptr={ptr}, len={len}, memory_size={}",
            data.len()
        ));
    }

    String::from_utf8(data[start..end].to_vec())
        .map_err(|e| format!("string at ptr={ptr} len={len} is not valid UTF-8: {e}"))
}
