//! The action surface user programs call into.
//!
//! [`FarmApi`] is the typed interface; [`ActionNamespace`] is the one
//! implementation, built by the runtime for each run from its channel,
//! completion signal, running flag, and host bindings. Backends expose it
//! to user code: native programs get `&dyn FarmApi` directly, Rhai and WASM
//! wrap it in registered functions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use bytefarm_world::kinds::{Direction, EntityKind, Ground};
use bytefarm_world::map::NearbyTile;

use crate::bindings::{HostBindings, DEFAULT_MAP_SIZE};
use crate::channel::CompletionSignal;
use crate::operation::Operation;
use crate::ActionError;

/// Everything a user program can do.
///
/// Blocking actions enqueue exactly one [`Operation`] and return once the
/// simulation has applied it. Queries and `upgrade` answer immediately.
pub trait FarmApi {
    fn move_to(&self, direction: Direction) -> Result<(), ActionError> {
        self.submit(Operation::Move { direction })
    }

    fn collect(&self) -> Result<(), ActionError> {
        self.submit(Operation::Collect)
    }

    fn till(&self) -> Result<(), ActionError> {
        self.submit(Operation::Till)
    }

    fn plant(&self, entity: EntityKind) -> Result<(), ActionError> {
        self.submit(Operation::Plant { entity })
    }

    /// Enqueue an already-built operation and wait for it.
    fn submit(&self, operation: Operation) -> Result<(), ActionError>;

    fn measure(&self) -> i64;

    fn can_collect(&self) -> bool {
        self.measure() > 0
    }

    fn get_position(&self) -> (i32, i32);

    fn get_nearby(&self) -> Vec<NearbyTile>;

    fn get_map_size(&self) -> (i32, i32);

    fn get_ground(&self) -> Ground;

    fn get_purchasable(&self) -> Vec<String>;

    /// Try to buy an upgrade node. `false` if unbound or not purchasable.
    fn upgrade(&self, node_id: &str) -> bool;

    /// Emit one line of program output.
    fn print(&self, text: &str);
}

// ---------------------------------------------------------------------------
// ActionNamespace
// ---------------------------------------------------------------------------

/// The per-run [`FarmApi`] implementation.
#[derive(Debug)]
pub struct ActionNamespace {
    ops: Sender<Operation>,
    signal: Arc<CompletionSignal>,
    running: Arc<AtomicBool>,
    bindings: HostBindings,
    /// Only output produced on this thread reaches the output buffer.
    owner: ThreadId,
}

impl ActionNamespace {
    pub fn new(
        ops: Sender<Operation>,
        signal: Arc<CompletionSignal>,
        running: Arc<AtomicBool>,
        bindings: HostBindings,
        owner: ThreadId,
    ) -> Self {
        Self {
            ops,
            signal,
            running,
            bindings,
            owner,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl FarmApi for ActionNamespace {
    fn submit(&self, operation: Operation) -> Result<(), ActionError> {
        if operation.is_stop() {
            // Reserved for shutdown; the scheduler never signals it.
            return Ok(());
        }
        if !self.is_running() {
            return Err(ActionError::Stopped);
        }
        tracing::trace!(op = %operation, "operation issued");
        self.ops.send(operation).map_err(|_| ActionError::Stopped)?;
        self.signal.wait()
    }

    fn measure(&self) -> i64 {
        self.bindings.measure.as_ref().map_or(0, |f| f())
    }

    fn get_position(&self) -> (i32, i32) {
        self.bindings.position.as_ref().map_or((0, 0), |f| f())
    }

    fn get_nearby(&self) -> Vec<NearbyTile> {
        self.bindings.nearby.as_ref().map_or_else(Vec::new, |f| f())
    }

    fn get_map_size(&self) -> (i32, i32) {
        self.bindings
            .map_size
            .as_ref()
            .map_or(DEFAULT_MAP_SIZE, |f| f())
    }

    fn get_ground(&self) -> Ground {
        self.bindings
            .ground
            .as_ref()
            .map_or(Ground::Grassland, |f| f())
    }

    fn get_purchasable(&self) -> Vec<String> {
        self.bindings
            .purchasable
            .as_ref()
            .map_or_else(Vec::new, |f| f())
    }

    fn upgrade(&self, node_id: &str) -> bool {
        self.bindings
            .upgrade
            .as_ref()
            .is_some_and(|f| f(node_id))
    }

    fn print(&self, text: &str) {
        match &self.bindings.output {
            Some(buffer) if thread::current().id() == self.owner => {
                if self.is_running() {
                    buffer.write(text);
                    buffer.write("\n");
                }
            }
            _ => println!("{text}"),
        }
    }
}
