//! ByteFarm engine -- the frame-driven half of the execution core.
//!
//! [`FarmEngine`] owns the farm state, the simulated tick counter, and a
//! [`ProgramRuntime`](bytefarm_runtime::ProgramRuntime) whose host callbacks
//! it binds to that state. Each call to [`FarmEngine::advance`] is one frame:
//! the tick counter moves forward by the frame delta and the
//! [`TickScheduler`] dequeues, times, or applies at most one operation.
//!
//! # Quick Start
//!
//! ```no_run
//! use bytefarm_engine::prelude::*;
//!
//! let mut engine = FarmEngine::new(EngineConfig::default());
//! engine
//!     .start_program(NativeProgram::new("walk", |api: &dyn FarmApi| {
//!         api.move_to(Direction::East)?;
//!         Ok(())
//!     }))
//!     .unwrap();
//!
//! while engine.is_running() {
//!     if let Some(record) = engine.advance(16) {
//!         println!("{} -> {:?}", record.operation, record.effect);
//!     }
//! }
//! assert_eq!(engine.state().avatar.position(), (3, 2));
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod farm;
pub mod mutators;
pub mod scheduler;
pub mod snapshot;
pub mod timing;

use std::path::PathBuf;

use bytefarm_runtime::RuntimeError;

/// Re-export the world crate for convenience.
pub use bytefarm_world;

/// Re-export the runtime crate for convenience.
pub use bytefarm_runtime;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Loading or starting a program failed.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// A snapshot's recorded hash does not match its contents.
    #[error(
        "snapshot hash mismatch: recorded {recorded} but recomputed {computed}; \
         the snapshot may be corrupted or tampered with"
    )]
    SnapshotHashMismatch { recorded: String, computed: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configuration file could not be read or parsed.
    #[error("invalid config {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for driving an engine.
pub mod prelude {
    pub use bytefarm_runtime::{
        ActionError, ActionKind, FarmApi, LoadOptions, NativeProgram, Operation, OutputBuffer,
        ProgramSource, ScriptProgram, UserProgram, WasmProgram,
    };
    pub use bytefarm_world::prelude::*;

    pub use crate::config::{ActionDurations, EngineConfig};
    pub use crate::farm::{FarmEngine, PROGRAM_STARTED};
    pub use crate::mutators::{Effect, OperationRecord};
    pub use crate::scheduler::{OperationSource, PendingOperation, TickScheduler};
    pub use crate::snapshot::EngineSnapshot;
    pub use crate::timing::{duration_for, scaled_duration};
    pub use crate::EngineError;
}
