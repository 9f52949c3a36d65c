//! ByteFarm runtime -- runs a user program on its own thread and turns each
//! blocking action into one queued [`Operation`].
//!
//! # Architecture
//!
//! - **`Operation`**: one timed action issued by the program (`move`,
//!   `collect`, `till`, `plant`), a malformed request, or the `Stop`
//!   shutdown sentinel.
//! - **`CompletionSignal`**: the single-slot wake primitive the program
//!   thread waits on after every push.
//! - **`HostBindings`**: query and mutator callbacks the host supplies
//!   before start. Unbound callbacks fall back to neutral values.
//! - **`ActionNamespace`**: the [`FarmApi`] surface handed to user code.
//! - **`ProgramRuntime`**: owns the channel, the signal, and the running
//!   flag; starts, polls, completes, and stops programs.
//! - **Backends**: native closures ([`NativeProgram`]), Rhai scripts with
//!   import interception ([`ScriptProgram`]), and WASM modules importing
//!   the `"farm"` namespace ([`WasmProgram`]).
//!
//! # Example
//!
//! ```no_run
//! use bytefarm_runtime::{FarmApi, NativeProgram, ProgramRuntime};
//! use bytefarm_world::kinds::Direction;
//!
//! let mut runtime = ProgramRuntime::new();
//! runtime
//!     .start(NativeProgram::new("walk", |api: &dyn FarmApi| {
//!         api.move_to(Direction::East)?;
//!         Ok(())
//!     }))
//!     .unwrap();
//!
//! // The host loop polls once per frame and signals after applying.
//! while runtime.is_running() {
//!     if let Some(op) = runtime.poll_op() {
//!         println!("applying {op}");
//!         runtime.op_done();
//!     }
//! }
//! ```

#![deny(unsafe_code)]

pub mod bindings;
pub mod channel;
pub mod namespace;
pub mod operation;
pub mod output;
pub mod program;
pub mod runtime;
pub mod script;
pub mod wasm;

#[cfg(test)]
mod testing;

use std::path::PathBuf;

pub use bindings::HostBindings;
pub use channel::CompletionSignal;
pub use namespace::{ActionNamespace, FarmApi};
pub use operation::{ActionKind, Operation};
pub use output::{OutputBuffer, DEFAULT_OUTPUT_CAPACITY};
pub use program::{LoadOptions, NativeProgram, ProgramSource, UserProgram};
pub use runtime::ProgramRuntime;
pub use script::{ImportRecord, ScriptEnvironment, ScriptProgram};
pub use wasm::{WasmProgram, WasmRunError};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// A program could not be loaded. Raised before any thread is started.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// No file or directory at the given path.
    #[error("program not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The program does not define its zero-argument entry point.
    #[error("program '{program}' must define a zero-argument `{entry}` entry point")]
    MissingEntry {
        program: String,
        entry: &'static str,
    },

    /// The script source did not parse.
    #[error("failed to parse '{program}': {message}")]
    Parse { program: String, message: String },

    /// The WASM module did not compile.
    #[error("failed to compile '{program}': {message}")]
    Compile { program: String, message: String },

    /// The file extension maps to no backend.
    #[error("unsupported program type: {} (expected .rhai, .wasm or .wat)", path.display())]
    UnsupportedExtension { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a blocking action did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// The runtime was stopped while the call was queued or waiting.
    #[error("program stopped")]
    Stopped,
}

/// Errors from [`ProgramRuntime::start`].
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The OS refused to spawn the program thread.
    #[error("failed to spawn program thread: {0}")]
    Spawn(#[source] std::io::Error),
}
