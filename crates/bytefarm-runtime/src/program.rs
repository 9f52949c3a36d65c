//! User program backends and loading.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::namespace::{ActionNamespace, FarmApi};
use crate::script::ScriptProgram;
use crate::wasm::WasmProgram;
use crate::LoadError;

/// Something the runtime can execute on the program thread.
///
/// `run` is the zero-argument entry point. It returns when the program
/// finishes; an `Err` (or a panic) becomes a diagnostic block in the output
/// buffer.
pub trait UserProgram: Send + 'static {
    fn name(&self) -> &str;

    fn run(self: Box<Self>, api: Arc<ActionNamespace>) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// Native programs
// ---------------------------------------------------------------------------

type NativeEntry = Box<dyn FnOnce(&dyn FarmApi) -> anyhow::Result<()> + Send>;

/// A program written as a Rust closure.
pub struct NativeProgram {
    name: String,
    entry: NativeEntry,
}

impl NativeProgram {
    pub fn new(
        name: impl Into<String>,
        entry: impl FnOnce(&dyn FarmApi) -> anyhow::Result<()> + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            entry: Box::new(entry),
        }
    }
}

impl UserProgram for NativeProgram {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(self: Box<Self>, api: Arc<ActionNamespace>) -> anyhow::Result<()> {
        (self.entry)(&*api)
    }
}

impl fmt::Debug for NativeProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeProgram")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Loading from disk
// ---------------------------------------------------------------------------

/// File names tried, in order, when a directory is loaded.
const ENTRY_FILES: [&str; 3] = ["main.rhai", "main.wasm", "main.wat"];

/// Settings applied while loading.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Fuel granted to a WASM program's `run`; `None` disables metering.
    pub wasm_fuel: Option<u64>,
}

/// A program loaded from disk, dispatched by file extension.
#[derive(Debug)]
pub enum ProgramSource {
    Script(ScriptProgram),
    Wasm(WasmProgram),
}

impl ProgramSource {
    /// Load with default options.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        Self::load_with(path, &LoadOptions::default())
    }

    /// Load a program file, or a directory's `main.rhai`/`main.wasm`/`main.wat`.
    pub fn load_with(path: impl AsRef<Path>, options: &LoadOptions) -> Result<Self, LoadError> {
        let entry = resolve_entry(path.as_ref())?;
        let extension = entry
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let program = match extension.as_deref() {
            Some("rhai") => ProgramSource::Script(ScriptProgram::from_file(&entry)?),
            Some("wasm") | Some("wat") => {
                ProgramSource::Wasm(WasmProgram::from_file(&entry, options.wasm_fuel)?)
            }
            _ => return Err(LoadError::UnsupportedExtension { path: entry }),
        };
        tracing::debug!(program = program.name(), path = %entry.display(), "program loaded");
        Ok(program)
    }
}

fn resolve_entry(path: &Path) -> Result<PathBuf, LoadError> {
    if path.is_dir() {
        return ENTRY_FILES
            .iter()
            .map(|name| path.join(name))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| LoadError::NotFound {
                path: path.join(ENTRY_FILES[0]),
            });
    }
    if !path.is_file() {
        return Err(LoadError::NotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(path.to_path_buf())
}

/// Program name derived from a file stem.
pub(crate) fn program_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("program")
        .to_owned()
}

impl UserProgram for ProgramSource {
    fn name(&self) -> &str {
        match self {
            ProgramSource::Script(p) => p.name(),
            ProgramSource::Wasm(p) => p.name(),
        }
    }

    fn run(self: Box<Self>, api: Arc<ActionNamespace>) -> anyhow::Result<()> {
        match *self {
            ProgramSource::Script(p) => Box::new(p).run(api),
            ProgramSource::Wasm(p) => Box::new(p).run(api),
        }
    }
}
