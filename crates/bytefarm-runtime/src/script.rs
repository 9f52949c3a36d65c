//! Rhai script backend.
//!
//! A [`ScriptEnvironment`] is one Rhai engine carrying the action namespace:
//! every action, query and constant module is registered on the engine
//! itself, so any code it evaluates can call them without an `import`.
//!
//! Two scoped installs run around the entry point, each undone by a guard:
//!
//! - [`ScriptEnvironment::intercept`] swaps in an [`ImportInterceptor`]
//!   that loads modules living next to the entry script fresh from disk and
//!   evaluates them inside this environment. Other paths fall through to
//!   the default file resolver.
//! - [`ScriptEnvironment::capture_output`] routes `print` to a sink when
//!   called on the owner thread; other threads print to stdout as usual.

use std::fs;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, ThreadId};

use bytefarm_world::kinds::{Direction, EntityKind, Ground};
use rhai::module_resolvers::FileModuleResolver;
use rhai::{
    Array, Dynamic, Engine, EvalAltResult, ImmutableString, Module, ModuleResolver, Position,
    Scope, AST, INT,
};

use crate::namespace::{ActionNamespace, FarmApi};
use crate::operation::Operation;
use crate::program::{program_name, UserProgram};
use crate::LoadError;

/// Name of the required zero-argument entry function.
pub const ENTRY: &str = "run";

/// Shared handle to the action surface registered on the engine.
pub type SharedApi = Arc<dyn FarmApi + Send + Sync>;

/// One `import` observed while a program ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord {
    /// The path as written in the `import` statement.
    pub path: String,
    /// `true` when loaded from the entry directory into this environment.
    pub injected: bool,
}

// ---------------------------------------------------------------------------
// ScriptEnvironment
// ---------------------------------------------------------------------------

/// A Rhai engine with the action namespace registered on it.
pub struct ScriptEnvironment {
    engine: Engine,
    imports: Arc<Mutex<Vec<ImportRecord>>>,
}

impl ScriptEnvironment {
    pub fn new(api: SharedApi) -> Self {
        let mut engine = Engine::new();
        register_actions(&mut engine, &api);
        register_constants(&mut engine);
        engine.on_print(stdout_print);
        Self {
            engine,
            imports: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Imports observed so far, in order.
    pub fn imports(&self) -> Vec<ImportRecord> {
        self.imports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Install the import interceptor for `entry_dir` until the guard drops.
    pub fn intercept(&mut self, entry_dir: Option<&Path>) -> InterceptGuard<'_> {
        let interceptor = ImportInterceptor::new(entry_dir, Arc::clone(&self.imports));
        self.engine.set_module_resolver(interceptor);
        InterceptGuard { env: self }
    }

    /// Route `print` from `owner` into `sink` until the guard drops.
    pub fn capture_output(
        &mut self,
        owner: ThreadId,
        sink: impl Fn(&str) + Send + Sync + 'static,
    ) -> OutputGuard<'_> {
        self.engine.on_print(move |text| {
            if thread::current().id() == owner {
                sink(text);
            } else {
                stdout_print(text);
            }
        });
        OutputGuard { env: self }
    }
}

impl std::fmt::Debug for ScriptEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEnvironment")
            .field("imports", &self.imports())
            .finish_non_exhaustive()
    }
}

/// Rhai's own default: plain stdout.
fn stdout_print(text: &str) {
    println!("{text}");
}

/// Restores the default module resolver on drop.
pub struct InterceptGuard<'a> {
    env: &'a mut ScriptEnvironment,
}

impl Drop for InterceptGuard<'_> {
    fn drop(&mut self) {
        self.env.engine.set_module_resolver(FileModuleResolver::new());
    }
}

impl Deref for InterceptGuard<'_> {
    type Target = ScriptEnvironment;

    fn deref(&self) -> &ScriptEnvironment {
        self.env
    }
}

impl DerefMut for InterceptGuard<'_> {
    fn deref_mut(&mut self) -> &mut ScriptEnvironment {
        self.env
    }
}

/// Restores the log-only print handler on drop.
pub struct OutputGuard<'a> {
    env: &'a mut ScriptEnvironment,
}

impl Drop for OutputGuard<'_> {
    fn drop(&mut self) {
        self.env.engine.on_print(stdout_print);
    }
}

impl Deref for OutputGuard<'_> {
    type Target = ScriptEnvironment;

    fn deref(&self) -> &ScriptEnvironment {
        self.env
    }
}

impl DerefMut for OutputGuard<'_> {
    fn deref_mut(&mut self) -> &mut ScriptEnvironment {
        self.env
    }
}

// ---------------------------------------------------------------------------
// Namespace registration
// ---------------------------------------------------------------------------

fn blocking(result: Result<(), crate::ActionError>) -> Result<(), Box<EvalAltResult>> {
    result.map_err(|e| e.to_string().into())
}

fn pair(a: i32, b: i32) -> Array {
    vec![Dynamic::from(a as INT), Dynamic::from(b as INT)]
}

fn register_actions(engine: &mut Engine, api: &SharedApi) {
    let a = Arc::clone(api);
    engine.register_fn("move", move |direction: Dynamic| {
        blocking(a.submit(Operation::parse_move(&direction.to_string())))
    });
    let a = Arc::clone(api);
    engine.register_fn("collect", move || blocking(a.collect()));
    let a = Arc::clone(api);
    engine.register_fn("till", move || blocking(a.till()));
    let a = Arc::clone(api);
    engine.register_fn("plant", move |entity: Dynamic| {
        blocking(a.submit(Operation::parse_plant(&entity.to_string())))
    });

    let a = Arc::clone(api);
    engine.register_fn("measure", move || a.measure() as INT);
    let a = Arc::clone(api);
    engine.register_fn("can_collect", move || a.can_collect());
    let a = Arc::clone(api);
    engine.register_fn("get_position", move || {
        let (x, y) = a.get_position();
        pair(x, y)
    });
    let a = Arc::clone(api);
    engine.register_fn("get_map_size", move || {
        let (w, h) = a.get_map_size();
        pair(w, h)
    });
    let a = Arc::clone(api);
    engine.register_fn("get_nearby", move || {
        a.get_nearby()
            .into_iter()
            .map(|t| {
                let entry: Array = vec![
                    Dynamic::from(t.x as INT),
                    Dynamic::from(t.y as INT),
                    Dynamic::from(t.amount as INT),
                ];
                Dynamic::from_array(entry)
            })
            .collect::<Array>()
    });
    let a = Arc::clone(api);
    engine.register_fn("get_ground", move || a.get_ground().name().to_owned());
    let a = Arc::clone(api);
    engine.register_fn("get_purchasable", move || {
        a.get_purchasable()
            .into_iter()
            .map(Dynamic::from)
            .collect::<Array>()
    });
    let a = Arc::clone(api);
    engine.register_fn("upgrade", move |node: ImmutableString| a.upgrade(&node));
}

fn constant_module<T: std::fmt::Debug + Copy>(items: &[T], name: impl Fn(T) -> &'static str) -> Module {
    let mut module = Module::new();
    for &item in items {
        module.set_var(format!("{item:?}"), name(item).to_owned());
    }
    module
}

fn register_constants(engine: &mut Engine) {
    engine.register_static_module(
        "Direction",
        constant_module(&Direction::ALL, Direction::name).into(),
    );
    engine.register_static_module("Ground", constant_module(&Ground::ALL, Ground::name).into());
    let entities: Arc<Module> = constant_module(&EntityKind::ALL, EntityKind::name).into();
    engine.register_static_module("Entity", Arc::clone(&entities));
    engine.register_static_module("Entities", entities);
}

// ---------------------------------------------------------------------------
// ImportInterceptor
// ---------------------------------------------------------------------------

/// Module resolver active while a program runs.
pub struct ImportInterceptor {
    entry_dir: Option<PathBuf>,
    fallback: FileModuleResolver,
    records: Arc<Mutex<Vec<ImportRecord>>>,
}

impl ImportInterceptor {
    fn new(entry_dir: Option<&Path>, records: Arc<Mutex<Vec<ImportRecord>>>) -> Self {
        let entry_dir = entry_dir.and_then(|d| d.canonicalize().ok());
        let fallback = match &entry_dir {
            Some(dir) => FileModuleResolver::new_with_path(dir.clone()),
            None => FileModuleResolver::new(),
        };
        Self {
            entry_dir,
            fallback,
            records,
        }
    }

    /// The file `path` names if it lives directly in the entry directory.
    fn sibling(&self, path: &str) -> Option<PathBuf> {
        let dir = self.entry_dir.as_ref()?;
        let mut candidate = dir.join(path);
        if candidate.extension().is_none() {
            candidate.set_extension("rhai");
        }
        let file = candidate.canonicalize().ok()?;
        (file.is_file() && file.parent() == Some(dir.as_path())).then_some(file)
    }

    fn record(&self, path: &str, injected: bool) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ImportRecord {
                path: path.to_owned(),
                injected,
            });
    }

    fn load_fresh(
        &self,
        engine: &Engine,
        file: &Path,
        path: &str,
        pos: Position,
    ) -> Result<Arc<Module>, Box<EvalAltResult>> {
        let source = fs::read_to_string(file)
            .map_err(|_| Box::new(EvalAltResult::ErrorModuleNotFound(path.to_owned(), pos)))?;
        let mut ast = engine.compile(&source).map_err(|e| {
            Box::new(EvalAltResult::ErrorInModule(path.to_owned(), e.into(), pos))
        })?;
        ast.set_source(file.to_string_lossy().into_owned());
        let mut module = Module::eval_ast_as_new(Scope::new(), &ast, engine)
            .map_err(|e| Box::new(EvalAltResult::ErrorInModule(path.to_owned(), e, pos)))?;
        module.build_index();
        tracing::debug!(module = path, file = %file.display(), "sibling module loaded");
        Ok(Arc::new(module))
    }
}

impl ModuleResolver for ImportInterceptor {
    fn resolve(
        &self,
        engine: &Engine,
        source: Option<&str>,
        path: &str,
        pos: Position,
    ) -> Result<Arc<Module>, Box<EvalAltResult>> {
        match self.sibling(path) {
            Some(file) => {
                self.record(path, true);
                self.load_fresh(engine, &file, path, pos)
            }
            None => {
                self.record(path, false);
                self.fallback.resolve(engine, source, path, pos)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptProgram
// ---------------------------------------------------------------------------

/// A compiled Rhai program with a verified `fn run()`.
#[derive(Debug, Clone)]
pub struct ScriptProgram {
    name: String,
    dir: Option<PathBuf>,
    ast: AST,
}

impl ScriptProgram {
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let code = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::compile(program_name(path), &code, path.parent())
    }

    /// Compile editor code. `dir` is where sibling imports are looked up.
    pub fn from_source(code: &str, dir: Option<&Path>) -> Result<Self, LoadError> {
        Self::compile("editor".to_owned(), code, dir)
    }

    fn compile(name: String, code: &str, dir: Option<&Path>) -> Result<Self, LoadError> {
        let ast = Engine::new().compile(code).map_err(|e| LoadError::Parse {
            program: name.clone(),
            message: e.to_string(),
        })?;
        let has_entry = ast
            .iter_functions()
            .any(|f| f.name == ENTRY && f.params.is_empty());
        if !has_entry {
            return Err(LoadError::MissingEntry {
                program: name,
                entry: ENTRY,
            });
        }
        Ok(Self {
            name,
            dir: dir.map(Path::to_path_buf),
            ast,
        })
    }

    /// Call `run()` against `api`, returning the imports it made.
    pub fn execute(&self, api: SharedApi) -> Result<Vec<ImportRecord>, Box<EvalAltResult>> {
        let owner = thread::current().id();
        let sink = Arc::clone(&api);
        let mut env = ScriptEnvironment::new(api);
        let imports = {
            let mut intercepted = env.intercept(self.dir.as_deref());
            let captured = intercepted.capture_output(owner, move |text| sink.print(text));
            let mut scope = Scope::new();
            captured
                .engine()
                .call_fn::<Dynamic>(&mut scope, &self.ast, ENTRY, ())?;
            captured.imports()
        };
        Ok(imports)
    }
}

impl UserProgram for ScriptProgram {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(self: Box<Self>, api: Arc<ActionNamespace>) -> anyhow::Result<()> {
        let imports = self
            .execute(api)
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        tracing::debug!(program = %self.name, imports = imports.len(), "script finished");
        Ok(())
    }
}
