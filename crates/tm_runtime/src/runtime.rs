//! The module system: finder chain, module cache and script execution.

use std::cell::RefCell;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use indexmap::IndexMap;
use log::debug;
use swc_common::{sync::Lrc, SourceMap};
use tm_ast::{Span, DUMMY_SP};

use crate::builtins;
use crate::compile::CodeUnit;
use crate::error::{ErrorKind, ExecError, ExecResult};
use crate::import::{Finder, FinderId, Loader, ModuleSpec, PathFinder};
use crate::interp::Flow;
use crate::value::{Args, Env, ModuleObject, Scope, Value};

/// Where `print` writes.
#[derive(Debug, Clone)]
pub enum Output {
    Stdout,
    Buffer(Rc<RefCell<String>>),
}

/// An interpreter instance.
///
/// Owns everything the host's import machinery would keep process-wide: the
/// ordered finder chain, the search paths, built-in modules and the cache of
/// loaded modules. Nothing is global, so independent runtimes never observe
/// each other's hooks.
pub struct Runtime {
    source_map: Lrc<SourceMap>,
    finders: Vec<(FinderId, Rc<dyn Finder>)>,
    next_finder: u64,
    search_paths: Vec<PathBuf>,
    builtin_modules: IndexMap<String, Rc<ModuleObject>>,
    modules: IndexMap<String, Rc<ModuleObject>>,
    loading: Vec<String>,
    builtins: Env,
    output: Output,
    pub(crate) depth: usize,
}

impl Runtime {
    /// A runtime whose finder chain holds only the default [`PathFinder`].
    pub fn new() -> Self {
        let builtins = Scope::new_env(None);
        builtins::install(&builtins);
        let mut runtime = Self {
            source_map: Default::default(),
            finders: Vec::new(),
            next_finder: 0,
            search_paths: Vec::new(),
            builtin_modules: IndexMap::new(),
            modules: IndexMap::new(),
            loading: Vec::new(),
            builtins,
            output: Output::Stdout,
            depth: 0,
        };
        runtime.append_finder(Rc::new(PathFinder::new()));
        runtime
    }

    pub fn source_map(&self) -> &Lrc<SourceMap> {
        &self.source_map
    }

    /// `file:line:column` of a span, if it points into a registered file.
    pub fn location(&self, span: Span) -> Option<String> {
        if span.is_dummy() {
            return None;
        }
        let loc = self.source_map.lookup_char_pos(span.lo);
        Some(format!("{}:{}:{}", loc.file.name, loc.line, loc.col.0 + 1))
    }

    // Search paths

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.push(path.into());
    }

    /// Search `path` before every other path.
    pub fn prepend_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.insert(0, path.into());
    }

    // Finders

    fn allocate_finder_id(&mut self) -> FinderId {
        let id = FinderId(self.next_finder);
        self.next_finder += 1;
        id
    }

    /// Install `finder` ahead of every existing finder.
    pub fn prepend_finder(&mut self, finder: Rc<dyn Finder>) -> FinderId {
        let id = self.allocate_finder_id();
        self.finders.insert(0, (id, finder));
        debug!("installed finder {id:?} at the front of the chain");
        id
    }

    pub fn append_finder(&mut self, finder: Rc<dyn Finder>) -> FinderId {
        let id = self.allocate_finder_id();
        self.finders.push((id, finder));
        id
    }

    /// Uninstall a finder. Returns `false` if it was not installed.
    pub fn remove_finder(&mut self, id: FinderId) -> bool {
        let before = self.finders.len();
        self.finders.retain(|(installed, _)| *installed != id);
        let removed = self.finders.len() != before;
        if removed {
            debug!("removed finder {id:?}");
        }
        removed
    }

    pub fn finder_count(&self) -> usize {
        self.finders.len()
    }

    /// Ask each finder in order for `name`.
    pub fn find_spec(&self, name: &str) -> Option<ModuleSpec> {
        self.finders
            .iter()
            .find_map(|(_, finder)| finder.find_spec(name, &self.search_paths))
    }

    // Modules

    /// Make `name` importable without any source file.
    pub fn register_builtin_module(&mut self, name: &str, values: IndexMap<String, Value>) {
        let globals = Scope::new_env(None);
        {
            let mut scope = globals.borrow_mut();
            scope.set("__name__", Value::str(name));
            for (key, value) in values {
                scope.set(key, value);
            }
        }
        let module = Rc::new(ModuleObject::new(name, None, globals));
        self.builtin_modules.insert(name.to_string(), module);
    }

    pub fn remove_builtin_module(&mut self, name: &str) -> bool {
        self.builtin_modules.shift_remove(name).is_some()
    }

    /// A module that finished loading, if any.
    pub fn loaded_module(&self, name: &str) -> Option<Rc<ModuleObject>> {
        self.modules.get(name).cloned()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Import `name`, loading it through the finder chain on first use.
    pub fn import_module(&mut self, name: &str) -> ExecResult<Rc<ModuleObject>> {
        self.import_module_at(name, DUMMY_SP)
    }

    pub(crate) fn import_module_at(&mut self, name: &str, span: Span) -> ExecResult<Rc<ModuleObject>> {
        if let Some(module) = self.modules.get(name) {
            return Ok(module.clone());
        }
        if let Some(module) = self.builtin_modules.get(name) {
            return Ok(module.clone());
        }
        if self.loading.iter().any(|loading| loading == name) {
            return Err(ExecError::new(
                ErrorKind::ImportError,
                format!("cannot import partially initialized module '{name}' (circular import)"),
                span,
            ));
        }
        let spec = self.find_spec(name).ok_or_else(|| {
            ExecError::new(
                ErrorKind::ModuleNotFoundError,
                format!("no module named '{name}'"),
                span,
            )
        })?;

        self.loading.push(name.to_string());
        let result = self
            .load_code(&spec, span)
            .and_then(|code| self.exec_code(&code, name, Some(spec.origin.clone())));
        self.loading.retain(|loading| loading != name);

        let module = result?;
        self.modules.insert(name.to_string(), module.clone());
        debug!("module '{name}' loaded from {}", spec.origin.display());
        Ok(module)
    }

    /// Execute module `name` as the main script. The result is not cached,
    /// so a later `import name` loads a separate copy.
    pub fn run_module(&mut self, name: &str) -> ExecResult<Rc<ModuleObject>> {
        let spec = self.find_spec(name).ok_or_else(|| {
            ExecError::new(
                ErrorKind::ModuleNotFoundError,
                format!("no module named '{name}'"),
                DUMMY_SP,
            )
        })?;
        let code = self.load_code(&spec, DUMMY_SP)?;
        self.exec_code(&code, "__main__", Some(spec.origin))
    }

    /// Compile `source` with `loader` and execute it as module `name`,
    /// bypassing the finder chain and the cache.
    pub fn exec_source_with(
        &mut self,
        loader: &dyn Loader,
        name: &str,
        origin: &Path,
        source: &str,
    ) -> ExecResult<Rc<ModuleObject>> {
        let code = loader
            .source_to_code(&self.source_map, source, origin)
            .map_err(|err| load_error(name, origin, DUMMY_SP, err))?;
        self.exec_code(&code, name, Some(origin.to_path_buf()))
    }

    fn load_code(&self, spec: &ModuleSpec, span: Span) -> ExecResult<CodeUnit> {
        debug!("loading '{}' from {}", spec.name, spec.origin.display());
        spec.loader
            .get_source(&spec.origin)
            .and_then(|source| {
                spec.loader
                    .source_to_code(&self.source_map, &source, &spec.origin)
            })
            .map_err(|err| load_error(&spec.name, &spec.origin, span, err))
    }

    /// Run compiled code in a fresh global scope.
    pub fn exec_code(
        &mut self,
        code: &CodeUnit,
        name: &str,
        origin: Option<PathBuf>,
    ) -> ExecResult<Rc<ModuleObject>> {
        let globals = Scope::new_env(Some(self.builtins.clone()));
        {
            let mut scope = globals.borrow_mut();
            scope.set("__name__", Value::str(name));
            if let Some(origin) = &origin {
                scope.set("__file__", Value::str(origin.display().to_string()));
            }
        }
        let module = Rc::new(ModuleObject::new(name, origin, globals.clone()));
        match self.exec_block(&code.module.body, &globals)? {
            Flow::Next => {}
            Flow::Return(_) | Flow::Break | Flow::Continue => {
                debug!("ignoring stray control flow at module level of '{name}'")
            }
        }
        Ok(module)
    }

    /// Call a runtime value with positional arguments.
    pub fn call(&mut self, callee: &Value, args: Vec<Value>) -> ExecResult<Value> {
        self.call_value(callee, Args::positional(args, DUMMY_SP))
    }

    // Output

    /// Redirect `print` into a buffer and return it.
    pub fn capture_output(&mut self) -> Rc<RefCell<String>> {
        let buffer = Rc::new(RefCell::new(String::new()));
        self.output = Output::Buffer(buffer.clone());
        buffer
    }

    pub(crate) fn write_output(&mut self, text: &str) {
        match &self.output {
            Output::Stdout => {
                let mut stdout = std::io::stdout().lock();
                let _ = stdout.write_all(text.as_bytes());
            }
            Output::Buffer(buffer) => buffer.borrow_mut().push_str(text),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

fn load_error(name: &str, origin: &Path, span: Span, err: anyhow::Error) -> ExecError {
    ExecError::new(
        ErrorKind::ImportError,
        format!("cannot load module '{name}' from {}", origin.display()),
        span,
    )
    .with_cause(err)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn runtime_with(files: &[(&str, &str)]) -> (tempfile::TempDir, Runtime) {
        let dir = tempfile::tempdir().unwrap();
        for (path, source) in files {
            let path = dir.path().join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, source).unwrap();
        }
        let mut rt = Runtime::new();
        rt.add_search_path(dir.path());
        (dir, rt)
    }

    #[test]
    fn imports_are_cached() {
        let (_dir, mut rt) = runtime_with(&[
            ("counter.tm", "hits = []\nhits.append(1)\n"),
            ("main.tm", "import counter\nimport counter as again\ncounter.hits.append(2)\n"),
        ]);
        let main = rt.import_module("main").unwrap();
        assert!(rt.is_loaded("counter"));
        let hits = rt.loaded_module("counter").unwrap().get("hits").unwrap();
        assert_eq!(hits.repr(), "[1, 2]");
        assert!(main.get("again").is_some());
        assert_eq!(
            main.get("__file__").unwrap().to_string(),
            rt.loaded_module("main")
                .unwrap()
                .origin
                .as_ref()
                .unwrap()
                .display()
                .to_string()
        );
    }

    #[test]
    fn dotted_imports_bind_the_last_segment() {
        let (_dir, mut rt) = runtime_with(&[
            ("pkg/util.tm", "def double(x):\n    return x * 2\n"),
            ("main.tm", "import pkg.util\nfrom pkg.util import double as d\nr = util.double(d(2))\n"),
        ]);
        let main = rt.import_module("main").unwrap();
        assert_eq!(main.get("r").unwrap().repr(), "8");
    }

    #[test]
    fn failed_modules_are_not_cached() {
        let (_dir, mut rt) = runtime_with(&[("broken.tm", "x = 1\ny = x / 0\n")]);
        let err = rt.import_module("broken").err().unwrap();
        assert_eq!(err.kind, ErrorKind::ZeroDivisionError);
        assert!(!rt.is_loaded("broken"));

        let err = rt.import_module("nowhere").err().unwrap();
        assert_eq!(err.kind, ErrorKind::ModuleNotFoundError);
        assert_eq!(err.message, "no module named 'nowhere'");
    }

    #[test]
    fn load_errors_keep_their_cause() {
        let (_dir, mut rt) = runtime_with(&[("bad.tm", "x = = 1\n")]);
        let err = rt.import_module("bad").err().unwrap();
        assert_eq!(err.kind, ErrorKind::ImportError);
        assert!(err.message.starts_with("cannot load module 'bad' from "));
        assert!(err.find_cause::<tm_parser::ParseError>().is_some());
    }

    #[test]
    fn circular_imports_are_rejected() {
        let (_dir, mut rt) = runtime_with(&[("a.tm", "import b\n"), ("b.tm", "import a\n")]);
        let err = rt.import_module("a").err().unwrap();
        assert_eq!(err.kind, ErrorKind::ImportError);
        assert!(err.message.contains("circular import"));
        assert!(!rt.is_loaded("a"));
        assert!(!rt.is_loaded("b"));
    }

    #[test]
    fn run_module_executes_as_main() {
        let (_dir, mut rt) = runtime_with(&[("script.tm", "print(__name__)\n")]);
        let out = rt.capture_output();
        let module = rt.run_module("script").unwrap();
        assert_eq!(module.name, "__main__");
        assert_eq!(out.borrow().as_str(), "__main__\n");
        assert!(!rt.is_loaded("script"));

        rt.import_module("script").unwrap();
        assert_eq!(out.borrow().as_str(), "__main__\nscript\n");
    }

    #[test]
    fn builtin_modules_need_no_source() {
        let (_dir, mut rt) = runtime_with(&[("main.tm", "from config import level\n")]);
        let mut values = IndexMap::new();
        values.insert("level".to_string(), Value::Int(3));
        rt.register_builtin_module("config", values);
        let main = rt.import_module("main").unwrap();
        assert_eq!(main.get("level").unwrap().repr(), "3");

        assert!(rt.remove_builtin_module("config"));
        assert!(!rt.remove_builtin_module("config"));
    }

    #[test]
    fn finders_are_consulted_in_order() {
        struct Fixed(PathBuf);

        impl Finder for Fixed {
            fn find_spec(&self, name: &str, _: &[PathBuf]) -> Option<ModuleSpec> {
                (name == "target").then(|| ModuleSpec {
                    name: name.to_string(),
                    origin: self.0.clone(),
                    loader: Rc::new(crate::import::SourceLoader),
                })
            }
        }

        let (dir, mut rt) = runtime_with(&[
            ("target.tm", "origin = 'path'\n"),
            ("other.tm", "origin = 'fixed'\n"),
        ]);
        assert_eq!(rt.finder_count(), 1);
        let id = rt.prepend_finder(Rc::new(Fixed(dir.path().join("other.tm"))));
        let spec = rt.find_spec("target").unwrap();
        assert_eq!(spec.origin, dir.path().join("other.tm"));

        assert!(rt.remove_finder(id));
        assert!(!rt.remove_finder(id));
        let spec = rt.find_spec("target").unwrap();
        assert_eq!(spec.origin, dir.path().join("target.tm"));
    }

    #[test]
    fn call_invokes_runtime_functions() {
        let (_dir, mut rt) = runtime_with(&[("m.tm", "def inc(x, step=1):\n    return x + step\n")]);
        let module = rt.import_module("m").unwrap();
        let inc = module.get("inc").unwrap();
        let result = rt.call(&inc, vec![Value::Int(41)]).unwrap();
        assert_eq!(result.repr(), "42");
    }

    #[test]
    fn locations_resolve_through_the_source_map() {
        let (_dir, mut rt) = runtime_with(&[("m.tm", "x = 1\ny = missing\n")]);
        let err = rt.import_module("m").err().unwrap();
        let location = rt.location(err.span).unwrap();
        assert!(location.ends_with("m.tm:2:5"), "{location}");
        assert_eq!(rt.location(DUMMY_SP), None);
    }
}
