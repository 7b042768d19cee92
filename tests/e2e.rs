//! End-to-end load tests: modules on disk imported through an installed
//! pipeline.

use std::fs;
use std::path::Path;
use std::rc::Rc;

use tempfile::TempDir;
use tm_ast::{Module, PassStmt, Stmt, DUMMY_SP};
use tm_loader::{Pipeline, PipelineConfig, PipelineHandle};
use tm_runtime::{CompileError, CompileErrorKind, ErrorKind, ModuleObject, Runtime, Value};
use tm_transform::{Transformer, TransformerNotFound, TransformerRegistry};

struct Project {
    dir: TempDir,
    rt: Runtime,
    handle: Option<PipelineHandle>,
}

impl Project {
    fn new(files: &[(&str, &str)]) -> Self {
        Self::with_pipeline(files, Pipeline::default())
    }

    fn with_pipeline(files: &[(&str, &str)], pipeline: Pipeline) -> Self {
        let dir = tempfile::tempdir().unwrap();
        for (name, source) in files {
            write(dir.path(), name, source);
        }
        let mut rt = Runtime::new();
        rt.add_search_path(dir.path());
        let handle = pipeline.setup(&mut rt);
        Self {
            dir,
            rt,
            handle: Some(handle),
        }
    }

    fn import(&mut self, name: &str) -> Rc<ModuleObject> {
        self.rt
            .import_module(name)
            .unwrap_or_else(|err| panic!("import {name} failed: {err:?}"))
    }

    fn call(&mut self, module: &ModuleObject, name: &str, args: Vec<Value>) -> Value {
        let callee = module.get(name).unwrap();
        self.rt.call(&callee, args).unwrap()
    }

    fn teardown(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.teardown(&mut self.rt);
        }
    }
}

fn write(dir: &Path, name: &str, source: &str) {
    let path = dir.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, source).unwrap();
}

fn list(values: &[i64]) -> Value {
    Value::list(values.iter().copied().map(Value::Int).collect())
}

#[test]
fn placeholder_call_matches_manual_application() {
    let mut project = Project::new(&[(
        "calc.tm",
        "from __transformers__ import ellipsis_partial\n\
         def add(a, b):\n    return a + b\n\
         result = add(1, ...)\nexpected = add(1, 2)\n",
    )]);
    let calc = project.import("calc");
    let applied = project.call(&calc, "result", vec![Value::Int(2)]);
    assert!(applied.equals(&calc.get("expected").unwrap()));
    assert_eq!(applied.repr(), "3");
}

#[test]
fn comprehension_becomes_a_function_of_its_iterable() {
    let mut project = Project::new(&[(
        "comp.tm",
        "from __transformers__ import ellipsis_partial\nsquares = [x * x for x in ...]\n",
    )]);
    let comp = project.import("comp");
    let squares = project.call(&comp, "squares", vec![list(&[1, 2, 3])]);
    assert_eq!(squares.repr(), "[1, 4, 9]");
}

#[test]
fn selection_declaration_leaves_no_trace() {
    let mut project = Project::new(&[(
        "plain.tm",
        "from __transformers__ import ellipsis_partial, setup, _loader\nx = 1\n",
    )]);
    let plain = project.import("plain");
    assert_eq!(plain.get("x").unwrap().repr(), "1");
    for name in ["ellipsis_partial", "setup", "_loader"] {
        assert!(plain.get(name).is_none(), "{name} was bound");
    }
}

#[test]
fn unknown_transformer_fails_the_load_before_running_anything() {
    let mut project = Project::new(&[(
        "bad.tm",
        "from __transformers__ import does_not_exist\nprint('ran')\n",
    )]);
    let out = project.rt.capture_output();
    let err = project.rt.import_module("bad").err().unwrap();
    assert_eq!(err.kind, ErrorKind::ImportError);
    let not_found = err.find_cause::<TransformerNotFound>().unwrap();
    assert_eq!(not_found.name, "does_not_exist");
    assert_eq!(out.borrow().as_str(), "");
    assert!(!project.rt.is_loaded("bad"));
}

/// Appends a statement without a source location.
struct Unlocated;

impl Transformer for Unlocated {
    fn name(&self) -> &str {
        "unlocated"
    }

    fn visit(&mut self, module: &mut Module) {
        module.body.push(Stmt::Pass(PassStmt { span: DUMMY_SP }));
    }
}

fn unlocated_pipeline(config: PipelineConfig) -> Pipeline {
    let mut registry = TransformerRegistry::with_defaults();
    registry.register("unlocated", || Box::new(Unlocated));
    Pipeline::new(config, registry)
}

#[test]
fn uncompilable_rewrite_loads_the_original_module() {
    let mut project = Project::with_pipeline(
        &[(
            "fallback.tm",
            "from __transformers__ import unlocated\nx = [1, 2][0]\n",
        )],
        unlocated_pipeline(PipelineConfig::default()),
    );
    let module = project.import("fallback");
    assert_eq!(module.get("x").unwrap().repr(), "1");
    // The original declaration ran against the namespace module.
    assert_eq!(module.get("unlocated").unwrap().to_string(), "unlocated");
}

#[test]
fn without_fallback_the_compile_error_surfaces() {
    let config = PipelineConfig {
        fallback: false,
        ..PipelineConfig::default()
    };
    let mut project = Project::with_pipeline(
        &[("strict.tm", "from __transformers__ import unlocated\nx = 1\n")],
        unlocated_pipeline(config),
    );
    let err = project.rt.import_module("strict").err().unwrap();
    assert_eq!(err.kind, ErrorKind::ImportError);
    assert!(err.find_cause::<CompileError>().is_some());
}

#[test]
fn nested_placeholders_close_over_their_own_level() {
    let mut project = Project::new(&[(
        "nested.tm",
        "from __transformers__ import ellipsis_partial\n\
         def apply(f, x):\n    return f(x)\n\
         def inc(n):\n    return n + 1\n\
         run = apply(inc(...), ...)\n",
    )]);
    let nested = project.import("nested");
    assert_eq!(project.call(&nested, "run", vec![Value::Int(41)]).repr(), "42");
}

#[test]
fn subscript_placeholders_keep_their_meaning() {
    let mut project = Project::new(&[(
        "index.tm",
        "from __transformers__ import ellipsis_partial\n\
         table = {}\ntable[...] = 'dots'\nhit = table[...]\nlookup = table.get(...)\n",
    )]);
    let index = project.import("index");
    assert_eq!(index.get("hit").unwrap().repr(), "'dots'");
    let found = project.call(&index, "lookup", vec![Value::Ellipsis]);
    assert_eq!(found.repr(), "'dots'");
}

#[test]
fn calls_inside_subscript_indexes_are_evaluated_not_wrapped() {
    let mut project = Project::new(&[(
        "keyed.tm",
        "from __transformers__ import ellipsis_partial\n\
         table = {}\ntable[str(...)] = 'named'\nhit = table[str(...)]\nkeys = list(table)\n",
    )]);
    let keyed = project.import("keyed");
    assert_eq!(keyed.get("hit").unwrap().repr(), "'named'");
    assert_eq!(keyed.get("keys").unwrap().repr(), "['Ellipsis']");
}

#[test]
fn comprehension_closures_feed_nested_calls() {
    let mut project = Project::new(&[(
        "comp.tm",
        "from __transformers__ import ellipsis_partial\n\
         doubled = [x * 2 for x in list(...)]\n\
         evens = [x for x in range(...) if x % 2 == 0]\n",
    )]);
    let comp = project.import("comp");
    let items = Value::tuple(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    assert_eq!(project.call(&comp, "doubled", vec![items]).repr(), "[2, 4, 6]");
    assert_eq!(project.call(&comp, "evens", vec![Value::Int(6)]).repr(), "[0, 2, 4]");
}

#[test]
fn rewritten_modules_import_each_other() {
    let mut project = Project::new(&[
        (
            "lib/ops.tm",
            "from __transformers__ import ellipsis_partial\n\
             def scale(k, x):\n    return k * x\ntriple = scale(3, ...)\n",
        ),
        (
            "main.tm",
            "from __transformers__ import ellipsis_partial\n\
             from lib.ops import triple\nout = list(map(triple(...), [1, 2]))\n",
        ),
    ]);
    let main = project.import("main");
    assert_eq!(main.get("out").unwrap().repr(), "[3, 6]");
    assert!(project.rt.is_loaded("lib.ops"));
}

#[test]
fn scripts_run_with_the_hook_installed() {
    let mut project = Project::new(&[(
        "script.tm",
        "from __transformers__ import ellipsis_partial\n\
         shout = print(..., end='!\\n')\nshout(__name__)\n",
    )]);
    let out = project.rt.capture_output();
    project.rt.run_module("script").unwrap();
    assert_eq!(out.borrow().as_str(), "__main__!\n");
}

#[test]
fn teardown_uninstalls_the_hook() {
    let mut project = Project::new(&[
        ("before.tm", "from __transformers__ import ellipsis_partial\nf = str(...)\n"),
        ("after.tm", "from __transformers__ import ellipsis_partial\nf = str(...)\n"),
    ]);
    project.import("before");
    project.teardown();
    assert_eq!(project.rt.finder_count(), 1);

    // Cached modules survive; new loads see the placeholder untransformed.
    assert!(project.rt.is_loaded("before"));
    assert!(project.dir.path().join("after.tm").is_file());
    let err = project.rt.import_module("after").err().unwrap();
    assert_eq!(err.kind, ErrorKind::ImportError);
    let compile_err = err.find_cause::<CompileError>().unwrap();
    assert_eq!(compile_err.kind, CompileErrorKind::UnsupportedPlaceholder);
}
