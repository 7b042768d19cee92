//! The import hook: a finder that hands located modules to the pipeline.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::debug;
use swc_common::{sync::Lrc, SourceMap};
use tm_runtime::{CodeUnit, Finder, FinderId, Loader, ModuleSpec, PathFinder, Runtime};

use crate::pipeline::Pipeline;

/// Locates modules like the default [`PathFinder`] but loads them through a
/// [`Pipeline`].
pub struct RewriteFinder {
    paths: PathFinder,
    pipeline: Rc<Pipeline>,
}

impl RewriteFinder {
    pub fn new(pipeline: Rc<Pipeline>) -> Self {
        Self {
            paths: PathFinder::with_extension(&pipeline.config().extension),
            pipeline,
        }
    }
}

impl Finder for RewriteFinder {
    fn find_spec(&self, name: &str, search_paths: &[PathBuf]) -> Option<ModuleSpec> {
        let mut spec = self.paths.find_spec(name, search_paths)?;
        debug!("rewriting '{name}' from {}", spec.origin.display());
        spec.loader = Rc::new(RewriteLoader::new(self.pipeline.clone()));
        Some(spec)
    }
}

/// Loader that compiles a module's rewritten tree.
pub struct RewriteLoader {
    pipeline: Rc<Pipeline>,
}

impl RewriteLoader {
    pub fn new(pipeline: Rc<Pipeline>) -> Self {
        Self { pipeline }
    }
}

impl Loader for RewriteLoader {
    fn source_to_code(
        &self,
        source_map: &Lrc<SourceMap>,
        source: &str,
        origin: &Path,
    ) -> anyhow::Result<CodeUnit> {
        self.pipeline
            .source_to_code(source_map, source, &origin.display().to_string())
    }
}

/// An installed pipeline. Dropping the handle leaves the hook installed;
/// call [`teardown`](Self::teardown) to remove it.
#[must_use = "the handle is needed to uninstall the pipeline"]
#[derive(Debug)]
pub struct PipelineHandle {
    finder: FinderId,
    namespace: String,
    pipeline: Rc<Pipeline>,
}

impl PipelineHandle {
    pub(crate) fn new(finder: FinderId, namespace: String, pipeline: Rc<Pipeline>) -> Self {
        Self {
            finder,
            namespace,
            pipeline,
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// A loader that rewrites with this pipeline, for sources that do not
    /// come through the finder chain.
    pub fn loader(&self) -> RewriteLoader {
        RewriteLoader::new(self.pipeline.clone())
    }

    /// Remove the finder and the namespace module from `rt`. Modules already
    /// loaded stay cached.
    pub fn teardown(self, rt: &mut Runtime) {
        let finder_removed = rt.remove_finder(self.finder);
        let module_removed = rt.remove_builtin_module(&self.namespace);
        debug!(
            "pipeline for `{}` removed (finder: {finder_removed}, module: {module_removed})",
            self.namespace
        );
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use tm_runtime::{ErrorKind, Value};

    fn write(dir: &Path, name: &str, source: &str) {
        fs::write(dir.join(name), source).unwrap();
    }

    #[test]
    fn installed_hook_rewrites_imports() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "partial.tm",
            "from __transformers__ import ellipsis_partial\n\
             def add(a, b):\n    return a + b\nadd_one = add(1, ...)\n",
        );
        let mut rt = Runtime::new();
        rt.add_search_path(dir.path());
        let handle = Pipeline::default().setup(&mut rt);
        assert_eq!(rt.finder_count(), 2);

        let module = rt.import_module("partial").unwrap();
        let add_one = module.get("add_one").unwrap();
        let result = rt.call(&add_one, vec![Value::Int(2)]).unwrap();
        assert_eq!(result.repr(), "3");
        handle.teardown(&mut rt);
    }

    #[test]
    fn teardown_restores_the_default_chain() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "uses.tm", "f = len(...)\n");
        write(dir.path(), "names.tm", "from __transformers__ import setup\n");
        let mut rt = Runtime::new();
        rt.add_search_path(dir.path());
        Pipeline::default().setup(&mut rt).teardown(&mut rt);
        assert_eq!(rt.finder_count(), 1);

        let err = rt.import_module("uses").err().unwrap();
        assert_eq!(err.kind, ErrorKind::ImportError);
        let err = rt.import_module("names").err().unwrap();
        assert_eq!(err.kind, ErrorKind::ModuleNotFoundError);
    }

    #[test]
    fn namespace_module_exposes_reserved_and_registered_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut rt = Runtime::new();
        rt.add_search_path(dir.path());
        let handle = Pipeline::default().setup(&mut rt);
        let namespace = rt.import_module("__transformers__").unwrap();
        let mut names = namespace.names();
        names.sort();
        assert_eq!(names, vec!["__name__", "_loader", "ellipsis_partial", "setup"]);
        assert_eq!(namespace.get("setup").unwrap().to_string(), "setup");
        handle.teardown(&mut rt);
    }

    #[test]
    fn extension_comes_from_the_config() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "m.tmx", "from __transformers__ import ellipsis_partial\nf = str(...)\n");
        let mut rt = Runtime::new();
        rt.add_search_path(dir.path());
        let config = crate::PipelineConfig {
            extension: "tmx".into(),
            ..Default::default()
        };
        let handle = Pipeline::with_config(config).setup(&mut rt);
        let module = rt.import_module("m").unwrap();
        let f = module.get("f").unwrap();
        assert_eq!(rt.call(&f, vec![Value::Int(7)]).unwrap().repr(), "'7'");
        handle.teardown(&mut rt);
    }
}
