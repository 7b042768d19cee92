//! Parse → discover → transform → compile, with fallback.

use std::rc::Rc;

use anyhow::Result;
use indexmap::{IndexMap, IndexSet};
use log::{debug, warn};
use swc_common::{sync::Lrc, SourceMap};
use tm_ast::Module;
use tm_parser::parse_source;
use tm_runtime::{compile, CodeUnit, Runtime, Value};
use tm_transform::{discover, Transformer, TransformerNotFound, TransformerRegistry};

use crate::config::PipelineConfig;
use crate::hook::{PipelineHandle, RewriteFinder};

/// The rewriting pipeline: which namespace selects transformers and which
/// transformers exist.
#[derive(Debug, Default)]
pub struct Pipeline {
    config: PipelineConfig,
    registry: TransformerRegistry,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, registry: TransformerRegistry) -> Self {
        Self { config, registry }
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        Self::new(config, TransformerRegistry::with_defaults())
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn registry(&self) -> &TransformerRegistry {
        &self.registry
    }

    /// Strip the selection declarations of `module` and return the names
    /// they select.
    pub fn discover(&self, module: &mut Module) -> IndexSet<String> {
        discover(module, &self.config.namespace, &self.config.reserved)
    }

    /// Rewrite `module` with every transformer it selects, in selection
    /// order.
    ///
    /// Every selected transformer is instantiated before the first one runs,
    /// so an unknown name fails the whole module without touching the tree.
    pub fn transform(&self, mut module: Module) -> Result<Module, TransformerNotFound> {
        let selected = self.discover(&mut module);
        let mut transformers = selected
            .iter()
            .map(|name| self.registry.instantiate(name))
            .collect::<Result<Vec<Box<dyn Transformer>>, _>>()?;
        for transformer in &mut transformers {
            debug!("applying transformer `{}`", transformer.name());
            transformer.visit(&mut module);
        }
        Ok(module)
    }

    /// Parse `source` and rewrite it. Used to inspect the transformed tree.
    pub fn transform_source(
        &self,
        source_map: &Lrc<SourceMap>,
        source: &str,
        filename: &str,
    ) -> Result<Module> {
        let module = parse_source(source_map, source, filename)?;
        Ok(self.transform(module)?)
    }

    /// Compile `source` the way the import hook does.
    ///
    /// Parse errors and unknown transformers are fatal. When the rewritten
    /// tree fails to compile and fallback is enabled, the original text is
    /// compiled instead.
    pub fn source_to_code(
        &self,
        source_map: &Lrc<SourceMap>,
        source: &str,
        filename: &str,
    ) -> Result<CodeUnit> {
        let module = self.transform_source(source_map, source, filename)?;
        match compile(module, filename) {
            Ok(code) => Ok(code),
            Err(err) if self.config.fallback => {
                warn!("{err}; compiling {filename} without transformers");
                let original = parse_source(source_map, source, filename)?;
                Ok(compile(original, filename)?)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Install the pipeline into `rt`: its finder goes first in the chain
    /// and its namespace becomes importable.
    pub fn setup(self, rt: &mut Runtime) -> PipelineHandle {
        let pipeline = Rc::new(self);
        let namespace = pipeline.config.namespace.clone();
        rt.register_builtin_module(&namespace, pipeline.namespace_values());
        let finder = rt.prepend_finder(Rc::new(RewriteFinder::new(pipeline.clone())));
        debug!("pipeline installed for namespace `{namespace}`");
        PipelineHandle::new(finder, namespace, pipeline)
    }

    /// Values of the namespace module: the reserved names and every
    /// registered transformer, each bound to its own name.
    fn namespace_values(&self) -> IndexMap<String, Value> {
        self.config
            .reserved
            .iter()
            .cloned()
            .chain(self.registry.names())
            .map(|name| {
                let value = Value::str(&name);
                (name, value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use tm_ast::{PassStmt, Stmt, DUMMY_SP};
    use tm_parser::ParseError;
    use tm_runtime::{CompileError, CompileErrorKind};

    /// Counts its visits and leaves the tree alone.
    struct Counting(Rc<Cell<usize>>);

    impl Transformer for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn visit(&mut self, _: &mut Module) {
            self.0.set(self.0.get() + 1);
        }
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

    fn pipeline(config: PipelineConfig, visits: &Rc<Cell<usize>>) -> Pipeline {
        let mut registry = TransformerRegistry::with_defaults();
        let visits = visits.clone();
        registry.register("counting", move || Box::new(Counting(visits.clone())));
        registry.register("unlocated", || Box::new(Unlocated));
        Pipeline::new(config, registry)
    }

    fn source_to_code(pipeline: &Pipeline, source: &str) -> Result<CodeUnit> {
        let cm: Lrc<SourceMap> = Default::default();
        pipeline.source_to_code(&cm, source, "pipeline.tm")
    }

    #[test]
    fn selected_transformers_run_once_each() {
        let visits = Rc::new(Cell::new(0));
        let pipeline = pipeline(PipelineConfig::default(), &visits);
        let code = source_to_code(
            &pipeline,
            "from __transformers__ import counting, ellipsis_partial\n\
             from __transformers__ import counting\nf = g(...)\n",
        )
        .unwrap();
        assert_eq!(visits.get(), 1);
        assert_eq!(code.module.body.len(), 1);
    }

    #[test]
    fn unknown_transformer_fails_before_any_runs() {
        let visits = Rc::new(Cell::new(0));
        let pipeline = pipeline(PipelineConfig::default(), &visits);
        let err = source_to_code(
            &pipeline,
            "from __transformers__ import counting, does_not_exist\nx = 1\n",
        )
        .unwrap_err();
        let not_found = err.downcast_ref::<TransformerNotFound>().unwrap();
        assert_eq!(not_found.name, "does_not_exist");
        assert_eq!(visits.get(), 0);
    }

    #[test]
    fn uncompilable_rewrite_falls_back_to_the_original() {
        let visits = Rc::new(Cell::new(0));
        let pipeline = pipeline(PipelineConfig::default(), &visits);
        let code = source_to_code(
            &pipeline,
            "from __transformers__ import unlocated\nx = 1\n",
        )
        .unwrap();
        // The fallback keeps the declaration; the namespace module resolves it.
        assert_eq!(code.module.body.len(), 2);
        assert_eq!(code.module.body[0].kind(), "ImportFrom");
    }

    #[test]
    fn fallback_can_be_disabled() {
        let visits = Rc::new(Cell::new(0));
        let config = PipelineConfig {
            fallback: false,
            ..PipelineConfig::default()
        };
        let pipeline = pipeline(config, &visits);
        let err = source_to_code(&pipeline, "from __transformers__ import unlocated\nx = 1\n")
            .unwrap_err();
        let compile_err = err.downcast_ref::<CompileError>().unwrap();
        assert_eq!(compile_err.kind, CompileErrorKind::MissingLocation);
    }

    #[test]
    fn parse_errors_are_fatal() {
        let pipeline = Pipeline::default();
        let err = source_to_code(&pipeline, "x = (1,\n").unwrap_err();
        assert!(err.downcast_ref::<ParseError>().is_some());
    }

    #[test]
    fn unused_placeholder_is_a_compile_error_without_the_transformer() {
        let pipeline = Pipeline::default();
        let err = source_to_code(&pipeline, "f = g(...)\n").unwrap_err();
        let compile_err = err.downcast_ref::<CompileError>().unwrap();
        assert_eq!(compile_err.kind, CompileErrorKind::UnsupportedPlaceholder);
    }

    #[test]
    fn custom_namespace() {
        let config = PipelineConfig {
            namespace: "__rewrite__".into(),
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::with_config(config);
        let cm: Lrc<SourceMap> = Default::default();
        let module = pipeline
            .transform_source(
                &cm,
                "from __rewrite__ import ellipsis_partial\nfrom __transformers__ import x\n",
                "ns.tm",
            )
            .unwrap();
        assert_eq!(module.body.len(), 1);
    }
}
