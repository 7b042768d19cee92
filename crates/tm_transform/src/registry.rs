//! Name → transformer factory lookup.

use std::fmt;

use indexmap::IndexMap;

use crate::{EllipsisPartial, Transformer};

type Factory = Box<dyn Fn() -> Box<dyn Transformer>>;

/// A selection declaration named a transformer nobody registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformerNotFound {
    pub name: String,
}

impl fmt::Display for TransformerNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transformer not found: `{}`", self.name)
    }
}

impl std::error::Error for TransformerNotFound {}

/// Registry of transformer factories, keyed by selection name.
pub struct TransformerRegistry {
    factories: IndexMap<String, Factory>,
}

impl TransformerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        TransformerRegistry {
            factories: IndexMap::new(),
        }
    }

    /// Register a factory under `name`.
    ///
    /// If a transformer with the same name already exists, it will be replaced.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Transformer> + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Check if a transformer exists.
    pub fn has(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Build a fresh instance of the transformer registered as `name`.
    pub fn instantiate(&self, name: &str) -> Result<Box<dyn Transformer>, TransformerNotFound> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| TransformerNotFound {
                name: name.to_string(),
            })
    }

    /// List all registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Create a registry with the built-in transformers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(EllipsisPartial::NAME, || Box::new(EllipsisPartial::new()));
        registry
    }
}

impl Default for TransformerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for TransformerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformerRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tm_ast::Module;

    struct Noop;

    impl Transformer for Noop {
        fn name(&self) -> &str {
            "noop"
        }

        fn visit(&mut self, _module: &mut Module) {}
    }

    #[test]
    fn defaults_include_ellipsis_partial() {
        let registry = TransformerRegistry::default();
        assert!(registry.has("ellipsis_partial"));
        assert_eq!(registry.names(), vec!["ellipsis_partial"]);
    }

    #[test]
    fn unknown_name_is_an_error() {
        let registry = TransformerRegistry::with_defaults();
        let err = registry.instantiate("does_not_exist").err().unwrap();
        assert_eq!(err.name, "does_not_exist");
        assert_eq!(err.to_string(), "transformer not found: `does_not_exist`");
    }

    #[test]
    fn register_replaces_and_lists_sorted() {
        let mut registry = TransformerRegistry::new();
        registry.register("zeta", || Box::new(Noop));
        registry.register("alpha", || Box::new(Noop));
        registry.register("zeta", || Box::new(Noop));
        assert_eq!(registry.names(), vec!["alpha", "zeta"]);
        assert_eq!(registry.instantiate("alpha").unwrap().name(), "noop");
    }
}
