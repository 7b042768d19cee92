//! Pipeline settings.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Module name selection declarations import from.
pub const DEFAULT_NAMESPACE: &str = "__transformers__";

/// Names in the namespace that never select a transformer.
pub const RESERVED_NAMES: [&str; 2] = ["_loader", "setup"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Namespace of selection declarations.
    pub namespace: String,
    /// Names stripped from declarations without selecting anything.
    pub reserved: Vec<String>,
    /// Compile the untransformed source when the rewritten tree does not
    /// compile.
    pub fallback: bool,
    /// Extension of the module files the hook loads.
    pub extension: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            reserved: RESERVED_NAMES.iter().map(|name| name.to_string()).collect(),
            fallback: true,
            extension: tm_runtime::SOURCE_EXTENSION.to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("invalid pipeline configuration")
    }

    /// Read a JSON configuration file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.namespace, "__transformers__");
        assert_eq!(config.reserved, vec!["_loader", "setup"]);
        assert!(config.fallback);
        assert_eq!(config.extension, "tm");
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = PipelineConfig::from_json(r#"{ "fallback": false }"#).unwrap();
        assert!(!config.fallback);
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = PipelineConfig::from_json(r#"{ "fallbck": false }"#).unwrap_err();
        assert_eq!(err.to_string(), "invalid pipeline configuration");
    }

    #[test]
    fn load_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{ "namespace": "__rewrite__" }"#).unwrap();
        assert_eq!(PipelineConfig::load(&path).unwrap().namespace, "__rewrite__");

        let missing = dir.path().join("missing.json");
        let err = PipelineConfig::load(&missing).unwrap_err();
        assert!(err.to_string().starts_with("failed to read "));
    }
}
