//! Module resolution.
//!
//! A [`Finder`] maps a dotted module name to a [`ModuleSpec`]; the spec's
//! [`Loader`] reads the source and turns it into a [`CodeUnit`]. The runtime
//! asks its finders in order and uses the first spec returned, so a finder
//! prepended to the chain can take over loading for every module the default
//! [`PathFinder`] would find.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Context;
use swc_common::{sync::Lrc, SourceMap};
use tm_parser::parse_source;

use crate::compile::{compile, CodeUnit};

/// Default module file extension.
pub const SOURCE_EXTENSION: &str = "tm";

/// Turns module source into executable code.
pub trait Loader {
    /// Read the source text at `origin`.
    fn get_source(&self, origin: &Path) -> anyhow::Result<String> {
        fs::read_to_string(origin).with_context(|| format!("failed to read {}", origin.display()))
    }

    /// Parse and compile `source`. Spans are registered in `source_map`.
    fn source_to_code(
        &self,
        source_map: &Lrc<SourceMap>,
        source: &str,
        origin: &Path,
    ) -> anyhow::Result<CodeUnit>;
}

/// Locates modules by name.
pub trait Finder {
    fn find_spec(&self, name: &str, search_paths: &[PathBuf]) -> Option<ModuleSpec>;
}

/// Where a module lives and how to load it.
#[derive(Clone)]
pub struct ModuleSpec {
    pub name: String,
    pub origin: PathBuf,
    pub loader: Rc<dyn Loader>,
}

impl fmt::Debug for ModuleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleSpec")
            .field("name", &self.name)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Handle for a finder installed in a runtime, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FinderId(pub(crate) u64);

/// Resolves `a.b` to `<search path>/a/b.<extension>`.
#[derive(Debug, Clone)]
pub struct PathFinder {
    extension: String,
}

impl PathFinder {
    pub fn new() -> Self {
        Self::with_extension(SOURCE_EXTENSION)
    }

    pub fn with_extension(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    /// First file in `search_paths` that holds module `name`.
    pub fn locate(&self, name: &str, search_paths: &[PathBuf]) -> Option<PathBuf> {
        let segments: Vec<&str> = name.split('.').collect();
        if segments.iter().any(|segment| !is_identifier(segment)) {
            return None;
        }
        let mut relative: PathBuf = segments.iter().collect();
        relative.set_extension(&self.extension);
        search_paths
            .iter()
            .map(|dir| dir.join(&relative))
            .find(|candidate| candidate.is_file())
    }
}

impl Default for PathFinder {
    fn default() -> Self {
        Self::new()
    }
}

impl Finder for PathFinder {
    fn find_spec(&self, name: &str, search_paths: &[PathBuf]) -> Option<ModuleSpec> {
        let origin = self.locate(name, search_paths)?;
        Some(ModuleSpec {
            name: name.to_string(),
            origin,
            loader: Rc::new(SourceLoader),
        })
    }
}

/// Parses and compiles source as written, with no rewriting.
#[derive(Debug, Default, Clone, Copy)]
pub struct SourceLoader;

impl Loader for SourceLoader {
    fn source_to_code(
        &self,
        source_map: &Lrc<SourceMap>,
        source: &str,
        origin: &Path,
    ) -> anyhow::Result<CodeUnit> {
        let filename = origin.display().to_string();
        let module = parse_source(source_map, source, &filename)?;
        Ok(compile(module, &filename)?)
    }
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_alphabetic())
        && chars.all(|c| c == '_' || c.is_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_finder_maps_dotted_names_to_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("pkg")).unwrap();
        fs::write(dir.path().join("pkg").join("util.tm"), "x = 1\n").unwrap();
        fs::write(dir.path().join("top.tm"), "y = 2\n").unwrap();

        let finder = PathFinder::new();
        let paths = vec![PathBuf::from("/nonexistent"), dir.path().to_path_buf()];
        let spec = finder.find_spec("pkg.util", &paths).unwrap();
        assert_eq!(spec.origin, dir.path().join("pkg").join("util.tm"));
        assert_eq!(spec.name, "pkg.util");
        assert!(finder.find_spec("top", &paths).is_some());
        assert!(finder.find_spec("missing", &paths).is_none());
        assert!(finder.find_spec("../top", &paths).is_none());
    }

    #[test]
    fn extension_is_configurable() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("mod.tmx"), "x = 1\n").unwrap();
        let paths = vec![dir.path().to_path_buf()];
        assert!(PathFinder::new().locate("mod", &paths).is_none());
        assert!(PathFinder::with_extension("tmx").locate("mod", &paths).is_some());
    }

    #[test]
    fn source_loader_reports_parse_and_compile_errors() {
        let cm: Lrc<SourceMap> = Default::default();
        let origin = Path::new("bad.tm");
        let parse_err = SourceLoader
            .source_to_code(&cm, "x = (\n", origin)
            .err()
            .unwrap();
        assert!(parse_err.downcast_ref::<tm_parser::ParseError>().is_some());

        let compile_err = SourceLoader
            .source_to_code(&cm, "return 1\n", origin)
            .err()
            .unwrap();
        assert!(compile_err
            .downcast_ref::<crate::compile::CompileError>()
            .is_some());
    }
}
