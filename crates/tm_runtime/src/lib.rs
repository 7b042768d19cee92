//! Compilation, execution and module resolution for transmod.
//!
//! [`compile`] validates a parsed tree and yields a [`CodeUnit`]; a
//! [`Runtime`] executes code units and resolves `import` statements through
//! an ordered chain of [`Finder`]s. Finders return a [`ModuleSpec`] naming
//! the [`Loader`] that turns the module's source into code, which is the
//! seam load-time rewriting hooks into.

mod builtins;
pub mod compile;
mod error;
pub mod import;
mod interp;
mod ops;
mod runtime;
pub mod value;

pub use compile::{compile, CodeUnit, CompileError, CompileErrorKind};
pub use error::{ErrorKind, ExecError, ExecResult};
pub use import::{Finder, FinderId, Loader, ModuleSpec, PathFinder, SourceLoader, SOURCE_EXTENSION};
pub use interp::MAX_CALL_DEPTH;
pub use runtime::{Output, Runtime};
pub use value::{ModuleObject, Value};
