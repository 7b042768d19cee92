//! Tree-to-tree transformers and the machinery that selects them.
//!
//! A module opts into rewriting with a selection declaration:
//!
//! ```text
//! from __transformers__ import ellipsis_partial
//! ```
//!
//! [`discover`] strips those declarations and returns the requested names,
//! [`TransformerRegistry`] turns each name into a fresh [`Transformer`], and
//! the transformer rewrites the tree in place.

pub mod discover;
pub mod ellipsis_partial;
pub mod registry;

pub use discover::discover;
pub use ellipsis_partial::EllipsisPartial;
pub use registry::{TransformerNotFound, TransformerRegistry};

use tm_ast::Module;

/// An AST-to-AST rewrite.
///
/// Instances are created per module load, so any state a transformer keeps
/// (counters, caches) is scoped to one tree.
pub trait Transformer {
    /// Name used in selection declarations.
    fn name(&self) -> &str;

    /// Rewrite `module` in place.
    fn visit(&mut self, module: &mut Module);
}
