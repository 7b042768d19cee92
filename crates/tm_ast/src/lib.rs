//! Syntax tree for transmod modules.
//!
//! Every node owns its children (`Box` / `Vec`), so a tree has no sharing
//! and no cycles. Each node carries a [`Span`] registered in a
//! `swc_common::SourceMap`; spans are what the compiler uses to report
//! locations, so rewriting passes must keep them populated on synthesized
//! nodes.
//!
//! The node kinds form closed enumerations ([`Stmt`], [`Expr`]) and all
//! traversal goes through exhaustive matches in [`visit`].

mod expr;
mod ops;
mod stmt;
pub mod visit;

pub use expr::*;
pub use ops::*;
pub use stmt::*;
pub use swc_common::{BytePos, Span, Spanned, DUMMY_SP};

use serde::Serialize;

/// An identifier occurrence: a variable, parameter, attribute or binding name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ident {
    #[serde(skip)]
    pub span: Span,
    pub sym: String,
}

impl Ident {
    pub fn new(sym: impl Into<String>, span: Span) -> Self {
        Self {
            span,
            sym: sym.into(),
        }
    }
}

impl Spanned for Ident {
    fn span(&self) -> Span {
        self.span
    }
}

impl std::fmt::Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.sym)
    }
}

/// A parsed source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Module {
    #[serde(skip)]
    pub span: Span,
    pub body: Vec<Stmt>,
}

impl Spanned for Module {
    fn span(&self) -> Span {
        self.span
    }
}
