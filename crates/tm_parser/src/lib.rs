//! Parser for transmod modules.
//!
//! Source text is registered in a `swc_common::SourceMap`, tokenized by
//! `tm_lexer` and parsed by a hand-written recursive-descent parser into a
//! `tm_ast::Module`. Files parsed into the same source map get disjoint
//! spans, so a single map can resolve locations for every loaded module.

mod error;
pub mod parse;
mod parser;

pub use error::ParseError;
pub use parse::{parse_module, parse_source, ParseResult};
