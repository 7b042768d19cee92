use swc_common::{sync::Lrc, FileName, SourceMap};
use tm_ast::Module;

use crate::{parser::Parser, ParseError};

/// Result of parsing a standalone source file.
pub struct ParseResult {
    pub module: Module,
    pub source_map: Lrc<SourceMap>,
}

/// Parse `source` into a fresh source map.
pub fn parse_module(source: &str, filename: &str) -> Result<ParseResult, ParseError> {
    let source_map: Lrc<SourceMap> = Default::default();
    let module = parse_source(&source_map, source, filename)?;
    Ok(ParseResult { module, source_map })
}

/// Register `source` in `source_map` under `filename` and parse it.
pub fn parse_source(
    source_map: &Lrc<SourceMap>,
    source: &str,
    filename: &str,
) -> Result<Module, ParseError> {
    let source_file = source_map.new_source_file(
        Lrc::new(FileName::Real(filename.into())),
        source.to_string(),
    );

    let tokens = tm_lexer::tokenize(source, source_file.start_pos)
        .map_err(|e| ParseError::locate(source_map, filename, e.message, e.span))?;

    Parser::new(tokens, source_file.start_pos)
        .parse_module()
        .map_err(|e| ParseError::locate(source_map, filename, e.message, e.span))
}
