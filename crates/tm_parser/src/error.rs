use swc_common::{SourceMap, Span};

/// A syntax error, located by file, line and column.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub filename: String,
    /// 1-based.
    pub line: usize,
    /// 1-based.
    pub column: usize,
    pub span: Span,
}

impl ParseError {
    pub(crate) fn locate(source_map: &SourceMap, filename: &str, message: String, span: Span) -> Self {
        let loc = source_map.lookup_char_pos(span.lo);
        Self {
            message,
            filename: filename.to_string(),
            line: loc.line,
            column: loc.col.0 + 1,
            span,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.filename, self.line, self.column, self.message
        )
    }
}

impl std::error::Error for ParseError {}
