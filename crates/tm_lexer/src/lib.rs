//! Lexer for transmod modules.
//!
//! Lexing happens in two stages:
//!
//! 1. [`Lexeme`] is derived with `logos` and splits the text into raw
//!    lexemes (whitespace, comments and backslash line continuations are
//!    skipped, physical newlines are kept).
//! 2. [`tokenize`] post-processes the lexeme stream into layout-aware
//!    [`Token`]s: newlines inside brackets and on blank lines are dropped,
//!    and changes of indentation at the start of a logical line become
//!    `Indent` / `Dedent` tokens.

mod lexeme;

pub use lexeme::Lexeme;

use logos::Logos;
use swc_common::{BytePos, Span};

/// A token as seen by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Any lexeme other than a physical newline.
    Lexeme(Lexeme),
    /// End of a logical line.
    Newline,
    Indent,
    Dedent,
    Eof,
}

/// A token with its source span.
#[derive(Debug, Clone)]
pub struct TokenAndSpan {
    pub token: Token,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for LexError {}

/// Tokenize `source`, whose first byte sits at `start` in the source map.
pub fn tokenize(source: &str, start: BytePos) -> Result<Vec<TokenAndSpan>, LexError> {
    let span_of = |range: std::ops::Range<usize>| {
        Span::new(
            BytePos(start.0 + range.start as u32),
            BytePos(start.0 + range.end as u32),
        )
    };

    let mut tokens = Vec::new();
    let mut indents: Vec<usize> = vec![0];
    let mut depth: usize = 0;
    let mut at_line_start = true;

    for (lexeme, range) in Lexeme::lexer(source).spanned() {
        let span = span_of(range.clone());
        let lexeme = lexeme.map_err(|()| LexError {
            message: format!("unexpected character {:?}", &source[range.clone()]),
            span,
        })?;

        if lexeme == Lexeme::Newline {
            if depth == 0 && !at_line_start {
                tokens.push(TokenAndSpan {
                    token: Token::Newline,
                    span,
                });
                at_line_start = true;
            }
            continue;
        }

        if at_line_start {
            let column = indent_column(source, range.start);
            let current = indents.last().copied().unwrap_or(0);
            if column > current {
                indents.push(column);
                tokens.push(TokenAndSpan {
                    token: Token::Indent,
                    span,
                });
            } else {
                while column < indents.last().copied().unwrap_or(0) {
                    indents.pop();
                    tokens.push(TokenAndSpan {
                        token: Token::Dedent,
                        span,
                    });
                }
                if column != indents.last().copied().unwrap_or(0) {
                    return Err(LexError {
                        message: "unindent does not match any outer indentation level".into(),
                        span,
                    });
                }
            }
            at_line_start = false;
        }

        match lexeme {
            Lexeme::LParen | Lexeme::LBracket | Lexeme::LBrace => depth += 1,
            Lexeme::RParen | Lexeme::RBracket | Lexeme::RBrace => {
                depth = depth.saturating_sub(1)
            }
            _ => {}
        }

        tokens.push(TokenAndSpan {
            token: Token::Lexeme(lexeme),
            span,
        });
    }

    let end = span_of(source.len()..source.len());
    if !at_line_start {
        tokens.push(TokenAndSpan {
            token: Token::Newline,
            span: end,
        });
    }
    while indents.len() > 1 {
        indents.pop();
        tokens.push(TokenAndSpan {
            token: Token::Dedent,
            span: end,
        });
    }
    tokens.push(TokenAndSpan {
        token: Token::Eof,
        span: end,
    });

    Ok(tokens)
}

/// Visual column of the token starting at byte `offset`; tabs advance to the
/// next multiple of eight.
fn indent_column(source: &str, offset: usize) -> usize {
    let line_start = source[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    source[line_start..offset].chars().fold(0, |col, c| match c {
        '\t' => (col / 8 + 1) * 8,
        '\x0c' => 0,
        _ => col + 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source, BytePos(1))
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    fn ident(s: &str) -> Token {
        Token::Lexeme(Lexeme::Ident(s.into()))
    }

    #[test]
    fn blocks_produce_indent_and_dedent() {
        let tokens = kinds("if x:\n    y\nz\n");
        assert_eq!(
            tokens,
            vec![
                Token::Lexeme(Lexeme::If),
                ident("x"),
                Token::Lexeme(Lexeme::Colon),
                Token::Newline,
                Token::Indent,
                ident("y"),
                Token::Newline,
                Token::Dedent,
                ident("z"),
                Token::Newline,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn newlines_inside_brackets_are_joined() {
        let tokens = kinds("f(1,\n  2)\n");
        assert!(!tokens[..tokens.len() - 2].contains(&Token::Newline));
        assert_eq!(tokens[tokens.len() - 2], Token::Newline);
    }

    #[test]
    fn blank_and_comment_lines_are_ignored() {
        let tokens = kinds("a\n\n   # note\nb");
        assert_eq!(
            tokens,
            vec![
                ident("a"),
                Token::Newline,
                ident("b"),
                Token::Newline,
                Token::Eof
            ]
        );
    }

    #[test]
    fn dedents_are_closed_at_end_of_input() {
        let tokens = kinds("def f():\n    if x:\n        pass");
        let dedents = tokens.iter().filter(|t| **t == Token::Dedent).count();
        assert_eq!(dedents, 2);
        assert_eq!(tokens.last(), Some(&Token::Eof));
    }

    #[test]
    fn inconsistent_dedent_is_an_error() {
        let err = tokenize("if x:\n    y\n  z\n", BytePos(1)).unwrap_err();
        assert!(err.message.contains("unindent"), "{err}");
    }

    #[test]
    fn ellipsis_is_a_single_lexeme() {
        let tokens = kinds("f(1, ...)");
        assert!(tokens.contains(&Token::Lexeme(Lexeme::Ellipsis)));
        assert!(!tokens.contains(&Token::Lexeme(Lexeme::Dot)));
    }

    #[test]
    fn spans_are_offset_by_file_start() {
        let tokens = tokenize("ab cd", BytePos(10)).unwrap();
        assert_eq!(tokens[1].span, Span::new(BytePos(13), BytePos(15)));
    }

    #[test]
    fn unknown_character_is_reported() {
        let err = tokenize("a = $", BytePos(1)).unwrap_err();
        assert!(err.message.contains('$'), "{err}");
    }
}
