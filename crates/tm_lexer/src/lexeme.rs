//! Raw lexemes produced by `logos`.

use logos::{Lexer, Logos};

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\x0c]+")]
#[logos(skip r"#[^\r\n]*")]
#[logos(skip r"\\\r?\n")]
pub enum Lexeme {
    #[regex(r"\r?\n")]
    Newline,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
    #[regex(r"[0-9][0-9_]*", parse_int)]
    Int(i64),
    #[regex(r"[0-9][0-9_]*\.[0-9_]*([eE][+-]?[0-9]+)?", parse_float)]
    #[regex(r"\.[0-9][0-9_]*([eE][+-]?[0-9]+)?", parse_float)]
    #[regex(r"[0-9][0-9_]*[eE][+-]?[0-9]+", parse_float)]
    Float(f64),
    #[regex(r#""([^"\\\r\n]|\\.)*""#, unescape)]
    #[regex(r#"'([^'\\\r\n]|\\.)*'"#, unescape)]
    Str(String),

    // Keywords
    #[token("def")]
    Def,
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("not")]
    Not,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("is")]
    Is,
    #[token("lambda")]
    Lambda,
    #[token("pass")]
    Pass,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("import")]
    Import,
    #[token("from")]
    From,
    #[token("as")]
    As,
    #[token("assert")]
    Assert,
    #[token("True")]
    True,
    #[token("False")]
    False,
    #[token("None")]
    None,

    // Operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("//")]
    DoubleSlash,
    #[token("%")]
    Percent,
    #[token("**")]
    DoubleStar,
    #[token("<<")]
    LShift,
    #[token(">>")]
    RShift,
    #[token("&")]
    Amper,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    LtE,
    #[token(">=")]
    GtE,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("=")]
    Assign,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    StarAssign,
    #[token("/=")]
    SlashAssign,
    #[token("//=")]
    DoubleSlashAssign,
    #[token("%=")]
    PercentAssign,

    // Delimiters
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token(".")]
    Dot,
    #[token("...")]
    Ellipsis,
}

fn parse_int(lex: &mut Lexer<Lexeme>) -> Option<i64> {
    lex.slice().replace('_', "").parse().ok()
}

fn parse_float(lex: &mut Lexer<Lexeme>) -> Option<f64> {
    lex.slice().replace('_', "").parse().ok()
}

fn unescape(lex: &mut Lexer<Lexeme>) -> Option<String> {
    let raw = lex.slice();
    let body = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Some(out)
}

impl Lexeme {
    /// Source text of fixed-spelling lexemes, for error messages.
    pub fn describe(&self) -> String {
        match self {
            Lexeme::Newline => "newline".into(),
            Lexeme::Ident(name) => format!("identifier `{name}`"),
            Lexeme::Int(v) => format!("integer `{v}`"),
            Lexeme::Float(v) => format!("float `{v}`"),
            Lexeme::Str(s) => format!("string {s:?}"),
            other => format!("`{}`", other.text()),
        }
    }

    fn text(&self) -> &'static str {
        match self {
            Lexeme::Def => "def",
            Lexeme::Return => "return",
            Lexeme::If => "if",
            Lexeme::Elif => "elif",
            Lexeme::Else => "else",
            Lexeme::While => "while",
            Lexeme::For => "for",
            Lexeme::In => "in",
            Lexeme::Not => "not",
            Lexeme::And => "and",
            Lexeme::Or => "or",
            Lexeme::Is => "is",
            Lexeme::Lambda => "lambda",
            Lexeme::Pass => "pass",
            Lexeme::Break => "break",
            Lexeme::Continue => "continue",
            Lexeme::Import => "import",
            Lexeme::From => "from",
            Lexeme::As => "as",
            Lexeme::Assert => "assert",
            Lexeme::True => "True",
            Lexeme::False => "False",
            Lexeme::None => "None",
            Lexeme::Plus => "+",
            Lexeme::Minus => "-",
            Lexeme::Star => "*",
            Lexeme::Slash => "/",
            Lexeme::DoubleSlash => "//",
            Lexeme::Percent => "%",
            Lexeme::DoubleStar => "**",
            Lexeme::LShift => "<<",
            Lexeme::RShift => ">>",
            Lexeme::Amper => "&",
            Lexeme::Pipe => "|",
            Lexeme::Caret => "^",
            Lexeme::Tilde => "~",
            Lexeme::Lt => "<",
            Lexeme::Gt => ">",
            Lexeme::LtE => "<=",
            Lexeme::GtE => ">=",
            Lexeme::EqEq => "==",
            Lexeme::NotEq => "!=",
            Lexeme::Assign => "=",
            Lexeme::PlusAssign => "+=",
            Lexeme::MinusAssign => "-=",
            Lexeme::StarAssign => "*=",
            Lexeme::SlashAssign => "/=",
            Lexeme::DoubleSlashAssign => "//=",
            Lexeme::PercentAssign => "%=",
            Lexeme::LParen => "(",
            Lexeme::RParen => ")",
            Lexeme::LBracket => "[",
            Lexeme::RBracket => "]",
            Lexeme::LBrace => "{",
            Lexeme::RBrace => "}",
            Lexeme::Comma => ",",
            Lexeme::Colon => ":",
            Lexeme::Semicolon => ";",
            Lexeme::Dot => ".",
            Lexeme::Ellipsis => "...",
            Lexeme::Newline
            | Lexeme::Ident(_)
            | Lexeme::Int(_)
            | Lexeme::Float(_)
            | Lexeme::Str(_) => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Lexeme> {
        Lexeme::lexer(source).map(|r| r.unwrap()).collect()
    }

    #[test]
    fn keywords_win_over_identifiers() {
        assert_eq!(
            lex("def define"),
            vec![Lexeme::Def, Lexeme::Ident("define".into())]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            lex("1_000 2.5 .5 1e3"),
            vec![
                Lexeme::Int(1000),
                Lexeme::Float(2.5),
                Lexeme::Float(0.5),
                Lexeme::Float(1000.0)
            ]
        );
    }

    #[test]
    fn strings_are_unescaped() {
        assert_eq!(
            lex(r#""a\"b\n" 'c'"#),
            vec![Lexeme::Str("a\"b\n".into()), Lexeme::Str("c".into())]
        );
    }

    #[test]
    fn comments_and_continuations_are_skipped() {
        assert_eq!(
            lex("a \\\n + b # trailing"),
            vec![
                Lexeme::Ident("a".into()),
                Lexeme::Plus,
                Lexeme::Ident("b".into())
            ]
        );
    }

    #[test]
    fn compound_operators() {
        assert_eq!(
            lex("//= ** ... != <="),
            vec![
                Lexeme::DoubleSlashAssign,
                Lexeme::DoubleStar,
                Lexeme::Ellipsis,
                Lexeme::NotEq,
                Lexeme::LtE
            ]
        );
    }
}
