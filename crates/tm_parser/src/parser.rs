//! Recursive-descent parser over the layout-aware token stream.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! test        := lambda | or_test ["if" or_test "else" test]
//! or_test     := and_test ("or" and_test)*
//! and_test    := not_test ("and" not_test)*
//! not_test    := "not" not_test | comparison
//! comparison  := bitor (cmp_op bitor)*
//! bitor       := bitxor ("|" bitxor)*   ... shift, arith, term likewise
//! factor      := ("-" | "+" | "~") factor | power
//! power       := primary ["**" factor]
//! primary     := atom (call | subscript | "." NAME)*
//! ```

use swc_common::{BytePos, Span};
use tm_ast::*;
use tm_lexer::{Lexeme, Token, TokenAndSpan};

pub(crate) struct SyntaxError {
    pub message: String,
    pub span: Span,
}

type PResult<T> = Result<T, SyntaxError>;

pub(crate) struct Parser {
    tokens: Vec<TokenAndSpan>,
    pos: usize,
    start: BytePos,
    /// End of the last consumed non-layout token.
    last_hi: BytePos,
}

impl Parser {
    pub fn new(tokens: Vec<TokenAndSpan>, start: BytePos) -> Self {
        Self {
            tokens,
            pos: 0,
            start,
            last_hi: start,
        }
    }

    pub fn parse_module(mut self) -> PResult<Module> {
        let mut body = Vec::new();
        loop {
            match self.peek() {
                Token::Eof => break,
                Token::Newline => {
                    self.bump();
                }
                _ => body.extend(self.parse_statement()?),
            }
        }
        Ok(Module {
            span: Span::new(self.start, self.last_hi),
            body,
        })
    }

    // ----------------------------------------------------------------------
    // Token helpers
    // ----------------------------------------------------------------------

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> &Token {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx].token
    }

    fn current_span(&self) -> Span {
        self.tokens[self.pos.min(self.tokens.len() - 1)].span
    }

    fn lo(&self) -> BytePos {
        self.current_span().lo
    }

    fn bump(&mut self) -> TokenAndSpan {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        if matches!(tok.token, Token::Lexeme(_)) {
            self.last_hi = tok.span.hi;
        }
        tok
    }

    fn is(&self, lexeme: &Lexeme) -> bool {
        matches!(self.peek(), Token::Lexeme(l) if l == lexeme)
    }

    fn is_at(&self, n: usize, lexeme: &Lexeme) -> bool {
        matches!(self.peek_at(n), Token::Lexeme(l) if l == lexeme)
    }

    fn eat(&mut self, lexeme: &Lexeme) -> bool {
        if self.is(lexeme) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, lexeme: &Lexeme) -> PResult<Span> {
        if self.is(lexeme) {
            Ok(self.bump().span)
        } else {
            Err(self.unexpected(&lexeme.describe()))
        }
    }

    fn expect_ident(&mut self) -> PResult<Ident> {
        match self.peek().clone() {
            Token::Lexeme(Lexeme::Ident(sym)) => {
                let span = self.bump().span;
                Ok(Ident::new(sym, span))
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn expect_line_end(&mut self) -> PResult<()> {
        match self.peek() {
            Token::Newline => {
                self.bump();
                Ok(())
            }
            Token::Eof => Ok(()),
            _ => Err(self.unexpected("end of line")),
        }
    }

    fn unexpected(&self, expected: &str) -> SyntaxError {
        let found = match self.peek() {
            Token::Lexeme(l) => l.describe(),
            Token::Newline => "end of line".into(),
            Token::Indent => "indent".into(),
            Token::Dedent => "dedent".into(),
            Token::Eof => "end of file".into(),
        };
        SyntaxError {
            message: format!("expected {expected}, found {found}"),
            span: self.current_span(),
        }
    }

    fn error(&self, message: impl Into<String>, span: Span) -> SyntaxError {
        SyntaxError {
            message: message.into(),
            span,
        }
    }

    fn span_from(&self, lo: BytePos) -> Span {
        Span::new(lo, self.last_hi)
    }

    fn at_line_end(&self) -> bool {
        matches!(self.peek(), Token::Newline | Token::Eof) || self.is(&Lexeme::Semicolon)
    }

    fn can_start_expr(&self) -> bool {
        matches!(
            self.peek(),
            Token::Lexeme(
                Lexeme::Ident(_)
                    | Lexeme::Int(_)
                    | Lexeme::Float(_)
                    | Lexeme::Str(_)
                    | Lexeme::True
                    | Lexeme::False
                    | Lexeme::None
                    | Lexeme::Ellipsis
                    | Lexeme::LParen
                    | Lexeme::LBracket
                    | Lexeme::LBrace
                    | Lexeme::Minus
                    | Lexeme::Plus
                    | Lexeme::Tilde
                    | Lexeme::Not
                    | Lexeme::Lambda
            )
        )
    }

    // ----------------------------------------------------------------------
    // Statements
    // ----------------------------------------------------------------------

    fn parse_statement(&mut self) -> PResult<Vec<Stmt>> {
        match self.peek() {
            Token::Lexeme(Lexeme::Def) => Ok(vec![self.parse_def()?]),
            Token::Lexeme(Lexeme::If) => Ok(vec![self.parse_if()?]),
            Token::Lexeme(Lexeme::While) => Ok(vec![self.parse_while()?]),
            Token::Lexeme(Lexeme::For) => Ok(vec![self.parse_for()?]),
            Token::Indent => Err(self.error("unexpected indent", self.current_span())),
            Token::Dedent => Err(self.error("unexpected dedent", self.current_span())),
            _ => self.parse_simple_line(),
        }
    }

    /// One or more `;`-separated small statements terminated by a newline.
    fn parse_simple_line(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = vec![self.parse_small_statement()?];
        while self.eat(&Lexeme::Semicolon) {
            if matches!(self.peek(), Token::Newline | Token::Eof) {
                break;
            }
            stmts.push(self.parse_small_statement()?);
        }
        self.expect_line_end()?;
        Ok(stmts)
    }

    fn parse_small_statement(&mut self) -> PResult<Stmt> {
        let lo = self.lo();
        match self.peek() {
            Token::Lexeme(Lexeme::Pass) => {
                let span = self.bump().span;
                Ok(Stmt::Pass(PassStmt { span }))
            }
            Token::Lexeme(Lexeme::Break) => {
                let span = self.bump().span;
                Ok(Stmt::Break(BreakStmt { span }))
            }
            Token::Lexeme(Lexeme::Continue) => {
                let span = self.bump().span;
                Ok(Stmt::Continue(ContinueStmt { span }))
            }
            Token::Lexeme(Lexeme::Return) => {
                self.bump();
                let value = if self.at_line_end() {
                    None
                } else {
                    Some(Box::new(self.parse_testlist()?))
                };
                Ok(Stmt::Return(ReturnStmt {
                    span: self.span_from(lo),
                    value,
                }))
            }
            Token::Lexeme(Lexeme::Import) => self.parse_import(),
            Token::Lexeme(Lexeme::From) => self.parse_import_from(),
            Token::Lexeme(Lexeme::Assert) => {
                self.bump();
                let test = Box::new(self.parse_test()?);
                let msg = if self.eat(&Lexeme::Comma) {
                    Some(Box::new(self.parse_test()?))
                } else {
                    None
                };
                Ok(Stmt::Assert(AssertStmt {
                    span: self.span_from(lo),
                    test,
                    msg,
                }))
            }
            _ => self.parse_expr_statement(),
        }
    }

    fn parse_expr_statement(&mut self) -> PResult<Stmt> {
        let lo = self.lo();
        let first = self.parse_testlist()?;

        if self.is(&Lexeme::Assign) {
            let mut exprs = vec![first];
            while self.eat(&Lexeme::Assign) {
                exprs.push(self.parse_testlist()?);
            }
            let value = exprs.pop().map(Box::new);
            return Ok(Stmt::Assign(AssignStmt {
                span: self.span_from(lo),
                targets: exprs,
                value: value.ok_or_else(|| self.unexpected("expression"))?,
            }));
        }

        if let Some(op) = self.aug_assign_op() {
            self.bump();
            let value = self.parse_testlist()?;
            return Ok(Stmt::AugAssign(AugAssignStmt {
                span: self.span_from(lo),
                target: Box::new(first),
                op,
                value: Box::new(value),
            }));
        }

        Ok(Stmt::Expr(ExprStmt {
            span: self.span_from(lo),
            expr: Box::new(first),
        }))
    }

    fn aug_assign_op(&self) -> Option<BinaryOp> {
        match self.peek() {
            Token::Lexeme(Lexeme::PlusAssign) => Some(BinaryOp::Add),
            Token::Lexeme(Lexeme::MinusAssign) => Some(BinaryOp::Sub),
            Token::Lexeme(Lexeme::StarAssign) => Some(BinaryOp::Mul),
            Token::Lexeme(Lexeme::SlashAssign) => Some(BinaryOp::Div),
            Token::Lexeme(Lexeme::DoubleSlashAssign) => Some(BinaryOp::FloorDiv),
            Token::Lexeme(Lexeme::PercentAssign) => Some(BinaryOp::Mod),
            _ => None,
        }
    }

    fn parse_dotted_name(&mut self) -> PResult<(String, Span)> {
        let first = self.expect_ident()?;
        let lo = first.span.lo;
        let mut name = first.sym;
        while self.eat(&Lexeme::Dot) {
            name.push('.');
            name.push_str(&self.expect_ident()?.sym);
        }
        Ok((name, self.span_from(lo)))
    }

    fn parse_alias(&mut self, dotted: bool) -> PResult<Alias> {
        let lo = self.lo();
        let name = if dotted {
            self.parse_dotted_name()?.0
        } else {
            self.expect_ident()?.sym
        };
        let asname = if self.eat(&Lexeme::As) {
            Some(self.expect_ident()?)
        } else {
            None
        };
        Ok(Alias {
            span: self.span_from(lo),
            name,
            asname,
        })
    }

    fn parse_import(&mut self) -> PResult<Stmt> {
        let lo = self.lo();
        self.expect(&Lexeme::Import)?;
        let mut names = vec![self.parse_alias(true)?];
        while self.eat(&Lexeme::Comma) {
            names.push(self.parse_alias(true)?);
        }
        Ok(Stmt::Import(ImportStmt {
            span: self.span_from(lo),
            names,
        }))
    }

    fn parse_import_from(&mut self) -> PResult<Stmt> {
        let lo = self.lo();
        self.expect(&Lexeme::From)?;
        let (module, _) = self.parse_dotted_name()?;
        self.expect(&Lexeme::Import)?;

        let parenthesized = self.eat(&Lexeme::LParen);
        let mut names = vec![self.parse_alias(false)?];
        while self.eat(&Lexeme::Comma) {
            if parenthesized && self.is(&Lexeme::RParen) {
                break;
            }
            names.push(self.parse_alias(false)?);
        }
        if parenthesized {
            self.expect(&Lexeme::RParen)?;
        }

        Ok(Stmt::ImportFrom(ImportFromStmt {
            span: self.span_from(lo),
            module,
            names,
        }))
    }

    /// `":" NEWLINE INDENT stmt+ DEDENT` or `":" simple_line`.
    fn parse_block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect(&Lexeme::Colon)?;
        if !matches!(self.peek(), Token::Newline) {
            return self.parse_simple_line();
        }
        self.bump();
        if !matches!(self.peek(), Token::Indent) {
            return Err(self.unexpected("an indented block"));
        }
        self.bump();

        let mut body = Vec::new();
        loop {
            match self.peek() {
                Token::Dedent => {
                    self.bump();
                    break;
                }
                Token::Eof => break,
                _ => body.extend(self.parse_statement()?),
            }
        }
        Ok(body)
    }

    fn parse_params(&mut self, close: &Lexeme) -> PResult<Vec<Param>> {
        let mut params = Vec::new();
        while !self.is(close) {
            let name = self.expect_ident()?;
            let lo = name.span.lo;
            let default = if self.eat(&Lexeme::Assign) {
                Some(Box::new(self.parse_test()?))
            } else {
                None
            };
            params.push(Param {
                span: self.span_from(lo),
                name,
                default,
            });
            if !self.eat(&Lexeme::Comma) {
                break;
            }
        }
        Ok(params)
    }

    fn parse_def(&mut self) -> PResult<Stmt> {
        let lo = self.lo();
        self.expect(&Lexeme::Def)?;
        let name = self.expect_ident()?;
        self.expect(&Lexeme::LParen)?;
        let params = self.parse_params(&Lexeme::RParen)?;
        self.expect(&Lexeme::RParen)?;
        let body = self.parse_block()?;
        Ok(Stmt::FunctionDef(FunctionDef {
            span: self.span_from(lo),
            name,
            params,
            body,
        }))
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        let lo = self.lo();
        self.bump(); // `if` or `elif`
        let test = Box::new(self.parse_test()?);
        let body = self.parse_block()?;
        let orelse = if self.is(&Lexeme::Elif) {
            vec![self.parse_if()?]
        } else if self.eat(&Lexeme::Else) {
            self.parse_block()?
        } else {
            Vec::new()
        };
        Ok(Stmt::If(IfStmt {
            span: self.span_from(lo),
            test,
            body,
            orelse,
        }))
    }

    fn parse_while(&mut self) -> PResult<Stmt> {
        let lo = self.lo();
        self.expect(&Lexeme::While)?;
        let test = Box::new(self.parse_test()?);
        let body = self.parse_block()?;
        Ok(Stmt::While(WhileStmt {
            span: self.span_from(lo),
            test,
            body,
        }))
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        let lo = self.lo();
        self.expect(&Lexeme::For)?;
        let target = Box::new(self.parse_target_list()?);
        self.expect(&Lexeme::In)?;
        let iter = Box::new(self.parse_testlist()?);
        let body = self.parse_block()?;
        Ok(Stmt::For(ForStmt {
            span: self.span_from(lo),
            target,
            iter,
            body,
        }))
    }

    // ----------------------------------------------------------------------
    // Expressions
    // ----------------------------------------------------------------------

    /// `test ("," test)* [","]`, a tuple when a comma is present.
    fn parse_testlist(&mut self) -> PResult<Expr> {
        let lo = self.lo();
        let first = self.parse_test()?;
        if !self.is(&Lexeme::Comma) {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat(&Lexeme::Comma) {
            if !self.can_start_expr() {
                break;
            }
            elts.push(self.parse_test()?);
        }
        Ok(Expr::Tuple(TupleExpr {
            span: self.span_from(lo),
            elts,
        }))
    }

    /// Loop and comprehension targets: bitwise-or level expressions, so
    /// that the following `in` is not taken as a comparison.
    fn parse_target_list(&mut self) -> PResult<Expr> {
        let lo = self.lo();
        let first = self.parse_bitor()?;
        if !self.is(&Lexeme::Comma) {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat(&Lexeme::Comma) {
            if self.is(&Lexeme::In) {
                break;
            }
            elts.push(self.parse_bitor()?);
        }
        Ok(Expr::Tuple(TupleExpr {
            span: self.span_from(lo),
            elts,
        }))
    }

    pub(crate) fn parse_test(&mut self) -> PResult<Expr> {
        if self.is(&Lexeme::Lambda) {
            return self.parse_lambda();
        }
        let lo = self.lo();
        let body = self.parse_or()?;
        if !self.eat(&Lexeme::If) {
            return Ok(body);
        }
        let test = self.parse_or()?;
        self.expect(&Lexeme::Else)?;
        let orelse = self.parse_test()?;
        Ok(Expr::IfExp(IfExpr {
            span: self.span_from(lo),
            test: Box::new(test),
            body: Box::new(body),
            orelse: Box::new(orelse),
        }))
    }

    fn parse_lambda(&mut self) -> PResult<Expr> {
        let lo = self.lo();
        self.expect(&Lexeme::Lambda)?;
        let params = self.parse_params(&Lexeme::Colon)?;
        self.expect(&Lexeme::Colon)?;
        let body = self.parse_test()?;
        Ok(Expr::Lambda(LambdaExpr {
            span: self.span_from(lo),
            params,
            body: Box::new(body),
        }))
    }

    /// `operand (keyword operand)*`, flattened into one `BoolExpr`.
    fn parse_bool_level(
        &mut self,
        keyword: &Lexeme,
        op: BoolOp,
        operand: fn(&mut Self) -> PResult<Expr>,
    ) -> PResult<Expr> {
        let lo = self.lo();
        let first = operand(self)?;
        if !self.is(keyword) {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat(keyword) {
            values.push(operand(self)?);
        }
        Ok(Expr::Bool(BoolExpr {
            span: self.span_from(lo),
            op,
            values,
        }))
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        self.parse_bool_level(&Lexeme::Or, BoolOp::Or, Self::parse_and)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        self.parse_bool_level(&Lexeme::And, BoolOp::And, Self::parse_not)
    }

    fn parse_not(&mut self) -> PResult<Expr> {
        if !self.is(&Lexeme::Not) {
            return self.parse_comparison();
        }
        let lo = self.lo();
        self.bump();
        let operand = self.parse_not()?;
        Ok(Expr::Unary(UnaryExpr {
            span: self.span_from(lo),
            op: UnaryOp::Not,
            operand: Box::new(operand),
        }))
    }

    fn comparison_op(&mut self) -> Option<CmpOp> {
        let op = match self.peek() {
            Token::Lexeme(Lexeme::Lt) => CmpOp::Lt,
            Token::Lexeme(Lexeme::Gt) => CmpOp::Gt,
            Token::Lexeme(Lexeme::LtE) => CmpOp::LtE,
            Token::Lexeme(Lexeme::GtE) => CmpOp::GtE,
            Token::Lexeme(Lexeme::EqEq) => CmpOp::Eq,
            Token::Lexeme(Lexeme::NotEq) => CmpOp::NotEq,
            Token::Lexeme(Lexeme::In) => CmpOp::In,
            Token::Lexeme(Lexeme::Not) if self.is_at(1, &Lexeme::In) => {
                self.bump();
                CmpOp::NotIn
            }
            Token::Lexeme(Lexeme::Is) if self.is_at(1, &Lexeme::Not) => {
                self.bump();
                CmpOp::IsNot
            }
            Token::Lexeme(Lexeme::Is) => CmpOp::Is,
            _ => return None,
        };
        self.bump();
        Some(op)
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let lo = self.lo();
        let left = self.parse_bitor()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        while let Some(op) = self.comparison_op() {
            ops.push(op);
            comparators.push(self.parse_bitor()?);
        }
        if ops.is_empty() {
            return Ok(left);
        }
        Ok(Expr::Compare(CompareExpr {
            span: self.span_from(lo),
            left: Box::new(left),
            ops,
            comparators,
        }))
    }

    /// Left-associative binary level: `operand (op operand)*`.
    fn parse_binary_level(
        &mut self,
        ops: &[(Lexeme, BinaryOp)],
        operand: fn(&mut Self) -> PResult<Expr>,
    ) -> PResult<Expr> {
        let lo = self.lo();
        let mut left = operand(self)?;
        'outer: loop {
            for (lexeme, op) in ops {
                if self.eat(lexeme) {
                    let right = operand(self)?;
                    left = Expr::Bin(BinExpr {
                        span: self.span_from(lo),
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                    });
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn parse_bitor(&mut self) -> PResult<Expr> {
        self.parse_binary_level(&[(Lexeme::Pipe, BinaryOp::BitOr)], Self::parse_bitxor)
    }

    fn parse_bitxor(&mut self) -> PResult<Expr> {
        self.parse_binary_level(&[(Lexeme::Caret, BinaryOp::BitXor)], Self::parse_bitand)
    }

    fn parse_bitand(&mut self) -> PResult<Expr> {
        self.parse_binary_level(&[(Lexeme::Amper, BinaryOp::BitAnd)], Self::parse_shift)
    }

    fn parse_shift(&mut self) -> PResult<Expr> {
        self.parse_binary_level(
            &[
                (Lexeme::LShift, BinaryOp::LShift),
                (Lexeme::RShift, BinaryOp::RShift),
            ],
            Self::parse_arith,
        )
    }

    fn parse_arith(&mut self) -> PResult<Expr> {
        self.parse_binary_level(
            &[(Lexeme::Plus, BinaryOp::Add), (Lexeme::Minus, BinaryOp::Sub)],
            Self::parse_term,
        )
    }

    fn parse_term(&mut self) -> PResult<Expr> {
        self.parse_binary_level(
            &[
                (Lexeme::Star, BinaryOp::Mul),
                (Lexeme::Slash, BinaryOp::Div),
                (Lexeme::DoubleSlash, BinaryOp::FloorDiv),
                (Lexeme::Percent, BinaryOp::Mod),
            ],
            Self::parse_factor,
        )
    }

    fn parse_factor(&mut self) -> PResult<Expr> {
        let op = match self.peek() {
            Token::Lexeme(Lexeme::Minus) => UnaryOp::Neg,
            Token::Lexeme(Lexeme::Plus) => UnaryOp::Pos,
            Token::Lexeme(Lexeme::Tilde) => UnaryOp::Invert,
            _ => return self.parse_power(),
        };
        let lo = self.lo();
        self.bump();
        let operand = self.parse_factor()?;
        Ok(Expr::Unary(UnaryExpr {
            span: self.span_from(lo),
            op,
            operand: Box::new(operand),
        }))
    }

    fn parse_power(&mut self) -> PResult<Expr> {
        let lo = self.lo();
        let base = self.parse_primary()?;
        if !self.eat(&Lexeme::DoubleStar) {
            return Ok(base);
        }
        let exponent = self.parse_factor()?;
        Ok(Expr::Bin(BinExpr {
            span: self.span_from(lo),
            op: BinaryOp::Pow,
            left: Box::new(base),
            right: Box::new(exponent),
        }))
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let lo = self.lo();
        let mut expr = self.parse_atom()?;
        loop {
            if self.is(&Lexeme::LParen) {
                expr = self.parse_call(expr, lo)?;
            } else if self.is(&Lexeme::LBracket) {
                self.bump();
                let index = self.parse_subscript_index()?;
                self.expect(&Lexeme::RBracket)?;
                expr = Expr::Subscript(SubscriptExpr {
                    span: self.span_from(lo),
                    value: Box::new(expr),
                    index: Box::new(index),
                });
            } else if self.eat(&Lexeme::Dot) {
                let attr = self.expect_ident()?;
                expr = Expr::Attribute(AttributeExpr {
                    span: self.span_from(lo),
                    value: Box::new(expr),
                    attr,
                });
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_call(&mut self, func: Expr, lo: BytePos) -> PResult<Expr> {
        self.expect(&Lexeme::LParen)?;
        let mut args = Vec::new();
        let mut keywords: Vec<Keyword> = Vec::new();

        while !self.is(&Lexeme::RParen) {
            let is_keyword = matches!(self.peek(), Token::Lexeme(Lexeme::Ident(_)))
                && self.is_at(1, &Lexeme::Assign);
            if is_keyword {
                let arg = self.expect_ident()?;
                let kw_lo = arg.span.lo;
                self.expect(&Lexeme::Assign)?;
                let value = self.parse_test()?;
                keywords.push(Keyword {
                    span: self.span_from(kw_lo),
                    arg,
                    value: Box::new(value),
                });
            } else {
                if let Some(last) = keywords.last() {
                    return Err(self.error(
                        "positional argument follows keyword argument",
                        last.span,
                    ));
                }
                let arg_lo = self.lo();
                let arg = self.parse_test()?;
                if self.is(&Lexeme::For) {
                    let generators = self.parse_comp_for()?;
                    let genexp = Expr::GeneratorExp(GeneratorExp {
                        span: self.span_from(arg_lo),
                        elt: Box::new(arg),
                        generators,
                    });
                    if !args.is_empty() || !self.is(&Lexeme::RParen) {
                        return Err(self.error(
                            "generator expression must be parenthesized",
                            genexp.span(),
                        ));
                    }
                    args.push(genexp);
                    break;
                }
                args.push(arg);
            }
            if !self.eat(&Lexeme::Comma) {
                break;
            }
        }
        self.expect(&Lexeme::RParen)?;

        Ok(Expr::Call(CallExpr {
            span: self.span_from(lo),
            func: Box::new(func),
            args,
            keywords,
        }))
    }

    fn parse_subscript_index(&mut self) -> PResult<Expr> {
        let lo = self.lo();
        let first = self.parse_slice_item()?;
        if !self.is(&Lexeme::Comma) {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat(&Lexeme::Comma) {
            if self.is(&Lexeme::RBracket) {
                break;
            }
            elts.push(self.parse_slice_item()?);
        }
        Ok(Expr::Tuple(TupleExpr {
            span: self.span_from(lo),
            elts,
        }))
    }

    fn parse_slice_item(&mut self) -> PResult<Expr> {
        let lo = self.lo();
        let lower = if self.is(&Lexeme::Colon) {
            None
        } else {
            let expr = self.parse_test()?;
            if !self.is(&Lexeme::Colon) {
                return Ok(expr);
            }
            Some(Box::new(expr))
        };
        self.expect(&Lexeme::Colon)?;

        let ends_part =
            |p: &Self| p.is(&Lexeme::Colon) || p.is(&Lexeme::RBracket) || p.is(&Lexeme::Comma);
        let upper = if ends_part(&*self) {
            None
        } else {
            Some(Box::new(self.parse_test()?))
        };
        let step = if self.eat(&Lexeme::Colon) && !ends_part(&*self) {
            Some(Box::new(self.parse_test()?))
        } else {
            None
        };

        Ok(Expr::Slice(SliceExpr {
            span: self.span_from(lo),
            lower,
            upper,
            step,
        }))
    }

    fn parse_comp_for(&mut self) -> PResult<Vec<Comprehension>> {
        let mut generators = Vec::new();
        while self.is(&Lexeme::For) {
            let lo = self.lo();
            self.bump();
            let target = self.parse_target_list()?;
            self.expect(&Lexeme::In)?;
            let iter = self.parse_or()?;
            let mut ifs = Vec::new();
            while self.eat(&Lexeme::If) {
                ifs.push(self.parse_or()?);
            }
            generators.push(Comprehension {
                span: self.span_from(lo),
                target: Box::new(target),
                iter: Box::new(iter),
                ifs,
            });
        }
        Ok(generators)
    }

    /// Comma-separated expressions up to `close`, after `first` was parsed.
    fn parse_elements(&mut self, first: Expr, close: &Lexeme) -> PResult<Vec<Expr>> {
        let mut elts = vec![first];
        while self.eat(&Lexeme::Comma) {
            if self.is(close) {
                break;
            }
            elts.push(self.parse_test()?);
        }
        Ok(elts)
    }

    fn parse_atom(&mut self) -> PResult<Expr> {
        let lo = self.lo();
        let token = self.peek().clone();
        let lit = |value: LitValue, span: Span| Expr::Lit(Lit { span, value });

        match token {
            Token::Lexeme(Lexeme::Ident(sym)) => {
                let span = self.bump().span;
                Ok(Expr::Name(Ident::new(sym, span)))
            }
            Token::Lexeme(Lexeme::Int(v)) => Ok(lit(LitValue::Int(v), self.bump().span)),
            Token::Lexeme(Lexeme::Float(v)) => Ok(lit(LitValue::Float(v), self.bump().span)),
            Token::Lexeme(Lexeme::True) => Ok(lit(LitValue::Bool(true), self.bump().span)),
            Token::Lexeme(Lexeme::False) => Ok(lit(LitValue::Bool(false), self.bump().span)),
            Token::Lexeme(Lexeme::None) => Ok(lit(LitValue::None, self.bump().span)),
            Token::Lexeme(Lexeme::Str(_)) => {
                // Adjacent string literals concatenate.
                let mut value = String::new();
                while let Token::Lexeme(Lexeme::Str(s)) = self.peek() {
                    value.push_str(s);
                    self.bump();
                }
                Ok(lit(LitValue::Str(value), self.span_from(lo)))
            }
            Token::Lexeme(Lexeme::Ellipsis) => {
                let span = self.bump().span;
                Ok(Expr::Placeholder(Placeholder { span }))
            }
            Token::Lexeme(Lexeme::LParen) => {
                self.bump();
                if self.eat(&Lexeme::RParen) {
                    return Ok(Expr::Tuple(TupleExpr {
                        span: self.span_from(lo),
                        elts: Vec::new(),
                    }));
                }
                let first = self.parse_test()?;
                let expr = if self.is(&Lexeme::For) {
                    let generators = self.parse_comp_for()?;
                    self.expect(&Lexeme::RParen)?;
                    Expr::GeneratorExp(GeneratorExp {
                        span: self.span_from(lo),
                        elt: Box::new(first),
                        generators,
                    })
                } else if self.is(&Lexeme::Comma) {
                    let elts = self.parse_elements(first, &Lexeme::RParen)?;
                    self.expect(&Lexeme::RParen)?;
                    Expr::Tuple(TupleExpr {
                        span: self.span_from(lo),
                        elts,
                    })
                } else {
                    self.expect(&Lexeme::RParen)?;
                    first
                };
                Ok(expr)
            }
            Token::Lexeme(Lexeme::LBracket) => {
                self.bump();
                if self.eat(&Lexeme::RBracket) {
                    return Ok(Expr::List(ListExpr {
                        span: self.span_from(lo),
                        elts: Vec::new(),
                    }));
                }
                let first = self.parse_test()?;
                if self.is(&Lexeme::For) {
                    let generators = self.parse_comp_for()?;
                    self.expect(&Lexeme::RBracket)?;
                    return Ok(Expr::ListComp(ListComp {
                        span: self.span_from(lo),
                        elt: Box::new(first),
                        generators,
                    }));
                }
                let elts = self.parse_elements(first, &Lexeme::RBracket)?;
                self.expect(&Lexeme::RBracket)?;
                Ok(Expr::List(ListExpr {
                    span: self.span_from(lo),
                    elts,
                }))
            }
            Token::Lexeme(Lexeme::LBrace) => {
                self.bump();
                if self.eat(&Lexeme::RBrace) {
                    return Ok(Expr::Dict(DictExpr {
                        span: self.span_from(lo),
                        entries: Vec::new(),
                    }));
                }
                let first = self.parse_test()?;
                if self.eat(&Lexeme::Colon) {
                    return self.parse_dict_rest(lo, first);
                }
                if self.is(&Lexeme::For) {
                    let generators = self.parse_comp_for()?;
                    self.expect(&Lexeme::RBrace)?;
                    return Ok(Expr::SetComp(SetComp {
                        span: self.span_from(lo),
                        elt: Box::new(first),
                        generators,
                    }));
                }
                let elts = self.parse_elements(first, &Lexeme::RBrace)?;
                self.expect(&Lexeme::RBrace)?;
                Ok(Expr::Set(SetExpr {
                    span: self.span_from(lo),
                    elts,
                }))
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    /// Rest of a dict display or comprehension after `{key:`.
    fn parse_dict_rest(&mut self, lo: BytePos, key: Expr) -> PResult<Expr> {
        let value = self.parse_test()?;
        if self.is(&Lexeme::For) {
            let generators = self.parse_comp_for()?;
            self.expect(&Lexeme::RBrace)?;
            return Ok(Expr::DictComp(DictComp {
                span: self.span_from(lo),
                key: Box::new(key),
                value: Box::new(value),
                generators,
            }));
        }

        let mut entries = vec![DictEntry { key, value }];
        while self.eat(&Lexeme::Comma) {
            if self.is(&Lexeme::RBrace) {
                break;
            }
            let key = self.parse_test()?;
            self.expect(&Lexeme::Colon)?;
            let value = self.parse_test()?;
            entries.push(DictEntry { key, value });
        }
        self.expect(&Lexeme::RBrace)?;
        Ok(Expr::Dict(DictExpr {
            span: self.span_from(lo),
            entries,
        }))
    }
}
