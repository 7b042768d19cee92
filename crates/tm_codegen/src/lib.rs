//! Source emission for transmod trees.
//!
//! The emitter inserts parentheses only where operator precedence requires
//! them, with two fixed exceptions: tuples and generator expressions are
//! always parenthesized. Output re-parses into an equivalent tree.

use std::fmt::Write;

use tm_ast::*;

const INDENT: &str = "    ";

/// Render a whole module, one statement per line.
pub fn emit_module(module: &Module) -> String {
    let mut emitter = Emitter::default();
    for stmt in &module.body {
        emitter.stmt(stmt);
    }
    emitter.out
}

/// Render a single expression.
pub fn emit_expr(expr: &Expr) -> String {
    let mut emitter = Emitter::default();
    emitter.expr(expr, prec::LOWEST);
    emitter.out
}

/// Binding strength, lowest first.
mod prec {
    pub const LOWEST: u8 = 1;
    pub const LAMBDA: u8 = 1;
    pub const IF_EXP: u8 = 2;
    pub const OR: u8 = 3;
    pub const AND: u8 = 4;
    pub const NOT: u8 = 5;
    pub const COMPARE: u8 = 6;
    pub const BIT_OR: u8 = 7;
    pub const BIT_XOR: u8 = 8;
    pub const BIT_AND: u8 = 9;
    pub const SHIFT: u8 = 10;
    pub const ARITH: u8 = 11;
    pub const TERM: u8 = 12;
    pub const UNARY: u8 = 13;
    pub const POWER: u8 = 14;
    pub const PRIMARY: u8 = 15;
    pub const ATOM: u8 = 16;
}

fn binary_precedence(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::BitOr => prec::BIT_OR,
        BinaryOp::BitXor => prec::BIT_XOR,
        BinaryOp::BitAnd => prec::BIT_AND,
        BinaryOp::LShift | BinaryOp::RShift => prec::SHIFT,
        BinaryOp::Add | BinaryOp::Sub => prec::ARITH,
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod => prec::TERM,
        BinaryOp::Pow => prec::POWER,
    }
}

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Lambda(_) => prec::LAMBDA,
        Expr::IfExp(_) => prec::IF_EXP,
        Expr::Bool(e) => match e.op {
            BoolOp::Or => prec::OR,
            BoolOp::And => prec::AND,
        },
        Expr::Unary(e) if e.op == UnaryOp::Not => prec::NOT,
        Expr::Unary(_) => prec::UNARY,
        Expr::Compare(_) => prec::COMPARE,
        Expr::Bin(e) => binary_precedence(e.op),
        Expr::Call(_) | Expr::Subscript(_) | Expr::Attribute(_) => prec::PRIMARY,
        Expr::List(_)
        | Expr::Tuple(_)
        | Expr::Set(_)
        | Expr::Dict(_)
        | Expr::ListComp(_)
        | Expr::SetComp(_)
        | Expr::DictComp(_)
        | Expr::GeneratorExp(_)
        | Expr::Slice(_)
        | Expr::Name(_)
        | Expr::Lit(_)
        | Expr::Placeholder(_) => prec::ATOM,
    }
}

#[derive(Default)]
struct Emitter {
    out: String,
    depth: usize,
}

impl Emitter {
    fn line_start(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
    }

    fn block(&mut self, body: &[Stmt]) {
        self.out.push_str(":\n");
        self.depth += 1;
        if body.is_empty() {
            self.line_start();
            self.out.push_str("pass\n");
        }
        for stmt in body {
            self.stmt(stmt);
        }
        self.depth -= 1;
    }

    fn stmt(&mut self, stmt: &Stmt) {
        self.line_start();
        match stmt {
            Stmt::Expr(s) => {
                self.expr(&s.expr, prec::LOWEST);
                self.out.push('\n');
            }
            Stmt::Assign(s) => {
                for target in &s.targets {
                    self.expr(target, prec::LOWEST);
                    self.out.push_str(" = ");
                }
                self.expr(&s.value, prec::LOWEST);
                self.out.push('\n');
            }
            Stmt::AugAssign(s) => {
                self.expr(&s.target, prec::LOWEST);
                let _ = write!(self.out, " {}= ", s.op);
                self.expr(&s.value, prec::LOWEST);
                self.out.push('\n');
            }
            Stmt::FunctionDef(s) => {
                let _ = write!(self.out, "def {}(", s.name);
                self.params(&s.params);
                self.out.push(')');
                self.block(&s.body);
            }
            Stmt::Return(s) => {
                self.out.push_str("return");
                if let Some(value) = &s.value {
                    self.out.push(' ');
                    self.expr(value, prec::LOWEST);
                }
                self.out.push('\n');
            }
            Stmt::If(s) => self.if_chain(s, "if"),
            Stmt::While(s) => {
                self.out.push_str("while ");
                self.expr(&s.test, prec::LOWEST);
                self.block(&s.body);
            }
            Stmt::For(s) => {
                self.out.push_str("for ");
                self.expr(&s.target, prec::BIT_OR);
                self.out.push_str(" in ");
                self.expr(&s.iter, prec::LOWEST);
                self.block(&s.body);
            }
            Stmt::Import(s) => {
                self.out.push_str("import ");
                self.aliases(&s.names);
                self.out.push('\n');
            }
            Stmt::ImportFrom(s) => {
                let _ = write!(self.out, "from {} import ", s.module);
                self.aliases(&s.names);
                self.out.push('\n');
            }
            Stmt::Assert(s) => {
                self.out.push_str("assert ");
                self.expr(&s.test, prec::LOWEST);
                if let Some(msg) = &s.msg {
                    self.out.push_str(", ");
                    self.expr(msg, prec::LOWEST);
                }
                self.out.push('\n');
            }
            Stmt::Pass(_) => self.out.push_str("pass\n"),
            Stmt::Break(_) => self.out.push_str("break\n"),
            Stmt::Continue(_) => self.out.push_str("continue\n"),
        }
    }

    /// `if`/`elif` chains: an `orelse` holding a single `if` prints as `elif`.
    fn if_chain(&mut self, s: &IfStmt, keyword: &str) {
        let _ = write!(self.out, "{keyword} ");
        self.expr(&s.test, prec::LOWEST);
        self.block(&s.body);
        match s.orelse.as_slice() {
            [] => {}
            [Stmt::If(elif)] => {
                self.line_start();
                self.if_chain(elif, "elif");
            }
            orelse => {
                self.line_start();
                self.out.push_str("else");
                self.block(orelse);
            }
        }
    }

    fn aliases(&mut self, names: &[Alias]) {
        for (i, alias) in names.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.out.push_str(&alias.name);
            if let Some(asname) = &alias.asname {
                let _ = write!(self.out, " as {asname}");
            }
        }
    }

    fn params(&mut self, params: &[Param]) {
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.out.push_str(&param.name.sym);
            if let Some(default) = &param.default {
                self.out.push('=');
                self.expr(default, prec::IF_EXP);
            }
        }
    }

    fn comma_separated(&mut self, exprs: &[Expr]) {
        for (i, expr) in exprs.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.expr(expr, prec::LOWEST);
        }
    }

    fn generators(&mut self, generators: &[Comprehension]) {
        for generator in generators {
            self.out.push_str(" for ");
            self.expr(&generator.target, prec::BIT_OR);
            self.out.push_str(" in ");
            self.expr(&generator.iter, prec::OR);
            for cond in &generator.ifs {
                self.out.push_str(" if ");
                self.expr(cond, prec::OR);
            }
        }
    }

    fn subscript_index(&mut self, index: &Expr) {
        match index {
            Expr::Tuple(tuple) if !tuple.elts.is_empty() => {
                self.comma_separated(&tuple.elts);
                if tuple.elts.len() == 1 {
                    self.out.push(',');
                }
            }
            other => self.expr(other, prec::LOWEST),
        }
    }

    fn expr(&mut self, expr: &Expr, min: u8) {
        let parens = precedence(expr) < min;
        if parens {
            self.out.push('(');
        }
        self.expr_inner(expr);
        if parens {
            self.out.push(')');
        }
    }

    fn expr_inner(&mut self, expr: &Expr) {
        match expr {
            Expr::Call(e) => {
                self.expr(&e.func, prec::PRIMARY);
                self.out.push('(');
                self.comma_separated(&e.args);
                for (i, keyword) in e.keywords.iter().enumerate() {
                    if i > 0 || !e.args.is_empty() {
                        self.out.push_str(", ");
                    }
                    let _ = write!(self.out, "{}=", keyword.arg);
                    self.expr(&keyword.value, prec::LOWEST);
                }
                self.out.push(')');
            }
            Expr::Unary(e) => {
                if e.op == UnaryOp::Not {
                    self.out.push_str("not ");
                    self.expr(&e.operand, prec::NOT);
                } else {
                    self.out.push_str(e.op.as_str());
                    self.expr(&e.operand, prec::UNARY);
                }
            }
            Expr::Bin(e) => {
                let p = binary_precedence(e.op);
                let (left, right) = if e.op == BinaryOp::Pow {
                    (prec::PRIMARY, prec::UNARY)
                } else {
                    (p, p + 1)
                };
                self.expr(&e.left, left);
                let _ = write!(self.out, " {} ", e.op);
                self.expr(&e.right, right);
            }
            Expr::Bool(e) => {
                let p = precedence(expr);
                for (i, value) in e.values.iter().enumerate() {
                    if i > 0 {
                        let _ = write!(self.out, " {} ", e.op);
                    }
                    self.expr(value, p + 1);
                }
            }
            Expr::Compare(e) => {
                self.expr(&e.left, prec::BIT_OR);
                for (op, comparator) in e.ops.iter().zip(&e.comparators) {
                    let _ = write!(self.out, " {op} ");
                    self.expr(comparator, prec::BIT_OR);
                }
            }
            Expr::IfExp(e) => {
                self.expr(&e.body, prec::OR);
                self.out.push_str(" if ");
                self.expr(&e.test, prec::OR);
                self.out.push_str(" else ");
                self.expr(&e.orelse, prec::IF_EXP);
            }
            Expr::List(e) => {
                self.out.push('[');
                self.comma_separated(&e.elts);
                self.out.push(']');
            }
            Expr::Tuple(e) => {
                self.out.push('(');
                self.comma_separated(&e.elts);
                if e.elts.len() == 1 {
                    self.out.push(',');
                }
                self.out.push(')');
            }
            Expr::Set(e) if e.elts.is_empty() => self.out.push_str("set()"),
            Expr::Set(e) => {
                self.out.push('{');
                self.comma_separated(&e.elts);
                self.out.push('}');
            }
            Expr::Dict(e) => {
                self.out.push('{');
                for (i, entry) in e.entries.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.expr(&entry.key, prec::LOWEST);
                    self.out.push_str(": ");
                    self.expr(&entry.value, prec::LOWEST);
                }
                self.out.push('}');
            }
            Expr::ListComp(e) => {
                self.out.push('[');
                self.expr(&e.elt, prec::LOWEST);
                self.generators(&e.generators);
                self.out.push(']');
            }
            Expr::SetComp(e) => {
                self.out.push('{');
                self.expr(&e.elt, prec::LOWEST);
                self.generators(&e.generators);
                self.out.push('}');
            }
            Expr::GeneratorExp(e) => {
                self.out.push('(');
                self.expr(&e.elt, prec::LOWEST);
                self.generators(&e.generators);
                self.out.push(')');
            }
            Expr::DictComp(e) => {
                self.out.push('{');
                self.expr(&e.key, prec::LOWEST);
                self.out.push_str(": ");
                self.expr(&e.value, prec::LOWEST);
                self.generators(&e.generators);
                self.out.push('}');
            }
            Expr::Subscript(e) => {
                self.expr(&e.value, prec::PRIMARY);
                self.out.push('[');
                self.subscript_index(&e.index);
                self.out.push(']');
            }
            Expr::Slice(e) => {
                if let Some(lower) = &e.lower {
                    self.expr(lower, prec::LOWEST);
                }
                self.out.push(':');
                if let Some(upper) = &e.upper {
                    self.expr(upper, prec::LOWEST);
                }
                if let Some(step) = &e.step {
                    self.out.push(':');
                    self.expr(step, prec::LOWEST);
                }
            }
            Expr::Attribute(e) => {
                self.expr(&e.value, prec::PRIMARY);
                let _ = write!(self.out, ".{}", e.attr);
            }
            Expr::Lambda(e) => {
                self.out.push_str("lambda");
                if !e.params.is_empty() {
                    self.out.push(' ');
                    self.params(&e.params);
                }
                self.out.push_str(": ");
                self.expr(&e.body, prec::LOWEST);
            }
            Expr::Name(ident) => self.out.push_str(&ident.sym),
            Expr::Lit(lit) => self.lit(&lit.value),
            Expr::Placeholder(_) => self.out.push_str("..."),
        }
    }

    fn lit(&mut self, value: &LitValue) {
        match value {
            LitValue::Int(v) => {
                let _ = write!(self.out, "{v}");
            }
            LitValue::Float(v) => {
                let _ = write!(self.out, "{v:?}");
            }
            LitValue::Str(s) => {
                self.out.push('"');
                for c in s.chars() {
                    match c {
                        '"' => self.out.push_str("\\\""),
                        '\\' => self.out.push_str("\\\\"),
                        '\n' => self.out.push_str("\\n"),
                        '\t' => self.out.push_str("\\t"),
                        '\r' => self.out.push_str("\\r"),
                        '\0' => self.out.push_str("\\0"),
                        c => self.out.push(c),
                    }
                }
                self.out.push('"');
            }
            LitValue::Bool(true) => self.out.push_str("True"),
            LitValue::Bool(false) => self.out.push_str("False"),
            LitValue::None => self.out.push_str("None"),
        }
    }
}
