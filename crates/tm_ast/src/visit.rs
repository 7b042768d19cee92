//! Read-only and mutable visitors over the tree.
//!
//! Every `visit_*` hook defaults to walking the node's children through
//! `visit_children_with` / `visit_mut_children_with`. Those walkers match
//! exhaustively on node kinds, so adding a kind forces every traversal to be
//! revisited.

use crate::*;

pub trait Visit {
    fn visit_module(&mut self, n: &Module) {
        n.visit_children_with(self)
    }

    fn visit_stmt(&mut self, n: &Stmt) {
        n.visit_children_with(self)
    }

    fn visit_expr(&mut self, n: &Expr) {
        n.visit_children_with(self)
    }

    fn visit_keyword(&mut self, n: &Keyword) {
        n.visit_children_with(self)
    }

    fn visit_comprehension(&mut self, n: &Comprehension) {
        n.visit_children_with(self)
    }

    fn visit_param(&mut self, n: &Param) {
        n.visit_children_with(self)
    }

    fn visit_alias(&mut self, n: &Alias) {
        if let Some(asname) = &n.asname {
            self.visit_ident(asname);
        }
    }

    fn visit_ident(&mut self, _n: &Ident) {}
}

pub trait VisitMut {
    fn visit_mut_module(&mut self, n: &mut Module) {
        n.visit_mut_children_with(self)
    }

    fn visit_mut_stmt(&mut self, n: &mut Stmt) {
        n.visit_mut_children_with(self)
    }

    fn visit_mut_expr(&mut self, n: &mut Expr) {
        n.visit_mut_children_with(self)
    }

    fn visit_mut_keyword(&mut self, n: &mut Keyword) {
        n.visit_mut_children_with(self)
    }

    fn visit_mut_comprehension(&mut self, n: &mut Comprehension) {
        n.visit_mut_children_with(self)
    }

    fn visit_mut_param(&mut self, n: &mut Param) {
        n.visit_mut_children_with(self)
    }

    fn visit_mut_alias(&mut self, n: &mut Alias) {
        if let Some(asname) = &mut n.asname {
            self.visit_mut_ident(asname);
        }
    }

    fn visit_mut_ident(&mut self, _n: &mut Ident) {}
}

impl Module {
    pub fn visit_with<V: Visit + ?Sized>(&self, v: &mut V) {
        v.visit_module(self)
    }

    pub fn visit_mut_with<V: VisitMut + ?Sized>(&mut self, v: &mut V) {
        v.visit_mut_module(self)
    }

    pub fn visit_children_with<V: Visit + ?Sized>(&self, v: &mut V) {
        for stmt in &self.body {
            v.visit_stmt(stmt);
        }
    }

    pub fn visit_mut_children_with<V: VisitMut + ?Sized>(&mut self, v: &mut V) {
        for stmt in &mut self.body {
            v.visit_mut_stmt(stmt);
        }
    }
}

impl Stmt {
    pub fn visit_children_with<V: Visit + ?Sized>(&self, v: &mut V) {
        match self {
            Stmt::Expr(s) => v.visit_expr(&s.expr),
            Stmt::Assign(s) => {
                for target in &s.targets {
                    v.visit_expr(target);
                }
                v.visit_expr(&s.value);
            }
            Stmt::AugAssign(s) => {
                v.visit_expr(&s.target);
                v.visit_expr(&s.value);
            }
            Stmt::FunctionDef(s) => {
                v.visit_ident(&s.name);
                for param in &s.params {
                    v.visit_param(param);
                }
                for stmt in &s.body {
                    v.visit_stmt(stmt);
                }
            }
            Stmt::Return(s) => {
                if let Some(value) = &s.value {
                    v.visit_expr(value);
                }
            }
            Stmt::If(s) => {
                v.visit_expr(&s.test);
                for stmt in s.body.iter().chain(&s.orelse) {
                    v.visit_stmt(stmt);
                }
            }
            Stmt::While(s) => {
                v.visit_expr(&s.test);
                for stmt in &s.body {
                    v.visit_stmt(stmt);
                }
            }
            Stmt::For(s) => {
                v.visit_expr(&s.target);
                v.visit_expr(&s.iter);
                for stmt in &s.body {
                    v.visit_stmt(stmt);
                }
            }
            Stmt::Import(s) => {
                for alias in &s.names {
                    v.visit_alias(alias);
                }
            }
            Stmt::ImportFrom(s) => {
                for alias in &s.names {
                    v.visit_alias(alias);
                }
            }
            Stmt::Assert(s) => {
                v.visit_expr(&s.test);
                if let Some(msg) = &s.msg {
                    v.visit_expr(msg);
                }
            }
            Stmt::Pass(_) | Stmt::Break(_) | Stmt::Continue(_) => {}
        }
    }

    pub fn visit_mut_children_with<V: VisitMut + ?Sized>(&mut self, v: &mut V) {
        match self {
            Stmt::Expr(s) => v.visit_mut_expr(&mut s.expr),
            Stmt::Assign(s) => {
                for target in &mut s.targets {
                    v.visit_mut_expr(target);
                }
                v.visit_mut_expr(&mut s.value);
            }
            Stmt::AugAssign(s) => {
                v.visit_mut_expr(&mut s.target);
                v.visit_mut_expr(&mut s.value);
            }
            Stmt::FunctionDef(s) => {
                v.visit_mut_ident(&mut s.name);
                for param in &mut s.params {
                    v.visit_mut_param(param);
                }
                for stmt in &mut s.body {
                    v.visit_mut_stmt(stmt);
                }
            }
            Stmt::Return(s) => {
                if let Some(value) = &mut s.value {
                    v.visit_mut_expr(value);
                }
            }
            Stmt::If(s) => {
                v.visit_mut_expr(&mut s.test);
                for stmt in s.body.iter_mut().chain(&mut s.orelse) {
                    v.visit_mut_stmt(stmt);
                }
            }
            Stmt::While(s) => {
                v.visit_mut_expr(&mut s.test);
                for stmt in &mut s.body {
                    v.visit_mut_stmt(stmt);
                }
            }
            Stmt::For(s) => {
                v.visit_mut_expr(&mut s.target);
                v.visit_mut_expr(&mut s.iter);
                for stmt in &mut s.body {
                    v.visit_mut_stmt(stmt);
                }
            }
            Stmt::Import(s) => {
                for alias in &mut s.names {
                    v.visit_mut_alias(alias);
                }
            }
            Stmt::ImportFrom(s) => {
                for alias in &mut s.names {
                    v.visit_mut_alias(alias);
                }
            }
            Stmt::Assert(s) => {
                v.visit_mut_expr(&mut s.test);
                if let Some(msg) = &mut s.msg {
                    v.visit_mut_expr(msg);
                }
            }
            Stmt::Pass(_) | Stmt::Break(_) | Stmt::Continue(_) => {}
        }
    }
}

impl Expr {
    pub fn visit_with<V: Visit + ?Sized>(&self, v: &mut V) {
        v.visit_expr(self)
    }

    pub fn visit_mut_with<V: VisitMut + ?Sized>(&mut self, v: &mut V) {
        v.visit_mut_expr(self)
    }

    pub fn visit_children_with<V: Visit + ?Sized>(&self, v: &mut V) {
        match self {
            Expr::Call(e) => {
                v.visit_expr(&e.func);
                for arg in &e.args {
                    v.visit_expr(arg);
                }
                for keyword in &e.keywords {
                    v.visit_keyword(keyword);
                }
            }
            Expr::Unary(e) => v.visit_expr(&e.operand),
            Expr::Bin(e) => {
                v.visit_expr(&e.left);
                v.visit_expr(&e.right);
            }
            Expr::Bool(e) => {
                for value in &e.values {
                    v.visit_expr(value);
                }
            }
            Expr::Compare(e) => {
                v.visit_expr(&e.left);
                for comparator in &e.comparators {
                    v.visit_expr(comparator);
                }
            }
            Expr::IfExp(e) => {
                v.visit_expr(&e.test);
                v.visit_expr(&e.body);
                v.visit_expr(&e.orelse);
            }
            Expr::List(ListExpr { elts, .. })
            | Expr::Tuple(TupleExpr { elts, .. })
            | Expr::Set(SetExpr { elts, .. }) => {
                for elt in elts {
                    v.visit_expr(elt);
                }
            }
            Expr::Dict(e) => {
                for entry in &e.entries {
                    v.visit_expr(&entry.key);
                    v.visit_expr(&entry.value);
                }
            }
            Expr::ListComp(ListComp {
                elt, generators, ..
            })
            | Expr::SetComp(SetComp {
                elt, generators, ..
            })
            | Expr::GeneratorExp(GeneratorExp {
                elt, generators, ..
            }) => {
                v.visit_expr(elt);
                for generator in generators {
                    v.visit_comprehension(generator);
                }
            }
            Expr::DictComp(e) => {
                v.visit_expr(&e.key);
                v.visit_expr(&e.value);
                for generator in &e.generators {
                    v.visit_comprehension(generator);
                }
            }
            Expr::Subscript(e) => {
                v.visit_expr(&e.value);
                v.visit_expr(&e.index);
            }
            Expr::Slice(e) => {
                for part in [&e.lower, &e.upper, &e.step].into_iter().flatten() {
                    v.visit_expr(part);
                }
            }
            Expr::Attribute(e) => {
                v.visit_expr(&e.value);
                v.visit_ident(&e.attr);
            }
            Expr::Lambda(e) => {
                for param in &e.params {
                    v.visit_param(param);
                }
                v.visit_expr(&e.body);
            }
            Expr::Name(ident) => v.visit_ident(ident),
            Expr::Lit(_) | Expr::Placeholder(_) => {}
        }
    }

    pub fn visit_mut_children_with<V: VisitMut + ?Sized>(&mut self, v: &mut V) {
        match self {
            Expr::Call(e) => {
                v.visit_mut_expr(&mut e.func);
                for arg in &mut e.args {
                    v.visit_mut_expr(arg);
                }
                for keyword in &mut e.keywords {
                    v.visit_mut_keyword(keyword);
                }
            }
            Expr::Unary(e) => v.visit_mut_expr(&mut e.operand),
            Expr::Bin(e) => {
                v.visit_mut_expr(&mut e.left);
                v.visit_mut_expr(&mut e.right);
            }
            Expr::Bool(e) => {
                for value in &mut e.values {
                    v.visit_mut_expr(value);
                }
            }
            Expr::Compare(e) => {
                v.visit_mut_expr(&mut e.left);
                for comparator in &mut e.comparators {
                    v.visit_mut_expr(comparator);
                }
            }
            Expr::IfExp(e) => {
                v.visit_mut_expr(&mut e.test);
                v.visit_mut_expr(&mut e.body);
                v.visit_mut_expr(&mut e.orelse);
            }
            Expr::List(ListExpr { elts, .. })
            | Expr::Tuple(TupleExpr { elts, .. })
            | Expr::Set(SetExpr { elts, .. }) => {
                for elt in elts {
                    v.visit_mut_expr(elt);
                }
            }
            Expr::Dict(e) => {
                for entry in &mut e.entries {
                    v.visit_mut_expr(&mut entry.key);
                    v.visit_mut_expr(&mut entry.value);
                }
            }
            Expr::ListComp(ListComp {
                elt, generators, ..
            })
            | Expr::SetComp(SetComp {
                elt, generators, ..
            })
            | Expr::GeneratorExp(GeneratorExp {
                elt, generators, ..
            }) => {
                v.visit_mut_expr(elt);
                for generator in generators {
                    v.visit_mut_comprehension(generator);
                }
            }
            Expr::DictComp(e) => {
                v.visit_mut_expr(&mut e.key);
                v.visit_mut_expr(&mut e.value);
                for generator in &mut e.generators {
                    v.visit_mut_comprehension(generator);
                }
            }
            Expr::Subscript(e) => {
                v.visit_mut_expr(&mut e.value);
                v.visit_mut_expr(&mut e.index);
            }
            Expr::Slice(e) => {
                for part in [&mut e.lower, &mut e.upper, &mut e.step]
                    .into_iter()
                    .flatten()
                {
                    v.visit_mut_expr(part);
                }
            }
            Expr::Attribute(e) => {
                v.visit_mut_expr(&mut e.value);
                v.visit_mut_ident(&mut e.attr);
            }
            Expr::Lambda(e) => {
                for param in &mut e.params {
                    v.visit_mut_param(param);
                }
                v.visit_mut_expr(&mut e.body);
            }
            Expr::Name(ident) => v.visit_mut_ident(ident),
            Expr::Lit(_) | Expr::Placeholder(_) => {}
        }
    }
}

impl Keyword {
    pub fn visit_children_with<V: Visit + ?Sized>(&self, v: &mut V) {
        v.visit_ident(&self.arg);
        v.visit_expr(&self.value);
    }

    pub fn visit_mut_children_with<V: VisitMut + ?Sized>(&mut self, v: &mut V) {
        v.visit_mut_ident(&mut self.arg);
        v.visit_mut_expr(&mut self.value);
    }
}

impl Comprehension {
    pub fn visit_children_with<V: Visit + ?Sized>(&self, v: &mut V) {
        v.visit_expr(&self.target);
        v.visit_expr(&self.iter);
        for cond in &self.ifs {
            v.visit_expr(cond);
        }
    }

    pub fn visit_mut_children_with<V: VisitMut + ?Sized>(&mut self, v: &mut V) {
        v.visit_mut_expr(&mut self.target);
        v.visit_mut_expr(&mut self.iter);
        for cond in &mut self.ifs {
            v.visit_mut_expr(cond);
        }
    }
}

impl Param {
    pub fn visit_children_with<V: Visit + ?Sized>(&self, v: &mut V) {
        v.visit_ident(&self.name);
        if let Some(default) = &self.default {
            v.visit_expr(default);
        }
    }

    pub fn visit_mut_children_with<V: VisitMut + ?Sized>(&mut self, v: &mut V) {
        v.visit_mut_ident(&mut self.name);
        if let Some(default) = &mut self.default {
            v.visit_mut_expr(default);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sp(lo: u32, hi: u32) -> Span {
        Span::new(BytePos(lo), BytePos(hi))
    }

    struct NameCollector(Vec<String>);

    impl Visit for NameCollector {
        fn visit_ident(&mut self, n: &Ident) {
            self.0.push(n.sym.clone());
        }
    }

    struct Renamer;

    impl VisitMut for Renamer {
        fn visit_mut_ident(&mut self, n: &mut Ident) {
            n.sym = n.sym.to_uppercase();
        }
    }

    fn call_f_x_kw() -> Expr {
        // f(x, key=y)
        Expr::Call(CallExpr {
            span: sp(1, 12),
            func: Box::new(Expr::name("f", sp(1, 2))),
            args: vec![Expr::name("x", sp(3, 4))],
            keywords: vec![Keyword {
                span: sp(6, 11),
                arg: Ident::new("key", sp(6, 9)),
                value: Box::new(Expr::name("y", sp(10, 11))),
            }],
        })
    }

    #[test]
    fn visit_reaches_every_identifier_in_order() {
        let mut collector = NameCollector(Vec::new());
        call_f_x_kw().visit_with(&mut collector);
        assert_eq!(collector.0, vec!["f", "x", "key", "y"]);
    }

    #[test]
    fn visit_mut_rewrites_in_place() {
        let mut expr = call_f_x_kw();
        expr.visit_mut_with(&mut Renamer);
        let mut collector = NameCollector(Vec::new());
        expr.visit_with(&mut collector);
        assert_eq!(collector.0, vec!["F", "X", "KEY", "Y"]);
    }

    #[test]
    fn alias_binding_defaults_to_last_segment() {
        let alias = Alias {
            span: sp(1, 4),
            name: "pkg.mod".into(),
            asname: None,
        };
        assert_eq!(alias.binding(), "mod");

        let aliased = Alias {
            span: sp(1, 4),
            name: "pkg.mod".into(),
            asname: Some(Ident::new("m", sp(3, 4))),
        };
        assert_eq!(aliased.binding(), "m");
    }
}
