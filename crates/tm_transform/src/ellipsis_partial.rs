//! Placeholder capture: `f(1, ...)` → `lambda _: f(1, _)`.
//!
//! Only a fixed set of expression kinds can capture a placeholder. Calls and
//! comprehensions search their whole subtree, the remaining gated kinds only
//! look at their immediate children. Below a call, a placeholder belongs to
//! the nearest gated ancestor that reaches it. A comprehension takes every
//! placeholder in its subtree, nested calls included. So
//!
//! - `f(g(...), ...)` → `lambda _: f(lambda __: g(__), _)`
//! - `map(... * 2, xs)` → `map(lambda _: _ * 2, xs)`
//! - `[x for x in ...]` → `lambda _: [x for x in _]`
//! - `[x for x in range(...)]` → `lambda _: [x for x in range(_)]`
//!
//! Subscript indexes are never searched or rewritten: `a[...]` keeps its
//! ordinary meaning.

use std::collections::HashSet;

use log::debug;
use tm_ast::visit::{Visit, VisitMut};
use tm_ast::*;

use crate::Transformer;

/// The `ellipsis_partial` transformer.
#[derive(Debug, Default)]
pub struct EllipsisPartial {
    counter: usize,
    taken: HashSet<String>,
}

impl EllipsisPartial {
    pub const NAME: &'static str = "ellipsis_partial";

    pub fn new() -> Self {
        Self::default()
    }

    /// Next unused name in the sequence `_`, `__`, `___`, ...
    fn fresh_name(&mut self) -> String {
        loop {
            self.counter += 1;
            let name = "_".repeat(self.counter);
            if self.taken.insert(name.clone()) {
                return name;
            }
        }
    }

    fn wrap(&mut self, expr: &mut Expr) {
        let param = self.fresh_name();
        let whole = containment(expr) == Some(Containment::Subtree);
        debug!("capturing placeholders of {} as `{param}`", expr.kind());

        expr.visit_mut_children_with(&mut Substitute {
            param: &param,
            whole,
        });
        expr.visit_mut_children_with(self);

        let span = expr.span();
        let body = std::mem::replace(expr, Expr::Placeholder(Placeholder { span }));
        *expr = closure(param, span, body);
    }
}

impl Transformer for EllipsisPartial {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn visit(&mut self, module: &mut Module) {
        let mut names = NameCollector::default();
        module.visit_with(&mut names);
        self.taken.extend(names.0);
        module.visit_mut_with(self);
    }
}

impl VisitMut for EllipsisPartial {
    fn visit_mut_expr(&mut self, n: &mut Expr) {
        match n {
            Expr::Subscript(s) => self.visit_mut_expr(&mut s.value),
            _ if captures(n) => self.wrap(n),
            _ => n.visit_mut_children_with(self),
        }
    }

    fn visit_mut_keyword(&mut self, n: &mut Keyword) {
        if !keyword_captures(n) {
            n.visit_mut_children_with(self);
            return;
        }
        let param = self.fresh_name();
        debug!("capturing keyword `{}` as `{param}`", n.arg);
        let span = n.value.span();
        *n.value = closure(param.clone(), span, Expr::name(param, span));
    }
}

/// `lambda <param>: <body>`, positioned where `body` was.
fn closure(param: String, span: Span, body: Expr) -> Expr {
    Expr::Lambda(LambdaExpr {
        span,
        params: vec![Param {
            span,
            name: Ident::new(param, span),
            default: None,
        }],
        body: Box::new(body),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Containment {
    /// Every placeholder in the subtree.
    Subtree,
    /// The subtree minus what gated descendants capture themselves.
    Recursive,
    SingleLevel,
}

fn containment(expr: &Expr) -> Option<Containment> {
    match expr {
        Expr::Call(_) => Some(Containment::Recursive),
        Expr::ListComp(_) | Expr::SetComp(_) | Expr::DictComp(_) | Expr::GeneratorExp(_) => {
            Some(Containment::Subtree)
        }
        Expr::Unary(_)
        | Expr::Bin(_)
        | Expr::Bool(_)
        | Expr::Compare(_)
        | Expr::IfExp(_)
        | Expr::List(_)
        | Expr::Set(_)
        | Expr::Dict(_) => Some(Containment::SingleLevel),
        Expr::Tuple(_)
        | Expr::Subscript(_)
        | Expr::Slice(_)
        | Expr::Attribute(_)
        | Expr::Lambda(_)
        | Expr::Name(_)
        | Expr::Lit(_)
        | Expr::Placeholder(_) => None,
    }
}

/// Whether `expr` is gated and owns at least one placeholder.
fn captures(expr: &Expr) -> bool {
    match containment(expr) {
        None => false,
        Some(Containment::SingleLevel) => {
            let mut probe = ChildProbe(false);
            expr.visit_children_with(&mut probe);
            probe.0
        }
        Some(Containment::Recursive) => {
            let mut probe = ScopeProbe::new(false);
            expr.visit_children_with(&mut probe);
            probe.found
        }
        Some(Containment::Subtree) => {
            let mut probe = ScopeProbe::new(true);
            expr.visit_children_with(&mut probe);
            probe.found
        }
    }
}

fn keyword_captures(keyword: &Keyword) -> bool {
    keyword.value.is_placeholder()
}

/// Looks at immediate expression children only.
struct ChildProbe(bool);

impl Visit for ChildProbe {
    fn visit_expr(&mut self, n: &Expr) {
        self.0 |= n.is_placeholder();
    }

    fn visit_keyword(&mut self, _n: &Keyword) {}

    fn visit_comprehension(&mut self, _n: &Comprehension) {}
}

/// Searches the capture scope of a node: everything below it except
/// subscript indexes and, unless `whole` is set, the scopes of gated
/// descendants that capture.
struct ScopeProbe {
    found: bool,
    whole: bool,
}

impl ScopeProbe {
    fn new(whole: bool) -> Self {
        ScopeProbe {
            found: false,
            whole,
        }
    }
}

impl Visit for ScopeProbe {
    fn visit_expr(&mut self, n: &Expr) {
        if self.found {
            return;
        }
        match n {
            Expr::Placeholder(_) => self.found = true,
            Expr::Subscript(s) => self.visit_expr(&s.value),
            _ if !self.whole && captures(n) => {}
            _ => n.visit_children_with(self),
        }
    }

    fn visit_keyword(&mut self, n: &Keyword) {
        if self.whole || !keyword_captures(n) {
            n.visit_children_with(self);
        }
    }
}

/// Replaces the placeholders in one capture scope with `param`.
struct Substitute<'a> {
    param: &'a str,
    whole: bool,
}

impl VisitMut for Substitute<'_> {
    fn visit_mut_expr(&mut self, n: &mut Expr) {
        match n {
            Expr::Placeholder(p) => {
                let span = p.span;
                *n = Expr::name(self.param, span);
            }
            Expr::Subscript(s) => self.visit_mut_expr(&mut s.value),
            _ if !self.whole && captures(n) => {}
            _ => n.visit_mut_children_with(self),
        }
    }

    fn visit_mut_keyword(&mut self, n: &mut Keyword) {
        if self.whole || !keyword_captures(n) {
            n.visit_mut_children_with(self);
        }
    }
}

/// Every identifier spelled anywhere in the module.
#[derive(Default)]
struct NameCollector(HashSet<String>);

impl Visit for NameCollector {
    fn visit_ident(&mut self, n: &Ident) {
        self.0.insert(n.sym.clone());
    }

    fn visit_alias(&mut self, n: &Alias) {
        self.0.insert(n.binding().to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tm_codegen::emit_module;
    use tm_parser::parse_module;

    fn parse(source: &str) -> Module {
        parse_module(source, "partial.tm")
            .unwrap_or_else(|e| panic!("{e}"))
            .module
    }

    fn transform(source: &str) -> String {
        let mut module = parse(source);
        EllipsisPartial::new().visit(&mut module);
        emit_module(&module)
    }

    #[test]
    fn call_argument_becomes_parameter() {
        assert_eq!(
            transform("result = add(1, ...)\n"),
            "result = lambda _: add(1, _)\n"
        );
    }

    #[test]
    fn every_placeholder_in_one_call_shares_the_parameter() {
        assert_eq!(transform("f(..., x, ...)\n"), "lambda _: f(_, x, _)\n");
    }

    #[test]
    fn nested_calls_get_their_own_closures() {
        assert_eq!(
            transform("f(g(...), ...)\n"),
            "lambda _: f(lambda __: g(__), _)\n"
        );
        assert_eq!(transform("f(g(...))\n"), "f(lambda _: g(_))\n");
    }

    #[test]
    fn operators_capture_their_immediate_operands() {
        assert_eq!(
            transform("ys = map(... * 2, xs)\n"),
            "ys = map(lambda _: _ * 2, xs)\n"
        );
        assert_eq!(transform("n = -...\n"), "n = lambda _: -_\n");
        assert_eq!(
            transform("ok = ... < 3 and ready\n"),
            "ok = (lambda _: _ < 3) and ready\n"
        );
        assert_eq!(
            transform("v = a if ... else b\n"),
            "v = lambda _: a if _ else b\n"
        );
    }

    #[test]
    fn single_level_kinds_do_not_look_through_other_nodes() {
        // The tuple is not gated and the binary operation only sees it, so
        // the placeholder stays where it is.
        assert_eq!(transform("x = 1 + (2, ...)\n"), "x = 1 + (2, ...)\n");
    }

    #[test]
    fn calls_look_through_ungated_nodes() {
        assert_eq!(transform("f((1, ...))\n"), "lambda _: f((1, _))\n");
        assert_eq!(transform("f(x + (2, ...))\n"), "lambda _: f(x + (2, _))\n");
    }

    #[test]
    fn displays_capture_their_elements() {
        assert_eq!(transform("xs = [1, ...]\n"), "xs = lambda _: [1, _]\n");
        assert_eq!(transform("s = {...}\n"), "s = lambda _: {_}\n");
        assert_eq!(
            transform("d = {\"k\": ...}\n"),
            "d = lambda _: {\"k\": _}\n"
        );
        assert_eq!(
            transform("f([1, ...])\n"),
            "f(lambda _: [1, _])\n"
        );
    }

    #[test]
    fn comprehensions_search_their_generators() {
        assert_eq!(
            transform("evens = [x for x in ... if x % 2 == 0]\n"),
            "evens = lambda _: [x for x in _ if x % 2 == 0]\n"
        );
        assert_eq!(
            transform("pairs = {k: v for (k, v) in ...}\n"),
            "pairs = lambda _: {k: v for (k, v) in _}\n"
        );
        assert_eq!(
            transform("total = sum(x for x in ...)\n"),
            "total = sum(lambda _: (x for x in _))\n"
        );
    }

    #[test]
    fn comprehensions_take_placeholders_of_nested_calls() {
        assert_eq!(
            transform("s = {x for x in range(...)}\n"),
            "s = lambda _: {x for x in range(_)}\n"
        );
        assert_eq!(
            transform("fs = [f(x, ...) for x in xs]\n"),
            "fs = lambda _: [f(x, _) for x in xs]\n"
        );
        assert_eq!(
            transform("r = [g(x, k=...) for x in h(... + 1)]\n"),
            "r = lambda _: [g(x, k=_) for x in h(_ + 1)]\n"
        );
        assert_eq!(
            transform("r = [a[f(...)] for a in ...]\n"),
            "r = lambda _: [a[f(...)] for a in _]\n"
        );
    }

    #[test]
    fn calls_leave_capturing_comprehensions_alone() {
        assert_eq!(
            transform("n = f([g(...) for x in xs], ...)\n"),
            "n = lambda _: f(lambda __: [g(__) for x in xs], _)\n"
        );
    }

    #[test]
    fn keyword_values_are_wrapped() {
        assert_eq!(
            transform("f(x, key=...)\n"),
            "f(x, key=lambda _: _)\n"
        );
    }

    #[test]
    fn subscript_indexes_are_untouched() {
        assert_eq!(transform("y = a[...]\n"), "y = a[...]\n");
        assert_eq!(transform("f(a[...])\n"), "f(a[...])\n");
        assert_eq!(
            transform("f(a[..., 0], ...)\n"),
            "lambda _: f(a[..., 0], _)\n"
        );
        assert_eq!(transform("f((...)[0])\n"), "lambda _: f(_[0])\n");
    }

    #[test]
    fn gated_nodes_inside_subscript_indexes_are_untouched() {
        assert_eq!(transform("y = a[f(...)]\n"), "y = a[f(...)]\n");
        assert_eq!(transform("y = a[... + 1]\n"), "y = a[... + 1]\n");
        assert_eq!(transform("y = a[[...]][g(...)]\n"), "y = a[[...]][g(...)]\n");
        assert_eq!(
            transform("r = f(a[g(...)], ...)\n"),
            "r = lambda _: f(a[g(...)], _)\n"
        );
    }

    #[test]
    fn generated_names_avoid_existing_identifiers() {
        assert_eq!(
            transform("_ = 1\nr = f(_, ...)\n"),
            "_ = 1\nr = lambda __: f(_, __)\n"
        );
    }

    #[test]
    fn code_without_placeholders_is_unchanged() {
        let source = "\
def f(a, b=2):
    return [a * x for x in range(b) if x]
y = f(1)[0] + g(k=2)
";
        let before = parse(source);
        let mut after = before.clone();
        EllipsisPartial::new().visit(&mut after);
        assert_eq!(before, after);
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let mut module = parse("r = f(g(...), [..., 1], k=...)\n");
        EllipsisPartial::new().visit(&mut module);
        let once = module.clone();
        EllipsisPartial::new().visit(&mut module);
        assert_eq!(once, module);
    }

    #[test]
    fn synthesized_nodes_keep_positions() {
        let mut module = parse("r = add(1, ...)\n");
        EllipsisPartial::new().visit(&mut module);
        let Stmt::Assign(assign) = &module.body[0] else {
            panic!("expected assignment");
        };
        let Expr::Lambda(lambda) = assign.value.as_ref() else {
            panic!("expected lambda, got {}", assign.value.kind());
        };
        assert!(!lambda.span.is_dummy());
        assert!(!lambda.params[0].span.is_dummy());
        let Expr::Call(call) = lambda.body.as_ref() else {
            panic!("expected call");
        };
        assert!(!call.args[1].span().is_dummy());
        assert_eq!(lambda.span, call.span);
    }

    #[test]
    fn counter_is_per_instance() {
        assert_eq!(transform("f(...)\n"), "lambda _: f(_)\n");
        assert_eq!(transform("f(...)\n"), "lambda _: f(_)\n");
    }
}
