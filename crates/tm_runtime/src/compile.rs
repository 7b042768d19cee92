//! Static validation that turns a tree into an executable [`CodeUnit`].
//!
//! The interpreter trusts a compiled tree: every node has a source location,
//! control flow is well nested, and placeholders only appear where they have
//! a value (inside subscript indexes, where `...` means `Ellipsis`).

use std::collections::HashSet;
use std::fmt;

use tm_ast::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompileErrorKind {
    MissingLocation,
    /// `...` somewhere no transformer captured it.
    UnsupportedPlaceholder,
    SliceOutsideSubscript,
    InvalidTarget,
    ReturnOutsideFunction,
    LoopControlOutsideLoop,
    DuplicateParameter,
    DuplicateKeyword,
    NonDefaultAfterDefault,
    EmptyBody,
    Malformed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub message: String,
    pub filename: String,
    pub span: Span,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.filename, self.message)
    }
}

impl std::error::Error for CompileError {}

/// A validated module, ready to execute.
#[derive(Debug, Clone)]
pub struct CodeUnit {
    pub filename: String,
    pub module: Module,
}

/// Validate `module` and package it for execution.
pub fn compile(module: Module, filename: &str) -> Result<CodeUnit, CompileError> {
    let mut checker = Checker {
        filename,
        functions: 0,
        loops: 0,
        index_depth: 0,
    };
    for stmt in &module.body {
        checker.stmt(stmt)?;
    }
    Ok(CodeUnit {
        filename: filename.to_string(),
        module,
    })
}

type CResult = Result<(), CompileError>;

struct Checker<'a> {
    filename: &'a str,
    functions: usize,
    loops: usize,
    index_depth: usize,
}

impl Checker<'_> {
    fn error(&self, kind: CompileErrorKind, span: Span, message: impl Into<String>) -> CompileError {
        CompileError {
            kind,
            message: message.into(),
            filename: self.filename.to_string(),
            span,
        }
    }

    fn located(&self, span: Span, what: &str) -> CResult {
        if span.is_dummy() {
            return Err(self.error(
                CompileErrorKind::MissingLocation,
                span,
                format!("{what} node has no source location"),
            ));
        }
        Ok(())
    }

    fn ident(&self, ident: &Ident) -> CResult {
        self.located(ident.span, "identifier")
    }

    fn block(&mut self, body: &[Stmt], owner: Span, what: &str) -> CResult {
        if body.is_empty() {
            return Err(self.error(
                CompileErrorKind::EmptyBody,
                owner,
                format!("expected an indented block in {what}"),
            ));
        }
        body.iter().try_for_each(|stmt| self.stmt(stmt))
    }

    fn loop_body(&mut self, body: &[Stmt], owner: Span, what: &str) -> CResult {
        self.loops += 1;
        let result = self.block(body, owner, what);
        self.loops -= 1;
        result
    }

    fn stmt(&mut self, stmt: &Stmt) -> CResult {
        self.located(stmt.span(), stmt.kind())?;
        match stmt {
            Stmt::Expr(s) => self.expr(&s.expr),
            Stmt::Assign(s) => {
                if s.targets.is_empty() {
                    return Err(self.error(
                        CompileErrorKind::Malformed,
                        s.span,
                        "assignment without a target",
                    ));
                }
                for target in &s.targets {
                    self.target(target)?;
                }
                self.expr(&s.value)
            }
            Stmt::AugAssign(s) => {
                match s.target.as_ref() {
                    Expr::Name(_) | Expr::Subscript(_) | Expr::Attribute(_) => {
                        self.target(&s.target)?
                    }
                    other => {
                        return Err(self.error(
                            CompileErrorKind::InvalidTarget,
                            other.span(),
                            format!(
                                "illegal expression for augmented assignment: {}",
                                other.kind()
                            ),
                        ))
                    }
                }
                self.expr(&s.value)
            }
            Stmt::FunctionDef(s) => {
                self.ident(&s.name)?;
                self.params(&s.params)?;
                let loops = std::mem::replace(&mut self.loops, 0);
                self.functions += 1;
                let result = self.block(&s.body, s.span, "function definition");
                self.functions -= 1;
                self.loops = loops;
                result
            }
            Stmt::Return(s) => {
                if self.functions == 0 {
                    return Err(self.error(
                        CompileErrorKind::ReturnOutsideFunction,
                        s.span,
                        "'return' outside function",
                    ));
                }
                s.value.as_deref().map_or(Ok(()), |value| self.expr(value))
            }
            Stmt::If(s) => {
                self.expr(&s.test)?;
                self.block(&s.body, s.span, "'if' statement")?;
                s.orelse.iter().try_for_each(|stmt| self.stmt(stmt))
            }
            Stmt::While(s) => {
                self.expr(&s.test)?;
                self.loop_body(&s.body, s.span, "'while' statement")
            }
            Stmt::For(s) => {
                self.target(&s.target)?;
                self.expr(&s.iter)?;
                self.loop_body(&s.body, s.span, "'for' statement")
            }
            Stmt::Import(ImportStmt { span, names })
            | Stmt::ImportFrom(ImportFromStmt { span, names, .. }) => {
                if names.is_empty() {
                    return Err(self.error(
                        CompileErrorKind::Malformed,
                        *span,
                        "import without names",
                    ));
                }
                for alias in names {
                    self.located(alias.span, "alias")?;
                    if let Some(asname) = &alias.asname {
                        self.ident(asname)?;
                    }
                }
                Ok(())
            }
            Stmt::Assert(s) => {
                self.expr(&s.test)?;
                s.msg.as_deref().map_or(Ok(()), |msg| self.expr(msg))
            }
            Stmt::Pass(_) => Ok(()),
            Stmt::Break(BreakStmt { span }) | Stmt::Continue(ContinueStmt { span }) => {
                if self.loops == 0 {
                    let keyword = if matches!(stmt, Stmt::Break(_)) {
                        "break"
                    } else {
                        "continue"
                    };
                    return Err(self.error(
                        CompileErrorKind::LoopControlOutsideLoop,
                        *span,
                        format!("'{keyword}' outside loop"),
                    ));
                }
                Ok(())
            }
        }
    }

    fn target(&mut self, target: &Expr) -> CResult {
        match target {
            Expr::Name(ident) => {
                self.located(target.span(), target.kind())?;
                self.ident(ident)
            }
            Expr::Tuple(TupleExpr { span, elts }) | Expr::List(ListExpr { span, elts }) => {
                self.located(*span, target.kind())?;
                elts.iter().try_for_each(|elt| self.target(elt))
            }
            Expr::Subscript(_) | Expr::Attribute(_) => self.expr(target),
            other => Err(self.error(
                CompileErrorKind::InvalidTarget,
                other.span(),
                format!("cannot assign to {}", other.kind()),
            )),
        }
    }

    fn params(&mut self, params: &[Param]) -> CResult {
        let mut seen = HashSet::new();
        let mut seen_default = false;
        for param in params {
            self.located(param.span, "parameter")?;
            self.ident(&param.name)?;
            if !seen.insert(param.name.sym.as_str()) {
                return Err(self.error(
                    CompileErrorKind::DuplicateParameter,
                    param.span,
                    format!("duplicate parameter '{}'", param.name),
                ));
            }
            match &param.default {
                Some(default) => {
                    seen_default = true;
                    self.expr(default)?;
                }
                None if seen_default => {
                    return Err(self.error(
                        CompileErrorKind::NonDefaultAfterDefault,
                        param.span,
                        format!(
                            "non-default parameter '{}' follows default parameter",
                            param.name
                        ),
                    ))
                }
                None => {}
            }
        }
        Ok(())
    }

    fn generators(&mut self, generators: &[Comprehension], owner: Span) -> CResult {
        if generators.is_empty() {
            return Err(self.error(
                CompileErrorKind::Malformed,
                owner,
                "comprehension without a 'for' clause",
            ));
        }
        for generator in generators {
            self.located(generator.span, "comprehension")?;
            self.target(&generator.target)?;
            self.expr(&generator.iter)?;
            generator.ifs.iter().try_for_each(|cond| self.expr(cond))?;
        }
        Ok(())
    }

    fn subscript_index(&mut self, index: &Expr) -> CResult {
        self.index_depth += 1;
        let result = match index {
            Expr::Tuple(tuple) => {
                self.located(tuple.span, "Tuple")
                    .and_then(|_| tuple.elts.iter().try_for_each(|elt| self.expr(elt)))
            }
            other => self.expr(other),
        };
        self.index_depth -= 1;
        result
    }

    fn expr(&mut self, expr: &Expr) -> CResult {
        self.located(expr.span(), expr.kind())?;
        match expr {
            Expr::Call(e) => {
                self.expr(&e.func)?;
                e.args.iter().try_for_each(|arg| self.expr(arg))?;
                let mut seen = HashSet::new();
                for keyword in &e.keywords {
                    self.located(keyword.span, "keyword")?;
                    self.ident(&keyword.arg)?;
                    if !seen.insert(keyword.arg.sym.as_str()) {
                        return Err(self.error(
                            CompileErrorKind::DuplicateKeyword,
                            keyword.span,
                            format!("keyword argument repeated: {}", keyword.arg),
                        ));
                    }
                    self.expr(&keyword.value)?;
                }
                Ok(())
            }
            Expr::Unary(e) => self.expr(&e.operand),
            Expr::Bin(e) => {
                self.expr(&e.left)?;
                self.expr(&e.right)
            }
            Expr::Bool(e) => {
                if e.values.len() < 2 {
                    return Err(self.error(
                        CompileErrorKind::Malformed,
                        e.span,
                        format!("'{}' needs at least two operands", e.op),
                    ));
                }
                e.values.iter().try_for_each(|value| self.expr(value))
            }
            Expr::Compare(e) => {
                if e.ops.is_empty() || e.ops.len() != e.comparators.len() {
                    return Err(self.error(
                        CompileErrorKind::Malformed,
                        e.span,
                        format!(
                            "comparison has {} operators but {} comparators",
                            e.ops.len(),
                            e.comparators.len()
                        ),
                    ));
                }
                self.expr(&e.left)?;
                e.comparators.iter().try_for_each(|c| self.expr(c))
            }
            Expr::IfExp(e) => {
                self.expr(&e.test)?;
                self.expr(&e.body)?;
                self.expr(&e.orelse)
            }
            Expr::List(ListExpr { elts, .. })
            | Expr::Tuple(TupleExpr { elts, .. })
            | Expr::Set(SetExpr { elts, .. }) => elts.iter().try_for_each(|elt| self.expr(elt)),
            Expr::Dict(e) => e.entries.iter().try_for_each(|entry| {
                self.expr(&entry.key)?;
                self.expr(&entry.value)
            }),
            Expr::ListComp(ListComp {
                span,
                elt,
                generators,
            })
            | Expr::SetComp(SetComp {
                span,
                elt,
                generators,
            })
            | Expr::GeneratorExp(GeneratorExp {
                span,
                elt,
                generators,
            }) => {
                self.generators(generators, *span)?;
                self.expr(elt)
            }
            Expr::DictComp(e) => {
                self.generators(&e.generators, e.span)?;
                self.expr(&e.key)?;
                self.expr(&e.value)
            }
            Expr::Subscript(e) => {
                self.expr(&e.value)?;
                self.subscript_index(&e.index)
            }
            Expr::Slice(e) => {
                if self.index_depth == 0 {
                    return Err(self.error(
                        CompileErrorKind::SliceOutsideSubscript,
                        e.span,
                        "slice outside a subscript",
                    ));
                }
                [&e.lower, &e.upper, &e.step]
                    .into_iter()
                    .flatten()
                    .try_for_each(|part| self.expr(part))
            }
            Expr::Attribute(e) => {
                self.expr(&e.value)?;
                self.ident(&e.attr)
            }
            Expr::Lambda(e) => {
                self.params(&e.params)?;
                self.expr(&e.body)
            }
            Expr::Name(ident) => self.ident(ident),
            Expr::Lit(_) => Ok(()),
            Expr::Placeholder(p) => {
                if self.index_depth == 0 {
                    return Err(self.error(
                        CompileErrorKind::UnsupportedPlaceholder,
                        p.span,
                        "'...' placeholder is not part of any expression that can capture it",
                    ));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tm_ast::visit::VisitMut;
    use tm_parser::parse_module;

    fn check(source: &str) -> Result<CodeUnit, CompileError> {
        let module = parse_module(source, "check.tm")
            .unwrap_or_else(|e| panic!("{e}"))
            .module;
        compile(module, "check.tm")
    }

    fn kind_of(source: &str) -> CompileErrorKind {
        match check(source) {
            Ok(_) => panic!("expected compile error for {source:?}"),
            Err(err) => err.kind,
        }
    }

    #[test]
    fn valid_module_compiles() {
        let unit = check(
            "\
def f(a, b=1):
    for x in a:
        if x:
            continue
        while b:
            break
    return a[...] + a[1:2]
g = lambda x: 1
",
        )
        .unwrap();
        assert_eq!(unit.filename, "check.tm");
        assert_eq!(unit.module.body.len(), 2);
    }

    #[test]
    fn uncaptured_placeholder_is_rejected() {
        assert_eq!(kind_of("x = ...\n"), CompileErrorKind::UnsupportedPlaceholder);
        assert_eq!(kind_of("f(...)\n"), CompileErrorKind::UnsupportedPlaceholder);
        assert!(check("y = a[..., 0]\n").is_ok());
    }

    #[test]
    fn control_flow_must_nest() {
        assert_eq!(kind_of("return 1\n"), CompileErrorKind::ReturnOutsideFunction);
        assert_eq!(kind_of("break\n"), CompileErrorKind::LoopControlOutsideLoop);
        assert_eq!(
            kind_of("while x:\n    def f():\n        continue\n"),
            CompileErrorKind::LoopControlOutsideLoop
        );
    }

    #[test]
    fn parameters_and_keywords_are_checked() {
        assert_eq!(kind_of("def f(a, a):\n    pass\n"), CompileErrorKind::DuplicateParameter);
        assert_eq!(
            kind_of("def f(a=1, b):\n    pass\n"),
            CompileErrorKind::NonDefaultAfterDefault
        );
        assert_eq!(kind_of("f(k=1, k=2)\n"), CompileErrorKind::DuplicateKeyword);
        assert_eq!(kind_of("g = lambda a, a: a\n"), CompileErrorKind::DuplicateParameter);
    }

    #[test]
    fn assignment_targets_are_checked() {
        assert_eq!(kind_of("f() = 1\n"), CompileErrorKind::InvalidTarget);
        assert_eq!(kind_of("a, b += 1\n"), CompileErrorKind::InvalidTarget);
        assert!(check("a, [b, c] = 1, [2, 3]\nxs[0] = m.attr = 4\n").is_ok());
    }

    struct EraseSpans;

    impl VisitMut for EraseSpans {
        fn visit_mut_expr(&mut self, n: &mut Expr) {
            if let Expr::Lit(lit) = n {
                lit.span = DUMMY_SP;
            }
            n.visit_mut_children_with(self);
        }
    }

    #[test]
    fn synthesized_nodes_need_locations() {
        let mut module = parse_module("x = f(1)\n", "check.tm").unwrap().module;
        module.visit_mut_with(&mut EraseSpans);
        let err = compile(module, "check.tm").err().unwrap();
        assert_eq!(err.kind, CompileErrorKind::MissingLocation);
        assert_eq!(err.to_string(), "check.tm: Lit node has no source location");
    }

    #[test]
    fn structural_problems_are_malformed() {
        let mut module = parse_module("x = a < b\n", "check.tm").unwrap().module;
        let Stmt::Assign(assign) = &mut module.body[0] else {
            panic!("expected assignment");
        };
        let Expr::Compare(cmp) = assign.value.as_mut() else {
            panic!("expected comparison");
        };
        cmp.comparators.clear();
        let err = compile(module, "check.tm").err().unwrap();
        assert_eq!(err.kind, CompileErrorKind::Malformed);
    }

    #[test]
    fn empty_bodies_are_rejected() {
        let mut module = parse_module("def f():\n    pass\n", "check.tm").unwrap().module;
        let Stmt::FunctionDef(def) = &mut module.body[0] else {
            panic!("expected def");
        };
        def.body.clear();
        let err = compile(module, "check.tm").err().unwrap();
        assert_eq!(err.kind, CompileErrorKind::EmptyBody);
    }
}
