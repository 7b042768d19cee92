//! Statement nodes.

use serde::Serialize;
use swc_common::{Span, Spanned};

use crate::{BinaryOp, Expr, Ident, Param};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Stmt {
    Expr(ExprStmt),
    Assign(AssignStmt),
    AugAssign(AugAssignStmt),
    FunctionDef(FunctionDef),
    Return(ReturnStmt),
    If(IfStmt),
    While(WhileStmt),
    For(ForStmt),
    Import(ImportStmt),
    ImportFrom(ImportFromStmt),
    Assert(AssertStmt),
    Pass(PassStmt),
    Break(BreakStmt),
    Continue(ContinueStmt),
}

impl Stmt {
    pub fn kind(&self) -> &'static str {
        match self {
            Stmt::Expr(_) => "Expr",
            Stmt::Assign(_) => "Assign",
            Stmt::AugAssign(_) => "AugAssign",
            Stmt::FunctionDef(_) => "FunctionDef",
            Stmt::Return(_) => "Return",
            Stmt::If(_) => "If",
            Stmt::While(_) => "While",
            Stmt::For(_) => "For",
            Stmt::Import(_) => "Import",
            Stmt::ImportFrom(_) => "ImportFrom",
            Stmt::Assert(_) => "Assert",
            Stmt::Pass(_) => "Pass",
            Stmt::Break(_) => "Break",
            Stmt::Continue(_) => "Continue",
        }
    }
}

impl Spanned for Stmt {
    fn span(&self) -> Span {
        match self {
            Stmt::Expr(s) => s.span,
            Stmt::Assign(s) => s.span,
            Stmt::AugAssign(s) => s.span,
            Stmt::FunctionDef(s) => s.span,
            Stmt::Return(s) => s.span,
            Stmt::If(s) => s.span,
            Stmt::While(s) => s.span,
            Stmt::For(s) => s.span,
            Stmt::Import(s) => s.span,
            Stmt::ImportFrom(s) => s.span,
            Stmt::Assert(s) => s.span,
            Stmt::Pass(s) => s.span,
            Stmt::Break(s) => s.span,
            Stmt::Continue(s) => s.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExprStmt {
    #[serde(skip)]
    pub span: Span,
    pub expr: Box<Expr>,
}

/// `t0 = t1 = ... = value`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignStmt {
    #[serde(skip)]
    pub span: Span,
    pub targets: Vec<Expr>,
    pub value: Box<Expr>,
}

/// `target op= value`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AugAssignStmt {
    #[serde(skip)]
    pub span: Span,
    pub target: Box<Expr>,
    pub op: BinaryOp,
    pub value: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDef {
    #[serde(skip)]
    pub span: Span,
    pub name: Ident,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnStmt {
    #[serde(skip)]
    pub span: Span,
    pub value: Option<Box<Expr>>,
}

/// `if`; an `elif` chain is an `IfStmt` as the only statement of `orelse`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IfStmt {
    #[serde(skip)]
    pub span: Span,
    pub test: Box<Expr>,
    pub body: Vec<Stmt>,
    pub orelse: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WhileStmt {
    #[serde(skip)]
    pub span: Span,
    pub test: Box<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForStmt {
    #[serde(skip)]
    pub span: Span,
    pub target: Box<Expr>,
    pub iter: Box<Expr>,
    pub body: Vec<Stmt>,
}

/// `import a.b as c, d`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportStmt {
    #[serde(skip)]
    pub span: Span,
    pub names: Vec<Alias>,
}

/// `from module import a as b, c`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportFromStmt {
    #[serde(skip)]
    pub span: Span,
    /// Dotted module path, e.g. `pkg.sub`.
    pub module: String,
    pub names: Vec<Alias>,
}

/// An imported name with its optional `as` binding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alias {
    #[serde(skip)]
    pub span: Span,
    pub name: String,
    pub asname: Option<Ident>,
}

impl Alias {
    /// Name bound in the importing scope.
    pub fn binding(&self) -> &str {
        match &self.asname {
            Some(ident) => &ident.sym,
            None => self.name.rsplit('.').next().unwrap_or(&self.name),
        }
    }
}

impl Spanned for Alias {
    fn span(&self) -> Span {
        self.span
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssertStmt {
    #[serde(skip)]
    pub span: Span,
    pub test: Box<Expr>,
    pub msg: Option<Box<Expr>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PassStmt {
    #[serde(skip)]
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BreakStmt {
    #[serde(skip)]
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ContinueStmt {
    #[serde(skip)]
    pub span: Span,
}
