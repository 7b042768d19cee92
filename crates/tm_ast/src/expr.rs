//! Expression nodes.

use serde::Serialize;
use swc_common::{Span, Spanned};

use crate::{BinaryOp, BoolOp, CmpOp, Ident, UnaryOp};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    Call(CallExpr),
    Unary(UnaryExpr),
    Bin(BinExpr),
    Bool(BoolExpr),
    Compare(CompareExpr),
    IfExp(IfExpr),
    List(ListExpr),
    Tuple(TupleExpr),
    Set(SetExpr),
    Dict(DictExpr),
    ListComp(ListComp),
    SetComp(SetComp),
    DictComp(DictComp),
    GeneratorExp(GeneratorExp),
    Subscript(SubscriptExpr),
    /// `lower:upper:step`, only valid as (part of) a subscript index.
    Slice(SliceExpr),
    Attribute(AttributeExpr),
    Lambda(LambdaExpr),
    Name(Ident),
    Lit(Lit),
    /// The `...` token.
    Placeholder(Placeholder),
}

impl Expr {
    /// Node kind name, used in diagnostics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Call(_) => "Call",
            Expr::Unary(_) => "UnaryOp",
            Expr::Bin(_) => "BinOp",
            Expr::Bool(_) => "BoolOp",
            Expr::Compare(_) => "Compare",
            Expr::IfExp(_) => "IfExp",
            Expr::List(_) => "List",
            Expr::Tuple(_) => "Tuple",
            Expr::Set(_) => "Set",
            Expr::Dict(_) => "Dict",
            Expr::ListComp(_) => "ListComp",
            Expr::SetComp(_) => "SetComp",
            Expr::DictComp(_) => "DictComp",
            Expr::GeneratorExp(_) => "GeneratorExp",
            Expr::Subscript(_) => "Subscript",
            Expr::Slice(_) => "Slice",
            Expr::Attribute(_) => "Attribute",
            Expr::Lambda(_) => "Lambda",
            Expr::Name(_) => "Name",
            Expr::Lit(_) => "Lit",
            Expr::Placeholder(_) => "Placeholder",
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Expr::Placeholder(_))
    }

    pub fn name(sym: impl Into<String>, span: Span) -> Self {
        Expr::Name(Ident::new(sym, span))
    }
}

impl Spanned for Expr {
    fn span(&self) -> Span {
        match self {
            Expr::Call(e) => e.span,
            Expr::Unary(e) => e.span,
            Expr::Bin(e) => e.span,
            Expr::Bool(e) => e.span,
            Expr::Compare(e) => e.span,
            Expr::IfExp(e) => e.span,
            Expr::List(e) => e.span,
            Expr::Tuple(e) => e.span,
            Expr::Set(e) => e.span,
            Expr::Dict(e) => e.span,
            Expr::ListComp(e) => e.span,
            Expr::SetComp(e) => e.span,
            Expr::DictComp(e) => e.span,
            Expr::GeneratorExp(e) => e.span,
            Expr::Subscript(e) => e.span,
            Expr::Slice(e) => e.span,
            Expr::Attribute(e) => e.span,
            Expr::Lambda(e) => e.span,
            Expr::Name(e) => e.span,
            Expr::Lit(e) => e.span,
            Expr::Placeholder(e) => e.span,
        }
    }
}

/// `func(args, keyword=value)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallExpr {
    #[serde(skip)]
    pub span: Span,
    pub func: Box<Expr>,
    pub args: Vec<Expr>,
    pub keywords: Vec<Keyword>,
}

/// A `name=value` call argument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Keyword {
    #[serde(skip)]
    pub span: Span,
    pub arg: Ident,
    pub value: Box<Expr>,
}

impl Spanned for Keyword {
    fn span(&self) -> Span {
        self.span
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnaryExpr {
    #[serde(skip)]
    pub span: Span,
    pub op: UnaryOp,
    pub operand: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinExpr {
    #[serde(skip)]
    pub span: Span,
    pub op: BinaryOp,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
}

/// `a and b and c`, flattened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoolExpr {
    #[serde(skip)]
    pub span: Span,
    pub op: BoolOp,
    pub values: Vec<Expr>,
}

/// `left op0 c0 op1 c1 ...`; `ops` and `comparators` have equal length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompareExpr {
    #[serde(skip)]
    pub span: Span,
    pub left: Box<Expr>,
    pub ops: Vec<CmpOp>,
    pub comparators: Vec<Expr>,
}

/// `body if test else orelse`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IfExpr {
    #[serde(skip)]
    pub span: Span,
    pub test: Box<Expr>,
    pub body: Box<Expr>,
    pub orelse: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListExpr {
    #[serde(skip)]
    pub span: Span,
    pub elts: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TupleExpr {
    #[serde(skip)]
    pub span: Span,
    pub elts: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetExpr {
    #[serde(skip)]
    pub span: Span,
    pub elts: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DictExpr {
    #[serde(skip)]
    pub span: Span,
    pub entries: Vec<DictEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DictEntry {
    pub key: Expr,
    pub value: Expr,
}

/// One `for target in iter if cond ...` clause of a comprehension.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comprehension {
    #[serde(skip)]
    pub span: Span,
    pub target: Box<Expr>,
    pub iter: Box<Expr>,
    pub ifs: Vec<Expr>,
}

impl Spanned for Comprehension {
    fn span(&self) -> Span {
        self.span
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListComp {
    #[serde(skip)]
    pub span: Span,
    pub elt: Box<Expr>,
    pub generators: Vec<Comprehension>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetComp {
    #[serde(skip)]
    pub span: Span,
    pub elt: Box<Expr>,
    pub generators: Vec<Comprehension>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratorExp {
    #[serde(skip)]
    pub span: Span,
    pub elt: Box<Expr>,
    pub generators: Vec<Comprehension>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DictComp {
    #[serde(skip)]
    pub span: Span,
    pub key: Box<Expr>,
    pub value: Box<Expr>,
    pub generators: Vec<Comprehension>,
}

/// `value[index]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptExpr {
    #[serde(skip)]
    pub span: Span,
    pub value: Box<Expr>,
    pub index: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SliceExpr {
    #[serde(skip)]
    pub span: Span,
    pub lower: Option<Box<Expr>>,
    pub upper: Option<Box<Expr>>,
    pub step: Option<Box<Expr>>,
}

/// `value.attr`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeExpr {
    #[serde(skip)]
    pub span: Span,
    pub value: Box<Expr>,
    pub attr: Ident,
}

/// `lambda params: body`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LambdaExpr {
    #[serde(skip)]
    pub span: Span,
    pub params: Vec<Param>,
    pub body: Box<Expr>,
}

/// A formal parameter of a `def` or `lambda`, with an optional default.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    #[serde(skip)]
    pub span: Span,
    pub name: Ident,
    pub default: Option<Box<Expr>>,
}

impl Spanned for Param {
    fn span(&self) -> Span {
        self.span
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lit {
    #[serde(skip)]
    pub span: Span,
    pub value: LitValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LitValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
}

/// Marker node for `...`. Carries no payload besides its position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placeholder {
    #[serde(skip)]
    pub span: Span,
}
