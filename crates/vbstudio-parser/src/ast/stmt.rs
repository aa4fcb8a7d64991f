//! Statement AST nodes.
//!
//! Provides nodes for:
//! - Variable declarations (`Dim`, or `Public`/`Private` at module level)
//! - `Sub` and `Function` declarations
//! - Assignments and expression statements
//! - Raw control-flow lines kept as text

use crate::ast::expr::{Expr, Ident, IdentExpr};
use vbstudio_core::Span;

/// A statement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stmt<'ast> {
    /// Variable declaration
    VarDecl(VarDeclStmt<'ast>),
    /// `Sub ... End Sub`
    Sub(&'ast ProcDecl<'ast>),
    /// `Function ... End Function`
    Function(&'ast ProcDecl<'ast>),
    /// Expression statement, including calls
    Expr(ExprStmt<'ast>),
    /// Assignment
    Assign(&'ast AssignStmt<'ast>),
    /// Control-flow line that is not parsed into structure
    Raw(RawStmt<'ast>),
}

impl<'ast> Stmt<'ast> {
    /// Get the span of this statement.
    pub fn span(&self) -> Span {
        match self {
            Self::VarDecl(s) => s.span,
            Self::Sub(s) => s.span,
            Self::Function(s) => s.span,
            Self::Expr(s) => s.span,
            Self::Assign(s) => s.span,
            Self::Raw(s) => s.span,
        }
    }
}

/// Visibility of a module-level member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// `Dim a As Integer, b` declares two variables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarDeclStmt<'ast> {
    /// Declared visibility when `Public`/`Private` was used instead of `Dim`.
    pub visibility: Option<Visibility>,
    /// The declared variables, at least one.
    pub vars: &'ast [VarDeclarator<'ast>],
    /// Source location
    pub span: Span,
}

/// One variable in a declaration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarDeclarator<'ast> {
    pub name: Ident<'ast>,
    /// Type after `As`, if any.
    pub ty: Option<Ident<'ast>>,
    pub span: Span,
}

/// How an argument is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassingMode {
    ByVal,
    ByRef,
}

/// A procedure parameter: `[ByVal|ByRef] name [As Type]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Param<'ast> {
    pub passing: Option<PassingMode>,
    pub name: Ident<'ast>,
    pub ty: Option<Ident<'ast>>,
    pub span: Span,
}

/// A `Sub` or `Function` declaration.
///
/// `return_type` is always `None` for a `Sub`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcDecl<'ast> {
    pub visibility: Visibility,
    pub name: Ident<'ast>,
    pub params: &'ast [Param<'ast>],
    pub return_type: Option<Ident<'ast>>,
    pub body: &'ast [Stmt<'ast>],
    pub span: Span,
}

/// An expression evaluated for its effect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExprStmt<'ast> {
    pub expr: Expr<'ast>,
    pub span: Span,
}

/// The optional keyword in front of an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignKeyword {
    Let,
    Set,
}

/// `[Let|Set] target = value`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssignStmt<'ast> {
    pub keyword: Option<AssignKeyword>,
    pub target: IdentExpr<'ast>,
    pub value: Expr<'ast>,
    pub span: Span,
}

/// A control-flow line (`If x > 1 Then`, `Next i`, ...) kept as re-joined
/// token text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawStmt<'ast> {
    pub text: &'ast str,
    pub span: Span,
}
