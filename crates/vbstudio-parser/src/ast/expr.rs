//! Expression AST nodes.
//!
//! # Expression Precedence
//!
//! The parser uses Pratt parsing with the following precedence levels,
//! lowest to highest:
//! 1. `Or`
//! 2. `And`
//! 3. Equality (`=`, `<>`)
//! 4. Comparison (`<`, `<=`, `>`, `>=`)
//! 5. Additive (`+`, `-`, `&`)
//! 6. Multiplicative (`*`, `/`, `\`, `Mod`)
//! 7. Prefix unary (`-`, `+`, `Not`)
//! 8. Exponent (`^`)
//! 9. Postfix call
//! 10. Primary (literal, identifier, parenthesized)
//!
//! Assignment is not an expression; it is recognized at statement level.

use crate::ast::{BinaryOp, UnaryOp};
use vbstudio_core::Span;

/// An expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expr<'ast> {
    /// Literal value
    Literal(LiteralExpr<'ast>),
    /// Identifier reference, possibly dotted
    Ident(IdentExpr<'ast>),
    /// Binary operation
    Binary(&'ast BinaryExpr<'ast>),
    /// Unary prefix operation
    Unary(&'ast UnaryExpr<'ast>),
    /// Procedure call
    Call(&'ast CallExpr<'ast>),
    /// Parenthesized expression
    Paren(&'ast ParenExpr<'ast>),
}

impl<'ast> Expr<'ast> {
    /// Get the span of this expression.
    pub fn span(&self) -> Span {
        match self {
            Self::Literal(e) => e.span,
            Self::Ident(e) => e.span,
            Self::Binary(e) => e.span,
            Self::Unary(e) => e.span,
            Self::Call(e) => e.span,
            Self::Paren(e) => e.span,
        }
    }
}

/// A single name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ident<'ast> {
    /// The name as written in source.
    pub name: &'ast str,
    /// Source location
    pub span: Span,
}

impl<'ast> Ident<'ast> {
    pub fn new(name: &'ast str, span: Span) -> Self {
        Self { name, span }
    }

    /// Case-insensitive name comparison.
    pub fn is(&self, other: &str) -> bool {
        self.name.eq_ignore_ascii_case(other)
    }
}

/// A literal value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiteralExpr<'ast> {
    /// The literal kind
    pub kind: LiteralKind<'ast>,
    /// Source location
    pub span: Span,
}

/// The kind of literal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LiteralKind<'ast> {
    /// Integer literal (no decimal point)
    Int(i64),
    /// Floating-point literal
    Float(f64),
    /// `True` or `False`
    Bool(bool),
    /// Decoded string value
    String(&'ast str),
}

/// An identifier expression such as `x` or `Form1.Caption`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdentExpr<'ast> {
    /// The dot-separated segments, at least one.
    pub path: &'ast [Ident<'ast>],
    /// Source location
    pub span: Span,
}

impl<'ast> IdentExpr<'ast> {
    /// The first segment.
    pub fn head(&self) -> &Ident<'ast> {
        &self.path[0]
    }

    /// Whether the identifier has more than one segment.
    pub fn is_dotted(&self) -> bool {
        self.path.len() > 1
    }
}

/// A binary operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinaryExpr<'ast> {
    /// Left operand
    pub left: &'ast Expr<'ast>,
    /// Operator
    pub op: BinaryOp,
    /// Right operand
    pub right: &'ast Expr<'ast>,
    /// Source location
    pub span: Span,
}

/// A unary prefix operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnaryExpr<'ast> {
    /// Operator
    pub op: UnaryOp,
    /// Operand
    pub operand: &'ast Expr<'ast>,
    /// Source location
    pub span: Span,
}

/// A call: `Foo(1, 2)`, or the statement form `MsgBox "hi"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallExpr<'ast> {
    /// The expression being called
    pub callee: &'ast Expr<'ast>,
    /// Arguments
    pub args: &'ast [Expr<'ast>],
    /// Source location
    pub span: Span,
}

/// A parenthesized expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParenExpr<'ast> {
    /// The inner expression
    pub expr: &'ast Expr<'ast>,
    /// Source location
    pub span: Span,
}
