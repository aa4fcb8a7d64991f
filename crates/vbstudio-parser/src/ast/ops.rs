//! Operator definitions for BASIC expressions.
//!
//! Provides enums for binary and unary operators along with precedence
//! information for the Pratt parser.

use crate::lexer::TokenKind;
use std::fmt;

/// Binary operators.
///
/// Organized by precedence from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // Logical (precedence 1-2)
    /// `Or`
    Or,
    /// `And`
    And,

    // Equality (precedence 3)
    /// `=` in expression position
    Equal,
    /// `<>`
    NotEqual,

    // Comparison (precedence 4)
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,

    // Additive (precedence 5)
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `&` string concatenation
    Concat,

    // Multiplicative (precedence 6)
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `\` integer division
    IntDiv,
    /// `Mod`
    Mod,

    // Exponent (precedence 8, above unary)
    /// `^`
    Pow,
}

/// Binding power of prefix operators: above multiplicative, below `^`.
pub const UNARY_BINDING_POWER: u8 = 15;

impl BinaryOp {
    /// Get the binding power (precedence) for this operator.
    ///
    /// Higher values bind more tightly. Returns (left_bp, right_bp).
    /// Every operator is left-associative: right_bp = left_bp + 1.
    pub fn binding_power(&self) -> (u8, u8) {
        use BinaryOp::*;
        match self {
            Or => (3, 4),
            And => (5, 6),
            Equal | NotEqual => (7, 8),
            Less | LessEqual | Greater | GreaterEqual => (9, 10),
            Add | Sub | Concat => (11, 12),
            Mul | Div | IntDiv | Mod => (13, 14),
            Pow => (17, 18),
        }
    }

    /// Try to convert a token kind to a binary operator.
    pub fn from_token(token: TokenKind) -> Option<Self> {
        use TokenKind::*;

        Some(match token {
            TokenKind::Or => BinaryOp::Or,
            TokenKind::And => BinaryOp::And,
            TokenKind::Equal => BinaryOp::Equal,
            TokenKind::NotEqual => BinaryOp::NotEqual,
            TokenKind::Less => BinaryOp::Less,
            TokenKind::LessEqual => BinaryOp::LessEqual,
            TokenKind::Greater => BinaryOp::Greater,
            TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
            Plus => BinaryOp::Add,
            Minus => BinaryOp::Sub,
            Amp => BinaryOp::Concat,
            Star => BinaryOp::Mul,
            Slash => BinaryOp::Div,
            Backslash => BinaryOp::IntDiv,
            TokenKind::Mod => BinaryOp::Mod,
            Caret => BinaryOp::Pow,
            _ => return None,
        })
    }

    /// Check if this operator is comparison-related.
    pub fn is_comparison(&self) -> bool {
        use BinaryOp::*;
        matches!(
            self,
            Equal | NotEqual | Less | LessEqual | Greater | GreaterEqual
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use BinaryOp::*;
        let s = match self {
            Or => "Or",
            And => "And",
            Equal => "=",
            NotEqual => "<>",
            Less => "<",
            LessEqual => "<=",
            Greater => ">",
            GreaterEqual => ">=",
            Add => "+",
            Sub => "-",
            Concat => "&",
            Mul => "*",
            Div => "/",
            IntDiv => "\\",
            Mod => "Mod",
            Pow => "^",
        };
        write!(f, "{}", s)
    }
}

/// Prefix unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `+x`
    Plus,
    /// `Not x`
    Not,
}

impl UnaryOp {
    /// Try to convert a token kind to a prefix operator.
    pub fn from_token(token: TokenKind) -> Option<Self> {
        match token {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Not => Some(UnaryOp::Not),
            _ => None,
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "Not ",
        };
        write!(f, "{}", s)
    }
}
