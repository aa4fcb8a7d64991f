//! Abstract Syntax Tree (AST) for the BASIC dialect.
//!
//! This module provides:
//! - AST node definitions for declarations, statements and expressions
//! - The [`Parser`] that turns a token buffer into a [`Program`]
//!
//! # Example
//!
//! ```
//! use bumpalo::Bump;
//! use vbstudio_core::{LexerLimits, ParserLimits};
//! use vbstudio_parser::Parser;
//!
//! let arena = Bump::new();
//! let source = "Dim total As Integer\n\
//!               Sub AddOne()\n\
//!                   total = total + 1\n\
//!               End Sub";
//!
//! let (program, errors) =
//!     Parser::parse_source(source, &arena, &LexerLimits::default(), &ParserLimits::default())
//!         .expect("within limits");
//! assert!(errors.is_empty());
//! assert_eq!(program.statements.len(), 2);
//! ```

pub mod ops;

mod parser;

pub mod expr;
mod expr_parser;

pub mod stmt;
mod stmt_parser;

// Re-export error types from core
pub use vbstudio_core::{ParseError, ParseErrorKind, ParseErrors};

pub use expr::*;
pub use ops::*;
pub use parser::{FrontendError, Parser};
pub use stmt::*;

use vbstudio_core::Span;

/// A parsed compilation unit.
///
/// All nodes are allocated in the arena and remain valid for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Program<'ast> {
    /// Top-level statements in source order.
    pub statements: &'ast [Stmt<'ast>],
    pub span: Span,
}

impl<'ast> Program<'ast> {
    /// Iterate over the procedure declarations.
    pub fn procedures(&self) -> impl Iterator<Item = &'ast ProcDecl<'ast>> + '_ {
        self.statements.iter().filter_map(|stmt| match stmt {
            Stmt::Sub(decl) | Stmt::Function(decl) => Some(*decl),
            _ => None,
        })
    }
}
