//! BASIC parser crate.
//!
//! This crate provides the front end of the vbstudio pipeline:
//! - Lexical analysis with resource limits ([`tokenize`])
//! - Abstract Syntax Tree (AST) definitions
//! - A recursive-descent parser with Pratt expressions and
//!   statement-level error recovery ([`Parser`])
//!
//! # Example
//!
//! ```
//! use bumpalo::Bump;
//! use vbstudio_core::{LexerLimits, ParserLimits};
//! use vbstudio_parser::{Parser, Stmt};
//!
//! let arena = Bump::new();
//! let source = "Dim x As Integer\nx = 2 + 3 * 4";
//!
//! match Parser::parse_source(source, &arena, &LexerLimits::default(), &ParserLimits::default()) {
//!     Ok((program, errors)) => {
//!         assert!(errors.is_empty());
//!         assert!(matches!(program.statements[1], Stmt::Assign(_)));
//!     }
//!     Err(fatal) => eprintln!("source rejected: {}", fatal),
//! }
//! ```

// Lexer module
pub mod lexer;

// AST module
pub mod ast;

// Re-export commonly used types at crate root
pub use ast::{Expr, FrontendError, Parser, Program, Stmt};
pub use lexer::{Lexer, Token, TokenKind, tokenize};
