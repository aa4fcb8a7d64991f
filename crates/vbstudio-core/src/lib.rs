//! Shared types for the vbstudio compilation pipeline.
//!
//! This crate sits at the bottom of the workspace and provides:
//! - [`Span`] source locations
//! - [`ContentHash`] identities for compilation units
//! - The lexer and parser error taxonomy ([`LexError`], [`ParseError`])
//! - [`CompilerError`] diagnostics with stable [`ErrorCode`]s
//! - Pipeline configuration ([`CompilerConfig`], [`CompileOptions`])

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod hash;
pub mod span;

pub use config::{CompileOptions, CompilerConfig, LexerLimits, OptimizationLevel, ParserLimits};
pub use diagnostics::{CompilerError, ErrorCode, Severity};
pub use error::{LexError, ParseError, ParseErrorKind, ParseErrors};
pub use hash::ContentHash;
pub use span::Span;
