//! vbstudio: the compilation pipeline of a browser IDE for a classic BASIC
//! dialect.
//!
//! Sources are split into [`CompilationUnit`]s, ordered by their
//! [`DependencyGraph`], compiled on a [`WorkerPool`] and cached so that
//! unchanged units are not compiled again. [`Compiler`] ties it together.
//!
//! The front end and code generator live in the `vbstudio-parser` and
//! `vbstudio-compiler` crates and are re-exported here.

pub mod cache;
mod compiler;
pub mod deps;
mod error;
pub mod unit;
pub mod worker;

pub use cache::{CacheEntry, CompilationCache, jit_key};
pub use compiler::{Compiler, CompilerStats};
pub use deps::{DependencyExtractor, DependencyGraph, PatternExtractor};
pub use error::{PipelineError, Result};
pub use unit::CompilationUnit;
pub use worker::{DispatchError, PendingCompilation, UnitHandler, WorkerPool};

pub use vbstudio_compiler::{CompilationMetrics, CompilationResult, GenerateOptions, Pipeline};
pub use vbstudio_core::{
    CompileOptions, CompilerConfig, CompilerError, ContentHash, ErrorCode, LexerLimits,
    OptimizationLevel, ParserLimits, Severity,
};

/// Front end re-exports.
pub mod parser {
    pub use vbstudio_parser::*;
}
