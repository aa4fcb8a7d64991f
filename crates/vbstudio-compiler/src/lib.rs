//! vbstudio compiler
//!
//! Turns one unit of BASIC source into output text.
//!
//! ## Stages
//!
//! 1. **Parse**: lex and parse with recovery ([`vbstudio_parser`])
//! 2. **Analyze**: declaration and type checks ([`analysis`])
//! 3. **Optimize**: timed, flags logged, no rewriting
//! 4. **Generate**: structural translation ([`emit`])
//!
//! [`Pipeline::run`] drives the stages and reports a [`CompilationResult`].

pub mod analysis;
pub mod emit;
mod pipeline;
pub mod result;

pub use analysis::{AnalysisOutput, AnalysisPass};
pub use emit::{GenerateOptions, generate};
pub use pipeline::{Pipeline, count_lines};
pub use result::{CompilationMetrics, CompilationResult};

// Re-export diagnostics from core for convenience
pub use vbstudio_core::{CompilerError, ErrorCode, Severity};
