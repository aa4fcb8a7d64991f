//! Configuration for the compilation pipeline.
//!
//! All configuration is explicit: a [`CompilerConfig`] is built once and
//! handed to the compiler, and per-request behaviour is carried by
//! [`CompileOptions`]. Every type here has a `Default` that matches the
//! reference limits, and round-trips through serde so a host can load it
//! from a settings file.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Resource limits enforced while tokenizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexerLimits {
    /// Maximum source size in bytes.
    pub max_source_bytes: usize,
    /// Maximum number of tokens produced for one source.
    pub max_tokens: usize,
    /// Wall-clock budget for one tokenize call.
    pub timeout: Duration,
    /// Maximum identifier length in characters.
    pub max_identifier_len: usize,
    /// Maximum numeric literal length in characters.
    pub max_number_len: usize,
    /// Maximum string literal length in characters, quotes excluded.
    pub max_string_len: usize,
    /// Maximum comment length in characters.
    pub max_comment_len: usize,
}

impl Default for LexerLimits {
    fn default() -> Self {
        Self {
            max_source_bytes: 1024 * 1024,
            max_tokens: 100_000,
            timeout: Duration::from_secs(5),
            max_identifier_len: 255,
            max_number_len: 64,
            max_string_len: 65_536,
            max_comment_len: 4_096,
        }
    }
}

/// Resource limits enforced while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserLimits {
    /// Maximum number of top-level statements.
    pub max_statements: usize,
    /// Maximum number of statements in one procedure body.
    pub max_body_statements: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_statements: 10_000,
            max_body_statements: 5_000,
        }
    }
}

/// Optimization level, clamped to `0..=3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct OptimizationLevel(u8);

impl OptimizationLevel {
    pub const MAX: u8 = 3;

    pub fn new(level: u8) -> Self {
        OptimizationLevel(level.min(Self::MAX))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for OptimizationLevel {
    fn default() -> Self {
        OptimizationLevel(2)
    }
}

impl From<u8> for OptimizationLevel {
    fn from(level: u8) -> Self {
        OptimizationLevel::new(level)
    }
}

impl From<OptimizationLevel> for u8 {
    fn from(level: OptimizationLevel) -> Self {
        level.0
    }
}

/// Per-request compilation options.
///
/// The optimization toggles are carried through the pipeline and reported,
/// but no pass transforms the program yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompileOptions {
    pub level: OptimizationLevel,
    pub dead_code_elimination: bool,
    pub constant_folding: bool,
    pub function_inlining: bool,
    pub loop_optimization: bool,
    /// Emit output without indentation or blank lines.
    pub minification: bool,
    /// Precede each emitted statement with a `//# line N` marker.
    pub source_map: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            level: OptimizationLevel::default(),
            dead_code_elimination: true,
            constant_folding: true,
            function_inlining: false,
            loop_optimization: false,
            minification: false,
            source_map: false,
        }
    }
}

impl CompileOptions {
    /// Options for the low-latency single-snippet route: everything off.
    pub fn jit() -> Self {
        Self {
            level: OptimizationLevel::new(0),
            dead_code_elimination: false,
            constant_folding: false,
            function_inlining: false,
            loop_optimization: false,
            minification: false,
            source_map: false,
        }
    }
}

/// Configuration for one compiler instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Worker thread count. `None` uses the host's available parallelism.
    pub workers: Option<usize>,
    /// How long a dispatched unit may run before it fails with a timeout.
    pub worker_timeout: Duration,
    pub lexer: LexerLimits,
    pub parser: ParserLimits,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            workers: None,
            worker_timeout: Duration::from_secs(30),
            lexer: LexerLimits::default(),
            parser: ParserLimits::default(),
        }
    }
}
