//! Compilation results and their aggregation.
//!
//! A [`CompilationResult`] is produced once per unit (or per request) and
//! never mutated after it is returned. Results cross the worker boundary as
//! JSON, so everything here is serde-serializable.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use vbstudio_core::{CompilerError, Severity};

/// Separator placed between unit outputs when results are merged.
pub const UNIT_SEPARATOR: &str = "\n\n";

/// Timing and counters for one compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationMetrics {
    pub parse_time: Duration,
    pub analyze_time: Duration,
    pub optimize_time: Duration,
    pub generate_time: Duration,
    pub total_time: Duration,
    pub lines_of_code: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
}

impl CompilationMetrics {
    /// Accumulate another unit's metrics into this one.
    ///
    /// Stage times and counters add up; `total_time` keeps the maximum,
    /// standing in for the wall-clock time of units that ran side by side.
    pub fn absorb(&mut self, other: &CompilationMetrics) {
        self.parse_time += other.parse_time;
        self.analyze_time += other.analyze_time;
        self.optimize_time += other.optimize_time;
        self.generate_time += other.generate_time;
        self.total_time = self.total_time.max(other.total_time);
        self.lines_of_code += other.lines_of_code;
        self.cache_hits += other.cache_hits;
        self.cache_misses += other.cache_misses;
    }
}

/// The outcome of compiling one or more units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationResult {
    pub success: bool,
    pub output: String,
    pub errors: Vec<CompilerError>,
    pub warnings: Vec<CompilerError>,
    pub metrics: CompilationMetrics,
    /// Number of units that contributed to this result.
    pub unit_count: usize,
}

impl CompilationResult {
    /// A failed result carrying a single error and no output.
    pub fn failure(error: CompilerError) -> Self {
        Self {
            success: false,
            output: String::new(),
            errors: vec![error],
            warnings: Vec::new(),
            metrics: CompilationMetrics::default(),
            unit_count: 0,
        }
    }

    /// An empty, successful result with no units.
    pub fn empty() -> Self {
        Self {
            success: true,
            output: String::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            metrics: CompilationMetrics::default(),
            unit_count: 0,
        }
    }

    /// Number of error-severity diagnostics.
    pub fn error_count(&self) -> usize {
        self.errors.iter().filter(|e| e.severity == Severity::Error).count()
    }

    /// This result with its cache counters set to a single hit.
    pub fn as_cache_hit(mut self) -> Self {
        self.metrics.cache_hits = 1;
        self.metrics.cache_misses = 0;
        self
    }

    /// This result with its cache counters set to a single miss.
    pub fn as_cache_miss(mut self) -> Self {
        self.metrics.cache_hits = 0;
        self.metrics.cache_misses = 1;
        self
    }

    /// Merge per-unit results, in order, into one.
    ///
    /// Non-empty outputs are joined with a blank line, diagnostics are
    /// concatenated in order, metrics combine as in
    /// [`CompilationMetrics::absorb`]. The merged result succeeds only if
    /// every part succeeded.
    pub fn merge<I>(results: I) -> Self
    where
        I: IntoIterator<Item = CompilationResult>,
    {
        let mut merged = CompilationResult::empty();
        let mut outputs = Vec::new();

        for result in results {
            merged.success &= result.success;
            if !result.output.is_empty() {
                outputs.push(result.output);
            }
            merged.errors.extend(result.errors);
            merged.warnings.extend(result.warnings);
            merged.metrics.absorb(&result.metrics);
            merged.unit_count += result.unit_count;
        }

        merged.output = outputs.join(UNIT_SEPARATOR);
        merged
    }
}
