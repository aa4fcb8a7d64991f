//! The per-unit stage pipeline: parse, analyze, optimize, generate.

use crate::analysis::AnalysisPass;
use crate::emit::{GenerateOptions, generate};
use crate::result::{CompilationMetrics, CompilationResult};
use bumpalo::Bump;
use log::debug;
use std::time::Instant;
use vbstudio_core::{CompileOptions, CompilerConfig, CompilerError, LexerLimits, ParserLimits};
use vbstudio_parser::{Parser, Program};

/// Runs all four stages over one source text.
///
/// A pipeline holds only its limits, so one instance can serve any number
/// of units, and copies of it can be handed to worker threads.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pipeline {
    lexer: LexerLimits,
    parser: ParserLimits,
}

impl Pipeline {
    pub fn new(lexer: LexerLimits, parser: ParserLimits) -> Self {
        Self { lexer, parser }
    }

    pub fn from_config(config: &CompilerConfig) -> Self {
        Self::new(config.lexer, config.parser)
    }

    /// Compile one unit.
    ///
    /// Input-bound failures (size and count limits) produce a failed result
    /// holding only that error. Syntax errors are recovered from: the result
    /// fails but still carries output for the statements that parsed.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(&self, source: &str, options: &CompileOptions) -> CompilationResult {
        let started = Instant::now();
        let mut metrics = CompilationMetrics {
            lines_of_code: count_lines(source),
            ..CompilationMetrics::default()
        };

        // Parse
        let arena = Bump::new();
        let stage = Instant::now();
        let parsed = Parser::parse_source(source, &arena, &self.lexer, &self.parser);
        metrics.parse_time = stage.elapsed();

        let (program, parse_errors) = match parsed {
            Ok(parsed) => parsed,
            Err(fatal) => {
                debug!("front end rejected unit: {}", fatal);
                metrics.total_time = started.elapsed();
                let mut result = CompilationResult::failure(CompilerError::from(&fatal));
                result.metrics = metrics;
                result.unit_count = 1;
                return result;
            }
        };
        let mut errors: Vec<CompilerError> = parse_errors.iter().map(CompilerError::from).collect();
        debug!(
            "parsed {} statements in {:?} ({} syntax errors)",
            program.statements.len(),
            metrics.parse_time,
            errors.len()
        );

        // Analyze
        let stage = Instant::now();
        let analysis = AnalysisPass::new().run(&program);
        metrics.analyze_time = stage.elapsed();
        errors.extend(analysis.errors);
        let warnings = analysis.warnings;
        debug!(
            "analysis finished in {:?} with {} warnings",
            metrics.analyze_time,
            warnings.len()
        );

        // Optimize
        let stage = Instant::now();
        optimize(&program, options);
        metrics.optimize_time = stage.elapsed();

        // Generate
        let stage = Instant::now();
        let generate_options = GenerateOptions {
            minify: options.minification,
            source_map: options.source_map,
        };
        let output = generate(&program, &generate_options);
        metrics.generate_time = stage.elapsed();
        debug!("generated {} bytes in {:?}", output.len(), metrics.generate_time);

        metrics.total_time = started.elapsed();
        CompilationResult {
            success: errors.is_empty(),
            output,
            errors,
            warnings,
            metrics,
            unit_count: 1,
        }
    }
}

/// The optimization stage. The flags are recorded but no pass rewrites the
/// tree yet.
fn optimize(program: &Program<'_>, options: &CompileOptions) {
    debug!(
        "optimize level={} constant_folding={} dead_code_elimination={} \
         function_inlining={} loop_optimization={} over {} statements",
        options.level.get(),
        options.constant_folding,
        options.dead_code_elimination,
        options.function_inlining,
        options.loop_optimization,
        program.statements.len()
    );
}

/// Number of lines with something other than whitespace on them.
pub fn count_lines(source: &str) -> usize {
    source.lines().filter(|line| !line.trim().is_empty()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vbstudio_core::{ErrorCode, Severity};

    fn run(source: &str) -> CompilationResult {
        Pipeline::default().run(source, &CompileOptions::default())
    }

    #[test]
    fn compiles_simple_module() {
        let result = run("Dim x As Integer\nx = 2 + 3 * 4");
        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.unit_count, 1);
        assert!(result.output.contains("x = (2 + (3 * 4));"));
        assert_eq!(result.metrics.lines_of_code, 2);
        assert!(result.metrics.total_time >= result.metrics.parse_time);
    }

    #[test]
    fn syntax_errors_fail_but_keep_output() {
        let result = run("Dim x As Integer\nx = = 1\nDim y As String");
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, ErrorCode::SyntaxError);
        assert_eq!(result.errors[0].line, 2);
        assert!(result.output.contains("let y = \"\";"));
    }

    #[test]
    fn warnings_do_not_fail() {
        let result = run("Dim w As Widget");
        assert!(result.success);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].severity, Severity::Warning);
    }

    #[test]
    fn duplicate_procedure_fails() {
        let result = run("Sub A()\nEnd Sub\nSub A()\nEnd Sub");
        assert!(!result.success);
        assert_eq!(result.errors[0].code, ErrorCode::DuplicateDeclaration);
    }

    #[test]
    fn fatal_limit_is_the_only_error() {
        let pipeline = Pipeline::new(
            LexerLimits {
                max_source_bytes: 8,
                ..LexerLimits::default()
            },
            ParserLimits::default(),
        );
        let result = pipeline.run("Dim x As Integer", &CompileOptions::default());
        assert!(!result.success);
        assert!(result.output.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, ErrorCode::SourceTooLarge);
    }

    #[test]
    fn options_drive_output_format() {
        let options = CompileOptions {
            source_map: true,
            ..CompileOptions::default()
        };
        let result = Pipeline::default().run("x = 1", &options);
        assert_eq!(result.output, "//# line 1\nx = 1;");
    }

    #[test]
    fn counts_non_blank_lines() {
        assert_eq!(count_lines("a\n\n   \nb\r\n"), 2);
        assert_eq!(count_lines(""), 0);
    }
}
