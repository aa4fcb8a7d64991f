//! Diagnostics reported in a compilation result.
//!
//! Every failure in the pipeline, whatever layer it comes from, is flattened
//! into a [`CompilerError`] with a stable [`ErrorCode`] before it reaches the
//! caller.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Span;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        write!(f, "{}", s)
    }
}

/// Stable diagnostic codes.
///
/// The serialized form (and [`as_str`](Self::as_str)) never changes once
/// published; tooling matches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Input bounds
    SourceTooLarge,
    TokenLimitExceeded,
    TokenizationTimeout,
    NumberTooLong,
    IdentifierTooLong,
    StringTooLong,
    CommentTooLong,
    TooManyStatements,
    ProcedureBodyTooLarge,

    // Syntax
    SyntaxError,
    InvalidNumericLiteral,

    // Analysis
    DuplicateDeclaration,
    UndeclaredVariable,
    UnknownType,

    // Dispatch
    WorkerTimeout,
    Disposed,
    WorkerFailed,

    // Pipeline
    CompilationFailed,
}

impl ErrorCode {
    /// The stable string form of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::SourceTooLarge => "SOURCE_TOO_LARGE",
            ErrorCode::TokenLimitExceeded => "TOKEN_LIMIT_EXCEEDED",
            ErrorCode::TokenizationTimeout => "TOKENIZATION_TIMEOUT",
            ErrorCode::NumberTooLong => "NUMBER_TOO_LONG",
            ErrorCode::IdentifierTooLong => "IDENTIFIER_TOO_LONG",
            ErrorCode::StringTooLong => "STRING_TOO_LONG",
            ErrorCode::CommentTooLong => "COMMENT_TOO_LONG",
            ErrorCode::TooManyStatements => "TOO_MANY_STATEMENTS",
            ErrorCode::ProcedureBodyTooLarge => "PROCEDURE_BODY_TOO_LARGE",
            ErrorCode::SyntaxError => "SYNTAX_ERROR",
            ErrorCode::InvalidNumericLiteral => "INVALID_NUMERIC_LITERAL",
            ErrorCode::DuplicateDeclaration => "DUPLICATE_DECLARATION",
            ErrorCode::UndeclaredVariable => "UNDECLARED_VARIABLE",
            ErrorCode::UnknownType => "UNKNOWN_TYPE",
            ErrorCode::WorkerTimeout => "WORKER_TIMEOUT",
            ErrorCode::Disposed => "DISPOSED",
            ErrorCode::WorkerFailed => "WORKER_FAILED",
            ErrorCode::CompilationFailed => "COMPILATION_FAILED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single diagnostic attached to a compilation result.
///
/// `line` and `column` are both 0 when the diagnostic is not tied to a
/// source position (dispatch and pipeline failures).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerError {
    pub line: u32,
    pub column: u32,
    pub message: String,
    pub severity: Severity,
    pub code: ErrorCode,
}

impl CompilerError {
    /// Create a diagnostic at a source position.
    pub fn at(span: Span, severity: Severity, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            line: span.line,
            column: span.col,
            message: message.into(),
            severity,
            code,
        }
    }

    /// Create an error-severity diagnostic that has no source position.
    pub fn unpositioned(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            line: 0,
            column: 0,
            message: message.into(),
            severity: Severity::Error,
            code,
        }
    }

    /// Create a warning at a source position.
    pub fn warning(span: Span, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::at(span, Severity::Warning, code, message)
    }

    /// Whether this diagnostic carries a source position.
    pub fn is_positioned(&self) -> bool {
        self.line != 0
    }
}

impl fmt::Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_positioned() {
            write!(
                f,
                "{} {} at {}:{}: {}",
                self.severity, self.code, self.line, self.column, self.message
            )
        } else {
            write!(f, "{} {}: {}", self.severity, self.code, self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_to_their_stable_strings() {
        for code in [
            ErrorCode::SourceTooLarge,
            ErrorCode::ProcedureBodyTooLarge,
            ErrorCode::WorkerTimeout,
            ErrorCode::CompilationFailed,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
    }

    #[test]
    fn unpositioned_has_zero_location() {
        let err = CompilerError::unpositioned(ErrorCode::Disposed, "compiler disposed");
        assert_eq!(err.line, 0);
        assert_eq!(err.column, 0);
        assert!(!err.is_positioned());
        assert_eq!(err.to_string(), "error DISPOSED: compiler disposed");
    }

    #[test]
    fn positioned_display() {
        let err = CompilerError::warning(
            Span::new(4, 2, 1),
            ErrorCode::UnknownType,
            "unknown type 'Widget'",
        );
        assert_eq!(err.to_string(), "warning UNKNOWN_TYPE at 4:2: unknown type 'Widget'");
    }
}
