//! Error types for the lexing and parsing phases.
//!
//! ## Error Hierarchy
//!
//! ```text
//! LexError     - fatal input-bound conditions raised while tokenizing
//! ParseError   - syntax errors (recoverable) and statement limits (fatal)
//! ParseErrors  - the recovered syntax errors of one parse
//! ```
//!
//! Both convert into [`CompilerError`] diagnostics with a stable
//! [`ErrorCode`].

use std::time::Duration;

use thiserror::Error;

use crate::{CompilerError, ErrorCode, Severity, Span};

// ============================================================================
// Lexer Errors
// ============================================================================

/// Conditions that abort tokenization.
///
/// These are resource bounds against pathological input rather than
/// language errors; none of them is recovered from.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    /// The source exceeds the configured byte ceiling.
    #[error("source is {size} bytes, exceeding the limit of {limit} bytes")]
    SourceTooLarge { size: usize, limit: usize },

    /// Scanning produced more tokens than allowed.
    #[error("more than {limit} tokens at {span}")]
    TokenLimitExceeded { limit: usize, span: Span },

    /// Scanning ran past its wall-clock budget.
    #[error("tokenization exceeded its budget of {budget:?} at {span}")]
    TokenizationTimeout { budget: Duration, span: Span },

    /// A numeric literal is longer than allowed.
    #[error("numeric literal longer than {limit} characters at {span}")]
    NumberTooLong { limit: usize, span: Span },

    /// An identifier is longer than allowed.
    #[error("identifier longer than {limit} characters at {span}")]
    IdentifierTooLong { limit: usize, span: Span },

    /// A string literal is longer than allowed.
    #[error("string literal longer than {limit} characters at {span}")]
    StringTooLong { limit: usize, span: Span },

    /// A comment is longer than allowed.
    #[error("comment longer than {limit} characters at {span}")]
    CommentTooLong { limit: usize, span: Span },
}

impl LexError {
    /// Get the span where this error occurred, if it has one.
    pub fn span(&self) -> Option<Span> {
        match self {
            LexError::SourceTooLarge { .. } => None,
            LexError::TokenLimitExceeded { span, .. }
            | LexError::TokenizationTimeout { span, .. }
            | LexError::NumberTooLong { span, .. }
            | LexError::IdentifierTooLong { span, .. }
            | LexError::StringTooLong { span, .. }
            | LexError::CommentTooLong { span, .. } => Some(*span),
        }
    }

    /// The stable diagnostic code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            LexError::SourceTooLarge { .. } => ErrorCode::SourceTooLarge,
            LexError::TokenLimitExceeded { .. } => ErrorCode::TokenLimitExceeded,
            LexError::TokenizationTimeout { .. } => ErrorCode::TokenizationTimeout,
            LexError::NumberTooLong { .. } => ErrorCode::NumberTooLong,
            LexError::IdentifierTooLong { .. } => ErrorCode::IdentifierTooLong,
            LexError::StringTooLong { .. } => ErrorCode::StringTooLong,
            LexError::CommentTooLong { .. } => ErrorCode::CommentTooLong,
        }
    }
}

impl From<&LexError> for CompilerError {
    fn from(error: &LexError) -> Self {
        let span = error.span().unwrap_or_default();
        CompilerError::at(span, Severity::Error, error.code(), error.to_string())
    }
}

// ============================================================================
// Parse Errors
// ============================================================================

/// Categories of parse errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    // Token-level errors
    /// A specific token was expected but not found.
    ExpectedToken,
    /// An unexpected token was encountered.
    UnexpectedToken,
    /// Unexpected end of input.
    UnexpectedEof,

    // Expression errors
    /// An expression was expected.
    ExpectedExpression,

    // Declaration errors
    /// An identifier was expected.
    ExpectedIdentifier,
    /// A type name was expected after `As`.
    ExpectedType,
    /// A procedure body reached end of input without `End Sub`/`End Function`.
    UnterminatedProcedure,

    // Literal errors
    /// A numeric literal cannot be represented.
    InvalidNumericLiteral,

    // Limits
    /// Too many top-level statements.
    TooManyStatements,
    /// Too many statements in one procedure body.
    ProcedureBodyTooLarge,
}

impl ParseErrorKind {
    /// Returns a human-readable name for this error kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseErrorKind::ExpectedToken => "expected token",
            ParseErrorKind::UnexpectedToken => "unexpected token",
            ParseErrorKind::UnexpectedEof => "unexpected end of input",
            ParseErrorKind::ExpectedExpression => "expected expression",
            ParseErrorKind::ExpectedIdentifier => "expected identifier",
            ParseErrorKind::ExpectedType => "expected type",
            ParseErrorKind::UnterminatedProcedure => "unterminated procedure",
            ParseErrorKind::InvalidNumericLiteral => "invalid numeric literal",
            ParseErrorKind::TooManyStatements => "too many statements",
            ParseErrorKind::ProcedureBodyTooLarge => "procedure body too large",
        }
    }

    /// Whether this kind aborts the whole parse instead of one statement.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ParseErrorKind::TooManyStatements | ParseErrorKind::ProcedureBodyTooLarge
        )
    }

    /// The stable diagnostic code for this kind.
    pub fn code(&self) -> ErrorCode {
        match self {
            ParseErrorKind::InvalidNumericLiteral => ErrorCode::InvalidNumericLiteral,
            ParseErrorKind::TooManyStatements => ErrorCode::TooManyStatements,
            ParseErrorKind::ProcedureBodyTooLarge => ErrorCode::ProcedureBodyTooLarge,
            _ => ErrorCode::SyntaxError,
        }
    }
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A parse error with location and message.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} at {span}: {message}")]
pub struct ParseError {
    /// The type of error that occurred.
    pub kind: ParseErrorKind,
    /// The location in source where the error occurred.
    pub span: Span,
    /// Additional context.
    pub message: String,
}

impl ParseError {
    /// Create a new parse error.
    pub fn new(kind: ParseErrorKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            message: message.into(),
        }
    }

    /// Create an "expected X, found Y" error.
    pub fn expected_token(span: Span, expected: &str, found: &str) -> Self {
        Self::new(
            ParseErrorKind::ExpectedToken,
            span,
            format!("expected {}, found {}", expected, found),
        )
    }

    /// Create an "unexpected token" error.
    pub fn unexpected_token(span: Span, found: &str) -> Self {
        Self::new(
            ParseErrorKind::UnexpectedToken,
            span,
            format!("unexpected {}", found),
        )
    }

    /// Create an "expected expression" error.
    pub fn expected_expression(span: Span, found: &str) -> Self {
        Self::new(
            ParseErrorKind::ExpectedExpression,
            span,
            format!("expected expression, found {}", found),
        )
    }

    /// Whether this error aborts the whole parse.
    pub fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }

    /// Format the error with the offending source line and a caret.
    pub fn display_with_source(&self, source: &str) -> String {
        let mut output = format!(
            "Error at {}:{}: {}\n",
            self.span.line, self.span.col, self.kind
        );
        if !self.message.is_empty() {
            output.push_str(&format!("  {}\n", self.message));
        }

        if let Some(line_text) = source
            .lines()
            .nth((self.span.line as usize).saturating_sub(1))
        {
            output.push_str("  |\n");
            output.push_str(&format!("{:>3} | {}\n", self.span.line, line_text));
            let indent = " ".repeat((self.span.col as usize).saturating_sub(1));
            let pointer = "^".to_string() + &"~".repeat((self.span.len as usize).saturating_sub(1));
            output.push_str(&format!("  | {}{}\n", indent, pointer));
        }

        output
    }
}

impl From<&ParseError> for CompilerError {
    fn from(error: &ParseError) -> Self {
        CompilerError::at(
            error.span,
            Severity::Error,
            error.kind.code(),
            format!("{}: {}", error.kind, error.message),
        )
    }
}

/// A collection of parse errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseErrors {
    errors: Vec<ParseError>,
}

impl ParseErrors {
    /// Create a new empty error collection.
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Add an error to the collection.
    pub fn push(&mut self, error: ParseError) {
        self.errors.push(error);
    }

    /// Check if there are any errors.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get the number of errors.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Iterate over the errors.
    pub fn iter(&self) -> impl Iterator<Item = &ParseError> {
        self.errors.iter()
    }

    /// Consume and return the errors.
    pub fn into_vec(self) -> Vec<ParseError> {
        self.errors
    }
}

impl IntoIterator for ParseErrors {
    type Item = ParseError;
    type IntoIter = std::vec::IntoIter<ParseError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a ParseErrors {
    type Item = &'a ParseError;
    type IntoIter = std::slice::Iter<'a, ParseError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl From<ParseError> for ParseErrors {
    fn from(error: ParseError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl std::fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.errors.len() {
            0 => write!(f, "no errors"),
            1 => write!(f, "{}", self.errors[0]),
            n => {
                writeln!(f, "{} errors:", n)?;
                for (i, error) in self.errors.iter().enumerate() {
                    writeln!(f, "  {}: {}", i + 1, error)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ParseErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_error_codes() {
        let err = LexError::SourceTooLarge { size: 10, limit: 5 };
        assert_eq!(err.code(), ErrorCode::SourceTooLarge);
        assert_eq!(err.span(), None);

        let diagnostic = CompilerError::from(&err);
        assert_eq!(diagnostic.line, 0);
        assert!(diagnostic.message.contains("10 bytes"));
    }

    #[test]
    fn lex_error_keeps_position() {
        let err = LexError::NumberTooLong {
            limit: 64,
            span: Span::new(2, 7, 70),
        };
        let diagnostic = CompilerError::from(&err);
        assert_eq!(diagnostic.line, 2);
        assert_eq!(diagnostic.column, 7);
        assert_eq!(diagnostic.code, ErrorCode::NumberTooLong);
    }

    #[test]
    fn fatal_kinds() {
        assert!(ParseErrorKind::TooManyStatements.is_fatal());
        assert!(ParseErrorKind::ProcedureBodyTooLarge.is_fatal());
        assert!(!ParseErrorKind::ExpectedExpression.is_fatal());
        assert!(!ParseErrorKind::InvalidNumericLiteral.is_fatal());
    }

    #[test]
    fn parse_error_display() {
        let error = ParseError::expected_token(Span::new(1, 6, 3), "')'", "newline");
        let display = error.to_string();
        assert!(display.contains("expected token"));
        assert!(display.contains("expected ')', found newline"));
    }

    #[test]
    fn parse_error_with_source() {
        let source = "Dim x As\nx = 1";
        let error = ParseError::new(ParseErrorKind::ExpectedType, Span::new(1, 9, 0), "after 'As'");
        let display = error.display_with_source(source);
        assert!(display.contains("1:9"));
        assert!(display.contains("Dim x As"));
        assert!(display.contains('^'));
    }

    #[test]
    fn multiple_errors_display() {
        let mut errors = ParseErrors::new();
        errors.push(ParseError::unexpected_token(Span::new(1, 1, 1), "')'"));
        errors.push(ParseError::unexpected_token(Span::new(2, 1, 1), "','"));
        assert_eq!(errors.len(), 2);
        assert!(errors.to_string().starts_with("2 errors:"));
    }
}
