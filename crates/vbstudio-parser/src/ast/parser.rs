//! Parser infrastructure.
//!
//! Provides the main [`Parser`] struct with token navigation, error
//! recording and statement-level recovery. The grammar itself lives in
//! `expr_parser.rs` and `stmt_parser.rs`.

use crate::ast::{ParseError, ParseErrorKind, ParseErrors, Program};
use crate::lexer::{Token, TokenKind, tokenize};
use bumpalo::Bump;
use bumpalo::collections::Vec as BVec;
use log::debug;
use thiserror::Error;
use vbstudio_core::{CompilerError, LexError, LexerLimits, ParserLimits, Span};

/// A fatal failure of the lex-then-parse front end.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrontendError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl From<&FrontendError> for CompilerError {
    fn from(error: &FrontendError) -> Self {
        match error {
            FrontendError::Lex(e) => CompilerError::from(e),
            FrontendError::Parse(e) => CompilerError::from(e),
        }
    }
}

/// The main parser for BASIC source code.
///
/// The parser works over a pre-lexed token buffer, allowing arbitrary
/// peeking ahead without consuming tokens. Comment tokens are dropped when
/// the parser is built.
///
/// The `'ast` lifetime refers to the arena where AST nodes and token
/// lexemes are allocated.
pub struct Parser<'ast> {
    /// Buffered tokens, always ending with `Eof`
    pub(super) buffer: Vec<Token<'ast>>,
    /// Current position in the buffer
    pub(super) position: usize,
    /// Where the statement being parsed started
    pub(super) statement_start: usize,
    /// Accumulated parse errors
    pub(super) errors: ParseErrors,
    /// Whether we're in panic mode (skipping to synchronization point)
    pub(super) panic_mode: bool,
    /// Current expression nesting
    pub(super) depth: usize,
    pub(super) limits: ParserLimits,
    /// Arena allocator for AST nodes
    pub(super) arena: &'ast Bump,
}

impl<'ast> Parser<'ast> {
    /// Create a parser over a token sequence.
    ///
    /// Comments are filtered out. An `Eof` token is appended if missing.
    pub fn new(tokens: Vec<Token<'ast>>, arena: &'ast Bump, limits: ParserLimits) -> Self {
        let mut buffer: Vec<Token<'ast>> = tokens
            .into_iter()
            .filter(|token| token.kind != TokenKind::Comment)
            .collect();

        if buffer.last().is_none_or(|token| token.kind != TokenKind::Eof) {
            let span = buffer.last().map_or(Span::point(1, 1), |token| {
                Span::point(token.span.line, token.span.col + token.span.len)
            });
            buffer.push(Token::new(TokenKind::Eof, "", span));
        }

        Self {
            buffer,
            position: 0,
            statement_start: 0,
            errors: ParseErrors::new(),
            panic_mode: false,
            depth: 0,
            limits,
            arena,
        }
    }

    /// Tokenize and parse a source text in one step.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn parse_source(
        source: &str,
        arena: &'ast Bump,
        lexer_limits: &LexerLimits,
        parser_limits: &ParserLimits,
    ) -> Result<(Program<'ast>, ParseErrors), FrontendError> {
        let tokens = tokenize(source, arena, lexer_limits)?;
        Ok(Parser::new(tokens, arena, *parser_limits).parse()?)
    }

    /// Parse the whole token buffer into a [`Program`].
    ///
    /// Syntax errors are recovered from statement by statement and returned
    /// alongside the program. Only the statement-count limits abort the parse.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn parse(mut self) -> Result<(Program<'ast>, ParseErrors), ParseError> {
        let start_span = self.peek().span;
        let mut statements = BVec::new_in(self.arena);

        loop {
            self.skip_separators();
            if self.is_eof() {
                break;
            }

            self.statement_start = self.position;
            match self.parse_top_level_stmt() {
                Ok(stmt) => {
                    if statements.len() >= self.limits.max_statements {
                        return Err(ParseError::new(
                            ParseErrorKind::TooManyStatements,
                            stmt.span(),
                            format!(
                                "more than {} top-level statements",
                                self.limits.max_statements
                            ),
                        ));
                    }
                    statements.push(stmt);
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    self.record(err);
                    self.synchronize();
                }
            }
        }

        let end_span = self.previous_span();
        debug!(
            "parsed {} top-level statements with {} recovered errors",
            statements.len(),
            self.errors.len()
        );

        let program = Program {
            statements: statements.into_bump_slice(),
            span: start_span.merge(end_span),
        };
        Ok((program, self.errors))
    }

    /// Check if there are any errors.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    // ========================================================================
    // Token Navigation
    // ========================================================================

    /// Peek at the current token without consuming it.
    pub fn peek(&self) -> &Token<'ast> {
        self.peek_nth(0)
    }

    /// Peek ahead n tokens without consuming. Past the end, returns `Eof`.
    pub fn peek_nth(&self, n: usize) -> &Token<'ast> {
        let last = self.buffer.len() - 1;
        &self.buffer[(self.position + n).min(last)]
    }

    /// Get the current token and advance to the next.
    ///
    /// Never moves past the final `Eof`.
    pub fn advance(&mut self) -> Token<'ast> {
        let token = *self.peek();
        if self.position < self.buffer.len() - 1 {
            self.position += 1;
        }
        token
    }

    /// Check if the current token matches the given kind.
    pub fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    /// Check if the current token is EOF.
    pub fn is_eof(&self) -> bool {
        self.check(TokenKind::Eof)
    }

    /// If the current token matches the given kind, consume it and return Some.
    /// Otherwise, return None without consuming.
    pub fn eat(&mut self, kind: TokenKind) -> Option<Token<'ast>> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    /// Expect the current token to be of the given kind.
    /// If it matches, consume and return it. Otherwise, return an error.
    pub fn expect(&mut self, kind: TokenKind) -> Result<Token<'ast>, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let token = *self.peek();
            Err(ParseError::expected_token(
                token.span,
                kind.description(),
                token.kind.description(),
            ))
        }
    }

    /// Span of the most recently consumed token.
    pub(super) fn previous_span(&self) -> Span {
        self.buffer[self.position.saturating_sub(1)].span
    }

    /// Skip blank lines and `:` separators.
    pub(super) fn skip_separators(&mut self) {
        while matches!(self.peek().kind, TokenKind::Newline | TokenKind::Colon) {
            self.advance();
        }
    }

    /// Require the end of a statement: newline, `:` or end of input.
    ///
    /// The separator is consumed; `Eof` is left in place.
    pub(super) fn expect_statement_end(&mut self) -> Result<(), ParseError> {
        let token = *self.peek();
        match token.kind {
            TokenKind::Newline | TokenKind::Colon => {
                self.advance();
                Ok(())
            }
            TokenKind::Eof => Ok(()),
            _ => Err(ParseError::expected_token(
                token.span,
                "end of statement",
                token.kind.description(),
            )),
        }
    }

    // ========================================================================
    // Error Handling
    // ========================================================================

    /// Record a recoverable parse error.
    ///
    /// While in panic mode only the first error of a statement is kept.
    pub fn record(&mut self, error: ParseError) {
        if !self.panic_mode {
            self.errors.push(error);
        }
        self.panic_mode = true;
    }

    /// Synchronize after an error by skipping tokens until a safe point.
    ///
    /// Safe points are just after the next newline, or a declaration keyword
    /// (`Dim`, `Private`, `Public`, `Sub`, `Function`). At least one token
    /// is consumed when the failed statement consumed none.
    pub fn synchronize(&mut self) {
        self.panic_mode = false;

        let mut advanced = self.position > self.statement_start;
        while !self.is_eof() {
            let kind = self.peek().kind;
            if advanced && kind.starts_declaration() {
                return;
            }

            self.advance();
            advanced = true;
            if kind == TokenKind::Newline {
                return;
            }
        }
    }
}
