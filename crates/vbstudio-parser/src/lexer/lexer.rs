//! Main lexer implementation.
//!
//! The [`Lexer`] converts source text into a stream of [`Token`]s.
//! It uses direct dispatch based on the first character.
//!
//! The lexer copies all lexemes into the arena, allowing the source string
//! to be freed after lexing completes. Every length it scans is bounded by
//! [`LexerLimits`]; exceeding one aborts with a [`LexError`].

use std::time::Instant;

use bumpalo::Bump;
use log::debug;
use vbstudio_core::{LexError, LexerLimits, Span};

use super::cursor::{Cursor, is_ident_continue, is_ident_start};
use super::token::{Token, TokenKind, lookup_keyword};

/// How many tokens are scanned between wall-clock checks.
const CLOCK_CHECK_INTERVAL: usize = 256;

/// Lexer for BASIC source code.
///
/// The `'src` lifetime is the source string being lexed (temporary).
/// The `'ast` lifetime is the arena where token lexemes are allocated (persists).
pub struct Lexer<'src, 'ast> {
    /// Low-level character cursor.
    cursor: Cursor<'src>,
    /// Arena for allocating token lexemes.
    arena: &'ast Bump,
    limits: LexerLimits,
}

impl<'src, 'ast> Lexer<'src, 'ast> {
    /// Create a new lexer for the given source text.
    ///
    /// Fails with [`LexError::SourceTooLarge`] before scanning anything if the
    /// source exceeds the byte ceiling.
    pub fn new(
        source: &'src str,
        arena: &'ast Bump,
        limits: LexerLimits,
    ) -> Result<Self, LexError> {
        if source.len() > limits.max_source_bytes {
            return Err(LexError::SourceTooLarge {
                size: source.len(),
                limit: limits.max_source_bytes,
            });
        }

        Ok(Self {
            cursor: Cursor::new(source),
            arena,
            limits,
        })
    }

    /// Current position as a zero-length span.
    pub fn position(&self) -> Span {
        Span::point(self.cursor.line(), self.cursor.column())
    }

    /// Consume and return the next token.
    ///
    /// Returns an `Eof` token once the input is exhausted.
    pub fn next_token(&mut self) -> Result<Token<'ast>, LexError> {
        self.skip_whitespace();

        let start_line = self.cursor.line();
        let start_col = self.cursor.column();
        let start_offset = self.cursor.offset();

        let Some(c) = self.cursor.peek() else {
            return Ok(Token::new(TokenKind::Eof, "", Span::point(start_line, start_col)));
        };

        match c {
            '\n' => {
                self.cursor.advance();
                Ok(self.make_token(TokenKind::Newline, start_line, start_col, start_offset))
            }

            '\'' => self.scan_comment(start_line, start_col, start_offset),

            '"' => self.scan_string(start_line, start_col, start_offset),

            c if c.is_ascii_digit() => self.scan_number(start_line, start_col, start_offset),

            c if is_ident_start(c) => self.scan_identifier(start_line, start_col, start_offset),

            _ => Ok(self.scan_operator(start_line, start_col, start_offset)),
        }
    }

    // =========================================
    // Internal: helpers
    // =========================================

    /// Skip spaces, tabs, carriage returns, a leading BOM, and `_` line continuations.
    fn skip_whitespace(&mut self) {
        loop {
            match self.cursor.peek() {
                Some(' ' | '\t' | '\r' | '\u{FEFF}') => {
                    self.cursor.advance();
                }
                Some('_') if self.at_line_continuation() => {
                    while self.cursor.advance().is_some_and(|c| c != '\n') {}
                }
                _ => break,
            }
        }
    }

    /// Whether the character after the current one is a decimal digit.
    fn digit_follows(&self) -> bool {
        self.cursor.peek_nth(1).is_some_and(|c| c.is_ascii_digit())
    }

    /// A `_` after a space or tab, followed only by blanks up to the end of
    /// the line.
    fn at_line_continuation(&self) -> bool {
        if !matches!(self.cursor.prev(), Some(' ' | '\t')) {
            return false;
        }
        let mut n = 1;
        loop {
            match self.cursor.peek_nth(n) {
                Some(' ' | '\t' | '\r') => n += 1,
                Some('\n') => return true,
                _ => return false,
            }
        }
    }

    /// Create a token from start position to current position.
    /// Copies the lexeme into the arena.
    fn make_token(
        &self,
        kind: TokenKind,
        start_line: u32,
        start_col: u32,
        start_offset: u32,
    ) -> Token<'ast> {
        let src_lexeme = self.cursor.slice_from(start_offset);
        let span = Span::new(start_line, start_col, src_lexeme.len() as u32);
        let lexeme = self.arena.alloc_str(src_lexeme);
        Token::new(kind, lexeme, span)
    }

    fn span_from(&self, start_line: u32, start_col: u32, start_offset: u32) -> Span {
        Span::new(start_line, start_col, self.cursor.offset() - start_offset)
    }

    // =========================================
    // Scanning: Comments
    // =========================================

    /// Scan a comment up to (not including) the end of the line.
    ///
    /// Used both for `'` and for `Rem`, whose keyword has already been consumed.
    fn scan_comment(
        &mut self,
        start_line: u32,
        start_col: u32,
        start_offset: u32,
    ) -> Result<Token<'ast>, LexError> {
        let mut len = self.cursor.slice_from(start_offset).chars().count();
        while self.cursor.check(|c| c != '\n') {
            self.cursor.advance();
            len += 1;
            if len > self.limits.max_comment_len {
                return Err(LexError::CommentTooLong {
                    limit: self.limits.max_comment_len,
                    span: self.span_from(start_line, start_col, start_offset),
                });
            }
        }

        let token = self.make_token(TokenKind::Comment, start_line, start_col, start_offset);
        Ok(Token {
            lexeme: token.lexeme.trim_end_matches('\r'),
            ..token
        })
    }

    // =========================================
    // Scanning: Strings
    // =========================================

    /// Scan a double-quoted string literal.
    ///
    /// `""` inside the literal is an escaped quote. An unterminated literal
    /// runs to the end of input.
    fn scan_string(
        &mut self,
        start_line: u32,
        start_col: u32,
        start_offset: u32,
    ) -> Result<Token<'ast>, LexError> {
        self.cursor.advance(); // opening quote

        let mut len = 0usize;
        loop {
            match self.cursor.peek() {
                None => break,
                Some('"') => {
                    self.cursor.advance();
                    if self.cursor.peek() == Some('"') {
                        self.cursor.advance();
                        len += 1;
                    } else {
                        break;
                    }
                }
                Some(_) => {
                    self.cursor.advance();
                    len += 1;
                }
            }

            if len > self.limits.max_string_len {
                return Err(LexError::StringTooLong {
                    limit: self.limits.max_string_len,
                    span: self.span_from(start_line, start_col, start_offset),
                });
            }
        }

        Ok(self.make_token(TokenKind::StringLiteral, start_line, start_col, start_offset))
    }

    // =========================================
    // Scanning: Numbers
    // =========================================

    /// Scan a decimal number with at most one decimal point.
    fn scan_number(
        &mut self,
        start_line: u32,
        start_col: u32,
        start_offset: u32,
    ) -> Result<Token<'ast>, LexError> {
        let mut seen_dot = false;
        let mut len = 0usize;

        loop {
            match self.cursor.peek() {
                Some(c) if c.is_ascii_digit() => {}
                Some('.') if !seen_dot && self.digit_follows() => {
                    seen_dot = true;
                }
                _ => break,
            }

            self.cursor.advance();
            len += 1;
            if len > self.limits.max_number_len {
                return Err(LexError::NumberTooLong {
                    limit: self.limits.max_number_len,
                    span: self.span_from(start_line, start_col, start_offset),
                });
            }
        }

        Ok(self.make_token(TokenKind::NumberLiteral, start_line, start_col, start_offset))
    }

    // =========================================
    // Scanning: Identifiers and keywords
    // =========================================

    /// Scan an identifier, keyword, or `Rem` comment.
    ///
    /// A single trailing `$` type suffix (as in `Left$`) is part of the identifier.
    fn scan_identifier(
        &mut self,
        start_line: u32,
        start_col: u32,
        start_offset: u32,
    ) -> Result<Token<'ast>, LexError> {
        let mut len = 0usize;
        while self.cursor.check(is_ident_continue) {
            self.cursor.advance();
            len += 1;
            if len > self.limits.max_identifier_len {
                return Err(LexError::IdentifierTooLong {
                    limit: self.limits.max_identifier_len,
                    span: self.span_from(start_line, start_col, start_offset),
                });
            }
        }

        let word = self.cursor.slice_from(start_offset);
        if word.eq_ignore_ascii_case("rem") {
            return self.scan_comment(start_line, start_col, start_offset);
        }

        if self.cursor.eat('$') {
            return Ok(self.make_token(TokenKind::Identifier, start_line, start_col, start_offset));
        }

        let kind = lookup_keyword(word).unwrap_or(TokenKind::Identifier);
        Ok(self.make_token(kind, start_line, start_col, start_offset))
    }

    // =========================================
    // Scanning: Operators
    // =========================================

    /// Scan an operator or punctuation token.
    ///
    /// Unrecognized characters become [`TokenKind::Unknown`] tokens.
    fn scan_operator(&mut self, start_line: u32, start_col: u32, start_offset: u32) -> Token<'ast> {
        let Some(c) = self.cursor.advance() else {
            return Token::new(TokenKind::Eof, "", Span::point(start_line, start_col));
        };
        let next = self.cursor.peek();

        let kind = match (c, next) {
            ('(', _) => TokenKind::LeftParen,
            (')', _) => TokenKind::RightParen,
            (',', _) => TokenKind::Comma,
            ('.', _) => TokenKind::Dot,
            (':', _) => TokenKind::Colon,
            ('+', _) => TokenKind::Plus,
            ('-', _) => TokenKind::Minus,
            ('*', _) => TokenKind::Star,
            ('/', _) => TokenKind::Slash,
            ('\\', _) => TokenKind::Backslash,
            ('^', _) => TokenKind::Caret,
            ('&', _) => TokenKind::Amp,
            ('=', _) => TokenKind::Equal,

            ('<', Some('>')) => {
                self.cursor.advance();
                TokenKind::NotEqual
            }
            ('<', Some('=')) => {
                self.cursor.advance();
                TokenKind::LessEqual
            }
            ('<', _) => TokenKind::Less,

            ('>', Some('=')) => {
                self.cursor.advance();
                TokenKind::GreaterEqual
            }
            ('>', _) => TokenKind::Greater,

            _ => TokenKind::Unknown,
        };

        self.make_token(kind, start_line, start_col, start_offset)
    }
}

/// Tokenize a whole source text.
///
/// The returned tokens always end with a single `Eof` token. Scanning fails
/// if it produces more than `limits.max_tokens` tokens (not counting `Eof`)
/// or runs longer than `limits.timeout`.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn tokenize<'ast>(
    source: &str,
    arena: &'ast Bump,
    limits: &LexerLimits,
) -> Result<Vec<Token<'ast>>, LexError> {
    let mut lexer = Lexer::new(source, arena, *limits)?;
    let started = Instant::now();
    let mut tokens = Vec::new();

    loop {
        if tokens.len() % CLOCK_CHECK_INTERVAL == 0 && started.elapsed() >= limits.timeout {
            return Err(LexError::TokenizationTimeout {
                budget: limits.timeout,
                span: lexer.position(),
            });
        }

        let token = lexer.next_token()?;
        if token.kind == TokenKind::Eof {
            tokens.push(token);
            break;
        }

        if tokens.len() >= limits.max_tokens {
            return Err(LexError::TokenLimitExceeded {
                limit: limits.max_tokens,
                span: token.span,
            });
        }
        tokens.push(token);
    }

    debug!("tokenized {} bytes into {} tokens", source.len(), tokens.len());
    Ok(tokens)
}

/// Decode the value of a string literal lexeme.
///
/// Strips the surrounding quotes and collapses `""` into `"`. An
/// unterminated literal yields everything after the opening quote.
pub fn string_value(lexeme: &str) -> String {
    let body = lexeme.strip_prefix('"').unwrap_or(lexeme);
    let mut value = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '"' {
            if chars.peek() == Some(&'"') {
                chars.next();
                value.push('"');
            } else {
                break;
            }
        } else {
            value.push(c);
        }
    }

    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Helper to collect all tokens from source, without the trailing `Eof`.
    fn lex(source: &str) -> Vec<(TokenKind, String)> {
        let arena = Bump::new();
        let mut tokens = tokenize(source, &arena, &LexerLimits::default()).unwrap();
        assert_eq!(tokens.pop().map(|t| t.kind), Some(TokenKind::Eof));
        tokens.into_iter().map(|t| (t.kind, t.lexeme.to_string())).collect()
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).into_iter().map(|(kind, _)| kind).collect()
    }

    fn lex_err(source: &str, limits: LexerLimits) -> LexError {
        let arena = Bump::new();
        tokenize(source, &arena, &limits).unwrap_err()
    }

    // =========================================
    // Basic tokens
    // =========================================

    #[test]
    fn empty_source() {
        let arena = Bump::new();
        let tokens = tokenize("", &arena, &LexerLimits::default()).unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
    }

    #[test]
    fn whitespace_is_skipped_but_newlines_are_tokens() {
        assert_eq!(kinds("  \t\r\n  "), vec![TokenKind::Newline]);
    }

    #[test]
    fn keywords_ignore_case_and_keep_lexeme() {
        assert_eq!(
            lex("dim X as integer"),
            vec![
                (TokenKind::Dim, "dim".to_string()),
                (TokenKind::Identifier, "X".to_string()),
                (TokenKind::As, "as".to_string()),
                (TokenKind::Identifier, "integer".to_string()),
            ]
        );
    }

    #[test]
    fn identifier_with_type_suffix() {
        assert_eq!(
            kinds("Left$(s, 1)"),
            vec![
                TokenKind::Identifier,
                TokenKind::LeftParen,
                TokenKind::Identifier,
                TokenKind::Comma,
                TokenKind::NumberLiteral,
                TokenKind::RightParen,
            ]
        );
    }

    #[test]
    fn dotted_member_access() {
        assert_eq!(
            kinds("Form1.Show"),
            vec![TokenKind::Identifier, TokenKind::Dot, TokenKind::Identifier]
        );
    }

    // =========================================
    // Numbers
    // =========================================

    #[test]
    fn numbers_have_at_most_one_dot() {
        assert_eq!(
            lex("42 3.14 1.2.3"),
            vec![
                (TokenKind::NumberLiteral, "42".to_string()),
                (TokenKind::NumberLiteral, "3.14".to_string()),
                (TokenKind::NumberLiteral, "1.2".to_string()),
                (TokenKind::Dot, ".".to_string()),
                (TokenKind::NumberLiteral, "3".to_string()),
            ]
        );
    }

    // =========================================
    // Strings and comments
    // =========================================

    #[test]
    fn string_literals() {
        assert_eq!(lex(r#""hello""#), vec![(TokenKind::StringLiteral, r#""hello""#.to_string())]);
        assert_eq!(string_value(r#""say ""hi""""#), r#"say "hi""#);
    }

    #[test]
    fn unterminated_string_runs_to_end() {
        let tokens = lex("x = \"abc");
        assert_eq!(tokens.last(), Some(&(TokenKind::StringLiteral, "\"abc".to_string())));
        assert_eq!(string_value("\"abc"), "abc");
    }

    #[test]
    fn comments() {
        assert_eq!(
            lex("x = 1 ' set x\nRem done"),
            vec![
                (TokenKind::Identifier, "x".to_string()),
                (TokenKind::Equal, "=".to_string()),
                (TokenKind::NumberLiteral, "1".to_string()),
                (TokenKind::Comment, "' set x".to_string()),
                (TokenKind::Newline, "\n".to_string()),
                (TokenKind::Comment, "Rem done".to_string()),
            ]
        );
    }

    #[test]
    fn remark_prefix_is_an_identifier() {
        assert_eq!(kinds("Remark"), vec![TokenKind::Identifier]);
    }

    // =========================================
    // Operators
    // =========================================

    #[test]
    fn operators() {
        assert_eq!(
            kinds("= <> < <= > >= + - * / \\ ^ & ( ) , . :"),
            vec![
                TokenKind::Equal,
                TokenKind::NotEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Backslash,
                TokenKind::Caret,
                TokenKind::Amp,
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::Comma,
                TokenKind::Dot,
                TokenKind::Colon,
            ]
        );
    }

    #[test]
    fn unknown_character_does_not_fail() {
        assert_eq!(
            lex("a # b"),
            vec![
                (TokenKind::Identifier, "a".to_string()),
                (TokenKind::Unknown, "#".to_string()),
                (TokenKind::Identifier, "b".to_string()),
            ]
        );
    }

    #[test]
    fn line_continuation() {
        assert_eq!(
            kinds("x = 1 + _\n    2"),
            vec![
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::NumberLiteral,
                TokenKind::Plus,
                TokenKind::NumberLiteral,
            ]
        );
    }

    #[test]
    fn underscore_without_leading_blank_is_not_a_continuation() {
        assert!(kinds("x = 1 +_\n2").contains(&TokenKind::Newline));
        assert!(!kinds("x = 1 + _\n2").contains(&TokenKind::Newline));
    }

    #[test]
    fn positions_are_one_based() {
        let arena = Bump::new();
        let tokens = tokenize("Dim a\n  b = 1", &arena, &LexerLimits::default()).unwrap();
        assert_eq!(tokens[0].span, Span::new(1, 1, 3));
        assert_eq!(tokens[1].span, Span::new(1, 5, 1));
        // tokens[2] is the newline
        assert_eq!(tokens[3].span, Span::new(2, 3, 1));
    }

    // =========================================
    // Limits
    // =========================================

    #[test]
    fn source_too_large() {
        let limits = LexerLimits {
            max_source_bytes: 8,
            ..LexerLimits::default()
        };
        assert_eq!(
            lex_err("Dim x As Integer", limits),
            LexError::SourceTooLarge { size: 16, limit: 8 }
        );
    }

    #[test]
    fn token_limit() {
        let limits = LexerLimits {
            max_tokens: 3,
            ..LexerLimits::default()
        };
        let err = lex_err("a b c d e", limits);
        assert!(matches!(err, LexError::TokenLimitExceeded { limit: 3, .. }));

        // Exactly at the limit is fine.
        let arena = Bump::new();
        assert!(tokenize("a b c", &arena, &limits).is_ok());
    }

    #[test]
    fn timeout() {
        let limits = LexerLimits {
            timeout: Duration::ZERO,
            ..LexerLimits::default()
        };
        assert!(matches!(
            lex_err("x = 1", limits),
            LexError::TokenizationTimeout { .. }
        ));
    }

    #[test]
    fn length_caps() {
        let limits = LexerLimits {
            max_identifier_len: 4,
            max_number_len: 3,
            max_string_len: 2,
            max_comment_len: 5,
            ..LexerLimits::default()
        };
        assert!(matches!(lex_err("abcde", limits), LexError::IdentifierTooLong { limit: 4, .. }));
        assert!(matches!(lex_err("1234", limits), LexError::NumberTooLong { limit: 3, .. }));
        assert!(matches!(lex_err("\"abc\"", limits), LexError::StringTooLong { limit: 2, .. }));
        assert!(matches!(
            lex_err("' long comment", limits),
            LexError::CommentTooLong { limit: 5, .. }
        ));

        let arena = Bump::new();
        assert!(tokenize("abcd 123 \"ab\" ' ok", &arena, &limits).is_ok());
    }
}
