//! Statement and declaration parsing.
//!
//! Every statement ends at a newline, a `:` separator, or end of input.
//! Procedure bodies additionally accept control-flow lines, which are kept
//! as [`RawStmt`] text instead of being parsed into structure.

use super::parser::Parser;
use crate::ast::expr::*;
use crate::ast::stmt::*;
use crate::ast::{ParseError, ParseErrorKind};
use crate::lexer::TokenKind;
use bumpalo::collections::Vec as BVec;
use vbstudio_core::Span;

impl<'ast> Parser<'ast> {
    // ========================================================================
    // Top level
    // ========================================================================

    /// Parse one module-level statement including its terminator.
    pub(super) fn parse_top_level_stmt(&mut self) -> Result<Stmt<'ast>, ParseError> {
        let token = *self.peek();

        let stmt = match token.kind {
            TokenKind::Dim => self.parse_dim(None)?,
            TokenKind::Public | TokenKind::Private => {
                self.advance();
                let visibility = if token.kind == TokenKind::Private {
                    Visibility::Private
                } else {
                    Visibility::Public
                };

                match self.peek().kind {
                    TokenKind::Sub | TokenKind::Function => {
                        self.parse_procedure(visibility, token.span)?
                    }
                    TokenKind::Identifier => self.parse_var_list(Some(visibility), token.span)?,
                    _ => {
                        let found = *self.peek();
                        return Err(ParseError::expected_token(
                            found.span,
                            "'Sub', 'Function' or a variable name",
                            found.kind.description(),
                        ));
                    }
                }
            }
            TokenKind::Sub | TokenKind::Function => {
                self.parse_procedure(Visibility::Public, token.span)?
            }
            _ => self.parse_simple_stmt()?,
        };

        self.expect_statement_end()?;
        Ok(stmt)
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    /// Parse `Dim name [As Type] [, name [As Type]]*`.
    fn parse_dim(&mut self, visibility: Option<Visibility>) -> Result<Stmt<'ast>, ParseError> {
        let start = self.expect(TokenKind::Dim)?;
        self.parse_var_list(visibility, start.span)
    }

    /// Parse the declarator list of a variable declaration.
    fn parse_var_list(
        &mut self,
        visibility: Option<Visibility>,
        start: Span,
    ) -> Result<Stmt<'ast>, ParseError> {
        let mut vars = BVec::new_in(self.arena);
        loop {
            let name = self.expect_ident()?;
            let ty = self.parse_as_clause()?;
            let span = name.span.merge(self.previous_span());
            vars.push(VarDeclarator { name, ty, span });

            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }

        Ok(Stmt::VarDecl(VarDeclStmt {
            visibility,
            vars: vars.into_bump_slice(),
            span: start.merge(self.previous_span()),
        }))
    }

    /// Parse an optional `As Type` clause.
    fn parse_as_clause(&mut self) -> Result<Option<Ident<'ast>>, ParseError> {
        if self.eat(TokenKind::As).is_none() {
            return Ok(None);
        }

        let token = *self.peek();
        if token.kind != TokenKind::Identifier {
            return Err(ParseError::new(
                ParseErrorKind::ExpectedType,
                token.span,
                format!("expected type after 'As', found {}", token.kind),
            ));
        }
        self.advance();
        Ok(Some(Ident::new(token.lexeme, token.span)))
    }

    fn expect_ident(&mut self) -> Result<Ident<'ast>, ParseError> {
        let token = *self.peek();
        if token.kind != TokenKind::Identifier {
            return Err(ParseError::new(
                ParseErrorKind::ExpectedIdentifier,
                token.span,
                format!("expected identifier, found {}", token.kind),
            ));
        }
        self.advance();
        Ok(Ident::new(token.lexeme, token.span))
    }

    /// Parse a `Sub` or `Function` declaration through its `End` line.
    ///
    /// The current token is `Sub` or `Function`; any visibility modifier has
    /// already been consumed and `start` is its span.
    fn parse_procedure(
        &mut self,
        visibility: Visibility,
        start: Span,
    ) -> Result<Stmt<'ast>, ParseError> {
        let keyword = self.advance();
        let is_function = keyword.kind == TokenKind::Function;
        let name = self.expect_ident()?;

        let mut params = BVec::new_in(self.arena);
        if self.eat(TokenKind::LeftParen).is_some() {
            if !self.check(TokenKind::RightParen) {
                loop {
                    params.push(self.parse_param()?);
                    if self.eat(TokenKind::Comma).is_none() {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RightParen)?;
        }

        let return_type = if is_function {
            self.parse_as_clause()?
        } else {
            None
        };
        self.expect_statement_end()?;

        let body = self.parse_body(keyword.kind, name)?;

        let decl = self.arena.alloc(ProcDecl {
            visibility,
            name,
            params: params.into_bump_slice(),
            return_type,
            body,
            span: start.merge(self.previous_span()),
        });

        Ok(if is_function {
            Stmt::Function(decl)
        } else {
            Stmt::Sub(decl)
        })
    }

    /// Parse `[ByVal|ByRef] name [As Type]`.
    fn parse_param(&mut self) -> Result<Param<'ast>, ParseError> {
        let start = self.peek().span;
        let passing = if self.eat(TokenKind::ByVal).is_some() {
            Some(PassingMode::ByVal)
        } else if self.eat(TokenKind::ByRef).is_some() {
            Some(PassingMode::ByRef)
        } else {
            None
        };

        let name = self.expect_ident()?;
        let ty = self.parse_as_clause()?;
        Ok(Param {
            passing,
            name,
            ty,
            span: start.merge(self.previous_span()),
        })
    }

    // ========================================================================
    // Procedure bodies
    // ========================================================================

    /// Parse body statements up to and including `End Sub` / `End Function`.
    ///
    /// Errors inside the body are recovered the same way as at top level.
    /// Reaching end of input records an unterminated-procedure error and
    /// keeps what was parsed.
    fn parse_body(
        &mut self,
        kind: TokenKind,
        name: Ident<'ast>,
    ) -> Result<&'ast [Stmt<'ast>], ParseError> {
        let mut body = BVec::new_in(self.arena);

        loop {
            self.skip_separators();

            if self.is_eof() {
                let span = self.peek().span;
                self.record(ParseError::new(
                    ParseErrorKind::UnterminatedProcedure,
                    span,
                    format!("'{}' is missing 'End {}'", name.name, keyword_name(kind)),
                ));
                self.panic_mode = false;
                break;
            }

            let closes = matches!(self.peek_nth(1).kind, TokenKind::Sub | TokenKind::Function);
            if self.check(TokenKind::End) && closes {
                self.advance();
                let closing = self.advance();
                if closing.kind != kind {
                    self.record(ParseError::expected_token(
                        closing.span,
                        if kind == TokenKind::Sub { "'End Sub'" } else { "'End Function'" },
                        closing.kind.description(),
                    ));
                    self.panic_mode = false;
                }
                break;
            }

            if body.len() >= self.limits.max_body_statements {
                return Err(ParseError::new(
                    ParseErrorKind::ProcedureBodyTooLarge,
                    self.peek().span,
                    format!(
                        "'{}' has more than {} statements",
                        name.name, self.limits.max_body_statements
                    ),
                ));
            }

            self.statement_start = self.position;
            match self.parse_body_stmt() {
                Ok(stmt) => body.push(stmt),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    self.record(err);
                    self.synchronize();
                }
            }
        }

        Ok(body.into_bump_slice())
    }

    /// Parse one statement inside a procedure body including its terminator.
    fn parse_body_stmt(&mut self) -> Result<Stmt<'ast>, ParseError> {
        let token = *self.peek();

        if token.kind.starts_control_flow() || token.kind == TokenKind::End {
            return Ok(self.parse_raw_line());
        }

        let stmt = match token.kind {
            TokenKind::Dim => self.parse_dim(None)?,
            TokenKind::Sub | TokenKind::Function | TokenKind::Public | TokenKind::Private => {
                return Err(ParseError::new(
                    ParseErrorKind::UnexpectedToken,
                    token.span,
                    format!("{} is not allowed inside a procedure", token.kind),
                ));
            }
            _ => self.parse_simple_stmt()?,
        };

        self.expect_statement_end()?;
        Ok(stmt)
    }

    /// Capture the rest of the line as raw text.
    fn parse_raw_line(&mut self) -> Stmt<'ast> {
        let start = self.peek().span;
        let mut text = String::new();
        let mut prev: Option<TokenKind> = None;

        while !matches!(self.peek().kind, TokenKind::Newline | TokenKind::Eof) {
            let token = self.advance();
            let glue = matches!(prev, None | Some(TokenKind::Dot | TokenKind::LeftParen))
                || matches!(token.kind, TokenKind::Dot | TokenKind::Comma | TokenKind::RightParen)
                || (token.kind == TokenKind::LeftParen && prev == Some(TokenKind::Identifier));
            if !glue {
                text.push(' ');
            }
            text.push_str(token.lexeme);
            prev = Some(token.kind);
        }

        let span = start.merge(self.previous_span());
        self.eat(TokenKind::Newline);

        Stmt::Raw(RawStmt {
            text: self.arena.alloc_str(&text),
            span,
        })
    }

    // ========================================================================
    // Simple statements
    // ========================================================================

    /// Parse an assignment, call or expression statement (without terminator).
    fn parse_simple_stmt(&mut self) -> Result<Stmt<'ast>, ParseError> {
        let token = *self.peek();

        match token.kind {
            TokenKind::Let | TokenKind::Set => {
                self.advance();
                let keyword = if token.kind == TokenKind::Let {
                    AssignKeyword::Let
                } else {
                    AssignKeyword::Set
                };
                let target = self.parse_ident_path()?;
                self.expect(TokenKind::Equal)?;
                self.finish_assignment(Some(keyword), target, token.span)
            }

            TokenKind::Call => {
                self.advance();
                let expr = self.parse_expr(0)?;
                let expr = match expr {
                    Expr::Ident(_) => Expr::Call(self.arena.alloc(CallExpr {
                        callee: expr,
                        args: &[],
                        span: expr.span(),
                    })),
                    Expr::Call(_) => *expr,
                    other => {
                        return Err(ParseError::new(
                            ParseErrorKind::UnexpectedToken,
                            other.span(),
                            "'Call' must be followed by a procedure name",
                        ));
                    }
                };
                Ok(Stmt::Expr(ExprStmt {
                    expr,
                    span: token.span.merge(self.previous_span()),
                }))
            }

            TokenKind::Identifier => {
                let target = self.parse_ident_path()?;

                if self.eat(TokenKind::Equal).is_some() {
                    return self.finish_assignment(None, target, token.span);
                }

                let callee = self.arena.alloc(Expr::Ident(target));
                let expr = if self.peek().kind.is_terminator() {
                    *callee
                } else if starts_bare_argument(self.peek().kind) {
                    let args = self.parse_bare_args()?;
                    Expr::Call(self.arena.alloc(CallExpr {
                        callee,
                        args,
                        span: token.span.merge(self.previous_span()),
                    }))
                } else {
                    *self.parse_expr_from(callee, 0)?
                };

                Ok(Stmt::Expr(ExprStmt {
                    expr,
                    span: token.span.merge(self.previous_span()),
                }))
            }

            _ => {
                let expr = self.parse_expr(0)?;
                Ok(Stmt::Expr(ExprStmt {
                    expr: *expr,
                    span: expr.span(),
                }))
            }
        }
    }

    fn finish_assignment(
        &mut self,
        keyword: Option<AssignKeyword>,
        target: IdentExpr<'ast>,
        start: Span,
    ) -> Result<Stmt<'ast>, ParseError> {
        let value = *self.parse_expr(0)?;
        Ok(Stmt::Assign(self.arena.alloc(AssignStmt {
            keyword,
            target,
            value,
            span: start.merge(value.span()),
        })))
    }
}

/// Tokens that begin the first argument of an unparenthesized call.
///
/// Operators and `(` are excluded so that `x + 1` and `Foo(1)` stay
/// expressions.
fn starts_bare_argument(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Identifier
            | TokenKind::NumberLiteral
            | TokenKind::StringLiteral
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Not
    )
}

fn keyword_name(kind: TokenKind) -> &'static str {
    if kind == TokenKind::Function { "Function" } else { "Sub" }
}
