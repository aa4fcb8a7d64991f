//! Expression parsing using Pratt parsing (precedence climbing).
//!
//! This module implements expression parsing with operator precedence
//! using the Pratt parsing algorithm. Binding powers live on
//! [`BinaryOp::binding_power`].

use super::parser::Parser;
use crate::ast::expr::*;
use crate::ast::{BinaryOp, ParseError, ParseErrorKind, UNARY_BINDING_POWER, UnaryOp};
use crate::lexer::{TokenKind, string_value};
use bumpalo::collections::Vec as BVec;

/// Deepest expression nesting accepted before the parser gives up on a statement.
const MAX_EXPR_DEPTH: usize = 256;

impl<'ast> Parser<'ast> {
    /// Parse an expression with a minimum binding power.
    ///
    /// This is the core of the Pratt parser. It handles operator precedence
    /// by only consuming operators with sufficient binding power.
    pub fn parse_expr(&mut self, min_bp: u8) -> Result<&'ast Expr<'ast>, ParseError> {
        if self.depth >= MAX_EXPR_DEPTH {
            let token = *self.peek();
            return Err(ParseError::new(
                ParseErrorKind::UnexpectedToken,
                token.span,
                format!("expression nested deeper than {} levels", MAX_EXPR_DEPTH),
            ));
        }

        self.depth += 1;
        let result = self
            .parse_prefix()
            .and_then(|lhs| self.parse_expr_from(lhs, min_bp));
        self.depth -= 1;
        result
    }

    /// Continue a Pratt loop from an already-parsed left-hand side.
    ///
    /// Used by statements that had to consume a leading identifier before
    /// knowing whether it starts an expression.
    pub(super) fn parse_expr_from(
        &mut self,
        mut lhs: &'ast Expr<'ast>,
        min_bp: u8,
    ) -> Result<&'ast Expr<'ast>, ParseError> {
        loop {
            // Postfix call binds tightest and only applies to names and calls
            if self.check(TokenKind::LeftParen) && matches!(lhs, Expr::Ident(_) | Expr::Call(_)) {
                lhs = self.parse_call(lhs)?;
                continue;
            }

            let Some(bin_op) = BinaryOp::from_token(self.peek().kind) else {
                break;
            };

            let (l_bp, r_bp) = bin_op.binding_power();
            if l_bp < min_bp {
                break;
            }

            self.advance();
            let rhs = self.parse_expr(r_bp)?;
            let span = lhs.span().merge(rhs.span());
            lhs = self.arena.alloc(Expr::Binary(self.arena.alloc(BinaryExpr {
                left: lhs,
                op: bin_op,
                right: rhs,
                span,
            })));
        }

        Ok(lhs)
    }

    /// Parse a prefix expression (the start of an expression).
    fn parse_prefix(&mut self) -> Result<&'ast Expr<'ast>, ParseError> {
        let token = *self.peek();

        if let Some(op) = UnaryOp::from_token(token.kind) {
            self.advance();
            let operand = self.parse_expr(UNARY_BINDING_POWER)?;
            let span = token.span.merge(operand.span());
            return Ok(self.arena.alloc(Expr::Unary(self.arena.alloc(UnaryExpr {
                op,
                operand,
                span,
            }))));
        }

        match token.kind {
            TokenKind::NumberLiteral => {
                self.advance();
                let kind = if token.lexeme.contains('.') {
                    token.lexeme.parse::<f64>().ok().map(LiteralKind::Float)
                } else {
                    token.lexeme.parse::<i64>().ok().map(LiteralKind::Int)
                };

                let kind = kind.ok_or_else(|| {
                    ParseError::new(
                        ParseErrorKind::InvalidNumericLiteral,
                        token.span,
                        format!("'{}' cannot be represented", token.lexeme),
                    )
                })?;

                Ok(self.arena.alloc(Expr::Literal(LiteralExpr {
                    kind,
                    span: token.span,
                })))
            }

            TokenKind::StringLiteral => {
                self.advance();
                let value = self.arena.alloc_str(&string_value(token.lexeme));
                Ok(self.arena.alloc(Expr::Literal(LiteralExpr {
                    kind: LiteralKind::String(value),
                    span: token.span,
                })))
            }

            TokenKind::True | TokenKind::False => {
                self.advance();
                Ok(self.arena.alloc(Expr::Literal(LiteralExpr {
                    kind: LiteralKind::Bool(token.kind == TokenKind::True),
                    span: token.span,
                })))
            }

            TokenKind::Identifier => {
                let ident = self.parse_ident_path()?;
                Ok(self.arena.alloc(Expr::Ident(ident)))
            }

            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expr(0)?;
                let close = self.expect(TokenKind::RightParen)?;
                Ok(self.arena.alloc(Expr::Paren(self.arena.alloc(ParenExpr {
                    expr,
                    span: token.span.merge(close.span),
                }))))
            }

            TokenKind::Eof => Err(ParseError::new(
                ParseErrorKind::UnexpectedEof,
                token.span,
                "expected expression",
            )),

            _ => Err(ParseError::expected_expression(
                token.span,
                token.kind.description(),
            )),
        }
    }

    /// Parse a possibly dotted name: `x`, `Form1.Caption`.
    ///
    /// Segments after a dot may be keywords (`rs.End`).
    pub(super) fn parse_ident_path(&mut self) -> Result<IdentExpr<'ast>, ParseError> {
        let first = self.expect(TokenKind::Identifier)?;
        let mut path = BVec::new_in(self.arena);
        path.push(Ident::new(first.lexeme, first.span));

        while self.check(TokenKind::Dot) {
            let next = *self.peek_nth(1);
            if next.kind != TokenKind::Identifier && !next.kind.is_keyword() {
                break;
            }
            self.advance();
            self.advance();
            path.push(Ident::new(next.lexeme, next.span));
        }

        let span = first.span.merge(self.previous_span());
        Ok(IdentExpr {
            path: path.into_bump_slice(),
            span,
        })
    }

    /// Parse a parenthesized argument list after `callee`.
    fn parse_call(&mut self, callee: &'ast Expr<'ast>) -> Result<&'ast Expr<'ast>, ParseError> {
        self.expect(TokenKind::LeftParen)?;

        let mut args = BVec::new_in(self.arena);
        if !self.check(TokenKind::RightParen) {
            loop {
                args.push(*self.parse_expr(0)?);
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }

        let close = self.expect(TokenKind::RightParen)?;
        Ok(self.arena.alloc(Expr::Call(self.arena.alloc(CallExpr {
            callee,
            args: args.into_bump_slice(),
            span: callee.span().merge(close.span),
        }))))
    }

    /// Parse the unparenthesized arguments of a call statement:
    /// `MsgBox "hi", vbOKOnly`.
    pub(super) fn parse_bare_args(&mut self) -> Result<&'ast [Expr<'ast>], ParseError> {
        let mut args = BVec::new_in(self.arena);
        loop {
            args.push(*self.parse_expr(0)?);
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        Ok(args.into_bump_slice())
    }
}
