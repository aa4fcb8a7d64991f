//! Lexical analysis for the BASIC dialect.

mod cursor;
#[allow(clippy::module_inception)]
mod lexer;
mod token;

pub use lexer::{Lexer, string_value, tokenize};
pub use token::{Token, TokenKind, lookup_keyword};
