//! Token types and definitions for the BASIC lexer.

use std::fmt;
use vbstudio_core::Span;

/// A token from the source code.
///
/// The `'ast` lifetime refers to the arena where the lexeme string is allocated.
/// The lexeme keeps the original case of the source text.
#[derive(Clone, Copy, PartialEq)]
pub struct Token<'ast> {
    /// The type of token.
    pub kind: TokenKind,
    /// The source text of this token (allocated in arena).
    pub lexeme: &'ast str,
    /// Location of the first character.
    pub span: Span,
}

impl<'ast> Token<'ast> {
    /// Create a new token.
    #[inline]
    pub fn new(kind: TokenKind, lexeme: &'ast str, span: Span) -> Self {
        Self { kind, lexeme, span }
    }
}

impl fmt::Debug for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:?} @ {:?})", self.kind, self.lexeme, self.span)
    }
}

/// All token types of the dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // =========================================
    // Literals
    // =========================================
    /// Numeric literal: `42`, `3.14`
    NumberLiteral,
    /// String literal: `"hello"`, `"say ""hi"""`
    StringLiteral,

    // =========================================
    // Identifiers
    // =========================================
    /// User-defined identifier
    Identifier,
    /// A character the lexer does not recognize. Kept as an identifier-like
    /// token so the parser can report it.
    Unknown,

    // =========================================
    // Keywords - Declarations
    // =========================================
    /// `Dim`
    Dim,
    /// `As`
    As,
    /// `Sub`
    Sub,
    /// `Function`
    Function,
    /// `End`
    End,
    /// `Public`
    Public,
    /// `Private`
    Private,
    /// `ByVal`
    ByVal,
    /// `ByRef`
    ByRef,

    // =========================================
    // Keywords - Statements
    // =========================================
    /// `Let`
    Let,
    /// `Set`
    Set,
    /// `Call`
    Call,

    // =========================================
    // Keywords - Control flow
    // =========================================
    /// `If`
    If,
    /// `ElseIf`
    ElseIf,
    /// `Else`
    Else,
    /// `For`
    For,
    /// `Next`
    Next,
    /// `While`
    While,
    /// `Wend`
    Wend,
    /// `Do`
    Do,
    /// `Loop`
    Loop,
    /// `Select`
    Select,
    /// `Case`
    Case,
    /// `Exit`
    Exit,

    // =========================================
    // Keywords - Values and word operators
    // =========================================
    /// `True`
    True,
    /// `False`
    False,
    /// `Mod`
    Mod,
    /// `Not`
    Not,
    /// `And`
    And,
    /// `Or`
    Or,

    // =========================================
    // Operators
    // =========================================
    /// `=`
    Equal,
    /// `<>`
    NotEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `\`
    Backslash,
    /// `^`
    Caret,
    /// `&`
    Amp,

    // =========================================
    // Punctuation
    // =========================================
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `:` statement separator
    Colon,
    /// End of a source line
    Newline,

    // =========================================
    // Special
    // =========================================
    /// `' text` or `Rem text`
    Comment,
    /// End of file
    Eof,
}

impl TokenKind {
    /// Check if this token kind is a keyword.
    pub fn is_keyword(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Dim | As
                | Sub
                | Function
                | End
                | Public
                | Private
                | ByVal
                | ByRef
                | Let
                | Set
                | Call
                | If
                | ElseIf
                | Else
                | For
                | Next
                | While
                | Wend
                | Do
                | Loop
                | Select
                | Case
                | Exit
                | True
                | False
                | Mod
                | Not
                | And
                | Or
        )
    }

    /// Check if this token kind is a literal.
    pub fn is_literal(self) -> bool {
        matches!(
            self,
            TokenKind::NumberLiteral | TokenKind::StringLiteral | TokenKind::True | TokenKind::False
        )
    }

    /// Check if this token kind ends a statement.
    pub fn is_terminator(self) -> bool {
        matches!(self, TokenKind::Newline | TokenKind::Colon | TokenKind::Eof)
    }

    /// Keywords that open a control-flow line inside a procedure body.
    pub fn starts_control_flow(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            If | ElseIf | Else | For | Next | While | Wend | Do | Loop | Select | Case | Exit
        )
    }

    /// Keywords at which error recovery resumes.
    pub fn starts_declaration(self) -> bool {
        matches!(
            self,
            TokenKind::Dim
                | TokenKind::Private
                | TokenKind::Public
                | TokenKind::Sub
                | TokenKind::Function
        )
    }

    /// Get the string representation of this token kind for error messages.
    pub fn description(self) -> &'static str {
        use TokenKind::*;
        match self {
            NumberLiteral => "number",
            StringLiteral => "string literal",
            Identifier => "identifier",
            Unknown => "unknown character",
            Dim => "'Dim'",
            As => "'As'",
            Sub => "'Sub'",
            Function => "'Function'",
            End => "'End'",
            Public => "'Public'",
            Private => "'Private'",
            ByVal => "'ByVal'",
            ByRef => "'ByRef'",
            Let => "'Let'",
            Set => "'Set'",
            Call => "'Call'",
            If => "'If'",
            ElseIf => "'ElseIf'",
            Else => "'Else'",
            For => "'For'",
            Next => "'Next'",
            While => "'While'",
            Wend => "'Wend'",
            Do => "'Do'",
            Loop => "'Loop'",
            Select => "'Select'",
            Case => "'Case'",
            Exit => "'Exit'",
            True => "'True'",
            False => "'False'",
            Mod => "'Mod'",
            Not => "'Not'",
            And => "'And'",
            Or => "'Or'",
            Equal => "'='",
            NotEqual => "'<>'",
            Less => "'<'",
            LessEqual => "'<='",
            Greater => "'>'",
            GreaterEqual => "'>='",
            Plus => "'+'",
            Minus => "'-'",
            Star => "'*'",
            Slash => "'/'",
            Backslash => "'\\'",
            Caret => "'^'",
            Amp => "'&'",
            LeftParen => "'('",
            RightParen => "')'",
            Comma => "','",
            Dot => "'.'",
            Colon => "':'",
            Newline => "newline",
            Comment => "comment",
            Eof => "end of file",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Map an identifier to its keyword [`TokenKind`], or `None` if not a keyword.
///
/// Keywords are case-insensitive; the lookup uppercases the text first.
/// `Rem` is not in this table since it starts a comment rather than a token.
pub fn lookup_keyword(ident: &str) -> Option<TokenKind> {
    use TokenKind::*;
    Some(match ident.to_ascii_uppercase().as_str() {
        "DIM" => Dim,
        "AS" => As,
        "SUB" => Sub,
        "FUNCTION" => Function,
        "END" => End,
        "PUBLIC" => Public,
        "PRIVATE" => Private,
        "BYVAL" => ByVal,
        "BYREF" => ByRef,

        "LET" => Let,
        "SET" => Set,
        "CALL" => Call,

        "IF" => If,
        "ELSEIF" => ElseIf,
        "ELSE" => Else,
        "FOR" => For,
        "NEXT" => Next,
        "WHILE" => While,
        "WEND" => Wend,
        "DO" => Do,
        "LOOP" => Loop,
        "SELECT" => Select,
        "CASE" => Case,
        "EXIT" => Exit,

        "TRUE" => True,
        "FALSE" => False,
        "MOD" => Mod,
        "NOT" => Not,
        "AND" => And,
        "OR" => Or,

        _ => return None,
    })
}
