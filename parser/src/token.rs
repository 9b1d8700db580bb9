//! Tokens produced by the BASIC lexer.
use crate::ast::{DataItem, Function};
use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    And,
    Def,
    Dim,
    Else,
    End,
    For,
    Gosub,
    Goto,
    If,
    Input,
    Let,
    Mod,
    Next,
    Not,
    On,
    Or,
    Print,
    Read,
    Restore,
    Return,
    Step,
    Stop,
    Swap,
    Then,
    To,
    Wend,
    While,
    Xor,
}

impl Keyword {
    const ALL: [Keyword; 28] = [
        Keyword::And,
        Keyword::Def,
        Keyword::Dim,
        Keyword::Else,
        Keyword::End,
        Keyword::For,
        Keyword::Gosub,
        Keyword::Goto,
        Keyword::If,
        Keyword::Input,
        Keyword::Let,
        Keyword::Mod,
        Keyword::Next,
        Keyword::Not,
        Keyword::On,
        Keyword::Or,
        Keyword::Print,
        Keyword::Read,
        Keyword::Restore,
        Keyword::Return,
        Keyword::Step,
        Keyword::Stop,
        Keyword::Swap,
        Keyword::Then,
        Keyword::To,
        Keyword::Wend,
        Keyword::While,
        Keyword::Xor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::And => "AND",
            Keyword::Def => "DEF",
            Keyword::Dim => "DIM",
            Keyword::Else => "ELSE",
            Keyword::End => "END",
            Keyword::For => "FOR",
            Keyword::Gosub => "GOSUB",
            Keyword::Goto => "GOTO",
            Keyword::If => "IF",
            Keyword::Input => "INPUT",
            Keyword::Let => "LET",
            Keyword::Mod => "MOD",
            Keyword::Next => "NEXT",
            Keyword::Not => "NOT",
            Keyword::On => "ON",
            Keyword::Or => "OR",
            Keyword::Print => "PRINT",
            Keyword::Read => "READ",
            Keyword::Restore => "RESTORE",
            Keyword::Return => "RETURN",
            Keyword::Step => "STEP",
            Keyword::Stop => "STOP",
            Keyword::Swap => "SWAP",
            Keyword::Then => "THEN",
            Keyword::To => "TO",
            Keyword::Wend => "WEND",
            Keyword::While => "WHILE",
            Keyword::Xor => "XOR",
        }
    }

    /// Look up an uppercased word.
    pub fn from_word(word: &str) -> Option<Keyword> {
        Keyword::ALL.into_iter().find(|k| k.as_str() == word)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Numeric literal spelling, uppercased, e.g. `10`, `.5`, `1E3`.
    Number(String),
    /// String literal contents without the quotes.
    Text(String),
    /// Uppercased variable name with its suffix, e.g. `A$`, `N%`.
    Ident(String),
    /// User function name including the prefix, e.g. `FNA`.
    FnName(String),
    Keyword(Keyword),
    Function(Function),
    /// Items of a whole `DATA` statement.
    Data(Vec<DataItem>),
    /// Comment text after `REM` or `'`.
    Rem(String),

    Plus,
    Minus,
    Star,
    Slash,
    Backslash,
    Caret,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
    Comma,
    Semicolon,
    Colon,

    Newline,
    Eof,
    Error(String),
}

impl TokenKind {
    /// Human-readable name for error messages.
    pub fn name(&self) -> String {
        match self {
            TokenKind::Number(text) => format!("number {text}"),
            TokenKind::Text(_) => "string".to_string(),
            TokenKind::Ident(name) => format!("`{name}`"),
            TokenKind::FnName(name) => format!("`{name}`"),
            TokenKind::Keyword(k) => format!("`{}`", k.as_str()),
            TokenKind::Function(f) => format!("`{}`", f.name()),
            TokenKind::Data(_) => "DATA".to_string(),
            TokenKind::Rem(_) => "comment".to_string(),
            TokenKind::Newline => "end of line".to_string(),
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::Error(_) => "error".to_string(),
            punct => format!("`{}`", punct.punct_str()),
        }
    }

    fn punct_str(&self) -> &'static str {
        match self {
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Backslash => "\\",
            TokenKind::Caret => "^",
            TokenKind::Eq => "=",
            TokenKind::Ne => "<>",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::Colon => ":",
            _ => "?",
        }
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        matches!(self, TokenKind::Keyword(k) if *k == keyword)
    }

    /// Whether this token ends a statement list.
    pub fn ends_line(&self) -> bool {
        matches!(self, TokenKind::Newline | TokenKind::Eof)
    }
}

/// A token with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}
