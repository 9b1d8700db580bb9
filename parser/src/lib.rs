//! # Parser
//!
//! Lexer, parser and renumbering formatter for line-numbered BASIC.
//!
//! ```text
//!  impl Read (file, &[u8], stdin)
//!      │
//!      ▼
//!  ┌────────┐   Token stream    ┌────────┐   Program    ┌───────────┐
//!  │ Lexer  │ ────────────────▶ │ Parser │ ───────────▶ │ Formatter │
//!  └────────┘  (impl Iterator)  └────────┘              └───────────┘
//! ```
//!
//! ```rust
//! let program = parser::parse("10 PRINT \"HI\"\n20 GOTO 10\n").unwrap();
//! assert_eq!(program.line_numbers().collect::<Vec<_>>(), vec![10, 20]);
//! ```

pub mod ast;
pub mod format;
pub mod lexer;
pub mod parser;
pub mod span;
pub mod token;

pub use ast::{
    BinaryOp, DataItem, Expr, Function, InputSeparator, PrintItem, Program, Stmt, UnaryOp,
    Variable,
};
pub use format::format_program;
pub use lexer::Lexer;
pub use parser::{ParseError, Parser};
pub use span::{Pos, Span};
pub use token::{Keyword, Token, TokenKind};

/// Parse a whole program from source text.
pub fn parse(source: &str) -> Result<Program, ParseError> {
    Parser::new(Lexer::from_str(source)).parse_program()
}
