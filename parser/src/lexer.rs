//! Streaming lexer for line-numbered BASIC.
//!
//! The [`Lexer`] pulls bytes from any [`std::io::Read`] and implements
//! [`Iterator`] over [`Token`]s, ending with exactly one
//! [`TokenKind::Eof`]. Line breaks are significant and come out as
//! [`TokenKind::Newline`].
//!
//! Words are case-insensitive and uppercased. A keyword is recognised on
//! its letters alone, so `GOTO100` lexes as `GOTO` followed by `100`.
//! `REM`, `'` and `DATA` take the rest of their statement raw.
use std::collections::VecDeque;
use std::io::{Bytes, Read};

use crate::ast::{DataItem, Function};
use crate::span::{Pos, Span};
use crate::token::{Keyword, Token, TokenKind};

/// Peekable byte source with position tracking.
struct ReadBuf<R: Read> {
    bytes: Bytes<R>,
    ahead: VecDeque<u8>,
    pos: Pos,
}

impl<R: Read> ReadBuf<R> {
    fn new(reader: R) -> Self {
        Self {
            bytes: reader.bytes(),
            ahead: VecDeque::new(),
            pos: Pos::origin(),
        }
    }

    /// Read errors end the stream like end of input does.
    fn peek_ahead(&mut self, n: usize) -> Option<u8> {
        while self.ahead.len() <= n {
            match self.bytes.next() {
                Some(Ok(b)) => self.ahead.push_back(b),
                _ => return None,
            }
        }
        Some(self.ahead[n])
    }

    fn peek(&mut self) -> Option<u8> {
        self.peek_ahead(0)
    }

    fn advance(&mut self) -> Option<u8> {
        self.peek()?;
        let b = self.ahead.pop_front()?;
        self.pos.offset += 1;
        if b == b'\n' {
            self.pos.line += 1;
            self.pos.column = 1;
        } else {
            self.pos.column += 1;
        }
        Some(b)
    }
}

pub struct Lexer<R: Read> {
    rb: ReadBuf<R>,
    emitted_eof: bool,
}

impl<R: Read> Lexer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            rb: ReadBuf::new(reader),
            emitted_eof: false,
        }
    }
}

impl<'a> Lexer<&'a [u8]> {
    pub fn from_str(source: &'a str) -> Self {
        Self::new(source.as_bytes())
    }
}

fn is_blank(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r')
}

impl<R: Read> Lexer<R> {
    fn skip_blanks(&mut self) {
        while self.rb.peek().is_some_and(is_blank) {
            self.rb.advance();
        }
    }

    /// Everything up to (not including) the line break.
    fn rest_of_line(&mut self) -> String {
        let mut raw = Vec::new();
        while let Some(b) = self.rb.peek() {
            if b == b'\n' {
                break;
            }
            raw.push(b);
            self.rb.advance();
        }
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
        String::from_utf8_lossy(&raw).into_owned()
    }

    /// `"..."`; an unterminated literal ends at the line break.
    fn lex_string(&mut self) -> TokenKind {
        self.rb.advance();
        let mut raw = Vec::new();
        loop {
            match self.rb.peek() {
                None | Some(b'\n') => break,
                Some(b'"') => {
                    self.rb.advance();
                    break;
                }
                Some(b) => {
                    raw.push(b);
                    self.rb.advance();
                }
            }
        }
        TokenKind::Text(String::from_utf8_lossy(&raw).into_owned())
    }

    fn take_digits(&mut self, text: &mut String) {
        while let Some(b) = self.rb.peek().filter(u8::is_ascii_digit) {
            text.push(b as char);
            self.rb.advance();
        }
    }

    /// Digits, fraction and `E`/`D` exponent. A trailing `!` or `#` type
    /// suffix is dropped.
    fn lex_number(&mut self) -> TokenKind {
        let mut text = String::new();
        self.take_digits(&mut text);
        if self.rb.peek() == Some(b'.') {
            text.push('.');
            self.rb.advance();
            self.take_digits(&mut text);
        }
        if text == "." {
            return TokenKind::Error("unexpected `.`".into());
        }
        if let Some(e) = self.rb.peek().filter(|b| matches!(b, b'E' | b'e' | b'D' | b'd')) {
            let signed = matches!(self.rb.peek_ahead(1), Some(b'+' | b'-'));
            let digit_at = if signed { 2 } else { 1 };
            if self.rb.peek_ahead(digit_at).is_some_and(|b| b.is_ascii_digit()) {
                text.push(e.to_ascii_uppercase() as char);
                self.rb.advance();
                if signed {
                    text.push(self.rb.advance().unwrap_or(b'+') as char);
                }
                self.take_digits(&mut text);
            }
        }
        if matches!(self.rb.peek(), Some(b'!' | b'#')) {
            self.rb.advance();
        }
        TokenKind::Number(text)
    }

    /// The items of a `DATA` statement, up to `:` or the end of the line.
    fn lex_data(&mut self) -> Vec<DataItem> {
        self.skip_blanks();
        let mut items = Vec::new();
        let mut text = Vec::new();
        let mut quoted = false;
        let mut in_quotes = false;
        loop {
            match self.rb.peek() {
                None | Some(b'\n') => break,
                Some(b':') if !in_quotes => break,
                Some(b',') if !in_quotes => {
                    self.rb.advance();
                    items.push(data_item(&text, quoted));
                    text.clear();
                    quoted = false;
                }
                Some(b'"') => {
                    self.rb.advance();
                    if in_quotes {
                        in_quotes = false;
                    } else if !quoted && text.iter().copied().all(is_blank) {
                        text.clear();
                        quoted = true;
                        in_quotes = true;
                    } else {
                        text.push(b'"');
                    }
                }
                Some(b) => {
                    self.rb.advance();
                    // Anything after a closing quote is ignored.
                    if in_quotes || !quoted {
                        text.push(b);
                    }
                }
            }
        }
        items.push(data_item(&text, quoted));
        items
    }

    fn lex_word(&mut self) -> TokenKind {
        let mut word = String::new();
        while let Some(b) = self.rb.peek().filter(u8::is_ascii_alphabetic) {
            word.push(b.to_ascii_uppercase() as char);
            self.rb.advance();
        }
        match word.as_str() {
            "REM" => return TokenKind::Rem(self.rest_of_line()),
            "DATA" => return TokenKind::Data(self.lex_data()),
            "FN" => {
                self.skip_blanks();
                if !self.rb.peek().is_some_and(|b| b.is_ascii_alphabetic()) {
                    return TokenKind::Error("expected a function name after FN".into());
                }
                self.take_name_tail(&mut word);
                return TokenKind::FnName(word);
            }
            _ => {}
        }
        if let Some(keyword) = Keyword::from_word(&word) {
            return TokenKind::Keyword(keyword);
        }
        self.take_name_tail(&mut word);
        if word.starts_with("FN") {
            TokenKind::FnName(word)
        } else if let Some(function) = Function::from_name(&word) {
            TokenKind::Function(function)
        } else {
            TokenKind::Ident(word)
        }
    }

    /// Letters, digits and one optional type suffix.
    fn take_name_tail(&mut self, word: &mut String) {
        while let Some(b) = self.rb.peek().filter(u8::is_ascii_alphanumeric) {
            word.push(b.to_ascii_uppercase() as char);
            self.rb.advance();
        }
        if let Some(b) = self.rb.peek().filter(|b| matches!(b, b'$' | b'%' | b'!' | b'#')) {
            word.push(b as char);
            self.rb.advance();
        }
    }

    fn lex_punct(&mut self) -> TokenKind {
        let Some(b) = self.rb.advance() else {
            return TokenKind::Eof;
        };
        match b {
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'\\' => TokenKind::Backslash,
            b'^' => TokenKind::Caret,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b',' => TokenKind::Comma,
            b';' => TokenKind::Semicolon,
            b':' => TokenKind::Colon,
            b'=' => match self.rb.peek() {
                Some(b'<') => self.then(TokenKind::Le),
                Some(b'>') => self.then(TokenKind::Ge),
                _ => TokenKind::Eq,
            },
            b'<' => match self.rb.peek() {
                Some(b'>') => self.then(TokenKind::Ne),
                Some(b'=') => self.then(TokenKind::Le),
                _ => TokenKind::Lt,
            },
            b'>' => match self.rb.peek() {
                Some(b'<') => self.then(TokenKind::Ne),
                Some(b'=') => self.then(TokenKind::Ge),
                _ => TokenKind::Gt,
            },
            other if other.is_ascii_graphic() => {
                TokenKind::Error(format!("unexpected character `{}`", other as char))
            }
            other => TokenKind::Error(format!("unexpected byte 0x{other:02x}")),
        }
    }

    /// Consume the second character of a two-character operator.
    fn then(&mut self, kind: TokenKind) -> TokenKind {
        self.rb.advance();
        kind
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_blanks();
        let start = self.rb.pos;
        let kind = match self.rb.peek() {
            None => TokenKind::Eof,
            Some(b'\n') => {
                self.rb.advance();
                TokenKind::Newline
            }
            Some(b'"') => self.lex_string(),
            Some(b'0'..=b'9' | b'.') => self.lex_number(),
            Some(b'\'') => {
                self.rb.advance();
                TokenKind::Rem(self.rest_of_line())
            }
            Some(b'?') => {
                self.rb.advance();
                TokenKind::Keyword(Keyword::Print)
            }
            Some(b) if b.is_ascii_alphabetic() => self.lex_word(),
            Some(_) => self.lex_punct(),
        };
        Token::new(kind, Span::new(start, self.rb.pos))
    }
}

fn data_item(raw: &[u8], quoted: bool) -> DataItem {
    let text = String::from_utf8_lossy(raw);
    DataItem {
        text: if quoted {
            text.into_owned()
        } else {
            text.trim().to_string()
        },
        quoted,
    }
}

impl<R: Read> Iterator for Lexer<R> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.emitted_eof {
            return None;
        }
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            self.emitted_eof = true;
        }
        Some(token)
    }
}
