use std::iter::Peekable;

use log::trace;

use crate::ast::{
    BinaryOp, Expr, Function, InputSeparator, NEG_PRECEDENCE, NOT_PRECEDENCE, PrintItem, Program,
    Stmt, UnaryOp, Variable,
};
use crate::span::{Pos, Span};
use crate::token::{Keyword, Token, TokenKind};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} at {span}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

/// Recursive-descent parser over a token stream.
pub struct Parser<I: Iterator<Item = Token>> {
    tokens: Peekable<I>,
    last_span: Span,
    /// BASIC line being parsed, for error messages.
    line: Option<u32>,
}

fn binary_op(kind: &TokenKind) -> Option<BinaryOp> {
    Some(match kind {
        TokenKind::Caret => BinaryOp::Pow,
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Backslash => BinaryOp::IntDiv,
        TokenKind::Keyword(Keyword::Mod) => BinaryOp::Mod,
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Eq => BinaryOp::Eq,
        TokenKind::Ne => BinaryOp::Ne,
        TokenKind::Lt => BinaryOp::Lt,
        TokenKind::Le => BinaryOp::Le,
        TokenKind::Gt => BinaryOp::Gt,
        TokenKind::Ge => BinaryOp::Ge,
        TokenKind::Keyword(Keyword::And) => BinaryOp::And,
        TokenKind::Keyword(Keyword::Or) => BinaryOp::Or,
        TokenKind::Keyword(Keyword::Xor) => BinaryOp::Xor,
        _ => return None,
    })
}

impl<I: Iterator<Item = Token>> Parser<I> {
    pub fn new(tokens: I) -> Self {
        Self {
            tokens: tokens.peekable(),
            last_span: Span::point(Pos::origin()),
            line: None,
        }
    }

    fn peek_kind(&mut self) -> &TokenKind {
        match self.tokens.peek() {
            Some(tok) => &tok.kind,
            None => &TokenKind::Eof,
        }
    }

    fn peek_span(&mut self) -> Span {
        match self.tokens.peek() {
            Some(tok) => tok.span,
            None => self.last_span,
        }
    }

    fn advance(&mut self) -> Token {
        match self.tokens.next() {
            Some(tok) => {
                self.last_span = tok.span;
                tok
            }
            None => Token::new(TokenKind::Eof, self.last_span),
        }
    }

    fn error(&self, message: impl Into<String>, span: Span) -> ParseError {
        let message = message.into();
        match self.line {
            Some(line) => ParseError::new(format!("{message} in line {line}"), span),
            None => ParseError::new(message, span),
        }
    }

    /// "expected X, found Y" for the next token, without consuming it.
    fn unexpected(&mut self, expected: &str) -> ParseError {
        let span = self.peek_span();
        let message = match self.peek_kind() {
            TokenKind::Error(msg) => msg.clone(),
            found => format!("expected {expected}, found {}", found.name()),
        };
        self.error(message, span)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        self.eat(&TokenKind::Keyword(keyword))
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<(), ParseError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected(&kind.name()))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<(), ParseError> {
        self.expect(&TokenKind::Keyword(keyword))
    }

    /// Whether the next token ends the current statement.
    fn at_statement_end(&mut self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Colon
                | TokenKind::Newline
                | TokenKind::Eof
                | TokenKind::Rem(_)
                | TokenKind::Keyword(Keyword::Else)
        )
    }

    // ── program structure ──────────────────────────────────────────

    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut statements = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::Eof => break,
                TokenKind::Newline => {
                    self.advance();
                    continue;
                }
                _ => {}
            }
            let line = self.parse_line_ref()?;
            if let Some(prev) = self.line.filter(|&prev| line <= prev) {
                let span = self.last_span;
                return Err(self.error(
                    format!("line number {line} does not follow {prev}"),
                    span,
                ));
            }
            self.line = Some(line);
            statements.push(Stmt::LineNumber(line));
            self.parse_statement_list(&mut statements, false)?;
            if !self.eat(&TokenKind::Newline) && !self.eat(&TokenKind::Eof) {
                return Err(self.unexpected("end of line"));
            }
        }
        trace!("parsed {} statements", statements.len());
        Ok(Program { statements })
    }

    fn parse_line_ref(&mut self) -> Result<u32, ParseError> {
        let span = self.peek_span();
        match self.peek_kind().clone() {
            TokenKind::Number(text) => {
                self.advance();
                text.parse::<u32>()
                    .map_err(|_| self.error(format!("invalid line number {text}"), span))
            }
            _ => Err(self.unexpected("line number")),
        }
    }

    /// Statements separated by `:` up to the end of the line, or up to
    /// `ELSE` inside an `IF` branch.
    fn parse_statement_list(&mut self, out: &mut Vec<Stmt>, in_if: bool) -> Result<(), ParseError> {
        loop {
            match self.peek_kind() {
                TokenKind::Newline | TokenKind::Eof => return Ok(()),
                TokenKind::Keyword(Keyword::Else) if in_if => return Ok(()),
                TokenKind::Colon => {
                    self.advance();
                    continue;
                }
                _ => {}
            }
            out.push(self.parse_statement()?);
            match self.peek_kind() {
                TokenKind::Colon => {
                    self.advance();
                }
                TokenKind::Rem(_) | TokenKind::Newline | TokenKind::Eof => {}
                TokenKind::Keyword(Keyword::Else) if in_if => {}
                _ => return Err(self.unexpected("`:` or end of line")),
            }
        }
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        let tok = self.advance();
        let stmt = match tok.kind {
            TokenKind::Ident(name) => self.parse_assignment(name, true)?,
            TokenKind::Keyword(Keyword::Let) => {
                let name = self.parse_name()?;
                self.parse_assignment(name, false)?
            }
            TokenKind::Keyword(Keyword::Print) => Stmt::Print(self.parse_print_items()?),
            TokenKind::Keyword(Keyword::Input) => self.parse_input()?,
            TokenKind::Keyword(Keyword::Dim) => {
                let vars = self.parse_variable_list()?;
                if let Some(scalar) = vars.iter().find(|v| !v.is_array()) {
                    return Err(self.error(format!("DIM of scalar {}", scalar.name), tok.span));
                }
                Stmt::Dim(vars)
            }
            TokenKind::Keyword(Keyword::For) => self.parse_for()?,
            TokenKind::Keyword(Keyword::Next) => {
                let mut vars = Vec::new();
                if !self.at_statement_end() {
                    vars.push(self.parse_name()?);
                    while self.eat(&TokenKind::Comma) {
                        vars.push(self.parse_name()?);
                    }
                }
                Stmt::Next(vars)
            }
            TokenKind::Keyword(Keyword::Goto) => Stmt::Goto(self.parse_line_ref()?),
            TokenKind::Keyword(Keyword::Gosub) => Stmt::Gosub(self.parse_line_ref()?),
            TokenKind::Keyword(Keyword::Return) => Stmt::Return,
            TokenKind::Keyword(Keyword::On) => self.parse_on()?,
            TokenKind::Keyword(Keyword::If) => self.parse_if()?,
            TokenKind::Keyword(Keyword::While) => Stmt::While(self.parse_expression()?),
            TokenKind::Keyword(Keyword::Wend) => Stmt::Wend,
            TokenKind::Data(items) => Stmt::Data(items),
            TokenKind::Keyword(Keyword::Read) => Stmt::Read(self.parse_variable_list()?),
            TokenKind::Keyword(Keyword::Restore) => {
                if matches!(self.peek_kind(), TokenKind::Number(_)) {
                    Stmt::Restore(Some(self.parse_line_ref()?))
                } else {
                    Stmt::Restore(None)
                }
            }
            TokenKind::Keyword(Keyword::Def) => self.parse_def_fn()?,
            TokenKind::Keyword(Keyword::Swap) => {
                let first = self.parse_variable()?;
                self.expect(&TokenKind::Comma)?;
                let second = self.parse_variable()?;
                Stmt::Swap(first, second)
            }
            TokenKind::Keyword(Keyword::End) => Stmt::End,
            TokenKind::Keyword(Keyword::Stop) => Stmt::Stop,
            TokenKind::Rem(text) => Stmt::Rem(text),
            TokenKind::Error(msg) => return Err(self.error(msg, tok.span)),
            other => {
                return Err(self.error(
                    format!("expected statement, found {}", other.name()),
                    tok.span,
                ));
            }
        };
        Ok(stmt)
    }

    // ── statements ─────────────────────────────────────────────────

    fn parse_name(&mut self) -> Result<String, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("variable")),
        }
    }

    fn parse_subscripts(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut subscripts = Vec::new();
        if self.eat(&TokenKind::LParen) {
            subscripts.push(self.parse_expression()?);
            while self.eat(&TokenKind::Comma) {
                subscripts.push(self.parse_expression()?);
            }
            self.expect(&TokenKind::RParen)?;
        }
        Ok(subscripts)
    }

    fn parse_variable(&mut self) -> Result<Variable, ParseError> {
        let name = self.parse_name()?;
        let subscripts = self.parse_subscripts()?;
        Ok(Variable { name, subscripts })
    }

    fn parse_variable_list(&mut self) -> Result<Vec<Variable>, ParseError> {
        let mut vars = vec![self.parse_variable()?];
        while self.eat(&TokenKind::Comma) {
            vars.push(self.parse_variable()?);
        }
        Ok(vars)
    }

    fn parse_assignment(&mut self, name: String, implicit: bool) -> Result<Stmt, ParseError> {
        let subscripts = self.parse_subscripts()?;
        self.expect(&TokenKind::Eq)?;
        let value = self.parse_expression()?;
        Ok(Stmt::Let {
            var: Variable { name, subscripts },
            value,
            implicit,
        })
    }

    fn parse_print_items(&mut self) -> Result<Vec<PrintItem>, ParseError> {
        let mut items = Vec::new();
        while !self.at_statement_end() {
            if self.eat(&TokenKind::Semicolon) {
                items.push(PrintItem::Semicolon);
            } else if self.eat(&TokenKind::Comma) {
                items.push(PrintItem::Comma);
            } else {
                items.push(PrintItem::Expr(self.parse_expression()?));
            }
        }
        Ok(items)
    }

    fn parse_input(&mut self) -> Result<Stmt, ParseError> {
        let mut prompt = None;
        let mut separator = InputSeparator::Semicolon;
        if let TokenKind::Text(text) = self.peek_kind().clone() {
            self.advance();
            prompt = Some(text);
            separator = if self.eat(&TokenKind::Semicolon) {
                InputSeparator::Semicolon
            } else if self.eat(&TokenKind::Comma) {
                InputSeparator::Comma
            } else {
                return Err(self.unexpected("`;` or `,`"));
            };
        }
        let vars = self.parse_variable_list()?;
        Ok(Stmt::Input {
            prompt,
            separator,
            vars,
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        let var = self.parse_name()?;
        self.expect(&TokenKind::Eq)?;
        let start = self.parse_expression()?;
        self.expect_keyword(Keyword::To)?;
        let end = self.parse_expression()?;
        let step = if self.eat_keyword(Keyword::Step) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(Stmt::For {
            var,
            start,
            end,
            step,
        })
    }

    fn parse_on(&mut self) -> Result<Stmt, ParseError> {
        let selector = self.parse_expression()?;
        let gosub = if self.eat_keyword(Keyword::Gosub) {
            true
        } else {
            self.expect_keyword(Keyword::Goto)?;
            false
        };
        let mut targets = vec![self.parse_line_ref()?];
        while self.eat(&TokenKind::Comma) {
            targets.push(self.parse_line_ref()?);
        }
        Ok(if gosub {
            Stmt::OnGosub { selector, targets }
        } else {
            Stmt::OnGoto { selector, targets }
        })
    }

    /// A `THEN`/`ELSE` branch: a bare line number or a statement list.
    fn parse_branch(&mut self) -> Result<Vec<Stmt>, ParseError> {
        if matches!(self.peek_kind(), TokenKind::Number(_)) {
            return Ok(vec![Stmt::Goto(self.parse_line_ref()?)]);
        }
        let mut stmts = Vec::new();
        self.parse_statement_list(&mut stmts, true)?;
        if stmts.is_empty() {
            return Err(self.unexpected("statement"));
        }
        Ok(stmts)
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let condition = self.parse_expression()?;
        let then_branch = if self.eat_keyword(Keyword::Then) {
            self.parse_branch()?
        } else {
            self.expect_keyword(Keyword::Goto)?;
            vec![Stmt::Goto(self.parse_line_ref()?)]
        };
        let else_branch = if self.eat_keyword(Keyword::Else) {
            self.parse_branch()?
        } else {
            Vec::new()
        };
        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_def_fn(&mut self) -> Result<Stmt, ParseError> {
        let name = match self.peek_kind().clone() {
            TokenKind::FnName(name) => {
                self.advance();
                name
            }
            _ => return Err(self.unexpected("function name")),
        };
        let mut params = Vec::new();
        if self.eat(&TokenKind::LParen) {
            params.push(self.parse_name()?);
            while self.eat(&TokenKind::Comma) {
                params.push(self.parse_name()?);
            }
            self.expect(&TokenKind::RParen)?;
        }
        self.expect(&TokenKind::Eq)?;
        let body = self.parse_expression()?;
        Ok(Stmt::DefFn { name, params, body })
    }

    // ── expressions ────────────────────────────────────────────────

    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary(0)
    }

    /// Precedence climbing over left-associative binary operators that
    /// bind tighter than `min_precedence`.
    fn parse_binary(&mut self, min_precedence: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        while let Some(op) = binary_op(self.peek_kind()) {
            let precedence = op.precedence();
            if precedence <= min_precedence {
                break;
            }
            self.advance();
            let rhs = self.parse_binary(precedence)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek_kind() {
            TokenKind::Keyword(Keyword::Not) => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => {
                self.advance();
                return self.parse_binary(NEG_PRECEDENCE);
            }
            _ => return self.parse_primary(),
        };
        self.advance();
        let precedence = match op {
            UnaryOp::Not => NOT_PRECEDENCE,
            UnaryOp::Neg => NEG_PRECEDENCE,
        };
        let operand = self.parse_binary(precedence)?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.eat(&TokenKind::LParen) {
            args.push(self.parse_expression()?);
            while self.eat(&TokenKind::Comma) {
                args.push(self.parse_expression()?);
            }
            self.expect(&TokenKind::RParen)?;
        }
        Ok(args)
    }

    fn parse_call(&mut self, function: Function, span: Span) -> Result<Expr, ParseError> {
        let mut args = self.parse_arguments()?;
        if !function.arity().contains(&args.len()) {
            return Err(self.error(
                format!(
                    "wrong number of arguments to {}: {}",
                    function.name(),
                    args.len()
                ),
                span,
            ));
        }
        if args.len() < function.full_arity() {
            match function {
                Function::Instr => args.insert(0, Expr::number(1.0)),
                Function::Mid => args.push(Expr::number(255.0)),
                Function::Rnd => args.push(Expr::number(1.0)),
                _ => {}
            }
        }
        Ok(Expr::Call { function, args })
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let span = self.peek_span();
        let expr = match self.peek_kind().clone() {
            TokenKind::Number(text) => {
                self.advance();
                let value = text
                    .replace('D', "E")
                    .parse::<f32>()
                    .map_err(|_| self.error(format!("invalid number {text}"), span))?;
                Expr::Number { value, text }
            }
            TokenKind::Text(text) => {
                self.advance();
                Expr::Text(text)
            }
            TokenKind::Ident(name) => {
                self.advance();
                let subscripts = self.parse_subscripts()?;
                Expr::Var(Variable { name, subscripts })
            }
            TokenKind::FnName(name) => {
                self.advance();
                let args = self.parse_arguments()?;
                Expr::FnCall { name, args }
            }
            TokenKind::Function(function) => {
                self.advance();
                self.parse_call(function, span)?
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                Expr::Paren(Box::new(inner))
            }
            _ => return Err(self.unexpected("expression")),
        };
        Ok(expr)
    }
}
