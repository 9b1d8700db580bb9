//! Pretty-printer that renumbers a program.
//!
//! Lines are renumbered from [`FIRST_LINE`] in steps of [`LINE_STEP`] and
//! every line reference follows. References to lines that do not exist
//! are printed unchanged.
use std::collections::HashMap;

use crate::ast::{DataItem, Expr, Function, PrintItem, Program, Stmt, UnaryOp, Variable};

pub const FIRST_LINE: u32 = 1000;
pub const LINE_STEP: u32 = 10;

pub fn format_program(program: &Program) -> String {
    let renumber = program
        .line_numbers()
        .zip((0..).map(|i| FIRST_LINE + i * LINE_STEP))
        .collect();
    Formatter { renumber }.program(&program.statements)
}

struct Formatter {
    renumber: HashMap<u32, u32>,
}

fn csv<T>(items: &[T], mut show: impl FnMut(&T) -> String) -> String {
    items.iter().map(&mut show).collect::<Vec<_>>().join(",")
}

impl Formatter {
    fn target(&self, line: u32) -> String {
        self.renumber.get(&line).copied().unwrap_or(line).to_string()
    }

    fn program(&self, stmts: &[Stmt]) -> String {
        let mut out = String::new();
        let mut first_on_line = true;
        for stmt in stmts {
            if let Stmt::LineNumber(line) = stmt {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(&self.target(*line));
                out.push(' ');
                first_on_line = true;
                continue;
            }
            if !first_on_line {
                out.push_str(" : ");
            }
            first_on_line = false;
            out.push_str(&self.stmt(stmt));
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }

    fn list(&self, stmts: &[Stmt]) -> String {
        stmts
            .iter()
            .map(|s| self.stmt(s))
            .collect::<Vec<_>>()
            .join(" : ")
    }

    /// `THEN`/`ELSE` branch: a lone `GOTO` prints as its line number.
    fn branch(&self, stmts: &[Stmt]) -> String {
        match stmts {
            [Stmt::Goto(line)] => self.target(*line),
            _ => self.list(stmts),
        }
    }

    fn stmt(&self, stmt: &Stmt) -> String {
        match stmt {
            Stmt::LineNumber(line) => self.target(*line),
            Stmt::Data(items) => format!("DATA {}", csv(items, data_item)),
            Stmt::DefFn { name, params, body } if params.is_empty() => {
                format!("DEF {name}={}", self.expr(body))
            }
            Stmt::DefFn { name, params, body } => {
                format!("DEF {name}({})={}", params.join(","), self.expr(body))
            }
            Stmt::Dim(vars) => format!("DIM {}", csv(vars, |v| self.var(v))),
            Stmt::End => "END".into(),
            Stmt::For {
                var,
                start,
                end,
                step,
            } => {
                let mut out = format!("FOR {var}={} TO {}", self.expr(start), self.expr(end));
                if let Some(step) = step.as_ref().filter(|s| !s.is_literal(1.0)) {
                    out.push_str(" STEP ");
                    out.push_str(&self.expr(step));
                }
                out
            }
            Stmt::Gosub(line) => format!("GOSUB {}", self.target(*line)),
            Stmt::Goto(line) => format!("GOTO {}", self.target(*line)),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let mut out = format!(
                    "IF {} THEN {}",
                    self.expr(condition),
                    self.branch(then_branch)
                );
                if !else_branch.is_empty() {
                    out.push_str(" ELSE ");
                    out.push_str(&self.branch(else_branch));
                }
                out
            }
            Stmt::Input {
                prompt,
                separator,
                vars,
            } => {
                let prompt = match prompt {
                    Some(text) => format!("\"{text}\"{}", separator.as_str()),
                    None => String::new(),
                };
                format!("INPUT {prompt}{}", csv(vars, |v| self.var(v)))
            }
            Stmt::Let {
                var,
                value,
                implicit,
            } => {
                let keyword = if *implicit { "" } else { "LET " };
                format!("{keyword}{}={}", self.var(var), self.expr(value))
            }
            Stmt::Next(vars) if vars.is_empty() => "NEXT".into(),
            Stmt::Next(vars) => format!("NEXT {}", vars.join(",")),
            Stmt::OnGoto { selector, targets } => format!(
                "ON {} GOTO {}",
                self.expr(selector),
                csv(targets, |t| self.target(*t))
            ),
            Stmt::OnGosub { selector, targets } => format!(
                "ON {} GOSUB {}",
                self.expr(selector),
                csv(targets, |t| self.target(*t))
            ),
            Stmt::Print(items) => self.print(items),
            Stmt::Read(vars) => format!("READ {}", csv(vars, |v| self.var(v))),
            Stmt::Rem(text) => format!("REM{text}"),
            Stmt::Restore(None) => "RESTORE".into(),
            Stmt::Restore(Some(line)) => format!("RESTORE {}", self.target(*line)),
            Stmt::Return => "RETURN".into(),
            Stmt::Stop => "STOP".into(),
            Stmt::Swap(a, b) => format!("SWAP {},{}", self.var(a), self.var(b)),
            Stmt::Wend => "WEND".into(),
            Stmt::While(condition) => format!("WHILE {}", self.expr(condition)),
        }
    }

    fn print(&self, items: &[PrintItem]) -> String {
        let mut out = String::from("PRINT");
        if !items.is_empty() {
            out.push(' ');
        }
        let mut prev_expr = false;
        for item in items {
            match item {
                PrintItem::Expr(expr) => {
                    if prev_expr {
                        out.push(' ');
                    }
                    out.push_str(&self.expr(expr));
                    prev_expr = true;
                }
                PrintItem::Semicolon => {
                    out.push(';');
                    prev_expr = false;
                }
                PrintItem::Comma => {
                    out.push(',');
                    prev_expr = false;
                }
            }
        }
        out
    }

    fn var(&self, var: &Variable) -> String {
        if var.subscripts.is_empty() {
            var.name.clone()
        } else {
            format!("{}({})", var.name, csv(&var.subscripts, |e| self.expr(e)))
        }
    }

    fn expr(&self, expr: &Expr) -> String {
        match expr {
            Expr::Number { text, .. } if text.starts_with('.') => format!("0{text}"),
            Expr::Number { text, .. } => text.clone(),
            Expr::Text(text) => format!("\"{text}\""),
            Expr::Var(var) => self.var(var),
            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => format!("-{}", self.expr(operand)),
            Expr::Unary {
                op: UnaryOp::Not,
                operand,
            } => format!("NOT {}", self.expr(operand)),
            Expr::Paren(inner) => format!("({})", self.expr(inner)),
            Expr::Binary { op, lhs, rhs } => {
                let pad = if op.is_keyword() { " " } else { "" };
                format!(
                    "{}{pad}{}{pad}{}",
                    self.expr(lhs),
                    op.symbol(),
                    self.expr(rhs)
                )
            }
            Expr::Call { function, args } => {
                let shown = match (function, args.as_slice()) {
                    (Function::Instr, [start, rest @ ..]) if start.is_literal(1.0) => rest,
                    (Function::Mid, [head @ .., len]) if len.is_literal(255.0) => head,
                    (_, all) => all,
                };
                format!("{}({})", function.name(), csv(shown, |e| self.expr(e)))
            }
            Expr::FnCall { name, args } if args.is_empty() => name.clone(),
            Expr::FnCall { name, args } => {
                format!("{name}({})", csv(args, |e| self.expr(e)))
            }
        }
    }
}

fn data_item(item: &DataItem) -> String {
    if item.quoted {
        format!("\"{}\"", item.text)
    } else {
        item.text.clone()
    }
}
