//! Whole-program facts gathered before lowering: the DATA table, user
//! functions, array shapes and the variables that need initialising.
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use parser::ast::{DataItem, Expr, PrintItem, Program, Stmt, Variable, is_string_name};

use crate::error::{CompileError, Result};
use crate::unit::Ty;

/// A `DEF FN` definition.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FnDef<'a> {
    pub params: &'a [String],
    pub body: &'a Expr,
    pub line: Option<u32>,
}

impl FnDef<'_> {
    /// JVM descriptor of the method compiled for function `name`.
    pub fn descriptor(&self, name: &str) -> String {
        let params: String = self
            .params
            .iter()
            .map(|p| Ty::of_name(p).descriptor())
            .collect();
        format!("({params}){}", Ty::of_name(name).descriptor())
    }
}

#[derive(Debug, Default)]
pub(crate) struct ProgramInfo<'a> {
    /// Every DATA item in program order.
    pub data: Vec<&'a DataItem>,
    /// Index of the first DATA item at or after each line.
    data_starts: BTreeMap<u32, usize>,
    pub functions: BTreeMap<String, FnDef<'a>>,
    /// Array name to dimension count.
    pub arrays: BTreeMap<String, usize>,
    pub string_scalars: BTreeSet<String>,
    /// FOR statements, each owning two hidden locals.
    pub for_loops: usize,
    pub reads_data: bool,
}

impl<'a> ProgramInfo<'a> {
    pub fn scan(program: &'a Program) -> Result<Self> {
        let mut info = Self::default();
        let mut line = None;
        for stmt in &program.statements {
            if let Stmt::LineNumber(n) = stmt {
                line = Some(*n);
                info.data_starts.insert(*n, info.data.len());
                continue;
            }
            info.stmt(stmt, line).map_err(|e| e.in_line(line))?;
        }
        log::debug!(
            "scanned program: {} DATA items, {} functions, {} arrays, {} FOR loops",
            info.data.len(),
            info.functions.len(),
            info.arrays.len(),
            info.for_loops
        );
        Ok(info)
    }

    /// DATA index RESTORE to `line` resets the cursor to.
    pub fn restore_index(&self, line: u32) -> Result<usize> {
        self.data_starts
            .get(&line)
            .copied()
            .ok_or_else(|| CompileError::new(format!("Undefined line number {line}")))
    }

    fn stmt(&mut self, stmt: &'a Stmt, line: Option<u32>) -> Result<()> {
        match stmt {
            Stmt::LineNumber(_)
            | Stmt::End
            | Stmt::Gosub(_)
            | Stmt::Goto(_)
            | Stmt::Rem(_)
            | Stmt::Restore(_)
            | Stmt::Return
            | Stmt::Stop
            | Stmt::Wend => {}
            Stmt::Data(items) => self.data.extend(items),
            Stmt::DefFn { name, params, body } => {
                self.expr(body, params)?;
                let def = FnDef { params, body, line };
                if self.functions.insert(name.clone(), def).is_some() {
                    return Err(CompileError::new(format!("Duplicate definition of {name}")));
                }
            }
            Stmt::Dim(vars) | Stmt::Input { vars, .. } => {
                for var in vars {
                    self.var(var, &[])?;
                }
            }
            Stmt::Read(vars) => {
                self.reads_data = true;
                for var in vars {
                    self.var(var, &[])?;
                }
            }
            Stmt::For {
                var,
                start,
                end,
                step,
            } => {
                self.for_loops += 1;
                self.scalar(var);
                self.expr(start, &[])?;
                self.expr(end, &[])?;
                if let Some(step) = step {
                    self.expr(step, &[])?;
                }
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.expr(condition, &[])?;
                for stmt in then_branch.iter().chain(else_branch) {
                    self.stmt(stmt, line)?;
                }
            }
            Stmt::Let { var, value, .. } => {
                self.var(var, &[])?;
                self.expr(value, &[])?;
            }
            Stmt::Next(vars) => vars.iter().for_each(|v| self.scalar(v)),
            Stmt::OnGoto { selector, .. } | Stmt::OnGosub { selector, .. } => {
                self.expr(selector, &[])?;
            }
            Stmt::Print(items) => {
                for item in items {
                    if let PrintItem::Expr(expr) = item {
                        self.expr(expr, &[])?;
                    }
                }
            }
            Stmt::Swap(a, b) => {
                self.var(a, &[])?;
                self.var(b, &[])?;
            }
            Stmt::While(condition) => self.expr(condition, &[])?,
        }
        Ok(())
    }

    fn scalar(&mut self, name: &str) {
        if is_string_name(name) {
            self.string_scalars.insert(name.to_string());
        }
    }

    /// Record a variable reference; `params` shadow globals inside DEF FN.
    fn var(&mut self, var: &'a Variable, params: &[String]) -> Result<()> {
        if !var.is_array() {
            if !params.contains(&var.name) {
                self.scalar(&var.name);
            }
            return Ok(());
        }
        let dims = var.subscripts.len();
        match self.arrays.entry(var.name.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(dims);
            }
            Entry::Occupied(known) if *known.get() != dims => {
                return Err(CompileError::new(format!(
                    "Wrong number of dimensions for {}",
                    var.name
                )));
            }
            Entry::Occupied(_) => {}
        }
        for subscript in &var.subscripts {
            self.expr(subscript, params)?;
        }
        Ok(())
    }

    fn expr(&mut self, expr: &'a Expr, params: &[String]) -> Result<()> {
        match expr {
            Expr::Number { .. } | Expr::Text(_) => Ok(()),
            Expr::Var(var) => self.var(var, params),
            Expr::Unary { operand, .. } | Expr::Paren(operand) => self.expr(operand, params),
            Expr::Binary { lhs, rhs, .. } => {
                self.expr(lhs, params)?;
                self.expr(rhs, params)
            }
            Expr::Call { args, .. } | Expr::FnCall { args, .. } => {
                args.iter().try_for_each(|arg| self.expr(arg, params))
            }
        }
    }
}
