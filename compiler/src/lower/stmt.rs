use classfile::{Op, SlotKind};
use parser::ast::{InputSeparator, PrintItem, Variable};

use super::Lower;
use super::count;
use super::expr::type_mismatch;
use crate::error::Result;
use crate::library::Builtin;
use crate::unit::{RuntimeField, Ty};

impl Lower<'_, '_, '_> {
    pub(super) fn print(&mut self, items: &[PrintItem]) -> Result<()> {
        for item in items {
            match item {
                PrintItem::Expr(expr) => {
                    let builtin = match self.expr(expr)? {
                        Ty::Num => Builtin::PrintFloat,
                        Ty::Str => Builtin::PrintChars,
                    };
                    self.em.call(builtin)?;
                }
                PrintItem::Semicolon => {}
                PrintItem::Comma => self.em.call(Builtin::PrintComma)?,
            }
        }
        if !matches!(
            items.last(),
            Some(PrintItem::Semicolon | PrintItem::Comma)
        ) {
            self.em.call(Builtin::PrintNewline)?;
        }
        Ok(())
    }

    pub(super) fn input(
        &mut self,
        prompt: Option<&str>,
        separator: InputSeparator,
        vars: &[Variable],
    ) -> Result<()> {
        if let Some(prompt) = prompt {
            self.em.print_text(prompt)?;
        }
        if prompt.is_none() || separator == InputSeparator::Semicolon {
            self.em.print_text("? ")?;
        }

        let fields = self.scratch;
        self.em.push_int(count(vars.len())?)?;
        self.em.call(Builtin::InputFields)?;
        self.em.store(SlotKind::Reference, fields);
        for (k, var) in (0i32..).zip(vars) {
            self.store(var, |l| {
                l.em.load(SlotKind::Reference, fields);
                l.em.push_int(k)?;
                l.em.op(Op::Aaload);
                l.parse_if_numeric(var)
            })?;
        }
        Ok(())
    }

    pub(super) fn read(&mut self, vars: &[Variable]) -> Result<()> {
        for var in vars {
            self.store(var, |l| {
                l.em.call(Builtin::ReadData)?;
                l.parse_if_numeric(var)
            })?;
        }
        Ok(())
    }

    /// Convert the pushed chars with `VAL` when `var` is numeric.
    fn parse_if_numeric(&mut self, var: &Variable) -> Result<Ty> {
        let ty = Ty::of_name(&var.name);
        if ty == Ty::Num {
            self.em.call(Builtin::Val)?;
        }
        Ok(ty)
    }

    pub(super) fn restore(&mut self, line: Option<u32>) -> Result<()> {
        let index = match line {
            Some(line) => self.info.restore_index(line)?,
            None => 0,
        };
        self.em.push_int(count(index)?)?;
        self.em.put(RuntimeField::DataCursor)
    }

    pub(super) fn dim(&mut self, vars: &[Variable]) -> Result<()> {
        for var in vars.iter().filter(|v| v.is_array()) {
            let subscripts = &var.subscripts;
            self.allocate_array(&var.name, subscripts.len(), |l, k| {
                l.num(&subscripts[k])?;
                l.em.round()?;
                l.em.op(Op::Iconst1);
                l.em.op(Op::Iadd);
                Ok(())
            })?;
        }
        Ok(())
    }

    pub(super) fn swap(&mut self, a: &Variable, b: &Variable) -> Result<()> {
        let ty = Ty::of_name(&a.name);
        if Ty::of_name(&b.name) != ty {
            return Err(type_mismatch());
        }
        let held = self.scratch;
        self.load(a)?;
        self.em.store(ty.slot(), held);
        self.store(a, |l| l.load(b))?;
        self.store(b, |l| {
            l.em.load(ty.slot(), held);
            Ok(ty)
        })
    }

    pub(super) fn stop(&mut self) -> Result<()> {
        self.em.call(Builtin::FreshLine)?;
        let text = match self.line {
            Some(line) => format!("Break in {line}"),
            None => "Break".to_string(),
        };
        self.em.print_text(&text)?;
        self.em.call(Builtin::PrintNewline)?;
        self.em.goto(self.exit);
        Ok(())
    }
}
