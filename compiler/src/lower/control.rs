use classfile::{Label, Op, SlotKind};
use parser::ast::{Expr, Stmt, is_string_name};

use super::expr::type_mismatch;
use super::{ForFrame, Lower, WhileFrame, count};
use crate::error::{CompileError, Result};
use crate::library::Builtin;

impl Lower<'_, '_, '_> {
    /// Allocate the next return-site label and push its id for RETURN.
    fn push_return_site(&mut self) -> Result<Label> {
        let site = self.em.create_label();
        let id = count(self.return_sites.len())?;
        self.return_sites.push(site);
        self.em.push_int(id)?;
        self.em.call(Builtin::GosubPush)?;
        Ok(site)
    }

    pub(super) fn gosub(&mut self, target: u32) -> Result<()> {
        let site = self.push_return_site()?;
        let label = self.line_label(target);
        self.em.goto(label);
        self.em.bind(site)?;
        Ok(())
    }

    fn selector(&mut self, selector: &Expr, targets: &[u32]) -> Result<Vec<Label>> {
        self.num(selector)?;
        self.em.round()?;
        Ok(targets.iter().map(|&t| self.line_label(t)).collect())
    }

    /// `tableswitch` from 1 over the targets; anything else falls through.
    pub(super) fn on_goto(&mut self, selector: &Expr, targets: &[u32]) -> Result<()> {
        let labels = self.selector(selector, targets)?;
        let next = self.em.create_label();
        self.em.tableswitch(1, &labels, next);
        self.em.bind(next)?;
        Ok(())
    }

    /// Like ON GOTO, but a return site is pushed only for a selector in
    /// `1..=targets.len()`.
    pub(super) fn on_gosub(&mut self, selector: &Expr, targets: &[u32]) -> Result<()> {
        let labels = self.selector(selector, targets)?;
        let out = self.em.create_label();
        self.em.op(Op::Dup);
        self.em.op(Op::Iconst1);
        self.em.jump(Op::IfIcmplt, out);
        self.em.op(Op::Dup);
        self.em.push_int(count(labels.len())?)?;
        self.em.jump(Op::IfIcmpgt, out);

        let site = self.push_return_site()?;
        self.em.tableswitch(1, &labels, site);
        self.em.bind(out)?;
        self.em.op(Op::Pop);
        self.em.bind(site)?;
        Ok(())
    }

    pub(super) fn if_then(
        &mut self,
        condition: &Expr,
        then_branch: &[Stmt],
        else_branch: &[Stmt],
    ) -> Result<()> {
        self.num(condition)?;
        self.em.op(Op::Fconst0);
        self.em.op(Op::Fcmpl);
        self.branch_depth += 1;
        let lowered = self.branches(then_branch, else_branch);
        self.branch_depth -= 1;
        lowered
    }

    fn branches(&mut self, then_branch: &[Stmt], else_branch: &[Stmt]) -> Result<()> {
        // `IF c THEN 100` jumps straight to the line.
        if let [Stmt::Goto(target)] = then_branch {
            let label = self.line_label(*target);
            self.em.jump(Op::Ifne, label);
            return self.block(else_branch);
        }

        let end = self.em.create_label();
        if else_branch.is_empty() {
            self.em.jump(Op::Ifeq, end);
            self.block(then_branch)?;
        } else {
            let otherwise = self.em.create_label();
            self.em.jump(Op::Ifeq, otherwise);
            self.block(then_branch)?;
            if self.em.is_reachable() {
                self.em.goto(end);
            }
            self.em.bind(otherwise)?;
            self.block(else_branch)?;
        }
        self.em.bind(end)?;
        Ok(())
    }

    fn block(&mut self, stmts: &[Stmt]) -> Result<()> {
        stmts.iter().try_for_each(|stmt| self.stmt(stmt))
    }

    pub(super) fn for_loop(
        &mut self,
        var: &str,
        start: &Expr,
        end: &Expr,
        step: Option<&Expr>,
    ) -> Result<()> {
        if is_string_name(var) {
            return Err(type_mismatch());
        }
        let end_slot = self
            .next_for
            .checked_mul(2)
            .and_then(|slot| slot.checked_add(1))
            .filter(|&slot| slot < self.scratch)
            .ok_or_else(|| CompileError::new("Too many FOR loops"))?;
        let step_slot = end_slot + 1;
        self.next_for += 1;

        let field = self.em.unit.scalar(var);
        self.num(start)?;
        self.em.put_static(&field)?;
        self.num(end)?;
        self.em.store(SlotKind::Float, end_slot);
        match step {
            Some(step) => self.num(step)?,
            None => self.em.op(Op::Fconst1),
        }
        self.em.store(SlotKind::Float, step_slot);

        let body = self.em.create_label();
        self.em.bind(body)?;
        self.loops.push(ForFrame {
            var: var.to_string(),
            body,
            end_slot,
            step_slot,
            branch_depth: self.branch_depth,
        });
        Ok(())
    }

    pub(super) fn next(&mut self, vars: &[String]) -> Result<()> {
        if vars.is_empty() {
            let frame = self
                .loops
                .last()
                .cloned()
                .ok_or_else(|| CompileError::new("NEXT without FOR"))?;
            self.step(&frame)?;
            if self.branch_depth <= frame.branch_depth {
                self.loops.pop();
            }
            return Ok(());
        }

        for var in vars {
            let index = self
                .loops
                .iter()
                .rposition(|frame| frame.var == *var)
                .ok_or_else(|| CompileError::new("NEXT without FOR"))?;
            let frame = self.loops[index].clone();
            self.step(&frame)?;
            if self.branch_depth <= frame.branch_depth {
                self.loops.truncate(index);
            }
        }
        Ok(())
    }

    /// `var += step`, then back to the body while `var` has not passed
    /// the end bound in the step's direction.
    fn step(&mut self, frame: &ForFrame) -> Result<()> {
        let field = self.em.unit.scalar(&frame.var);
        self.em.get_static(&field)?;
        self.em.load(SlotKind::Float, frame.step_slot);
        self.em.op(Op::Fadd);
        self.em.put_static(&field)?;

        let descending = self.em.create_label();
        let done = self.em.create_label();
        self.em.load(SlotKind::Float, frame.step_slot);
        self.em.op(Op::Fconst0);
        self.em.op(Op::Fcmpl);
        self.em.jump(Op::Iflt, descending);

        self.em.get_static(&field)?;
        self.em.load(SlotKind::Float, frame.end_slot);
        self.em.op(Op::Fcmpg);
        self.em.jump(Op::Ifle, frame.body);
        self.em.goto(done);

        self.em.bind(descending)?;
        self.em.get_static(&field)?;
        self.em.load(SlotKind::Float, frame.end_slot);
        self.em.op(Op::Fcmpl);
        self.em.jump(Op::Ifge, frame.body);
        self.em.bind(done)?;
        Ok(())
    }

    pub(super) fn while_loop(&mut self, condition: &Expr) -> Result<()> {
        let cond = self.em.create_label();
        let exit = self.em.create_label();
        self.em.bind(cond)?;
        self.num(condition)?;
        self.em.op(Op::Fconst0);
        self.em.op(Op::Fcmpl);
        self.em.jump(Op::Ifeq, exit);
        self.whiles.push(WhileFrame {
            cond,
            exit,
            line: self.line,
        });
        Ok(())
    }

    pub(super) fn wend(&mut self) -> Result<()> {
        let frame = self
            .whiles
            .pop()
            .ok_or_else(|| CompileError::new("WEND without WHILE"))?;
        self.em.goto(frame.cond);
        self.em.bind(frame.exit)?;
        Ok(())
    }
}
