//! Lowering of the statement tree into the `main` method and one method per
//! `DEF FN`.
//!
//! Statements are visited once, in program order. Every BASIC line gets a
//! named label on first reference or definition, so forward `GOTO`s become
//! pending jumps patched when the method is finished.
//!
//! Local slots of `main`:
//!
//! ```text
//!  0           String[] args
//!  1 + 2k      end bound of the k-th FOR statement
//!  2 + 2k      step of the k-th FOR statement
//!  1 + 2n      scratch for INPUT and SWAP
//! ```
mod control;
mod expr;
mod stmt;

use std::collections::HashMap;

use classfile::{
    ACC_PRIVATE, ACC_PUBLIC, ACC_STATIC, ArrayType, Assembler, ConstantPool, Label, MethodBody,
    Op, SlotKind,
};
use log::debug;
use parser::ast::{Program, Stmt};

use crate::emit::Emitter;
use crate::error::{CompileError, Result};
use crate::jvm;
use crate::library::Builtin;
use crate::program::{FnDef, ProgramInfo};
use crate::unit::{RuntimeField, Ty, Unit};

/// Elements per dimension of an array used without `DIM`.
const DEFAULT_DIMENSION: i32 = 11;

/// An open `FOR` loop.
#[derive(Debug, Clone)]
struct ForFrame {
    var: String,
    body: Label,
    end_slot: u16,
    step_slot: u16,
    /// IF nesting the FOR was opened at.
    branch_depth: usize,
}

/// An open `WHILE` loop.
#[derive(Debug, Clone, Copy)]
struct WhileFrame {
    cond: Label,
    exit: Label,
    line: Option<u32>,
}

pub(crate) struct Lower<'p, 'u, 'a> {
    em: Emitter<'p, 'u>,
    info: &'a ProgramInfo<'a>,
    line_numbers: bool,
    /// Parameters of the `DEF FN` being compiled and their slots.
    params: Vec<(String, u16)>,
    lines: HashMap<u32, Label>,
    loops: Vec<ForFrame>,
    whiles: Vec<WhileFrame>,
    /// Return-site labels, indexed by the id GOSUB pushes.
    return_sites: Vec<Label>,
    dispatcher: Option<Label>,
    exit: Label,
    next_for: u16,
    scratch: u16,
    line: Option<u32>,
    /// Nesting of IF branches; a NEXT deeper than its FOR leaves it open.
    branch_depth: usize,
}

impl<'p, 'u, 'a> Lower<'p, 'u, 'a> {
    fn new(
        mut em: Emitter<'p, 'u>,
        info: &'a ProgramInfo<'a>,
        params: Vec<(String, u16)>,
        line_numbers: bool,
    ) -> Result<Self> {
        let exit = em.create_label();
        // Slot 0 and two slots per FOR come before the scratch slot.
        let scratch = info
            .for_loops
            .checked_mul(2)
            .and_then(|slots| u16::try_from(slots).ok())
            .and_then(|slots| slots.checked_add(1))
            .filter(|&scratch| scratch < u16::MAX - 1)
            .ok_or_else(|| CompileError::new("Too many FOR loops"))?;
        Ok(Self {
            em,
            info,
            line_numbers,
            params,
            lines: HashMap::new(),
            loops: Vec::new(),
            whiles: Vec::new(),
            return_sites: Vec::new(),
            dispatcher: None,
            exit,
            next_for: 0,
            scratch,
            line: None,
            branch_depth: 0,
        })
    }

    /// The label of BASIC line `number`.
    fn line_label(&mut self, number: u32) -> Label {
        *self
            .lines
            .entry(number)
            .or_insert_with(|| self.em.create_named_label(format!("line {number}")))
    }

    /// Lower one statement.
    fn stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::LineNumber(number) => self.line_marker(*number),
            Stmt::Data(_) | Stmt::DefFn { .. } | Stmt::Rem(_) => Ok(()),
            Stmt::Dim(vars) => self.dim(vars),
            Stmt::End => {
                self.em.goto(self.exit);
                Ok(())
            }
            Stmt::For {
                var,
                start,
                end,
                step,
            } => self.for_loop(var, start, end, step.as_ref()),
            Stmt::Gosub(target) => self.gosub(*target),
            Stmt::Goto(target) => {
                let label = self.line_label(*target);
                self.em.goto(label);
                Ok(())
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => self.if_then(condition, then_branch, else_branch),
            Stmt::Input {
                prompt,
                separator,
                vars,
            } => self.input(prompt.as_deref(), *separator, vars),
            Stmt::Let { var, value, .. } => self.store(var, |l| l.expr(value)),
            Stmt::Next(vars) => self.next(vars),
            Stmt::OnGoto { selector, targets } => self.on_goto(selector, targets),
            Stmt::OnGosub { selector, targets } => self.on_gosub(selector, targets),
            Stmt::Print(items) => self.print(items),
            Stmt::Read(vars) => self.read(vars),
            Stmt::Restore(line) => self.restore(*line),
            Stmt::Return => {
                let dispatcher = *self
                    .dispatcher
                    .get_or_insert_with(|| self.em.create_named_label("return dispatcher"));
                self.em.goto(dispatcher);
                Ok(())
            }
            Stmt::Stop => self.stop(),
            Stmt::Swap(a, b) => self.swap(a, b),
            Stmt::Wend => self.wend(),
            Stmt::While(condition) => self.while_loop(condition),
        }
    }

    fn line_marker(&mut self, number: u32) -> Result<()> {
        self.line = Some(number);
        let label = self.line_label(number);
        self.em.bind(label)?;
        if self.line_numbers {
            if let Ok(line) = u16::try_from(number) {
                self.em.mark_line(line);
            }
        }
        Ok(())
    }

    /// Zero the hidden FOR slots, empty the string scalars, allocate every
    /// array at its default size and load the DATA table.
    fn prologue(&mut self) -> Result<()> {
        for slot in 1..self.scratch {
            self.em.op(Op::Fconst0);
            self.em.store(SlotKind::Float, slot);
        }

        let info = self.info;
        for name in &info.string_scalars {
            let field = self.em.unit.scalar(name);
            self.em.op(Op::Iconst0);
            self.em.newarray(ArrayType::Char);
            self.em.put_static(&field)?;
        }

        for (name, &dims) in &info.arrays {
            self.allocate_array(name, dims, |l, _| {
                l.em.push_int(DEFAULT_DIMENSION)?;
                Ok(())
            })?;
        }

        if info.reads_data {
            self.em.push_int(count(info.data.len())?)?;
            self.em.new_ref_array("[C")?;
            for (i, item) in info.data.iter().enumerate() {
                self.em.op(Op::Dup);
                self.em.push_int(count(i)?)?;
                self.em.chars(&item.text)?;
                self.em.op(Op::Aastore);
            }
            self.em.put(RuntimeField::DataTable)?;
        }
        Ok(())
    }

    /// Store fresh dimension and element arrays for `name`. `size` pushes
    /// the element count of dimension `k` as an int.
    fn allocate_array(
        &mut self,
        name: &str,
        dims: usize,
        mut size: impl FnMut(&mut Self, usize) -> Result<()>,
    ) -> Result<()> {
        let (data, shape) = self.em.unit.array(name);
        self.em.push_int(count(dims)?)?;
        self.em.newarray(ArrayType::Int);
        for k in 0..dims {
            self.em.op(Op::Dup);
            self.em.push_int(count(k)?)?;
            size(self, k)?;
            self.em.op(Op::Iastore);
        }
        self.em.op(Op::Dup);
        self.em.put_static(&shape)?;
        self.em.call(Builtin::ArraySize)?;
        match Ty::of_name(name) {
            Ty::Num => self.em.newarray(ArrayType::Float),
            Ty::Str => self.em.call(Builtin::NewStringArray)?,
        }
        self.em.put_static(&data)?;
        Ok(())
    }

    /// Fall into `exit`, then emit the RETURN dispatcher and the handler
    /// reporting runtime errors.
    fn epilogue(&mut self, body_start: Label) -> Result<()> {
        let protected = self.dispatcher.is_some()
            || self.em.offset_of(body_start) != Some(self.em.current_offset());
        if protected && self.em.is_reachable() {
            self.em.goto(self.exit);
        }

        if let Some(dispatcher) = self.dispatcher {
            self.em.bind(dispatcher)?;
            self.em.call(Builtin::GosubPop)?;
            if self.return_sites.is_empty() {
                self.em.op(Op::Pop);
                self.em.goto(self.exit);
            } else {
                let sites = self.return_sites.clone();
                self.em.tableswitch(0, &sites, self.exit);
            }
        }

        if protected {
            let body_end = self.em.create_label();
            let handler = self.em.create_label();
            self.em.bind(body_end)?;
            self.em
                .catch(body_start, body_end, handler, Some(jvm::EXCEPTION))?;
            self.em.bind(handler)?;
            self.em.call(Builtin::ReportError)?;
        }

        self.em.bind(self.exit)?;
        self.em.get_static(&jvm::system_out())?;
        self.em.invoke_virtual(&jvm::flush())?;
        self.em.op(Op::Return);
        Ok(())
    }

    /// A `DEF FN` body checked against the function's type, returned.
    fn function_body(&mut self, name: &str, def: &FnDef<'_>) -> Result<()> {
        let ty = Ty::of_name(name);
        self.expect(def.body, ty)?;
        self.em.op(match ty {
            Ty::Num => Op::Freturn,
            Ty::Str => Op::Areturn,
        });
        Ok(())
    }
}

/// An index or length as an `int` operand.
fn count(n: usize) -> Result<i32> {
    i32::try_from(n).map_err(|_| CompileError::new("Out of memory"))
}

/// Compile the program body into `public static void main(String[])`.
pub(crate) fn main_method(
    pool: &mut ConstantPool,
    unit: &mut Unit,
    info: &ProgramInfo<'_>,
    program: &Program,
    line_numbers: bool,
) -> Result<MethodBody> {
    let em = Emitter::new(Assembler::new(pool, 1), unit);
    let mut lower = Lower::new(em, info, Vec::new(), line_numbers)?;
    lower.prologue()?;

    let body_start = lower.em.create_label();
    lower.em.bind(body_start)?;
    for stmt in &program.statements {
        lower.stmt(stmt).map_err(|e| e.in_line(lower.line))?;
    }
    if let Some(open) = lower.whiles.last() {
        return Err(CompileError::new("WHILE without WEND").in_line(open.line));
    }
    lower.epilogue(body_start)?;

    debug!(
        "lowered main: {} lines, {} return sites",
        lower.lines.len(),
        lower.return_sites.len()
    );
    lower
        .em
        .finish(ACC_PUBLIC | ACC_STATIC, "main", "([Ljava/lang/String;)V")
}

/// Compile `DEF FN name` into a private static method taking its
/// parameters as locals.
pub(crate) fn user_function(
    pool: &mut ConstantPool,
    unit: &mut Unit,
    info: &ProgramInfo<'_>,
    name: &str,
    def: &FnDef<'_>,
) -> Result<MethodBody> {
    let params: Vec<(String, u16)> = def
        .params
        .iter()
        .zip(0u16..)
        .map(|(param, slot)| (param.clone(), slot))
        .collect();
    let slots = u16::try_from(params.len()).map_err(|_| CompileError::new("Too many parameters"))?;

    let em = Emitter::new(Assembler::new(pool, slots), unit);
    let mut lower = Lower::new(em, info, params, false)?;
    lower
        .function_body(name, def)
        .map_err(|e| e.in_line(def.line))?;

    lower
        .em
        .finish(ACC_PRIVATE | ACC_STATIC, name, &def.descriptor(name))
}

#[cfg(test)]
mod tests {
    use classfile::{ClassImage, Instruction, decode_all};

    use crate::{CompileOptions, compile_source};

    fn main_code(src: &str) -> Vec<Instruction> {
        let bytes = compile_source(src, &CompileOptions::default()).unwrap();
        let image = ClassImage::parse(&bytes).unwrap();
        let main = image.method("main").unwrap();
        decode_all(&main.code.as_ref().unwrap().bytes)
            .unwrap()
            .into_iter()
            .map(|(_, i)| i)
            .collect()
    }

    #[test]
    fn empty_program_only_flushes() {
        let code = main_code("10 REM nothing\n");
        assert_eq!(code.len(), 3);
        assert!(matches!(code[2], Instruction::Simple(classfile::Op::Return)));
    }

    #[test]
    fn for_slots_are_zeroed_before_the_body() {
        let code = main_code("10 FOR I = 1 TO 2 : NEXT I\n20 FOR J = 1 TO 2 : NEXT J\n");
        let stores: Vec<_> = code
            .iter()
            .take(8)
            .filter_map(|i| match i {
                Instruction::Store(classfile::SlotKind::Float, slot) => Some(*slot),
                _ => None,
            })
            .collect();
        assert_eq!(stores, [1, 2, 3, 4]);
    }

    #[test]
    fn while_needs_wend() {
        let err = compile_source("10 WHILE 1\n20 PRINT\n", &CompileOptions::default())
            .unwrap_err();
        assert_eq!(err.message, "WHILE without WEND in line 10");
    }

    #[test]
    fn function_body_type_must_match_its_name() {
        let err = compile_source("10 DEF FNA$(X) = X\n", &CompileOptions::default())
            .unwrap_err();
        assert_eq!(err.message, "Type mismatch in line 10");
    }

    #[test]
    fn body_is_covered_by_the_error_handler() {
        for src in ["10 PRINT\n", "10 A = 1\n", "10 GOTO 20\n20 END\n"] {
            let bytes = compile_source(src, &CompileOptions::default()).unwrap();
            let image = ClassImage::parse(&bytes).unwrap();
            let code = image.method("main").unwrap().code.as_ref().unwrap();
            assert_eq!(code.exception_table.len(), 1, "{src}");
            let handler = code.exception_table[0];
            assert!(handler.start_pc < handler.end_pc);
            assert!(handler.end_pc <= handler.handler_pc);
            assert!(code.max_stack >= 1);
        }
    }

    #[test]
    fn for_slot_count_is_bounded() {
        let src: String = (1..=32768)
            .map(|n| format!("{n} FOR I = 1 TO 1\n"))
            .collect();
        let err = compile_source(&src, &CompileOptions::default()).unwrap_err();
        assert_eq!(err.message, "Too many FOR loops");
    }
}
