use log::trace;

use crate::error::ClassFileError;
use crate::line_table::LineTableBuilder;
use crate::op::{ArrayType, Op};

/// Largest code array a method may carry.
pub const MAX_CODE_LEN: usize = u16::MAX as usize;

/// A position in the method body that jumps can target before or after it
/// is bound. Created by [`BytecodeBuilder::create_label`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(usize);

impl Label {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Local variable families with distinct load/store opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Int,
    Float,
    Reference,
}

impl SlotKind {
    fn load_ops(self) -> (Op, [Op; 4]) {
        match self {
            SlotKind::Int => (Op::Iload, [Op::Iload0, Op::Iload1, Op::Iload2, Op::Iload3]),
            SlotKind::Float => (Op::Fload, [Op::Fload0, Op::Fload1, Op::Fload2, Op::Fload3]),
            SlotKind::Reference => (Op::Aload, [Op::Aload0, Op::Aload1, Op::Aload2, Op::Aload3]),
        }
    }

    fn store_ops(self) -> (Op, [Op; 4]) {
        match self {
            SlotKind::Int => (
                Op::Istore,
                [Op::Istore0, Op::Istore1, Op::Istore2, Op::Istore3],
            ),
            SlotKind::Float => (
                Op::Fstore,
                [Op::Fstore0, Op::Fstore1, Op::Fstore2, Op::Fstore3],
            ),
            SlotKind::Reference => (
                Op::Astore,
                [Op::Astore0, Op::Astore1, Op::Astore2, Op::Astore3],
            ),
        }
    }
}

/// One exception table row, with offsets resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// Pool index of the caught class, 0 for any throwable.
    pub catch_type: u16,
}

/// A finished method body, ready for the `Code` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    pub bytes: Vec<u8>,
    pub max_stack: u16,
    pub max_locals: u16,
    pub exception_table: Vec<ExceptionEntry>,
    /// `(start_pc, line)` pairs for the `LineNumberTable` attribute.
    pub line_numbers: Vec<(u16, u16)>,
}

#[derive(Debug, Default)]
struct LabelSlot {
    offset: Option<usize>,
    /// Stack depth expected on entry, from the first jump seen.
    depth: Option<u16>,
    name: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum JumpWidth {
    /// `i16`, ordinary branches.
    Short,
    /// `i32`, `goto_w` and `tableswitch` entries.
    Long,
}

/// A jump emitted before its target was bound.
#[derive(Debug)]
struct PendingJump {
    label: Label,
    /// Offset of the branching opcode; offsets are relative to it.
    at: usize,
    /// Offset of the placeholder operand bytes.
    operand: usize,
    width: JumpWidth,
}

#[derive(Debug)]
struct Region {
    start: Label,
    end: Label,
    handler: Label,
    catch_type: u16,
}

/// Builds the code array of one JVM method.
///
/// Jumps may name labels that are not bound yet; those get a zero placeholder
/// and a [`PendingJump`] record, patched by [`finish`](Self::finish). Operand
/// widths (short local forms, `wide`, `goto_w`) are chosen as each instruction
/// is emitted.
///
/// The builder also tracks operand stack depth in slots. After an
/// unconditional transfer the code is unreachable until a label is bound.
/// Binding a label that jumps or a handler already target adopts the depth
/// recorded for it.
pub struct BytecodeBuilder {
    buf: Vec<u8>,
    labels: Vec<LabelSlot>,
    pending: Vec<PendingJump>,
    regions: Vec<Region>,
    lines: LineTableBuilder,
    depth: u16,
    max_depth: u16,
    reachable: bool,
    underflow: Option<usize>,
    max_locals: u16,
}

impl BytecodeBuilder {
    pub fn new() -> Self {
        Self::with_params(0)
    }

    /// A builder for a method whose parameters occupy `param_slots` locals.
    pub fn with_params(param_slots: u16) -> Self {
        Self {
            buf: Vec::new(),
            labels: Vec::new(),
            pending: Vec::new(),
            regions: Vec::new(),
            lines: LineTableBuilder::new(),
            depth: 0,
            max_depth: 0,
            reachable: true,
            underflow: None,
            max_locals: param_slots,
        }
    }

    /// Current byte offset in the code array.
    pub fn current_offset(&self) -> usize {
        self.buf.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Operand stack depth at the current position.
    pub fn depth(&self) -> u16 {
        self.depth
    }

    pub fn max_stack(&self) -> u16 {
        self.max_depth
    }

    pub fn max_locals(&self) -> u16 {
        self.max_locals
    }

    /// `false` right after `goto`, a return, `athrow` or `tableswitch`.
    pub fn is_reachable(&self) -> bool {
        self.reachable
    }

    // ── emit helpers ───────────────────────────────────────────────

    fn emit_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn emit_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn emit_i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn emit_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn emit_op(&mut self, op: Op) {
        self.buf.push(op as u8);
    }

    /// Apply a stack effect for the instruction about to be emitted.
    fn adjust(&mut self, pops: u16, pushes: u16) {
        if self.depth < pops {
            self.underflow.get_or_insert(self.buf.len());
            self.depth = 0;
        } else {
            self.depth -= pops;
        }
        self.depth += pushes;
        self.max_depth = self.max_depth.max(self.depth);
    }

    fn after(&mut self, op: Op) {
        if op.ends_block() {
            self.reachable = false;
        }
    }

    fn touch_local(&mut self, slot: u16, width: u16) {
        self.max_locals = self.max_locals.max(slot.saturating_add(width));
    }

    /// Emit an instruction that has no operands.
    pub fn op(&mut self, op: Op) {
        debug_assert!(op.stack_effect().is_some() && !op.is_branch());
        let (pops, pushes) = op.stack_effect().unwrap_or((0, 0));
        self.adjust(pops, pushes);
        self.emit_op(op);
        self.after(op);
    }

    /// Push an int constant that fits in 16 bits, choosing `iconst_<n>`,
    /// `bipush` or `sipush`.
    pub fn push_small(&mut self, value: i16) {
        self.adjust(0, 1);
        match value {
            -1..=5 => {
                let op = match value {
                    -1 => Op::IconstM1,
                    0 => Op::Iconst0,
                    1 => Op::Iconst1,
                    2 => Op::Iconst2,
                    3 => Op::Iconst3,
                    4 => Op::Iconst4,
                    _ => Op::Iconst5,
                };
                self.emit_op(op);
            }
            v if i8::try_from(v).is_ok() => {
                self.emit_op(Op::Bipush);
                self.emit_u8(v as i8 as u8);
            }
            v => {
                self.emit_op(Op::Sipush);
                self.emit_i16(v);
            }
        }
    }

    /// `ldc` / `ldc_w` of a one-slot constant at pool index `idx`.
    pub fn ldc(&mut self, idx: u16) {
        self.adjust(0, 1);
        if let Ok(narrow) = u8::try_from(idx) {
            self.emit_op(Op::Ldc);
            self.emit_u8(narrow);
        } else {
            self.emit_op(Op::LdcW);
            self.emit_u16(idx);
        }
    }

    fn emit_local(&mut self, op: Op, short: [Op; 4], slot: u16) {
        if slot < 4 {
            self.emit_op(short[usize::from(slot)]);
        } else if let Ok(narrow) = u8::try_from(slot) {
            self.emit_op(op);
            self.emit_u8(narrow);
        } else {
            self.emit_op(Op::Wide);
            self.emit_op(op);
            self.emit_u16(slot);
        }
    }

    /// Load local `slot`, using `<x>load_<n>` for slots 0-3 and `wide` above 255.
    pub fn load(&mut self, kind: SlotKind, slot: u16) {
        self.touch_local(slot, 1);
        self.adjust(0, 1);
        let (op, short) = kind.load_ops();
        self.emit_local(op, short, slot);
    }

    /// Store into local `slot`, with the same width rules as [`load`](Self::load).
    pub fn store(&mut self, kind: SlotKind, slot: u16) {
        self.touch_local(slot, 1);
        self.adjust(1, 0);
        let (op, short) = kind.store_ops();
        self.emit_local(op, short, slot);
    }

    /// `iinc <slot> <delta>`, widened when either operand needs it.
    pub fn iinc(&mut self, slot: u16, delta: i16) {
        self.touch_local(slot, 1);
        match (u8::try_from(slot), i8::try_from(delta)) {
            (Ok(slot), Ok(delta)) => {
                self.emit_op(Op::Iinc);
                self.emit_u8(slot);
                self.emit_u8(delta as u8);
            }
            _ => {
                self.emit_op(Op::Wide);
                self.emit_op(Op::Iinc);
                self.emit_u16(slot);
                self.emit_i16(delta);
            }
        }
    }

    /// `newarray <atype>`.
    pub fn newarray(&mut self, ty: ArrayType) {
        self.adjust(1, 1);
        self.emit_op(Op::Newarray);
        self.emit_u8(ty as u8);
    }

    /// `getstatic` / `putstatic` of a field whose value takes `slots`.
    pub fn field(&mut self, op: Op, idx: u16, slots: u16) {
        match op {
            Op::Getstatic => self.adjust(0, slots),
            Op::Putstatic => self.adjust(slots, 0),
            _ => debug_assert!(false, "{} is not a static field access", op.mnemonic()),
        }
        self.emit_op(op);
        self.emit_u16(idx);
    }

    /// `invokestatic`, `invokespecial` or `invokevirtual`. The receiver of
    /// instance calls is popped in addition to `arg_slots`.
    pub fn invoke(&mut self, op: Op, idx: u16, arg_slots: u16, ret_slots: u16) {
        let receiver = u16::from(op != Op::Invokestatic);
        self.adjust(arg_slots + receiver, ret_slots);
        self.emit_op(op);
        self.emit_u16(idx);
    }

    /// `new`, `anewarray`, `checkcast` or `instanceof` with a class operand.
    pub fn class_op(&mut self, op: Op, idx: u16) {
        let (pops, pushes) = op.stack_effect().unwrap_or((0, 0));
        self.adjust(pops, pushes);
        self.emit_op(op);
        self.emit_u16(idx);
    }

    // ── labels ─────────────────────────────────────────────────────

    pub fn create_label(&mut self) -> Label {
        self.labels.push(LabelSlot::default());
        Label(self.labels.len() - 1)
    }

    /// A label reported by `name` in errors, e.g. `line 100`.
    pub fn create_named_label(&mut self, name: impl Into<String>) -> Label {
        self.labels.push(LabelSlot {
            name: Some(name.into()),
            ..LabelSlot::default()
        });
        Label(self.labels.len() - 1)
    }

    pub fn label_name(&self, label: Label) -> String {
        match &self.labels[label.0].name {
            Some(name) => name.clone(),
            None => format!("L{}", label.0),
        }
    }

    pub fn is_bound(&self, label: Label) -> bool {
        self.labels[label.0].offset.is_some()
    }

    /// Bound offset of `label`, if any.
    pub fn offset_of(&self, label: Label) -> Option<usize> {
        self.labels[label.0].offset
    }

    /// Bind `label` to the current offset.
    pub fn bind(&mut self, label: Label) -> Result<(), ClassFileError> {
        if self.is_bound(label) {
            return Err(ClassFileError::DuplicateLabel {
                label: self.label_name(label),
            });
        }
        let offset = self.buf.len();
        let slot = &mut self.labels[label.0];
        slot.offset = Some(offset);
        match slot.depth {
            Some(depth) => self.depth = depth,
            None if self.reachable => slot.depth = Some(self.depth),
            None => self.depth = 0,
        }
        self.reachable = true;
        Ok(())
    }

    fn note_target(&mut self, label: Label) {
        let depth = self.depth;
        self.labels[label.0].depth.get_or_insert(depth);
    }

    /// Emit a branch to `label`.
    ///
    /// A bound label is a backward jump and is encoded immediately: `goto`
    /// becomes `goto_w` and a conditional becomes its inverse over a `goto_w`
    /// when the distance exceeds 16 bits. An unbound label gets a 16-bit
    /// placeholder resolved in [`finish`](Self::finish).
    pub fn jump(&mut self, op: Op, label: Label) {
        debug_assert!(op.is_branch() && op != Op::GotoW);
        let (pops, _) = op.stack_effect().unwrap_or((0, 0));
        self.adjust(pops, 0);
        self.note_target(label);

        let at = self.buf.len();
        match self.labels[label.0].offset {
            Some(target) => {
                let rel = target as i64 - at as i64;
                if let Ok(rel) = i16::try_from(rel) {
                    self.emit_op(op);
                    self.emit_i16(rel);
                } else if op == Op::Goto {
                    self.emit_op(Op::GotoW);
                    self.emit_i32(rel as i32);
                } else if let Some(inverse) = op.inverse() {
                    // Skip the 3-byte branch and the 5-byte goto_w.
                    self.emit_op(inverse);
                    self.emit_i16(8);
                    self.emit_op(Op::GotoW);
                    self.emit_i32((target as i64 - (at as i64 + 3)) as i32);
                }
            }
            None => {
                self.emit_op(op);
                self.pending.push(PendingJump {
                    label,
                    at,
                    operand: self.buf.len(),
                    width: JumpWidth::Short,
                });
                self.emit_i16(0);
            }
        }
        self.after(op);
    }

    /// Unconditional `goto label`.
    pub fn goto(&mut self, label: Label) {
        self.jump(Op::Goto, label);
    }

    fn emit_switch_target(&mut self, at: usize, label: Label) {
        self.note_target(label);
        match self.labels[label.0].offset {
            Some(target) => self.emit_i32((target as i64 - at as i64) as i32),
            None => {
                self.pending.push(PendingJump {
                    label,
                    at,
                    operand: self.buf.len(),
                    width: JumpWidth::Long,
                });
                self.emit_i32(0);
            }
        }
    }

    /// `tableswitch` over `low..low + targets.len()`, anything else to
    /// `default`. `targets` must not be empty.
    pub fn tableswitch(&mut self, low: i32, targets: &[Label], default: Label) {
        debug_assert!(!targets.is_empty());
        self.adjust(1, 0);
        let at = self.buf.len();
        self.emit_op(Op::Tableswitch);
        while self.buf.len() % 4 != 0 {
            self.emit_u8(0);
        }
        self.emit_switch_target(at, default);
        self.emit_i32(low);
        self.emit_i32(low + targets.len() as i32 - 1);
        for &target in targets {
            self.emit_switch_target(at, target);
        }
        self.after(Op::Tableswitch);
    }

    /// Route exceptions of `catch_type` (pool index, 0 for all) raised in
    /// `[start, end)` to `handler`, which is entered with the exception as
    /// the only stack entry. Declare the region before binding `handler`.
    pub fn catch(&mut self, start: Label, end: Label, handler: Label, catch_type: u16) {
        self.labels[handler.0].depth = Some(1);
        self.regions.push(Region {
            start,
            end,
            handler,
            catch_type,
        });
    }

    /// Record that code from here on belongs to source `line`.
    pub fn mark_line(&mut self, line: u16) {
        if let Ok(pc) = u16::try_from(self.buf.len()) {
            self.lines.add(pc, line);
        }
    }

    // ── finalize ───────────────────────────────────────────────────

    fn resolve(&self, label: Label) -> Result<usize, ClassFileError> {
        self.labels[label.0]
            .offset
            .ok_or_else(|| ClassFileError::UnresolvedLabel {
                label: self.label_name(label),
            })
    }

    /// Patch every pending jump, resolve exception regions and produce the
    /// finished [`Code`].
    pub fn finish(self) -> Result<Code, ClassFileError> {
        if let Some(at) = self.underflow {
            return Err(ClassFileError::StackUnderflow { at });
        }

        let mut bytes = self.buf.clone();
        for jump in &self.pending {
            let target = self.resolve(jump.label)?;
            let rel = target as i64 - jump.at as i64;
            let out_of_range = || ClassFileError::BranchOutOfRange {
                label: self.label_name(jump.label),
                at: jump.at,
            };
            match jump.width {
                JumpWidth::Short => {
                    let rel = i16::try_from(rel).map_err(|_| out_of_range())?;
                    bytes[jump.operand..jump.operand + 2].copy_from_slice(&rel.to_be_bytes());
                }
                JumpWidth::Long => {
                    let rel = i32::try_from(rel).map_err(|_| out_of_range())?;
                    bytes[jump.operand..jump.operand + 4].copy_from_slice(&rel.to_be_bytes());
                }
            }
            trace!(
                "patched jump at {} to {} ({:+})",
                jump.at,
                self.label_name(jump.label),
                rel
            );
        }

        if bytes.len() > MAX_CODE_LEN {
            return Err(ClassFileError::CodeTooLarge(bytes.len()));
        }

        let mut exception_table = Vec::with_capacity(self.regions.len());
        for region in &self.regions {
            exception_table.push(ExceptionEntry {
                start_pc: self.resolve(region.start)? as u16,
                end_pc: self.resolve(region.end)? as u16,
                handler_pc: self.resolve(region.handler)? as u16,
                catch_type: region.catch_type,
            });
        }

        Ok(Code {
            bytes,
            max_stack: self.max_depth,
            max_locals: self.max_locals,
            exception_table,
            line_numbers: self.lines.finish(),
        })
    }
}

impl Default for BytecodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
