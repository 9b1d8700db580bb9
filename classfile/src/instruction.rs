use std::fmt;

use crate::builder::SlotKind;
use crate::op::{ArrayType, Op};

/// A decoded instruction.
///
/// Width variants collapse into one shape: `iload_2`, `iload 2` and
/// `wide iload 2` all decode to `Load(Int, 2)`, and every integer push is a
/// `Push`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Any opcode without operands.
    Simple(Op),
    Push(i32),
    Ldc(u16),
    Load(SlotKind, u16),
    Store(SlotKind, u16),
    Iinc { slot: u16, delta: i16 },
    /// Offset relative to the branch opcode.
    Branch { op: Op, offset: i32 },
    TableSwitch {
        default: i32,
        low: i32,
        offsets: Vec<i32>,
    },
    /// `getstatic` / `putstatic`.
    Field { op: Op, idx: u16 },
    Invoke { op: Op, idx: u16 },
    /// `new`, `anewarray`, `checkcast`, `instanceof`.
    Class { op: Op, idx: u16 },
    NewArray(ArrayType),
}

impl Instruction {
    /// The absolute targets of a branch or switch at offset `at`.
    pub fn targets(&self, at: usize) -> Vec<usize> {
        let abs = |rel: i32| (at as i64 + i64::from(rel)) as usize;
        match self {
            Instruction::Branch { offset, .. } => vec![abs(*offset)],
            Instruction::TableSwitch {
                default, offsets, ..
            } => std::iter::once(*default)
                .chain(offsets.iter().copied())
                .map(abs)
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn kind_prefix(kind: SlotKind) -> char {
    match kind {
        SlotKind::Int => 'i',
        SlotKind::Float => 'f',
        SlotKind::Reference => 'a',
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Simple(op) => write!(f, "{}", op.mnemonic()),
            Instruction::Push(value) => write!(f, "push {value}"),
            Instruction::Ldc(idx) => write!(f, "ldc #{idx}"),
            Instruction::Load(kind, slot) => write!(f, "{}load {slot}", kind_prefix(*kind)),
            Instruction::Store(kind, slot) => write!(f, "{}store {slot}", kind_prefix(*kind)),
            Instruction::Iinc { slot, delta } => write!(f, "iinc {slot} {delta}"),
            Instruction::Branch { op, offset } => write!(f, "{} {offset:+}", op.mnemonic()),
            Instruction::TableSwitch {
                default,
                low,
                offsets,
            } => {
                write!(f, "tableswitch {low}..")?;
                write!(f, "{} [", low + offsets.len() as i32 - 1)?;
                for (i, offset) in offsets.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{offset:+}")?;
                }
                write!(f, "] default {default:+}")
            }
            Instruction::Field { op, idx }
            | Instruction::Invoke { op, idx }
            | Instruction::Class { op, idx } => write!(f, "{} #{idx}", op.mnemonic()),
            Instruction::NewArray(ty) => write!(f, "newarray {}", ty.name()),
        }
    }
}
