use crate::builder::SlotKind;
use crate::error::ClassFileError;
use crate::instruction::Instruction;
use crate::op::{ArrayType, Op};

/// Decodes a code array into [`Instruction`]s.
///
/// Input is not trusted: truncated operands, unknown opcodes and misplaced
/// `wide` prefixes are reported as [`ClassFileError::Malformed`].
pub struct BytecodeDecoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BytecodeDecoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Current byte offset in the stream.
    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Decode the next instruction, or `None` at end-of-stream.
    pub fn decode_next(&mut self) -> Option<Result<Instruction, ClassFileError>> {
        if self.is_at_end() {
            return None;
        }
        let result = self.decode();
        if result.is_err() {
            // Stop after the first error.
            self.pos = self.bytes.len();
        }
        Some(result)
    }

    fn decode(&mut self) -> Result<Instruction, ClassFileError> {
        let at = self.pos;
        let op = self.read_op()?;
        if op == Op::Wide {
            let next = self.read_op()?;
            return self.decode_wide(at, next);
        }

        let insn = match op {
            Op::IconstM1
            | Op::Iconst0
            | Op::Iconst1
            | Op::Iconst2
            | Op::Iconst3
            | Op::Iconst4
            | Op::Iconst5 => Instruction::Push(op as i32 - Op::Iconst0 as i32),
            Op::Bipush => Instruction::Push(i32::from(self.read_u8()? as i8)),
            Op::Sipush => Instruction::Push(i32::from(self.read_i16()?)),
            Op::Ldc => Instruction::Ldc(u16::from(self.read_u8()?)),
            Op::LdcW => Instruction::Ldc(self.read_u16()?),

            Op::Iload => Instruction::Load(SlotKind::Int, u16::from(self.read_u8()?)),
            Op::Fload => Instruction::Load(SlotKind::Float, u16::from(self.read_u8()?)),
            Op::Aload => Instruction::Load(SlotKind::Reference, u16::from(self.read_u8()?)),
            Op::Istore => Instruction::Store(SlotKind::Int, u16::from(self.read_u8()?)),
            Op::Fstore => Instruction::Store(SlotKind::Float, u16::from(self.read_u8()?)),
            Op::Astore => Instruction::Store(SlotKind::Reference, u16::from(self.read_u8()?)),
            Op::Iload0 | Op::Iload1 | Op::Iload2 | Op::Iload3 => {
                Instruction::Load(SlotKind::Int, short_slot(op, Op::Iload0))
            }
            Op::Fload0 | Op::Fload1 | Op::Fload2 | Op::Fload3 => {
                Instruction::Load(SlotKind::Float, short_slot(op, Op::Fload0))
            }
            Op::Aload0 | Op::Aload1 | Op::Aload2 | Op::Aload3 => {
                Instruction::Load(SlotKind::Reference, short_slot(op, Op::Aload0))
            }
            Op::Istore0 | Op::Istore1 | Op::Istore2 | Op::Istore3 => {
                Instruction::Store(SlotKind::Int, short_slot(op, Op::Istore0))
            }
            Op::Fstore0 | Op::Fstore1 | Op::Fstore2 | Op::Fstore3 => {
                Instruction::Store(SlotKind::Float, short_slot(op, Op::Fstore0))
            }
            Op::Astore0 | Op::Astore1 | Op::Astore2 | Op::Astore3 => {
                Instruction::Store(SlotKind::Reference, short_slot(op, Op::Astore0))
            }

            Op::Iinc => {
                let slot = u16::from(self.read_u8()?);
                let delta = i16::from(self.read_u8()? as i8);
                Instruction::Iinc { slot, delta }
            }

            Op::GotoW => Instruction::Branch {
                op,
                offset: self.read_i32()?,
            },
            op if op.is_branch() => Instruction::Branch {
                op,
                offset: i32::from(self.read_i16()?),
            },

            Op::Tableswitch => {
                while self.pos % 4 != 0 {
                    self.read_u8()?;
                }
                let default = self.read_i32()?;
                let low = self.read_i32()?;
                let high = self.read_i32()?;
                if high < low {
                    return Err(ClassFileError::malformed(at, "tableswitch high < low"));
                }
                let count = (i64::from(high) - i64::from(low) + 1) as usize;
                if count > self.bytes.len() / 4 {
                    return Err(ClassFileError::malformed(at, "tableswitch too large"));
                }
                let offsets = (0..count)
                    .map(|_| self.read_i32())
                    .collect::<Result<Vec<_>, _>>()?;
                Instruction::TableSwitch {
                    default,
                    low,
                    offsets,
                }
            }

            Op::Getstatic | Op::Putstatic => Instruction::Field {
                op,
                idx: self.read_u16()?,
            },
            Op::Invokevirtual | Op::Invokespecial | Op::Invokestatic => Instruction::Invoke {
                op,
                idx: self.read_u16()?,
            },
            Op::New | Op::Anewarray | Op::Checkcast | Op::Instanceof => Instruction::Class {
                op,
                idx: self.read_u16()?,
            },
            Op::Newarray => {
                let byte = self.read_u8()?;
                let ty = ArrayType::try_from(byte).map_err(|b| {
                    ClassFileError::malformed(at, format!("unknown newarray type {b}"))
                })?;
                Instruction::NewArray(ty)
            }

            op => Instruction::Simple(op),
        };
        Ok(insn)
    }

    fn decode_wide(&mut self, at: usize, op: Op) -> Result<Instruction, ClassFileError> {
        Ok(match op {
            Op::Iload => Instruction::Load(SlotKind::Int, self.read_u16()?),
            Op::Fload => Instruction::Load(SlotKind::Float, self.read_u16()?),
            Op::Aload => Instruction::Load(SlotKind::Reference, self.read_u16()?),
            Op::Istore => Instruction::Store(SlotKind::Int, self.read_u16()?),
            Op::Fstore => Instruction::Store(SlotKind::Float, self.read_u16()?),
            Op::Astore => Instruction::Store(SlotKind::Reference, self.read_u16()?),
            Op::Iinc => {
                let slot = self.read_u16()?;
                let delta = self.read_i16()?;
                Instruction::Iinc { slot, delta }
            }
            other => {
                return Err(ClassFileError::malformed(
                    at,
                    format!("`wide` before {}", other.mnemonic()),
                ));
            }
        })
    }

    // ── readers ────────────────────────────────────────────────────

    fn take<const N: usize>(&mut self) -> Result<[u8; N], ClassFileError> {
        let end = self.pos + N;
        let bytes = self
            .bytes
            .get(self.pos..end)
            .ok_or_else(|| ClassFileError::malformed(self.pos, "truncated instruction"))?;
        self.pos = end;
        let mut out = [0; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn read_op(&mut self) -> Result<Op, ClassFileError> {
        let at = self.pos;
        let [byte] = self.take::<1>()?;
        Op::try_from(byte)
            .map_err(|b| ClassFileError::malformed(at, format!("unknown opcode {b:#04x}")))
    }

    fn read_u8(&mut self) -> Result<u8, ClassFileError> {
        Ok(self.take::<1>()?[0])
    }

    fn read_u16(&mut self) -> Result<u16, ClassFileError> {
        Ok(u16::from_be_bytes(self.take()?))
    }

    fn read_i16(&mut self) -> Result<i16, ClassFileError> {
        Ok(i16::from_be_bytes(self.take()?))
    }

    fn read_i32(&mut self) -> Result<i32, ClassFileError> {
        Ok(i32::from_be_bytes(self.take()?))
    }
}

fn short_slot(op: Op, base: Op) -> u16 {
    u16::from(op as u8 - base as u8)
}

impl Iterator for BytecodeDecoder<'_> {
    type Item = Result<Instruction, ClassFileError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.decode_next()
    }
}

/// Decodes a whole code array into `(offset, instruction)` pairs.
pub fn decode_all(bytes: &[u8]) -> Result<Vec<(usize, Instruction)>, ClassFileError> {
    let mut decoder = BytecodeDecoder::new(bytes);
    let mut out = Vec::new();
    while !decoder.is_at_end() {
        let at = decoder.offset();
        if let Some(insn) = decoder.decode_next() {
            out.push((at, insn?));
        }
    }
    Ok(out)
}
