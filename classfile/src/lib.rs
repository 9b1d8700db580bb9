//! JVM class-file toolkit for the BASIC compiler.
//!
//! ```text
//!   ConstantPool ──┐
//!                  ├─▶ Assembler ─▶ BytecodeBuilder::finish ─▶ MethodBody
//!   BytecodeBuilder┘                                              │
//!                                         ClassWriter::write ◀────┘
//!                                                │
//!                                           class bytes ─▶ ClassImage::parse
//! ```
//!
//! The writer targets major version 49, so no `StackMapTable` is needed.

mod assembler;
mod builder;
mod class;
mod decoder;
mod descriptor;
mod error;
mod instruction;
pub mod line_table;
mod method;
mod op;
mod pool;
mod reader;

pub use assembler::Assembler;
pub use builder::{BytecodeBuilder, Code, ExceptionEntry, Label, MAX_CODE_LEN, SlotKind};
pub use class::{ClassWriter, MAGIC, MAJOR_VERSION, MINOR_VERSION};
pub use decoder::{BytecodeDecoder, decode_all};
pub use descriptor::{field_slots, method_slots};
pub use error::ClassFileError;
pub use instruction::Instruction;
pub use method::{
    ACC_FINAL, ACC_PRIVATE, ACC_PUBLIC, ACC_STATIC, ACC_SUPER, FieldInfo, MethodBody,
};
pub use op::{ArrayType, Op};
pub use pool::{Constant, ConstantPool, MemberRef, PoolKey, tag};
pub use reader::{ClassImage, MethodImage};

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> Vec<Instruction> {
        decode_all(bytes)
            .unwrap()
            .into_iter()
            .map(|(_, insn)| insn)
            .collect()
    }

    #[test]
    fn round_trip_narrow() {
        let mut b = BytecodeBuilder::new();
        b.push_small(3);
        b.store(SlotKind::Int, 1);
        b.load(SlotKind::Int, 1);
        b.op(Op::I2f);
        b.store(SlotKind::Float, 7);
        b.iinc(1, -1);
        b.ldc(9);
        b.op(Op::Pop);
        b.newarray(ArrayType::Char);
        b.op(Op::Areturn);

        assert_eq!(decode(b.as_bytes()), vec![
            Instruction::Push(3),
            Instruction::Store(SlotKind::Int, 1),
            Instruction::Load(SlotKind::Int, 1),
            Instruction::Simple(Op::I2f),
            Instruction::Store(SlotKind::Float, 7),
            Instruction::Iinc { slot: 1, delta: -1 },
            Instruction::Ldc(9),
            Instruction::Simple(Op::Pop),
            Instruction::NewArray(ArrayType::Char),
            Instruction::Simple(Op::Areturn),
        ]);
    }

    #[test]
    fn round_trip_wide() {
        let mut b = BytecodeBuilder::new();
        b.load(SlotKind::Float, 300);
        b.store(SlotKind::Float, 1000);
        b.iinc(2, 200);
        b.ldc(400);
        b.push_small(-129);

        assert_eq!(decode(b.as_bytes()), vec![
            Instruction::Load(SlotKind::Float, 300),
            Instruction::Store(SlotKind::Float, 1000),
            Instruction::Iinc { slot: 2, delta: 200 },
            Instruction::Ldc(400),
            Instruction::Push(-129),
        ]);
    }

    #[test]
    fn forward_and_backward_jumps_land_on_their_labels() {
        let mut b = BytecodeBuilder::new();
        let top = b.create_label();
        let exit = b.create_label();
        b.bind(top).unwrap();
        b.load(SlotKind::Int, 0);
        b.jump(Op::Ifeq, exit);
        b.iinc(0, -1);
        b.goto(top);
        b.bind(exit).unwrap();
        b.op(Op::Return);
        let exit_at = b.offset_of(exit).unwrap();
        let code = b.finish().unwrap();

        let insns = decode_all(&code.bytes).unwrap();
        let branches: Vec<_> = insns
            .iter()
            .filter(|(_, i)| matches!(i, Instruction::Branch { .. }))
            .collect();
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].1.targets(branches[0].0), vec![exit_at]);
        assert_eq!(branches[1].1.targets(branches[1].0), vec![0]);
    }

    #[test]
    fn instruction_display() {
        assert_eq!(Instruction::Load(SlotKind::Float, 4).to_string(), "fload 4");
        assert_eq!(
            Instruction::Branch {
                op: Op::Ifle,
                offset: -12
            }
            .to_string(),
            "ifle -12"
        );
        assert_eq!(
            Instruction::TableSwitch {
                default: 40,
                low: 1,
                offsets: vec![10, 20]
            }
            .to_string(),
            "tableswitch 1..2 [+10, +20] default +40"
        );
        assert_eq!(
            Instruction::Invoke {
                op: Op::Invokestatic,
                idx: 7
            }
            .to_string(),
            "invokestatic #7"
        );
    }

    fn sample_class() -> Vec<u8> {
        let mut pool = ConstantPool::new();
        let mut asm = Assembler::new(&mut pool, 1);
        let field = MemberRef::new("Sample", "X", "F");
        asm.mark_line(10);
        asm.push_float(1.5).unwrap();
        asm.put_static(&field).unwrap();
        asm.mark_line(20);
        asm.op(Op::Return);
        let main = asm
            .finish(ACC_PUBLIC | ACC_STATIC, "main", "([Ljava/lang/String;)V")
            .unwrap();

        let mut writer = ClassWriter::new(pool, "Sample");
        writer.add_field(FieldInfo::new(ACC_PRIVATE | ACC_STATIC, "X", "F"));
        writer.add_method(main);
        writer.set_source_file("sample.bas");
        writer.write().unwrap()
    }

    #[test]
    fn written_class_parses_back() {
        let bytes = sample_class();
        assert_eq!(&bytes[..4], &[0xca, 0xfe, 0xba, 0xbe]);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 49]);

        let image = ClassImage::parse(&bytes).unwrap();
        assert_eq!(image.this_class, "Sample");
        assert_eq!(image.super_class, "java/lang/Object");
        assert_eq!(image.access, ACC_PUBLIC | ACC_SUPER);
        assert_eq!(image.fields, vec![FieldInfo::new(
            ACC_PRIVATE | ACC_STATIC,
            "X",
            "F"
        )]);
        assert_eq!(image.source_file.as_deref(), Some("sample.bas"));

        let main = image.method("main").unwrap();
        let code = main.code.as_ref().unwrap();
        assert_eq!(code.max_stack, 1);
        assert_eq!(code.max_locals, 1);
        assert_eq!(code.line_numbers, vec![(0, 10), (5, 20)]);
        let insns = decode(&code.bytes);
        let Instruction::Field { idx, .. } = insns[1] else {
            panic!("expected putstatic, got {}", insns[1]);
        };
        assert_eq!(image.member(idx), Some(MemberRef::new("Sample", "X", "F")));
    }

    #[test]
    fn reader_rejects_dangling_pool_references() {
        let mut bytes = sample_class();
        // Entry #1 is the Float 1.5. Rewrite it as a Class naming #32767,
        // followed by a zero tag.
        assert_eq!(bytes[10], tag::FLOAT);
        bytes.splice(10..15, [tag::CLASS, 0x7f, 0xff, 0x00, 0x00]);
        assert!(ClassImage::parse(&bytes).is_err());
    }

    #[test]
    fn reader_rejects_bad_magic() {
        let mut bytes = sample_class();
        bytes[0] = 0;
        assert!(matches!(
            ClassImage::parse(&bytes),
            Err(ClassFileError::Malformed { at: 0, .. })
        ));
    }
}
