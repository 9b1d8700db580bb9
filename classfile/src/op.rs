macro_rules! opcodes {
    ($(
        $(#[$doc:meta])*
        $name:ident = $code:literal, $mnemonic:literal, $effect:expr;
    )*) => {
        /// JVM opcodes emitted or decoded by this crate.
        ///
        /// Only the subset the BASIC compiler needs is listed. Operand layouts
        /// are documented per variant; multi-byte operands are big-endian.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Op {
            $(
                $(#[$doc])*
                $name = $code,
            )*
        }

        impl Op {
            /// Every opcode in this table, in opcode order.
            pub const ALL: &'static [Op] = &[$(Op::$name),*];

            /// The mnemonic used by `javap`.
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Op::$name => $mnemonic,)*
                }
            }

            /// Fixed `(pops, pushes)` in stack slots, or `None` when the
            /// effect depends on an operand (field and method references,
            /// the `wide` prefix).
            pub fn stack_effect(self) -> Option<(u16, u16)> {
                match self {
                    $(Op::$name => $effect,)*
                }
            }
        }

        impl TryFrom<u8> for Op {
            type Error = u8;

            fn try_from(byte: u8) -> Result<Self, u8> {
                match byte {
                    $($code => Ok(Op::$name),)*
                    other => Err(other),
                }
            }
        }
    };
}

const fn fx(pops: u16, pushes: u16) -> Option<(u16, u16)> {
    Some((pops, pushes))
}

opcodes! {
    Nop = 0x00, "nop", fx(0, 0);
    AconstNull = 0x01, "aconst_null", fx(0, 1);
    IconstM1 = 0x02, "iconst_m1", fx(0, 1);
    Iconst0 = 0x03, "iconst_0", fx(0, 1);
    Iconst1 = 0x04, "iconst_1", fx(0, 1);
    Iconst2 = 0x05, "iconst_2", fx(0, 1);
    Iconst3 = 0x06, "iconst_3", fx(0, 1);
    Iconst4 = 0x07, "iconst_4", fx(0, 1);
    Iconst5 = 0x08, "iconst_5", fx(0, 1);
    Fconst0 = 0x0b, "fconst_0", fx(0, 1);
    Fconst1 = 0x0c, "fconst_1", fx(0, 1);
    Fconst2 = 0x0d, "fconst_2", fx(0, 1);
    /// Operands: `value:i8`
    Bipush = 0x10, "bipush", fx(0, 1);
    /// Operands: `value:i16`
    Sipush = 0x11, "sipush", fx(0, 1);
    /// Operands: `idx:u8`
    Ldc = 0x12, "ldc", fx(0, 1);
    /// Operands: `idx:u16`
    LdcW = 0x13, "ldc_w", fx(0, 1);

    /// Operands: `slot:u8` (wide: `u16`)
    Iload = 0x15, "iload", fx(0, 1);
    /// Operands: `slot:u8` (wide: `u16`)
    Fload = 0x17, "fload", fx(0, 1);
    /// Operands: `slot:u8` (wide: `u16`)
    Aload = 0x19, "aload", fx(0, 1);
    Iload0 = 0x1a, "iload_0", fx(0, 1);
    Iload1 = 0x1b, "iload_1", fx(0, 1);
    Iload2 = 0x1c, "iload_2", fx(0, 1);
    Iload3 = 0x1d, "iload_3", fx(0, 1);
    Fload0 = 0x22, "fload_0", fx(0, 1);
    Fload1 = 0x23, "fload_1", fx(0, 1);
    Fload2 = 0x24, "fload_2", fx(0, 1);
    Fload3 = 0x25, "fload_3", fx(0, 1);
    Aload0 = 0x2a, "aload_0", fx(0, 1);
    Aload1 = 0x2b, "aload_1", fx(0, 1);
    Aload2 = 0x2c, "aload_2", fx(0, 1);
    Aload3 = 0x2d, "aload_3", fx(0, 1);
    Iaload = 0x2e, "iaload", fx(2, 1);
    Faload = 0x30, "faload", fx(2, 1);
    Aaload = 0x32, "aaload", fx(2, 1);
    Caload = 0x34, "caload", fx(2, 1);

    /// Operands: `slot:u8` (wide: `u16`)
    Istore = 0x36, "istore", fx(1, 0);
    /// Operands: `slot:u8` (wide: `u16`)
    Fstore = 0x38, "fstore", fx(1, 0);
    /// Operands: `slot:u8` (wide: `u16`)
    Astore = 0x3a, "astore", fx(1, 0);
    Istore0 = 0x3b, "istore_0", fx(1, 0);
    Istore1 = 0x3c, "istore_1", fx(1, 0);
    Istore2 = 0x3d, "istore_2", fx(1, 0);
    Istore3 = 0x3e, "istore_3", fx(1, 0);
    Fstore0 = 0x43, "fstore_0", fx(1, 0);
    Fstore1 = 0x44, "fstore_1", fx(1, 0);
    Fstore2 = 0x45, "fstore_2", fx(1, 0);
    Fstore3 = 0x46, "fstore_3", fx(1, 0);
    Astore0 = 0x4b, "astore_0", fx(1, 0);
    Astore1 = 0x4c, "astore_1", fx(1, 0);
    Astore2 = 0x4d, "astore_2", fx(1, 0);
    Astore3 = 0x4e, "astore_3", fx(1, 0);
    Iastore = 0x4f, "iastore", fx(3, 0);
    Fastore = 0x51, "fastore", fx(3, 0);
    Aastore = 0x53, "aastore", fx(3, 0);
    Castore = 0x55, "castore", fx(3, 0);

    Pop = 0x57, "pop", fx(1, 0);
    Pop2 = 0x58, "pop2", fx(2, 0);
    Dup = 0x59, "dup", fx(1, 2);
    DupX1 = 0x5a, "dup_x1", fx(2, 3);
    DupX2 = 0x5b, "dup_x2", fx(3, 4);
    Swap = 0x5f, "swap", fx(2, 2);

    Iadd = 0x60, "iadd", fx(2, 1);
    Fadd = 0x62, "fadd", fx(2, 1);
    Isub = 0x64, "isub", fx(2, 1);
    Fsub = 0x66, "fsub", fx(2, 1);
    Imul = 0x68, "imul", fx(2, 1);
    Fmul = 0x6a, "fmul", fx(2, 1);
    Idiv = 0x6c, "idiv", fx(2, 1);
    Fdiv = 0x6e, "fdiv", fx(2, 1);
    Irem = 0x70, "irem", fx(2, 1);
    Frem = 0x72, "frem", fx(2, 1);
    Ineg = 0x74, "ineg", fx(1, 1);
    Fneg = 0x76, "fneg", fx(1, 1);
    Iand = 0x7e, "iand", fx(2, 1);
    Ior = 0x80, "ior", fx(2, 1);
    Ixor = 0x82, "ixor", fx(2, 1);
    /// Operands: `slot:u8`, `delta:i8` (wide: `u16`, `i16`)
    Iinc = 0x84, "iinc", fx(0, 0);

    I2f = 0x86, "i2f", fx(1, 1);
    I2d = 0x87, "i2d", fx(1, 2);
    F2i = 0x8b, "f2i", fx(1, 1);
    F2d = 0x8d, "f2d", fx(1, 2);
    D2i = 0x8e, "d2i", fx(2, 1);
    D2f = 0x90, "d2f", fx(2, 1);
    I2c = 0x92, "i2c", fx(1, 1);
    /// NaN compares as less.
    Fcmpl = 0x95, "fcmpl", fx(2, 1);
    /// NaN compares as greater.
    Fcmpg = 0x96, "fcmpg", fx(2, 1);

    /// Operands: `offset:i16`, relative to this opcode.
    Ifeq = 0x99, "ifeq", fx(1, 0);
    Ifne = 0x9a, "ifne", fx(1, 0);
    Iflt = 0x9b, "iflt", fx(1, 0);
    Ifge = 0x9c, "ifge", fx(1, 0);
    Ifgt = 0x9d, "ifgt", fx(1, 0);
    Ifle = 0x9e, "ifle", fx(1, 0);
    IfIcmpeq = 0x9f, "if_icmpeq", fx(2, 0);
    IfIcmpne = 0xa0, "if_icmpne", fx(2, 0);
    IfIcmplt = 0xa1, "if_icmplt", fx(2, 0);
    IfIcmpge = 0xa2, "if_icmpge", fx(2, 0);
    IfIcmpgt = 0xa3, "if_icmpgt", fx(2, 0);
    IfIcmple = 0xa4, "if_icmple", fx(2, 0);
    /// Operands: `offset:i16`
    Goto = 0xa7, "goto", fx(0, 0);
    /// Operands: 0-3 padding bytes to a 4-byte boundary, `default:i32`,
    /// `low:i32`, `high:i32`, then `high - low + 1` offsets (`i32`).
    Tableswitch = 0xaa, "tableswitch", fx(1, 0);

    Ireturn = 0xac, "ireturn", fx(1, 0);
    Freturn = 0xae, "freturn", fx(1, 0);
    Areturn = 0xb0, "areturn", fx(1, 0);
    Return = 0xb1, "return", fx(0, 0);

    /// Operands: `field_idx:u16`
    Getstatic = 0xb2, "getstatic", None;
    /// Operands: `field_idx:u16`
    Putstatic = 0xb3, "putstatic", None;
    /// Operands: `method_idx:u16`
    Invokevirtual = 0xb6, "invokevirtual", None;
    /// Operands: `method_idx:u16`
    Invokespecial = 0xb7, "invokespecial", None;
    /// Operands: `method_idx:u16`
    Invokestatic = 0xb8, "invokestatic", None;

    /// Operands: `class_idx:u16`
    New = 0xbb, "new", fx(0, 1);
    /// Operands: `atype:u8`
    Newarray = 0xbc, "newarray", fx(1, 1);
    /// Operands: `class_idx:u16`
    Anewarray = 0xbd, "anewarray", fx(1, 1);
    Arraylength = 0xbe, "arraylength", fx(1, 1);
    Athrow = 0xbf, "athrow", fx(1, 0);
    /// Operands: `class_idx:u16`
    Checkcast = 0xc0, "checkcast", fx(1, 1);
    /// Operands: `class_idx:u16`
    Instanceof = 0xc1, "instanceof", fx(1, 1);

    /// Prefix: the next load, store or `iinc` uses 16-bit operands.
    Wide = 0xc4, "wide", None;
    /// Operands: `offset:i16`
    Ifnull = 0xc6, "ifnull", fx(1, 0);
    /// Operands: `offset:i16`
    Ifnonnull = 0xc7, "ifnonnull", fx(1, 0);
    /// Operands: `offset:i32`
    GotoW = 0xc8, "goto_w", fx(0, 0);
}

impl Op {
    /// Conditional and unconditional branches with a relative offset operand.
    pub fn is_branch(self) -> bool {
        matches!(
            self,
            Op::Ifeq
                | Op::Ifne
                | Op::Iflt
                | Op::Ifge
                | Op::Ifgt
                | Op::Ifle
                | Op::IfIcmpeq
                | Op::IfIcmpne
                | Op::IfIcmplt
                | Op::IfIcmpge
                | Op::IfIcmpgt
                | Op::IfIcmple
                | Op::Ifnull
                | Op::Ifnonnull
                | Op::Goto
                | Op::GotoW
        )
    }

    /// Control never falls through to the next instruction.
    pub fn ends_block(self) -> bool {
        matches!(
            self,
            Op::Goto
                | Op::GotoW
                | Op::Tableswitch
                | Op::Ireturn
                | Op::Freturn
                | Op::Areturn
                | Op::Return
                | Op::Athrow
        )
    }

    /// The conditional branch taken exactly when `self` is not.
    pub fn inverse(self) -> Option<Op> {
        Some(match self {
            Op::Ifeq => Op::Ifne,
            Op::Ifne => Op::Ifeq,
            Op::Iflt => Op::Ifge,
            Op::Ifge => Op::Iflt,
            Op::Ifgt => Op::Ifle,
            Op::Ifle => Op::Ifgt,
            Op::IfIcmpeq => Op::IfIcmpne,
            Op::IfIcmpne => Op::IfIcmpeq,
            Op::IfIcmplt => Op::IfIcmpge,
            Op::IfIcmpge => Op::IfIcmplt,
            Op::IfIcmpgt => Op::IfIcmple,
            Op::IfIcmple => Op::IfIcmpgt,
            Op::Ifnull => Op::Ifnonnull,
            Op::Ifnonnull => Op::Ifnull,
            _ => return None,
        })
    }
}

/// `newarray` element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ArrayType {
    Char = 5,
    Float = 6,
    Int = 10,
}

impl ArrayType {
    pub fn name(self) -> &'static str {
        match self {
            ArrayType::Char => "char",
            ArrayType::Float => "float",
            ArrayType::Int => "int",
        }
    }
}

impl TryFrom<u8> for ArrayType {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        match byte {
            5 => Ok(ArrayType::Char),
            6 => Ok(ArrayType::Float),
            10 => Ok(ArrayType::Int),
            other => Err(other),
        }
    }
}
