use std::ops::{Deref, DerefMut};

use crate::builder::{BytecodeBuilder, Label};
use crate::descriptor::{field_slots, method_slots};
use crate::error::ClassFileError;
use crate::method::MethodBody;
use crate::op::Op;
use crate::pool::{ConstantPool, MemberRef};

/// A [`BytecodeBuilder`] paired with the class's constant pool.
///
/// Instructions with pool operands take symbolic arguments here (strings,
/// [`MemberRef`]s) and intern them on the way; everything else is reached
/// through `Deref` to the builder.
pub struct Assembler<'p> {
    code: BytecodeBuilder,
    pool: &'p mut ConstantPool,
}

impl<'p> Assembler<'p> {
    pub fn new(pool: &'p mut ConstantPool, param_slots: u16) -> Self {
        Self {
            code: BytecodeBuilder::with_params(param_slots),
            pool,
        }
    }

    pub fn pool(&mut self) -> &mut ConstantPool {
        &mut *self.pool
    }

    /// Push an int, falling back to an `Integer` constant beyond 16 bits.
    pub fn push_int(&mut self, value: i32) -> Result<(), ClassFileError> {
        match i16::try_from(value) {
            Ok(small) => self.code.push_small(small),
            Err(_) => {
                let idx = self.pool.integer(value)?;
                self.code.ldc(idx);
            }
        }
        Ok(())
    }

    /// Push a float, using `fconst_<n>` for positive 0, 1 and 2.
    pub fn push_float(&mut self, value: f32) -> Result<(), ClassFileError> {
        let short = match value.to_bits() {
            bits if bits == 0.0f32.to_bits() => Some(Op::Fconst0),
            bits if bits == 1.0f32.to_bits() => Some(Op::Fconst1),
            bits if bits == 2.0f32.to_bits() => Some(Op::Fconst2),
            _ => None,
        };
        match short {
            Some(op) => self.code.op(op),
            None => {
                let idx = self.pool.float(value)?;
                self.code.ldc(idx);
            }
        }
        Ok(())
    }

    /// Push a `java/lang/String` constant.
    pub fn push_string(&mut self, text: &str) -> Result<(), ClassFileError> {
        let idx = self.pool.string(text)?;
        self.code.ldc(idx);
        Ok(())
    }

    pub fn get_static(&mut self, field: &MemberRef) -> Result<(), ClassFileError> {
        let slots = field_slots(&field.descriptor)?;
        let idx = self.pool.field(field)?;
        self.code.field(Op::Getstatic, idx, slots);
        Ok(())
    }

    pub fn put_static(&mut self, field: &MemberRef) -> Result<(), ClassFileError> {
        let slots = field_slots(&field.descriptor)?;
        let idx = self.pool.field(field)?;
        self.code.field(Op::Putstatic, idx, slots);
        Ok(())
    }

    fn invoke(&mut self, op: Op, method: &MemberRef) -> Result<(), ClassFileError> {
        let (args, ret) = method_slots(&method.descriptor)?;
        let idx = self.pool.method(method)?;
        self.code.invoke(op, idx, args, ret);
        Ok(())
    }

    pub fn invoke_static(&mut self, method: &MemberRef) -> Result<(), ClassFileError> {
        self.invoke(Op::Invokestatic, method)
    }

    pub fn invoke_virtual(&mut self, method: &MemberRef) -> Result<(), ClassFileError> {
        self.invoke(Op::Invokevirtual, method)
    }

    pub fn invoke_special(&mut self, method: &MemberRef) -> Result<(), ClassFileError> {
        self.invoke(Op::Invokespecial, method)
    }

    fn class_op(&mut self, op: Op, class: &str) -> Result<(), ClassFileError> {
        let idx = self.pool.class(class)?;
        self.code.class_op(op, idx);
        Ok(())
    }

    /// `new <class>`; the instance still needs `dup` + `<init>`.
    pub fn new_object(&mut self, class: &str) -> Result<(), ClassFileError> {
        self.class_op(Op::New, class)
    }

    /// `anewarray` with element class `class` (e.g. `[C` for `char[][]`).
    pub fn new_ref_array(&mut self, class: &str) -> Result<(), ClassFileError> {
        self.class_op(Op::Anewarray, class)
    }

    pub fn instance_of(&mut self, class: &str) -> Result<(), ClassFileError> {
        self.class_op(Op::Instanceof, class)
    }

    /// Exception region over `[start, end)` catching `class`, or anything
    /// when `None`.
    pub fn catch(
        &mut self,
        start: Label,
        end: Label,
        handler: Label,
        class: Option<&str>,
    ) -> Result<(), ClassFileError> {
        let catch_type = match class {
            Some(class) => self.pool.class(class)?,
            None => 0,
        };
        self.code.catch(start, end, handler, catch_type);
        Ok(())
    }

    /// Finish the code and wrap it as a method.
    pub fn finish(
        self,
        access: u16,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Result<MethodBody, ClassFileError> {
        let name = name.into();
        let code = self.code.finish()?;
        log::debug!(
            "method {name}: {} bytes, max_stack {}, max_locals {}",
            code.bytes.len(),
            code.max_stack,
            code.max_locals
        );
        Ok(MethodBody {
            access,
            name,
            descriptor: descriptor.into(),
            code,
        })
    }
}

impl Deref for Assembler<'_> {
    type Target = BytecodeBuilder;

    fn deref(&self) -> &BytecodeBuilder {
        &self.code
    }
}

impl DerefMut for Assembler<'_> {
    fn deref_mut(&mut self) -> &mut BytecodeBuilder {
        &mut self.code
    }
}
