use std::ops::{Deref, DerefMut};

use classfile::{Assembler, MethodBody, Op};

use crate::error::Result;
use crate::jvm;
use crate::library::Builtin;
use crate::unit::{RuntimeField, Unit};

/// An [`Assembler`] for one method together with the class it belongs to.
///
/// Calls to builtins and runtime fields go through here so they are
/// registered and declared as they are emitted.
pub(crate) struct Emitter<'p, 'u> {
    asm: Assembler<'p>,
    pub unit: &'u mut Unit,
}

impl<'p, 'u> Emitter<'p, 'u> {
    pub fn new(asm: Assembler<'p>, unit: &'u mut Unit) -> Self {
        Self { asm, unit }
    }

    pub fn call(&mut self, builtin: Builtin) -> Result<()> {
        let method = self.unit.builtin(builtin);
        self.asm.invoke_static(&method)?;
        Ok(())
    }

    pub fn get(&mut self, field: RuntimeField) -> Result<()> {
        let field = self.unit.runtime(field);
        self.asm.get_static(&field)?;
        Ok(())
    }

    pub fn put(&mut self, field: RuntimeField) -> Result<()> {
        let field = self.unit.runtime(field);
        self.asm.put_static(&field)?;
        Ok(())
    }

    /// `Math.round(F)I` on the float on top of the stack.
    pub fn round(&mut self) -> Result<()> {
        self.asm.invoke_static(&jvm::round())?;
        Ok(())
    }

    /// Push a fresh `char[]` holding `text`.
    pub fn chars(&mut self, text: &str) -> Result<()> {
        self.asm.push_string(text)?;
        self.asm.invoke_virtual(&jvm::to_char_array())?;
        Ok(())
    }

    pub fn print_text(&mut self, text: &str) -> Result<()> {
        self.chars(text)?;
        self.call(Builtin::PrintChars)
    }

    /// Throw a BASIC runtime error carrying `message`.
    pub fn raise(&mut self, message: &str) -> Result<()> {
        self.chars(message)?;
        self.call(Builtin::RaiseError)?;
        self.asm.op(Op::Athrow);
        Ok(())
    }

    /// Push `new String(<char[] in local slot>)`.
    pub fn string_from_local(&mut self, slot: u16) -> Result<()> {
        self.asm.new_object(jvm::STRING)?;
        self.asm.op(Op::Dup);
        self.asm.load(classfile::SlotKind::Reference, slot);
        self.asm.invoke_special(&jvm::string_from_chars())?;
        Ok(())
    }

    pub fn finish(self, access: u16, name: &str, descriptor: &str) -> Result<MethodBody> {
        Ok(self.asm.finish(access, name, descriptor)?)
    }
}

impl<'p> Deref for Emitter<'p, '_> {
    type Target = Assembler<'p>;

    fn deref(&self) -> &Assembler<'p> {
        &self.asm
    }
}

impl<'p> DerefMut for Emitter<'p, '_> {
    fn deref_mut(&mut self) -> &mut Assembler<'p> {
        &mut self.asm
    }
}
