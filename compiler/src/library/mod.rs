//! Runtime support routines, hand-assembled into private static methods of
//! the generated class.
//!
//! A routine is emitted only when something calls it. Routines call each
//! other, so generation runs until no newly registered routine is left.
mod io;
mod numeric;
mod strings;

use classfile::{
    ACC_PRIVATE, ACC_STATIC, Assembler, ConstantPool, MethodBody, method_slots,
};
use log::{debug, trace};

use crate::emit::Emitter;
use crate::error::Result;
use crate::unit::Unit;

/// Message for bad arguments to string and numeric functions.
pub(crate) const ILLEGAL_FUNCTION_CALL: &str = "Illegal function call";
pub(crate) const SUBSCRIPT_OUT_OF_RANGE: &str = "Subscript out of range";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    // numeric
    DivisionByZero,
    Divide,
    IntegerDivide,
    Modulo,
    CheckIndex,
    ArraySize,
    Sgn,
    Fix,
    Rnd,
    // strings
    Substring,
    Concat,
    CompareStrings,
    Left,
    Right,
    Mid,
    Instr,
    Chr,
    Asc,
    Space,
    StringOf,
    Tab,
    Str,
    FloatToChars,
    Val,
    Trim,
    NewStringArray,
    // I/O and control
    PrintChars,
    PrintFloat,
    PrintNewline,
    PrintComma,
    FreshLine,
    ReadLine,
    InputFields,
    ReadData,
    GosubPush,
    GosubPop,
    RaiseError,
    ReportError,
}

impl Builtin {
    pub const ALL: [Builtin; 38] = [
        Builtin::DivisionByZero,
        Builtin::Divide,
        Builtin::IntegerDivide,
        Builtin::Modulo,
        Builtin::CheckIndex,
        Builtin::ArraySize,
        Builtin::Sgn,
        Builtin::Fix,
        Builtin::Rnd,
        Builtin::Substring,
        Builtin::Concat,
        Builtin::CompareStrings,
        Builtin::Left,
        Builtin::Right,
        Builtin::Mid,
        Builtin::Instr,
        Builtin::Chr,
        Builtin::Asc,
        Builtin::Space,
        Builtin::StringOf,
        Builtin::Tab,
        Builtin::Str,
        Builtin::FloatToChars,
        Builtin::Val,
        Builtin::Trim,
        Builtin::NewStringArray,
        Builtin::PrintChars,
        Builtin::PrintFloat,
        Builtin::PrintNewline,
        Builtin::PrintComma,
        Builtin::FreshLine,
        Builtin::ReadLine,
        Builtin::InputFields,
        Builtin::ReadData,
        Builtin::GosubPush,
        Builtin::GosubPop,
        Builtin::RaiseError,
        Builtin::ReportError,
    ];

    /// Method name in the generated class.
    pub fn name(self) -> &'static str {
        match self {
            Builtin::DivisionByZero => "DivisionByZero",
            Builtin::Divide => "Divide",
            Builtin::IntegerDivide => "IntegerDivide",
            Builtin::Modulo => "Modulo",
            Builtin::CheckIndex => "CheckIndex",
            Builtin::ArraySize => "ArraySize",
            Builtin::Sgn => "Sgn",
            Builtin::Fix => "Fix",
            Builtin::Rnd => "Rnd",
            Builtin::Substring => "Substring",
            Builtin::Concat => "Concat",
            Builtin::CompareStrings => "CompareStrings",
            Builtin::Left => "Left",
            Builtin::Right => "Right",
            Builtin::Mid => "Mid",
            Builtin::Instr => "Instr",
            Builtin::Chr => "Chr",
            Builtin::Asc => "Asc",
            Builtin::Space => "Space",
            Builtin::StringOf => "StringOf",
            Builtin::Tab => "Tab",
            Builtin::Str => "Str",
            Builtin::FloatToChars => "FloatToChars",
            Builtin::Val => "Val",
            Builtin::Trim => "Trim",
            Builtin::NewStringArray => "NewStringArray",
            Builtin::PrintChars => "PrintChars",
            Builtin::PrintFloat => "PrintFloat",
            Builtin::PrintNewline => "PrintNewline",
            Builtin::PrintComma => "PrintComma",
            Builtin::FreshLine => "FreshLine",
            Builtin::ReadLine => "ReadLine",
            Builtin::InputFields => "InputFields",
            Builtin::ReadData => "ReadData",
            Builtin::GosubPush => "GosubPush",
            Builtin::GosubPop => "GosubPop",
            Builtin::RaiseError => "RaiseError",
            Builtin::ReportError => "ReportError",
        }
    }

    pub fn descriptor(self) -> &'static str {
        match self {
            Builtin::DivisionByZero | Builtin::Sgn | Builtin::Fix | Builtin::Rnd => "(F)F",
            Builtin::Divide | Builtin::IntegerDivide | Builtin::Modulo => "(FF)F",
            Builtin::CheckIndex => "(I[IIF)I",
            Builtin::ArraySize => "([I)I",
            Builtin::Substring => "([CII)[C",
            Builtin::Concat => "([C[C)[C",
            Builtin::CompareStrings => "([C[C)I",
            Builtin::Left | Builtin::Right => "([CF)[C",
            Builtin::Mid => "([CFF)[C",
            Builtin::Instr => "(F[C[C)F",
            Builtin::Chr
            | Builtin::Space
            | Builtin::Tab
            | Builtin::Str
            | Builtin::FloatToChars => "(F)[C",
            Builtin::Asc | Builtin::Val => "([C)F",
            Builtin::StringOf => "(F[C)[C",
            Builtin::Trim => "([C)[C",
            Builtin::NewStringArray | Builtin::InputFields => "(I)[[C",
            Builtin::PrintChars => "([C)V",
            Builtin::PrintFloat => "(F)V",
            Builtin::PrintNewline | Builtin::PrintComma | Builtin::FreshLine => "()V",
            Builtin::ReadLine | Builtin::ReadData => "()[C",
            Builtin::GosubPush => "(I)V",
            Builtin::GosubPop => "()I",
            Builtin::RaiseError => "([C)Ljava/lang/RuntimeException;",
            Builtin::ReportError => "(Ljava/lang/Throwable;)V",
        }
    }

    fn emit(self, em: &mut Emitter) -> Result<()> {
        match self {
            Builtin::DivisionByZero => numeric::division_by_zero(em),
            Builtin::Divide => numeric::divide(em),
            Builtin::IntegerDivide => numeric::integer_divide(em),
            Builtin::Modulo => numeric::modulo(em),
            Builtin::CheckIndex => numeric::check_index(em),
            Builtin::ArraySize => numeric::array_size(em),
            Builtin::Sgn => numeric::sgn(em),
            Builtin::Fix => numeric::fix(em),
            Builtin::Rnd => numeric::rnd(em),
            Builtin::Substring => strings::substring(em),
            Builtin::Concat => strings::concat(em),
            Builtin::CompareStrings => strings::compare(em),
            Builtin::Left => strings::left(em),
            Builtin::Right => strings::right(em),
            Builtin::Mid => strings::mid(em),
            Builtin::Instr => strings::instr(em),
            Builtin::Chr => strings::chr(em),
            Builtin::Asc => strings::asc(em),
            Builtin::Space => strings::space(em),
            Builtin::StringOf => strings::string_of(em),
            Builtin::Tab => strings::tab(em),
            Builtin::Str => strings::str(em),
            Builtin::FloatToChars => strings::float_to_chars(em),
            Builtin::Val => strings::val(em),
            Builtin::Trim => strings::trim(em),
            Builtin::NewStringArray => strings::new_string_array(em),
            Builtin::PrintChars => io::print_chars(em),
            Builtin::PrintFloat => io::print_float(em),
            Builtin::PrintNewline => io::print_newline(em),
            Builtin::PrintComma => io::print_comma(em),
            Builtin::FreshLine => io::fresh_line(em),
            Builtin::ReadLine => io::read_line(em),
            Builtin::InputFields => io::input_fields(em),
            Builtin::ReadData => io::read_data(em),
            Builtin::GosubPush => io::gosub_push(em),
            Builtin::GosubPop => io::gosub_pop(em),
            Builtin::RaiseError => io::raise_error(em),
            Builtin::ReportError => io::report_error(em),
        }
    }
}

/// Builtins registered by one compile, in registration order.
#[derive(Debug, Default)]
pub struct Library {
    registered: Vec<Builtin>,
    generated: usize,
}

impl Library {
    /// Returns `false` when `builtin` was already registered.
    pub fn register(&mut self, builtin: Builtin) -> bool {
        if self.registered.contains(&builtin) {
            return false;
        }
        trace!("registered builtin {}", builtin.name());
        self.registered.push(builtin);
        true
    }

    pub fn registered(&self) -> &[Builtin] {
        &self.registered
    }

    fn next_pending(&mut self) -> Option<Builtin> {
        let builtin = self.registered.get(self.generated).copied()?;
        self.generated += 1;
        Some(builtin)
    }
}

/// Emit every registered builtin, including those registered while
/// emitting others.
pub(crate) fn generate(pool: &mut ConstantPool, unit: &mut Unit) -> Result<Vec<MethodBody>> {
    let mut methods = Vec::new();
    while let Some(builtin) = unit.library.next_pending() {
        let (params, _) = method_slots(builtin.descriptor())?;
        let mut em = Emitter::new(Assembler::new(pool, params), unit);
        builtin.emit(&mut em)?;
        methods.push(em.finish(ACC_PRIVATE | ACC_STATIC, builtin.name(), builtin.descriptor())?);
    }
    debug!("generated {} library methods", methods.len());
    Ok(methods)
}
