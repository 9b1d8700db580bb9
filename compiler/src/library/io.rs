//! Console I/O, DATA access, the GOSUB stack and runtime errors.
use classfile::Op;
use classfile::SlotKind::{Float, Int, Reference};

use super::{Builtin, ILLEGAL_FUNCTION_CALL, SUBSCRIPT_OUT_OF_RANGE};
use crate::emit::Emitter;
use crate::error::Result;
use crate::jvm;
use crate::unit::RuntimeField;

/// Width of a PRINT zone.
const ZONE_WIDTH: i32 = 14;
/// Nesting limit of GOSUB.
const GOSUB_LIMIT: i32 = 1000;

/// `PrintChars([C)V`: print and advance the column.
pub(super) fn print_chars(em: &mut Emitter) -> Result<()> {
    em.get_static(&jvm::system_out())?;
    em.load(Reference, 0);
    em.invoke_virtual(&jvm::print_chars())?;

    em.get(RuntimeField::PrintColumn)?;
    em.load(Reference, 0);
    em.op(Op::Arraylength);
    em.op(Op::Iadd);
    em.put(RuntimeField::PrintColumn)?;
    em.op(Op::Return);
    Ok(())
}

/// `PrintNewline()V`.
pub(super) fn print_newline(em: &mut Emitter) -> Result<()> {
    em.get_static(&jvm::system_out())?;
    em.push_int(i32::from(b'\n'))?;
    em.invoke_virtual(&jvm::print_char())?;
    em.op(Op::Iconst0);
    em.put(RuntimeField::PrintColumn)?;
    em.op(Op::Return);
    Ok(())
}

/// `PrintFloat(F)V`: a space before non-negative numbers, one after every
/// number.
pub(super) fn print_float(em: &mut Emitter) -> Result<()> {
    let digits = em.create_label();
    em.load(Float, 0);
    em.op(Op::Fconst0);
    em.op(Op::Fcmpl);
    em.jump(Op::Iflt, digits);
    em.print_text(" ")?;

    em.bind(digits)?;
    em.load(Float, 0);
    em.call(Builtin::FloatToChars)?;
    em.call(Builtin::PrintChars)?;
    em.print_text(" ")?;
    em.op(Op::Return);
    Ok(())
}

/// `PrintComma()V`: pad to the start of the next zone.
pub(super) fn print_comma(em: &mut Emitter) -> Result<()> {
    em.push_int(ZONE_WIDTH)?;
    em.get(RuntimeField::PrintColumn)?;
    em.push_int(ZONE_WIDTH)?;
    em.op(Op::Irem);
    em.op(Op::Isub);
    em.op(Op::I2f);
    em.chars(" ")?;
    em.call(Builtin::StringOf)?;
    em.call(Builtin::PrintChars)?;
    em.op(Op::Return);
    Ok(())
}

/// `FreshLine()V`: newline unless at column 0.
pub(super) fn fresh_line(em: &mut Emitter) -> Result<()> {
    let done = em.create_label();
    em.get(RuntimeField::PrintColumn)?;
    em.jump(Op::Ifeq, done);
    em.call(Builtin::PrintNewline)?;
    em.bind(done)?;
    em.op(Op::Return);
    Ok(())
}

/// `ReadLine()[C`: next line of standard input. The user's Enter puts the
/// cursor back at column 0.
pub(super) fn read_line(em: &mut Emitter) -> Result<()> {
    // local 0: String line
    let open = em.create_label();
    em.get(RuntimeField::Stdin)?;
    em.jump(Op::Ifnonnull, open);
    em.new_object(jvm::BUFFERED_READER)?;
    em.op(Op::Dup);
    em.new_object(jvm::INPUT_STREAM_READER)?;
    em.op(Op::Dup);
    em.get_static(&jvm::system_in())?;
    em.invoke_special(&jvm::input_stream_reader_init())?;
    em.invoke_special(&jvm::buffered_reader_init())?;
    em.put(RuntimeField::Stdin)?;

    let got = em.create_label();
    em.bind(open)?;
    em.get(RuntimeField::Stdin)?;
    em.invoke_virtual(&jvm::read_line())?;
    em.store(Reference, 0);
    em.load(Reference, 0);
    em.jump(Op::Ifnonnull, got);
    em.raise("Input past end")?;

    em.bind(got)?;
    em.load(Reference, 0);
    em.invoke_virtual(&jvm::to_char_array())?;
    em.op(Op::Iconst0);
    em.put(RuntimeField::PrintColumn)?;
    em.op(Op::Areturn);
    Ok(())
}

/// Store field `local 3` of the result: the trimmed chars between `local 5`
/// and `local 4`.
fn store_field(em: &mut Emitter) -> Result<()> {
    em.load(Reference, 2);
    em.load(Int, 3);
    em.load(Reference, 1);
    em.load(Int, 5);
    em.load(Int, 4);
    em.call(Builtin::Substring)?;
    em.call(Builtin::Trim)?;
    em.op(Op::Aastore);
    Ok(())
}

/// `InputFields(I)[[C`: read a line of exactly `n` comma-separated fields,
/// asking again until the count matches.
pub(super) fn input_fields(em: &mut Emitter) -> Result<()> {
    // local 1: [C line, local 2: [[C fields, local 3: I count or field index,
    // local 4: I char index, local 5: I field start
    let comma = i32::from(b',');
    let retry = em.create_label();
    em.bind(retry)?;
    em.get_static(&jvm::system_out())?;
    em.invoke_virtual(&jvm::flush())?;
    em.call(Builtin::ReadLine)?;
    em.store(Reference, 1);

    let count = em.create_label();
    let skip = em.create_label();
    let counted = em.create_label();
    em.op(Op::Iconst1);
    em.store(Int, 3);
    em.op(Op::Iconst0);
    em.store(Int, 4);
    em.bind(count)?;
    em.load(Int, 4);
    em.load(Reference, 1);
    em.op(Op::Arraylength);
    em.jump(Op::IfIcmpge, counted);
    em.load(Reference, 1);
    em.load(Int, 4);
    em.op(Op::Caload);
    em.push_int(comma)?;
    em.jump(Op::IfIcmpne, skip);
    em.iinc(3, 1);
    em.bind(skip)?;
    em.iinc(4, 1);
    em.goto(count);

    let split = em.create_label();
    em.bind(counted)?;
    em.load(Int, 3);
    em.load(Int, 0);
    em.jump(Op::IfIcmpeq, split);
    em.print_text("?Redo from start")?;
    em.call(Builtin::PrintNewline)?;
    em.print_text("? ")?;
    em.goto(retry);

    em.bind(split)?;
    em.load(Int, 0);
    em.new_ref_array("[C")?;
    em.store(Reference, 2);
    em.op(Op::Iconst0);
    em.store(Int, 3);
    em.op(Op::Iconst0);
    em.store(Int, 5);
    em.op(Op::Iconst0);
    em.store(Int, 4);

    let scan = em.create_label();
    let next = em.create_label();
    let last = em.create_label();
    em.bind(scan)?;
    em.load(Int, 4);
    em.load(Reference, 1);
    em.op(Op::Arraylength);
    em.jump(Op::IfIcmpeq, last);
    em.load(Reference, 1);
    em.load(Int, 4);
    em.op(Op::Caload);
    em.push_int(comma)?;
    em.jump(Op::IfIcmpne, next);
    store_field(em)?;
    em.iinc(3, 1);
    em.load(Int, 4);
    em.op(Op::Iconst1);
    em.op(Op::Iadd);
    em.store(Int, 5);
    em.bind(next)?;
    em.iinc(4, 1);
    em.goto(scan);

    em.bind(last)?;
    store_field(em)?;
    em.load(Reference, 2);
    em.op(Op::Areturn);
    Ok(())
}

/// `ReadData()[C`: the next DATA item.
pub(super) fn read_data(em: &mut Emitter) -> Result<()> {
    let ok = em.create_label();
    em.get(RuntimeField::DataCursor)?;
    em.get(RuntimeField::DataTable)?;
    em.op(Op::Arraylength);
    em.jump(Op::IfIcmplt, ok);
    em.raise("Out of DATA")?;

    em.bind(ok)?;
    em.get(RuntimeField::DataTable)?;
    em.get(RuntimeField::DataCursor)?;
    em.op(Op::Dup);
    em.op(Op::Iconst1);
    em.op(Op::Iadd);
    em.put(RuntimeField::DataCursor)?;
    em.op(Op::Aaload);
    em.op(Op::Areturn);
    Ok(())
}

/// `GosubPush(I)V`: remember a return-site id.
pub(super) fn gosub_push(em: &mut Emitter) -> Result<()> {
    let allocated = em.create_label();
    em.get(RuntimeField::GosubStack)?;
    em.jump(Op::Ifnonnull, allocated);
    em.push_int(GOSUB_LIMIT)?;
    em.newarray(classfile::ArrayType::Int);
    em.put(RuntimeField::GosubStack)?;

    let room = em.create_label();
    em.bind(allocated)?;
    em.get(RuntimeField::GosubDepth)?;
    em.push_int(GOSUB_LIMIT)?;
    em.jump(Op::IfIcmplt, room);
    em.raise("Out of memory")?;

    em.bind(room)?;
    em.get(RuntimeField::GosubStack)?;
    em.get(RuntimeField::GosubDepth)?;
    em.load(Int, 0);
    em.op(Op::Iastore);
    em.get(RuntimeField::GosubDepth)?;
    em.op(Op::Iconst1);
    em.op(Op::Iadd);
    em.put(RuntimeField::GosubDepth)?;
    em.op(Op::Return);
    Ok(())
}

/// `GosubPop()I`: the most recent return-site id.
pub(super) fn gosub_pop(em: &mut Emitter) -> Result<()> {
    let ok = em.create_label();
    em.get(RuntimeField::GosubDepth)?;
    em.jump(Op::Ifgt, ok);
    em.raise("RETURN without GOSUB")?;

    em.bind(ok)?;
    em.get(RuntimeField::GosubDepth)?;
    em.op(Op::Iconst1);
    em.op(Op::Isub);
    em.put(RuntimeField::GosubDepth)?;
    em.get(RuntimeField::GosubStack)?;
    em.get(RuntimeField::GosubDepth)?;
    em.op(Op::Iaload);
    em.op(Op::Ireturn);
    Ok(())
}

/// `RaiseError([C)Ljava/lang/RuntimeException;`: the exception for a BASIC
/// error message. Callers throw it.
pub(super) fn raise_error(em: &mut Emitter) -> Result<()> {
    em.new_object(jvm::RUNTIME_EXCEPTION)?;
    em.op(Op::Dup);
    em.string_from_local(0)?;
    em.invoke_special(&jvm::runtime_exception_init())?;
    em.op(Op::Areturn);
    Ok(())
}

/// `ReportError(Ljava/lang/Throwable;)V`: print the BASIC message for an
/// exception that escaped the program.
pub(super) fn report_error(em: &mut Emitter) -> Result<()> {
    // local 1: [C message
    let print = em.create_label();
    let not_index = em.create_label();
    let not_size = em.create_label();

    em.load(Reference, 0);
    em.instance_of(jvm::INDEX_OUT_OF_BOUNDS)?;
    em.jump(Op::Ifeq, not_index);
    em.push_string(SUBSCRIPT_OUT_OF_RANGE)?;
    em.goto(print);

    em.bind(not_index)?;
    em.load(Reference, 0);
    em.instance_of(jvm::NEGATIVE_ARRAY_SIZE)?;
    em.jump(Op::Ifeq, not_size);
    em.push_string(ILLEGAL_FUNCTION_CALL)?;
    em.goto(print);

    em.bind(not_size)?;
    em.load(Reference, 0);
    em.invoke_virtual(&jvm::get_message())?;
    em.op(Op::Dup);
    em.jump(Op::Ifnonnull, print);
    em.op(Op::Pop);
    em.push_string("Internal error")?;

    em.bind(print)?;
    em.invoke_virtual(&jvm::to_char_array())?;
    em.store(Reference, 1);
    em.call(Builtin::FreshLine)?;
    em.load(Reference, 1);
    em.call(Builtin::PrintChars)?;
    em.call(Builtin::PrintNewline)?;
    em.op(Op::Return);
    Ok(())
}
