//! String routines. BASIC strings are `char[]`; every routine returns a
//! fresh array and never mutates its arguments.
use classfile::SlotKind::{Float, Int, Reference};
use classfile::{ArrayType, Op};

use super::{Builtin, ILLEGAL_FUNCTION_CALL};
use crate::emit::Emitter;
use crate::error::Result;
use crate::jvm;
use crate::unit::RuntimeField;

/// Round float local `from` into int local `to`, raising `Illegal function
/// call` when the result is negative.
fn non_negative(em: &mut Emitter, from: u16, to: u16) -> Result<()> {
    let ok = em.create_label();
    em.load(Float, from);
    em.round()?;
    em.store(Int, to);
    em.load(Int, to);
    em.jump(Op::Ifge, ok);
    em.raise(ILLEGAL_FUNCTION_CALL)?;
    em.bind(ok)?;
    Ok(())
}

/// Lower int local `slot` to the value `limit` pushes, if it exceeds it.
fn at_most(em: &mut Emitter, slot: u16, limit: fn(&mut Emitter)) -> Result<()> {
    let ok = em.create_label();
    em.load(Int, slot);
    limit(em);
    em.jump(Op::IfIcmple, ok);
    limit(em);
    em.store(Int, slot);
    em.bind(ok)?;
    Ok(())
}

fn length_of_0(em: &mut Emitter) {
    em.load(Reference, 0);
    em.op(Op::Arraylength);
}

/// `Substring([CII)[C`: chars `start..end`, no clamping.
pub(super) fn substring(em: &mut Emitter) -> Result<()> {
    // local 3: I chars left to copy, local 4: [C result
    em.load(Int, 2);
    em.load(Int, 1);
    em.op(Op::Isub);
    em.store(Int, 3);

    em.load(Int, 3);
    em.newarray(ArrayType::Char);
    em.store(Reference, 4);

    let copy = em.create_label();
    let check = em.create_label();
    em.goto(check);

    em.bind(copy)?;
    em.iinc(3, -1);
    em.iinc(2, -1);
    em.load(Reference, 4);
    em.load(Int, 3);
    em.load(Reference, 0);
    em.load(Int, 2);
    em.op(Op::Caload);
    em.op(Op::Castore);

    em.bind(check)?;
    em.load(Int, 3);
    em.jump(Op::Ifgt, copy);

    em.load(Reference, 4);
    em.op(Op::Areturn);
    Ok(())
}

/// `Concat([C[C)[C`.
pub(super) fn concat(em: &mut Emitter) -> Result<()> {
    // local 2: [C result
    em.load(Reference, 0);
    em.op(Op::Arraylength);
    em.load(Reference, 1);
    em.op(Op::Arraylength);
    em.op(Op::Iadd);
    em.newarray(ArrayType::Char);
    em.store(Reference, 2);

    em.load(Reference, 0);
    em.op(Op::Iconst0);
    em.load(Reference, 2);
    em.op(Op::Iconst0);
    em.load(Reference, 0);
    em.op(Op::Arraylength);
    em.invoke_static(&jvm::arraycopy())?;

    em.load(Reference, 1);
    em.op(Op::Iconst0);
    em.load(Reference, 2);
    em.load(Reference, 0);
    em.op(Op::Arraylength);
    em.load(Reference, 1);
    em.op(Op::Arraylength);
    em.invoke_static(&jvm::arraycopy())?;

    em.load(Reference, 2);
    em.op(Op::Areturn);
    Ok(())
}

/// `CompareStrings([C[C)I`: -1, 0 or 1 by char code, a prefix sorting
/// first.
pub(super) fn compare(em: &mut Emitter) -> Result<()> {
    // local 2: I index, local 3: I common length, local 4: I difference
    let have_min = em.create_label();
    em.load(Reference, 0);
    em.op(Op::Arraylength);
    em.store(Int, 3);
    em.load(Reference, 1);
    em.op(Op::Arraylength);
    em.load(Int, 3);
    em.jump(Op::IfIcmpge, have_min);
    em.load(Reference, 1);
    em.op(Op::Arraylength);
    em.store(Int, 3);
    em.bind(have_min)?;

    let check = em.create_label();
    let tail = em.create_label();
    let sign = em.create_label();
    em.op(Op::Iconst0);
    em.store(Int, 2);
    em.bind(check)?;
    em.load(Int, 2);
    em.load(Int, 3);
    em.jump(Op::IfIcmpge, tail);
    em.load(Reference, 0);
    em.load(Int, 2);
    em.op(Op::Caload);
    em.load(Reference, 1);
    em.load(Int, 2);
    em.op(Op::Caload);
    em.op(Op::Isub);
    em.store(Int, 4);
    em.load(Int, 4);
    em.jump(Op::Ifne, sign);
    em.iinc(2, 1);
    em.goto(check);

    em.bind(tail)?;
    em.load(Reference, 0);
    em.op(Op::Arraylength);
    em.load(Reference, 1);
    em.op(Op::Arraylength);
    em.op(Op::Isub);
    em.store(Int, 4);

    let zero = em.create_label();
    let positive = em.create_label();
    em.bind(sign)?;
    em.load(Int, 4);
    em.jump(Op::Ifeq, zero);
    em.load(Int, 4);
    em.jump(Op::Ifgt, positive);
    em.op(Op::IconstM1);
    em.op(Op::Ireturn);
    em.bind(positive)?;
    em.op(Op::Iconst1);
    em.op(Op::Ireturn);
    em.bind(zero)?;
    em.op(Op::Iconst0);
    em.op(Op::Ireturn);
    Ok(())
}

/// `Left([CF)[C`.
pub(super) fn left(em: &mut Emitter) -> Result<()> {
    // local 2: I count
    non_negative(em, 1, 2)?;
    at_most(em, 2, length_of_0)?;
    em.load(Reference, 0);
    em.op(Op::Iconst0);
    em.load(Int, 2);
    em.call(Builtin::Substring)?;
    em.op(Op::Areturn);
    Ok(())
}

/// `Right([CF)[C`.
pub(super) fn right(em: &mut Emitter) -> Result<()> {
    // local 2: I count
    non_negative(em, 1, 2)?;
    at_most(em, 2, length_of_0)?;
    em.load(Reference, 0);
    length_of_0(em);
    em.load(Int, 2);
    em.op(Op::Isub);
    length_of_0(em);
    em.call(Builtin::Substring)?;
    em.op(Op::Areturn);
    Ok(())
}

/// `Mid([CFF)[C`: 1-based start, length clamped to the end.
pub(super) fn mid(em: &mut Emitter) -> Result<()> {
    // local 3: I start index, local 4: I count
    let start_ok = em.create_label();
    em.load(Float, 1);
    em.round()?;
    em.op(Op::Iconst1);
    em.op(Op::Isub);
    em.store(Int, 3);
    em.load(Int, 3);
    em.jump(Op::Ifge, start_ok);
    em.raise(ILLEGAL_FUNCTION_CALL)?;
    em.bind(start_ok)?;
    at_most(em, 3, length_of_0)?;

    non_negative(em, 2, 4)?;
    at_most(em, 4, |em| {
        em.load(Reference, 0);
        em.op(Op::Arraylength);
        em.load(Int, 3);
        em.op(Op::Isub);
    })?;

    em.load(Reference, 0);
    em.load(Int, 3);
    em.load(Int, 3);
    em.load(Int, 4);
    em.op(Op::Iadd);
    em.call(Builtin::Substring)?;
    em.op(Op::Areturn);
    Ok(())
}

/// `Instr(F[C[C)F`: 1-based position of the second string in the first,
/// searching from the given start, or 0.
pub(super) fn instr(em: &mut Emitter) -> Result<()> {
    // local 3: I candidate index, local 4: I matched chars
    let start_ok = em.create_label();
    em.load(Float, 0);
    em.round()?;
    em.op(Op::Iconst1);
    em.op(Op::Isub);
    em.store(Int, 3);
    em.load(Int, 3);
    em.jump(Op::Ifge, start_ok);
    em.raise(ILLEGAL_FUNCTION_CALL)?;
    em.bind(start_ok)?;

    let outer = em.create_label();
    let inner = em.create_label();
    let mismatch = em.create_label();
    let found = em.create_label();
    let not_found = em.create_label();

    em.bind(outer)?;
    em.load(Int, 3);
    em.load(Reference, 2);
    em.op(Op::Arraylength);
    em.op(Op::Iadd);
    em.load(Reference, 1);
    em.op(Op::Arraylength);
    em.jump(Op::IfIcmpgt, not_found);
    em.op(Op::Iconst0);
    em.store(Int, 4);

    em.bind(inner)?;
    em.load(Int, 4);
    em.load(Reference, 2);
    em.op(Op::Arraylength);
    em.jump(Op::IfIcmpge, found);
    em.load(Reference, 1);
    em.load(Int, 3);
    em.load(Int, 4);
    em.op(Op::Iadd);
    em.op(Op::Caload);
    em.load(Reference, 2);
    em.load(Int, 4);
    em.op(Op::Caload);
    em.jump(Op::IfIcmpne, mismatch);
    em.iinc(4, 1);
    em.goto(inner);

    em.bind(mismatch)?;
    em.iinc(3, 1);
    em.goto(outer);

    em.bind(found)?;
    em.load(Int, 3);
    em.op(Op::Iconst1);
    em.op(Op::Iadd);
    em.op(Op::I2f);
    em.op(Op::Freturn);

    em.bind(not_found)?;
    em.op(Op::Fconst0);
    em.op(Op::Freturn);
    Ok(())
}

/// `Chr(F)[C`: a one-char string for codes 0 to 255.
pub(super) fn chr(em: &mut Emitter) -> Result<()> {
    // local 1: I code
    let bad = em.create_label();
    em.load(Float, 0);
    em.round()?;
    em.store(Int, 1);
    em.load(Int, 1);
    em.jump(Op::Iflt, bad);
    em.load(Int, 1);
    em.push_int(255)?;
    em.jump(Op::IfIcmpgt, bad);

    em.op(Op::Iconst1);
    em.newarray(ArrayType::Char);
    em.op(Op::Dup);
    em.op(Op::Iconst0);
    em.load(Int, 1);
    em.op(Op::I2c);
    em.op(Op::Castore);
    em.op(Op::Areturn);

    em.bind(bad)?;
    em.raise(ILLEGAL_FUNCTION_CALL)
}

/// `Asc([C)F`: code of the first char. The empty string faults on the
/// array access, which the handler turns into a BASIC error.
pub(super) fn asc(em: &mut Emitter) -> Result<()> {
    let start = em.create_label();
    let end = em.create_label();
    let handler = em.create_label();

    em.bind(start)?;
    em.load(Reference, 0);
    em.op(Op::Iconst0);
    em.op(Op::Caload);
    em.op(Op::I2f);
    em.bind(end)?;
    em.op(Op::Freturn);

    em.catch(start, end, handler, Some(jvm::INDEX_OUT_OF_BOUNDS))?;
    em.bind(handler)?;
    em.op(Op::Pop);
    em.raise(ILLEGAL_FUNCTION_CALL)
}

/// `Space(F)[C`.
pub(super) fn space(em: &mut Emitter) -> Result<()> {
    em.load(Float, 0);
    em.chars(" ")?;
    em.call(Builtin::StringOf)?;
    em.op(Op::Areturn);
    Ok(())
}

/// `StringOf(F[C)[C`: the first char of the string, repeated.
pub(super) fn string_of(em: &mut Emitter) -> Result<()> {
    // local 2: I count, local 3: [C result, local 4: I char, local 5: I index
    non_negative(em, 0, 2)?;

    let have_char = em.create_label();
    em.load(Reference, 1);
    em.op(Op::Arraylength);
    em.jump(Op::Ifne, have_char);
    em.raise(ILLEGAL_FUNCTION_CALL)?;
    em.bind(have_char)?;
    em.load(Reference, 1);
    em.op(Op::Iconst0);
    em.op(Op::Caload);
    em.store(Int, 4);

    em.load(Int, 2);
    em.newarray(ArrayType::Char);
    em.store(Reference, 3);
    em.op(Op::Iconst0);
    em.store(Int, 5);

    let check = em.create_label();
    let done = em.create_label();
    em.bind(check)?;
    em.load(Int, 5);
    em.load(Int, 2);
    em.jump(Op::IfIcmpge, done);
    em.load(Reference, 3);
    em.load(Int, 5);
    em.load(Int, 4);
    em.op(Op::Castore);
    em.iinc(5, 1);
    em.goto(check);

    em.bind(done)?;
    em.load(Reference, 3);
    em.op(Op::Areturn);
    Ok(())
}

/// `Tab(F)[C`: spaces up to the 1-based print column, none if already past.
pub(super) fn tab(em: &mut Emitter) -> Result<()> {
    // local 1: I spaces
    let ok = em.create_label();
    em.load(Float, 0);
    em.round()?;
    em.op(Op::Iconst1);
    em.op(Op::Isub);
    em.get(RuntimeField::PrintColumn)?;
    em.op(Op::Isub);
    em.store(Int, 1);
    em.load(Int, 1);
    em.jump(Op::Ifge, ok);
    em.op(Op::Iconst0);
    em.store(Int, 1);

    em.bind(ok)?;
    em.load(Int, 1);
    em.op(Op::I2f);
    em.chars(" ")?;
    em.call(Builtin::StringOf)?;
    em.op(Op::Areturn);
    Ok(())
}

/// `Str(F)[C`: like PRINT, a leading space for non-negative numbers.
pub(super) fn str(em: &mut Emitter) -> Result<()> {
    // local 1: [C digits
    em.load(Float, 0);
    em.call(Builtin::FloatToChars)?;
    em.store(Reference, 1);

    let non_negative = em.create_label();
    em.load(Float, 0);
    em.op(Op::Fconst0);
    em.op(Op::Fcmpl);
    em.jump(Op::Ifge, non_negative);
    em.load(Reference, 1);
    em.op(Op::Areturn);

    em.bind(non_negative)?;
    em.chars(" ")?;
    em.load(Reference, 1);
    em.call(Builtin::Concat)?;
    em.op(Op::Areturn);
    Ok(())
}

/// `FloatToChars(F)[C`: integral values without a fraction, everything else
/// as `Float.toString`.
pub(super) fn float_to_chars(em: &mut Emitter) -> Result<()> {
    // local 1: I truncated value
    let fraction = em.create_label();
    em.load(Float, 0);
    em.op(Op::F2i);
    em.store(Int, 1);
    em.load(Int, 1);
    em.op(Op::I2f);
    em.load(Float, 0);
    em.op(Op::Fcmpl);
    em.jump(Op::Ifne, fraction);
    em.load(Int, 1);
    em.invoke_static(&jvm::int_to_string())?;
    em.invoke_virtual(&jvm::to_char_array())?;
    em.op(Op::Areturn);

    em.bind(fraction)?;
    em.load(Float, 0);
    em.invoke_static(&jvm::float_to_string())?;
    em.invoke_virtual(&jvm::to_char_array())?;
    em.op(Op::Areturn);
    Ok(())
}

/// `Val([C)F`: the number the string spells, 0 when it is not one.
pub(super) fn val(em: &mut Emitter) -> Result<()> {
    let start = em.create_label();
    let end = em.create_label();
    let handler = em.create_label();

    em.bind(start)?;
    em.string_from_local(0)?;
    em.invoke_virtual(&jvm::trim())?;
    em.invoke_static(&jvm::parse_float())?;
    em.bind(end)?;
    em.op(Op::Freturn);

    em.catch(start, end, handler, Some(jvm::NUMBER_FORMAT))?;
    em.bind(handler)?;
    em.op(Op::Pop);
    em.op(Op::Fconst0);
    em.op(Op::Freturn);
    Ok(())
}

/// `Trim([C)[C`: without leading and trailing blanks.
pub(super) fn trim(em: &mut Emitter) -> Result<()> {
    em.string_from_local(0)?;
    em.invoke_virtual(&jvm::trim())?;
    em.invoke_virtual(&jvm::to_char_array())?;
    em.op(Op::Areturn);
    Ok(())
}

/// `NewStringArray(I)[[C`: `n` empty strings.
pub(super) fn new_string_array(em: &mut Emitter) -> Result<()> {
    // local 1: [[C result, local 2: I index
    em.load(Int, 0);
    em.new_ref_array("[C")?;
    em.store(Reference, 1);
    em.op(Op::Iconst0);
    em.store(Int, 2);

    let check = em.create_label();
    let done = em.create_label();
    em.bind(check)?;
    em.load(Int, 2);
    em.load(Int, 0);
    em.jump(Op::IfIcmpge, done);
    em.load(Reference, 1);
    em.load(Int, 2);
    em.op(Op::Iconst0);
    em.newarray(ArrayType::Char);
    em.op(Op::Aastore);
    em.iinc(2, 1);
    em.goto(check);

    em.bind(done)?;
    em.load(Reference, 1);
    em.op(Op::Areturn);
    Ok(())
}
