//! Arithmetic guards, array indexing and numeric functions.
use classfile::Op;
use classfile::SlotKind::{Float, Int, Reference};

use super::{Builtin, SUBSCRIPT_OUT_OF_RANGE};
use crate::emit::Emitter;
use crate::error::Result;
use crate::jvm;
use crate::unit::RuntimeField;

/// `DivisionByZero(F)F`: report the error and return infinity carrying the
/// numerator's sign. Zero, negative zero and NaN count as non-negative.
pub(super) fn division_by_zero(em: &mut Emitter) -> Result<()> {
    em.print_text("Division by zero")?;
    em.call(Builtin::PrintNewline)?;

    em.op(Op::Fconst1);
    em.op(Op::Fconst0);
    em.op(Op::Fdiv);

    let exit = em.create_label();
    em.load(Float, 0);
    em.op(Op::Fconst0);
    em.op(Op::Fcmpg);
    em.jump(Op::Ifge, exit);
    em.op(Op::Fneg);

    em.bind(exit)?;
    em.op(Op::Freturn);
    Ok(())
}

/// `Divide(FF)F`.
pub(super) fn divide(em: &mut Emitter) -> Result<()> {
    let nonzero = em.create_label();
    em.load(Float, 1);
    em.op(Op::Fconst0);
    em.op(Op::Fcmpl);
    em.jump(Op::Ifne, nonzero);
    em.load(Float, 0);
    em.call(Builtin::DivisionByZero)?;
    em.op(Op::Freturn);

    em.bind(nonzero)?;
    em.load(Float, 0);
    em.load(Float, 1);
    em.op(Op::Fdiv);
    em.op(Op::Freturn);
    Ok(())
}

/// Both operands rounded to int, then `op`. A zero divisor goes through
/// `DivisionByZero` with the rounded numerator.
fn integer_op(em: &mut Emitter, op: Op) -> Result<()> {
    // local 2: I numerator, local 3: I divisor
    em.load(Float, 0);
    em.round()?;
    em.store(Int, 2);
    em.load(Float, 1);
    em.round()?;
    em.store(Int, 3);

    let nonzero = em.create_label();
    em.load(Int, 3);
    em.jump(Op::Ifne, nonzero);
    em.load(Int, 2);
    em.op(Op::I2f);
    em.call(Builtin::DivisionByZero)?;
    em.op(Op::Freturn);

    em.bind(nonzero)?;
    em.load(Int, 2);
    em.load(Int, 3);
    em.op(op);
    em.op(Op::I2f);
    em.op(Op::Freturn);
    Ok(())
}

/// `IntegerDivide(FF)F`, the `\` operator.
pub(super) fn integer_divide(em: &mut Emitter) -> Result<()> {
    integer_op(em, Op::Idiv)
}

/// `Modulo(FF)F`, the `MOD` operator.
pub(super) fn modulo(em: &mut Emitter) -> Result<()> {
    integer_op(em, Op::Irem)
}

/// `CheckIndex(I[IIF)I`: fold subscript `k` into a row-major offset.
///
/// Takes the offset so far, the dimension sizes, `k` and the subscript;
/// returns `offset * dims[k] + round(subscript)`.
pub(super) fn check_index(em: &mut Emitter) -> Result<()> {
    // local 4: I rounded subscript
    let bad = em.create_label();
    em.load(Float, 3);
    em.round()?;
    em.store(Int, 4);
    em.load(Int, 4);
    em.jump(Op::Iflt, bad);
    em.load(Int, 4);
    em.load(Reference, 1);
    em.load(Int, 2);
    em.op(Op::Iaload);
    em.jump(Op::IfIcmpge, bad);

    em.load(Int, 0);
    em.load(Reference, 1);
    em.load(Int, 2);
    em.op(Op::Iaload);
    em.op(Op::Imul);
    em.load(Int, 4);
    em.op(Op::Iadd);
    em.op(Op::Ireturn);

    em.bind(bad)?;
    em.raise(SUBSCRIPT_OUT_OF_RANGE)
}

/// `ArraySize([I)I`: product of the dimension sizes.
pub(super) fn array_size(em: &mut Emitter) -> Result<()> {
    // local 1: I product, local 2: I index
    em.op(Op::Iconst1);
    em.store(Int, 1);
    em.op(Op::Iconst0);
    em.store(Int, 2);

    let check = em.create_label();
    let done = em.create_label();
    em.bind(check)?;
    em.load(Int, 2);
    em.load(Reference, 0);
    em.op(Op::Arraylength);
    em.jump(Op::IfIcmpge, done);
    em.load(Int, 1);
    em.load(Reference, 0);
    em.load(Int, 2);
    em.op(Op::Iaload);
    em.op(Op::Imul);
    em.store(Int, 1);
    em.iinc(2, 1);
    em.goto(check);

    em.bind(done)?;
    em.load(Int, 1);
    em.op(Op::Ireturn);
    Ok(())
}

/// `Sgn(F)F`: -1, 0 or 1.
pub(super) fn sgn(em: &mut Emitter) -> Result<()> {
    em.load(Float, 0);
    em.op(Op::Fconst0);
    em.op(Op::Fcmpl);
    em.op(Op::I2f);
    em.op(Op::Freturn);
    Ok(())
}

/// `Fix(F)F`: truncate toward zero.
pub(super) fn fix(em: &mut Emitter) -> Result<()> {
    let non_negative = em.create_label();
    em.load(Float, 0);
    em.op(Op::Fconst0);
    em.op(Op::Fcmpg);
    em.jump(Op::Ifge, non_negative);
    em.load(Float, 0);
    em.op(Op::F2d);
    em.invoke_static(&jvm::math("ceil", "(D)D"))?;
    em.op(Op::D2f);
    em.op(Op::Freturn);

    em.bind(non_negative)?;
    em.load(Float, 0);
    em.op(Op::F2d);
    em.invoke_static(&jvm::math("floor", "(D)D"))?;
    em.op(Op::D2f);
    em.op(Op::Freturn);
    Ok(())
}

/// `Rnd(F)F`: a new number in `[0, 1)`, or the previous one for `RND(0)`.
pub(super) fn rnd(em: &mut Emitter) -> Result<()> {
    let repeat = em.create_label();
    em.load(Float, 0);
    em.op(Op::Fconst0);
    em.op(Op::Fcmpl);
    em.jump(Op::Ifeq, repeat);
    em.invoke_static(&jvm::math("random", "()D"))?;
    em.op(Op::D2f);
    em.put(RuntimeField::LastRandom)?;

    em.bind(repeat)?;
    em.get(RuntimeField::LastRandom)?;
    em.op(Op::Freturn);
    Ok(())
}
