use classfile::Op;
use parser::ast::{BinaryOp, Expr, Function, UnaryOp, Variable};

use super::Lower;
use crate::error::{CompileError, Result};
use crate::jvm;
use crate::library::Builtin;
use crate::unit::Ty;

pub(super) fn type_mismatch() -> CompileError {
    CompileError::new("Type mismatch")
}

impl Lower<'_, '_, '_> {
    /// Push the value of `expr` and return its type.
    pub(super) fn expr(&mut self, expr: &Expr) -> Result<Ty> {
        match expr {
            Expr::Number { value, .. } => {
                self.em.push_float(*value)?;
                Ok(Ty::Num)
            }
            Expr::Text(text) => {
                self.em.chars(text)?;
                Ok(Ty::Str)
            }
            Expr::Var(var) => self.load(var),
            Expr::Paren(inner) => self.expr(inner),
            Expr::Unary { op, operand } => {
                self.num(operand)?;
                match op {
                    UnaryOp::Neg => self.em.op(Op::Fneg),
                    UnaryOp::Not => {
                        self.em.round()?;
                        self.em.op(Op::IconstM1);
                        self.em.op(Op::Ixor);
                        self.em.op(Op::I2f);
                    }
                }
                Ok(Ty::Num)
            }
            Expr::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs),
            Expr::Call { function, args } => self.call(*function, args),
            Expr::FnCall { name, args } => self.fn_call(name, args),
        }
    }

    pub(super) fn expect(&mut self, expr: &Expr, ty: Ty) -> Result<()> {
        if self.expr(expr)? == ty {
            Ok(())
        } else {
            Err(type_mismatch())
        }
    }

    pub(super) fn num(&mut self, expr: &Expr) -> Result<()> {
        self.expect(expr, Ty::Num)
    }

    pub(super) fn string(&mut self, expr: &Expr) -> Result<()> {
        self.expect(expr, Ty::Str)
    }

    fn param(&self, name: &str) -> Option<u16> {
        self.params
            .iter()
            .find(|(param, _)| param == name)
            .map(|&(_, slot)| slot)
    }

    /// Push the element array and the checked row-major index of `var`.
    fn element(&mut self, var: &Variable) -> Result<()> {
        let (data, dims) = self.em.unit.array(&var.name);
        self.em.get_static(&data)?;
        self.em.op(Op::Iconst0);
        for (k, subscript) in (0i32..).zip(&var.subscripts) {
            self.em.get_static(&dims)?;
            self.em.push_int(k)?;
            self.num(subscript)?;
            self.em.call(Builtin::CheckIndex)?;
        }
        Ok(())
    }

    pub(super) fn load(&mut self, var: &Variable) -> Result<Ty> {
        let ty = Ty::of_name(&var.name);
        if var.is_array() {
            self.element(var)?;
            self.em.op(match ty {
                Ty::Num => Op::Faload,
                Ty::Str => Op::Aaload,
            });
        } else if let Some(slot) = self.param(&var.name) {
            self.em.load(ty.slot(), slot);
        } else {
            let field = self.em.unit.scalar(&var.name);
            self.em.get_static(&field)?;
        }
        Ok(ty)
    }

    /// Assign the value pushed by `value` to `var`.
    pub(super) fn store(
        &mut self,
        var: &Variable,
        value: impl FnOnce(&mut Self) -> Result<Ty>,
    ) -> Result<()> {
        let ty = Ty::of_name(&var.name);
        if var.is_array() {
            self.element(var)?;
            if value(self)? != ty {
                return Err(type_mismatch());
            }
            self.em.op(match ty {
                Ty::Num => Op::Fastore,
                Ty::Str => Op::Aastore,
            });
        } else {
            if value(self)? != ty {
                return Err(type_mismatch());
            }
            let field = self.em.unit.scalar(&var.name);
            self.em.put_static(&field)?;
        }
        Ok(())
    }

    fn binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Ty> {
        let ty = self.expr(lhs)?;
        match op {
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => {
                self.expect(rhs, ty)?;
                self.compare(op, ty)?;
            }
            BinaryOp::Add if ty == Ty::Str => {
                self.string(rhs)?;
                self.em.call(Builtin::Concat)?;
                return Ok(Ty::Str);
            }
            _ if ty != Ty::Num => return Err(type_mismatch()),
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
                self.em.round()?;
                self.num(rhs)?;
                self.em.round()?;
                self.em.op(match op {
                    BinaryOp::And => Op::Iand,
                    BinaryOp::Or => Op::Ior,
                    _ => Op::Ixor,
                });
                self.em.op(Op::I2f);
            }
            BinaryOp::Pow => {
                self.em.op(Op::F2d);
                self.num(rhs)?;
                self.em.op(Op::F2d);
                self.em.invoke_static(&jvm::math("pow", "(DD)D"))?;
                self.em.op(Op::D2f);
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => {
                self.num(rhs)?;
                self.em.op(match op {
                    BinaryOp::Add => Op::Fadd,
                    BinaryOp::Sub => Op::Fsub,
                    _ => Op::Fmul,
                });
            }
            BinaryOp::Div | BinaryOp::IntDiv | BinaryOp::Mod => {
                self.num(rhs)?;
                self.em.call(match op {
                    BinaryOp::Div => Builtin::Divide,
                    BinaryOp::IntDiv => Builtin::IntegerDivide,
                    _ => Builtin::Modulo,
                })?;
            }
        }
        Ok(Ty::Num)
    }

    /// Turn two pushed operands into -1 or 0. NaN compares false except
    /// under `<>`.
    fn compare(&mut self, op: BinaryOp, ty: Ty) -> Result<()> {
        match ty {
            Ty::Str => self.em.call(Builtin::CompareStrings)?,
            Ty::Num if matches!(op, BinaryOp::Lt | BinaryOp::Le) => self.em.op(Op::Fcmpg),
            Ty::Num => self.em.op(Op::Fcmpl),
        }
        let branch = match op {
            BinaryOp::Eq => Op::Ifeq,
            BinaryOp::Ne => Op::Ifne,
            BinaryOp::Lt => Op::Iflt,
            BinaryOp::Le => Op::Ifle,
            BinaryOp::Gt => Op::Ifgt,
            _ => Op::Ifge,
        };

        let truth = self.em.create_label();
        let done = self.em.create_label();
        self.em.jump(branch, truth);
        self.em.op(Op::Fconst0);
        self.em.goto(done);
        self.em.bind(truth)?;
        self.em.push_float(-1.0)?;
        self.em.bind(done)?;
        Ok(())
    }

    fn call(&mut self, function: Function, args: &[Expr]) -> Result<Ty> {
        if args.len() != function.full_arity() {
            return Err(CompileError::new(format!(
                "wrong number of arguments to {}",
                function.name()
            )));
        }
        let double = |l: &mut Self, name: &str| -> Result<Ty> {
            l.num(&args[0])?;
            l.em.op(Op::F2d);
            l.em.invoke_static(&jvm::math(name, "(D)D"))?;
            l.em.op(Op::D2f);
            Ok(Ty::Num)
        };
        let unary = |l: &mut Self, arg: Ty, builtin: Builtin, result: Ty| -> Result<Ty> {
            l.expect(&args[0], arg)?;
            l.em.call(builtin)?;
            Ok(result)
        };

        match function {
            Function::Abs => {
                self.num(&args[0])?;
                self.em.invoke_static(&jvm::math("abs", "(F)F"))?;
                Ok(Ty::Num)
            }
            Function::Atn => double(self, "atan"),
            Function::Cos => double(self, "cos"),
            Function::Exp => double(self, "exp"),
            Function::Int => double(self, "floor"),
            Function::Log => double(self, "log"),
            Function::Sin => double(self, "sin"),
            Function::Sqr => double(self, "sqrt"),
            Function::Tan => double(self, "tan"),
            Function::Fix => unary(self, Ty::Num, Builtin::Fix, Ty::Num),
            Function::Rnd => unary(self, Ty::Num, Builtin::Rnd, Ty::Num),
            Function::Sgn => unary(self, Ty::Num, Builtin::Sgn, Ty::Num),
            Function::Asc => unary(self, Ty::Str, Builtin::Asc, Ty::Num),
            Function::Val => unary(self, Ty::Str, Builtin::Val, Ty::Num),
            Function::Chr => unary(self, Ty::Num, Builtin::Chr, Ty::Str),
            Function::Space | Function::Spc => unary(self, Ty::Num, Builtin::Space, Ty::Str),
            Function::Str => unary(self, Ty::Num, Builtin::Str, Ty::Str),
            Function::Tab => unary(self, Ty::Num, Builtin::Tab, Ty::Str),
            Function::Len => {
                self.string(&args[0])?;
                self.em.op(Op::Arraylength);
                self.em.op(Op::I2f);
                Ok(Ty::Num)
            }
            Function::Left | Function::Right => {
                self.string(&args[0])?;
                self.num(&args[1])?;
                self.em.call(if function == Function::Left {
                    Builtin::Left
                } else {
                    Builtin::Right
                })?;
                Ok(Ty::Str)
            }
            Function::Mid => {
                self.string(&args[0])?;
                self.num(&args[1])?;
                self.num(&args[2])?;
                self.em.call(Builtin::Mid)?;
                Ok(Ty::Str)
            }
            Function::Instr => {
                self.num(&args[0])?;
                self.string(&args[1])?;
                self.string(&args[2])?;
                self.em.call(Builtin::Instr)?;
                Ok(Ty::Num)
            }
            Function::StringOf => {
                self.num(&args[0])?;
                if self.expr(&args[1])? == Ty::Num {
                    self.em.call(Builtin::Chr)?;
                }
                self.em.call(Builtin::StringOf)?;
                Ok(Ty::Str)
            }
        }
    }

    fn fn_call(&mut self, name: &str, args: &[Expr]) -> Result<Ty> {
        let info = self.info;
        let def = info
            .functions
            .get(name)
            .ok_or_else(|| CompileError::new(format!("Undefined user function {name}")))?;
        if def.params.len() != args.len() {
            return Err(CompileError::new(format!(
                "wrong number of arguments to {name}"
            )));
        }
        for (param, arg) in def.params.iter().zip(args) {
            self.expect(arg, Ty::of_name(param))?;
        }
        let method = self.em.unit.member(name, &def.descriptor(name));
        self.em.invoke_static(&method)?;
        Ok(Ty::of_name(name))
    }
}
