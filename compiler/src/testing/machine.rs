use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use classfile::{ArrayType, ClassImage, ExceptionEntry, Instruction, Op, decode_all};

use super::natives;

const STEP_LIMIT: usize = 2_000_000;
const CALL_DEPTH_LIMIT: usize = 256;

pub(super) const ARITHMETIC: &str = "java/lang/ArithmeticException";
pub(super) const INDEX_OUT_OF_BOUNDS: &str = "java/lang/ArrayIndexOutOfBoundsException";
pub(super) const NEGATIVE_ARRAY_SIZE: &str = "java/lang/NegativeArraySizeException";
pub(super) const NULL_POINTER: &str = "java/lang/NullPointerException";
pub(super) const NUMBER_FORMAT: &str = "java/lang/NumberFormatException";

pub(super) type ObjectRef = Rc<RefCell<Object>>;

#[derive(Debug, Clone)]
pub(super) enum Value {
    Int(i32),
    Float(f32),
    /// One stack entry, although the JVM counts two slots.
    Double(f64),
    Null,
    Ref(ObjectRef),
}

impl Value {
    pub fn new(object: Object) -> Value {
        Value::Ref(Rc::new(RefCell::new(object)))
    }

    pub fn int(self) -> Result<i32, Fault> {
        match self {
            Value::Int(v) => Ok(v),
            other => Err(Fault::halt(format!("expected int, found {other:?}"))),
        }
    }

    pub fn float(self) -> Result<f32, Fault> {
        match self {
            Value::Float(v) => Ok(v),
            other => Err(Fault::halt(format!("expected float, found {other:?}"))),
        }
    }

    pub fn double(self) -> Result<f64, Fault> {
        match self {
            Value::Double(v) => Ok(v),
            other => Err(Fault::halt(format!("expected double, found {other:?}"))),
        }
    }

    /// The referenced object, `None` for null.
    pub fn object(self) -> Result<Option<ObjectRef>, Fault> {
        match self {
            Value::Null => Ok(None),
            Value::Ref(object) => Ok(Some(object)),
            other => Err(Fault::halt(format!("expected reference, found {other:?}"))),
        }
    }

    /// The referenced object, throwing `NullPointerException` for null.
    pub fn non_null(self) -> Result<ObjectRef, Fault> {
        self.object()?.ok_or_else(|| Fault::throw(NULL_POINTER, None))
    }
}

#[derive(Debug)]
pub(super) enum Object {
    Chars(Vec<u16>),
    Floats(Vec<f32>),
    Ints(Vec<i32>),
    Refs(Vec<Value>),
    /// `java/lang/String`.
    Str(Vec<u16>),
    PrintStream,
    InputStream,
    InputStreamReader,
    BufferedReader,
    Throwable {
        class: String,
        message: Option<String>,
    },
    /// Allocated by `new`, waiting for `<init>`.
    Uninit(String),
}

impl Object {
    pub fn class(&self) -> &str {
        match self {
            Object::Chars(_) => "[C",
            Object::Floats(_) => "[F",
            Object::Ints(_) => "[I",
            Object::Refs(_) => "[Ljava/lang/Object;",
            Object::Str(_) => "java/lang/String",
            Object::PrintStream => "java/io/PrintStream",
            Object::InputStream => "java/io/InputStream",
            Object::InputStreamReader => "java/io/InputStreamReader",
            Object::BufferedReader => "java/io/BufferedReader",
            Object::Throwable { class, .. } | Object::Uninit(class) => class,
        }
    }
}

/// Why execution left a method abnormally.
#[derive(Debug)]
pub(super) enum Fault {
    /// A Java exception in flight.
    Throw(Value),
    /// The code did something the interpreter rejects.
    Halt(String),
}

impl Fault {
    pub fn halt(message: impl Into<String>) -> Fault {
        Fault::Halt(message.into())
    }

    pub fn throw(class: &str, message: Option<String>) -> Fault {
        Fault::Throw(Value::new(Object::Throwable {
            class: class.to_string(),
            message,
        }))
    }
}

/// Whether `class` is `target` or one of its subclasses.
pub(super) fn is_subclass(class: &str, target: &str) -> bool {
    let mut current = Some(class);
    while let Some(class) = current {
        if class == target {
            return true;
        }
        current = match class {
            ARITHMETIC | NEGATIVE_ARRAY_SIZE | NULL_POINTER => Some("java/lang/RuntimeException"),
            INDEX_OUT_OF_BOUNDS => Some("java/lang/IndexOutOfBoundsException"),
            NUMBER_FORMAT => Some("java/lang/IllegalArgumentException"),
            "java/lang/IndexOutOfBoundsException" | "java/lang/IllegalArgumentException" => {
                Some("java/lang/RuntimeException")
            }
            "java/lang/RuntimeException" => Some("java/lang/Exception"),
            "java/lang/Exception" => Some("java/lang/Throwable"),
            "java/lang/Throwable" => Some("java/lang/Object"),
            _ => None,
        };
    }
    false
}

struct Method {
    code: Vec<(usize, Instruction)>,
    index: HashMap<usize, usize>,
    exceptions: Vec<ExceptionEntry>,
    max_locals: u16,
}

impl Method {
    fn at(&self, offset: usize) -> Result<usize, Fault> {
        self.index
            .get(&offset)
            .copied()
            .ok_or_else(|| Fault::halt(format!("no instruction at offset {offset}")))
    }
}

enum Flow {
    Next,
    Jump(usize),
    Return(Option<Value>),
}

pub(super) struct Machine {
    image: ClassImage,
    methods: HashMap<String, Rc<Method>>,
    statics: HashMap<String, Value>,
    pub output: String,
    pub input: VecDeque<String>,
    pub random: u64,
    steps: usize,
    depth: usize,
}

impl Machine {
    pub fn new(image: ClassImage, input: &[&str]) -> Machine {
        let methods = image
            .methods
            .iter()
            .filter_map(|m| {
                let code = m.code.as_ref()?;
                let decoded = decode_all(&code.bytes).expect("generated code decodes");
                let index = decoded
                    .iter()
                    .enumerate()
                    .map(|(i, (at, _))| (*at, i))
                    .collect();
                let method = Method {
                    code: decoded,
                    index,
                    exceptions: code.exception_table.clone(),
                    max_locals: code.max_locals,
                };
                Some((m.name.clone(), Rc::new(method)))
            })
            .collect();
        let statics = image
            .fields
            .iter()
            .map(|f| {
                let value = match f.descriptor.as_str() {
                    "F" => Value::Float(0.0),
                    "I" => Value::Int(0),
                    _ => Value::Null,
                };
                (f.name.clone(), value)
            })
            .collect();
        Machine {
            image,
            methods,
            statics,
            output: String::new(),
            input: input.iter().map(|line| line.to_string()).collect(),
            random: 0x2545_F491_4F6C_DD1D,
            steps: 0,
            depth: 0,
        }
    }

    /// Run a method of the loaded class.
    pub fn invoke(&mut self, name: &str, args: Vec<Value>) -> Result<Option<Value>, Fault> {
        let method = self
            .methods
            .get(name)
            .cloned()
            .ok_or_else(|| Fault::halt(format!("no method {name}")))?;
        if self.depth == CALL_DEPTH_LIMIT {
            return Err(Fault::halt("call depth limit"));
        }
        self.depth += 1;
        let result = self.execute(&method, args);
        self.depth -= 1;
        result
    }

    fn execute(&mut self, method: &Method, args: Vec<Value>) -> Result<Option<Value>, Fault> {
        let mut locals = vec![Value::Null; usize::from(method.max_locals).max(args.len())];
        for (slot, arg) in args.into_iter().enumerate() {
            locals[slot] = arg;
        }
        let mut stack = Vec::new();
        let mut pc = 0;
        loop {
            self.steps += 1;
            if self.steps > STEP_LIMIT {
                return Err(Fault::halt("step limit"));
            }
            let (at, insn) = method
                .code
                .get(pc)
                .ok_or_else(|| Fault::halt("fell off the end of the code"))?;
            match self.step(*at, insn, &mut stack, &mut locals) {
                Ok(Flow::Next) => pc += 1,
                Ok(Flow::Jump(target)) => pc = method.at(target)?,
                Ok(Flow::Return(value)) => return Ok(value),
                Err(Fault::Throw(exception)) => {
                    let handler = self.handler(method, *at, &exception)?;
                    match handler {
                        Some(target) => {
                            stack.clear();
                            stack.push(exception);
                            pc = method.at(target)?;
                        }
                        None => return Err(Fault::Throw(exception)),
                    }
                }
                Err(halt) => return Err(halt),
            }
        }
    }

    fn handler(&self, method: &Method, at: usize, exception: &Value) -> Result<Option<usize>, Fault> {
        let Value::Ref(object) = exception else {
            return Err(Fault::halt("thrown value is not an object"));
        };
        let class = object.borrow().class().to_string();
        for entry in &method.exceptions {
            let covered = usize::from(entry.start_pc) <= at && at < usize::from(entry.end_pc);
            let caught = entry.catch_type == 0
                || self
                    .image
                    .class_name(entry.catch_type)
                    .is_some_and(|target| is_subclass(&class, target));
            if covered && caught {
                return Ok(Some(usize::from(entry.handler_pc)));
            }
        }
        Ok(None)
    }

    fn step(
        &mut self,
        at: usize,
        insn: &Instruction,
        stack: &mut Vec<Value>,
        locals: &mut [Value],
    ) -> Result<Flow, Fault> {
        match insn {
            Instruction::Simple(op) => return self.simple(*op, stack),
            Instruction::Push(value) => stack.push(Value::Int(*value)),
            Instruction::Ldc(idx) => {
                let value = match self.image.constant(*idx) {
                    Some(classfile::Constant::Integer(v)) => Value::Int(*v),
                    Some(classfile::Constant::Float(bits)) => Value::Float(f32::from_bits(*bits)),
                    Some(classfile::Constant::String { utf8 }) => {
                        let text = self.image.utf8(*utf8).unwrap_or_default();
                        Value::new(Object::Str(text.encode_utf16().collect()))
                    }
                    other => return Err(Fault::halt(format!("ldc of {other:?}"))),
                };
                stack.push(value);
            }
            Instruction::Load(_, slot) => {
                let value = locals
                    .get(usize::from(*slot))
                    .cloned()
                    .ok_or_else(|| Fault::halt(format!("load from slot {slot}")))?;
                stack.push(value);
            }
            Instruction::Store(_, slot) => {
                let value = pop(stack)?;
                let local = locals
                    .get_mut(usize::from(*slot))
                    .ok_or_else(|| Fault::halt(format!("store to slot {slot}")))?;
                *local = value;
            }
            Instruction::Iinc { slot, delta } => {
                let local = locals
                    .get_mut(usize::from(*slot))
                    .ok_or_else(|| Fault::halt(format!("iinc of slot {slot}")))?;
                let value = local.clone().int()?;
                *local = Value::Int(value.wrapping_add(i32::from(*delta)));
            }
            Instruction::Branch { op, offset } => {
                let target = (at as i64 + i64::from(*offset)) as usize;
                if branch_taken(*op, stack)? {
                    return Ok(Flow::Jump(target));
                }
            }
            Instruction::TableSwitch {
                default,
                low,
                offsets,
            } => {
                let key = pop(stack)?.int()?;
                let relative = usize::try_from(i64::from(key) - i64::from(*low))
                    .ok()
                    .and_then(|i| offsets.get(i))
                    .unwrap_or(default);
                return Ok(Flow::Jump((at as i64 + i64::from(*relative)) as usize));
            }
            Instruction::Field { op, idx } => {
                let field = self.member(*idx)?;
                match (op, field.class.as_str()) {
                    (Op::Getstatic, "java/lang/System") => stack.push(match field.name.as_str() {
                        "out" => Value::new(Object::PrintStream),
                        _ => Value::new(Object::InputStream),
                    }),
                    (Op::Getstatic, _) => {
                        let value = self
                            .statics
                            .get(&field.name)
                            .cloned()
                            .ok_or_else(|| Fault::halt(format!("undeclared field {}", field.name)))?;
                        stack.push(value);
                    }
                    _ => {
                        let value = pop(stack)?;
                        self.statics.insert(field.name, value);
                    }
                }
            }
            Instruction::Invoke { op, idx } => {
                let method = self.member(*idx)?;
                let count = param_count(&method.descriptor);
                if stack.len() < count {
                    return Err(Fault::halt("stack underflow in call"));
                }
                let args = stack.split_off(stack.len() - count);
                let result = if *op == Op::Invokestatic && method.class == self.image.this_class {
                    self.invoke(&method.name, args)?
                } else {
                    let receiver = match op {
                        Op::Invokestatic => None,
                        _ => Some(pop(stack)?.non_null()?),
                    };
                    natives::call(self, &method, receiver, args)?
                };
                if let Some(value) = result {
                    stack.push(value);
                }
            }
            Instruction::Class { op, idx } => {
                let class = self
                    .image
                    .class_name(*idx)
                    .ok_or_else(|| Fault::halt(format!("bad class index {idx}")))?
                    .to_string();
                match op {
                    Op::New => stack.push(Value::new(Object::Uninit(class))),
                    Op::Anewarray => {
                        let length = array_length(pop(stack)?.int()?)?;
                        stack.push(Value::new(Object::Refs(vec![Value::Null; length])));
                    }
                    Op::Instanceof => {
                        let is = match pop(stack)?.object()? {
                            Some(object) => is_subclass(object.borrow().class(), &class),
                            None => false,
                        };
                        stack.push(Value::Int(i32::from(is)));
                    }
                    other => return Err(Fault::halt(format!("unsupported {other:?}"))),
                }
            }
            Instruction::NewArray(ty) => {
                let length = array_length(pop(stack)?.int()?)?;
                let array = match ty {
                    ArrayType::Char => Object::Chars(vec![0; length]),
                    ArrayType::Float => Object::Floats(vec![0.0; length]),
                    ArrayType::Int => Object::Ints(vec![0; length]),
                };
                stack.push(Value::new(array));
            }
        }
        Ok(Flow::Next)
    }

    fn member(&self, idx: u16) -> Result<classfile::MemberRef, Fault> {
        self.image
            .member(idx)
            .ok_or_else(|| Fault::halt(format!("bad member index {idx}")))
    }

    fn simple(&mut self, op: Op, stack: &mut Vec<Value>) -> Result<Flow, Fault> {
        match op {
            Op::Nop => {}
            Op::Fconst0 => stack.push(Value::Float(0.0)),
            Op::Fconst1 => stack.push(Value::Float(1.0)),
            Op::Fconst2 => stack.push(Value::Float(2.0)),
            Op::Iaload | Op::Faload | Op::Aaload | Op::Caload => {
                let index = pop(stack)?.int()?;
                let array = pop(stack)?.non_null()?;
                let value = array_load(&array.borrow(), index)?;
                stack.push(value);
            }
            Op::Iastore | Op::Fastore | Op::Aastore | Op::Castore => {
                let value = pop(stack)?;
                let index = pop(stack)?.int()?;
                let array = pop(stack)?.non_null()?;
                array_store(&mut array.borrow_mut(), index, value)?;
            }
            Op::Pop => {
                pop(stack)?;
            }
            Op::Dup => {
                let top = stack.last().cloned().ok_or_else(|| Fault::halt("dup on empty stack"))?;
                stack.push(top);
            }
            Op::Swap => {
                let a = pop(stack)?;
                let b = pop(stack)?;
                stack.push(a);
                stack.push(b);
            }
            Op::Iadd | Op::Isub | Op::Imul | Op::Idiv | Op::Irem | Op::Iand | Op::Ior
            | Op::Ixor => {
                let b = pop(stack)?.int()?;
                let a = pop(stack)?.int()?;
                if matches!(op, Op::Idiv | Op::Irem) && b == 0 {
                    return Err(Fault::throw(ARITHMETIC, Some("/ by zero".into())));
                }
                stack.push(Value::Int(match op {
                    Op::Iadd => a.wrapping_add(b),
                    Op::Isub => a.wrapping_sub(b),
                    Op::Imul => a.wrapping_mul(b),
                    Op::Idiv => a.wrapping_div(b),
                    Op::Irem => a.wrapping_rem(b),
                    Op::Iand => a & b,
                    Op::Ior => a | b,
                    _ => a ^ b,
                }));
            }
            Op::Fadd | Op::Fsub | Op::Fmul | Op::Fdiv | Op::Frem => {
                let b = pop(stack)?.float()?;
                let a = pop(stack)?.float()?;
                stack.push(Value::Float(match op {
                    Op::Fadd => a + b,
                    Op::Fsub => a - b,
                    Op::Fmul => a * b,
                    Op::Fdiv => a / b,
                    _ => a % b,
                }));
            }
            Op::Ineg => {
                let a = pop(stack)?.int()?;
                stack.push(Value::Int(a.wrapping_neg()));
            }
            Op::Fneg => {
                let a = pop(stack)?.float()?;
                stack.push(Value::Float(-a));
            }
            Op::I2f => {
                let a = pop(stack)?.int()?;
                stack.push(Value::Float(a as f32));
            }
            Op::I2d => {
                let a = pop(stack)?.int()?;
                stack.push(Value::Double(f64::from(a)));
            }
            Op::I2c => {
                let a = pop(stack)?.int()?;
                stack.push(Value::Int(i32::from(a as u16)));
            }
            Op::F2i => {
                let a = pop(stack)?.float()?;
                stack.push(Value::Int(a as i32));
            }
            Op::F2d => {
                let a = pop(stack)?.float()?;
                stack.push(Value::Double(f64::from(a)));
            }
            Op::D2i => {
                let a = pop(stack)?.double()?;
                stack.push(Value::Int(a as i32));
            }
            Op::D2f => {
                let a = pop(stack)?.double()?;
                stack.push(Value::Float(a as f32));
            }
            Op::Fcmpl | Op::Fcmpg => {
                let b = pop(stack)?.float()?;
                let a = pop(stack)?.float()?;
                let result = match a.partial_cmp(&b) {
                    Some(ordering) => ordering as i32,
                    None if op == Op::Fcmpg => 1,
                    None => -1,
                };
                stack.push(Value::Int(result));
            }
            Op::Ireturn | Op::Freturn | Op::Areturn => {
                return Ok(Flow::Return(Some(pop(stack)?)));
            }
            Op::Return => return Ok(Flow::Return(None)),
            Op::Arraylength => {
                let array = pop(stack)?.non_null()?;
                let length = match &*array.borrow() {
                    Object::Chars(v) => v.len(),
                    Object::Floats(v) => v.len(),
                    Object::Ints(v) => v.len(),
                    Object::Refs(v) => v.len(),
                    other => return Err(Fault::halt(format!("arraylength of {other:?}"))),
                };
                stack.push(Value::Int(length as i32));
            }
            Op::Athrow => {
                let exception = pop(stack)?.non_null()?;
                return Err(Fault::Throw(Value::Ref(exception)));
            }
            other => return Err(Fault::halt(format!("unsupported {}", other.mnemonic()))),
        }
        Ok(Flow::Next)
    }
}

pub(super) fn pop(stack: &mut Vec<Value>) -> Result<Value, Fault> {
    stack.pop().ok_or_else(|| Fault::halt("stack underflow"))
}

fn branch_taken(op: Op, stack: &mut Vec<Value>) -> Result<bool, Fault> {
    Ok(match op {
        Op::Goto | Op::GotoW => true,
        Op::Ifeq | Op::Ifne | Op::Iflt | Op::Ifge | Op::Ifgt | Op::Ifle => {
            let a = pop(stack)?.int()?;
            match op {
                Op::Ifeq => a == 0,
                Op::Ifne => a != 0,
                Op::Iflt => a < 0,
                Op::Ifge => a >= 0,
                Op::Ifgt => a > 0,
                _ => a <= 0,
            }
        }
        Op::IfIcmpeq | Op::IfIcmpne | Op::IfIcmplt | Op::IfIcmpge | Op::IfIcmpgt
        | Op::IfIcmple => {
            let b = pop(stack)?.int()?;
            let a = pop(stack)?.int()?;
            match op {
                Op::IfIcmpeq => a == b,
                Op::IfIcmpne => a != b,
                Op::IfIcmplt => a < b,
                Op::IfIcmpge => a >= b,
                Op::IfIcmpgt => a > b,
                _ => a <= b,
            }
        }
        Op::Ifnull | Op::Ifnonnull => {
            let is_null = pop(stack)?.object()?.is_none();
            is_null == (op == Op::Ifnull)
        }
        other => return Err(Fault::halt(format!("unsupported branch {}", other.mnemonic()))),
    })
}

fn array_length(length: i32) -> Result<usize, Fault> {
    usize::try_from(length)
        .map_err(|_| Fault::throw(NEGATIVE_ARRAY_SIZE, Some(length.to_string())))
}

fn out_of_bounds(index: i32) -> Fault {
    Fault::throw(INDEX_OUT_OF_BOUNDS, Some(format!("Index {index} out of bounds")))
}

fn element<T>(items: &mut [T], index: i32) -> Result<&mut T, Fault> {
    usize::try_from(index)
        .ok()
        .and_then(|i| items.get_mut(i))
        .ok_or_else(|| out_of_bounds(index))
}

fn array_load(array: &Object, index: i32) -> Result<Value, Fault> {
    let i = usize::try_from(index).map_err(|_| out_of_bounds(index))?;
    let value = match array {
        Object::Chars(v) => v.get(i).map(|&c| Value::Int(i32::from(c))),
        Object::Floats(v) => v.get(i).map(|&f| Value::Float(f)),
        Object::Ints(v) => v.get(i).map(|&n| Value::Int(n)),
        Object::Refs(v) => v.get(i).cloned(),
        other => return Err(Fault::halt(format!("indexing {other:?}"))),
    };
    value.ok_or_else(|| out_of_bounds(index))
}

fn array_store(array: &mut Object, index: i32, value: Value) -> Result<(), Fault> {
    match array {
        Object::Chars(v) => *element(v, index)? = value.int()? as u16,
        Object::Floats(v) => *element(v, index)? = value.float()?,
        Object::Ints(v) => *element(v, index)? = value.int()?,
        Object::Refs(v) => *element(v, index)? = value,
        other => return Err(Fault::halt(format!("storing into {other:?}"))),
    }
    Ok(())
}

/// Argument count of a method descriptor, one per parameter.
pub(super) fn param_count(descriptor: &str) -> usize {
    let params = descriptor
        .strip_prefix('(')
        .and_then(|rest| rest.split(')').next())
        .unwrap_or_default();
    let mut count = 0;
    let mut chars = params.chars();
    while let Some(c) = chars.next() {
        match c {
            '[' => continue,
            'L' => {
                for c in chars.by_ref() {
                    if c == ';' {
                        break;
                    }
                }
            }
            _ => {}
        }
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_parameters() {
        assert_eq!(param_count("()V"), 0);
        assert_eq!(param_count("(I[IIF)I"), 4);
        assert_eq!(param_count("(Ljava/lang/Object;ILjava/lang/Object;II)V"), 5);
        assert_eq!(param_count("([[C[C)[C"), 2);
    }

    #[test]
    fn exception_hierarchy() {
        assert!(is_subclass(INDEX_OUT_OF_BOUNDS, "java/lang/Exception"));
        assert!(is_subclass(NUMBER_FORMAT, NUMBER_FORMAT));
        assert!(!is_subclass(NUMBER_FORMAT, INDEX_OUT_OF_BOUNDS));
    }
}
