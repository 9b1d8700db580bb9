//! Statement and expression trees for BASIC programs.
//!
//! A [`Program`] is a flat list of statements in source order. Every
//! physical line contributes a [`Stmt::LineNumber`] marker followed by the
//! statements on that line; `IF` branches nest their own lists.

/// A parsed program.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl Program {
    /// BASIC line numbers in source order.
    pub fn line_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.statements.iter().filter_map(|stmt| match stmt {
            Stmt::LineNumber(n) => Some(*n),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Start of a numbered line.
    LineNumber(u32),
    Data(Vec<DataItem>),
    /// `DEF FNX(A, B) = expr`. `name` includes the `FN` prefix.
    DefFn {
        name: String,
        params: Vec<String>,
        body: Expr,
    },
    Dim(Vec<Variable>),
    End,
    For {
        var: String,
        start: Expr,
        end: Expr,
        step: Option<Expr>,
    },
    Gosub(u32),
    Goto(u32),
    /// `IF c THEN 100` is stored with `then_branch == [Goto(100)]`.
    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Vec<Stmt>,
    },
    Input {
        prompt: Option<String>,
        separator: InputSeparator,
        vars: Vec<Variable>,
    },
    Let {
        var: Variable,
        value: Expr,
        /// Written without the `LET` keyword.
        implicit: bool,
    },
    /// Loop variables named by `NEXT`; empty closes the innermost loop.
    Next(Vec<String>),
    OnGoto {
        selector: Expr,
        targets: Vec<u32>,
    },
    OnGosub {
        selector: Expr,
        targets: Vec<u32>,
    },
    Print(Vec<PrintItem>),
    Read(Vec<Variable>),
    /// Comment text following `REM` or `'`, verbatim.
    Rem(String),
    Restore(Option<u32>),
    Return,
    Stop,
    Swap(Variable, Variable),
    Wend,
    While(Expr),
}

/// One `DATA` item. Quoted items keep their inner text; unquoted items are
/// trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataItem {
    pub text: String,
    pub quoted: bool,
}

/// What follows an `INPUT` prompt: `;` appends `? `, `,` does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSeparator {
    Semicolon,
    Comma,
}

impl InputSeparator {
    pub fn as_str(self) -> &'static str {
        match self {
            InputSeparator::Semicolon => ";",
            InputSeparator::Comma => ",",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PrintItem {
    Expr(Expr),
    /// `;`: no spacing.
    Semicolon,
    /// `,`: advance to the next print zone.
    Comma,
}

/// A scalar (`A`, `B$`) or an array element (`C(1, 2)`).
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Uppercased, including any type suffix.
    pub name: String,
    pub subscripts: Vec<Expr>,
}

impl Variable {
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscripts: Vec::new(),
        }
    }

    pub fn is_string(&self) -> bool {
        is_string_name(&self.name)
    }

    pub fn is_array(&self) -> bool {
        !self.subscripts.is_empty()
    }
}

/// Names ending in `$` hold strings; every other name holds a number.
pub fn is_string_name(name: &str) -> bool {
    name.ends_with('$')
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal with its source spelling.
    Number { value: f32, text: String },
    Text(String),
    Var(Variable),
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// Explicit parentheses, kept for formatting.
    Paren(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// A builtin function with defaults already filled in.
    Call { function: Function, args: Vec<Expr> },
    /// A `DEF FN` function call.
    FnCall { name: String, args: Vec<Expr> },
}

impl Expr {
    pub fn number(value: f32) -> Self {
        Expr::Number {
            value,
            text: value.to_string(),
        }
    }

    /// Whether this is a numeric literal equal to `value`.
    pub fn is_literal(&self, value: f32) -> bool {
        matches!(self, Expr::Number { value: v, .. } if *v == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Pow,
    Mul,
    Div,
    IntDiv,
    Mod,
    Add,
    Sub,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Xor,
}

/// Binding power of `NOT`, between `AND` and the relational operators.
pub const NOT_PRECEDENCE: u8 = 4;
/// Binding power of unary minus, between `*`/`/` and `^`.
pub const NEG_PRECEDENCE: u8 = 10;

impl BinaryOp {
    /// Binding power; higher binds tighter. All binary operators are
    /// left-associative.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Xor => 1,
            BinaryOp::Or => 2,
            BinaryOp::And => 3,
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => 5,
            BinaryOp::Add | BinaryOp::Sub => 6,
            BinaryOp::Mod => 7,
            BinaryOp::IntDiv => 8,
            BinaryOp::Mul | BinaryOp::Div => 9,
            BinaryOp::Pow => 11,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Pow => "^",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::IntDiv => "\\",
            BinaryOp::Mod => "MOD",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Xor => "XOR",
        }
    }

    /// Operators spelled as words, which the formatter pads with spaces.
    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            BinaryOp::Mod | BinaryOp::And | BinaryOp::Or | BinaryOp::Xor
        )
    }

    pub fn is_relational(self) -> bool {
        self.precedence() == 5
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or | BinaryOp::Xor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Abs,
    Asc,
    Atn,
    Chr,
    Cos,
    Exp,
    Fix,
    Instr,
    Int,
    Left,
    Len,
    Log,
    Mid,
    Right,
    Rnd,
    Sgn,
    Sin,
    Space,
    Spc,
    Sqr,
    Str,
    StringOf,
    Tab,
    Tan,
    Val,
}

impl Function {
    pub const ALL: [Function; 25] = [
        Function::Abs,
        Function::Asc,
        Function::Atn,
        Function::Chr,
        Function::Cos,
        Function::Exp,
        Function::Fix,
        Function::Instr,
        Function::Int,
        Function::Left,
        Function::Len,
        Function::Log,
        Function::Mid,
        Function::Right,
        Function::Rnd,
        Function::Sgn,
        Function::Sin,
        Function::Space,
        Function::Spc,
        Function::Sqr,
        Function::Str,
        Function::StringOf,
        Function::Tab,
        Function::Tan,
        Function::Val,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Function::Abs => "ABS",
            Function::Asc => "ASC",
            Function::Atn => "ATN",
            Function::Chr => "CHR$",
            Function::Cos => "COS",
            Function::Exp => "EXP",
            Function::Fix => "FIX",
            Function::Instr => "INSTR",
            Function::Int => "INT",
            Function::Left => "LEFT$",
            Function::Len => "LEN",
            Function::Log => "LOG",
            Function::Mid => "MID$",
            Function::Right => "RIGHT$",
            Function::Rnd => "RND",
            Function::Sgn => "SGN",
            Function::Sin => "SIN",
            Function::Space => "SPACE$",
            Function::Spc => "SPC",
            Function::Sqr => "SQR",
            Function::Str => "STR$",
            Function::StringOf => "STRING$",
            Function::Tab => "TAB",
            Function::Tan => "TAN",
            Function::Val => "VAL",
        }
    }

    /// Look up an uppercased word such as `LEFT$`.
    pub fn from_name(name: &str) -> Option<Function> {
        Function::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Accepted argument counts as written in source.
    pub fn arity(self) -> std::ops::RangeInclusive<usize> {
        match self {
            Function::Instr => 2..=3,
            Function::Mid => 2..=3,
            Function::Rnd => 0..=1,
            Function::Left | Function::Right | Function::StringOf => 2..=2,
            _ => 1..=1,
        }
    }

    /// Argument count after the parser fills defaults.
    pub fn full_arity(self) -> usize {
        *self.arity().end()
    }

    pub fn returns_string(self) -> bool {
        self.name().ends_with('$')
    }
}
