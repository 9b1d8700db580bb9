//! # Compiler
//!
//! Lowers a parsed BASIC [`Program`] into a single JVM class file.
//!
//! ```text
//!  Program ──▶ ProgramInfo::scan ──▶ lower::main_method ─┐
//!                                   lower::user_function ├─▶ ClassWriter ──▶ bytes
//!                   library::generate (to a fixed point) ─┘
//! ```
//!
//! Numbers are `float`, strings are `char[]`. Variables become private
//! static fields of the generated class; runtime support is emitted as
//! private static methods, only for the routines the program reaches.
//!
//! ```rust
//! use compiler::{CompileOptions, compile_source};
//!
//! let bytes = compile_source("10 PRINT \"HELLO\"\n", &CompileOptions::default()).unwrap();
//! assert_eq!(&bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
//! ```
mod emit;
mod error;
mod jvm;
mod library;
mod lower;
mod program;
mod unit;

#[cfg(test)]
mod testing;

use classfile::{ClassWriter, ConstantPool};
use log::{debug, info};
use parser::ast::Program;

pub use error::{CompileError, Result};
pub use library::{Builtin, Library};

use program::ProgramInfo;
use unit::Unit;

/// Settings for one compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Internal name of the generated class, e.g. `Main` or `demo/Hello`.
    pub class_name: String,
    /// Recorded in the `SourceFile` attribute when set.
    pub source_file: Option<String>,
    /// Emit a `LineNumberTable` mapping code to BASIC line numbers.
    pub line_numbers: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            class_name: "Main".to_string(),
            source_file: None,
            line_numbers: true,
        }
    }
}

/// Compile `program` into the bytes of a class file.
pub fn compile(program: &Program, options: &CompileOptions) -> Result<Vec<u8>> {
    let info = ProgramInfo::scan(program)?;
    let mut pool = ConstantPool::new();
    let mut unit = Unit::new(options.class_name.as_str());

    let mut methods = vec![lower::main_method(
        &mut pool,
        &mut unit,
        &info,
        program,
        options.line_numbers,
    )?];
    for (name, def) in &info.functions {
        methods.push(lower::user_function(&mut pool, &mut unit, &info, name, def)?);
    }
    debug!("lowered {} user functions", info.functions.len());
    methods.extend(library::generate(&mut pool, &mut unit)?);

    let mut writer = ClassWriter::new(pool, unit.class_name.clone());
    for field in unit.into_fields() {
        writer.add_field(field);
    }
    for method in methods {
        writer.add_method(method);
    }
    if let Some(source_file) = &options.source_file {
        writer.set_source_file(source_file.clone());
    }
    let bytes = writer.write()?;
    info!("compiled {} into {} bytes", options.class_name, bytes.len());
    Ok(bytes)
}

/// Parse and compile BASIC source text.
pub fn compile_source(source: &str, options: &CompileOptions) -> Result<Vec<u8>> {
    let program = parser::parse(source)?;
    compile(&program, options)
}
