use log::debug;

use crate::error::ClassFileError;
use crate::line_table;
use crate::method::{ACC_PUBLIC, ACC_SUPER, FieldInfo, MethodBody};
use crate::pool::ConstantPool;

pub const MAGIC: u32 = 0xCAFE_BABE;
pub const MINOR_VERSION: u16 = 0;
/// Java 5. Older than StackMapTable, so the type-inferring verifier runs.
pub const MAJOR_VERSION: u16 = 49;

/// Serializes a class: pool, fields, methods and the `SourceFile` attribute.
///
/// The writer owns the pool the methods were assembled against and interns
/// the remaining names (class names, attribute names, member names) before
/// the pool is written, so the image is produced in one pass.
pub struct ClassWriter {
    pool: ConstantPool,
    access: u16,
    this_class: String,
    super_class: String,
    fields: Vec<FieldInfo>,
    methods: Vec<MethodBody>,
    source_file: Option<String>,
}

impl ClassWriter {
    pub fn new(pool: ConstantPool, this_class: impl Into<String>) -> Self {
        Self {
            pool,
            access: ACC_PUBLIC | ACC_SUPER,
            this_class: this_class.into(),
            super_class: "java/lang/Object".to_string(),
            fields: Vec::new(),
            methods: Vec::new(),
            source_file: None,
        }
    }

    pub fn add_field(&mut self, field: FieldInfo) {
        self.fields.push(field);
    }

    pub fn add_method(&mut self, method: MethodBody) {
        self.methods.push(method);
    }

    pub fn set_source_file(&mut self, name: impl Into<String>) {
        self.source_file = Some(name.into());
    }

    pub fn methods(&self) -> &[MethodBody] {
        &self.methods
    }

    /// Produce the class file bytes.
    pub fn write(mut self) -> Result<Vec<u8>, ClassFileError> {
        // Intern everything first; the pool is serialized before its users.
        let this_class = self.pool.class(&self.this_class)?;
        let super_class = self.pool.class(&self.super_class)?;
        let mut fields = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            fields.push((
                field.access,
                self.pool.utf8(&field.name)?,
                self.pool.utf8(&field.descriptor)?,
            ));
        }
        let code_attr = self.pool.utf8("Code")?;
        let needs_lines = self.methods.iter().any(|m| !m.code.line_numbers.is_empty());
        let lines_attr = if needs_lines {
            Some(self.pool.utf8("LineNumberTable")?)
        } else {
            None
        };
        let mut methods = Vec::with_capacity(self.methods.len());
        for method in &self.methods {
            methods.push((
                self.pool.utf8(&method.name)?,
                self.pool.utf8(&method.descriptor)?,
            ));
        }
        let source_file = match &self.source_file {
            Some(name) => Some((self.pool.utf8("SourceFile")?, self.pool.utf8(name)?)),
            None => None,
        };

        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.extend_from_slice(&MINOR_VERSION.to_be_bytes());
        out.extend_from_slice(&MAJOR_VERSION.to_be_bytes());
        self.pool.write(&mut out);
        put_u16(&mut out, self.access);
        put_u16(&mut out, this_class);
        put_u16(&mut out, super_class);
        put_u16(&mut out, 0); // interfaces

        put_u16(&mut out, self.fields.len() as u16);
        for (access, name, descriptor) in fields {
            put_u16(&mut out, access);
            put_u16(&mut out, name);
            put_u16(&mut out, descriptor);
            put_u16(&mut out, 0); // attributes
        }

        put_u16(&mut out, self.methods.len() as u16);
        for (method, (name, descriptor)) in self.methods.iter().zip(methods) {
            put_u16(&mut out, method.access);
            put_u16(&mut out, name);
            put_u16(&mut out, descriptor);
            put_u16(&mut out, 1);
            write_code(&mut out, code_attr, lines_attr, method);
        }

        match source_file {
            Some((attr, name)) => {
                put_u16(&mut out, 1);
                put_u16(&mut out, attr);
                out.extend_from_slice(&2u32.to_be_bytes());
                put_u16(&mut out, name);
            }
            None => put_u16(&mut out, 0),
        }

        debug!(
            "class {}: {} bytes, {} constants, {} fields, {} methods",
            self.this_class,
            out.len(),
            self.pool.len(),
            self.fields.len(),
            self.methods.len()
        );
        Ok(out)
    }
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn write_code(out: &mut Vec<u8>, code_attr: u16, lines_attr: Option<u16>, method: &MethodBody) {
    let code = &method.code;
    let mut body = Vec::new();
    put_u16(&mut body, code.max_stack);
    put_u16(&mut body, code.max_locals);
    body.extend_from_slice(&(code.bytes.len() as u32).to_be_bytes());
    body.extend_from_slice(&code.bytes);
    put_u16(&mut body, code.exception_table.len() as u16);
    for entry in &code.exception_table {
        put_u16(&mut body, entry.start_pc);
        put_u16(&mut body, entry.end_pc);
        put_u16(&mut body, entry.handler_pc);
        put_u16(&mut body, entry.catch_type);
    }
    match lines_attr {
        Some(attr) if !code.line_numbers.is_empty() => {
            put_u16(&mut body, 1);
            put_u16(&mut body, attr);
            let mut table = Vec::new();
            line_table::encode(&code.line_numbers, &mut table);
            body.extend_from_slice(&(table.len() as u32).to_be_bytes());
            body.extend_from_slice(&table);
        }
        _ => put_u16(&mut body, 0),
    }

    put_u16(out, code_attr);
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(&body);
}
