//! Parses class files back into a structured, validated form.
//!
//! Used for disassembly and by tests. Every pool reference is checked for
//! range and kind, every branch must land on an instruction boundary.

use crate::builder::{Code, ExceptionEntry};
use crate::decoder::decode_all;
use crate::error::ClassFileError;
use crate::instruction::Instruction;
use crate::method::FieldInfo;
use crate::pool::{Constant, MemberRef, decode_modified_utf8, tag};

/// A method as read from a class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodImage {
    pub access: u16,
    pub name: String,
    pub descriptor: String,
    pub code: Option<Code>,
}

/// A parsed class file.
#[derive(Debug, Clone)]
pub struct ClassImage {
    pub minor_version: u16,
    pub major_version: u16,
    constants: Vec<Constant>,
    pub access: u16,
    pub this_class: String,
    pub super_class: String,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodImage>,
    pub source_file: Option<String>,
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], ClassFileError> {
        let slice = self
            .bytes
            .get(self.pos..self.pos + n)
            .ok_or_else(|| ClassFileError::malformed(self.pos, "unexpected end of class data"))?;
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, ClassFileError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, ClassFileError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, ClassFileError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

impl ClassImage {
    pub fn parse(bytes: &[u8]) -> Result<Self, ClassFileError> {
        let mut cur = Cursor { bytes, pos: 0 };
        if cur.u32()? != crate::class::MAGIC {
            return Err(ClassFileError::malformed(0, "bad magic"));
        }
        let minor_version = cur.u16()?;
        let major_version = cur.u16()?;

        let count = cur.u16()?;
        let mut constants = Vec::with_capacity(usize::from(count));
        for _ in 1..count {
            constants.push(read_constant(&mut cur)?);
        }

        let mut image = ClassImage {
            minor_version,
            major_version,
            constants,
            access: 0,
            this_class: String::new(),
            super_class: String::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            source_file: None,
        };
        image.check_pool()?;

        image.access = cur.u16()?;
        let at = cur.pos;
        image.this_class = image.expect_class(cur.u16()?, at)?.to_string();
        image.super_class = image.expect_class(cur.u16()?, at + 2)?.to_string();
        let interfaces = cur.u16()?;
        cur.take(usize::from(interfaces) * 2)?;

        for _ in 0..cur.u16()? {
            let access = cur.u16()?;
            let name = image.expect_utf8(cur.u16()?, cur.pos)?.to_string();
            let descriptor = image.expect_utf8(cur.u16()?, cur.pos)?.to_string();
            skip_attributes(&mut cur)?;
            image.fields.push(FieldInfo {
                access,
                name,
                descriptor,
            });
        }

        for _ in 0..cur.u16()? {
            let method = image.read_method(&mut cur)?;
            image.methods.push(method);
        }

        for _ in 0..cur.u16()? {
            let at = cur.pos;
            let name = image.expect_utf8(cur.u16()?, at)?.to_string();
            let len = cur.u32()? as usize;
            let body = cur.take(len)?;
            if name == "SourceFile" && len == 2 {
                let idx = u16::from_be_bytes([body[0], body[1]]);
                image.source_file = Some(image.expect_utf8(idx, at)?.to_string());
            }
        }

        if cur.pos != bytes.len() {
            return Err(ClassFileError::malformed(cur.pos, "trailing bytes"));
        }
        Ok(image)
    }

    /// Entry at a 1-based pool index.
    pub fn constant(&self, idx: u16) -> Option<&Constant> {
        self.constants.get(usize::from(idx).checked_sub(1)?)
    }

    /// `(index, entry)` pairs in pool order.
    pub fn constants(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.constants
            .iter()
            .enumerate()
            .map(|(i, c)| (i as u16 + 1, c))
    }

    pub fn utf8(&self, idx: u16) -> Option<&str> {
        match self.constant(idx)? {
            Constant::Utf8(text) => Some(text),
            _ => None,
        }
    }

    pub fn class_name(&self, idx: u16) -> Option<&str> {
        match self.constant(idx)? {
            Constant::Class { name } => self.utf8(*name),
            _ => None,
        }
    }

    /// Resolves a `Fieldref` or `Methodref`.
    pub fn member(&self, idx: u16) -> Option<MemberRef> {
        let (class, name_and_type) = match self.constant(idx)? {
            Constant::Fieldref {
                class,
                name_and_type,
            }
            | Constant::Methodref {
                class,
                name_and_type,
            } => (*class, *name_and_type),
            _ => return None,
        };
        let Constant::NameAndType { name, descriptor } = self.constant(name_and_type)? else {
            return None;
        };
        Some(MemberRef::new(
            self.class_name(class)?,
            self.utf8(*name)?,
            self.utf8(*descriptor)?,
        ))
    }

    pub fn method(&self, name: &str) -> Option<&MethodImage> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Human-readable form of a pool entry, with references resolved.
    pub fn describe(&self, idx: u16) -> String {
        match self.constant(idx) {
            Some(Constant::Utf8(text)) => format!("{text:?}"),
            Some(Constant::Integer(v)) => v.to_string(),
            Some(Constant::Float(bits)) => format!("{}f", f32::from_bits(*bits)),
            Some(Constant::Class { name }) => self.utf8(*name).unwrap_or("?").to_string(),
            Some(Constant::String { utf8 }) => format!("{:?}", self.utf8(*utf8).unwrap_or("?")),
            Some(Constant::NameAndType { name, descriptor }) => format!(
                "{}:{}",
                self.utf8(*name).unwrap_or("?"),
                self.utf8(*descriptor).unwrap_or("?")
            ),
            Some(Constant::Fieldref { .. } | Constant::Methodref { .. }) => self
                .member(idx)
                .map(|m| m.to_string())
                .unwrap_or_else(|| "?".to_string()),
            None => "<invalid>".to_string(),
        }
    }

    // ── validation ─────────────────────────────────────────────────

    fn expect(&self, idx: u16, wanted: u8, at: usize) -> Result<&Constant, ClassFileError> {
        match self.constant(idx) {
            Some(c) if c.tag() == wanted => Ok(c),
            found => Err(mismatch(idx, found, wanted, at)),
        }
    }

    fn expect_utf8(&self, idx: u16, at: usize) -> Result<&str, ClassFileError> {
        match self.constant(idx) {
            Some(Constant::Utf8(text)) => Ok(text),
            found => Err(mismatch(idx, found, tag::UTF8, at)),
        }
    }

    fn expect_class(&self, idx: u16, at: usize) -> Result<&str, ClassFileError> {
        match self.constant(idx) {
            Some(Constant::Class { name }) => self.expect_utf8(*name, at),
            found => Err(mismatch(idx, found, tag::CLASS, at)),
        }
    }

    fn check_pool(&self) -> Result<(), ClassFileError> {
        for (idx, constant) in self.constants() {
            let at = usize::from(idx);
            match constant {
                Constant::Utf8(_) | Constant::Integer(_) | Constant::Float(_) => {}
                Constant::Class { name } => {
                    self.expect_utf8(*name, at)?;
                }
                Constant::String { utf8 } => {
                    self.expect_utf8(*utf8, at)?;
                }
                Constant::NameAndType { name, descriptor } => {
                    self.expect_utf8(*name, at)?;
                    self.expect_utf8(*descriptor, at)?;
                }
                Constant::Fieldref {
                    class,
                    name_and_type,
                }
                | Constant::Methodref {
                    class,
                    name_and_type,
                } => {
                    self.expect(*class, tag::CLASS, at)?;
                    self.expect(*name_and_type, tag::NAME_AND_TYPE, at)?;
                }
            }
        }
        Ok(())
    }

    fn read_method(&self, cur: &mut Cursor<'_>) -> Result<MethodImage, ClassFileError> {
        let access = cur.u16()?;
        let name = self.expect_utf8(cur.u16()?, cur.pos)?.to_string();
        let descriptor = self.expect_utf8(cur.u16()?, cur.pos)?.to_string();
        let mut code = None;
        for _ in 0..cur.u16()? {
            let at = cur.pos;
            let attr = self.expect_utf8(cur.u16()?, at)?;
            let len = cur.u32()? as usize;
            let body = cur.take(len)?;
            if attr == "Code" {
                code = Some(self.read_code(body, at)?);
            }
        }
        Ok(MethodImage {
            access,
            name,
            descriptor,
            code,
        })
    }

    fn read_code(&self, body: &[u8], base: usize) -> Result<Code, ClassFileError> {
        let mut cur = Cursor {
            bytes: body,
            pos: 0,
        };
        let max_stack = cur.u16()?;
        let max_locals = cur.u16()?;
        let len = cur.u32()? as usize;
        let bytes = cur.take(len)?.to_vec();

        let instructions = decode_all(&bytes)?;
        let boundaries: std::collections::HashSet<usize> =
            instructions.iter().map(|(at, _)| *at).collect();
        for (at, insn) in &instructions {
            self.check_instruction(*at, insn)?;
            for target in insn.targets(*at) {
                if !boundaries.contains(&target) {
                    return Err(ClassFileError::malformed(
                        *at,
                        format!("branch target {target} is not an instruction boundary"),
                    ));
                }
            }
        }

        let mut exception_table = Vec::new();
        for _ in 0..cur.u16()? {
            let entry = ExceptionEntry {
                start_pc: cur.u16()?,
                end_pc: cur.u16()?,
                handler_pc: cur.u16()?,
                catch_type: cur.u16()?,
            };
            let in_code = |pc: u16| boundaries.contains(&usize::from(pc));
            let end_ok = in_code(entry.end_pc) || usize::from(entry.end_pc) == len;
            if entry.start_pc >= entry.end_pc
                || !in_code(entry.start_pc)
                || !end_ok
                || !in_code(entry.handler_pc)
            {
                return Err(ClassFileError::malformed(base, "bad exception table entry"));
            }
            if entry.catch_type != 0 {
                self.expect(entry.catch_type, tag::CLASS, base)?;
            }
            exception_table.push(entry);
        }

        let mut line_numbers = Vec::new();
        for _ in 0..cur.u16()? {
            let name = self.expect_utf8(cur.u16()?, base)?;
            let attr_len = cur.u32()? as usize;
            let attr = cur.take(attr_len)?;
            if name == "LineNumberTable" {
                let mut lines = Cursor {
                    bytes: attr,
                    pos: 0,
                };
                for _ in 0..lines.u16()? {
                    line_numbers.push((lines.u16()?, lines.u16()?));
                }
            }
        }

        Ok(Code {
            bytes,
            max_stack,
            max_locals,
            exception_table,
            line_numbers,
        })
    }

    fn check_instruction(&self, at: usize, insn: &Instruction) -> Result<(), ClassFileError> {
        match insn {
            Instruction::Ldc(idx) => match self.constant(*idx) {
                Some(
                    Constant::Integer(_)
                    | Constant::Float(_)
                    | Constant::String { .. }
                    | Constant::Class { .. },
                ) => Ok(()),
                _ => Err(ClassFileError::malformed(
                    at,
                    format!("ldc of non-loadable #{idx}"),
                )),
            },
            Instruction::Field { idx, .. } => self.expect(*idx, tag::FIELDREF, at).map(drop),
            Instruction::Invoke { idx, .. } => self.expect(*idx, tag::METHODREF, at).map(drop),
            Instruction::Class { idx, .. } => self.expect(*idx, tag::CLASS, at).map(drop),
            _ => Ok(()),
        }
    }
}

fn read_constant(cur: &mut Cursor<'_>) -> Result<Constant, ClassFileError> {
    let at = cur.pos;
    Ok(match cur.u8()? {
        tag::UTF8 => {
            let len = cur.u16()?;
            let raw = cur.take(usize::from(len))?;
            let text = decode_modified_utf8(raw)
                .ok_or_else(|| ClassFileError::malformed(at, "invalid modified UTF-8"))?;
            Constant::Utf8(text)
        }
        tag::INTEGER => Constant::Integer(cur.u32()? as i32),
        tag::FLOAT => Constant::Float(cur.u32()?),
        tag::CLASS => Constant::Class { name: cur.u16()? },
        tag::STRING => Constant::String { utf8: cur.u16()? },
        tag::NAME_AND_TYPE => Constant::NameAndType {
            name: cur.u16()?,
            descriptor: cur.u16()?,
        },
        tag::FIELDREF => Constant::Fieldref {
            class: cur.u16()?,
            name_and_type: cur.u16()?,
        },
        tag::METHODREF => Constant::Methodref {
            class: cur.u16()?,
            name_and_type: cur.u16()?,
        },
        other => {
            return Err(ClassFileError::malformed(
                at,
                format!("unsupported constant tag {other}"),
            ));
        }
    })
}

fn mismatch(idx: u16, found: Option<&Constant>, wanted: u8, at: usize) -> ClassFileError {
    let reason = match found {
        Some(c) => format!("pool #{idx} is {}, expected tag {wanted}", c.kind_name()),
        None => format!("pool index #{idx} out of range"),
    };
    ClassFileError::malformed(at, reason)
}

fn skip_attributes(cur: &mut Cursor<'_>) -> Result<(), ClassFileError> {
    for _ in 0..cur.u16()? {
        cur.u16()?;
        let len = cur.u32()? as usize;
        cur.take(len)?;
    }
    Ok(())
}
