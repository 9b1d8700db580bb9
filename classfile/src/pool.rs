use std::collections::HashMap;
use std::fmt;

use crate::error::ClassFileError;

/// Constant pool tag bytes.
pub mod tag {
    pub const UTF8: u8 = 1;
    pub const INTEGER: u8 = 3;
    pub const FLOAT: u8 = 4;
    pub const CLASS: u8 = 7;
    pub const STRING: u8 = 8;
    pub const FIELDREF: u8 = 9;
    pub const METHODREF: u8 = 10;
    pub const NAME_AND_TYPE: u8 = 12;
}

/// Largest entry count a pool can hold; `constant_pool_count` is a `u16`
/// holding `entries + 1`.
pub const MAX_ENTRIES: usize = u16::MAX as usize - 1;

/// A symbolic reference to a field or method of some class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberRef {
    pub class: String,
    pub name: String,
    pub descriptor: String,
}

impl MemberRef {
    pub fn new(
        class: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            class: class.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.class, self.name, self.descriptor)
    }
}

/// Content key of a pool entry. Two equal keys always intern to one index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PoolKey {
    Utf8(String),
    Integer(i32),
    /// Raw IEEE bits, so `-0.0` and `0.0` stay distinct and NaN is hashable.
    Float(u32),
    Class(String),
    String(String),
    NameAndType { name: String, descriptor: String },
    Field(MemberRef),
    Method(MemberRef),
}

/// A stored pool entry. References to other entries are 1-based indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    Float(u32),
    Class { name: u16 },
    String { utf8: u16 },
    NameAndType { name: u16, descriptor: u16 },
    Fieldref { class: u16, name_and_type: u16 },
    Methodref { class: u16, name_and_type: u16 },
}

impl Constant {
    pub fn tag(&self) -> u8 {
        match self {
            Constant::Utf8(_) => tag::UTF8,
            Constant::Integer(_) => tag::INTEGER,
            Constant::Float(_) => tag::FLOAT,
            Constant::Class { .. } => tag::CLASS,
            Constant::String { .. } => tag::STRING,
            Constant::NameAndType { .. } => tag::NAME_AND_TYPE,
            Constant::Fieldref { .. } => tag::FIELDREF,
            Constant::Methodref { .. } => tag::METHODREF,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Constant::Utf8(_) => "Utf8",
            Constant::Integer(_) => "Integer",
            Constant::Float(_) => "Float",
            Constant::Class { .. } => "Class",
            Constant::String { .. } => "String",
            Constant::NameAndType { .. } => "NameAndType",
            Constant::Fieldref { .. } => "Fieldref",
            Constant::Methodref { .. } => "Methodref",
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.push(self.tag());
        match self {
            Constant::Utf8(text) => {
                let bytes = modified_utf8(text);
                out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
                out.extend_from_slice(&bytes);
            }
            Constant::Integer(v) => out.extend_from_slice(&v.to_be_bytes()),
            Constant::Float(bits) => out.extend_from_slice(&bits.to_be_bytes()),
            Constant::Class { name } => out.extend_from_slice(&name.to_be_bytes()),
            Constant::String { utf8 } => out.extend_from_slice(&utf8.to_be_bytes()),
            Constant::NameAndType { name, descriptor } => {
                out.extend_from_slice(&name.to_be_bytes());
                out.extend_from_slice(&descriptor.to_be_bytes());
            }
            Constant::Fieldref {
                class,
                name_and_type,
            }
            | Constant::Methodref {
                class,
                name_and_type,
            } => {
                out.extend_from_slice(&class.to_be_bytes());
                out.extend_from_slice(&name_and_type.to_be_bytes());
            }
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Utf8(text) => write!(f, "Utf8 {text:?}"),
            Constant::Integer(v) => write!(f, "Integer {v}"),
            Constant::Float(bits) => write!(f, "Float {}", f32::from_bits(*bits)),
            Constant::Class { name } => write!(f, "Class #{name}"),
            Constant::String { utf8 } => write!(f, "String #{utf8}"),
            Constant::NameAndType { name, descriptor } => {
                write!(f, "NameAndType #{name}:#{descriptor}")
            }
            Constant::Fieldref {
                class,
                name_and_type,
            } => write!(f, "Fieldref #{class}.#{name_and_type}"),
            Constant::Methodref {
                class,
                name_and_type,
            } => write!(f, "Methodref #{class}.#{name_and_type}"),
        }
    }
}

/// Deduplicating constant pool.
///
/// Entries are appended in first-use order and never removed. Interning an
/// entry interns the entries it refers to first, so a referenced entry always
/// has a lower index than its referrer.
#[derive(Debug, Default)]
pub struct ConstantPool {
    entries: Vec<Constant>,
    index: HashMap<PoolKey, u16>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, not counting the reserved index 0.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at a 1-based index.
    pub fn get(&self, index: u16) -> Option<&Constant> {
        self.entries.get(usize::from(index).checked_sub(1)?)
    }

    /// `(index, entry)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, c)| (i as u16 + 1, c))
    }

    /// Returns the index for `key`, creating the entry and its dependencies
    /// on first use.
    pub fn intern(&mut self, key: PoolKey) -> Result<u16, ClassFileError> {
        if let Some(&idx) = self.index.get(&key) {
            return Ok(idx);
        }

        let constant = match &key {
            PoolKey::Utf8(text) => {
                let len = modified_utf8_len(text);
                if len > usize::from(u16::MAX) {
                    return Err(ClassFileError::InvalidConstant(format!(
                        "Utf8 entry of {len} bytes exceeds 65535"
                    )));
                }
                Constant::Utf8(text.clone())
            }
            PoolKey::Integer(v) => Constant::Integer(*v),
            PoolKey::Float(bits) => Constant::Float(*bits),
            PoolKey::Class(name) => Constant::Class {
                name: self.utf8(name)?,
            },
            PoolKey::String(text) => Constant::String {
                utf8: self.utf8(text)?,
            },
            PoolKey::NameAndType { name, descriptor } => Constant::NameAndType {
                name: self.utf8(name)?,
                descriptor: self.utf8(descriptor)?,
            },
            PoolKey::Field(member) => {
                let (class, name_and_type) = self.member(member)?;
                Constant::Fieldref {
                    class,
                    name_and_type,
                }
            }
            PoolKey::Method(member) => {
                let (class, name_and_type) = self.member(member)?;
                Constant::Methodref {
                    class,
                    name_and_type,
                }
            }
        };

        if self.entries.len() >= MAX_ENTRIES {
            return Err(ClassFileError::PoolOverflow(self.entries.len()));
        }
        self.entries.push(constant);
        let idx = self.entries.len() as u16;
        self.index.insert(key, idx);
        Ok(idx)
    }

    fn member(&mut self, member: &MemberRef) -> Result<(u16, u16), ClassFileError> {
        let class = self.class(&member.class)?;
        let name_and_type = self.name_and_type(&member.name, &member.descriptor)?;
        Ok((class, name_and_type))
    }

    pub fn utf8(&mut self, text: &str) -> Result<u16, ClassFileError> {
        self.intern(PoolKey::Utf8(text.to_string()))
    }

    pub fn class(&mut self, name: &str) -> Result<u16, ClassFileError> {
        self.intern(PoolKey::Class(name.to_string()))
    }

    pub fn string(&mut self, text: &str) -> Result<u16, ClassFileError> {
        self.intern(PoolKey::String(text.to_string()))
    }

    pub fn integer(&mut self, value: i32) -> Result<u16, ClassFileError> {
        self.intern(PoolKey::Integer(value))
    }

    pub fn float(&mut self, value: f32) -> Result<u16, ClassFileError> {
        self.intern(PoolKey::Float(value.to_bits()))
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16, ClassFileError> {
        self.intern(PoolKey::NameAndType {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        })
    }

    pub fn field(&mut self, member: &MemberRef) -> Result<u16, ClassFileError> {
        self.intern(PoolKey::Field(member.clone()))
    }

    pub fn method(&mut self, member: &MemberRef) -> Result<u16, ClassFileError> {
        self.intern(PoolKey::Method(member.clone()))
    }

    /// Writes `constant_pool_count` followed by every entry.
    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.entries.len() as u16 + 1).to_be_bytes());
        for entry in &self.entries {
            entry.write(out);
        }
    }
}

/// Encodes `text` the way `CONSTANT_Utf8` stores it: NUL as `C0 80` and
/// supplementary characters as two 3-byte surrogates.
pub fn modified_utf8(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for unit in text.encode_utf16() {
        match unit {
            0x0001..=0x007f => out.push(unit as u8),
            0x0000 | 0x0080..=0x07ff => {
                out.push(0xc0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
            _ => {
                out.push(0xe0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3f) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
        }
    }
    out
}

fn modified_utf8_len(text: &str) -> usize {
    text.encode_utf16()
        .map(|unit| match unit {
            0x0001..=0x007f => 1,
            0x0000 | 0x0080..=0x07ff => 2,
            _ => 3,
        })
        .sum()
}

/// Inverse of [`modified_utf8`].
pub fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 {
            units.push(u16::from(b));
            i += 1;
        } else if b & 0xe0 == 0xc0 {
            let b2 = *bytes.get(i + 1)?;
            units.push((u16::from(b & 0x1f) << 6) | u16::from(b2 & 0x3f));
            i += 2;
        } else if b & 0xf0 == 0xe0 {
            let b2 = *bytes.get(i + 1)?;
            let b3 = *bytes.get(i + 2)?;
            units.push(
                (u16::from(b & 0x0f) << 12) | (u16::from(b2 & 0x3f) << 6) | u16::from(b3 & 0x3f),
            );
            i += 3;
        } else {
            return None;
        }
    }
    String::from_utf16(&units).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn indices_start_at_one() {
        let mut pool = ConstantPool::new();
        assert_eq!(pool.utf8("main"), Ok(1));
        assert_eq!(pool.get(0), None);
        assert_eq!(pool.get(1), Some(&Constant::Utf8("main".into())));
    }

    #[test]
    fn string_interns_its_utf8_first() {
        let mut pool = ConstantPool::new();
        let idx = pool.string("HELLO").unwrap();
        assert_eq!(idx, 2);
        assert_eq!(pool.get(1), Some(&Constant::Utf8("HELLO".into())));
        assert_eq!(pool.get(2), Some(&Constant::String { utf8: 1 }));
        // The Utf8 is shared with a later direct request.
        assert_eq!(pool.utf8("HELLO"), Ok(1));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn method_ref_builds_the_whole_chain() {
        let mut pool = ConstantPool::new();
        let m = MemberRef::new("java/lang/Math", "round", "(F)I");
        let idx = pool.method(&m).unwrap();
        assert_eq!(pool.len(), 6);
        assert_eq!(idx, 6);
        assert_eq!(
            pool.get(6),
            Some(&Constant::Methodref {
                class: 2,
                name_and_type: 5
            })
        );
        assert_eq!(pool.method(&m), Ok(6));
        // Same name and type on a field is a different entry kind.
        let f = pool.field(&m).unwrap();
        assert_eq!(f, 7);
    }

    #[test]
    fn float_keys_compare_by_bits() {
        let mut pool = ConstantPool::new();
        let pos = pool.float(0.0).unwrap();
        let neg = pool.float(-0.0).unwrap();
        assert_ne!(pos, neg);
        assert_eq!(pool.float(f32::NAN), pool.float(f32::NAN));
    }

    #[test]
    fn kinds_do_not_collide() {
        let mut pool = ConstantPool::new();
        let class = pool.class("A").unwrap();
        let string = pool.string("A").unwrap();
        assert_ne!(class, string);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn serializes_tags_and_big_endian_payloads() {
        let mut pool = ConstantPool::new();
        pool.string("A").unwrap();
        pool.integer(0x0102_0304).unwrap();
        let mut out = Vec::new();
        pool.write(&mut out);
        assert_eq!(
            out,
            vec![
                0x00, 0x04, // count = entries + 1
                tag::UTF8, 0x00, 0x01, b'A',
                tag::STRING, 0x00, 0x01,
                tag::INTEGER, 0x01, 0x02, 0x03, 0x04,
            ]
        );
    }

    #[test]
    fn modified_utf8_encodes_nul_and_supplementary() {
        assert_eq!(modified_utf8("a\0"), vec![b'a', 0xc0, 0x80]);
        let emoji = modified_utf8("\u{1F600}");
        assert_eq!(emoji.len(), 6);
        assert_eq!(decode_modified_utf8(&emoji).as_deref(), Some("\u{1F600}"));
        assert_eq!(decode_modified_utf8(&[0xc0, 0x80]).as_deref(), Some("\0"));
    }

    #[test]
    fn oversized_utf8_is_rejected() {
        let mut pool = ConstantPool::new();
        let text = "x".repeat(70_000);
        assert!(matches!(
            pool.utf8(&text),
            Err(ClassFileError::InvalidConstant(_))
        ));
        assert!(pool.is_empty());
    }

    proptest! {
        #[test]
        fn distinct_keys_get_distinct_indices_in_first_seen_order(
            names in proptest::collection::vec("[a-z]{1,6}", 1..40)
        ) {
            let mut pool = ConstantPool::new();
            let mut seen: Vec<String> = Vec::new();
            for name in &names {
                let idx = pool.utf8(name).unwrap();
                match seen.iter().position(|s| s == name) {
                    Some(pos) => prop_assert_eq!(usize::from(idx), pos + 1),
                    None => {
                        seen.push(name.clone());
                        prop_assert_eq!(usize::from(idx), seen.len());
                    }
                }
            }
            prop_assert_eq!(pool.len(), seen.len());
        }
    }
}
