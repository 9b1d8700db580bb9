use crate::builder::Code;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SUPER: u16 = 0x0020;

/// A finished method: signature plus its `Code` attribute contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBody {
    pub access: u16,
    pub name: String,
    pub descriptor: String,
    pub code: Code,
}

/// A field declaration. Fields carry no attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub access: u16,
    pub name: String,
    pub descriptor: String,
}

impl FieldInfo {
    pub fn new(access: u16, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            access,
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}
