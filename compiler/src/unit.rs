//! The class being generated: its name, static fields and the builtins it
//! pulls in.
use std::collections::HashSet;

use classfile::{ACC_PRIVATE, ACC_STATIC, FieldInfo, MemberRef, SlotKind};
use log::trace;
use parser::ast::is_string_name;

use crate::library::{Builtin, Library};

/// The two BASIC value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ty {
    /// `float`.
    Num,
    /// `char[]`.
    Str,
}

impl Ty {
    pub fn of_name(name: &str) -> Ty {
        if is_string_name(name) { Ty::Str } else { Ty::Num }
    }

    pub fn descriptor(self) -> &'static str {
        match self {
            Ty::Num => "F",
            Ty::Str => "[C",
        }
    }

    pub fn array_descriptor(self) -> &'static str {
        match self {
            Ty::Num => "[F",
            Ty::Str => "[[C",
        }
    }

    pub fn slot(self) -> SlotKind {
        match self {
            Ty::Num => SlotKind::Float,
            Ty::Str => SlotKind::Reference,
        }
    }
}

/// Static fields owned by the runtime library. Their names are lowercase,
/// so they never collide with BASIC variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RuntimeField {
    PrintColumn,
    DataTable,
    DataCursor,
    GosubStack,
    GosubDepth,
    Stdin,
    LastRandom,
}

impl RuntimeField {
    pub fn name(self) -> &'static str {
        match self {
            RuntimeField::PrintColumn => "printColumn",
            RuntimeField::DataTable => "dataTable",
            RuntimeField::DataCursor => "dataCursor",
            RuntimeField::GosubStack => "gosubStack",
            RuntimeField::GosubDepth => "gosubDepth",
            RuntimeField::Stdin => "stdin",
            RuntimeField::LastRandom => "lastRandom",
        }
    }

    pub fn descriptor(self) -> &'static str {
        match self {
            RuntimeField::PrintColumn | RuntimeField::DataCursor | RuntimeField::GosubDepth => "I",
            RuntimeField::DataTable => "[[C",
            RuntimeField::GosubStack => "[I",
            RuntimeField::Stdin => "Ljava/io/BufferedReader;",
            RuntimeField::LastRandom => "F",
        }
    }
}

/// Per-compile state shared by the main method, user functions and
/// library routines.
pub(crate) struct Unit {
    pub class_name: String,
    pub library: Library,
    fields: Vec<FieldInfo>,
    declared: HashSet<String>,
}

impl Unit {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            library: Library::default(),
            fields: Vec::new(),
            declared: HashSet::new(),
        }
    }

    /// A member of the generated class.
    pub fn member(&self, name: &str, descriptor: &str) -> MemberRef {
        MemberRef::new(self.class_name.as_str(), name, descriptor)
    }

    /// A static field of the generated class, declared on first use.
    pub fn field(&mut self, name: &str, descriptor: &str) -> MemberRef {
        if self.declared.insert(name.to_string()) {
            trace!("declared field {name}:{descriptor}");
            self.fields
                .push(FieldInfo::new(ACC_PRIVATE | ACC_STATIC, name, descriptor));
        }
        self.member(name, descriptor)
    }

    pub fn runtime(&mut self, field: RuntimeField) -> MemberRef {
        self.field(field.name(), field.descriptor())
    }

    /// The field holding scalar variable `name`.
    pub fn scalar(&mut self, name: &str) -> MemberRef {
        self.field(name, Ty::of_name(name).descriptor())
    }

    /// The element and dimension fields of array `name`.
    pub fn array(&mut self, name: &str) -> (MemberRef, MemberRef) {
        let data = self.field(&format!("{name}()"), Ty::of_name(name).array_descriptor());
        let dims = self.field(&format!("{name}()dims"), "[I");
        (data, dims)
    }

    /// Register `builtin` and return the method to invoke.
    pub fn builtin(&mut self, builtin: Builtin) -> MemberRef {
        self.library.register(builtin);
        self.member(builtin.name(), builtin.descriptor())
    }

    pub fn into_fields(self) -> Vec<FieldInfo> {
        self.fields
    }
}
