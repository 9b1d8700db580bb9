use thiserror::Error;

/// Errors raised while assembling, writing or reading a class file.
///
/// None of these describe a defect in the BASIC program being compiled; they
/// mean the code generator produced something the container cannot hold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassFileError {
    #[error("label `{label}` is already bound")]
    DuplicateLabel { label: String },

    #[error("label `{label}` is referenced but never bound")]
    UnresolvedLabel { label: String },

    #[error("branch at offset {at} to label `{label}` does not fit its operand")]
    BranchOutOfRange { label: String, at: usize },

    #[error("constant pool is full ({0} entries)")]
    PoolOverflow(usize),

    #[error("invalid constant: {0}")]
    InvalidConstant(String),

    #[error("method body is {0} bytes, the limit is 65535")]
    CodeTooLarge(usize),

    #[error("operand stack underflow at offset {at}")]
    StackUnderflow { at: usize },

    #[error("malformed descriptor `{0}`")]
    BadDescriptor(String),

    #[error("malformed class data at offset {at}: {reason}")]
    Malformed { at: usize, reason: String },
}

impl ClassFileError {
    pub(crate) fn malformed(at: usize, reason: impl Into<String>) -> Self {
        ClassFileError::Malformed {
            at,
            reason: reason.into(),
        }
    }
}
