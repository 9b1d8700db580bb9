use classfile::ClassFileError;
use parser::ParseError;
use thiserror::Error;

pub type Result<T, E = CompileError> = std::result::Result<T, E>;

/// The single fatal error of a compile.
///
/// `message` already carries the ` in line N` suffix when `line` is set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CompileError {
    pub message: String,
    pub line: Option<u32>,
    #[source]
    pub cause: Option<ClassFileError>,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            cause: None,
        }
    }

    /// Attach the BASIC line being compiled, unless one is already known.
    pub fn in_line(mut self, line: Option<u32>) -> Self {
        if let (None, Some(line)) = (self.line, line) {
            self.message = format!("{} in line {line}", self.message);
            self.line = Some(line);
        }
        self
    }
}

impl From<ClassFileError> for CompileError {
    fn from(err: ClassFileError) -> Self {
        Self {
            message: err.to_string(),
            line: None,
            cause: Some(err),
        }
    }
}

impl From<ParseError> for CompileError {
    fn from(err: ParseError) -> Self {
        Self::new(err.to_string())
    }
}
