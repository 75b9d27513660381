use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxError {
    Io { context: String, message: String },
    Spawn { program: String, message: String },
    Internal(String),
}

impl SandboxError {
    pub(crate) fn io(context: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            message: err.to_string(),
        }
    }
}

impl Display for SandboxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { context, message } => write!(f, "sandbox i/o error ({context}): {message}"),
            Self::Spawn { program, message } => {
                write!(f, "failed to start interpreter '{program}': {message}")
            }
            Self::Internal(msg) => write!(f, "internal sandbox error: {msg}"),
        }
    }
}

impl Error for SandboxError {}

pub type SandboxResult<T> = std::result::Result<T, SandboxError>;
