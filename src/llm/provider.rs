use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::agent::Message;

/// Model call failures. These abort the current turn and are never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    HttpStatus { status: u16, body: String },
    Transport(String),
    Timeout,
    Parse(String),
}

impl Display for BackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HttpStatus { status, body } => {
                write!(f, "backend request failed with status {status}: {body}")
            }
            Self::Transport(msg) => write!(f, "backend transport error: {msg}"),
            Self::Timeout => write!(f, "backend request timed out"),
            Self::Parse(msg) => write!(f, "backend parse error: {msg}"),
        }
    }
}

impl Error for BackendError {}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

pub trait LlmProvider {
    /// Sends the whole ordered log and returns the single reply text.
    fn chat(
        &self,
        messages: &[Message],
    ) -> impl std::future::Future<Output = BackendResult<String>> + Send;
}
