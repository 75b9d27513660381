pub mod ollama;
pub mod provider;

pub use provider::{BackendError, BackendResult, LlmProvider};
