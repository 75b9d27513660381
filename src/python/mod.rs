mod error;
mod runner;

pub use error::{SandboxError, SandboxResult};
pub use runner::{
    DEFAULT_PYTHON, DEFAULT_RUN_TIMEOUT, ExecutionOutcome, RunMode, SNIPPET_FILE_NAME,
    SandboxRunner, TIMEOUT_STDERR,
};
