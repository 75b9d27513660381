use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::agent::parse::ToolCall;
use crate::python::{ExecutionOutcome, RunMode, SandboxError, SandboxRunner};
use crate::web::{FetchError, HeadlessChrome, PageRenderer, TextExtractor};

pub const WEBGET: &str = "webget";
pub const PYRUN: &str = "pyrun";
pub const WEBGET_MAX_CHARS: usize = 4000;

const UNKNOWN_TOOL_LABEL: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub tool: String,
    pub status: ToolStatus,
    pub payload: String,
}

impl ToolResult {
    fn success(tool: &str, payload: String) -> Self {
        Self {
            tool: tool.to_string(),
            status: ToolStatus::Success,
            payload,
        }
    }

    fn error(tool: &str, payload: String) -> Self {
        Self {
            tool: tool.to_string(),
            status: ToolStatus::Error,
            payload,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ToolStatus::Error
    }

    /// The `[tool_result name=..]` block appended to the conversation.
    pub fn to_message(&self) -> String {
        format!("[tool_result name={}] {}", self.tool, self.payload)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolExecutionError {
    Fetch(FetchError),
    Sandbox(SandboxError),
}

impl Display for ToolExecutionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch(err) => write!(f, "{WEBGET}: {err}"),
            Self::Sandbox(err) => write!(f, "{PYRUN}: {err}"),
        }
    }
}

impl Error for ToolExecutionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Fetch(err) => Some(err),
            Self::Sandbox(err) => Some(err),
        }
    }
}

impl From<FetchError> for ToolExecutionError {
    fn from(err: FetchError) -> Self {
        Self::Fetch(err)
    }
}

impl From<SandboxError> for ToolExecutionError {
    fn from(err: SandboxError) -> Self {
        Self::Sandbox(err)
    }
}

/// Routes a parsed directive to its executor. Executor failures come back as error
/// results, never as `Err`, so the model always gets to see what happened.
#[derive(Debug, Clone)]
pub struct ToolDispatcher<R = HeadlessChrome> {
    extractor: TextExtractor<R>,
    sandbox: SandboxRunner,
}

impl<R: PageRenderer> ToolDispatcher<R> {
    pub fn new(extractor: TextExtractor<R>, sandbox: SandboxRunner) -> Self {
        Self { extractor, sandbox }
    }

    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        match call.tool.as_str() {
            WEBGET => self.dispatch_webget(call).await,
            PYRUN => self.dispatch_pyrun(call).await,
            _ => ToolResult::error(UNKNOWN_TOOL_LABEL, call.directive.clone()),
        }
    }

    async fn dispatch_webget(&self, call: &ToolCall) -> ToolResult {
        let url = call.str_arg("url");
        match self.webget(url).await {
            Ok(text) => ToolResult::success(
                WEBGET,
                format!("URL={url}\n{}", truncate_chars(&text, WEBGET_MAX_CHARS)),
            ),
            Err(err) => ToolResult::error(WEBGET, format!("ERROR: {err}")),
        }
    }

    async fn dispatch_pyrun(&self, call: &ToolCall) -> ToolResult {
        match self.pyrun(call.str_arg("code")).await {
            Ok(outcome) if outcome.timed_out => ToolResult::error(PYRUN, outcome.render()),
            Ok(outcome) => ToolResult::success(PYRUN, outcome.render()),
            Err(err) => ToolResult::error(PYRUN, format!("ERROR: {err}")),
        }
    }

    async fn webget(&self, url: &str) -> Result<String, ToolExecutionError> {
        Ok(self.extractor.fetch_text(url).await?)
    }

    async fn pyrun(&self, code: &str) -> Result<ExecutionOutcome, ToolExecutionError> {
        Ok(self.sandbox.run(code, RunMode::Plain, None).await?)
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
