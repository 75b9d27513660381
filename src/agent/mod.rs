mod conversation;
mod dispatch;
mod loop_impl;
mod parse;
pub(crate) mod prompt;

pub use conversation::{Conversation, Message, Role};
pub use dispatch::{
    PYRUN, ToolDispatcher, ToolExecutionError, ToolResult, ToolStatus, WEBGET, WEBGET_MAX_CHARS,
};
pub use loop_impl::{Agent, TurnHandle, TurnOutcome, spawn_turn};
pub use parse::{ToolCall, parse_tool_call};
pub use prompt::AGENT_SYSTEM_PROMPT;
