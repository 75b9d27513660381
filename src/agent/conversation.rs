use crate::agent::prompt::AGENT_SYSTEM_PROMPT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    ToolResult,
}

impl Role {
    /// Role name sent to the backend. Tool results travel as `user` turns.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User | Self::ToolResult => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::ToolResult => "tool-result",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Append-only message log. The first entry is always the system instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::with_system_prompt(AGENT_SYSTEM_PROMPT)
    }

    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::new(Role::System, prompt)],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Pairs with `len` for clippy's `len_without_is_empty`. Always false, since every
    /// conversation starts with its system message.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub(crate) fn push(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(Message::new(role, content));
    }
}
