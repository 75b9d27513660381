use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::agent::conversation::{Conversation, Role};
use crate::agent::dispatch::{ToolDispatcher, ToolResult};
use crate::agent::parse::{ToolCall, parse_tool_call};
use crate::llm::{BackendResult, LlmProvider};
use crate::trace::SessionTrace;
use crate::web::{HeadlessChrome, PageRenderer};

#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Raw reply to the user message; holds the directive when a tool was used.
    pub first_reply: String,
    pub tool_call: Option<ToolCall>,
    pub tool_result: Option<ToolResult>,
    pub final_answer: String,
}

impl TurnOutcome {
    pub fn used_tool(&self) -> bool {
        self.tool_call.is_some()
    }
}

pub type TurnHandle = JoinHandle<(Conversation, BackendResult<TurnOutcome>)>;

pub struct Agent<P, R = HeadlessChrome> {
    provider: P,
    dispatcher: ToolDispatcher<R>,
    trace: Option<SessionTrace>,
}

impl<P: LlmProvider, R: PageRenderer> Agent<P, R> {
    pub fn new(provider: P, dispatcher: ToolDispatcher<R>) -> Self {
        Self {
            provider,
            dispatcher,
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: SessionTrace) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Runs one user turn: at most one tool call and at most two model requests.
    ///
    /// Every message is appended to `conversation` as soon as it exists, so when a model
    /// request fails the log keeps everything up to that point and the error is returned.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        user_text: &str,
    ) -> BackendResult<TurnOutcome> {
        conversation.push(Role::User, user_text);
        if let Some(trace) = &self.trace {
            trace.log_user_input(user_text);
        }

        let first_reply = self.ask(conversation, 1).await?;
        conversation.push(Role::Assistant, first_reply.as_str());

        let Some(call) = parse_tool_call(&first_reply) else {
            return Ok(TurnOutcome {
                final_answer: first_reply.clone(),
                first_reply,
                tool_call: None,
                tool_result: None,
            });
        };

        if let Some(trace) = &self.trace {
            trace.log_tool_request(&call.tool, &call.directive);
        }
        let result = self.dispatcher.dispatch(&call).await;
        let result_message = result.to_message();
        if let Some(trace) = &self.trace {
            trace.log_tool_result(&result_message);
        }
        conversation.push(Role::ToolResult, result_message);

        // The second reply is final even if it contains another directive.
        let final_answer = self.ask(conversation, 2).await?;
        conversation.push(Role::Assistant, final_answer.as_str());

        Ok(TurnOutcome {
            first_reply,
            tool_call: Some(call),
            tool_result: Some(result),
            final_answer,
        })
    }

    async fn ask(&self, conversation: &Conversation, pass: usize) -> BackendResult<String> {
        match self.provider.chat(conversation.messages()).await {
            Ok(reply) => {
                if let Some(trace) = &self.trace {
                    trace.log_model_reply(pass, &reply);
                }
                Ok(reply)
            }
            Err(err) => {
                if let Some(trace) = &self.trace {
                    trace.log_turn_error(&format!("pass {pass}: {err}"));
                }
                Err(err)
            }
        }
    }
}

/// Runs a turn as a spawned task that owns the conversation and hands it back on
/// completion. Awaiting, detaching or aborting the handle is up to the caller.
pub fn spawn_turn<P, R>(
    agent: Arc<Agent<P, R>>,
    mut conversation: Conversation,
    user_text: String,
) -> TurnHandle
where
    P: LlmProvider + Send + Sync + 'static,
    R: PageRenderer,
{
    tokio::spawn(async move {
        let outcome = agent.run_turn(&mut conversation, &user_text).await;
        (conversation, outcome)
    })
}
