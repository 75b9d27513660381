use crate::agent::{Agent, Conversation, TurnOutcome, spawn_turn};
use crate::cli::commands::{Command, help_text, is_command_line, is_exit_word};
use crate::llm::LlmProvider;
use crate::web::{HeadlessChrome, PageRenderer};
use anyhow::Result;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

const PROMPT: &str = "you> ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Continue,
    Quit,
}

/// Interactive session state: one agent and the conversation it is currently working on.
pub struct ReplSession<P, R = HeadlessChrome> {
    agent: Arc<Agent<P, R>>,
    conversation: Conversation,
    trace_path: PathBuf,
}

impl<P, R> ReplSession<P, R>
where
    P: LlmProvider + Send + Sync + 'static,
    R: PageRenderer,
{
    pub fn new(agent: Arc<Agent<P, R>>, trace_path: PathBuf) -> Self {
        Self {
            agent,
            conversation: Conversation::new(),
            trace_path,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub async fn handle_line(&mut self, line: &str, out: &mut impl Write) -> Result<LineOutcome> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(LineOutcome::Continue);
        }
        if is_exit_word(line) {
            return Ok(LineOutcome::Quit);
        }

        if is_command_line(line) {
            return match Command::parse(line) {
                Ok(command) => self.handle_command(command, out),
                Err(err) => {
                    writeln!(out, "{err}")?;
                    Ok(LineOutcome::Continue)
                }
            };
        }

        self.handle_turn(line, out).await?;
        Ok(LineOutcome::Continue)
    }

    fn handle_command(&mut self, command: Command, out: &mut impl Write) -> Result<LineOutcome> {
        match command {
            Command::Help => writeln!(out, "{}", help_text())?,
            Command::History(limit) => {
                let messages = self.conversation.messages();
                let skip = limit.map_or(0, |n| messages.len().saturating_sub(n));
                for (index, message) in messages.iter().enumerate().skip(skip) {
                    writeln!(out, "[{index}] {}\n{}", message.role.label(), message.content)?;
                }
            }
            Command::Reset => {
                self.conversation = Conversation::new();
                writeln!(out, "Conversation reset")?;
            }
            Command::Trace => writeln!(out, "Trace file: {}", self.trace_path.display())?,
            Command::Quit => return Ok(LineOutcome::Quit),
        }
        Ok(LineOutcome::Continue)
    }

    async fn handle_turn(&mut self, text: &str, out: &mut impl Write) -> Result<()> {
        let conversation = std::mem::take(&mut self.conversation);
        let handle = spawn_turn(Arc::clone(&self.agent), conversation, text.to_string());

        match handle.await {
            Ok((conversation, outcome)) => {
                self.conversation = conversation;
                match outcome {
                    Ok(outcome) => write!(out, "{}", render_turn(&outcome))?,
                    Err(err) => writeln!(out, "error: {err}")?,
                }
            }
            Err(err) => {
                writeln!(
                    out,
                    "error: turn task failed: {err}; starting a new conversation"
                )?;
            }
        }
        Ok(())
    }
}

pub(crate) fn render_turn(outcome: &TurnOutcome) -> String {
    match &outcome.tool_result {
        None => format!("[assistant]\n{}\n", outcome.final_answer),
        Some(result) => format!(
            "[assistant raw]\n{}\n\n{}\n\n[assistant final]\n{}\n",
            outcome.first_reply,
            result.to_message(),
            outcome.final_answer
        ),
    }
}

/// Reads stdin line by line until EOF or a quit command.
pub async fn run_repl<P, R>(session: &mut ReplSession<P, R>) -> Result<()>
where
    P: LlmProvider + Send + Sync + 'static,
    R: PageRenderer,
{
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = io::stdout();

    writeln!(stdout, "Type a message, /help for commands, /quit to leave.")?;
    loop {
        write!(stdout, "{PROMPT}")?;
        stdout.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(stdout)?;
            break;
        };
        if session.handle_line(&line, &mut stdout).await? == LineOutcome::Quit {
            break;
        }
        stdout.flush()?;
    }

    Ok(())
}
