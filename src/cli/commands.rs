use std::fmt;

/// Slash commands handled by the REPL itself; they never reach the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    Help,
    History(Option<usize>),
    Reset,
    Trace,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CommandError {
    MissingName,
    Unknown(String),
    Usage(&'static str),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingName => write!(f, "empty command. Try /help"),
            Self::Unknown(name) => write!(f, "unknown command '/{name}'. Try /help"),
            Self::Usage(usage) => f.write_str(usage),
        }
    }
}

struct CommandSpec {
    names: &'static [&'static str],
    synopsis: &'static str,
    summary: &'static str,
}

const COMMANDS: [CommandSpec; 5] = [
    CommandSpec {
        names: &["help"],
        synopsis: "/help",
        summary: "Show this command list",
    },
    CommandSpec {
        names: &["history"],
        synopsis: "/history [n]",
        summary: "Show the conversation log (or its last n messages)",
    },
    CommandSpec {
        names: &["reset"],
        synopsis: "/reset",
        summary: "Start a new conversation with only the system prompt",
    },
    CommandSpec {
        names: &["trace"],
        synopsis: "/trace",
        summary: "Show path to the current trace file",
    },
    CommandSpec {
        names: &["quit", "exit"],
        synopsis: "/quit",
        summary: "Leave the session (also: exit, quit, Ctrl-D)",
    },
];

const HISTORY_USAGE: &str = "usage: /history [n]";
const HISTORY_POSITIVE: &str = "usage: /history [n] (n must be >= 1)";

pub(crate) fn help_text() -> String {
    let mut text = String::from("Available commands:\n");
    for spec in &COMMANDS {
        text.push_str(&format!("  {:<14} {}\n", spec.synopsis, spec.summary));
    }
    text.push_str("Anything else is sent to the model.");
    text
}

impl Command {
    /// Parses a line that starts with `/`. Command names are case-insensitive.
    pub(crate) fn parse(line: &str) -> Result<Self, CommandError> {
        let body = line.trim().strip_prefix('/').unwrap_or_default();
        let (name, argument) = match body.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (body, ""),
        };
        if name.is_empty() {
            return Err(CommandError::MissingName);
        }

        let name = name.to_ascii_lowercase();
        let spec = COMMANDS
            .iter()
            .find(|spec| spec.names.contains(&name.as_str()))
            .ok_or_else(|| CommandError::Unknown(name.clone()))?;

        match spec.names[0] {
            "history" => parse_history_limit(argument).map(Self::History),
            _ if !argument.is_empty() => Err(CommandError::Usage(no_argument_usage(spec))),
            "help" => Ok(Self::Help),
            "reset" => Ok(Self::Reset),
            "trace" => Ok(Self::Trace),
            _ => Ok(Self::Quit),
        }
    }
}

fn no_argument_usage(spec: &CommandSpec) -> &'static str {
    match spec.synopsis {
        "/help" => "usage: /help",
        "/reset" => "usage: /reset",
        "/trace" => "usage: /trace",
        _ => "usage: /quit",
    }
}

fn parse_history_limit(argument: &str) -> Result<Option<usize>, CommandError> {
    if argument.is_empty() {
        return Ok(None);
    }
    match argument.parse::<usize>() {
        Ok(0) => Err(CommandError::Usage(HISTORY_POSITIVE)),
        Ok(limit) => Ok(Some(limit)),
        Err(_) => Err(CommandError::Usage(HISTORY_USAGE)),
    }
}

pub(crate) fn is_command_line(line: &str) -> bool {
    line.starts_with('/')
}

/// Bare `exit` / `quit` also end the session.
pub(crate) fn is_exit_word(line: &str) -> bool {
    ["exit", "quit"]
        .iter()
        .any(|word| line.eq_ignore_ascii_case(word))
}
