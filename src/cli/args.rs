use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser, Clone, PartialEq, Eq)]
#[command(name = "localagent")]
#[command(
    about = "Local chat agent that can read web pages and run Python snippets",
    long_about = "Local chat agent that can read web pages and run Python snippets\n\nConfig file loading:\n  - --config <path> (explicit file, overrides default path discovery)\n  - Default probe path when --config is not provided:\n    1. $XDG_CONFIG_HOME/localagent/config.toml\n    2. ~/.config/localagent/config.toml"
)]
pub struct CliArgs {
    /// Load config from this file path instead of the default discovery path.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Log redacted HTTP traffic with the model backend to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

impl CliArgs {
    pub fn command(&self) -> CliCommand {
        self.command.clone().unwrap_or(CliCommand::Chat)
    }
}

#[derive(Debug, Subcommand, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// Interactive conversation with the model (default).
    Chat,
    /// Render a page in headless Chrome and print its visible text.
    Fetch {
        url: String,
        /// Page load timeout in seconds.
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },
    /// Run a Python file in a scratch directory and print its exit code and output.
    Run {
        file: PathBuf,
        /// Run under pdb.
        #[arg(long)]
        debug: bool,
    },
}
