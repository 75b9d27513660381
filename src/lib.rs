pub mod agent;
pub mod cli;
pub mod config;
pub mod http;
pub mod llm;
pub mod python;
pub mod trace;
pub mod web;

use agent::{Agent, ToolDispatcher};
use anyhow::{Context, Result};
use cli::{CliArgs, CliCommand, ReplSession, run_repl};
use config::AppConfig;
use http::{HttpClient, HttpDebugConfig};
use llm::ollama::{OllamaProvider, REQUEST_TIMEOUT};
use python::{RunMode, SandboxRunner};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use trace::SessionTrace;
use web::{HeadlessChrome, TextExtractor};

pub async fn run(args: CliArgs) -> Result<()> {
    let config = AppConfig::load_with_path(args.config.as_deref())?;

    match args.command() {
        CliCommand::Chat => run_chat(&config, args.verbose).await,
        CliCommand::Fetch { url, timeout } => {
            run_fetch(&config, &url, timeout.map(Duration::from_secs)).await
        }
        CliCommand::Run { file, debug } => run_file(&config, &file, debug).await,
    }
}

async fn run_chat(config: &AppConfig, verbose: bool) -> Result<()> {
    let session_id = generate_session_id();
    let trace = SessionTrace::create(&session_id)?;

    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;
    let http = HttpClient::new(client, HttpDebugConfig::from_verbose(verbose))
        .with_trace(trace.clone());
    let provider = OllamaProvider::new(
        http,
        config.ollama_endpoint.clone(),
        config.ollama_model.clone(),
        config.temperature,
    )
    .with_api_key(config.ollama_api_key.clone());
    let dispatcher = ToolDispatcher::new(text_extractor(config, None), sandbox_runner(config));
    let agent = Agent::new(provider, dispatcher).with_trace(trace.clone());

    println!(
        "localagent session {session_id} (model {} at {})",
        config.ollama_model, config.ollama_endpoint
    );
    let mut session = ReplSession::new(Arc::new(agent), trace.file_path().to_path_buf());
    run_repl(&mut session).await
}

async fn run_fetch(config: &AppConfig, url: &str, timeout: Option<Duration>) -> Result<()> {
    let text = text_extractor(config, timeout).fetch_text(url).await?;
    println!("{text}");
    Ok(())
}

async fn run_file(config: &AppConfig, path: &Path, debug: bool) -> Result<()> {
    let code = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mode = if debug { RunMode::Debug } else { RunMode::Plain };

    let outcome = sandbox_runner(config).run(&code, mode, None).await?;
    println!("{}", outcome.render());
    Ok(())
}

fn text_extractor(config: &AppConfig, timeout: Option<Duration>) -> TextExtractor {
    TextExtractor::new(HeadlessChrome::new(config.chrome_path.clone()))
        .with_load_timeout(timeout.unwrap_or(config.page_load_timeout))
}

fn sandbox_runner(config: &AppConfig) -> SandboxRunner {
    SandboxRunner::new(&config.python_executable).with_timeout(config.sandbox_timeout)
}

fn generate_session_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_millis());
    format!("{millis:x}-{:x}", std::process::id())
}
