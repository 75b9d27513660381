use anyhow::{Result, anyhow, bail};
use reqwest::header::HeaderMap;
use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::http::debug::redact_header_value;

const TRACE_SUBDIR: [&str; 2] = ["localagent", "traces"];
const EMPTY_MARKER: &str = "<empty>";

/// Column tag of a trace line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceKind {
    UserInput,
    ModelReply,
    ToolRequest,
    ToolResult,
    TurnError,
    HttpRequest,
    HttpResponse,
    HttpError,
}

impl TraceKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::UserInput => "ai.in",
            Self::ModelReply => "ai.out",
            Self::ToolRequest => "tool.req",
            Self::ToolResult => "tool.res",
            Self::TurnError => "ai.err",
            Self::HttpRequest => "ai.http.in",
            Self::HttpResponse => "ai.http.out",
            Self::HttpError => "ai.http.err",
        }
    }
}

/// Append-only, owner-readable log of everything a chat session sent and received.
///
/// Cloning shares the underlying file. Write failures never interrupt the session; the first
/// one is reported on stderr and later ones are dropped silently.
#[derive(Clone)]
pub struct SessionTrace {
    shared: Arc<TraceFile>,
}

struct TraceFile {
    path: PathBuf,
    out: Mutex<BufWriter<File>>,
    warned: AtomicBool,
}

impl SessionTrace {
    pub fn create(session_id: &str) -> Result<Self> {
        let dir = resolve_trace_dir_from_env()?;
        Self::open_in(&dir, session_id)
    }

    #[cfg(test)]
    pub fn create_in_temp_dir(session_id: &str, trace_dir: &Path) -> Result<Self> {
        Self::open_in(trace_dir, session_id)
    }

    fn open_in(dir: &Path, session_id: &str) -> Result<Self> {
        fs::create_dir_all(dir)
            .map_err(|err| anyhow!("Failed to create trace directory {}: {err}", dir.display()))?;

        let started = OffsetDateTime::now_utc().unix_timestamp();
        let path = dir.join(format!("session-{session_id}-{started}.log"));
        let file = open_owner_only(&path)
            .map_err(|err| anyhow!("Failed to create trace file {}: {err}", path.display()))?;

        Ok(Self {
            shared: Arc::new(TraceFile {
                path,
                out: Mutex::new(BufWriter::new(file)),
                warned: AtomicBool::new(false),
            }),
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.shared.path
    }

    pub fn log_user_input(&self, text: &str) {
        self.record(TraceKind::UserInput, text);
    }

    /// `pass` is 1 for the reply to the user message and 2 for the reply after a tool result.
    pub fn log_model_reply(&self, pass: usize, text: &str) {
        self.record(TraceKind::ModelReply, &format!("pass {pass}"));
        self.record(TraceKind::ModelReply, text);
    }

    pub fn log_tool_request(&self, tool: &str, directive: &str) {
        self.record(TraceKind::ToolRequest, &format!("{tool} {directive}"));
    }

    pub fn log_tool_result(&self, text: &str) {
        self.record(TraceKind::ToolResult, text);
    }

    pub fn log_turn_error(&self, message: &str) {
        self.record(TraceKind::TurnError, message);
    }

    pub fn log_http_request(&self, method: &str, url: &str, headers: &HeaderMap, body: &str) {
        self.record(TraceKind::HttpRequest, &format!("{method} {url}"));
        self.record_headers(TraceKind::HttpRequest, headers);
        self.record(TraceKind::HttpRequest, body);
    }

    pub fn log_http_response(&self, status: u16, headers: &HeaderMap, body: &str) {
        self.record(TraceKind::HttpResponse, &format!("HTTP {status}"));
        self.record_headers(TraceKind::HttpResponse, headers);
        self.record(TraceKind::HttpResponse, body);
    }

    pub fn log_http_error(&self, message: &str) {
        self.record(TraceKind::HttpError, message);
    }

    /// Writes one trace line per line of `text`; empty text becomes a single marker line.
    pub fn record(&self, kind: TraceKind, text: &str) {
        let stamp = timestamp();
        let entry = if text.is_empty() {
            format_line(&stamp, kind, EMPTY_MARKER)
        } else {
            text.lines()
                .map(|line| format_line(&stamp, kind, line))
                .collect::<String>()
        };
        self.append(&entry);
    }

    fn record_headers(&self, kind: TraceKind, headers: &HeaderMap) {
        let stamp = timestamp();
        let entry = headers
            .iter()
            .map(|(name, value)| {
                let shown = redact_header_value(name.as_str(), value, true);
                format_line(&stamp, kind, &format!("{}: {shown}", name.as_str()))
            })
            .collect::<String>();
        if !entry.is_empty() {
            self.append(&entry);
        }
    }

    fn append(&self, entry: &str) {
        let written = match self.shared.out.lock() {
            Ok(mut out) => out
                .write_all(entry.as_bytes())
                .and_then(|()| out.flush())
                .map_err(|err| err.to_string()),
            Err(_) => Err("trace writer lock poisoned".to_string()),
        };
        if let Err(reason) = written {
            self.warn_once(&reason);
        }
    }

    fn warn_once(&self, reason: &str) {
        if !self.shared.warned.swap(true, Ordering::Relaxed) {
            eprintln!(
                "localagent trace warning: cannot write {}: {reason}",
                self.shared.path.display()
            );
        }
    }
}

fn format_line(stamp: &str, kind: TraceKind, text: &str) -> String {
    format!("[{stamp}] [{:<11}] {text}\n", kind.label())
}

fn timestamp() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

#[cfg(unix)]
fn open_owner_only(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_owner_only(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

pub fn resolve_trace_dir_from_env() -> Result<PathBuf> {
    resolve_trace_dir(
        env::var("XDG_STATE_HOME").ok().as_deref(),
        dirs::home_dir().as_deref(),
    )
}

fn resolve_trace_dir(xdg_state_home: Option<&str>, home_dir: Option<&Path>) -> Result<PathBuf> {
    let state_root = match xdg_state_home.map(str::trim) {
        Some("") => bail!("Failed to resolve trace path: XDG_STATE_HOME is set but empty"),
        Some(xdg) => PathBuf::from(xdg),
        None => home_dir
            .ok_or_else(|| anyhow!("Failed to resolve trace path: HOME directory is unavailable"))?
            .join(".local")
            .join("state"),
    };
    Ok(TRACE_SUBDIR
        .iter()
        .fold(state_root, |path, segment| path.join(segment)))
}
