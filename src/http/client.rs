use super::debug::{HttpDebugConfig, redact_header_value, redact_url, render_body};
use crate::trace::SessionTrace;
use reqwest::header::HeaderMap;
use reqwest::{Client, Request};
use serde::Serialize;
use std::fmt;
use std::io::{self, Write};
use std::time::Duration;
#[cfg(test)]
use std::sync::{Arc, Mutex};

/// Thin wrapper over `reqwest::Client` that mirrors each exchange to `--verbose`
/// stderr output (redacted) and to the session trace (raw bodies).
#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
    debug: HttpDebugConfig,
    sink: DebugSink,
    trace: Option<SessionTrace>,
    request_timeout: Option<Duration>,
}

#[derive(Clone)]
enum DebugSink {
    Stderr,
    #[cfg(test)]
    Memory(Arc<Mutex<Vec<String>>>),
}

impl DebugSink {
    fn write_lines(&self, lines: Vec<String>) {
        match self {
            Self::Stderr => {
                let mut stderr = io::stderr().lock();
                for line in lines {
                    let _ = writeln!(stderr, "{line}");
                }
            }
            #[cfg(test)]
            Self::Memory(buffer) => {
                if let Ok(mut captured) = buffer.lock() {
                    captured.extend(lines);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Outgoing,
    Incoming,
}

impl Direction {
    fn marker(self) -> char {
        match self {
            Self::Outgoing => '>',
            Self::Incoming => '<',
        }
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("debug", &self.debug)
            .field("traced", &self.trace.is_some())
            .finish()
    }
}

impl HttpClient {
    pub fn new(inner: Client, debug: HttpDebugConfig) -> Self {
        Self {
            inner,
            debug,
            sink: DebugSink::Stderr,
            trace: None,
            request_timeout: None,
        }
    }

    pub fn with_trace(mut self, trace: SessionTrace) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Per-request ceiling; takes precedence over any timeout on the wrapped client.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    /// POSTs `payload` as JSON and returns the raw status and body. Only transport-level
    /// failures (including the client timeout) are errors; any status is returned as data.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        bearer_token: Option<&str>,
        payload: &T,
    ) -> Result<HttpResponseData, reqwest::Error> {
        let body_json = serde_json::to_string(payload)
            .unwrap_or_else(|err| format!("{{\"_serialization_error\":\"{err}\"}}"));

        let mut builder = self.inner.post(url).json(payload);
        if let Some(token) = bearer_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        let request = builder.build()?;
        self.record_request(&request, &body_json);

        let response = self
            .inner
            .execute(request)
            .await
            .inspect_err(|err| self.record_failure(err))?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .inspect_err(|err| self.record_failure(err))?;

        self.record_response(status, &headers, &body);
        Ok(HttpResponseData { status, body })
    }

    fn record_request(&self, request: &Request, body_json: &str) {
        if self.debug.enabled {
            self.sink
                .write_lines(request_log_lines(self.debug, request, body_json));
        }
        if let Some(trace) = &self.trace {
            trace.log_http_request(
                request.method().as_str(),
                request.url().as_str(),
                request.headers(),
                body_json,
            );
        }
    }

    fn record_response(&self, status: u16, headers: &HeaderMap, body: &str) {
        if self.debug.enabled {
            self.sink
                .write_lines(response_log_lines(self.debug, status, headers, body));
        }
        if let Some(trace) = &self.trace {
            trace.log_http_response(status, headers, body);
        }
    }

    fn record_failure(&self, err: &reqwest::Error) {
        if self.debug.enabled {
            self.sink.write_lines(vec![format!("[http-debug] ! {err}")]);
        }
        if let Some(trace) = &self.trace {
            trace.log_http_error(&err.to_string());
        }
    }

    #[cfg(test)]
    pub fn with_buffer_sink(
        inner: Client,
        debug: HttpDebugConfig,
    ) -> (Self, Arc<Mutex<Vec<String>>>) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let mut client = Self::new(inner, debug);
        client.sink = DebugSink::Memory(Arc::clone(&buffer));
        (client, buffer)
    }
}

fn request_log_lines(debug: HttpDebugConfig, request: &Request, body_json: &str) -> Vec<String> {
    let start = format!(
        "{} {}",
        request.method(),
        redact_url(request.url(), debug.redact_secrets)
    );
    exchange_lines(Direction::Outgoing, start, request.headers(), body_json, debug)
}

fn response_log_lines(
    debug: HttpDebugConfig,
    status: u16,
    headers: &HeaderMap,
    body: &str,
) -> Vec<String> {
    exchange_lines(
        Direction::Incoming,
        format!("HTTP {status}"),
        headers,
        body,
        debug,
    )
}

// Start line, headers, a bare separator, then the rendered body one line at a time.
fn exchange_lines(
    direction: Direction,
    start: String,
    headers: &HeaderMap,
    raw_body: &str,
    debug: HttpDebugConfig,
) -> Vec<String> {
    let marker = direction.marker();
    let prefixed = |text: &str| format!("[http-debug] {marker} {text}");

    let mut lines = vec![prefixed(&start)];
    lines.extend(headers.iter().map(|(name, value)| {
        let shown = redact_header_value(name.as_str(), value, debug.redact_secrets);
        prefixed(&format!("{name}: {shown}"))
    }));
    lines.push(format!("[http-debug] {marker}"));

    let body = render_body(raw_body, debug);
    if body.is_empty() {
        lines.push(prefixed("<empty body>"));
    } else {
        lines.extend(body.lines().map(prefixed));
    }
    lines
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponseData {
    pub status: u16,
    pub body: String,
}
