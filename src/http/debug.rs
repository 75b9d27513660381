use reqwest::Url;
use reqwest::header::HeaderValue;
use serde_json::Value;

const REDACTION: &str = "***REDACTED***";

/// Header and JSON key names whose values never appear in logs.
const SECRET_NAMES: [&str; 8] = [
    "authorization",
    "proxy-authorization",
    "x-api-key",
    "api_key",
    "apikey",
    "key",
    "token",
    "password",
];

/// Settings for `--verbose` HTTP logging to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpDebugConfig {
    pub enabled: bool,
    pub redact_secrets: bool,
    /// Cap on the whole logged body.
    pub max_body_chars: usize,
    /// Cap on each chat message `content`, so page text and tool output do not drown the log.
    pub max_message_chars: usize,
}

impl HttpDebugConfig {
    pub fn from_verbose(verbose: bool) -> Self {
        Self {
            enabled: verbose,
            redact_secrets: true,
            max_body_chars: 4_000,
            max_message_chars: 300,
        }
    }

    #[cfg(test)]
    pub fn disabled() -> Self {
        Self::from_verbose(false)
    }
}

/// Masks the userinfo password and secret query parameters of an endpoint URL.
pub fn redact_url(url: &Url, enable_redaction: bool) -> String {
    if !enable_redaction {
        return url.to_string();
    }

    let mut shown = url.clone();
    if shown.password().is_some() {
        let _ = shown.set_password(Some(REDACTION));
    }
    if url.query().is_some() {
        let masked = url
            .query_pairs()
            .map(|(name, value)| {
                let value = if is_secret_name(&name) {
                    REDACTION.into()
                } else {
                    value
                };
                (name, value)
            })
            .collect::<Vec<_>>();
        shown.query_pairs_mut().clear().extend_pairs(masked);
    }
    shown.to_string()
}

/// Header value for logging. Auth headers keep their scheme (`Bearer ***REDACTED***`).
pub fn redact_header_value(name: &str, value: &HeaderValue, enable_redaction: bool) -> String {
    let Ok(text) = value.to_str() else {
        return "<non-utf8>".to_string();
    };
    if !enable_redaction || !is_secret_name(name) {
        return text.to_string();
    }

    match text.split_once(' ') {
        Some((scheme, _)) if name.to_ascii_lowercase().ends_with("authorization") => {
            format!("{scheme} {REDACTION}")
        }
        _ => REDACTION.to_string(),
    }
}

/// Body text for logging: secrets masked, long message contents shortened, then capped.
/// Non-JSON bodies (error pages, plain-text errors) are only capped.
pub fn render_body(raw: &str, config: HttpDebugConfig) -> String {
    let condensed = match serde_json::from_str::<Value>(raw) {
        Ok(mut json) => {
            if config.redact_secrets {
                mask_secret_fields(&mut json);
            }
            shorten_message_contents(&mut json, config.max_message_chars);
            serde_json::to_string(&json).unwrap_or_else(|_| raw.to_string())
        }
        Err(_) => raw.to_string(),
    };
    truncate_for_log(&condensed, config.max_body_chars)
}

pub fn truncate_for_log(input: &str, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        None => input.to_string(),
        Some((cut, _)) => {
            let dropped = input[cut..].chars().count();
            format!("{}... <truncated {dropped} chars>", &input[..cut])
        }
    }
}

fn mask_secret_fields(value: &mut Value) {
    match value {
        Value::Object(fields) => fields.iter_mut().for_each(|(name, field)| {
            if is_secret_name(name) {
                *field = Value::String(REDACTION.to_string());
            } else {
                mask_secret_fields(field);
            }
        }),
        Value::Array(items) => items.iter_mut().for_each(mask_secret_fields),
        _ => {}
    }
}

// Covers both the request `messages[].content` and the reply `message.content`.
fn shorten_message_contents(value: &mut Value, max_chars: usize) {
    let Value::Object(fields) = value else {
        return;
    };
    if let Some(Value::Array(messages)) = fields.get_mut("messages") {
        for message in messages {
            shorten_content(message, max_chars);
        }
    }
    if let Some(message) = fields.get_mut("message") {
        shorten_content(message, max_chars);
    }
}

fn shorten_content(message: &mut Value, max_chars: usize) {
    if let Some(Value::String(content)) = message.get_mut("content") {
        *content = truncate_for_log(content, max_chars);
    }
}

fn is_secret_name(name: &str) -> bool {
    SECRET_NAMES
        .iter()
        .any(|secret| secret.eq_ignore_ascii_case(name))
}
