use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub tool: String,
    pub args: Map<String, Value>,
    /// The directive line exactly as the model wrote it (trimmed).
    pub directive: String,
}

impl ToolCall {
    /// String argument lookup; missing or non-string values read as empty.
    pub fn str_arg(&self, name: &str) -> &str {
        self.args.get(name).and_then(Value::as_str).unwrap_or("")
    }
}

/// Finds the first line that is a standalone JSON object carrying both `tool` and `args`.
pub fn parse_tool_call(reply: &str) -> Option<ToolCall> {
    reply.lines().map(str::trim).find_map(decode_candidate)
}

fn decode_candidate(line: &str) -> Option<ToolCall> {
    if !(line.starts_with('{') && line.ends_with('}')) {
        return None;
    }

    let Ok(Value::Object(mut object)) = serde_json::from_str::<Value>(line) else {
        return None;
    };
    if !object.contains_key("tool") || !object.contains_key("args") {
        return None;
    }

    let tool = match object.remove("tool") {
        Some(Value::String(name)) => name,
        Some(other) => other.to_string(),
        None => return None,
    };
    let args = match object.remove("args") {
        Some(Value::Object(args)) => args,
        _ => Map::new(),
    };

    Some(ToolCall {
        tool,
        args,
        directive: line.to_string(),
    })
}
