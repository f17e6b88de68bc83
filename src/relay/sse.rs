//! Server-Sent Events framing.

use serde_json::{json, Value};

/// One named SSE event carrying a JSON payload line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub name: String,
    pub data: String,
}

impl SseEvent {
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    pub fn info(payload: &Value) -> Self {
        Self::new("info", payload.to_string())
    }

    pub fn error(message: &str) -> Self {
        Self::new(
            "error",
            json!({ "type": "error", "message": message }).to_string(),
        )
    }

    pub fn close(code: Option<u16>, reason: &str) -> Self {
        Self::new(
            "close",
            json!({ "type": "close", "code": code, "reason": reason }).to_string(),
        )
    }

    /// Wire form: an `event:` line, a `data:` line, and a blank separator.
    pub fn to_wire(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.name, self.data)
    }
}

/// Build the SSE event for one raw backend frame.
///
/// JSON objects with a string `type` are forwarded verbatim under that event
/// name; anything else is wrapped in a generic `message` event so clients
/// always receive valid JSON.
pub fn forward_event_for(raw: &str) -> SseEvent {
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        if let Some(kind) = value.get("type").and_then(Value::as_str) {
            return SseEvent::new(kind.to_string(), raw.to_string());
        }
    }
    SseEvent::new(
        "message",
        json!({ "type": "message", "data": raw }).to_string(),
    )
}
