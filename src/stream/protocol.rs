//! Wire protocol for the transcription backend.
//!
//! Outbound: one JSON metadata frame announcing the stream format, then raw
//! binary PCM16 frames. Inbound: JSON events tagged by a `type` field.

use crate::error::{PipelineError, PipelineResult};
use serde::Serialize;
use serde_json::Value;

/// First frame on every session; the backend uses it to configure decoding
/// before any audio arrives.
#[derive(Debug, Serialize)]
pub struct StartMeta {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(rename = "sampleRate")]
    sample_rate: u32,
}

impl StartMeta {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            kind: "start",
            sample_rate,
        }
    }
}

/// Serialized metadata frame for the given wire rate.
pub fn start_meta_json(sample_rate: u32) -> PipelineResult<String> {
    serde_json::to_string(&StartMeta::new(sample_rate))
        .map_err(|err| PipelineError::Protocol(format!("failed to encode start metadata: {err}")))
}

/// Inbound event from the backend. Unknown `type` values are preserved rather
/// than rejected so a newer backend does not break older clients.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEvent {
    Partial { text: String },
    Final { text: String },
    Error { text: String },
    Other { kind: String, payload: Value },
}

/// Parse one inbound text frame.
///
/// Frames that are not JSON objects, or known event types missing their
/// `text` field, are protocol errors; the session logs and skips them rather
/// than tearing down.
pub fn parse_event(raw: &str) -> PipelineResult<TranscriptEvent> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| PipelineError::Protocol(format!("malformed event frame: {err}")))?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| PipelineError::Protocol("event frame missing string 'type'".to_string()))?;

    match kind {
        "partial" | "final" | "error" => {
            let text = value
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    PipelineError::Protocol(format!("'{kind}' event missing string 'text'"))
                })?
                .to_string();
            Ok(match kind {
                "partial" => TranscriptEvent::Partial { text },
                "final" => TranscriptEvent::Final { text },
                _ => TranscriptEvent::Error { text },
            })
        }
        other => Ok(TranscriptEvent::Other {
            kind: other.to_string(),
            payload: value,
        }),
    }
}
