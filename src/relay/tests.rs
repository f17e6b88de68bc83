use super::*;
use crate::error::{PipelineError, PipelineResult};
use std::collections::VecDeque;

struct ScriptedBackend {
    script: VecDeque<PipelineResult<BackendMessage>>,
    closed: bool,
}

impl ScriptedBackend {
    fn new(script: Vec<PipelineResult<BackendMessage>>) -> Self {
        Self {
            script: script.into(),
            closed: false,
        }
    }
}

impl BackendSource for ScriptedBackend {
    fn next_message(&mut self) -> PipelineResult<BackendMessage> {
        self.script.pop_front().unwrap_or(Ok(BackendMessage::Closed {
            code: None,
            reason: String::new(),
        }))
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Vec<SseEvent>,
    comments: Vec<String>,
    liveness_checks: usize,
    writes: usize,
    fail_after: Option<usize>,
}

impl RecordingSink {
    /// True once the scripted client has disconnected. Every event, comment,
    /// and liveness check counts as one write against `fail_after`.
    fn gone(&mut self) -> bool {
        if let Some(limit) = self.fail_after {
            if self.writes >= limit {
                return true;
            }
        }
        self.writes += 1;
        false
    }
}

impl EventSink for RecordingSink {
    fn write_event(&mut self, event: &SseEvent) -> PipelineResult<()> {
        if self.gone() {
            return Err(PipelineError::Transport("client gone".to_string()));
        }
        self.events.push(event.clone());
        Ok(())
    }

    fn write_comment(&mut self, text: &str) -> PipelineResult<()> {
        if self.gone() {
            return Err(PipelineError::Transport("client gone".to_string()));
        }
        self.comments.push(text.to_string());
        Ok(())
    }

    fn is_alive(&mut self) -> bool {
        if self.gone() {
            return false;
        }
        self.liveness_checks += 1;
        true
    }
}

#[test]
fn sse_wire_format() {
    let event = SseEvent::new("final", r#"{"type":"final","text":"hi"}"#);
    assert_eq!(
        event.to_wire(),
        "event: final\ndata: {\"type\":\"final\",\"text\":\"hi\"}\n\n"
    );
}

#[test]
fn typed_frames_forward_under_their_own_event_name() {
    let event = forward_event_for(r#"{"type":"partial","text":"hel"}"#);
    assert_eq!(event.name, "partial");
    assert_eq!(event.data, r#"{"type":"partial","text":"hel"}"#);
}

#[test]
fn untyped_frames_are_wrapped_as_message_events() {
    let event = forward_event_for("plain text frame");
    assert_eq!(event.name, "message");
    let payload: serde_json::Value = serde_json::from_str(&event.data).unwrap();
    assert_eq!(payload["type"], "message");
    assert_eq!(payload["data"], "plain text frame");

    let no_type = forward_event_for(r#"{"text":"hi"}"#);
    assert_eq!(no_type.name, "message");
}

#[test]
fn failed_backend_connect_emits_exactly_one_error_event() {
    let backend: PipelineResult<ScriptedBackend> = Err(PipelineError::UpstreamUnavailable(
        "connection refused".to_string(),
    ));
    let mut sink = RecordingSink::default();
    run_bridge(backend, &mut sink);

    assert_eq!(sink.events.len(), 1);
    assert_eq!(sink.events[0].name, "error");
    let payload: serde_json::Value = serde_json::from_str(&sink.events[0].data).unwrap();
    assert_eq!(payload["type"], "error");
    assert!(payload["message"]
        .as_str()
        .unwrap()
        .contains("connection refused"));
}

#[test]
fn connected_backend_gets_info_then_forwarded_frames_then_close() {
    let backend = ScriptedBackend::new(vec![
        Ok(BackendMessage::Text(
            r#"{"type":"partial","text":"hel"}"#.to_string(),
        )),
        Ok(BackendMessage::Idle),
        Ok(BackendMessage::Text(
            r#"{"type":"final","text":"hello"}"#.to_string(),
        )),
        Ok(BackendMessage::Closed {
            code: Some(1000),
            reason: "done".to_string(),
        }),
    ]);
    let mut sink = RecordingSink::default();
    run_bridge(Ok(backend), &mut sink);

    let names: Vec<&str> = sink.events.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["info", "partial", "final", "close"]);
    // The idle window checked the (healthy) sink instead of emitting anything.
    assert_eq!(sink.liveness_checks, 1);

    let close: serde_json::Value = serde_json::from_str(&sink.events[3].data).unwrap();
    assert_eq!(close["code"], 1000);
    assert_eq!(close["reason"], "done");
}

#[test]
fn backend_read_error_ends_the_stream_with_an_error_event() {
    let backend = ScriptedBackend::new(vec![
        Ok(BackendMessage::Text(r#"{"type":"info","x":1}"#.to_string())),
        Err(PipelineError::Transport("reset by peer".to_string())),
    ]);
    let mut sink = RecordingSink::default();
    run_bridge(Ok(backend), &mut sink);

    let names: Vec<&str> = sink.events.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["info", "info", "error"]);
}

#[test]
fn client_disconnect_closes_the_backend_and_stops() {
    // Sink accepts the info event, then refuses everything.
    let mut sink = RecordingSink {
        fail_after: Some(1),
        ..Default::default()
    };
    let mut backend = ScriptedBackend::new(vec![
        Ok(BackendMessage::Text(
            r#"{"type":"partial","text":"x"}"#.to_string(),
        )),
        Ok(BackendMessage::Text(
            r#"{"type":"final","text":"xy"}"#.to_string(),
        )),
    ]);

    // run_bridge takes ownership; observe the close through a reference shim.
    struct Shim<'a>(&'a mut ScriptedBackend);
    impl BackendSource for Shim<'_> {
        fn next_message(&mut self) -> PipelineResult<BackendMessage> {
            self.0.next_message()
        }
        fn close(&mut self) {
            self.0.close();
        }
    }

    run_bridge(Ok(Shim(&mut backend)), &mut sink);
    assert!(backend.closed);
    assert_eq!(sink.events.len(), 1);
    assert_eq!(sink.events[0].name, "info");
}

#[test]
fn client_disconnect_is_noticed_while_the_backend_is_idle() {
    // A quiet backend produces nothing but read-window timeouts; the first
    // idle liveness check after the client vanishes must close the backend,
    // not the next keep-alive.
    let mut sink = RecordingSink {
        fail_after: Some(1),
        ..Default::default()
    };
    let mut backend = ScriptedBackend::new(vec![
        Ok(BackendMessage::Idle),
        Ok(BackendMessage::Idle),
        Ok(BackendMessage::Idle),
    ]);

    struct Shim<'a>(&'a mut ScriptedBackend);
    impl BackendSource for Shim<'_> {
        fn next_message(&mut self) -> PipelineResult<BackendMessage> {
            self.0.next_message()
        }
        fn close(&mut self) {
            self.0.close();
        }
    }

    run_bridge(Ok(Shim(&mut backend)), &mut sink);
    assert!(backend.closed);
    // Only the info event made it out; the remaining idle script was never
    // consumed and no keep-alive comment was due.
    assert_eq!(sink.events.len(), 1);
    assert_eq!(sink.events[0].name, "info");
    assert!(sink.comments.is_empty());
    assert!(!backend.script.is_empty());
}
