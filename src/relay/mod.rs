//! Server-side relay: bridges the backend WebSocket to browser-friendly
//! Server-Sent Events.
//!
//! One bridge per client connection. The bridge dials the backend, forwards
//! every backend frame as an SSE event named after its `type` field, and
//! tears the backend connection down the moment the client goes away. A
//! single loop owns both ends so there is exactly one teardown path.

mod bridge;
mod sse;
#[cfg(test)]
mod tests;

pub use bridge::{run_bridge, serve, BackendMessage, BackendSource, EventSink, WsBackendSource};
pub use sse::{forward_event_for, SseEvent};
