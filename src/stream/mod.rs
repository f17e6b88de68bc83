//! WebSocket streaming session to the transcription backend.
//!
//! One session thread owns the socket end to end: it announces the stream
//! format, forwards encoded PCM16 chunks from a capture tap, and folds the
//! backend's partial/final transcript events into an accumulator. The socket
//! read is driven by a short timeout so sends and receives interleave on the
//! same thread without blocking either direction.

mod protocol;
mod session;
mod transcript;

pub use protocol::{parse_event, start_meta_json, StartMeta, TranscriptEvent};
pub use session::{
    validate_stream_url, Inbound, SessionState, StreamSession, Transport, WsTransport,
};
pub use transcript::{TranscriptAccumulator, Utterance};
