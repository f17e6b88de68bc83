//! The streaming session itself: connection lifecycle, chunk forwarding, and
//! inbound event pumping over a single socket-owning thread.

use super::protocol::{parse_event, start_meta_json, TranscriptEvent};
use super::transcript::TranscriptAccumulator;
use crate::audio::{encode_chunk, CaptureSession, TARGET_RATE};
use crate::error::{PipelineError, PipelineResult};
use crate::{log_debug, log_debug_content};
use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};
use url::Url;

/// How long one socket read may block before the loop gets the send side back.
const READ_POLL: Duration = Duration::from_millis(20);

/// Backend events the session does not consume are kept for the caller, up
/// to this many; a chatty backend cannot grow the buffer unbounded.
const MAX_UNHANDLED_EVENTS: usize = 64;

/// Session lifecycle. `Connecting` covers the dial and the format
/// announcement; `Closing` is the drain window where outbound audio has
/// stopped but trailing recognition events are still read; teardown always
/// settles at `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Closing,
}

impl SessionState {
    pub fn label(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Open => "open",
            SessionState::Closing => "closing",
        }
    }
}

/// One inbound unit from the transport. Binary frames from the backend carry
/// nothing we consume and are dropped at the transport edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Closed,
}

/// Socket abstraction so the session loop can be exercised without a network.
pub trait Transport: Send {
    fn send_text(&mut self, text: &str) -> PipelineResult<()>;
    fn send_binary(&mut self, bytes: Vec<u8>) -> PipelineResult<()>;
    /// Non-blocking-ish poll: `Ok(None)` when nothing arrived within the
    /// transport's read window.
    fn poll_message(&mut self) -> PipelineResult<Option<Inbound>>;
    fn close(&mut self);
}

/// Reject anything that is not a ws:// or wss:// URL before dialing.
pub fn validate_stream_url(raw: &str) -> PipelineResult<Url> {
    let url = Url::parse(raw)
        .map_err(|err| PipelineError::InvalidConfig(format!("invalid stream URL '{raw}': {err}")))?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(PipelineError::InvalidConfig(format!(
            "stream URL must use ws or wss, got '{other}'"
        ))),
    }
}

/// tungstenite-backed transport with a short read timeout so `poll_message`
/// doubles as the loop's pacing.
pub struct WsTransport {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
}

impl WsTransport {
    pub fn connect(url: &Url) -> PipelineResult<Self> {
        let (socket, _response) = tungstenite::connect(url.as_str()).map_err(|err| {
            PipelineError::UpstreamUnavailable(format!("failed to connect to {url}: {err}"))
        })?;

        match socket.get_ref() {
            MaybeTlsStream::Plain(stream) => {
                stream.set_read_timeout(Some(READ_POLL)).map_err(|err| {
                    PipelineError::Transport(format!("failed to set read timeout: {err}"))
                })?;
            }
            MaybeTlsStream::NativeTls(stream) => {
                stream
                    .get_ref()
                    .set_read_timeout(Some(READ_POLL))
                    .map_err(|err| {
                        PipelineError::Transport(format!("failed to set read timeout: {err}"))
                    })?;
            }
            _ => {}
        }

        Ok(Self { socket })
    }
}

impl Transport for WsTransport {
    fn send_text(&mut self, text: &str) -> PipelineResult<()> {
        self.socket
            .send(Message::text(text))
            .map_err(|err| PipelineError::Transport(format!("text send failed: {err}")))
    }

    fn send_binary(&mut self, bytes: Vec<u8>) -> PipelineResult<()> {
        self.socket
            .send(Message::binary(bytes))
            .map_err(|err| PipelineError::Transport(format!("binary send failed: {err}")))
    }

    fn poll_message(&mut self) -> PipelineResult<Option<Inbound>> {
        match self.socket.read() {
            Ok(Message::Text(text)) => Ok(Some(Inbound::Text(text.to_string()))),
            Ok(Message::Close(_)) => Ok(Some(Inbound::Closed)),
            // Ping/pong is handled inside tungstenite; binary has no meaning
            // on the inbound side.
            Ok(_) => Ok(None),
            Err(tungstenite::Error::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                Ok(None)
            }
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                Ok(Some(Inbound::Closed))
            }
            Err(err) => Err(PipelineError::Transport(format!("socket read failed: {err}"))),
        }
    }

    fn close(&mut self) {
        let _ = self.socket.close(None);
        let _ = self.socket.flush();
    }
}

/// Owns one transport plus the transcript state derived from it.
///
/// The session is single-threaded on purpose: `forward_chunks` interleaves
/// chunk sends with inbound polls, so socket access never needs a lock.
pub struct StreamSession {
    transport: Box<dyn Transport>,
    state: SessionState,
    transcript: TranscriptAccumulator,
    chunks_sent: usize,
    chunks_dropped: usize,
    last_error: Option<String>,
    unhandled: Vec<TranscriptEvent>,
    torn_down: bool,
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("state", &self.state)
            .field("chunks_sent", &self.chunks_sent)
            .field("chunks_dropped", &self.chunks_dropped)
            .field("last_error", &self.last_error)
            .field("torn_down", &self.torn_down)
            .finish_non_exhaustive()
    }
}

impl StreamSession {
    /// Start streaming against a live capture session. Both preconditions
    /// fail fast without any connection attempt: the capture session must be
    /// ready and the URL must be a ws/wss address.
    pub fn start(capture: &CaptureSession, raw_url: &str) -> PipelineResult<Self> {
        if !capture.is_ready() {
            return Err(PipelineError::InvalidConfig(
                "cannot start streaming without a ready capture session".to_string(),
            ));
        }
        Self::connect(raw_url)
    }

    /// Dial `raw_url` and announce the wire format. The returned session is
    /// `Open` and ready for chunks.
    pub fn connect(raw_url: &str) -> PipelineResult<Self> {
        let url = validate_stream_url(raw_url)?;
        let transport = WsTransport::connect(&url)?;
        Self::open(Box::new(transport))
    }

    /// Start a session over an existing transport. Sends the metadata frame
    /// before anything else; a session that cannot announce its format never
    /// reaches `Open`.
    pub fn open(transport: Box<dyn Transport>) -> PipelineResult<Self> {
        let mut session = Self {
            transport,
            state: SessionState::Connecting,
            transcript: TranscriptAccumulator::new(),
            chunks_sent: 0,
            chunks_dropped: 0,
            last_error: None,
            unhandled: Vec::new(),
            torn_down: false,
        };
        session.announce()?;
        Ok(session)
    }

    /// The format announcement is the last step of connecting; only after the
    /// metadata frame is out does the session transition to `Open`.
    fn announce(&mut self) -> PipelineResult<()> {
        let meta = start_meta_json(TARGET_RATE)?;
        self.transport.send_text(&meta)?;
        self.state = SessionState::Open;
        tracing::debug!(sample_rate = TARGET_RATE, "stream session open");
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transcript(&self) -> &TranscriptAccumulator {
        &self.transcript
    }

    pub fn chunks_sent(&self) -> usize {
        self.chunks_sent
    }

    /// Chunks discarded because the session was not open to take them.
    pub fn chunks_dropped(&self) -> usize {
        self.chunks_dropped
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Drain backend events whose types the session itself does not consume,
    /// oldest first. The caller decides what, if anything, to do with them.
    pub fn take_unhandled(&mut self) -> Vec<TranscriptEvent> {
        std::mem::take(&mut self.unhandled)
    }

    /// Encode one capture chunk and send it. Chunks arriving while the
    /// session is not open are counted and dropped, never queued.
    pub fn push_chunk(&mut self, samples: &[f32], source_rate: u32) -> PipelineResult<()> {
        if self.state != SessionState::Open {
            self.chunks_dropped += 1;
            return Ok(());
        }
        let bytes = encode_chunk(samples, source_rate, TARGET_RATE)?;
        match self.transport.send_binary(bytes) {
            Ok(()) => {
                self.chunks_sent += 1;
                Ok(())
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                self.teardown();
                Err(err)
            }
        }
    }

    /// Drain at most one inbound message. Malformed frames are logged and
    /// skipped; a server close tears the session down. Returns true while the
    /// session is still live.
    pub fn pump_events(&mut self) -> PipelineResult<bool> {
        match self.transport.poll_message() {
            Ok(None) => Ok(self.state != SessionState::Idle),
            Ok(Some(Inbound::Text(raw))) => {
                match parse_event(&raw) {
                    Ok(event) => {
                        match &event {
                            TranscriptEvent::Error { text } => {
                                self.last_error = Some(text.clone());
                            }
                            TranscriptEvent::Final { text } => {
                                log_debug_content(&format!("final transcript: {text}"));
                            }
                            TranscriptEvent::Other { kind, .. } => {
                                log_debug(&format!("unhandled backend event type '{kind}'"));
                                if self.unhandled.len() < MAX_UNHANDLED_EVENTS {
                                    self.unhandled.push(event.clone());
                                }
                            }
                            TranscriptEvent::Partial { .. } => {}
                        }
                        self.transcript.apply(&event);
                    }
                    Err(err) => {
                        log_debug(&format!("skipping malformed backend frame: {err}"));
                    }
                }
                Ok(self.state != SessionState::Idle)
            }
            Ok(Some(Inbound::Closed)) => {
                log_debug("backend closed the stream");
                self.teardown();
                Ok(false)
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                self.teardown();
                Err(err)
            }
        }
    }

    /// Forward every chunk the tap produces until `stop` is raised or the
    /// backend goes away, then linger briefly for trailing transcript events.
    ///
    /// Takes the tap's receiver rather than the tap itself; capture streams
    /// must stay on the thread that built them, the channel is what crosses.
    pub fn forward_chunks(
        &mut self,
        frames: &crossbeam_channel::Receiver<Vec<f32>>,
        source_rate: u32,
        stop: &AtomicBool,
    ) -> PipelineResult<()> {
        while !stop.load(Ordering::Relaxed) && self.state == SessionState::Open {
            match frames.recv_timeout(Duration::from_millis(20)) {
                Ok(chunk) => self.push_chunk(&chunk, source_rate)?,
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
            }
            self.pump_events()?;
        }

        // Give in-flight recognition a moment to land before teardown.
        self.stop_sending();
        for _ in 0..25 {
            if self.state == SessionState::Idle || !self.pump_events()? {
                break;
            }
        }
        self.close();
        Ok(())
    }

    /// Stop outbound audio while leaving the socket open so trailing
    /// recognition events can still land. Chunks arriving in this window are
    /// dropped and counted like any other not-open chunk.
    pub fn stop_sending(&mut self) {
        if self.state == SessionState::Open {
            self.state = SessionState::Closing;
        }
    }

    /// Idempotent teardown; safe to call from any state and from cleanup
    /// paths after an error.
    pub fn close(&mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.torn_down {
            self.state = SessionState::Idle;
            return;
        }
        self.torn_down = true;
        self.transport.close();
        self.state = SessionState::Idle;
        tracing::debug!(
            chunks_sent = self.chunks_sent,
            chunks_dropped = self.chunks_dropped,
            "stream session closed"
        );
    }
}
