//! The relay bridge loop and its HTTP front door.

use super::sse::{forward_event_for, SseEvent};
use crate::error::{PipelineError, PipelineResult};
use crate::log_debug;
use crate::stream::validate_stream_url;
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde_json::json;
use std::io::{ErrorKind, Read};
use std::net::TcpStream;
use std::time::{Duration, Instant};
use tiny_http::{Header, Method, Response, Server};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

/// Socket read window; also paces the keep-alive check.
const READ_POLL: Duration = Duration::from_millis(100);

/// SSE comment keep-alive cadence while the backend is quiet.
const PING_INTERVAL: Duration = Duration::from_secs(15);

/// One unit pulled from the backend connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendMessage {
    Text(String),
    /// Nothing arrived within the read window.
    Idle,
    Closed {
        code: Option<u16>,
        reason: String,
    },
}

/// Backend connection abstraction so the bridge loop can be tested without a
/// live WebSocket.
pub trait BackendSource {
    fn next_message(&mut self) -> PipelineResult<BackendMessage>;
    fn close(&mut self);
}

/// Where bridge output goes. Errors mean the client is gone.
pub trait EventSink {
    fn write_event(&mut self, event: &SseEvent) -> PipelineResult<()>;
    /// SSE comment line used as a keep-alive.
    fn write_comment(&mut self, text: &str) -> PipelineResult<()>;
    /// Liveness check that puts nothing on the wire. Called every idle read
    /// window so a vanished client is noticed even while the backend is quiet.
    fn is_alive(&mut self) -> bool;
}

/// tungstenite-backed backend source with a read timeout so `next_message`
/// returns `Idle` instead of blocking indefinitely.
pub struct WsBackendSource {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
}

impl WsBackendSource {
    pub fn connect(raw_url: &str) -> PipelineResult<Self> {
        let url = validate_stream_url(raw_url)?;
        let (socket, _response) = tungstenite::connect(url.as_str()).map_err(|err| {
            PipelineError::UpstreamUnavailable(format!("failed to reach backend {url}: {err}"))
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

impl BackendSource for WsBackendSource {
    fn next_message(&mut self) -> PipelineResult<BackendMessage> {
        match self.socket.read() {
            Ok(Message::Text(text)) => Ok(BackendMessage::Text(text.to_string())),
            Ok(Message::Close(frame)) => {
                let (code, reason) = match frame {
                    Some(frame) => (Some(frame.code.into()), frame.reason.to_string()),
                    None => (None, String::new()),
                };
                Ok(BackendMessage::Closed { code, reason })
            }
            Ok(_) => Ok(BackendMessage::Idle),
            Err(tungstenite::Error::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                Ok(BackendMessage::Idle)
            }
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                Ok(BackendMessage::Closed {
                    code: None,
                    reason: String::new(),
                })
            }
            Err(err) => Err(PipelineError::Transport(format!(
                "backend read failed: {err}"
            ))),
        }
    }

    fn close(&mut self) {
        let _ = self.socket.close(None);
        let _ = self.socket.flush();
    }
}

/// Drive one client's event stream from one backend connection.
///
/// A failed backend connect emits exactly one `error` event and returns.
/// A connected backend gets an `info` event first, then frames forwarded
/// until the backend closes or errors. A sink failure means the client
/// disconnected: close the backend and stop without emitting anything else.
pub fn run_bridge<B, S>(backend: PipelineResult<B>, sink: &mut S)
where
    B: BackendSource,
    S: EventSink,
{
    let mut backend = match backend {
        Ok(backend) => backend,
        Err(err) => {
            let _ = sink.write_event(&SseEvent::error(&err.to_string()));
            return;
        }
    };

    let connected = SseEvent::info(&json!({ "type": "info", "status": "connected" }));
    if sink.write_event(&connected).is_err() {
        backend.close();
        return;
    }

    let mut last_activity = Instant::now();
    loop {
        match backend.next_message() {
            Ok(BackendMessage::Text(raw)) => {
                last_activity = Instant::now();
                if sink.write_event(&forward_event_for(&raw)).is_err() {
                    log_debug("relay client went away; closing backend");
                    backend.close();
                    return;
                }
            }
            Ok(BackendMessage::Idle) => {
                let live = if last_activity.elapsed() >= PING_INTERVAL {
                    last_activity = Instant::now();
                    sink.write_comment("ping").is_ok()
                } else {
                    sink.is_alive()
                };
                if !live {
                    log_debug("relay client went away; closing backend");
                    backend.close();
                    return;
                }
            }
            Ok(BackendMessage::Closed { code, reason }) => {
                let _ = sink.write_event(&SseEvent::close(code, &reason));
                return;
            }
            Err(err) => {
                let _ = sink.write_event(&SseEvent::error(&err.to_string()));
                return;
            }
        }
    }
}

struct ChannelSink {
    sender: Sender<Vec<u8>>,
}

impl EventSink for ChannelSink {
    fn write_event(&mut self, event: &SseEvent) -> PipelineResult<()> {
        self.sender
            .send(event.to_wire().into_bytes())
            .map_err(|_| PipelineError::Transport("relay client disconnected".to_string()))
    }

    fn write_comment(&mut self, text: &str) -> PipelineResult<()> {
        self.sender
            .send(format!(": {text}\n\n").into_bytes())
            .map_err(|_| PipelineError::Transport("relay client disconnected".to_string()))
    }

    fn is_alive(&mut self) -> bool {
        // Empty chunks never reach the wire; the send only fails once the
        // response body (and with it the receiver) has been dropped.
        self.sender.send(Vec::new()).is_ok()
    }
}

/// Adapts the bridge's byte channel to the blocking `Read` the HTTP response
/// body wants. A disconnected sender reads as EOF.
struct ChannelReader {
    receiver: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    pos: usize,
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        // Zero-length liveness chunks must not read as EOF; keep pulling
        // until real bytes arrive or the sender is gone.
        while self.pos >= self.pending.len() {
            match self.receiver.recv() {
                Ok(bytes) => {
                    self.pending = bytes;
                    self.pos = 0;
                }
                Err(_) => return Ok(0),
            }
        }
        let n = (self.pending.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

fn sse_header(name: &str, value: &str) -> PipelineResult<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes())
        .map_err(|_| PipelineError::InvalidConfig(format!("bad header '{name}: {value}'")))
}

/// Serve `GET /events` on `addr`, bridging each client to `backend_url`.
///
/// Each request gets its own bridge thread and backend connection; the
/// response body streams until the bridge ends or the client disconnects.
pub fn serve(addr: &str, backend_url: &str) -> PipelineResult<()> {
    let server = Server::http(addr)
        .map_err(|err| PipelineError::Transport(format!("failed to bind {addr}: {err}")))?;
    log_debug(&format!("relay listening on {addr}, backend {backend_url}"));
    tracing::info!(addr, backend = backend_url, "relay listening");

    for request in server.incoming_requests() {
        if request.method() != &Method::Get || !request.url().starts_with("/events") {
            let _ = request.respond(Response::from_string("not found").with_status_code(404));
            continue;
        }

        let backend_url = backend_url.to_string();
        std::thread::spawn(move || {
            let (sender, receiver) = unbounded::<Vec<u8>>();

            let bridge = std::thread::spawn(move || {
                let mut sink = ChannelSink { sender };
                run_bridge(WsBackendSource::connect(&backend_url), &mut sink);
            });

            let headers = [
                sse_header("Content-Type", "text/event-stream"),
                sse_header("Cache-Control", "no-cache"),
                sse_header("Connection", "keep-alive"),
            ];
            let mut response = Response::new(
                tiny_http::StatusCode(200),
                Vec::new(),
                Box::new(ChannelReader {
                    receiver,
                    pending: Vec::new(),
                    pos: 0,
                }) as Box<dyn Read + Send>,
                None,
                None,
            );
            for header in headers.into_iter().flatten() {
                response.add_header(header);
            }

            // respond() streams until EOF or the client hangs up; dropping
            // the receiver is what unblocks the bridge in the latter case.
            if let Err(err) = request.respond(response) {
                log_debug(&format!("relay response ended: {err}"));
            }
            let _ = bridge.join();
        });
    }

    Ok(())
}
