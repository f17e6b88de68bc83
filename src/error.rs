//! Error taxonomy shared by the capture, streaming, and relay layers.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Classified pipeline failures. Everything that is not locally recoverable
/// ends up in one of these variants so callers can decide between fail-fast,
/// teardown, and skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Device access refused or no usable input device. Fatal to the capture
    /// session; never retried.
    PermissionDenied(String),
    /// A caller-supplied value that can never work (downsample target above
    /// the source rate, malformed stream address). Fail fast, no retry.
    InvalidConfig(String),
    /// Connection drop or send failure. Drives session teardown.
    Transport(String),
    /// Malformed inbound event. Logged and skipped; the session survives.
    Protocol(String),
    /// The relay could not reach the backend. Reported to the client as a
    /// single terminal error event.
    UpstreamUnavailable(String),
}

impl PipelineError {
    pub fn message(&self) -> &str {
        match self {
            PipelineError::PermissionDenied(msg)
            | PipelineError::InvalidConfig(msg)
            | PipelineError::Transport(msg)
            | PipelineError::Protocol(msg)
            | PipelineError::UpstreamUnavailable(msg) => msg,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PipelineError::PermissionDenied(_) => "permission_denied",
            PipelineError::InvalidConfig(_) => "invalid_config",
            PipelineError::Transport(_) => "transport",
            PipelineError::Protocol(_) => "protocol",
            PipelineError::UpstreamUnavailable(_) => "upstream_unavailable",
        }
    }
}

impl Display for PipelineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.label(), self.message())
    }
}

impl Error for PipelineError {}

pub type PipelineResult<T> = Result<T, PipelineError>;
