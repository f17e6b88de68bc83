//! Command-line parsing and validation helpers.

mod defaults;
mod validation;

use clap::Parser;

pub use defaults::{
    DEFAULT_BACKEND_URL, DEFAULT_BANDS, DEFAULT_CHANNEL_CAPACITY, DEFAULT_CHUNK_SAMPLES,
    DEFAULT_FFT_SIZE, DEFAULT_MIN_FREQ_HZ, DEFAULT_POLL_INTERVAL_MS, DEFAULT_RELAY_ADDR,
    DEFAULT_SENSITIVITY,
};

/// CLI options for the wavescope pipeline. Validated values feed straight
/// into the capture, stream, and relay layers.
#[derive(Debug, Parser, Clone)]
#[command(about = "Real-time audio visualization and transcription streaming", author, version)]
pub struct AppConfig {
    /// Preferred audio input device name
    #[arg(long)]
    pub input_device: Option<String>,

    /// Print detected audio input devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Number of log-spaced spectral bands
    #[arg(long, default_value_t = defaults::DEFAULT_BANDS)]
    pub bands: usize,

    /// Silence sensitivity, 0 (least sensitive) to 100 (most sensitive)
    #[arg(long, default_value_t = defaults::DEFAULT_SENSITIVITY, allow_negative_numbers = true)]
    pub sensitivity: f32,

    /// Lowest frequency covered by the band axis (Hz)
    #[arg(long = "min-freq-hz", default_value_t = defaults::DEFAULT_MIN_FREQ_HZ)]
    pub min_freq_hz: f32,

    /// FFT size for spectral analysis (power of two)
    #[arg(long = "fft-size", default_value_t = defaults::DEFAULT_FFT_SIZE)]
    pub fft_size: usize,

    /// Analysis poll interval (milliseconds)
    #[arg(long = "poll-interval-ms", default_value_t = defaults::DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,

    /// Samples per streaming chunk at the device rate
    #[arg(long = "chunk-samples", default_value_t = defaults::DEFAULT_CHUNK_SAMPLES)]
    pub chunk_samples: usize,

    /// Chunk channel capacity between capture and the streaming session
    #[arg(long = "channel-capacity", default_value_t = defaults::DEFAULT_CHANNEL_CAPACITY)]
    pub channel_capacity: usize,

    /// Stream captured audio to this transcription backend (ws:// or wss://)
    #[arg(long = "stream-url")]
    pub stream_url: Option<String>,

    /// Run the SSE relay server instead of capturing audio
    #[arg(long, default_value_t = false)]
    pub relay: bool,

    /// Address the relay server binds to
    #[arg(long = "relay-addr", default_value_t = defaults::DEFAULT_RELAY_ADDR.to_string())]
    pub relay_addr: String,

    /// Backend WebSocket URL the relay bridges to
    #[arg(
        long = "backend-url",
        env = "BACKEND_WS_URL",
        default_value = defaults::DEFAULT_BACKEND_URL
    )]
    pub backend_url: String,

    /// Capture duration in seconds
    #[arg(long, default_value_t = defaults::DEFAULT_RECORD_SECONDS)]
    pub seconds: u64,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "WAVESCOPE_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "WAVESCOPE_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Allow logging transcript snippets (debug log only)
    #[arg(
        long = "log-content",
        env = "WAVESCOPE_LOG_CONTENT",
        default_value_t = false
    )]
    pub log_content: bool,

    /// Enable verbose timing logs
    #[arg(long)]
    pub log_timings: bool,
}

/// Streaming tunables handed to the session layer.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub url: Option<String>,
    pub chunk_samples: usize,
    pub channel_capacity: usize,
}
