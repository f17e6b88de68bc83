//! Default values and bounds for the CLI surface.

pub const DEFAULT_BANDS: usize = crate::audio::DEFAULT_BAND_COUNT;
pub const DEFAULT_SENSITIVITY: f32 = 50.0;
pub const DEFAULT_MIN_FREQ_HZ: f32 = crate::audio::DEFAULT_MIN_FREQ_HZ;
pub const DEFAULT_FFT_SIZE: usize = 2048;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 16;
pub const DEFAULT_CHUNK_SAMPLES: usize = 4096;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;
pub const DEFAULT_RELAY_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_BACKEND_URL: &str = "ws://localhost:8080/ws-audio";
pub const DEFAULT_RECORD_SECONDS: u64 = 5;

pub const MIN_BANDS: usize = 1;
pub const MAX_BANDS: usize = 512;
pub const MIN_FFT_SIZE: usize = 32;
pub const MAX_FFT_SIZE: usize = 32_768;
pub const MIN_POLL_INTERVAL_MS: u64 = 1;
pub const MAX_POLL_INTERVAL_MS: u64 = 1_000;
pub const MIN_CHUNK_SAMPLES: usize = 256;
pub const MAX_CHUNK_SAMPLES: usize = 65_536;
pub const MIN_RECORD_SECONDS: u64 = 1;
pub const MAX_RECORD_SECONDS: u64 = 600;
pub const MIN_CHANNEL_CAPACITY: usize = 1;
pub const MAX_CHANNEL_CAPACITY: usize = 1_024;
