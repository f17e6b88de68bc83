//! Real-time audio pipeline: capture, spectral analysis, and wire encoding.
//!
//! Two independent taps on the same input device feed the two halves of the
//! pipeline. The analysis tap drives the band-mapped visualization at roughly
//! 60 Hz; the streaming tap feeds fixed-size chunks through the downsampler
//! and PCM16 encoder on their way to the transcription backend.

/// Fixed wire rate announced to the transcription backend.
pub const TARGET_RATE: u32 = 16_000;

/// Mono only; both taps downmix multi-channel devices.
pub const TARGET_CHANNELS: u32 = 1;

mod bands;
mod capture;
mod dispatch;
mod encode;
mod silence;
mod spectrum;
#[cfg(test)]
mod tests;

pub use bands::{band_range_hz, map_to_bands, DEFAULT_BAND_COUNT, DEFAULT_MIN_FREQ_HZ};
pub use capture::{AnalysisSettings, AnalysisUpdate, CaptureSession, CaptureState, CaptureTap};
pub use encode::{downsample, encode_chunk, pcm16_to_le_bytes, quantize_pcm16};
pub use silence::{is_silent, rms, threshold_for_sensitivity};
pub use spectrum::SpectrumAnalyzer;
