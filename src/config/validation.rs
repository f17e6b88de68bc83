use super::defaults::{
    MAX_BANDS, MAX_CHANNEL_CAPACITY, MAX_CHUNK_SAMPLES, MAX_FFT_SIZE, MAX_POLL_INTERVAL_MS,
    MAX_RECORD_SECONDS, MIN_BANDS, MIN_CHANNEL_CAPACITY, MIN_CHUNK_SAMPLES, MIN_FFT_SIZE,
    MIN_POLL_INTERVAL_MS, MIN_RECORD_SECONDS,
};
use super::{AppConfig, StreamSettings};
use crate::audio::AnalysisSettings;
use crate::stream::validate_stream_url;
use anyhow::{bail, Result};
use clap::Parser;
use std::net::SocketAddr;

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values before any device or socket is touched.
    pub fn validate(&mut self) -> Result<()> {
        if !(MIN_BANDS..=MAX_BANDS).contains(&self.bands) {
            bail!(
                "--bands must be between {MIN_BANDS} and {MAX_BANDS}, got {}",
                self.bands
            );
        }
        if !(0.0..=100.0).contains(&self.sensitivity) {
            bail!(
                "--sensitivity must be between 0 and 100, got {}",
                self.sensitivity
            );
        }
        if self.min_freq_hz <= 0.0 || self.min_freq_hz > 2_000.0 {
            bail!(
                "--min-freq-hz must be between 0 (exclusive) and 2000 Hz, got {}",
                self.min_freq_hz
            );
        }
        if !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&self.fft_size)
            || !self.fft_size.is_power_of_two()
        {
            bail!(
                "--fft-size must be a power of two between {MIN_FFT_SIZE} and {MAX_FFT_SIZE}, got {}",
                self.fft_size
            );
        }
        if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&self.poll_interval_ms) {
            bail!(
                "--poll-interval-ms must be between {MIN_POLL_INTERVAL_MS} and {MAX_POLL_INTERVAL_MS}, got {}",
                self.poll_interval_ms
            );
        }
        if !(MIN_CHUNK_SAMPLES..=MAX_CHUNK_SAMPLES).contains(&self.chunk_samples) {
            bail!(
                "--chunk-samples must be between {MIN_CHUNK_SAMPLES} and {MAX_CHUNK_SAMPLES}, got {}",
                self.chunk_samples
            );
        }
        if !(MIN_CHANNEL_CAPACITY..=MAX_CHANNEL_CAPACITY).contains(&self.channel_capacity) {
            bail!(
                "--channel-capacity must be between {MIN_CHANNEL_CAPACITY} and {MAX_CHANNEL_CAPACITY}, got {}",
                self.channel_capacity
            );
        }
        if !(MIN_RECORD_SECONDS..=MAX_RECORD_SECONDS).contains(&self.seconds) {
            bail!(
                "--seconds must be between {MIN_RECORD_SECONDS} and {MAX_RECORD_SECONDS}, got {}",
                self.seconds
            );
        }

        if let Some(url) = &self.stream_url {
            if let Err(err) = validate_stream_url(url) {
                bail!("--stream-url: {err}");
            }
        }

        if self.relay {
            if self.relay_addr.parse::<SocketAddr>().is_err() {
                bail!(
                    "--relay-addr must be a host:port socket address, got '{}'",
                    self.relay_addr
                );
            }
            if let Err(err) = validate_stream_url(&self.backend_url) {
                bail!("--backend-url: {err}");
            }
        }

        Ok(())
    }

    /// Snapshot the analysis tunables for the capture layer.
    pub fn analysis_settings(&self) -> AnalysisSettings {
        AnalysisSettings {
            fft_size: self.fft_size,
            band_count: self.bands,
            min_freq_hz: self.min_freq_hz,
            sensitivity: self.sensitivity,
            poll_interval_ms: self.poll_interval_ms,
        }
    }

    /// Snapshot the streaming tunables for the session layer.
    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            url: self.stream_url.clone(),
            chunk_samples: self.chunk_samples,
            channel_capacity: self.channel_capacity,
        }
    }
}
