//! Capture session: device ownership, the analysis poll loop, and
//! independent streaming taps.
//!
//! The session owns the input device and one analysis tap (a cpal stream
//! feeding a bounded ring of recent samples). A dedicated poll thread snapshots
//! the ring at the configured tick, runs the spectrum/band/silence pipeline,
//! and invokes the subscriber. Streaming consumers attach their own tap with
//! its own stream and buffers so visualization and streaming never contend on
//! shared mutable state.

use super::bands::map_to_bands;
use super::dispatch::{append_downmixed_samples, ChunkDispatcher};
use super::silence::{is_silent, threshold_for_sensitivity};
use super::spectrum::SpectrumAnalyzer;
use super::{DEFAULT_BAND_COUNT, DEFAULT_MIN_FREQ_HZ};
use crate::error::{PipelineError, PipelineResult};
use crate::{log_debug, log_timing};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use crossbeam_channel::{bounded, Receiver};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Lifecycle of the capture session. `stop` passes through `Stopped` while
/// releasing the device and rests at `Uninitialized`, ready for a fresh open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Uninitialized,
    Initializing,
    Ready,
    Stopped,
}

impl CaptureState {
    pub fn label(self) -> &'static str {
        match self {
            CaptureState::Uninitialized => "uninitialized",
            CaptureState::Initializing => "initializing",
            CaptureState::Ready => "ready",
            CaptureState::Stopped => "stopped",
        }
    }
}

/// Per-tick payload handed to the analysis subscriber. Transient; copy what
/// you need to keep.
#[derive(Debug, Clone)]
pub struct AnalysisUpdate {
    pub bands: Vec<f32>,
    pub is_silent: bool,
    pub sample_rate: u32,
    pub timestamp_ms: u64,
}

/// Tunables for the analysis poll loop.
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub fft_size: usize,
    pub band_count: usize,
    pub min_freq_hz: f32,
    pub sensitivity: f32,
    pub poll_interval_ms: u64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            band_count: DEFAULT_BAND_COUNT,
            min_freq_hz: DEFAULT_MIN_FREQ_HZ,
            sensitivity: 50.0,
            poll_interval_ms: 16,
        }
    }
}

struct AnalysisTap {
    _stream: cpal::Stream,
    ring: Arc<Mutex<VecDeque<f32>>>,
}

struct PollLoop {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

/// An independent read tap on the capture device, emitting fixed-size mono
/// chunks over a bounded channel. Dropping the tap releases its stream.
pub struct CaptureTap {
    _stream: cpal::Stream,
    receiver: Receiver<Vec<f32>>,
    sample_rate: u32,
    dropped: Arc<AtomicUsize>,
}

impl CaptureTap {
    /// Channel of capture chunks; clones share the same queue so a worker
    /// thread can consume while the tap stays on the owning thread.
    pub fn frames(&self) -> Receiver<Vec<f32>> {
        self.receiver.clone()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Chunks discarded because the consumer fell behind.
    pub fn dropped_chunks(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Owns the audio input device, the analysis tap, and the poll loop.
pub struct CaptureSession {
    device: cpal::Device,
    sample_rate: u32,
    channels: usize,
    format: SampleFormat,
    stream_config: StreamConfig,
    state: CaptureState,
    analysis: Option<AnalysisTap>,
    poller: Option<PollLoop>,
    started_at: Instant,
}

impl CaptureSession {
    /// List input device names so the CLI can expose a selector.
    pub fn list_devices() -> PipelineResult<Vec<String>> {
        let host = cpal::default_host();
        let devices = host.input_devices().map_err(|err| {
            PipelineError::PermissionDenied(format!("no input devices available: {err}"))
        })?;
        let mut names = Vec::new();
        for device in devices {
            if let Ok(name) = device.name() {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Acquire the device and attach the analysis tap. On success the session
    /// is `Ready`; any access failure surfaces as `PermissionDenied` with an
    /// OS-specific hint and leaves nothing owned.
    pub fn open(preferred_device: Option<&str>, fft_size: usize) -> PipelineResult<Self> {
        let host = cpal::default_host();
        let device = match preferred_device {
            Some(name) => {
                let mut devices = host.input_devices().map_err(|err| {
                    PipelineError::PermissionDenied(format!("no input devices available: {err}"))
                })?;
                devices
                    .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                    .ok_or_else(|| {
                        PipelineError::PermissionDenied(format!(
                            "input device '{name}' not found. {}",
                            mic_permission_hint()
                        ))
                    })?
            }
            None => host.default_input_device().ok_or_else(|| {
                PipelineError::PermissionDenied(format!(
                    "no default input device available. {}",
                    mic_permission_hint()
                ))
            })?,
        };

        let mut session = Self::attach(device, fft_size)?;
        session.state = CaptureState::Ready;
        log_debug(&format!(
            "capture session ready: device='{}' rate={}Hz channels={}",
            session.device_name(),
            session.sample_rate,
            session.channels
        ));
        tracing::info!(
            device = %session.device_name(),
            sample_rate = session.sample_rate,
            channels = session.channels,
            "capture session ready"
        );
        Ok(session)
    }

    fn attach(device: cpal::Device, fft_size: usize) -> PipelineResult<Self> {
        // Initializing until the analysis stream is actually playing.
        let default_config = device.default_input_config().map_err(|err| {
            PipelineError::PermissionDenied(format!(
                "failed to query input format: {err}. {}",
                mic_permission_hint()
            ))
        })?;
        let format = default_config.sample_format();
        let stream_config: StreamConfig = default_config.into();
        let sample_rate = stream_config.sample_rate.0;
        let channels = usize::from(stream_config.channels.max(1));

        let ring_capacity = fft_size.max(2);
        let ring = Arc::new(Mutex::new(VecDeque::with_capacity(ring_capacity)));
        let stream = build_ring_stream(
            &device,
            &stream_config,
            format,
            channels,
            ring.clone(),
            ring_capacity,
        )?;
        stream
            .play()
            .map_err(|err| PipelineError::PermissionDenied(format!("capture start failed: {err}")))?;

        Ok(Self {
            device,
            sample_rate,
            channels,
            format,
            stream_config,
            state: CaptureState::Initializing,
            analysis: Some(AnalysisTap {
                _stream: stream,
                ring,
            }),
            poller: None,
            started_at: Instant::now(),
        })
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == CaptureState::Ready
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn device_name(&self) -> String {
        self.device
            .name()
            .unwrap_or_else(|_| "Unknown Device".to_string())
    }

    /// Install the analysis poll loop. One loop per session; subscribing
    /// while another subscriber is active is an error, sequential
    /// subscribe/unsubscribe cycles are fine.
    pub fn subscribe<F>(&mut self, settings: &AnalysisSettings, mut on_update: F) -> PipelineResult<()>
    where
        F: FnMut(AnalysisUpdate) + Send + 'static,
    {
        if !self.is_ready() {
            return Err(PipelineError::InvalidConfig(format!(
                "cannot subscribe while capture session is {}",
                self.state.label()
            )));
        }
        if self.poller.is_some() {
            return Err(PipelineError::InvalidConfig(
                "analysis subscriber already active".to_string(),
            ));
        }
        let ring = match &self.analysis {
            Some(tap) => tap.ring.clone(),
            None => {
                return Err(PipelineError::InvalidConfig(
                    "analysis tap is not attached".to_string(),
                ))
            }
        };

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let sample_rate = self.sample_rate;
        let started_at = self.started_at;
        let settings = settings.clone();

        let join = thread::spawn(move || {
            let mut analyzer = SpectrumAnalyzer::new(settings.fft_size);
            let threshold = threshold_for_sensitivity(settings.sensitivity);
            let tick = Duration::from_millis(settings.poll_interval_ms.max(1));
            let mut snapshot: Vec<f32> = Vec::with_capacity(analyzer.fft_size());

            while !stop_flag.load(Ordering::Relaxed) {
                let tick_start = Instant::now();
                snapshot.clear();
                if let Ok(ring) = ring.lock() {
                    snapshot.extend(ring.iter().copied());
                }

                let magnitudes = analyzer.magnitudes_db(&snapshot);
                let bands = map_to_bands(
                    &magnitudes,
                    sample_rate,
                    settings.band_count,
                    settings.min_freq_hz,
                );
                let silent = is_silent(&snapshot, threshold);

                on_update(AnalysisUpdate {
                    bands,
                    is_silent: silent,
                    sample_rate,
                    timestamp_ms: started_at.elapsed().as_millis() as u64,
                });
                log_timing("analysis tick", tick_start.elapsed());

                thread::sleep(tick);
            }
        });

        self.poller = Some(PollLoop {
            stop,
            join: Some(join),
        });
        Ok(())
    }

    /// Halt the poll loop without touching the device.
    pub fn unsubscribe(&mut self) {
        if let Some(mut poller) = self.poller.take() {
            poller.stop.store(true, Ordering::Relaxed);
            if let Some(join) = poller.join.take() {
                let _ = join.join();
            }
        }
    }

    /// Attach an independent streaming tap emitting `chunk_samples`-sized
    /// mono chunks at the device rate. Each tap owns its stream and buffers.
    pub fn open_tap(&self, chunk_samples: usize, capacity: usize) -> PipelineResult<CaptureTap> {
        if !self.is_ready() {
            return Err(PipelineError::InvalidConfig(format!(
                "cannot open a tap while capture session is {}",
                self.state.label()
            )));
        }

        let (sender, receiver) = bounded::<Vec<f32>>(capacity.max(1));
        let dropped = Arc::new(AtomicUsize::new(0));
        let dispatcher = Arc::new(Mutex::new(ChunkDispatcher::new(
            chunk_samples.max(1),
            sender,
            dropped.clone(),
        )));

        let stream = build_chunk_stream(
            &self.device,
            &self.stream_config,
            self.format,
            self.channels,
            dispatcher,
            dropped.clone(),
        )?;
        stream
            .play()
            .map_err(|err| PipelineError::PermissionDenied(format!("tap start failed: {err}")))?;

        Ok(CaptureTap {
            _stream: stream,
            receiver,
            sample_rate: self.sample_rate,
            dropped,
        })
    }

    /// Release the device unconditionally. Safe from cleanup paths and safe
    /// to call more than once; the session rests at `Uninitialized`.
    pub fn stop(&mut self) {
        self.state = CaptureState::Stopped;
        self.unsubscribe();
        if self.analysis.take().is_some() {
            log_debug("capture session stopped; device released");
        }
        self.state = CaptureState::Uninitialized;
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn build_ring_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    format: SampleFormat,
    channels: usize,
    ring: Arc<Mutex<VecDeque<f32>>>,
    capacity: usize,
) -> PipelineResult<cpal::Stream> {
    let err_fn = |err| log_debug(&format!("audio_stream_error: {err}"));

    // Convert every supported sample type to f32 up front so the analysis
    // side stays format-agnostic. try_lock keeps the callback non-blocking;
    // a contended tick just skips this batch.
    let stream = match format {
        SampleFormat::F32 => device.build_input_stream(
            config,
            {
                let mut scratch: Vec<f32> = Vec::new();
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    scratch.clear();
                    append_downmixed_samples(&mut scratch, data, channels, |sample| sample);
                    push_ring(&ring, &scratch, capacity);
                }
            },
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            config,
            {
                let mut scratch: Vec<f32> = Vec::new();
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    scratch.clear();
                    append_downmixed_samples(&mut scratch, data, channels, |sample| {
                        sample as f32 / 32_768.0
                    });
                    push_ring(&ring, &scratch, capacity);
                }
            },
            err_fn,
            None,
        ),
        SampleFormat::U16 => device.build_input_stream(
            config,
            {
                let mut scratch: Vec<f32> = Vec::new();
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    scratch.clear();
                    append_downmixed_samples(&mut scratch, data, channels, |sample| {
                        (sample as f32 - 32_768.0) / 32_768.0
                    });
                    push_ring(&ring, &scratch, capacity);
                }
            },
            err_fn,
            None,
        ),
        other => {
            return Err(PipelineError::InvalidConfig(format!(
                "unsupported sample format: {other:?}"
            )))
        }
    };

    stream.map_err(|err| {
        PipelineError::PermissionDenied(format!(
            "failed to open capture stream: {err}. {}",
            mic_permission_hint()
        ))
    })
}

fn push_ring(ring: &Arc<Mutex<VecDeque<f32>>>, samples: &[f32], capacity: usize) {
    if let Ok(mut ring) = ring.try_lock() {
        for &sample in samples {
            if ring.len() == capacity {
                ring.pop_front();
            }
            ring.push_back(sample);
        }
    }
}

fn build_chunk_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    format: SampleFormat,
    channels: usize,
    dispatcher: Arc<Mutex<ChunkDispatcher>>,
    dropped: Arc<AtomicUsize>,
) -> PipelineResult<cpal::Stream> {
    let err_fn = |err| log_debug(&format!("audio_stream_error: {err}"));

    let stream = match format {
        SampleFormat::F32 => {
            let dispatcher = dispatcher.clone();
            let dropped = dropped.clone();
            device.build_input_stream(
                config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut pump) = dispatcher.try_lock() {
                        pump.push(data, channels, |sample| sample);
                    } else {
                        dropped.fetch_add(1, Ordering::Relaxed);
                    }
                },
                err_fn,
                None,
            )
        }
        SampleFormat::I16 => {
            let dispatcher = dispatcher.clone();
            let dropped = dropped.clone();
            device.build_input_stream(
                config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut pump) = dispatcher.try_lock() {
                        pump.push(data, channels, |sample| sample as f32 / 32_768.0);
                    } else {
                        dropped.fetch_add(1, Ordering::Relaxed);
                    }
                },
                err_fn,
                None,
            )
        }
        SampleFormat::U16 => {
            let dispatcher = dispatcher.clone();
            let dropped = dropped.clone();
            device.build_input_stream(
                config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut pump) = dispatcher.try_lock() {
                        pump.push(data, channels, |sample| {
                            (sample as f32 - 32_768.0) / 32_768.0
                        });
                    } else {
                        dropped.fetch_add(1, Ordering::Relaxed);
                    }
                },
                err_fn,
                None,
            )
        }
        other => {
            return Err(PipelineError::InvalidConfig(format!(
                "unsupported sample format: {other:?}"
            )))
        }
    };

    stream.map_err(|err| {
        PipelineError::PermissionDenied(format!(
            "failed to open tap stream: {err}. {}",
            mic_permission_hint()
        ))
    })
}

fn mic_permission_hint() -> &'static str {
    #[cfg(target_os = "macos")]
    {
        "macOS: System Settings > Privacy & Security > Microphone (enable your terminal)."
    }
    #[cfg(target_os = "linux")]
    {
        "Linux: check PipeWire/PulseAudio permissions and ensure the device is not muted."
    }
    #[cfg(target_os = "windows")]
    {
        "Windows: Settings > Privacy & Security > Microphone (allow access for your terminal)."
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        "Check OS microphone permissions."
    }
}
