use super::dispatch::{append_downmixed_samples, ChunkDispatcher};
use super::*;
use crate::error::PipelineError;
use crossbeam_channel::bounded;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn sine(freq_hz: f32, sample_rate: u32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| (2.0 * std::f32::consts::PI * freq_hz * i as f32 / sample_rate as f32).sin())
        .collect()
}

fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

#[test]
fn band_mapping_has_requested_length_and_unit_range() {
    let spectrum = vec![-30.0f32; 1024];
    let bands = map_to_bands(&spectrum, 48_000, 60, DEFAULT_MIN_FREQ_HZ);
    assert_eq!(bands.len(), 60);
    for &b in &bands {
        assert!((0.0..=1.0).contains(&b), "band out of range: {b}");
    }
}

#[test]
fn flat_spectrum_normalizes_every_band_to_one() {
    let spectrum = vec![-20.0f32; 1024];
    let bands = map_to_bands(&spectrum, 48_000, 60, DEFAULT_MIN_FREQ_HZ);
    for &b in &bands {
        assert!((b - 1.0).abs() < 1e-6);
    }
}

#[test]
fn silent_spectrum_stays_all_zero() {
    let spectrum = vec![f32::NEG_INFINITY; 1024];
    let bands = map_to_bands(&spectrum, 48_000, 60, DEFAULT_MIN_FREQ_HZ);
    assert!(bands.iter().all(|&b| b == 0.0));
}

#[test]
fn band_mapping_degenerate_inputs_yield_zeros() {
    assert_eq!(map_to_bands(&[], 48_000, 60, 20.0), vec![0.0; 60]);
    assert!(map_to_bands(&[-10.0; 8], 48_000, 0, 20.0).is_empty());
    assert_eq!(map_to_bands(&[-10.0; 8], 0, 4, 20.0), vec![0.0; 4]);
    assert_eq!(map_to_bands(&[-10.0; 8], 48_000, 4, 0.0), vec![0.0; 4]);
}

#[test]
fn band_ranges_tile_the_log_axis() {
    let bands = 60;
    let (first_start, _) = band_range_hz(0, 48_000, bands, 20.0);
    assert!((first_start - 20.0).abs() < 1e-3);
    let (_, last_end) = band_range_hz(bands - 1, 48_000, bands, 20.0);
    assert!((last_end - 24_000.0).abs() < 1.0);
    for i in 0..bands - 1 {
        let (_, end) = band_range_hz(i, 48_000, bands, 20.0);
        let (next_start, _) = band_range_hz(i + 1, 48_000, bands, 20.0);
        assert!((end - next_start).abs() < 1e-2);
    }
}

#[test]
fn bin_aligned_tone_peaks_in_the_matching_band() {
    // 468.75 Hz is exactly 20 cycles per 2048 samples at 48 kHz, so the
    // energy lands in a single FFT bin with no leakage.
    let tone_hz = 468.75;
    let samples = sine(tone_hz, 48_000, 2048);
    let mut analyzer = SpectrumAnalyzer::new(2048);
    let spectrum = analyzer.magnitudes_db(&samples);
    let bands = map_to_bands(&spectrum, 48_000, 60, DEFAULT_MIN_FREQ_HZ);

    let peak = argmax(&bands);
    assert!((bands[peak] - 1.0).abs() < 1e-6);
    let (lo, _) = band_range_hz(peak.saturating_sub(1), 48_000, 60, DEFAULT_MIN_FREQ_HZ);
    let (_, hi) = band_range_hz((peak + 1).min(59), 48_000, 60, DEFAULT_MIN_FREQ_HZ);
    assert!(
        lo <= tone_hz && tone_hz <= hi,
        "tone {tone_hz} Hz outside peak band neighborhood [{lo}, {hi}]"
    );
}

#[test]
fn rms_of_known_signal() {
    assert_eq!(rms(&[]), 0.0);
    assert!((rms(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-6);
    let tone = sine(440.0, 48_000, 4800);
    let expected = 1.0 / 2.0f32.sqrt();
    assert!((rms(&tone) - expected).abs() < 0.01);
}

#[test]
fn silence_threshold_tracks_sensitivity() {
    assert!((threshold_for_sensitivity(100.0) - 0.0005).abs() < 1e-7);
    assert!((threshold_for_sensitivity(0.0) - 0.0205).abs() < 1e-7);
    assert!((threshold_for_sensitivity(50.0) - 0.0105).abs() < 1e-7);
    // Out-of-range inputs clamp to the endpoints.
    assert_eq!(
        threshold_for_sensitivity(250.0),
        threshold_for_sensitivity(100.0)
    );
    assert_eq!(
        threshold_for_sensitivity(-5.0),
        threshold_for_sensitivity(0.0)
    );
}

#[test]
fn silence_detection_edges() {
    assert!(is_silent(&[], 0.0005));
    assert!(is_silent(&[0.0001; 64], 0.0005));
    assert!(!is_silent(&[0.5; 64], 0.0205));
}

#[test]
fn downsample_equal_rates_is_identity() {
    let input = sine(440.0, 16_000, 320);
    let out = downsample(&input, 16_000, 16_000).unwrap();
    assert_eq!(out, input);
}

#[test]
fn downsample_rejects_upsampling_and_zero_rates() {
    assert!(downsample(&[0.0; 16], 16_000, 48_000).is_err());
    assert!(downsample(&[0.0; 16], 0, 16_000).is_err());
    assert!(downsample(&[0.0; 16], 48_000, 0).is_err());
}

#[test]
fn downsample_48k_to_16k_lengths_and_averaging() {
    let out = downsample(&[3.0, 6.0, 9.0, 1.0, 2.0, 3.0], 48_000, 16_000).unwrap();
    assert_eq!(out, vec![6.0, 2.0]);

    let input = vec![0.25f32; 4096];
    let out = downsample(&input, 48_000, 16_000).unwrap();
    assert_eq!(out.len(), (4096.0f32 / 3.0).round() as usize);
    assert!(out.iter().all(|&s| (s - 0.25).abs() < 1e-6));
}

#[test]
fn quantize_clamps_and_hits_the_i16_extremes() {
    let out = quantize_pcm16(&[-2.0, -1.0, 0.0, 1.0, 2.0]);
    assert_eq!(out, vec![i16::MIN, i16::MIN, 0, i16::MAX, i16::MAX]);
}

#[test]
fn quantize_round_trips_within_one_step() {
    let input = sine(440.0, 16_000, 256);
    let quantized = quantize_pcm16(&input);
    for (&orig, &q) in input.iter().zip(&quantized) {
        let back = if q < 0 {
            q as f32 / 32_768.0
        } else {
            q as f32 / 32_767.0
        };
        assert!((orig - back).abs() <= 1.0 / 32_768.0);
    }
}

#[test]
fn pcm16_bytes_are_little_endian() {
    let bytes = pcm16_to_le_bytes(&[0x0102, -2]);
    assert_eq!(bytes, vec![0x02, 0x01, 0xFE, 0xFF]);
}

#[test]
fn encode_chunk_produces_two_bytes_per_output_sample() {
    let input = sine(440.0, 48_000, 4096);
    let bytes = encode_chunk(&input, 48_000, TARGET_RATE).unwrap();
    let expected_samples = (4096.0f32 / 3.0).round() as usize;
    assert_eq!(bytes.len(), expected_samples * 2);
}

#[test]
fn downmix_averages_interleaved_frames() {
    let mut mono = Vec::new();
    append_downmixed_samples(&mut mono, &[0.2f32, 0.4, -0.6, -0.2], 2, |s| s);
    assert_eq!(mono.len(), 2);
    assert!((mono[0] - 0.3).abs() < 1e-6);
    assert!((mono[1] + 0.4).abs() < 1e-6);

    let mut passthrough = Vec::new();
    append_downmixed_samples(&mut passthrough, &[1i16, -1], 1, |s| s as f32);
    assert_eq!(passthrough, vec![1.0, -1.0]);
}

#[test]
fn dispatcher_emits_fixed_size_chunks() {
    let (tx, rx) = bounded(8);
    let dropped = Arc::new(AtomicUsize::new(0));
    let mut pump = ChunkDispatcher::new(4, tx, dropped.clone());

    pump.push(&[0.1f32, 0.2, 0.3], 1, |s| s);
    assert!(rx.try_recv().is_err());

    pump.push(&[0.4f32, 0.5], 1, |s| s);
    let chunk = rx.try_recv().unwrap();
    assert_eq!(chunk, vec![0.1, 0.2, 0.3, 0.4]);
    assert_eq!(dropped.load(Ordering::Relaxed), 0);
}

#[test]
fn dispatcher_drops_and_counts_when_consumer_stalls() {
    let (tx, rx) = bounded(1);
    let dropped = Arc::new(AtomicUsize::new(0));
    let mut pump = ChunkDispatcher::new(2, tx, dropped.clone());

    pump.push(&[0.1f32, 0.2, 0.3, 0.4, 0.5, 0.6], 1, |s| s);
    assert_eq!(dropped.load(Ordering::Relaxed), 2);
    assert_eq!(rx.try_recv().unwrap(), vec![0.1, 0.2]);
}

// Runs against real hardware when present; headless machines exercise the
// permission-denied path instead.
#[test]
fn capture_open_yields_ready_or_permission_denied() {
    match CaptureSession::open(None, 2048) {
        Ok(mut session) => {
            assert!(session.is_ready());
            assert!(session.sample_rate() > 0);
            session.stop();
            assert_eq!(session.state(), CaptureState::Uninitialized);
            session.stop();
            assert_eq!(session.state(), CaptureState::Uninitialized);
        }
        Err(err) => {
            assert!(matches!(
                err,
                PipelineError::PermissionDenied(_) | PipelineError::InvalidConfig(_)
            ));
        }
    }
}

#[test]
fn hann_window_endpoints_and_symmetry() {
    let size = 2048;
    assert!(super::spectrum::hann_window(0, size).abs() < 1e-6);
    assert!(super::spectrum::hann_window(size - 1, size).abs() < 1e-3);
    let mid = super::spectrum::hann_window(size / 2, size);
    assert!((mid - 1.0).abs() < 1e-4);
}

#[test]
fn spectrum_pads_short_input_and_takes_newest_tail() {
    let mut analyzer = SpectrumAnalyzer::new(64);
    assert_eq!(analyzer.bin_count(), 32);
    let short = analyzer.magnitudes_db(&[0.5; 16]);
    assert_eq!(short.len(), 32);
    let long = analyzer.magnitudes_db(&sine(1000.0, 48_000, 4096));
    assert_eq!(long.len(), 32);
}

#[test]
fn full_scale_sine_reads_near_zero_db() {
    let mut analyzer = SpectrumAnalyzer::new(2048);
    let spectrum = analyzer.magnitudes_db(&sine(468.75, 48_000, 2048));
    let peak = spectrum.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    assert!(peak > -1.0 && peak < 1.0, "peak {peak} dB");
}

#[test]
fn zero_input_produces_zero_bands_end_to_end() {
    let mut analyzer = SpectrumAnalyzer::new(2048);
    let spectrum = analyzer.magnitudes_db(&[0.0; 2048]);
    assert!(spectrum.iter().all(|&db| db == f32::NEG_INFINITY));
    let bands = map_to_bands(&spectrum, 48_000, 60, DEFAULT_MIN_FREQ_HZ);
    assert!(bands.iter().all(|&b| b == 0.0));
}
