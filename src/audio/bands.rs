//! Log-spaced band mapping for the spectral visualization.
//!
//! Collapses a linear-frequency magnitude spectrum (dB) into a small number
//! of logarithmically spaced bands, normalized so the loudest band is 1.0.
//! Pure so it can be tested against fixed input vectors.

/// Band count used by the visualizer unless overridden.
pub const DEFAULT_BAND_COUNT: usize = 60;

/// Lowest frequency the band axis covers.
pub const DEFAULT_MIN_FREQ_HZ: f32 = 20.0;

/// Map a dB magnitude spectrum onto `band_count` log-spaced bands in [0, 1].
///
/// `magnitudes_db` holds one value per FFT bin below Nyquist, so the
/// transform size is `2 * magnitudes_db.len()`. The log axis runs from
/// `min_freq_hz` to Nyquist; each band averages the linear amplitudes
/// (`10^(dB/20)`) of the bins its segment covers. A silent or empty input
/// yields an all-zero vector instead of dividing by zero.
pub fn map_to_bands(
    magnitudes_db: &[f32],
    sample_rate: u32,
    band_count: usize,
    min_freq_hz: f32,
) -> Vec<f32> {
    let mut out = vec![0.0f32; band_count];
    let bins = magnitudes_db.len();
    if bins == 0 || band_count == 0 || sample_rate == 0 || min_freq_hz <= 0.0 {
        return out;
    }

    let fft_size = bins * 2;
    let nyquist = sample_rate as f32 / 2.0;
    let bin_freq = sample_rate as f32 / fft_size as f32;

    let log_min = min_freq_hz.log10();
    let log_max = (min_freq_hz + 1.0).max(nyquist).log10();
    let log_span = log_max - log_min;

    let mut max_val = 0.0f32;

    for (i, band) in out.iter_mut().enumerate() {
        let start_freq = 10f32.powf(log_min + (i as f32 / band_count as f32) * log_span);
        let end_freq = 10f32.powf(log_min + ((i + 1) as f32 / band_count as f32) * log_span);

        let mut start_bin = (start_freq / bin_freq).floor() as i64;
        let mut end_bin = (end_freq / bin_freq).ceil() as i64;

        start_bin = start_bin.clamp(0, bins as i64 - 1);
        end_bin = end_bin.clamp(0, bins as i64 - 1);
        if end_bin < start_bin {
            end_bin = start_bin;
        }

        let mut sum = 0.0f32;
        for db in &magnitudes_db[start_bin as usize..=end_bin as usize] {
            sum += 10f32.powf(db / 20.0);
        }
        let avg = sum / (end_bin - start_bin + 1) as f32;
        *band = avg;
        if avg > max_val {
            max_val = avg;
        }
    }

    if max_val > 0.0 {
        for band in out.iter_mut() {
            *band /= max_val;
        }
    }

    out
}

/// Frequency range `[start, end)` covered by band `index`, in Hz. Mirrors the
/// segment math in [`map_to_bands`] so callers can label bands.
pub fn band_range_hz(
    index: usize,
    sample_rate: u32,
    band_count: usize,
    min_freq_hz: f32,
) -> (f32, f32) {
    if band_count == 0 || sample_rate == 0 || min_freq_hz <= 0.0 {
        return (0.0, 0.0);
    }
    let nyquist = sample_rate as f32 / 2.0;
    let log_min = min_freq_hz.log10();
    let log_span = (min_freq_hz + 1.0).max(nyquist).log10() - log_min;
    let start = 10f32.powf(log_min + (index as f32 / band_count as f32) * log_span);
    let end = 10f32.powf(log_min + ((index + 1) as f32 / band_count as f32) * log_span);
    (start, end)
}
