//! RMS-based silence detection for the analysis loop.

/// Root-mean-square energy of a time-domain buffer. Empty input reads as 0.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let energy: f32 = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    energy.sqrt()
}

/// True when the buffer's RMS falls below `threshold`. An empty buffer is
/// silent by definition rather than an error.
pub fn is_silent(samples: &[f32], threshold: f32) -> bool {
    if samples.is_empty() {
        return true;
    }
    rms(samples) < threshold
}

/// Derive the silence threshold from a 0..=100 sensitivity value.
///
/// Sensitivity 100 gives the lowest threshold (easiest to register as
/// non-silent), sensitivity 0 the highest. Out-of-range inputs are clamped.
pub fn threshold_for_sensitivity(sensitivity: f32) -> f32 {
    let s = sensitivity.clamp(0.0, 100.0);
    0.0005 + (1.0 - s / 100.0) * 0.02
}
