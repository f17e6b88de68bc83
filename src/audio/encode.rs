//! Downsampling and PCM16 quantization for the outbound audio stream.
//!
//! Both stages are pure and run once per capture chunk inside the streaming
//! session's worker; they perform no I/O and never block, so a 4096-sample
//! chunk always clears well inside the inter-callback interval.

use crate::error::{PipelineError, PipelineResult};

/// Average-decimating downsampler.
///
/// Output length is `round(input.len() / ratio)` with
/// `ratio = source_rate / target_rate`; each output sample averages the input
/// samples in its source window, with window boundaries at
/// `round((i + 1) * ratio)`. Equal rates are a no-op fast path. Upsampling is
/// a programming error and fails fast with `InvalidConfig`.
pub fn downsample(input: &[f32], source_rate: u32, target_rate: u32) -> PipelineResult<Vec<f32>> {
    if target_rate == source_rate {
        return Ok(input.to_vec());
    }
    if target_rate == 0 || source_rate == 0 {
        return Err(PipelineError::InvalidConfig(format!(
            "sample rates must be positive (source {source_rate} Hz, target {target_rate} Hz)"
        )));
    }
    if target_rate > source_rate {
        return Err(PipelineError::InvalidConfig(format!(
            "downsample target {target_rate} Hz exceeds source rate {source_rate} Hz"
        )));
    }

    let ratio = source_rate as f32 / target_rate as f32;
    let out_len = (input.len() as f32 / ratio).round() as usize;
    let mut out = Vec::with_capacity(out_len);

    let mut window_start = 0usize;
    for i in 0..out_len {
        let window_end = (((i + 1) as f32) * ratio).round() as usize;
        let end = window_end.min(input.len());
        let start = window_start.min(end);

        let span = &input[start..end];
        if span.is_empty() {
            // Rounding can leave the final window empty; repeat the last
            // sample instead of emitting NaN.
            out.push(input.last().copied().unwrap_or(0.0));
        } else {
            out.push(span.iter().sum::<f32>() / span.len() as f32);
        }
        window_start = window_end;
    }

    Ok(out)
}

/// Quantize float samples to 16-bit signed PCM.
///
/// Samples are clamped to [-1, 1]; negative values scale by 32768 and
/// non-negative by 32767 so both endpoints hit the extremes of the i16 range,
/// rounding to the nearest representable integer.
pub fn quantize_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&sample| {
            let clamped = sample.clamp(-1.0, 1.0);
            if clamped < 0.0 {
                (clamped * 32_768.0).round() as i16
            } else {
                (clamped * 32_767.0).round() as i16
            }
        })
        .collect()
}

/// Little-endian byte layout used for the binary wire messages.
pub fn pcm16_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Full per-chunk encoding pipeline: downsample to `target_rate`, quantize,
/// and serialize as little-endian PCM16.
pub fn encode_chunk(input: &[f32], source_rate: u32, target_rate: u32) -> PipelineResult<Vec<u8>> {
    let downsampled = downsample(input, source_rate, target_rate)?;
    Ok(pcm16_to_le_bytes(&quantize_pcm16(&downsampled)))
}
