//! Hann-windowed FFT producing the dB magnitude spectrum the band mapper
//! consumes. Stands in for the browser AnalyserNode the original pipeline
//! leaned on.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Reusable FFT plan plus scratch buffers for one transform size.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    window_sum: f32,
    scratch: Vec<Complex<f32>>,
    fft_size: usize,
}

impl SpectrumAnalyzer {
    pub fn new(fft_size: usize) -> Self {
        let fft_size = fft_size.max(2);
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let window: Vec<f32> = (0..fft_size).map(|i| hann_window(i, fft_size)).collect();
        let window_sum: f32 = window.iter().sum();
        Self {
            fft,
            window,
            window_sum,
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
            fft_size,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Bins below Nyquist; the length of every spectrum this analyzer emits.
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Compute dB magnitudes for the newest `fft_size` samples.
    ///
    /// Shorter inputs are zero-padded at the front, longer inputs use their
    /// tail, so the newest audio always lands in the window. Amplitudes are
    /// normalized so a full-scale sine reads close to 0 dB. A zero-amplitude
    /// bin reads as negative infinity, which the band mapper turns back into
    /// an exact zero; truly silent input must not light up any band.
    pub fn magnitudes_db(&mut self, samples: &[f32]) -> Vec<f32> {
        let n = self.fft_size;
        let tail = if samples.len() > n {
            &samples[samples.len() - n..]
        } else {
            samples
        };
        let pad = n - tail.len();

        for slot in self.scratch.iter_mut().take(pad) {
            *slot = Complex::new(0.0, 0.0);
        }
        for (i, &sample) in tail.iter().enumerate() {
            let idx = pad + i;
            self.scratch[idx] = Complex::new(sample * self.window[idx], 0.0);
        }

        self.fft.process(&mut self.scratch);

        // 2/window_sum compensates for the Hann window and the discarded
        // negative-frequency half.
        let scale = 2.0 / self.window_sum.max(f32::EPSILON);
        self.scratch
            .iter()
            .take(n / 2)
            .map(|c| {
                let amplitude = c.norm() * scale;
                20.0 * amplitude.log10()
            })
            .collect()
    }
}

/// Hann window coefficient for one sample position.
pub fn hann_window(index: usize, size: usize) -> f32 {
    if size <= 1 {
        return 1.0;
    }
    0.5 * (1.0 - ((2.0 * PI * index as f32) / (size as f32 - 1.0)).cos())
}
