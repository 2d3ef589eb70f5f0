//! Offline spectrum analysis
//!
//! Computes a Hann-windowed magnitude spectrum of the first channel with
//! rustfft. Used for the analyzer view and for integration checks on the
//! filter stages.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::f32::consts::PI;
use waveforge_core::domain::audio::{SampleBuffer, SAMPLE_RATE};

/// Magnitude spectrum of channel 0 over the first `fft_size` samples.
///
/// Returns `fft_size / 2` bins. Shorter buffers are zero-padded.
pub fn magnitude_spectrum(buffer: &SampleBuffer, fft_size: usize) -> Vec<f32> {
    let fft_size = fft_size.max(2);
    let samples = buffer.channel(0);

    let mut input: Vec<Complex<f32>> = (0..fft_size)
        .map(|i| {
            let sample = samples.get(i).copied().unwrap_or(0.0);
            let window = 0.5 * (1.0 - (2.0 * PI * i as f32 / (fft_size - 1) as f32).cos());
            Complex::new(sample * window, 0.0)
        })
        .collect();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(fft_size);
    fft.process(&mut input);

    let scale = 2.0 / fft_size as f32;
    input[..fft_size / 2].iter().map(|c| c.norm() * scale).collect()
}

/// Center frequency of a spectrum bin in Hz.
pub fn bin_frequency(bin: usize, fft_size: usize) -> f32 {
    bin as f32 * SAMPLE_RATE as f32 / fft_size as f32
}
