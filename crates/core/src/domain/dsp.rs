//! Digital Signal Processing stages for the effect chain
//!
//! This module provides:
//! - Distortion waveshapers (softclip, hardclip, full/half rectify)
//! - The serial biquad filter bank (lowpass -> highpass -> bandpass)
//! - Length-changing pitch resampler
//! - Output gain
//!
//! All stages render offline over whole buffers. There is no realtime
//! constraint; a stage may allocate scratch space and may change the
//! buffer length (pitch does).

use crate::domain::audio::{Result, SampleBuffer, SAMPLE_RATE};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// A single effect stage in the chain.
///
/// Stages render in-place on a copy of their upstream buffer. Rendering is
/// fallible for trait uniformity; most stages cannot fail.
pub trait StageRenderer: Send {
    /// Stage name for logging and display
    fn name(&self) -> &'static str;

    /// Render the stage over the whole buffer
    fn render(&mut self, buffer: &mut SampleBuffer) -> Result<()>;
}

/// Parameter constraints for all stages
///
/// Setters clamp into these ranges so the renderers never see an invalid
/// state.
pub mod ranges {
    /// Clip thresholds (linear amplitude)
    pub const THRESHOLD_MIN: f32 = 0.0;
    pub const THRESHOLD_MAX: f32 = 1.0;

    /// Filter cutoff in Hz and resonance
    pub const CUTOFF_MIN: f32 = 1.0;
    pub const CUTOFF_MAX: f32 = 20_000.0;
    pub const Q_MIN: f32 = 0.1;
    pub const Q_MAX: f32 = 10.0;

    /// Pitch resampling ratio
    pub const PITCH_MIN: f32 = 0.1;
    pub const PITCH_MAX: f32 = 4.0;

    /// Output gain in dB
    pub const GAIN_DB_MIN: f32 = -40.0;
    pub const GAIN_DB_MAX: f32 = 40.0;

    /// Extractor grain controls
    pub const INTENSITY_MAX: u32 = 50;
    pub const WIDTH_MAX: u32 = 100;

    /// Reverz block controls
    pub const REVERZ_SKEW_MIN: i32 = -10;
    pub const REVERZ_SKEW_MAX: i32 = 10;
    pub const REVERZ_AMOUNT_MIN: f32 = 1.0;
    pub const REVERZ_AMOUNT_MAX: f32 = 64.0;

    /// Stutter block controls (block counts stay even)
    pub const STUTTER_AMOUNT_MIN: u32 = 4;
    pub const STUTTER_AMOUNT_MAX: u32 = 64;
    pub const CHORUS_MAX: f32 = 20.0;
    pub const DELAY_MS_MIN: f32 = 1.0;
    pub const DELAY_MS_MAX: f32 = 99.0;

    /// Shifter block controls
    pub const SHIFTER_AMOUNT_MIN: u32 = 4;
    pub const SHIFTER_AMOUNT_MAX: u32 = 128;
    pub const TONE_MIN: f32 = 1.0;
    pub const TONE_MAX: f32 = 8.0;
}

/// Convert decibels to a linear amplitude multiplier.
#[must_use]
pub fn db_to_amplitude(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Round an even block count into its valid range, keeping it even.
pub(crate) fn clamp_even(value: u32, min: u32, max: u32) -> u32 {
    let v = value.clamp(min, max);
    v - (v % 2)
}

// ============================================================================
// DISTORTION WAVESHAPERS
// ============================================================================

/// Knee of the softclip transfer curve; samples at or above it saturate.
const SOFTCLIP_KNEE: f32 = 0.666;
const SOFTCLIP_SCALE: f32 = 1.880_79;
const SOFTCLIP_EXPONENT: f32 = 4.939_17;

/// Softclip distortion parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoftclipParams {
    pub enabled: bool,
    /// Output ceiling in linear amplitude
    pub threshold: f32,
}

impl Default for SoftclipParams {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 0.0,
        }
    }
}

impl SoftclipParams {
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.threshold = self
            .threshold
            .clamp(ranges::THRESHOLD_MIN, ranges::THRESHOLD_MAX);
        self
    }
}

/// Hardclip distortion parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HardclipParams {
    pub enabled: bool,
    /// Clamp ceiling in linear amplitude
    pub threshold: f32,
}

impl Default for HardclipParams {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 0.0,
        }
    }
}

impl HardclipParams {
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.threshold = self
            .threshold
            .clamp(ranges::THRESHOLD_MIN, ranges::THRESHOLD_MAX);
        self
    }
}

/// Rectifier stage parameters (no numeric controls)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RectifyParams {
    pub enabled: bool,
}

/// Which rectifier transfer curve to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RectifyKind {
    /// `y = |x|`
    Full,
    /// `y = max(x, 0)`
    Half,
}

/// Softclip waveshaper: polynomial saturation below the knee, flat above.
pub struct Softclip {
    params: SoftclipParams,
}

impl Softclip {
    pub fn new(params: SoftclipParams) -> Self {
        Self {
            params: params.clamped(),
        }
    }

    #[inline]
    fn shape(x: f32, threshold: f32) -> f32 {
        let mag = x.abs();
        if mag == 0.0 {
            0.0
        } else if mag < SOFTCLIP_KNEE {
            x.signum() * SOFTCLIP_SCALE * threshold * (mag - mag.powf(SOFTCLIP_EXPONENT))
        } else {
            // Above the knee the curve hard-limits at full scale; the
            // threshold only shapes the polynomial region.
            x.signum()
        }
    }
}

impl StageRenderer for Softclip {
    fn name(&self) -> &'static str {
        "softclip"
    }

    fn render(&mut self, buffer: &mut SampleBuffer) -> Result<()> {
        let threshold = self.params.threshold;
        for ch in buffer.channels_mut() {
            for sample in ch.iter_mut() {
                *sample = Self::shape(*sample, threshold);
            }
        }
        trace!(threshold, "softclip rendered");
        Ok(())
    }
}

/// Hardclip waveshaper: clamp into `[-threshold, threshold]`.
pub struct Hardclip {
    params: HardclipParams,
}

impl Hardclip {
    pub fn new(params: HardclipParams) -> Self {
        Self {
            params: params.clamped(),
        }
    }
}

impl StageRenderer for Hardclip {
    fn name(&self) -> &'static str {
        "hardclip"
    }

    fn render(&mut self, buffer: &mut SampleBuffer) -> Result<()> {
        let t = self.params.threshold;
        for ch in buffer.channels_mut() {
            for sample in ch.iter_mut() {
                *sample = sample.clamp(-t, t);
            }
        }
        trace!(threshold = t, "hardclip rendered");
        Ok(())
    }
}

/// Full or half wave rectifier.
pub struct Rectifier {
    kind: RectifyKind,
}

impl Rectifier {
    pub fn new(kind: RectifyKind) -> Self {
        Self { kind }
    }
}

impl StageRenderer for Rectifier {
    fn name(&self) -> &'static str {
        match self.kind {
            RectifyKind::Full => "full_rectify",
            RectifyKind::Half => "half_rectify",
        }
    }

    fn render(&mut self, buffer: &mut SampleBuffer) -> Result<()> {
        for ch in buffer.channels_mut() {
            for sample in ch.iter_mut() {
                *sample = match self.kind {
                    RectifyKind::Full => sample.abs(),
                    RectifyKind::Half => sample.max(0.0),
                };
            }
        }
        Ok(())
    }
}

// ============================================================================
// BIQUAD FILTER BANK
// ============================================================================

/// Filter topology for one section of the bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterTopology {
    Lowpass,
    Highpass,
    Bandpass,
}

/// Bilinear-transform biquad coefficients
///
/// Computed once per render call; within a render the response is
/// constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub a0: f64,
    pub a1: f64,
    pub a2: f64,
    pub b1: f64,
    pub b2: f64,
}

impl BiquadCoeffs {
    /// Compute coefficients for the given topology at the project sample
    /// rate.
    #[must_use]
    pub fn compute(topology: FilterTopology, cutoff: f32, q: f32) -> Self {
        let k = (std::f64::consts::PI * cutoff as f64 / SAMPLE_RATE as f64).tan();
        let q = q as f64;
        let norm = 1.0 / (1.0 + k / q + k * k);

        let (a0, a1, a2) = match topology {
            FilterTopology::Lowpass => {
                let a0 = k * k * norm;
                (a0, 2.0 * a0, a0)
            }
            FilterTopology::Highpass => (norm, -2.0 * norm, norm),
            FilterTopology::Bandpass => {
                let a0 = k / q * norm;
                (a0, 0.0, -a0)
            }
        };

        Self {
            a0,
            a1,
            a2,
            b1: 2.0 * (k * k - 1.0) * norm,
            b2: (1.0 - k / q + k * k) * norm,
        }
    }

    /// Analytic magnitude response at a frequency in Hz, for display.
    #[must_use]
    pub fn magnitude_response(&self, freq: f32) -> f32 {
        let w = 2.0 * std::f64::consts::PI * freq as f64 / SAMPLE_RATE as f64;
        let (a0, a1, a2, b1, b2) = (self.a0, self.a1, self.a2, self.b1, self.b2);

        let numerator = (a0 * a0
            + a1 * a1
            + a2 * a2
            + 2.0 * (a0 * a1 + a1 * a2) * w.cos()
            + 2.0 * a0 * a2 * (2.0 * w).cos())
        .sqrt();
        let denominator = (1.0
            + b1 * b1
            + b2 * b2
            + 2.0 * (b1 + b1 * b2) * w.cos()
            + 2.0 * b2 * (2.0 * w).cos())
        .sqrt();

        (numerator / denominator) as f32
    }
}

/// Per-channel delay registers for one biquad section
///
/// Transposed Direct Form II; state is reset at the start of each render.
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    z1: f64,
    z2: f64,
}

impl BiquadState {
    #[inline]
    fn process_sample(&mut self, coeffs: &BiquadCoeffs, x: f32) -> f32 {
        let x = x as f64;
        let y = x * coeffs.a0 + self.z1;
        self.z1 = x * coeffs.a1 + self.z2 - coeffs.b1 * y;
        self.z2 = x * coeffs.a2 - coeffs.b2 * y;
        y as f32
    }
}

/// Parameters for one section of the filter bank
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadParams {
    pub enabled: bool,
    pub cutoff: f32,
    pub q: f32,
}

impl BiquadParams {
    fn with_cutoff(cutoff: f32) -> Self {
        Self {
            enabled: false,
            cutoff,
            q: 1.0,
        }
    }

    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.cutoff = self.cutoff.clamp(ranges::CUTOFF_MIN, ranges::CUTOFF_MAX);
        self.q = self.q.clamp(ranges::Q_MIN, ranges::Q_MAX);
        self
    }
}

/// Parameters for the whole filter stage
///
/// The three sections run serially in fixed order: lowpass, then highpass,
/// then bandpass. Each enabled section feeds from the output of the nearest
/// enabled section above it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterBankParams {
    pub lowpass: BiquadParams,
    pub highpass: BiquadParams,
    pub bandpass: BiquadParams,
}

impl Default for FilterBankParams {
    fn default() -> Self {
        Self {
            lowpass: BiquadParams::with_cutoff(2000.0),
            highpass: BiquadParams::with_cutoff(200.0),
            bandpass: BiquadParams::with_cutoff(666.0),
        }
    }
}

impl FilterBankParams {
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.lowpass = self.lowpass.clamped();
        self.highpass = self.highpass.clamped();
        self.bandpass = self.bandpass.clamped();
        self
    }

    /// True when at least one section runs.
    pub fn any_enabled(&self) -> bool {
        self.lowpass.enabled || self.highpass.enabled || self.bandpass.enabled
    }
}

/// Serial biquad filter bank stage.
pub struct FilterBank {
    params: FilterBankParams,
}

impl FilterBank {
    pub fn new(params: FilterBankParams) -> Self {
        Self {
            params: params.clamped(),
        }
    }

    fn run_section(topology: FilterTopology, section: &BiquadParams, buffer: &mut SampleBuffer) {
        let coeffs = BiquadCoeffs::compute(topology, section.cutoff, section.q);
        for ch in buffer.channels_mut() {
            let mut state = BiquadState::default();
            for sample in ch.iter_mut() {
                *sample = state.process_sample(&coeffs, *sample);
            }
        }
        trace!(?topology, cutoff = section.cutoff, q = section.q, "filter section rendered");
    }
}

impl StageRenderer for FilterBank {
    fn name(&self) -> &'static str {
        "filters"
    }

    fn render(&mut self, buffer: &mut SampleBuffer) -> Result<()> {
        let sections = [
            (FilterTopology::Lowpass, self.params.lowpass),
            (FilterTopology::Highpass, self.params.highpass),
            (FilterTopology::Bandpass, self.params.bandpass),
        ];
        for (topology, section) in sections {
            if section.enabled {
                Self::run_section(topology, &section, buffer);
            }
        }
        Ok(())
    }
}

// ============================================================================
// PITCH
// ============================================================================

/// Samples at the start of the buffer that keep their original values when
/// resampling upward in length; reads below the write index would otherwise
/// source from already-overwritten input.
const PITCH_PREFIX: usize = 11;

/// Pitch stage parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchParams {
    pub enabled: bool,
    /// Resampling ratio; > 1 raises pitch and shortens the buffer
    pub ratio: f32,
}

impl Default for PitchParams {
    fn default() -> Self {
        Self {
            enabled: false,
            ratio: 1.0,
        }
    }
}

impl PitchParams {
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.ratio = self.ratio.clamp(ranges::PITCH_MIN, ranges::PITCH_MAX);
        self
    }
}

/// Nearest-neighbor pitch resampler. Changes buffer length: duration shifts
/// with pitch rather than being stretch-compensated.
pub struct PitchShifter {
    params: PitchParams,
}

impl PitchShifter {
    pub fn new(params: PitchParams) -> Self {
        Self {
            params: params.clamped(),
        }
    }
}

impl StageRenderer for PitchShifter {
    fn name(&self) -> &'static str {
        "pitch"
    }

    fn render(&mut self, buffer: &mut SampleBuffer) -> Result<()> {
        let ratio = self.params.ratio;
        let n = buffer.num_samples();
        if n == 0 || (ratio - 1.0).abs() < f32::EPSILON {
            return Ok(());
        }

        let new_len = (n as f32 / ratio).round() as usize;
        if ratio > 1.0 {
            // Shrink: forward fill reads ahead of the write index.
            for ch in buffer.channels_mut() {
                for i in 0..new_len {
                    let src = ((i as f32 * ratio).round() as usize).min(n - 1);
                    ch[i] = ch[src];
                }
            }
            buffer.resize(new_len);
        } else {
            // Grow first, then fill from the top down.
            buffer.resize(new_len);
            for ch in buffer.channels_mut() {
                for i in (PITCH_PREFIX..new_len).rev() {
                    let src = ((i as f32 * ratio).round() as usize).min(new_len - 1);
                    ch[i] = ch[src];
                }
            }
        }

        trace!(ratio, from = n, to = new_len, "pitch rendered");
        Ok(())
    }
}

// ============================================================================
// GAIN
// ============================================================================

/// Output gain parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainParams {
    pub enabled: bool,
    pub gain_db: f32,
}

impl Default for GainParams {
    fn default() -> Self {
        Self {
            enabled: false,
            gain_db: 0.0,
        }
    }
}

impl GainParams {
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.gain_db = self.gain_db.clamp(ranges::GAIN_DB_MIN, ranges::GAIN_DB_MAX);
        self
    }
}

/// Constant gain stage.
pub struct GainStage {
    params: GainParams,
}

impl GainStage {
    pub fn new(params: GainParams) -> Self {
        Self {
            params: params.clamped(),
        }
    }
}

impl StageRenderer for GainStage {
    fn name(&self) -> &'static str {
        "gain"
    }

    fn render(&mut self, buffer: &mut SampleBuffer) -> Result<()> {
        buffer.apply_gain(db_to_amplitude(self.params.gain_db));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::f32::consts::PI;

    /// Generate a sine test signal
    fn generate_test_signal(freq: f32, num_samples: usize, amplitude: f32) -> Vec<f32> {
        (0..num_samples)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                amplitude * (2.0 * PI * freq * t).sin()
            })
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    fn stereo_buffer(samples: Vec<f32>) -> SampleBuffer {
        SampleBuffer::from_channels(vec![samples.clone(), samples]).unwrap()
    }

    #[test]
    fn test_softclip_saturates_above_knee() {
        let mut stage = Softclip::new(SoftclipParams {
            enabled: true,
            threshold: 1.0,
        });
        let mut buf = stereo_buffer(vec![0.9, -0.9, 0.666]);
        stage.render(&mut buf).unwrap();
        assert_eq!(buf.channel(0), &[1.0, -1.0, 1.0]);
    }

    #[test]
    fn test_softclip_hard_limit_ignores_threshold() {
        let mut stage = Softclip::new(SoftclipParams {
            enabled: true,
            threshold: 0.3,
        });
        let mut buf = stereo_buffer(vec![0.9, -0.9]);
        stage.render(&mut buf).unwrap();
        assert_eq!(buf.channel(0), &[1.0, -1.0]);
    }

    #[test]
    fn test_softclip_polynomial_below_knee() {
        let mut stage = Softclip::new(SoftclipParams {
            enabled: true,
            threshold: 1.0,
        });
        let x = 0.3f32;
        let mut buf = stereo_buffer(vec![x, -x, 0.0]);
        stage.render(&mut buf).unwrap();

        let expected = SOFTCLIP_SCALE * (x - x.powf(SOFTCLIP_EXPONENT));
        assert!((buf.channel(0)[0] - expected).abs() < 1e-6);
        assert!((buf.channel(0)[1] + expected).abs() < 1e-6);
        assert_eq!(buf.channel(0)[2], 0.0);
    }

    #[test]
    fn test_softclip_threshold_scales_polynomial_region() {
        let mut stage = Softclip::new(SoftclipParams {
            enabled: true,
            threshold: 0.5,
        });
        let x = 0.3f32;
        let mut buf = stereo_buffer(vec![x]);
        stage.render(&mut buf).unwrap();

        let expected = 0.5 * SOFTCLIP_SCALE * (x - x.powf(SOFTCLIP_EXPONENT));
        assert!((buf.channel(0)[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_hardclip_clamps() {
        let mut stage = Hardclip::new(HardclipParams {
            enabled: true,
            threshold: 0.25,
        });
        let mut buf = stereo_buffer(vec![1.0, -1.0, 0.1]);
        stage.render(&mut buf).unwrap();
        assert_eq!(buf.channel(0), &[0.25, -0.25, 0.1]);
    }

    #[test]
    fn test_rectifiers() {
        let mut full = Rectifier::new(RectifyKind::Full);
        let mut buf = stereo_buffer(vec![0.5, -0.5, 0.0]);
        full.render(&mut buf).unwrap();
        assert_eq!(buf.channel(0), &[0.5, 0.5, 0.0]);

        let mut half = Rectifier::new(RectifyKind::Half);
        let mut buf = stereo_buffer(vec![0.5, -0.5, 0.0]);
        half.render(&mut buf).unwrap();
        assert_eq!(buf.channel(0), &[0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_lowpass_attenuates_high_frequencies() {
        let high = generate_test_signal(10_000.0, 4096, 0.8);
        let mut buf = stereo_buffer(high.clone());

        let mut params = FilterBankParams::default();
        params.lowpass.enabled = true;
        params.lowpass.cutoff = 500.0;
        let mut bank = FilterBank::new(params);
        bank.render(&mut buf).unwrap();

        let input_rms = rms(&high);
        let output_rms = rms(buf.channel(0));
        assert!(
            output_rms < input_rms * 0.2,
            "expected heavy attenuation, got {output_rms} vs {input_rms}"
        );
    }

    #[test]
    fn test_lowpass_passes_low_frequencies() {
        let low = generate_test_signal(100.0, 8192, 0.8);
        let mut buf = stereo_buffer(low.clone());

        let mut params = FilterBankParams::default();
        params.lowpass.enabled = true;
        params.lowpass.cutoff = 5000.0;
        let mut bank = FilterBank::new(params);
        bank.render(&mut buf).unwrap();

        let input_rms = rms(&low);
        let output_rms = rms(buf.channel(0));
        assert!(
            (output_rms - input_rms).abs() < input_rms * 0.1,
            "passband should be near unity, got {output_rms} vs {input_rms}"
        );
    }

    #[test]
    fn test_highpass_attenuates_low_frequencies() {
        let low = generate_test_signal(50.0, 8192, 0.8);
        let mut buf = stereo_buffer(low.clone());

        let mut params = FilterBankParams::default();
        params.highpass.enabled = true;
        params.highpass.cutoff = 2000.0;
        let mut bank = FilterBank::new(params);
        bank.render(&mut buf).unwrap();

        assert!(rms(buf.channel(0)) < rms(&low) * 0.2);
    }

    #[test]
    fn test_magnitude_response_shape() {
        let lp = BiquadCoeffs::compute(FilterTopology::Lowpass, 1000.0, 1.0);
        assert!((lp.magnitude_response(10.0) - 1.0).abs() < 0.05);
        assert!(lp.magnitude_response(20_000.0) < 0.05);

        let hp = BiquadCoeffs::compute(FilterTopology::Highpass, 1000.0, 1.0);
        assert!(hp.magnitude_response(10.0) < 0.05);
        assert!((hp.magnitude_response(20_000.0) - 1.0).abs() < 0.1);

        let bp = BiquadCoeffs::compute(FilterTopology::Bandpass, 1000.0, 1.0);
        assert!(bp.magnitude_response(10.0) < 0.1);
        assert!(bp.magnitude_response(20_000.0) < 0.1);
        assert!(bp.magnitude_response(1000.0) > bp.magnitude_response(100.0));
    }

    #[test]
    fn test_pitch_up_shortens_buffer() {
        let signal = generate_test_signal(440.0, 1000, 0.5);
        let mut buf = stereo_buffer(signal);
        let mut stage = PitchShifter::new(PitchParams {
            enabled: true,
            ratio: 2.0,
        });
        stage.render(&mut buf).unwrap();
        assert_eq!(buf.num_samples(), 500);
    }

    #[test]
    fn test_pitch_down_lengthens_buffer() {
        let signal = generate_test_signal(440.0, 1000, 0.5);
        let mut buf = stereo_buffer(signal);
        let mut stage = PitchShifter::new(PitchParams {
            enabled: true,
            ratio: 0.5,
        });
        stage.render(&mut buf).unwrap();
        assert_eq!(buf.num_samples(), 2000);
    }

    #[test]
    fn test_pitch_unity_is_identity() {
        let signal = generate_test_signal(440.0, 1000, 0.5);
        let mut buf = stereo_buffer(signal.clone());
        let mut stage = PitchShifter::new(PitchParams {
            enabled: true,
            ratio: 1.0,
        });
        stage.render(&mut buf).unwrap();
        assert_eq!(buf.channel(0), signal.as_slice());
    }

    #[test]
    fn test_pitch_tiny_buffer_does_not_panic() {
        let mut buf = stereo_buffer(vec![0.5]);
        let mut stage = PitchShifter::new(PitchParams {
            enabled: true,
            ratio: 4.0,
        });
        stage.render(&mut buf).unwrap();
    }

    #[test]
    fn test_gain_six_db_doubles() {
        let mut buf = stereo_buffer(vec![0.25; 64]);
        let mut stage = GainStage::new(GainParams {
            enabled: true,
            gain_db: 6.0,
        });
        stage.render(&mut buf).unwrap();
        // +6 dB is a factor of ~1.9953
        assert!((buf.channel(0)[0] - 0.4988).abs() < 1e-3);
    }

    #[test]
    fn test_param_clamping() {
        let p = GainParams {
            enabled: true,
            gain_db: 100.0,
        }
        .clamped();
        assert_eq!(p.gain_db, ranges::GAIN_DB_MAX);

        let f = BiquadParams {
            enabled: true,
            cutoff: -5.0,
            q: 99.0,
        }
        .clamped();
        assert_eq!(f.cutoff, ranges::CUTOFF_MIN);
        assert_eq!(f.q, ranges::Q_MAX);

        assert_eq!(clamp_even(7, 4, 64), 6);
        assert_eq!(clamp_even(3, 4, 64), 4);
        assert_eq!(clamp_even(200, 4, 64), 64);
    }

    proptest! {
        #[test]
        fn prop_hardclip_bounded(samples in proptest::collection::vec(-2.0f32..2.0, 1..256), t in 0.0f32..1.0) {
            let mut buf = SampleBuffer::from_channels(vec![samples]).unwrap();
            let mut stage = Hardclip::new(HardclipParams { enabled: true, threshold: t });
            stage.render(&mut buf).unwrap();
            for &s in buf.channel(0) {
                prop_assert!(s.abs() <= t + f32::EPSILON);
            }
        }

        #[test]
        fn prop_softclip_bounded_by_unity(samples in proptest::collection::vec(-2.0f32..2.0, 1..256), t in 0.0f32..1.0) {
            let mut buf = SampleBuffer::from_channels(vec![samples.clone()]).unwrap();
            let mut stage = Softclip::new(SoftclipParams { enabled: true, threshold: t });
            stage.render(&mut buf).unwrap();
            // The hard limit sits at full scale for any threshold; only
            // the polynomial region scales with t.
            for (&s, &x) in buf.channel(0).iter().zip(&samples) {
                prop_assert!(s.abs() <= 1.0 + f32::EPSILON);
                if x.abs() >= SOFTCLIP_KNEE {
                    prop_assert!((s - x.signum()).abs() <= f32::EPSILON);
                }
            }
        }
    }
}
