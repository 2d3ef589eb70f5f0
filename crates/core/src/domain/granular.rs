//! Slice and splice stages: extractor, reverz, stutter, shifter
//!
//! These stages cut, reverse, repeat and decimate regions of the buffer.
//! Every computed region index is clamped into the buffer, and each splice
//! boundary gets a short linear ramp to avoid hard discontinuities.

use crate::domain::audio::{gain_ramp, Result, SampleBuffer, SAMPLE_RATE};
use crate::domain::dsp::{clamp_even, ranges, StageRenderer};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Grain boundary ramp length for the extractor.
const EXTRACT_SMOOTH: usize = 100;
/// Width parameter to sample count scale.
const EXTRACT_WIDTH_SCALE: usize = 500;
/// Splice boundary ramp lengths.
const REVERZ_SMOOTH: usize = 99;
const STUTTER_SMOOTH: usize = 50;
const SHIFTER_SMOOTH: usize = 75;

// ============================================================================
// EXTRACTOR
// ============================================================================

/// Extractor parameters
///
/// Punches randomly placed silent gaps into the signal. With a fixed seed
/// the gap positions are reproducible; the seed round-trips through
/// presets.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractorParams {
    pub enabled: bool,
    /// Number of gaps to punch per render
    pub intensity: u32,
    /// Gap width control; scaled by 500 samples
    pub width: u32,
    /// Optional RNG seed for reproducible renders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl ExtractorParams {
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.intensity = self.intensity.min(ranges::INTENSITY_MAX);
        self.width = self.width.min(ranges::WIDTH_MAX);
        self
    }
}

/// Random gap extractor stage.
pub struct Extractor {
    params: ExtractorParams,
}

impl Extractor {
    pub fn new(params: ExtractorParams) -> Self {
        Self {
            params: params.clamped(),
        }
    }
}

impl StageRenderer for Extractor {
    fn name(&self) -> &'static str {
        "extractor"
    }

    fn render(&mut self, buffer: &mut SampleBuffer) -> Result<()> {
        let n = buffer.num_samples();
        let width = self.params.width as usize * EXTRACT_WIDTH_SCALE;
        if n == 0 || width == 0 || self.params.intensity == 0 {
            return Ok(());
        }

        let mut rng = match self.params.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };

        for _ in 0..self.params.intensity {
            // One draw per gap; both channels get the same position.
            let idx = rng.random_range(0..n);

            if idx + EXTRACT_SMOOTH < n {
                buffer.apply_gain_ramp_all(idx, EXTRACT_SMOOTH, 1.0, 0.0);
            }
            for j in EXTRACT_SMOOTH..width {
                if idx + j + width + 1 >= n {
                    break;
                }
                if j < width - EXTRACT_SMOOTH {
                    for ch in buffer.channels_mut() {
                        ch[idx + j] = 0.0;
                    }
                } else {
                    buffer.apply_gain_ramp_all(idx + j, EXTRACT_SMOOTH, 0.0, 1.0);
                }
            }
        }

        trace!(
            intensity = self.params.intensity,
            width,
            seeded = self.params.seed.is_some(),
            "extractor rendered"
        );
        Ok(())
    }
}

// ============================================================================
// REVERZ
// ============================================================================

/// Reverz parameters
///
/// Reverses consecutive regions of the buffer. `amount` controls the
/// region density; `skew` slides the region start point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReverzParams {
    pub enabled: bool,
    pub skew: i32,
    pub amount: f32,
}

impl Default for ReverzParams {
    fn default() -> Self {
        Self {
            enabled: false,
            skew: 0,
            amount: 16.0,
        }
    }
}

impl ReverzParams {
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.skew = self
            .skew
            .clamp(ranges::REVERZ_SKEW_MIN, ranges::REVERZ_SKEW_MAX);
        self.amount = self
            .amount
            .clamp(ranges::REVERZ_AMOUNT_MIN, ranges::REVERZ_AMOUNT_MAX);
        self
    }
}

/// Region reversal stage.
pub struct Reverz {
    params: ReverzParams,
}

impl Reverz {
    pub fn new(params: ReverzParams) -> Self {
        Self {
            params: params.clamped(),
        }
    }
}

impl StageRenderer for Reverz {
    fn name(&self) -> &'static str {
        "reverz"
    }

    fn render(&mut self, buffer: &mut SampleBuffer) -> Result<()> {
        let n = buffer.num_samples();
        let amount = self.params.amount * 2.0;
        let block = (n as f32 / amount).round() as i64;
        if n == 0 || block <= 0 {
            return Ok(());
        }
        // Skew offset in float so blocks under 20 samples still shift.
        let offset = (block as f32 / 20.0 * self.params.skew as f32).round() as i64;

        for ch in buffer.channels_mut() {
            let mut i = n as i64;
            while i >= block - 1 {
                let start = ((i - block / 2) - offset).clamp(0, n as i64) as usize;
                let end = i.clamp(0, n as i64) as usize;
                if start < end {
                    ch[start..end].reverse();
                }

                if start >= REVERZ_SMOOTH {
                    gain_ramp(ch, start - REVERZ_SMOOTH, REVERZ_SMOOTH, 1.0, 0.0);
                }
                if start <= REVERZ_SMOOTH {
                    gain_ramp(ch, start, REVERZ_SMOOTH, 0.0, 1.0);
                }
                gain_ramp(ch, end.saturating_sub(REVERZ_SMOOTH), REVERZ_SMOOTH, 1.0, 0.0);
                if end != n {
                    gain_ramp(ch, end, REVERZ_SMOOTH, 0.0, 1.0);
                }

                i -= block;
            }
        }

        trace!(amount = self.params.amount, skew = self.params.skew, "reverz rendered");
        Ok(())
    }
}

// ============================================================================
// STUTTER
// ============================================================================

/// Stutter parameters
///
/// Doubles each even block into the following odd block, then runs a
/// static-delay chorus over the result when `chorus` is non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StutterParams {
    pub enabled: bool,
    /// Block count; even, at least 4
    pub amount: u32,
    /// Chorus intensity, 0 disables the chorus pass
    pub chorus: f32,
    /// Chorus centre delay in milliseconds
    pub delay_ms: f32,
}

impl Default for StutterParams {
    fn default() -> Self {
        Self {
            enabled: false,
            amount: 16,
            chorus: 0.0,
            delay_ms: 50.0,
        }
    }
}

impl StutterParams {
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.amount = clamp_even(
            self.amount,
            ranges::STUTTER_AMOUNT_MIN,
            ranges::STUTTER_AMOUNT_MAX,
        );
        self.chorus = self.chorus.clamp(0.0, ranges::CHORUS_MAX);
        self.delay_ms = self.delay_ms.clamp(ranges::DELAY_MS_MIN, ranges::DELAY_MS_MAX);
        self
    }
}

/// Single-voice chorus with the modulation rate fixed at zero, so the wet
/// tap sits at the centre delay.
pub struct Chorus {
    feedback: f32,
    mix: f32,
    delay_samples: usize,
}

impl Chorus {
    pub fn new(feedback: f32, mix: f32, centre_delay_ms: f32) -> Self {
        let delay_samples =
            ((centre_delay_ms / 1000.0) * SAMPLE_RATE as f32).round().max(1.0) as usize;
        Self {
            feedback,
            mix,
            delay_samples,
        }
    }

    pub fn process(&self, buffer: &mut SampleBuffer) {
        for ch in buffer.channels_mut() {
            let mut line = vec![0.0f32; self.delay_samples];
            let mut pos = 0usize;
            for sample in ch.iter_mut() {
                let delayed = line[pos];
                line[pos] = *sample + delayed * self.feedback;
                pos = (pos + 1) % self.delay_samples;
                *sample = *sample * (1.0 - self.mix) + delayed * self.mix;
            }
        }
    }
}

/// Block-repeat stutter stage.
pub struct Stutter {
    params: StutterParams,
}

impl Stutter {
    pub fn new(params: StutterParams) -> Self {
        Self {
            params: params.clamped(),
        }
    }
}

impl StageRenderer for Stutter {
    fn name(&self) -> &'static str {
        "stutter"
    }

    fn render(&mut self, buffer: &mut SampleBuffer) -> Result<()> {
        let n = buffer.num_samples();
        let blocks = self.params.amount as usize;
        if n == 0 || blocks < 2 {
            return Ok(());
        }
        let block_len = n as f32 / blocks as f32;
        let shift = block_len.round() as usize;

        for ch in buffer.channels_mut() {
            let mut scratch = vec![0.0f32; n];
            let mut j = 0usize;
            while j + 1 < blocks {
                let s0 = ((block_len * j as f32).round() as usize).min(n);
                let s1 = ((block_len * (j + 1) as f32).round() as usize).min(n);
                let s2 = ((block_len * (j + 2) as f32).round() as usize).min(n);

                scratch[s0..s1].copy_from_slice(&ch[s0..s1]);
                for i in s1..s2 {
                    let src = i.saturating_sub(shift).min(n - 1);
                    ch[i] = scratch[src];
                }

                gain_ramp(ch, s1.saturating_sub(STUTTER_SMOOTH), STUTTER_SMOOTH, 1.0, 0.0);
                gain_ramp(ch, s2.saturating_sub(STUTTER_SMOOTH), STUTTER_SMOOTH, 1.0, 0.0);
                gain_ramp(ch, s0, STUTTER_SMOOTH, 0.0, 1.0);
                gain_ramp(ch, s1, STUTTER_SMOOTH, 0.0, 1.0);

                j += 2;
            }
        }

        if self.params.chorus > 0.0 {
            let strength = self.params.chorus / 20.0;
            let chorus = Chorus::new(-strength, strength, self.params.delay_ms);
            chorus.process(buffer);
        }

        trace!(
            amount = self.params.amount,
            chorus = self.params.chorus,
            "stutter rendered"
        );
        Ok(())
    }
}

// ============================================================================
// SHIFTER
// ============================================================================

/// Shifter parameters
///
/// Decimates every other block by reading ahead at `tone` sample strides,
/// shifting the block's pitch upward without changing the buffer length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShifterParams {
    pub enabled: bool,
    /// Block count; even, at least 4
    pub amount: u32,
    /// Read stride within a spliced block
    pub tone: f32,
}

impl Default for ShifterParams {
    fn default() -> Self {
        Self {
            enabled: false,
            amount: 16,
            tone: 2.0,
        }
    }
}

impl ShifterParams {
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.amount = clamp_even(
            self.amount,
            ranges::SHIFTER_AMOUNT_MIN,
            ranges::SHIFTER_AMOUNT_MAX,
        );
        self.tone = self.tone.clamp(ranges::TONE_MIN, ranges::TONE_MAX);
        self
    }
}

/// Block decimation stage.
pub struct Shifter {
    params: ShifterParams,
}

impl Shifter {
    pub fn new(params: ShifterParams) -> Self {
        Self {
            params: params.clamped(),
        }
    }
}

impl StageRenderer for Shifter {
    fn name(&self) -> &'static str {
        "shifter"
    }

    fn render(&mut self, buffer: &mut SampleBuffer) -> Result<()> {
        let n = buffer.num_samples();
        let blocks = self.params.amount as usize;
        if n == 0 || blocks < 2 {
            return Ok(());
        }
        let block_len = n as f32 / blocks as f32;
        let tone = self.params.tone;

        for ch in buffer.channels_mut() {
            let mut j = 0usize;
            while j + 1 < blocks {
                let base = ((block_len * (j + 1) as f32).round() as usize).min(n);
                let span = (block_len / tone).round() as usize;
                let end = (base + span).min(n);

                // Read indices stay at or ahead of the write index, so the
                // in-place decimation never reads overwritten samples.
                for (k, i) in (base..end).enumerate() {
                    let src = ((base as f32 + k as f32 * tone).round() as usize).min(n - 1);
                    ch[i] = ch[src];
                }

                gain_ramp(ch, base.saturating_sub(SHIFTER_SMOOTH), SHIFTER_SMOOTH, 1.0, 0.0);
                gain_ramp(ch, end.saturating_sub(SHIFTER_SMOOTH), SHIFTER_SMOOTH, 1.0, 0.0);
                gain_ramp(
                    ch,
                    ((block_len * j as f32).round() as usize).min(n),
                    SHIFTER_SMOOTH,
                    0.0,
                    1.0,
                );
                gain_ramp(ch, base, SHIFTER_SMOOTH, 0.0, 1.0);
                if end <= SHIFTER_SMOOTH {
                    gain_ramp(ch, end, SHIFTER_SMOOTH, 0.0, 1.0);
                }

                j += 2;
            }
        }

        trace!(amount = self.params.amount, tone, "shifter rendered");
        Ok(())
    }
}
