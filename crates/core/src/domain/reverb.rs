//! Freeverb-backed reverb stage
//!
//! Offline render: a fresh reverb model is built per render call, so the
//! tail state never leaks between recomputes.

use crate::domain::audio::{Result, SampleBuffer, SAMPLE_RATE};
use crate::domain::dsp::StageRenderer;
use freeverb::Freeverb;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Reverb parameters, all normalized to [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReverbParams {
    pub enabled: bool,
    /// Dry/wet balance; wet level is `balance`, dry level `1 - balance`
    pub balance: f32,
    /// Room size
    pub size: f32,
    /// Stereo width
    pub width: f32,
    /// High frequency damping
    pub damp: f32,
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self {
            enabled: false,
            balance: 0.5,
            size: 0.5,
            width: 0.5,
            damp: 0.5,
        }
    }
}

impl ReverbParams {
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.balance = self.balance.clamp(0.0, 1.0);
        self.size = self.size.clamp(0.0, 1.0);
        self.width = self.width.clamp(0.0, 1.0);
        self.damp = self.damp.clamp(0.0, 1.0);
        self
    }
}

/// Reverb stage over the whole buffer.
pub struct ReverbStage {
    params: ReverbParams,
}

impl ReverbStage {
    pub fn new(params: ReverbParams) -> Self {
        Self {
            params: params.clamped(),
        }
    }

    fn build_model(&self) -> Freeverb {
        let mut verb = Freeverb::new(SAMPLE_RATE as usize);
        verb.set_room_size(self.params.size as f64);
        verb.set_dampening(self.params.damp as f64);
        verb.set_wet(self.params.balance as f64);
        verb.set_dry((1.0 - self.params.balance) as f64);
        verb.set_width(self.params.width as f64);
        verb
    }
}

impl StageRenderer for ReverbStage {
    fn name(&self) -> &'static str {
        "reverb"
    }

    fn render(&mut self, buffer: &mut SampleBuffer) -> Result<()> {
        if buffer.is_empty() {
            return Ok(());
        }
        let mut verb = self.build_model();
        let n = buffer.num_samples();

        if buffer.num_channels() >= 2 {
            let (left, rest) = buffer.channels_mut().split_at_mut(1);
            let left = &mut left[0];
            let right = &mut rest[0];
            for i in 0..n {
                let (l, r) = verb.tick((left[i] as f64, right[i] as f64));
                left[i] = l as f32;
                right[i] = r as f32;
            }
        } else {
            let ch = buffer.channel_mut(0);
            for sample in ch.iter_mut() {
                let (l, r) = verb.tick((*sample as f64, *sample as f64));
                *sample = ((l + r) * 0.5) as f32;
            }
        }

        trace!(
            balance = self.params.balance,
            size = self.params.size,
            "reverb rendered"
        );
        Ok(())
    }
}
