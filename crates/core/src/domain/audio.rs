//! Sample buffer substrate and shared audio error types
//!
//! All editing happens offline on whole buffers of non-interleaved f32
//! samples normalized to [-1.0, 1.0]. The project sample rate is fixed;
//! decoded sources are converted (or rejected) at the codec boundary.

use thiserror::Error;
use tracing::debug;

/// Project sample rate in Hz. Every stage assumes this rate.
pub const SAMPLE_RATE: u32 = 44_100;

/// Longest accepted source duration in seconds.
pub const MAX_SOURCE_SECONDS: u32 = 60;

pub type Result<T> = std::result::Result<T, AudioError>;

/// Errors that can occur in the editing domain
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("source is {seconds:.2}s long, limit is 60s")]
    SourceTooLong { seconds: f64 },

    #[error("channel data lengths differ: {0}")]
    ChannelMismatch(String),

    #[error("buffer has no channels")]
    NoChannels,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("audio device not found: {0}")]
    DeviceNotFound(String),

    #[error("OS error: {0}")]
    OsError(String),
}

/// Owned audio buffer: one `Vec<f32>` per channel, all equal length.
///
/// The whole chain edits copies of this type. Operations that take sample
/// positions clamp them into the valid range instead of panicking, since
/// the splice stages routinely compute indices near (or past) the edges.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    channels: Vec<Vec<f32>>,
}

impl SampleBuffer {
    /// Create a silent buffer with the given shape.
    pub fn silent(num_channels: usize, num_samples: usize) -> Self {
        Self {
            channels: vec![vec![0.0; num_samples]; num_channels.max(1)],
        }
    }

    /// Build a buffer from per-channel sample data.
    pub fn from_channels(channels: Vec<Vec<f32>>) -> Result<Self> {
        if channels.is_empty() {
            return Err(AudioError::NoChannels);
        }
        let len = channels[0].len();
        if channels.iter().any(|ch| ch.len() != len) {
            let lens: Vec<usize> = channels.iter().map(Vec::len).collect();
            return Err(AudioError::ChannelMismatch(format!("{:?}", lens)));
        }
        Ok(Self { channels })
    }

    /// Build a buffer from interleaved frames.
    pub fn from_interleaved(num_channels: usize, data: &[f32]) -> Result<Self> {
        if num_channels == 0 {
            return Err(AudioError::NoChannels);
        }
        let frames = data.len() / num_channels;
        let mut channels = vec![Vec::with_capacity(frames); num_channels];
        for frame in data.chunks_exact(num_channels) {
            for (ch, &sample) in channels.iter_mut().zip(frame) {
                ch.push(sample);
            }
        }
        Ok(Self { channels })
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn num_samples(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_samples() == 0
    }

    pub fn duration_seconds(&self) -> f64 {
        self.num_samples() as f64 / SAMPLE_RATE as f64
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index]
    }

    /// Mutable access to all channels at once, for stages that process a
    /// stereo pair in lockstep.
    pub fn channels_mut(&mut self) -> &mut [Vec<f32>] {
        &mut self.channels
    }

    /// Resize every channel, keeping existing content and zero-filling any
    /// new tail.
    pub fn resize(&mut self, num_samples: usize) {
        if num_samples != self.num_samples() {
            debug!(from = self.num_samples(), to = num_samples, "resizing buffer");
        }
        for ch in &mut self.channels {
            ch.resize(num_samples, 0.0);
        }
    }

    /// Multiply every sample by a constant gain.
    pub fn apply_gain(&mut self, gain: f32) {
        for ch in &mut self.channels {
            for sample in ch.iter_mut() {
                *sample *= gain;
            }
        }
    }

    /// Apply a linear gain ramp on one channel. The window is clamped into
    /// the buffer; out-of-range requests degrade to partial or no work.
    pub fn apply_gain_ramp(&mut self, channel: usize, start: usize, len: usize, from: f32, to: f32) {
        gain_ramp(&mut self.channels[channel], start, len, from, to);
    }

    /// Apply the same gain ramp on every channel.
    pub fn apply_gain_ramp_all(&mut self, start: usize, len: usize, from: f32, to: f32) {
        for ch in &mut self.channels {
            gain_ramp(ch, start, len, from, to);
        }
    }

    /// Peak absolute sample value across all channels.
    pub fn magnitude(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|ch| ch.iter())
            .fold(0.0f32, |peak, &s| peak.max(s.abs()))
    }

    /// Interleave channels into frames for codec and playback boundaries.
    pub fn to_interleaved(&self) -> Vec<f32> {
        let frames = self.num_samples();
        let mut out = Vec::with_capacity(frames * self.num_channels());
        for i in 0..frames {
            for ch in &self.channels {
                out.push(ch[i]);
            }
        }
        out
    }
}

/// Linear gain ramp over a slice window, clamped to the slice bounds.
pub(crate) fn gain_ramp(samples: &mut [f32], start: usize, len: usize, from: f32, to: f32) {
    if len == 0 || start >= samples.len() {
        return;
    }
    let run = len.min(samples.len() - start);
    let step = (to - from) / len as f32;
    for (i, sample) in samples[start..start + run].iter_mut().enumerate() {
        *sample *= from + step * i as f32;
    }
}
