//! Fixed-order effect chain orchestrator
//!
//! The chain owns the immutable source buffer and one cached output per
//! stage. A parameter change re-renders only the suffix of the chain from
//! the changed stage onward; everything upstream keeps its cached output.
//!
//! A disabled stage contributes `StageOutput::Passthrough` instead of a
//! buffer: the effective input of any stage is the nearest rendered output
//! above it, falling back to the source.

use crate::domain::audio::{AudioError, Result, SampleBuffer, MAX_SOURCE_SECONDS};
use crate::domain::dsp::{
    FilterBank, FilterBankParams, GainParams, GainStage, Hardclip, HardclipParams, PitchParams,
    PitchShifter, Rectifier, RectifyKind, RectifyParams, Softclip, SoftclipParams, StageRenderer,
};
use crate::domain::granular::{
    Extractor, ExtractorParams, Reverz, ReverzParams, Shifter, ShifterParams, Stutter,
    StutterParams,
};
use crate::domain::reverb::{ReverbParams, ReverbStage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Buckets in the display waveform cache.
const WAVEFORM_BUCKETS: usize = 512;

/// The twelve stages in their fixed chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Softclip,
    Hardclip,
    FullRectify,
    HalfRectify,
    Extractor,
    Reverz,
    Stutter,
    Shifter,
    Reverb,
    Filters,
    Pitch,
    Gain,
}

impl StageId {
    pub const COUNT: usize = 12;

    pub const ORDER: [StageId; Self::COUNT] = [
        StageId::Softclip,
        StageId::Hardclip,
        StageId::FullRectify,
        StageId::HalfRectify,
        StageId::Extractor,
        StageId::Reverz,
        StageId::Stutter,
        StageId::Shifter,
        StageId::Reverb,
        StageId::Filters,
        StageId::Pitch,
        StageId::Gain,
    ];

    /// Fixed position of this stage in the chain.
    pub fn index(self) -> usize {
        Self::ORDER.iter().position(|&s| s == self).unwrap_or(0)
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ORDER.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            StageId::Softclip => "softclip",
            StageId::Hardclip => "hardclip",
            StageId::FullRectify => "full_rectify",
            StageId::HalfRectify => "half_rectify",
            StageId::Extractor => "extractor",
            StageId::Reverz => "reverz",
            StageId::Stutter => "stutter",
            StageId::Shifter => "shifter",
            StageId::Reverb => "reverb",
            StageId::Filters => "filters",
            StageId::Pitch => "pitch",
            StageId::Gain => "gain",
        }
    }
}

/// All chain parameters, one field per stage. This is also the preset
/// document: each field serializes as one TOML table.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChainParams {
    pub softclip: SoftclipParams,
    pub hardclip: HardclipParams,
    pub full_rectify: RectifyParams,
    pub half_rectify: RectifyParams,
    pub extractor: ExtractorParams,
    pub reverz: ReverzParams,
    pub stutter: StutterParams,
    pub shifter: ShifterParams,
    pub reverb: ReverbParams,
    pub filters: FilterBankParams,
    pub pitch: PitchParams,
    pub gain: GainParams,
}

impl ChainParams {
    /// Clamp every stage's parameters into their valid ranges.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.softclip = self.softclip.clamped();
        self.hardclip = self.hardclip.clamped();
        self.extractor = self.extractor.clamped();
        self.reverz = self.reverz.clamped();
        self.stutter = self.stutter.clamped();
        self.shifter = self.shifter.clamped();
        self.reverb = self.reverb.clamped();
        self.filters = self.filters.clamped();
        self.pitch = self.pitch.clamped();
        self.gain = self.gain.clamped();
        self
    }
}

/// Cached result of one stage.
///
/// A disabled stage is an exact passthrough: it stores no buffer, and
/// downstream stages resolve their input from the nearest rendered output
/// above (or the source).
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    Passthrough,
    Rendered(SampleBuffer),
}

impl StageOutput {
    pub fn is_rendered(&self) -> bool {
        matches!(self, StageOutput::Rendered(_))
    }
}

/// The effect chain: source buffer, parameters, and per-stage caches.
pub struct EffectChain {
    source: SampleBuffer,
    params: ChainParams,
    outputs: Vec<StageOutput>,
    clipped: bool,
    waveform: Vec<(f32, f32)>,
}

impl Default for EffectChain {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectChain {
    /// Create an empty chain with no source loaded.
    pub fn new() -> Self {
        Self {
            source: SampleBuffer::silent(2, 0),
            params: ChainParams::default(),
            outputs: (0..StageId::COUNT).map(|_| StageOutput::Passthrough).collect(),
            clipped: false,
            waveform: Vec::new(),
        }
    }

    /// Load a new source buffer.
    ///
    /// Rejects sources of 61 seconds or longer, resets every stage to its
    /// disabled default, and renders the full chain once.
    pub fn load_source(&mut self, source: SampleBuffer) -> Result<()> {
        let seconds = source.duration_seconds();
        if seconds >= (MAX_SOURCE_SECONDS + 1) as f64 {
            return Err(AudioError::SourceTooLong { seconds });
        }

        info!(
            seconds,
            channels = source.num_channels(),
            "loading source into chain"
        );
        self.source = source;
        self.params = ChainParams::default();
        self.reprocess_from(StageId::Softclip)
    }

    pub fn source(&self) -> &SampleBuffer {
        &self.source
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// Cached output of a single stage.
    pub fn stage_output(&self, stage: StageId) -> &StageOutput {
        &self.outputs[stage.index()]
    }

    /// Effective buffer after the last stage.
    pub fn output(&self) -> &SampleBuffer {
        self.input_of(StageId::COUNT)
    }

    /// True when the last full render exceeded unity peak.
    pub fn clipped(&self) -> bool {
        self.clipped
    }

    /// Min/max peak pairs derived from the final output, for display.
    pub fn waveform(&self) -> &[(f32, f32)] {
        &self.waveform
    }

    /// Replace every stage's parameters at once (preset load) and render
    /// the whole chain front to back.
    pub fn apply_params(&mut self, params: ChainParams) -> Result<()> {
        self.params = params.clamped();
        self.reprocess_from(StageId::Softclip)
    }

    /// Re-render stages `stage..` against their effective inputs. Stages
    /// before it keep their cached outputs untouched.
    pub fn reprocess_from(&mut self, stage: StageId) -> Result<()> {
        self.reprocess_from_index(stage.index())
    }

    /// Index-based variant; an index past the last stage renders nothing
    /// but still refreshes the output analysis.
    pub fn reprocess_from_index(&mut self, from: usize) -> Result<()> {
        let from = from.min(StageId::COUNT);
        for k in from..StageId::COUNT {
            let id = StageId::ORDER[k];
            let next = match self.renderer_for(id) {
                None => StageOutput::Passthrough,
                Some(mut renderer) => {
                    let mut buf = self.input_of(k).clone();
                    renderer.render(&mut buf)?;
                    debug!(
                        stage = renderer.name(),
                        samples = buf.num_samples(),
                        "stage rendered"
                    );
                    StageOutput::Rendered(buf)
                }
            };
            self.outputs[k] = next;
        }
        self.refresh_analysis();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Per-stage setters; each clamps, stores and re-renders the suffix
    // from the stage's fixed position.
    // ------------------------------------------------------------------

    pub fn set_softclip(&mut self, params: SoftclipParams) -> Result<()> {
        self.params.softclip = params.clamped();
        self.reprocess_from(StageId::Softclip)
    }

    pub fn set_hardclip(&mut self, params: HardclipParams) -> Result<()> {
        self.params.hardclip = params.clamped();
        self.reprocess_from(StageId::Hardclip)
    }

    pub fn set_full_rectify(&mut self, params: RectifyParams) -> Result<()> {
        self.params.full_rectify = params;
        self.reprocess_from(StageId::FullRectify)
    }

    pub fn set_half_rectify(&mut self, params: RectifyParams) -> Result<()> {
        self.params.half_rectify = params;
        self.reprocess_from(StageId::HalfRectify)
    }

    pub fn set_extractor(&mut self, params: ExtractorParams) -> Result<()> {
        self.params.extractor = params.clamped();
        self.reprocess_from(StageId::Extractor)
    }

    pub fn set_reverz(&mut self, params: ReverzParams) -> Result<()> {
        self.params.reverz = params.clamped();
        self.reprocess_from(StageId::Reverz)
    }

    pub fn set_stutter(&mut self, params: StutterParams) -> Result<()> {
        self.params.stutter = params.clamped();
        self.reprocess_from(StageId::Stutter)
    }

    pub fn set_shifter(&mut self, params: ShifterParams) -> Result<()> {
        self.params.shifter = params.clamped();
        self.reprocess_from(StageId::Shifter)
    }

    pub fn set_reverb(&mut self, params: ReverbParams) -> Result<()> {
        self.params.reverb = params.clamped();
        self.reprocess_from(StageId::Reverb)
    }

    pub fn set_filters(&mut self, params: FilterBankParams) -> Result<()> {
        self.params.filters = params.clamped();
        self.reprocess_from(StageId::Filters)
    }

    pub fn set_pitch(&mut self, params: PitchParams) -> Result<()> {
        self.params.pitch = params.clamped();
        self.reprocess_from(StageId::Pitch)
    }

    pub fn set_gain(&mut self, params: GainParams) -> Result<()> {
        self.params.gain = params.clamped();
        self.reprocess_from(StageId::Gain)
    }

    // ------------------------------------------------------------------

    /// Build the renderer for a stage, or None when the stage is disabled.
    fn renderer_for(&self, id: StageId) -> Option<Box<dyn StageRenderer>> {
        let p = &self.params;
        match id {
            StageId::Softclip => p
                .softclip
                .enabled
                .then(|| Box::new(Softclip::new(p.softclip)) as Box<dyn StageRenderer>),
            StageId::Hardclip => p
                .hardclip
                .enabled
                .then(|| Box::new(Hardclip::new(p.hardclip)) as Box<dyn StageRenderer>),
            StageId::FullRectify => p
                .full_rectify
                .enabled
                .then(|| Box::new(Rectifier::new(RectifyKind::Full)) as Box<dyn StageRenderer>),
            StageId::HalfRectify => p
                .half_rectify
                .enabled
                .then(|| Box::new(Rectifier::new(RectifyKind::Half)) as Box<dyn StageRenderer>),
            StageId::Extractor => p
                .extractor
                .enabled
                .then(|| Box::new(Extractor::new(p.extractor)) as Box<dyn StageRenderer>),
            StageId::Reverz => p
                .reverz
                .enabled
                .then(|| Box::new(Reverz::new(p.reverz)) as Box<dyn StageRenderer>),
            StageId::Stutter => p
                .stutter
                .enabled
                .then(|| Box::new(Stutter::new(p.stutter)) as Box<dyn StageRenderer>),
            StageId::Shifter => p
                .shifter
                .enabled
                .then(|| Box::new(Shifter::new(p.shifter)) as Box<dyn StageRenderer>),
            StageId::Reverb => p
                .reverb
                .enabled
                .then(|| Box::new(ReverbStage::new(p.reverb)) as Box<dyn StageRenderer>),
            StageId::Filters => p
                .filters
                .any_enabled()
                .then(|| Box::new(FilterBank::new(p.filters)) as Box<dyn StageRenderer>),
            StageId::Pitch => p
                .pitch
                .enabled
                .then(|| Box::new(PitchShifter::new(p.pitch)) as Box<dyn StageRenderer>),
            StageId::Gain => p
                .gain
                .enabled
                .then(|| Box::new(GainStage::new(p.gain)) as Box<dyn StageRenderer>),
        }
    }

    /// Effective input of stage `k`: the nearest rendered output above it,
    /// else the source.
    fn input_of(&self, k: usize) -> &SampleBuffer {
        for output in self.outputs[..k.min(StageId::COUNT)].iter().rev() {
            if let StageOutput::Rendered(buf) = output {
                return buf;
            }
        }
        &self.source
    }

    fn refresh_analysis(&mut self) {
        let output = self.input_of(StageId::COUNT);
        let clipped = output.magnitude() > 1.0;
        let waveform = Self::compute_waveform(output);
        self.clipped = clipped;
        self.waveform = waveform;
    }

    fn compute_waveform(output: &SampleBuffer) -> Vec<(f32, f32)> {
        let n = output.num_samples();
        if n == 0 {
            return Vec::new();
        }
        let buckets = WAVEFORM_BUCKETS.min(n);
        let mut peaks = Vec::with_capacity(buckets);
        for b in 0..buckets {
            let start = b * n / buckets;
            let end = (((b + 1) * n) / buckets).max(start + 1);
            let mut lo = f32::MAX;
            let mut hi = f32::MIN;
            for c in 0..output.num_channels() {
                for &s in &output.channel(c)[start..end] {
                    lo = lo.min(s);
                    hi = hi.max(s);
                }
            }
            peaks.push((lo, hi));
        }
        peaks
    }
}
