//! Domain entities and business rules

pub mod audio;
pub mod chain;
pub mod config;
pub mod dsp;
pub mod granular;
pub mod reverb;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{AudioError, Result, SampleBuffer, MAX_SOURCE_SECONDS, SAMPLE_RATE};
pub use chain::{ChainParams, EffectChain, StageId, StageOutput};
pub use config::{ConfigError, PresetManager};
pub use dsp::{
    db_to_amplitude, BiquadCoeffs, BiquadParams, FilterBankParams, FilterTopology, GainParams,
    HardclipParams, PitchParams, RectifyKind, RectifyParams, SoftclipParams, StageRenderer,
};
pub use granular::{ExtractorParams, ReverzParams, ShifterParams, StutterParams};
pub use reverb::ReverbParams;
