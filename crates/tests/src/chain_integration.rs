//! Integration tests for the effect chain pipeline
//!
//! These tests cover the full path from decoded source to exported file,
//! including suffix recompute behavior, filter frequency response through
//! the analyzer, and preset round trips across crate boundaries.

use std::f32::consts::PI;
use tempfile::TempDir;
use waveforge_core::domain::audio::{SampleBuffer, SAMPLE_RATE};
use waveforge_core::domain::chain::{ChainParams, EffectChain, StageId, StageOutput};
use waveforge_core::domain::config::PresetManager;
use waveforge_core::domain::dsp::{
    BiquadParams, GainParams, HardclipParams, PitchParams, SoftclipParams,
};
use waveforge_core::domain::granular::{ExtractorParams, StutterParams};
use waveforge_infra::audio::spectrum::{bin_frequency, magnitude_spectrum};
use waveforge_infra::codec;

fn generate_sine_wave(frequency: f32, amplitude: f32, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| 2.0 * PI * frequency * i as f32 / SAMPLE_RATE as f32)
        .map(|phase| amplitude * phase.sin())
        .collect()
}

fn stereo_source(frequency: f32, amplitude: f32, num_samples: usize) -> SampleBuffer {
    let samples = generate_sine_wave(frequency, amplitude, num_samples);
    SampleBuffer::from_channels(vec![samples.clone(), samples]).unwrap()
}

fn loaded_chain(source: SampleBuffer) -> EffectChain {
    let mut chain = EffectChain::new();
    chain.load_source(source).unwrap();
    chain
}

// ============================================================================
// BASIC CHAIN TESTS
// ============================================================================

#[test]
fn test_all_bypass_is_bit_identical() {
    let chain = loaded_chain(stereo_source(440.0, 0.5, 8192));
    assert_eq!(chain.output(), chain.source());
}

#[test]
fn test_gain_scales_by_expected_ratio() {
    let mut chain = loaded_chain(stereo_source(440.0, 0.25, 8192));
    chain
        .set_gain(GainParams {
            enabled: true,
            gain_db: 6.0,
        })
        .unwrap();

    let ratio = chain.output().magnitude() / chain.source().magnitude();
    // +6 dB is a factor of ~1.995
    assert!((ratio - 1.995).abs() < 0.01);
}

#[test]
fn test_hardclip_then_gain_compose_in_order() {
    let mut chain = loaded_chain(stereo_source(440.0, 1.0, 8192));
    chain
        .set_hardclip(HardclipParams {
            enabled: true,
            threshold: 0.5,
        })
        .unwrap();
    chain
        .set_gain(GainParams {
            enabled: true,
            gain_db: 6.0,
        })
        .unwrap();

    // Clip to 0.5, then boost: peak lands near 0.5 * 1.995, not at 1.0.
    let peak = chain.output().magnitude();
    assert!((peak - 0.9976).abs() < 0.01);
}

// ============================================================================
// SUFFIX RECOMPUTE TESTS
// ============================================================================

#[test]
fn test_downstream_edit_keeps_upstream_cache() {
    let mut chain = loaded_chain(stereo_source(440.0, 0.5, 8192));
    chain
        .set_softclip(SoftclipParams {
            enabled: true,
            threshold: 0.8,
        })
        .unwrap();

    let softclip_before = chain.stage_output(StageId::Softclip).clone();
    chain
        .set_gain(GainParams {
            enabled: true,
            gain_db: -12.0,
        })
        .unwrap();

    assert_eq!(chain.stage_output(StageId::Softclip), &softclip_before);
}

#[test]
fn test_upstream_edit_propagates_downstream() {
    let mut chain = loaded_chain(stereo_source(440.0, 0.5, 8192));
    chain
        .set_gain(GainParams {
            enabled: true,
            gain_db: 0.0,
        })
        .unwrap();
    let gain_before = match chain.stage_output(StageId::Gain) {
        StageOutput::Rendered(buf) => buf.clone(),
        StageOutput::Passthrough => panic!("gain should have rendered"),
    };

    chain
        .set_hardclip(HardclipParams {
            enabled: true,
            threshold: 0.2,
        })
        .unwrap();
    let gain_after = match chain.stage_output(StageId::Gain) {
        StageOutput::Rendered(buf) => buf.clone(),
        StageOutput::Passthrough => panic!("gain should have rendered"),
    };

    assert_ne!(gain_before, gain_after);
}

#[test]
fn test_seeded_extractor_renders_identically_across_chains() {
    let source = stereo_source(330.0, 0.5, SAMPLE_RATE as usize);
    let params = ExtractorParams {
        enabled: true,
        intensity: 12,
        width: 8,
        seed: Some(7),
    };

    let mut a = loaded_chain(source.clone());
    a.set_extractor(params).unwrap();
    let mut b = loaded_chain(source);
    b.set_extractor(params).unwrap();

    assert_eq!(a.output(), b.output());
}

// ============================================================================
// FILTER FREQUENCY RESPONSE TESTS
// ============================================================================

#[test]
fn test_lowpass_attenuates_high_frequency() {
    let fft_size = 8192;
    let low_freq = bin_frequency(50, fft_size);
    let high_freq = bin_frequency(1500, fft_size);

    let low = generate_sine_wave(low_freq, 0.4, fft_size);
    let high = generate_sine_wave(high_freq, 0.4, fft_size);
    let mixed: Vec<f32> = low.iter().zip(&high).map(|(a, b)| a + b).collect();
    let source = SampleBuffer::from_channels(vec![mixed.clone(), mixed]).unwrap();

    let mut chain = loaded_chain(source);
    let mut filters = chain.params().filters;
    filters.lowpass = BiquadParams {
        enabled: true,
        cutoff: 500.0,
        q: 0.707,
    };
    chain.set_filters(filters).unwrap();

    let spectrum = magnitude_spectrum(chain.output(), fft_size);
    // The high partial sits far above the cutoff; it must drop well below
    // the surviving low partial.
    assert!(spectrum[1500] < spectrum[50] * 0.05);
}

#[test]
fn test_highpass_attenuates_low_frequency() {
    let fft_size = 8192;
    let low_freq = bin_frequency(20, fft_size);
    let high_freq = bin_frequency(800, fft_size);

    let low = generate_sine_wave(low_freq, 0.4, fft_size);
    let high = generate_sine_wave(high_freq, 0.4, fft_size);
    let mixed: Vec<f32> = low.iter().zip(&high).map(|(a, b)| a + b).collect();
    let source = SampleBuffer::from_channels(vec![mixed.clone(), mixed]).unwrap();

    let mut chain = loaded_chain(source);
    let mut filters = chain.params().filters;
    filters.highpass = BiquadParams {
        enabled: true,
        cutoff: 2000.0,
        q: 0.707,
    };
    chain.set_filters(filters).unwrap();

    let spectrum = magnitude_spectrum(chain.output(), fft_size);
    assert!(spectrum[20] < spectrum[800] * 0.05);
}

// ============================================================================
// LENGTH-CHANGING STAGE TESTS
// ============================================================================

#[test]
fn test_stutter_keeps_length_and_pitch_halves_it() {
    let source_len = SAMPLE_RATE as usize / 2;
    let mut chain = loaded_chain(stereo_source(440.0, 0.5, source_len));

    chain
        .set_stutter(StutterParams {
            enabled: true,
            amount: 8,
            chorus: 0.0,
            delay_ms: 50.0,
        })
        .unwrap();
    assert_eq!(chain.output().num_samples(), source_len);
    assert_ne!(chain.output(), chain.source());

    chain
        .set_pitch(PitchParams {
            enabled: true,
            ratio: 2.0,
        })
        .unwrap();
    assert_eq!(chain.output().num_samples(), source_len / 2);
    // The source is untouched throughout.
    assert_eq!(chain.source().num_samples(), source_len);
}

// ============================================================================
// PRESET AND EXPORT ROUND TRIPS
// ============================================================================

#[tokio::test]
async fn test_preset_round_trip_through_chain() {
    let temp_dir = TempDir::new().unwrap();
    let manager = PresetManager::new(temp_dir.path().to_path_buf());

    let mut params = ChainParams::default();
    params.softclip = SoftclipParams {
        enabled: true,
        threshold: 0.7,
    };
    params.extractor = ExtractorParams {
        enabled: true,
        intensity: 9,
        width: 6,
        seed: Some(99),
    };
    params.gain = GainParams {
        enabled: true,
        gain_db: -4.5,
    };

    manager.save_preset("session", &params).await.unwrap();
    let loaded = manager.load_preset("session").await.unwrap();

    let source = stereo_source(440.0, 0.5, 8192);
    let mut direct = loaded_chain(source.clone());
    direct.apply_params(params).unwrap();
    let mut via_preset = loaded_chain(source);
    via_preset.apply_params(loaded).unwrap();

    assert_eq!(direct.output(), via_preset.output());
}

#[test]
fn test_render_export_reload() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("render.wav");

    let mut chain = loaded_chain(stereo_source(440.0, 0.5, 8192));
    chain
        .set_gain(GainParams {
            enabled: true,
            gain_db: -6.0,
        })
        .unwrap();

    codec::export_wav(&path, chain.output(), 32).unwrap();
    let reloaded = codec::load_audio_file(&path).unwrap();

    assert_eq!(reloaded.num_channels(), 2);
    assert_eq!(reloaded.num_samples(), 8192);
    assert_eq!(reloaded.channel(0), chain.output().channel(0));
}

#[test]
fn test_clip_indicator_survives_export_path() {
    let mut chain = loaded_chain(stereo_source(440.0, 0.9, 8192));
    chain
        .set_gain(GainParams {
            enabled: true,
            gain_db: 6.0,
        })
        .unwrap();
    assert!(chain.clipped());

    // 16-bit export clamps; the reloaded file must sit at full scale.
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("hot.wav");
    codec::export_wav(&path, chain.output(), 16).unwrap();
    let reloaded = codec::load_audio_file(&path).unwrap();
    assert!(reloaded.magnitude() <= 1.0 + 1.0 / 32_767.0);
}
