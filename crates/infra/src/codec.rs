//! Audio file decode and export
//!
//! Input files (WAV, MP3, FLAC) are decoded through rodio, converted to
//! f32 and linearly resampled to the project rate when needed. Export is
//! WAV through hound at 16, 24 or 32-bit (32-bit is IEEE float).

use rodio::{Decoder, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};
use waveforge_core::domain::audio::{AudioError, SampleBuffer, MAX_SOURCE_SECONDS, SAMPLE_RATE};

pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors at the codec boundary
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("source is {seconds:.2}s long, limit is 60s")]
    TooLong { seconds: f64 },

    #[error("unsupported bit depth: {0} (expected 16, 24 or 32)")]
    UnsupportedBitDepth(u16),

    #[error("WAV write error: {0}")]
    Encode(#[from] hound::Error),

    #[error("buffer error: {0}")]
    Buffer(#[from] AudioError),
}

/// Metadata about a decodable audio file
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFileInfo {
    pub channels: u16,
    pub sample_rate: u32,
    pub duration_seconds: f64,
    pub peak: f32,
}

fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>> {
    let file = File::open(path)?;
    Decoder::new(BufReader::new(file)).map_err(|e| CodecError::Decode(e.to_string()))
}

/// Linear interpolation resampler for interleaved frames.
///
/// The editor is offline, so quality over a single pass is acceptable and
/// no streaming state is needed.
fn resample_linear(input: &[f32], channels: usize, from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || input.is_empty() {
        return input.to_vec();
    }

    let input_frames = input.len() / channels;
    let output_frames =
        ((input_frames as f64) * to_rate as f64 / from_rate as f64).round() as usize;
    let step = from_rate as f64 / to_rate as f64;

    let mut output = vec![0.0f32; output_frames * channels];
    for frame in 0..output_frames {
        let position = frame as f64 * step;
        let i0 = position.floor() as usize;
        let i1 = (i0 + 1).min(input_frames.saturating_sub(1));
        let frac = (position - i0 as f64) as f32;

        for ch in 0..channels {
            let a = input[i0 * channels + ch];
            let b = input[i1 * channels + ch];
            output[frame * channels + ch] = a + frac * (b - a);
        }
    }
    output
}

/// Decode an audio file into a `SampleBuffer` at the project rate.
///
/// Rejects sources of 61 seconds or longer.
pub fn load_audio_file<P: AsRef<Path>>(path: P) -> Result<SampleBuffer> {
    let path = path.as_ref();
    info!(path = %path.display(), "decoding audio file");

    let decoder = open_decoder(path)?;
    let channels = decoder.channels().max(1) as usize;
    let source_rate = decoder.sample_rate();
    let interleaved: Vec<f32> = decoder.convert_samples().collect();

    let resampled = resample_linear(&interleaved, channels, source_rate, SAMPLE_RATE);
    let frames = resampled.len() / channels;
    let seconds = frames as f64 / SAMPLE_RATE as f64;
    if seconds >= (MAX_SOURCE_SECONDS + 1) as f64 {
        return Err(CodecError::TooLong { seconds });
    }

    debug!(
        channels,
        source_rate,
        frames,
        seconds,
        "audio file decoded"
    );
    Ok(SampleBuffer::from_interleaved(channels, &resampled)?)
}

/// Decode just enough to report file metadata.
pub fn probe<P: AsRef<Path>>(path: P) -> Result<AudioFileInfo> {
    let path = path.as_ref();
    let decoder = open_decoder(path)?;
    let channels = decoder.channels().max(1);
    let sample_rate = decoder.sample_rate();

    let mut frames = 0usize;
    let mut peak = 0.0f32;
    let mut in_frame = 0u16;
    for sample in decoder.convert_samples::<f32>() {
        peak = peak.max(sample.abs());
        in_frame += 1;
        if in_frame == channels {
            in_frame = 0;
            frames += 1;
        }
    }

    Ok(AudioFileInfo {
        channels,
        sample_rate,
        duration_seconds: frames as f64 / sample_rate as f64,
        peak,
    })
}

const I16_SCALE: f32 = 32_767.0;
const I24_SCALE: f32 = 8_388_607.0;

/// Export a buffer as WAV at the project rate.
///
/// Samples are written as rendered; content past unity is the caller's
/// choice and simply clips in the integer formats.
pub fn export_wav<P: AsRef<Path>>(path: P, buffer: &SampleBuffer, bit_depth: u16) -> Result<()> {
    let path = path.as_ref();
    let spec = hound::WavSpec {
        channels: buffer.num_channels() as u16,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: bit_depth,
        sample_format: match bit_depth {
            16 | 24 => hound::SampleFormat::Int,
            32 => hound::SampleFormat::Float,
            other => return Err(CodecError::UnsupportedBitDepth(other)),
        },
    };

    info!(path = %path.display(), bit_depth, frames = buffer.num_samples(), "exporting WAV");
    let mut writer = hound::WavWriter::create(path, spec)?;

    match bit_depth {
        16 => {
            for sample in buffer.to_interleaved() {
                writer.write_sample((sample.clamp(-1.0, 1.0) * I16_SCALE) as i16)?;
            }
        }
        24 => {
            for sample in buffer.to_interleaved() {
                writer.write_sample((sample.clamp(-1.0, 1.0) * I24_SCALE) as i32)?;
            }
        }
        32 => {
            for sample in buffer.to_interleaved() {
                writer.write_sample(sample)?;
            }
        }
        _ => unreachable!("validated above"),
    }

    writer.finalize()?;
    Ok(())
}
