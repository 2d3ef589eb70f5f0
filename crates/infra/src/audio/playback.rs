//! Preview transport over a cpal output stream
//!
//! Playback reads an immutable snapshot of the edited buffer. Publishing a
//! new buffer swaps the snapshot atomically behind an `RwLock<Arc<_>>`; the
//! audio callback takes the lock with `try_read` so a slow writer can never
//! block the device thread. Publishing while playing is rejected, so the
//! transport must be stopped before an edited render replaces the audible
//! one.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam::utils::CachePadded;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info};
use waveforge_core::domain::audio::{AudioError, Result, SampleBuffer, SAMPLE_RATE};

/// Immutable interleaved copy of a buffer, ready for the device thread.
#[derive(Debug)]
pub struct PlaybackSnapshot {
    channels: usize,
    frames: usize,
    interleaved: Vec<f32>,
}

impl PlaybackSnapshot {
    fn empty() -> Self {
        Self {
            channels: 1,
            frames: 0,
            interleaved: Vec::new(),
        }
    }

    fn from_buffer(buffer: &SampleBuffer) -> Self {
        Self {
            channels: buffer.num_channels(),
            frames: buffer.num_samples(),
            interleaved: buffer.to_interleaved(),
        }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }
}

/// State shared between the transport and the audio callback.
struct Shared {
    snapshot: RwLock<Arc<PlaybackSnapshot>>,
    /// Playback position in frames (cache-padded to prevent false sharing)
    position: CachePadded<AtomicUsize>,
    playing: AtomicBool,
}

/// Fill `data` from the snapshot starting at `start_frame`.
///
/// Mono snapshots are duplicated across output channels; extra output
/// channels repeat the last source channel. Returns the number of frames
/// written and whether the snapshot end was reached.
fn render_frames(
    snapshot: &PlaybackSnapshot,
    start_frame: usize,
    data: &mut [f32],
    out_channels: usize,
) -> (usize, bool) {
    let out_frames = data.len() / out_channels;
    let remaining = snapshot.frames.saturating_sub(start_frame);
    let to_write = out_frames.min(remaining);

    for frame in 0..to_write {
        let src_base = (start_frame + frame) * snapshot.channels;
        for out_ch in 0..out_channels {
            let src_ch = out_ch.min(snapshot.channels - 1);
            data[frame * out_channels + out_ch] = snapshot.interleaved[src_base + src_ch];
        }
    }
    for sample in &mut data[to_write * out_channels..] {
        *sample = 0.0;
    }

    (to_write, start_frame + to_write >= snapshot.frames)
}

/// Preview transport bound to the default output device
pub struct Transport {
    shared: Arc<Shared>,
    _stream: cpal::Stream,
}

impl Transport {
    /// Open an output stream on the default device at the project rate.
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceNotFound("No default output device".to_string()))?;

        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::OsError(e.to_string()))?;
        let out_channels = supported.channels().max(1) as usize;

        let config = cpal::StreamConfig {
            channels: out_channels as u16,
            sample_rate: SAMPLE_RATE,
            buffer_size: cpal::BufferSize::Default,
        };

        let shared = Arc::new(Shared {
            snapshot: RwLock::new(Arc::new(PlaybackSnapshot::empty())),
            position: CachePadded::new(AtomicUsize::new(0)),
            playing: AtomicBool::new(false),
        });

        let callback_shared = Arc::clone(&shared);
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !callback_shared.playing.load(Ordering::Acquire) {
                        data.fill(0.0);
                        return;
                    }

                    // A publish in progress holds the write lock; output one
                    // silent period rather than wait for it.
                    let snapshot = match callback_shared.snapshot.try_read() {
                        Ok(guard) => Arc::clone(&guard),
                        Err(_) => {
                            data.fill(0.0);
                            return;
                        }
                    };

                    let start = callback_shared.position.load(Ordering::Acquire);
                    let (written, finished) =
                        render_frames(&snapshot, start, data, out_channels);
                    callback_shared
                        .position
                        .store(start + written, Ordering::Release);
                    if finished {
                        callback_shared.playing.store(false, Ordering::Release);
                    }
                },
                |err| error!(error = %err, "Output stream error"),
                None,
            )
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        info!(out_channels, "Preview transport ready");
        Ok(Self {
            shared,
            _stream: stream,
        })
    }

    /// Publish a rendered buffer as the audible snapshot.
    ///
    /// Rejected while playing; stop the transport first. The position is
    /// rewound to the start of the new snapshot.
    pub fn publish(&self, buffer: &SampleBuffer) -> Result<()> {
        if self.is_playing() {
            return Err(AudioError::StreamError(
                "cannot publish while playing".to_string(),
            ));
        }

        let snapshot = Arc::new(PlaybackSnapshot::from_buffer(buffer));
        debug!(frames = snapshot.frames, "Publishing playback snapshot");

        let mut guard = self
            .shared
            .snapshot
            .write()
            .map_err(|_| AudioError::StreamError("snapshot lock poisoned".to_string()))?;
        *guard = snapshot;
        self.shared.position.store(0, Ordering::Release);
        Ok(())
    }

    /// Start or resume playback from the current position.
    pub fn play(&self) {
        self.shared.playing.store(true, Ordering::Release);
    }

    /// Pause playback, keeping the current position.
    pub fn pause(&self) {
        self.shared.playing.store(false, Ordering::Release);
    }

    /// Stop playback and rewind to the start.
    pub fn stop(&self) {
        self.shared.playing.store(false, Ordering::Release);
        self.shared.position.store(0, Ordering::Release);
    }

    pub fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Acquire)
    }

    /// Current playback position in seconds.
    pub fn position_seconds(&self) -> f64 {
        self.shared.position.load(Ordering::Acquire) as f64 / SAMPLE_RATE as f64
    }
}
