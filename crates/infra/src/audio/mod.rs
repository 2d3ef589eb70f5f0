//! Preview playback and analysis
//!
//! The edited buffer is published to a cpal output stream as an immutable
//! snapshot; the audio callback only ever reads the snapshot it can grab
//! without blocking. Spectrum analysis runs offline over the same buffers.

pub mod playback;
pub mod spectrum;

pub use playback::{PlaybackSnapshot, Transport};
pub use spectrum::{bin_frequency, magnitude_spectrum};
