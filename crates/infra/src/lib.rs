//! Waveforge infrastructure adapters
//!
//! File decode/export at the codec boundary, the cpal preview transport,
//! and FFT analysis. Everything here adapts the outside world to the
//! `waveforge-core` domain types.

pub mod audio;
pub mod codec;
