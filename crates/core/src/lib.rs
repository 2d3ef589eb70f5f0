//! Waveforge core domain
//!
//! Sample buffer substrate, the twelve effect stages, the chain
//! orchestrator and preset persistence.

pub mod domain;
