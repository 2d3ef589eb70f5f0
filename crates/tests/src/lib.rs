//! Cross-crate integration tests for the effect chain pipeline

#[cfg(test)]
mod chain_integration;
