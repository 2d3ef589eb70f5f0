//! Preset persistence
//!
//! A preset is a `ChainParams` document serialized as TOML: one table per
//! stage carrying its `enabled` flag and numeric parameters. Presets live
//! in a directory managed by `PresetManager`; a file that fails to parse
//! is backed up with a `.corrupt` suffix before the error surfaces.

use crate::domain::chain::ChainParams;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during preset operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Preset not found: {0}")]
    PresetNotFound(String),

    #[error("Invalid preset: {0}")]
    Invalid(String),
}

impl ChainParams {
    /// Load chain parameters from a TOML file.
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading preset");

        let contents = fs::read_to_string(path).await?;
        let params: Self = toml::from_str(&contents)?;

        debug!("Preset loaded successfully");
        Ok(params.clamped())
    }

    /// Save chain parameters to a TOML file.
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving preset");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Preset saved successfully");
        Ok(())
    }
}

/// Preset manager rooted at a preset directory
pub struct PresetManager {
    preset_dir: PathBuf,
}

impl PresetManager {
    /// Create a new preset manager.
    pub fn new(preset_dir: PathBuf) -> Self {
        Self { preset_dir }
    }

    /// Default preset directory under the user's config directory.
    pub fn default_preset_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("waveforge").join("presets"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }

    pub fn preset_dir(&self) -> &Path {
        &self.preset_dir
    }

    fn preset_path(&self, name: &str) -> PathBuf {
        self.preset_dir.join(format!("{}.toml", name))
    }

    /// List all available presets.
    #[instrument(skip(self))]
    pub async fn list_presets(&self) -> Result<Vec<String>> {
        let mut presets = Vec::new();

        if !self.preset_dir.exists() {
            return Ok(presets);
        }

        let mut entries = fs::read_dir(&self.preset_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "toml").unwrap_or(false) {
                if let Some(name) = path.file_stem().and_then(|n| n.to_str()) {
                    presets.push(name.to_string());
                }
            }
        }

        presets.sort();
        debug!(count = presets.len(), "Listed presets");
        Ok(presets)
    }

    /// Load a preset by name.
    ///
    /// A malformed preset is backed up next to the original with a
    /// `.corrupt` suffix before the parse error is returned.
    #[instrument(skip(self))]
    pub async fn load_preset(&self, name: &str) -> Result<ChainParams> {
        let path = self.preset_path(name);

        if !path.exists() {
            return Err(ConfigError::PresetNotFound(name.to_string()));
        }

        match ChainParams::load_from_file(&path).await {
            Ok(params) => Ok(params),
            Err(e @ ConfigError::TomlParse(_)) => {
                error!(
                    path = %path.display(),
                    error = %e,
                    "Malformed preset, backing up"
                );
                let backup_path = path.with_extension("toml.corrupt");
                if let Err(copy_err) = fs::copy(&path, &backup_path).await {
                    error!(
                        path = %backup_path.display(),
                        error = %copy_err,
                        "Failed to backup malformed preset"
                    );
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Save a preset by name.
    #[instrument(skip(self, params))]
    pub async fn save_preset(&self, name: &str, params: &ChainParams) -> Result<()> {
        params.save_to_file(self.preset_path(name)).await
    }

    /// Delete a preset by name.
    #[instrument(skip(self))]
    pub async fn delete_preset(&self, name: &str) -> Result<()> {
        let path = self.preset_path(name);

        if !path.exists() {
            return Err(ConfigError::PresetNotFound(name.to_string()));
        }

        fs::remove_file(&path).await?;
        info!(name, "Preset deleted");
        Ok(())
    }

    /// Check if a preset exists.
    pub async fn preset_exists(&self, name: &str) -> bool {
        self.preset_path(name).exists()
    }
}
