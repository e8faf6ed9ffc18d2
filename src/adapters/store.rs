//! Configuration store adapters.
//!
//! Implement [`ConfigPort`] on top of:
//!
//! - [`FileConfigStore`] — a human-editable JSON document on disk.
//! - [`MemoryConfigStore`] — a postcard blob held in memory, standing in
//!   for a flash/NVS partition in tests and simulation.
//!
//! Both validate on load and on save; nothing invalid is ever persisted.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::app::ports::ConfigPort;
use crate::config::SystemConfig;
use crate::error::ConfigError;

pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigPort for FileConfigStore {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigError::NotFound,
            _ => {
                warn!("store: reading {} failed: {e}", self.path.display());
                ConfigError::Io
            }
        })?;
        let config = SystemConfig::from_json(&text)?;
        info!("store: loaded config from {}", self.path.display());
        Ok(config)
    }

    fn save(&mut self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let text = config.to_json()?;
        std::fs::write(&self.path, text).map_err(|e| {
            warn!("store: writing {} failed: {e}", self.path.display());
            ConfigError::Io
        })?;
        info!("store: config saved to {}", self.path.display());
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryConfigStore {
    blob: Option<Vec<u8>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed with a raw blob (possibly corrupt, for tests).
    pub fn with_blob(blob: Vec<u8>) -> Self {
        Self { blob: Some(blob) }
    }

    pub fn blob(&self) -> Option<&[u8]> {
        self.blob.as_deref()
    }
}

impl ConfigPort for MemoryConfigStore {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let bytes = self.blob.as_deref().ok_or(ConfigError::NotFound)?;
        SystemConfig::from_bytes(bytes)
    }

    fn save(&mut self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.blob = Some(config.to_bytes()?);
        Ok(())
    }
}
