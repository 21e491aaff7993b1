//! Persistence seam for [`IntegrationConfig`].
//!
//! The store itself never touches disk. The binary wires in
//! [`JsonFilePersistence`]; tests and embedders can use
//! [`NoopPersistence`] or their own implementation.

use std::path::PathBuf;

use uuid::Uuid;

use super::{ConfigError, IntegrationConfig};

#[async_trait::async_trait]
pub trait ConfigPersistence: Send + Sync {
    /// Load the last saved config, `None` when nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when stored data exists but can't be read.
    async fn load(&self) -> Result<Option<IntegrationConfig>, ConfigError>;

    /// Save a full snapshot, replacing whatever was stored.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the write fails.
    async fn save(&self, config: &IntegrationConfig) -> Result<(), ConfigError>;
}

pub struct NoopPersistence;

#[async_trait::async_trait]
impl ConfigPersistence for NoopPersistence {
    async fn load(&self) -> Result<Option<IntegrationConfig>, ConfigError> {
        Ok(None)
    }

    async fn save(&self, _config: &IntegrationConfig) -> Result<(), ConfigError> {
        Ok(())
    }
}

/// Whole-file JSON snapshot. Each write goes to its own temp file and is
/// renamed into place.
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl ConfigPersistence for JsonFilePersistence {
    async fn load(&self) -> Result<Option<IntegrationConfig>, ConfigError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ConfigError::Io(e.to_string())),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| ConfigError::ConfigParse(e.to_string()))
    }

    async fn save(&self, config: &IntegrationConfig) -> Result<(), ConfigError> {
        let json = serde_json::to_vec_pretty(config).map_err(|e| ConfigError::ConfigParse(e.to_string()))?;
        let tmp = self.path.with_extension(format!("json.{}.tmp", Uuid::new_v4()));
        let written = match tokio::fs::write(&tmp, json).await {
            Ok(()) => tokio::fs::rename(&tmp, &self.path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(ConfigError::Io(e.to_string()));
        }
        Ok(())
    }
}
