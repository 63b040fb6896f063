//! Application configuration
//!
//! YAML file with serde defaults, so an empty (or absent) config file yields
//! a fully working local setup. The `PORT` environment variable overrides the
//! configured port, which hosting platforms set for us.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WildearError};
use crate::features::FeatureConfig;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Scratch directory for uploaded and recorded clips
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,

    /// Keep scratch files after prediction instead of deleting them
    #[serde(default)]
    pub keep_uploads: bool,

    /// Model artifact locations
    #[serde(default)]
    pub model: ModelFiles,

    /// Spectrogram parameters
    #[serde(default)]
    pub features: FeatureConfig,
}

/// Locations of the trained model artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFiles {
    /// Checkpoint file (.safetensors, .pth or .pt)
    #[serde(default = "default_weights_path")]
    pub weights: PathBuf,

    /// Label file (JSON array or index map)
    #[serde(default = "default_labels_path")]
    pub labels: PathBuf,
}

impl Default for ModelFiles {
    fn default() -> Self {
        Self {
            weights: default_weights_path(),
            labels: default_labels_path(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            uploads_dir: default_uploads_dir(),
            keep_uploads: false,
            model: ModelFiles::default(),
            features: FeatureConfig::default(),
        }
    }
}

/// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_weights_path() -> PathBuf {
    PathBuf::from("model/sound_model.safetensors")
}

fn default_labels_path() -> PathBuf {
    PathBuf::from("model/labels.json")
}

impl AppConfig {
    /// Load from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| WildearError::Config {
            message: format!("failed to read config file: {}", e),
            path: Some(path.to_path_buf()),
        })?;
        // serde_yaml rejects empty input, which for us just means "all defaults".
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(&content).map_err(|e| WildearError::Config {
            message: format!("invalid config file: {}", e),
            path: Some(path.to_path_buf()),
        })?;
        Ok(config)
    }

    /// Apply environment overrides. `PORT` wins over the config file.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_port_override(std::env::var("PORT").ok().as_deref())
    }

    fn apply_port_override(&mut self, port: Option<&str>) -> Result<()> {
        if let Some(raw) = port {
            self.port = raw.parse().map_err(|_| {
                WildearError::config(format!("PORT must be a number, got {:?}", raw))
            })?;
        }
        Ok(())
    }

    /// Address string for the TCP listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Whether the process runs in development mode (`WILDEAR_ENV=development`),
/// which turns on debug logging.
pub fn development_mode() -> bool {
    std::env::var("WILDEAR_ENV")
        .map(|v| v == "development")
        .unwrap_or(false)
}
