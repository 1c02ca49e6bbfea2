// vega-scan/src/config.rs
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;
use vega_classify::HeuristicConfig;
use vega_model::ModelConfig;
use vega_preprocess::PreprocessConfig;

/// Environment variable overriding `model.checkpoint_path`.
pub const CHECKPOINT_ENV: &str = "VEGA_CHECKPOINT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Patch size used when the caller does not pick one
    pub default_patch_size: u32,
    /// Full-image scans allowed to run at once
    pub max_concurrent_scans: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            default_patch_size: 64,
            max_concurrent_scans: 2,
        }
    }
}

/// Every tunable of the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub model: ModelConfig,
    pub preprocess: PreprocessConfig,
    pub heuristics: HeuristicConfig,
    pub scan: ScanConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl EngineConfig {
    /// Load from a JSON file; absent fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "engine config loaded");
        Ok(config)
    }

    /// Apply `VEGA_CHECKPOINT` when it is set and non-empty.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(path) = std::env::var_os(CHECKPOINT_ENV).filter(|v| !v.is_empty()) {
            self.model.checkpoint_path = PathBuf::from(path);
        }
        self
    }
}
