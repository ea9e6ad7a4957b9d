use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::index::Metric;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MedVisionConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub models: ModelsConfig,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub log_level: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// Index directory loaded at startup, if it exists.
    pub index_path: Option<String>,
    /// Where `build_index` saves when no output path is given.
    pub default_output: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelsConfig {
    pub endpoint: String,
    pub encoder_name: String,
    pub classifier_name: String,
    pub embedding_dim: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_top_k: usize,
    pub classification_threshold: f64,
    pub metric: Metric,
    pub include_reports: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            log_level: "info".into(),
            host: "127.0.0.1".into(),
            port: 8765,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let default_output = default_medvision_dir()
            .join("rag_index")
            .to_string_lossy()
            .into_owned();
        Self {
            index_path: None,
            default_output,
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8900".into(),
            encoder_name: "rad-dino".into(),
            classifier_name: "DenseNet".into(),
            embedding_dim: 768,
            timeout_secs: 120,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            classification_threshold: 0.5,
            metric: Metric::L2,
            include_reports: true,
        }
    }
}

/// Returns `~/.medvision/`, or `./.medvision` when no home directory is known.
pub fn default_medvision_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".medvision")
}

/// Returns the default config file path: `~/.medvision/config.toml`
pub fn default_config_path() -> PathBuf {
    default_medvision_dir().join("config.toml")
}

impl MedVisionConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            MedVisionConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (MEDVISION_INDEX_PATH,
    /// MEDVISION_MODEL_ENDPOINT, MEDVISION_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MEDVISION_INDEX_PATH") {
            self.storage.index_path = Some(val);
        }
        if let Ok(val) = std::env::var("MEDVISION_MODEL_ENDPOINT") {
            self.models.endpoint = val;
        }
        if let Ok(val) = std::env::var("MEDVISION_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    /// Startup index directory, expanding `~` if needed.
    pub fn resolved_index_path(&self) -> Option<PathBuf> {
        self.storage.index_path.as_deref().map(expand_tilde)
    }

    pub fn resolved_default_output(&self) -> PathBuf {
        expand_tilde(&self.storage.default_output)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
