//! Configuration management for medrag.
//!
//! Handles loading and merging configuration from multiple sources:
//! - Environment variables (`MEDRAG_*`, `RUST_LOG`, `NO_COLOR`)
//! - Command-line flags (applied via `with_overrides`)
//! - An optional YAML config file (`<data_dir>/medrag.yaml`)
//!
//! The configuration is data-directory-centric: the corpus sources and
//! the persisted index artifact all live under `data_dir`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding the corpus source files and the index artifact
    pub data_dir: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// LLM provider for answer generation (currently "ollama")
    pub provider: String,

    /// Chat model identifier
    pub model: String,

    /// Embedding model identifier
    pub embedding_model: String,

    /// Provider endpoint URL
    pub endpoint: String,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    models: Option<ModelsConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModelsConfig {
    provider: Option<String>,
    chat: Option<String>,
    embedding: Option<String>,
    endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            log_level: None,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `MEDRAG_DATA_DIR`: Override data directory
    /// - `MEDRAG_CONFIG`: Path to config file
    /// - `MEDRAG_PROVIDER`: LLM provider
    /// - `MEDRAG_MODEL`: Chat model identifier
    /// - `MEDRAG_EMBEDDING_MODEL`: Embedding model identifier
    /// - `MEDRAG_ENDPOINT`: Provider endpoint URL
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(data_dir) = std::env::var("MEDRAG_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(config_file) = std::env::var("MEDRAG_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        // Load from YAML config file if it exists
        let config_path = if let Some(ref cf) = config.config_file {
            cf.clone()
        } else {
            config.data_dir.join("medrag.yaml")
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("MEDRAG_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("MEDRAG_MODEL") {
            config.model = model;
        }

        if let Ok(embedding_model) = std::env::var("MEDRAG_EMBEDDING_MODEL") {
            config.embedding_model = embedding_model;
        }

        if let Ok(endpoint) = std::env::var("MEDRAG_ENDPOINT") {
            config.endpoint = endpoint;
        }

        config.log_level = std::env::var("RUST_LOG").ok();

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&mut self, path: &PathBuf) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(models) = config_file.models {
            if let Some(provider) = models.provider {
                result.provider = provider;
            }
            if let Some(chat) = models.chat {
                result.model = chat;
            }
            if let Some(embedding) = models.embedding {
                result.embedding_model = embedding;
            }
            if let Some(endpoint) = models.endpoint {
                result.endpoint = endpoint;
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the
    /// config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        data_dir: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(data_dir) = data_dir {
            self.data_dir = data_dir;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        let known_providers = ["ollama"];

        if !known_providers.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                known_providers.join(", ")
            )));
        }

        if !self.data_dir.exists() {
            return Err(AppError::Config(format!(
                "Data directory does not exist: {:?}",
                self.data_dir
            )));
        }

        Ok(())
    }
}
