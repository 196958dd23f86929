//! Retrieval engine configuration.
//!
//! The corpus is a fixed, declared set of source files under the data
//! directory. The declared order is load-bearing: it defines the
//! ordinal space shared by the corpus and any persisted index.

use medrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the retrieval engine.
///
/// Loaded from `<data_dir>/corpus.yaml` when present; every field has
/// a default so a bare data directory with the default file names
/// works without any config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Directory holding all source files and the index artifact
    pub data_dir: PathBuf,

    /// Tabular (CSV) sources, in declared order
    #[serde(default = "default_tabular_sources")]
    pub tabular_sources: Vec<String>,

    /// Free-text sources, in declared order, loaded after all tabular sources
    #[serde(default = "default_text_sources")]
    pub text_sources: Vec<String>,

    /// Separator used when flattening a tabular record into one document
    #[serde(default = "default_field_separator")]
    pub field_separator: String,

    /// File name of the persisted index artifact
    #[serde(default = "default_index_file")]
    pub index_file: String,

    /// Default number of snippets to retrieve per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_tabular_sources() -> Vec<String> {
    vec![
        "disease_data.csv".to_string(),
        "serious_diseases.csv".to_string(),
        "symptom_descriptions.csv".to_string(),
    ]
}

fn default_text_sources() -> Vec<String> {
    vec!["cure_handbook.txt".to_string()]
}

fn default_field_separator() -> String {
    " | ".to_string()
}

fn default_index_file() -> String {
    "medical.index".to_string()
}

fn default_top_k() -> usize {
    3
}

impl RetrievalConfig {
    /// Create a config with default sources rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            tabular_sources: default_tabular_sources(),
            text_sources: default_text_sources(),
            field_separator: default_field_separator(),
            index_file: default_index_file(),
            top_k: default_top_k(),
        }
    }

    /// Load the config from `<data_dir>/corpus.yaml`, falling back to
    /// defaults when no config file exists.
    pub fn load(data_dir: &Path) -> AppResult<Self> {
        let config_path = data_dir.join("corpus.yaml");

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path).map_err(|e| {
                AppError::Config(format!(
                    "Failed to read corpus config at {:?}: {}",
                    config_path, e
                ))
            })?;

            let mut config: RetrievalConfig = serde_yaml::from_str(&content).map_err(|e| {
                AppError::Config(format!(
                    "Failed to parse corpus config at {:?}: {}",
                    config_path, e
                ))
            })?;

            // The config file never relocates the corpus it sits in
            config.data_dir = data_dir.to_path_buf();

            tracing::debug!(
                "Loaded corpus config: {} tabular, {} text sources",
                config.tabular_sources.len(),
                config.text_sources.len()
            );
            Ok(config)
        } else {
            tracing::debug!("No corpus config at {:?}, using defaults", config_path);
            Ok(Self::new(data_dir))
        }
    }

    /// Absolute path of the persisted index artifact.
    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join(&self.index_file)
    }

    /// Absolute paths of the tabular sources, in declared order.
    pub fn tabular_paths(&self) -> Vec<PathBuf> {
        self.tabular_sources
            .iter()
            .map(|name| self.data_dir.join(name))
            .collect()
    }

    /// Absolute paths of the text sources, in declared order.
    pub fn text_paths(&self) -> Vec<PathBuf> {
        self.text_sources
            .iter()
            .map(|name| self.data_dir.join(name))
            .collect()
    }
}
