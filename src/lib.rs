//! College football outcome prediction
//!
//! Encodes per-period team and player statistics into fixed-layout feature
//! vectors and scores contests with an ensemble of small dense networks.

pub mod data;
pub mod features;
pub mod model;
pub mod predict;
pub mod training;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::data::dataset::SeasonRange;
use crate::features::schema::SchemaOptions;

/// Backend used for inference and artifact loading
pub type InferenceBackend = burn::backend::NdArray<f32>;

/// Backend used for training
pub type TrainingBackend = burn::backend::Autodiff<InferenceBackend>;

/// Unique identifier for a team (the upstream store keys teams by UUID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(pub String);

impl TeamId {
    pub fn new(id: impl Into<String>) -> Self {
        TeamId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Team({})", self.0)
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum GridironError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Statistics retrieval failed for {team}: {message}")]
    Retrieval { team: TeamId, message: String },

    #[error("Feature schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },

    #[error("No trained models found - run `gridiron train` first")]
    NoModel,

    #[error("Model error: {0}")]
    Model(String),

    #[error("Empty dataset: {0}")]
    EmptyDataset(String),
}

pub type Result<T> = std::result::Result<T, GridironError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub schema: SchemaOptions,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub data: DataConfig,
}

/// Season ranges used to split historical data from the scoring window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub training_seasons: SeasonRange,
    pub inference_seasons: SeasonRange,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            training_seasons: SeasonRange::through(2022),
            inference_seasons: SeasonRange::starting(2023),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub dropout: f64,
    pub hidden_dims: Vec<usize>,
    pub validation_ratio: f32,
    pub early_stopping_patience: usize,
    pub ensemble_size: usize,
    pub seed: u64,
    pub win_weight: f32,
    pub score_weight: f32,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            epochs: 100,
            batch_size: 10,
            learning_rate: 1e-3,
            dropout: 0.1,
            hidden_dims: vec![128, 64, 32],
            validation_ratio: 0.2,
            early_stopping_patience: 15,
            ensemble_size: 5,
            seed: 42,
            win_weight: 1.0,
            score_weight: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub database_path: String,
    pub games_path: String,
    pub schedule_path: String,
    pub artifact_dir: String,
    pub predictions_path: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            database_path: "data/stats.db".to_string(),
            games_path: "data/game_stats.json".to_string(),
            schedule_path: "data/schedule.json".to_string(),
            artifact_dir: "model".to_string(),
            predictions_path: "predictions.json".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GridironError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| GridironError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| GridironError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
