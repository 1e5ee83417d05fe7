//! Sliding-window time-series regression
//!
//! Two training pipelines that predict a single continuous target from a window
//! of past multivariate observations: a plain LSTM and a convolutional + LSTM hybrid.

pub mod data;
pub mod fit;
pub mod model;
pub mod predict;
pub mod training;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use fit::{fit_cnn_lstm, fit_lstm, FitParams, FitSettings};
pub use predict::FitResult;

/// Application-wide errors
#[derive(Debug, Error)]
pub enum FitError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Shape mismatch: {0}")]
    Shape(String),

    #[error("No {split} windows: {rows} rows cannot fill a window spanning {span} rows")]
    EmptyWindows {
        split: &'static str,
        rows: usize,
        span: usize,
    },

    #[error("Checkpoint error at {path}: {message}")]
    Checkpoint { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FitError>;

/// Application configuration loaded from seqfit.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub window: WindowConfig,
    pub training: TrainingConfig,
    pub model: ModelConfig,
    pub checkpoint: CheckpointConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Number of past rows visible to the model, before downsampling
    pub past: usize,
    /// Sampling rate inside a window
    pub step: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub learning_rate: f64,
    pub batch_size: usize,
    pub epochs: usize,
    pub patience: usize,
    pub min_delta: f64,
    /// Reload the best checkpoint before predicting on the validation set
    pub restore_best_weights: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub recurrent_dropout: f64,
    pub other_dropout: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Checkpoint path without extension (the recorder appends `.mpk`)
    pub path: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            window: WindowConfig { past: 18, step: 1 },
            training: TrainingConfig {
                learning_rate: 1e-3,
                batch_size: 256,
                epochs: 10,
                patience: 5,
                min_delta: 0.0,
                restore_best_weights: false,
            },
            model: ModelConfig {
                recurrent_dropout: 0.2,
                other_dropout: 0.2,
            },
            checkpoint: CheckpointConfig {
                path: "model_checkpoint".to_string(),
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FitError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| FitError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| FitError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Hyperparameters for a fit call, taken from the config
    pub fn fit_params(&self) -> FitParams {
        FitParams {
            step: self.window.step,
            learning_rate: self.training.learning_rate,
            batch_size: self.training.batch_size,
            epochs: self.training.epochs,
            patience: self.training.patience,
            recurrent_dropout: self.model.recurrent_dropout,
            other_dropout: self.model.other_dropout,
        }
    }

    /// Settings that sit outside the per-call hyperparameters
    pub fn fit_settings(&self) -> FitSettings {
        FitSettings {
            past: self.window.past,
            min_delta: self.training.min_delta,
            restore_best_weights: self.training.restore_best_weights,
            checkpoint_path: self.checkpoint.path.clone().into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_toml_roundtrip_keeps_sections() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("[window]"));
        assert!(text.contains("[checkpoint]"));

        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.window.past, 18);
        assert_eq!(parsed.checkpoint.path, "model_checkpoint");
    }

    #[test]
    fn test_fit_params_from_config() {
        let mut config = Config::default();
        config.window.step = 3;
        config.training.patience = 2;

        let params = config.fit_params();
        assert_eq!(params.step, 3);
        assert_eq!(params.patience, 2);
        assert_eq!(config.fit_settings().past, 18);
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = Config::load("/nonexistent/seqfit.toml").unwrap_err();
        assert!(matches!(err, FitError::Config(_)));
    }
}
