//! Configuration management for the loan approval pipeline

use crate::models::forest::ForestParams;
use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub training: TrainingConfig,
    pub nats: NatsConfig,
    #[serde(default)]
    pub serving: ServingConfig,
    pub logging: LoggingConfig,
}

/// File locations
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Labeled CSV dataset
    pub dataset: PathBuf,
    /// Model artifact written by training and read by serving
    pub model: PathBuf,
    /// Directory for evaluation reports
    pub reports_dir: PathBuf,
}

/// Split and forest hyperparameters
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingConfig {
    /// Fraction of rows held out for evaluation
    pub test_fraction: f64,
    /// Seed for the train/test shuffle
    pub split_seed: u64,
    /// Forest hyperparameters
    #[serde(default)]
    pub forest: ForestParams,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming loan applications
    pub application_subject: String,
    /// Subject for outgoing decisions
    pub decision_subject: String,
}

/// Serving loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServingConfig {
    /// Seconds between metrics summaries
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,
}

fn default_metrics_interval() -> u64 {
    10
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            metrics_interval_secs: default_metrics_interval(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig {
                dataset: PathBuf::from("data/loan_data.csv"),
                model: PathBuf::from("models/loan_model.json"),
                reports_dir: PathBuf::from("reports"),
            },
            training: TrainingConfig {
                test_fraction: 0.2,
                split_seed: 42,
                forest: ForestParams::default(),
            },
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                application_subject: "loan.applications".to_string(),
                decision_subject: "loan.decisions".to_string(),
            },
            serving: ServingConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
