//! Offline training: dataset to saved model artifact

use crate::config::{AppConfig, TrainingConfig};
use crate::dataset::Dataset;
use crate::models::artifact::{ArtifactMetadata, ModelArtifact};
use crate::models::forest::RandomForest;
use crate::preprocessing::Preprocessor;
use anyhow::{Context, Result};
use chrono::Utc;
use std::time::{Duration, Instant};
use tracing::info;
use uuid::Uuid;

/// Result of a training run
#[derive(Debug)]
pub struct TrainingOutcome {
    pub artifact: ModelArtifact,
    /// Accuracy on the training split
    pub train_accuracy: f64,
    pub elapsed: Duration,
}

/// Fit the preprocessor and forest on `train` only.
///
/// `test_rows` is recorded in the artifact metadata so evaluation can
/// reproduce the split.
pub fn train_model(
    train: &Dataset,
    test_rows: usize,
    training: &TrainingConfig,
) -> Result<ModelArtifact> {
    let start = Instant::now();
    let fitted_state =
        Preprocessor::fit(train.applications()).context("Failed to fit preprocessor")?;
    info!(
        rows = train.len(),
        features = fitted_state.feature_count(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Preprocessor fitted"
    );

    let features = fitted_state.transform_batch(train.applications());
    let forest = RandomForest::train(&features, train.labels(), &training.forest)
        .context("Failed to train random forest")?;

    let metadata = ArtifactMetadata {
        artifact_id: Uuid::new_v4().to_string(),
        trained_at: Utc::now(),
        train_rows: train.len(),
        test_rows,
        test_fraction: training.test_fraction,
        split_seed: training.split_seed,
        forest_params: training.forest.clone(),
    };

    Ok(ModelArtifact::new(fitted_state, forest, metadata)?)
}

/// Load, split, train and save according to `config`.
pub fn train_pipeline(config: &AppConfig) -> Result<TrainingOutcome> {
    let start = Instant::now();

    let dataset = Dataset::load_csv(&config.paths.dataset).with_context(|| {
        format!(
            "Failed to load training data from {}",
            config.paths.dataset.display()
        )
    })?;
    let (train, test) = dataset
        .train_test_split(config.training.test_fraction, config.training.split_seed)
        .context("Failed to split dataset")?;
    info!(
        train_rows = train.len(),
        test_rows = test.len(),
        approval_rate = format!("{:.3}", approval_rate(&dataset)),
        "Dataset split"
    );

    let artifact = train_model(&train, test.len(), &config.training)?;

    let predictions = artifact
        .forest()
        .predict_batch(&artifact.fitted_state().transform_batch(train.applications()));
    let correct = predictions
        .iter()
        .zip(train.labels())
        .filter(|(p, &l)| p.label() == l)
        .count();
    let train_accuracy = correct as f64 / train.len() as f64;

    artifact.save(&config.paths.model)?;

    let elapsed = start.elapsed();
    info!(
        artifact_id = %artifact.metadata().artifact_id,
        train_accuracy = format!("{:.4}", train_accuracy),
        elapsed_ms = elapsed.as_millis() as u64,
        path = %config.paths.model.display(),
        "Training complete"
    );

    Ok(TrainingOutcome {
        artifact,
        train_accuracy,
        elapsed,
    })
}

fn approval_rate(dataset: &Dataset) -> f64 {
    dataset.labels().iter().filter(|&&l| l == 1).count() as f64 / dataset.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::forest::ForestParams;
    use crate::types::application::LoanApplication;

    fn training_config() -> TrainingConfig {
        TrainingConfig {
            test_fraction: 0.25,
            split_seed: 7,
            forest: ForestParams {
                n_estimators: 10,
                ..ForestParams::default()
            },
        }
    }

    fn dataset() -> Dataset {
        let applications: Vec<LoanApplication> = (0..30)
            .map(|i| LoanApplication {
                loan_percent_income: 0.01 * i as f64,
                ..LoanApplication::default()
            })
            .collect();
        let labels = (0..30).map(|i| u8::from(i < 15)).collect();
        Dataset::new(applications, labels).unwrap()
    }

    #[test]
    fn test_train_model_records_split() {
        let artifact = train_model(&dataset(), 10, &training_config()).unwrap();
        let metadata = artifact.metadata();

        assert_eq!(metadata.train_rows, 30);
        assert_eq!(metadata.test_rows, 10);
        assert_eq!(metadata.split_seed, 7);
        assert_eq!(metadata.forest_params.n_estimators, 10);
        assert_eq!(artifact.forest().n_trees(), 10);
        assert_eq!(
            artifact.forest().n_features(),
            artifact.fitted_state().feature_count()
        );
    }

    #[test]
    fn test_train_model_is_reproducible() {
        let a = train_model(&dataset(), 0, &training_config()).unwrap();
        let b = train_model(&dataset(), 0, &training_config()).unwrap();

        assert_eq!(a.forest(), b.forest());
        assert_eq!(a.fitted_state(), b.fitted_state());
        assert_ne!(a.metadata().artifact_id, b.metadata().artifact_id);
    }

    #[test]
    fn test_train_model_rejects_empty() {
        assert!(train_model(&Dataset::default(), 0, &training_config()).is_err());
    }
}
