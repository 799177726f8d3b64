//! Model artifact persistence

use crate::error::ArtifactError;
use crate::models::forest::{ForestParams, RandomForest};
use crate::preprocessing::FittedState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::info;

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

/// Provenance of a trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Unique artifact identifier
    pub artifact_id: String,
    /// When training finished
    pub trained_at: DateTime<Utc>,
    /// Rows used to fit the preprocessor and forest
    pub train_rows: usize,
    /// Rows held out for evaluation
    pub test_rows: usize,
    /// Held-out fraction used for the split
    pub test_fraction: f64,
    /// Seed used for the split
    pub split_seed: u64,
    /// Forest hyperparameters
    pub forest_params: ForestParams,
}

/// Fitted preprocessing state and trained forest, saved and loaded as one unit.
///
/// An artifact is never modified after construction; retraining produces a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    format_version: u32,
    fitted_state: FittedState,
    forest: RandomForest,
    metadata: ArtifactMetadata,
}

impl ModelArtifact {
    /// Pair a fitted state with the forest trained on its output.
    pub fn new(
        fitted_state: FittedState,
        forest: RandomForest,
        metadata: ArtifactMetadata,
    ) -> Result<Self, ArtifactError> {
        let artifact = Self {
            format_version: FORMAT_VERSION,
            fitted_state,
            forest,
            metadata,
        };
        artifact.check()?;
        Ok(artifact)
    }

    fn check(&self) -> Result<(), ArtifactError> {
        if self.format_version != FORMAT_VERSION {
            return Err(ArtifactError::UnsupportedVersion {
                found: self.format_version,
                expected: FORMAT_VERSION,
            });
        }
        self.fitted_state.check_consistency()?;
        if self.fitted_state.feature_count() != self.forest.n_features() {
            return Err(ArtifactError::Inconsistent(format!(
                "preprocessor produces {} features but forest expects {}",
                self.fitted_state.feature_count(),
                self.forest.n_features()
            )));
        }
        if !self.forest.is_well_formed() {
            return Err(ArtifactError::Inconsistent(
                "forest structure is malformed".to_string(),
            ));
        }
        Ok(())
    }

    /// Write the artifact as JSON, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ArtifactError> {
        let path = path.as_ref();
        let io_err = |source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_vec(self).map_err(|source| ArtifactError::Serde {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(io_err)?;

        info!(
            path = %path.display(),
            artifact_id = %self.metadata.artifact_id,
            trees = self.forest.n_trees(),
            features = self.forest.n_features(),
            "Model artifact saved"
        );
        Ok(())
    }

    /// Read and verify an artifact.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading model artifact");

        let bytes = fs::read(path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => ArtifactError::NotFound(path.to_path_buf()),
            _ => ArtifactError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;

        let artifact: Self =
            serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Serde {
                path: path.to_path_buf(),
                source,
            })?;
        artifact.check()?;

        info!(
            artifact_id = %artifact.metadata.artifact_id,
            trained_at = %artifact.metadata.trained_at,
            trees = artifact.forest.n_trees(),
            features = artifact.forest.n_features(),
            "Model artifact loaded"
        );
        Ok(artifact)
    }

    pub fn fitted_state(&self) -> &FittedState {
        &self.fitted_state
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    pub fn metadata(&self) -> &ArtifactMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::Preprocessor;
    use crate::types::application::LoanApplication;

    fn sample_artifact() -> ModelArtifact {
        let records: Vec<LoanApplication> = (0..20)
            .map(|i| LoanApplication {
                person_income: 20_000.0 + 5_000.0 * i as f64,
                person_home_ownership: if i % 2 == 0 { "RENT" } else { "OWN" }.to_string(),
                ..LoanApplication::default()
            })
            .collect();
        let labels: Vec<u8> = (0..20).map(|i| u8::from(i >= 10)).collect();

        let state = Preprocessor::fit(&records).unwrap();
        let params = ForestParams {
            n_estimators: 5,
            ..ForestParams::default()
        };
        let forest = RandomForest::train(&state.transform_batch(&records), &labels, &params).unwrap();

        let metadata = ArtifactMetadata {
            artifact_id: "test".to_string(),
            trained_at: Utc::now(),
            train_rows: 20,
            test_rows: 0,
            test_fraction: 0.2,
            split_seed: 42,
            forest_params: params,
        };
        ModelArtifact::new(state, forest, metadata).unwrap()
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/loan_model.json");
        let artifact = sample_artifact();

        artifact.save(&path).unwrap();
        let loaded = ModelArtifact::load(&path).unwrap();

        assert_eq!(loaded, artifact);
    }

    #[test]
    fn test_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelArtifact::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound(_)));
    }

    #[test]
    fn test_corrupt_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        fs::write(&path, b"{ not json").unwrap();

        let err = ModelArtifact::load(&path).unwrap_err();
        assert!(matches!(err, ArtifactError::Serde { .. }));
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let mut json = serde_json::to_value(sample_artifact()).unwrap();
        json["format_version"] = serde_json::json!(99);
        fs::write(&path, serde_json::to_vec(&json).unwrap()).unwrap();

        let err = ModelArtifact::load(&path).unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::UnsupportedVersion { found: 99, .. }
        ));
    }

    #[test]
    fn test_cyclic_tree_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let mut json = serde_json::to_value(sample_artifact()).unwrap();

        let root = &mut json["forest"]["trees"][0]["nodes"][0]["Split"];
        assert!(root.is_object(), "root of the first tree should split");
        root["left"] = serde_json::json!(0);
        fs::write(&path, serde_json::to_vec(&json).unwrap()).unwrap();

        let err = ModelArtifact::load(&path).unwrap_err();
        assert!(matches!(err, ArtifactError::Inconsistent(_)));
    }

    #[test]
    fn test_feature_count_mismatch_rejected() {
        let artifact = sample_artifact();
        let forest = RandomForest::train(&[vec![0.0], vec![1.0]], &[0, 1], &ForestParams::default())
            .unwrap();

        let err = ModelArtifact::new(
            artifact.fitted_state().clone(),
            forest,
            artifact.metadata().clone(),
        )
        .unwrap_err();
        assert!(matches!(err, ArtifactError::Inconsistent(_)));
    }
}
