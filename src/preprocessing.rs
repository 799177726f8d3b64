//! Feature preprocessing for loan approval model training and inference.
//!
//! [`Preprocessor::fit`] learns the numeric scaling and categorical
//! vocabulary once from the training records. The resulting
//! [`FittedState`] is stored inside the model artifact and is the only
//! thing ever used to encode records afterwards: serving never re-derives
//! statistics or vocabulary from the records it encodes.
//!
//! Feature layout: the standardized numeric columns in
//! [`NUMERIC_COLUMNS`] order, followed by one indicator group per column
//! of [`CATEGORICAL_COLUMNS`]. Each group lists the sorted training levels
//! with the first (reference) level dropped. The reference level and any
//! level unseen during training both encode as an all-zero group.
//! Categorical values are matched with surrounding whitespace removed,
//! the same normalization the CSV loader applies.

use crate::error::{ArtifactError, TrainingError};
use crate::types::application::{LoanApplication, CATEGORICAL_COLUMNS, NUMERIC_COLUMNS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::Range;

/// Encoded model input.
pub type FeatureVector = Vec<f32>;

/// Learns a [`FittedState`] from training records.
pub struct Preprocessor;

impl Preprocessor {
    /// Fit scaling statistics and vocabularies on the training records.
    pub fn fit(records: &[LoanApplication]) -> Result<FittedState, TrainingError> {
        if records.is_empty() {
            return Err(TrainingError::EmptyTrainingSet);
        }

        let n = records.len() as f64;

        let numeric = NUMERIC_COLUMNS
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let mean = records.iter().map(|r| r.numeric_values()[idx]).sum::<f64>() / n;
                let variance = records
                    .iter()
                    .map(|r| (r.numeric_values()[idx] - mean).powi(2))
                    .sum::<f64>()
                    / n;
                let std = variance.sqrt();

                NumericScale {
                    column: column.to_string(),
                    mean,
                    // Constant columns are centered only
                    scale: if std > 0.0 { std } else { 1.0 },
                }
            })
            .collect();

        let categorical = CATEGORICAL_COLUMNS
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let observed: BTreeSet<&str> = records
                    .iter()
                    .map(|r| r.categorical_values()[idx].trim())
                    .collect();
                let mut sorted = observed.into_iter().map(str::to_string);
                let reference = sorted.next().unwrap_or_default();

                CategoricalVocabulary {
                    column: column.to_string(),
                    reference,
                    levels: sorted.collect(),
                }
            })
            .collect();

        Ok(FittedState {
            numeric,
            categorical,
        })
    }
}

/// Standardization parameters for one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericScale {
    pub column: String,
    pub mean: f64,
    /// Population standard deviation, or 1.0 for a constant column
    pub scale: f64,
}

/// Training vocabulary for one categorical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalVocabulary {
    pub column: String,
    /// Dropped level; encodes as all zeros
    pub reference: String,
    /// Sorted levels that each get an indicator column
    pub levels: Vec<String>,
}

/// Preprocessing state learned at training time and reused verbatim at serving time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedState {
    numeric: Vec<NumericScale>,
    categorical: Vec<CategoricalVocabulary>,
}

impl FittedState {
    /// Encode a record using only the stored statistics and vocabulary.
    pub fn transform(&self, record: &LoanApplication) -> FeatureVector {
        let mut features = Vec::with_capacity(self.feature_count());

        for (scale, value) in self.numeric.iter().zip(record.numeric_values()) {
            features.push(((value - scale.mean) / scale.scale) as f32);
        }

        for (vocab, value) in self.categorical.iter().zip(record.categorical_values()) {
            let value = value.trim();
            features.extend(
                vocab
                    .levels
                    .iter()
                    .map(|level| if level == value { 1.0 } else { 0.0 }),
            );
        }

        features
    }

    /// Encode a batch of records.
    pub fn transform_batch(&self, records: &[LoanApplication]) -> Vec<FeatureVector> {
        records.iter().map(|r| self.transform(r)).collect()
    }

    /// Number of features produced by [`transform`](Self::transform).
    pub fn feature_count(&self) -> usize {
        self.numeric.len() + self.categorical.iter().map(|v| v.levels.len()).sum::<usize>()
    }

    /// Feature names in vector order (`<column>` or `<column>_<level>`).
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.numeric.iter().map(|s| s.column.clone()).collect();
        for vocab in &self.categorical {
            names.extend(
                vocab
                    .levels
                    .iter()
                    .map(|level| format!("{}_{}", vocab.column, level)),
            );
        }
        names
    }

    pub fn numeric_scales(&self) -> &[NumericScale] {
        &self.numeric
    }

    pub fn vocabularies(&self) -> &[CategoricalVocabulary] {
        &self.categorical
    }

    /// Position of a categorical column's indicator group in the feature vector.
    pub fn indicator_range(&self, column: &str) -> Option<Range<usize>> {
        let mut start = self.numeric.len();
        for vocab in &self.categorical {
            let end = start + vocab.levels.len();
            if vocab.column == column {
                return Some(start..end);
            }
            start = end;
        }
        None
    }

    /// Categorical values of `record` that were not seen during training.
    pub fn unknown_categories<'a>(
        &self,
        record: &'a LoanApplication,
    ) -> Vec<(&'static str, &'a str)> {
        self.categorical
            .iter()
            .zip(CATEGORICAL_COLUMNS)
            .zip(record.categorical_values())
            .filter(|((vocab, _), value)| {
                let value = value.trim();
                vocab.reference != value && !vocab.levels.iter().any(|l| l == value)
            })
            .map(|((_, column), value)| (column, value))
            .collect()
    }

    /// Verify the stored state matches the record schema and is well formed.
    pub fn check_consistency(&self) -> Result<(), ArtifactError> {
        let numeric_columns: Vec<&str> = self.numeric.iter().map(|s| s.column.as_str()).collect();
        if numeric_columns != NUMERIC_COLUMNS {
            return Err(ArtifactError::Inconsistent(format!(
                "numeric columns {:?} do not match schema {:?}",
                numeric_columns, NUMERIC_COLUMNS
            )));
        }

        let categorical_columns: Vec<&str> =
            self.categorical.iter().map(|v| v.column.as_str()).collect();
        if categorical_columns != CATEGORICAL_COLUMNS {
            return Err(ArtifactError::Inconsistent(format!(
                "categorical columns {:?} do not match schema {:?}",
                categorical_columns, CATEGORICAL_COLUMNS
            )));
        }

        for scale in &self.numeric {
            if !scale.mean.is_finite() || !scale.scale.is_finite() || scale.scale <= 0.0 {
                return Err(ArtifactError::Inconsistent(format!(
                    "invalid scaling for {}: mean={}, scale={}",
                    scale.column, scale.mean, scale.scale
                )));
            }
        }

        for vocab in &self.categorical {
            let sorted = vocab.levels.windows(2).all(|w| w[0] < w[1]);
            let reference_first = vocab.levels.first().map_or(true, |l| vocab.reference < *l);
            if !sorted || !reference_first {
                return Err(ArtifactError::Inconsistent(format!(
                    "vocabulary for {} is not sorted and unique",
                    vocab.column
                )));
            }
        }

        Ok(())
    }
}
