//! Loan approval inference engine

use crate::error::{ArtifactError, FeatureLengthMismatch};
use crate::models::artifact::ModelArtifact;
use crate::preprocessing::FittedState;
use crate::types::application::LoanApplication;
use crate::types::decision::{Decision, LoanDecision};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Result of model inference
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Majority-vote outcome
    pub decision: Decision,
    /// Fraction of trees voting to approve
    pub approval_probability: f64,
}

impl Prediction {
    /// Convert the prediction into a caller-facing decision
    pub fn to_decision(&self, application: &LoanApplication) -> LoanDecision {
        LoanDecision::predicted(
            application.client_id.clone(),
            self.decision,
            self.approval_probability,
        )
    }
}

/// Encodes applications with the artifact's fitted state and runs the forest.
///
/// Holds exactly one immutable [`ModelArtifact`]; all methods take `&self`.
pub struct LoanPredictor {
    artifact: ModelArtifact,
}

impl LoanPredictor {
    pub fn new(artifact: ModelArtifact) -> Self {
        Self { artifact }
    }

    /// Load the artifact from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ArtifactError> {
        ModelArtifact::load(path).map(Self::new)
    }

    /// Predict one application.
    pub fn predict(&self, application: &LoanApplication) -> Prediction {
        let state = self.artifact.fitted_state();

        let unknown = state.unknown_categories(application);
        if !unknown.is_empty() {
            debug!(
                client_id = ?application.client_id,
                unknown = ?unknown,
                "Categories unseen in training encode as all-zero indicators"
            );
        }

        let prediction = self.vote(&state.transform(application));

        debug!(
            client_id = ?application.client_id,
            decision = %prediction.decision,
            approval_probability = prediction.approval_probability,
            "Inference complete"
        );
        prediction
    }

    /// Predict an already-encoded feature vector.
    pub fn predict_features(
        &self,
        features: &[f32],
    ) -> Result<Prediction, FeatureLengthMismatch> {
        let expected = self.artifact.forest().n_features();
        if features.len() != expected {
            return Err(FeatureLengthMismatch {
                expected,
                got: features.len(),
            });
        }
        Ok(self.vote(features))
    }

    fn vote(&self, features: &[f32]) -> Prediction {
        let forest = self.artifact.forest();
        Prediction {
            decision: forest.predict(features),
            approval_probability: forest.predict_proba(features),
        }
    }

    pub fn predict_batch(&self, applications: &[LoanApplication]) -> Vec<Prediction> {
        applications.iter().map(|a| self.predict(a)).collect()
    }

    /// Global feature importances keyed by feature name.
    pub fn feature_importance(&self) -> BTreeMap<String, f64> {
        self.fitted_state()
            .feature_names()
            .into_iter()
            .zip(self.artifact.forest().feature_importances())
            .collect()
    }

    pub fn fitted_state(&self) -> &FittedState {
        self.artifact.fitted_state()
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::artifact::ArtifactMetadata;
    use crate::models::forest::{ForestParams, RandomForest};
    use crate::preprocessing::Preprocessor;

    /// Approval follows credit score >= 650.
    fn predictor() -> LoanPredictor {
        let records: Vec<LoanApplication> = (0..60)
            .map(|i| LoanApplication {
                credit_score: 500.0 + 5.0 * i as f64,
                loan_intent: ["PERSONAL", "EDUCATION", "MEDICAL"][i % 3].to_string(),
                ..LoanApplication::default()
            })
            .collect();
        let labels: Vec<u8> = records
            .iter()
            .map(|r| u8::from(r.credit_score >= 650.0))
            .collect();

        let state = Preprocessor::fit(&records).unwrap();
        let params = ForestParams {
            n_estimators: 11,
            ..ForestParams::default()
        };
        let forest =
            RandomForest::train(&state.transform_batch(&records), &labels, &params).unwrap();
        let metadata = ArtifactMetadata {
            artifact_id: "inference-test".to_string(),
            trained_at: chrono::Utc::now(),
            train_rows: records.len(),
            test_rows: 0,
            test_fraction: 0.2,
            split_seed: 42,
            forest_params: params,
        };
        LoanPredictor::new(ModelArtifact::new(state, forest, metadata).unwrap())
    }

    #[test]
    fn test_predict_follows_rule() {
        let predictor = predictor();

        let strong = LoanApplication {
            credit_score: 800.0,
            ..LoanApplication::default()
        };
        let weak = LoanApplication {
            credit_score: 510.0,
            ..LoanApplication::default()
        };

        assert_eq!(predictor.predict(&strong).decision, Decision::Approved);
        assert_eq!(predictor.predict(&weak).decision, Decision::Rejected);
    }

    #[test]
    fn test_predict_is_deterministic() {
        let predictor = predictor();
        let app = LoanApplication {
            credit_score: 648.0,
            ..LoanApplication::default()
        };

        let first = predictor.predict(&app);
        for _ in 0..20 {
            assert_eq!(predictor.predict(&app), first);
        }
    }

    #[test]
    fn test_predict_features_checks_length() {
        let predictor = predictor();
        let app = LoanApplication {
            credit_score: 800.0,
            ..LoanApplication::default()
        };
        let features = predictor.fitted_state().transform(&app);

        assert_eq!(
            predictor.predict_features(&features),
            Ok(predictor.predict(&app))
        );
        assert_eq!(
            predictor.predict_features(&features[..8]),
            Err(FeatureLengthMismatch {
                expected: features.len(),
                got: 8
            })
        );
    }

    #[test]
    fn test_unseen_intent_still_predicts() {
        let predictor = predictor();
        let app = LoanApplication {
            credit_score: 800.0,
            loan_intent: "VENTURE".to_string(),
            ..LoanApplication::default()
        };

        let prediction = predictor.predict(&app);
        assert!((0.0..=1.0).contains(&prediction.approval_probability));
    }

    #[test]
    fn test_feature_importance_keys() {
        let predictor = predictor();
        let importance = predictor.feature_importance();

        assert_eq!(importance.len(), predictor.fitted_state().feature_count());
        assert!(importance.contains_key("credit_score"));
        assert!(importance.contains_key("loan_intent_PERSONAL"));
        assert!(importance.values().all(|&w| w >= 0.0));

        let top = importance
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(name, _)| name.as_str());
        assert_eq!(top, Some("credit_score"));
    }

    #[test]
    fn test_prediction_to_decision() {
        let app = LoanApplication::default().with_client_id("12345678");
        let prediction = Prediction {
            decision: Decision::Approved,
            approval_probability: 0.9,
        };

        let decision = prediction.to_decision(&app);
        assert_eq!(decision.client_id.as_deref(), Some("12345678"));
        assert!(decision.is_approved());
        assert_eq!(decision.approval_probability, Some(0.9));
    }
}
