//! Serving session: one loaded model plus serving counters.
//!
//! A session is created once per process and handed to whatever front end
//! drives it (CLI, NATS loop). It holds no global state and never reloads
//! the model; a new artifact takes effect on process restart.

use crate::error::{ArtifactError, ValidationError};
use crate::metrics::ServingMetrics;
use crate::models::inference::LoanPredictor;
use crate::types::application::LoanApplication;
use crate::types::decision::LoanDecision;
use crate::validation;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

#[derive(Clone)]
pub struct ServingSession {
    predictor: Arc<LoanPredictor>,
    metrics: Arc<ServingMetrics>,
}

impl ServingSession {
    pub fn new(predictor: LoanPredictor) -> Self {
        Self {
            predictor: Arc::new(predictor),
            metrics: Arc::new(ServingMetrics::new()),
        }
    }

    /// Load the model artifact once and open a session around it.
    pub fn open<P: AsRef<Path>>(model_path: P) -> Result<Self, ArtifactError> {
        let predictor = LoanPredictor::load(model_path)?;
        info!(
            features = predictor.fitted_state().feature_count(),
            "Serving session ready"
        );
        Ok(Self::new(predictor))
    }

    /// Validate, then predict. A validation failure never reaches the classifier.
    pub fn submit(&self, application: &LoanApplication) -> Result<LoanDecision, ValidationError> {
        let start = Instant::now();

        if let Err(e) = validation::validate(application) {
            self.metrics.record_validation_failure(start.elapsed());
            debug!(
                client_id = ?application.client_id,
                error = %e,
                "Application failed validation"
            );
            return Err(e);
        }

        let prediction = self.predictor.predict(application);
        self.metrics.record_prediction(
            start.elapsed(),
            prediction.decision,
            prediction.approval_probability,
        );

        Ok(prediction.to_decision(application))
    }

    /// Like [`submit`](Self::submit), with validation failures turned into
    /// a rejection that carries the reason.
    pub fn decide(&self, application: &LoanApplication) -> LoanDecision {
        self.submit(application)
            .unwrap_or_else(|e| LoanDecision::rejected(application.client_id.clone(), e.to_string()))
    }

    pub fn predictor(&self) -> &LoanPredictor {
        &self.predictor
    }

    pub fn metrics(&self) -> &Arc<ServingMetrics> {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::artifact::{ArtifactMetadata, ModelArtifact};
    use crate::models::forest::{ForestParams, RandomForest};
    use crate::preprocessing::Preprocessor;
    use crate::types::decision::Decision;
    use std::sync::atomic::Ordering;

    /// Approval follows a prior-default flag of "No".
    fn session() -> ServingSession {
        let records: Vec<LoanApplication> = (0..40)
            .map(|i| LoanApplication {
                previous_loan_defaults_on_file: if i % 2 == 0 { "No" } else { "Yes" }.to_string(),
                person_age: 20.0 + (i / 2) as f64,
                ..LoanApplication::default()
            })
            .collect();
        let labels: Vec<u8> = (0..40).map(|i| u8::from(i % 2 == 0)).collect();

        let state = Preprocessor::fit(&records).unwrap();
        let params = ForestParams {
            n_estimators: 9,
            ..ForestParams::default()
        };
        let forest =
            RandomForest::train(&state.transform_batch(&records), &labels, &params).unwrap();
        let metadata = ArtifactMetadata {
            artifact_id: "session-test".to_string(),
            trained_at: chrono::Utc::now(),
            train_rows: 40,
            test_rows: 0,
            test_fraction: 0.2,
            split_seed: 42,
            forest_params: params,
        };
        ServingSession::new(LoanPredictor::new(
            ModelArtifact::new(state, forest, metadata).unwrap(),
        ))
    }

    #[test]
    fn test_income_check_runs_before_prediction() {
        let session = session();
        let app = LoanApplication {
            person_income: 40_000.0,
            loan_amnt: 50_000.0,
            ..LoanApplication::default()
        };

        let err = session.submit(&app).unwrap_err();
        assert!(matches!(err, ValidationError::IncomeBelowLoanAmount { .. }));

        let metrics = session.metrics();
        assert_eq!(metrics.predictions.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.validation_failures.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_decide_reports_rejection_reason() {
        let session = session();
        let app = LoanApplication {
            person_income: 40_000.0,
            loan_amnt: 50_000.0,
            ..LoanApplication::default()
        }
        .with_client_id("20703025");

        let decision = session.decide(&app);
        assert_eq!(decision.decision, Decision::Rejected);
        assert_eq!(decision.client_id.as_deref(), Some("20703025"));
        assert!(decision.approval_probability.is_none());
        assert!(decision
            .rejection_reason
            .as_deref()
            .is_some_and(|r| r.contains("at least the loan amount")));
    }

    #[test]
    fn test_valid_application_is_predicted() {
        let session = session();

        let approved = session.submit(&LoanApplication::default()).unwrap();
        let rejected = session
            .submit(&LoanApplication {
                previous_loan_defaults_on_file: "Yes".to_string(),
                ..LoanApplication::default()
            })
            .unwrap();

        assert!(approved.is_approved());
        assert!(!rejected.is_approved());
        assert!(approved.rejection_reason.is_none());
        assert_eq!(session.metrics().predictions.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_clones_share_model_and_counters() {
        let session = session();
        let clone = session.clone();

        clone.submit(&LoanApplication::default()).unwrap();

        assert!(std::ptr::eq(session.predictor(), clone.predictor()));
        assert_eq!(session.metrics().requests.load(Ordering::Relaxed), 1);
    }
}
