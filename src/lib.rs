//! Loan Approval Pipeline Library
//!
//! Trains a random forest on historical loan applications and serves
//! approve/reject decisions, applying at serving time exactly the
//! preprocessing fitted at training time.

pub mod config;
pub mod consumer;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod metrics;
pub mod models;
pub mod preprocessing;
pub mod producer;
pub mod session;
pub mod training;
pub mod types;
pub mod validation;

pub use config::AppConfig;
pub use consumer::ApplicationConsumer;
pub use dataset::Dataset;
pub use error::{ArtifactError, DataError, FeatureLengthMismatch, TrainingError, ValidationError};
pub use models::inference::LoanPredictor;
pub use preprocessing::{FittedState, Preprocessor};
pub use producer::DecisionProducer;
pub use session::ServingSession;
pub use types::{Decision, LoanApplication, LoanDecision};
