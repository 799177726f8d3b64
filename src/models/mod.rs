//! Loan approval model: decision trees, forest, artifact and inference

pub mod artifact;
pub mod forest;
pub mod inference;
pub mod tree;

pub use artifact::{ArtifactMetadata, ModelArtifact};
pub use forest::{ForestParams, RandomForest};
pub use inference::{LoanPredictor, Prediction};
