//! Type definitions for the loan approval pipeline

pub mod application;
pub mod decision;

pub use application::LoanApplication;
pub use decision::{Decision, LoanDecision};
