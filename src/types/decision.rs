//! Loan decision data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Two-valued outcome of a loan application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    /// Map a dataset label (`1` = approved) to a decision.
    pub fn from_label(label: u8) -> Self {
        if label == 1 {
            Decision::Approved
        } else {
            Decision::Rejected
        }
    }

    /// Dataset label for this decision.
    pub fn label(self) -> u8 {
        match self {
            Decision::Approved => 1,
            Decision::Rejected => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Approved => "Approved",
            Decision::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision returned to the caller for one application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanDecision {
    /// Unique decision identifier
    pub decision_id: String,

    /// Client identifier from the request, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Approved or rejected
    pub decision: Decision,

    /// Fraction of trees voting to approve (absent when no prediction ran)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_probability: Option<f64>,

    /// Why the application was rejected before prediction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,

    /// Decision timestamp
    pub timestamp: DateTime<Utc>,
}

impl LoanDecision {
    /// Decision produced by the classifier.
    pub fn predicted(
        client_id: Option<String>,
        decision: Decision,
        approval_probability: f64,
    ) -> Self {
        Self {
            decision_id: uuid::Uuid::new_v4().to_string(),
            client_id,
            decision,
            approval_probability: Some(approval_probability),
            rejection_reason: None,
            timestamp: Utc::now(),
        }
    }

    /// Rejection issued by a business-rule pre-check; no prediction ran.
    pub fn rejected(client_id: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            decision_id: uuid::Uuid::new_v4().to_string(),
            client_id,
            decision: Decision::Rejected,
            approval_probability: None,
            rejection_reason: Some(reason.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn is_approved(&self) -> bool {
        self.decision == Decision::Approved
    }
}
