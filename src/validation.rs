//! Business-rule checks run before any prediction

use crate::error::ValidationError;
use crate::types::application::{LoanApplication, CATEGORICAL_COLUMNS, NUMERIC_COLUMNS};
use tracing::warn;

/// Expected value ranges from the application form. Advisory only.
const ADVISORY_RANGES: [(&str, f64, f64); 5] = [
    ("person_age", 18.0, 100.0),
    ("person_emp_exp", 0.0, 50.0),
    ("loan_int_rate", 0.0, 100.0),
    ("cb_person_cred_hist_length", 0.0, 50.0),
    ("credit_score", 300.0, 850.0),
];

/// Length of a client identifier.
const CLIENT_ID_LEN: usize = 8;

/// Check an application against the business rules.
///
/// Out-of-range values are logged but accepted; only the rules below reject:
/// - every numeric field is finite and every categorical field non-empty
/// - a client ID, when present, is exactly 8 ASCII digits
/// - annual income covers the requested loan amount
pub fn validate(application: &LoanApplication) -> Result<(), ValidationError> {
    for (column, value) in NUMERIC_COLUMNS.iter().zip(application.numeric_values()) {
        if !value.is_finite() {
            return Err(ValidationError::NonFinite(*column));
        }
    }

    for (column, value) in CATEGORICAL_COLUMNS
        .iter()
        .zip(application.categorical_values())
    {
        if value.trim().is_empty() {
            return Err(ValidationError::EmptyCategory(*column));
        }
    }

    if let Some(client_id) = &application.client_id {
        if client_id.len() != CLIENT_ID_LEN || !client_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidClientId(client_id.clone()));
        }
    }

    if application.person_income < application.loan_amnt {
        return Err(ValidationError::IncomeBelowLoanAmount {
            income: application.person_income,
            loan_amount: application.loan_amnt,
        });
    }

    for (column, value) in advisory_violations(application) {
        warn!(
            client_id = ?application.client_id,
            column = column,
            value = value,
            "Value outside the expected range"
        );
    }

    Ok(())
}

/// Fields outside their advisory range.
pub fn advisory_violations(application: &LoanApplication) -> Vec<(&'static str, f64)> {
    let values = application.numeric_values();
    ADVISORY_RANGES
        .iter()
        .filter_map(|&(column, min, max)| {
            let idx = NUMERIC_COLUMNS.iter().position(|c| *c == column)?;
            let value = values[idx];
            (value < min || value > max).then_some((column, value))
        })
        .collect()
}
