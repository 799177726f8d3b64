//! Loan application records

use serde::{Deserialize, Serialize};

/// Numeric columns, in feature-vector order.
pub const NUMERIC_COLUMNS: [&str; 8] = [
    "person_age",
    "person_income",
    "person_emp_exp",
    "loan_amnt",
    "loan_int_rate",
    "loan_percent_income",
    "cb_person_cred_hist_length",
    "credit_score",
];

/// Categorical columns, in feature-vector order.
pub const CATEGORICAL_COLUMNS: [&str; 5] = [
    "person_gender",
    "person_education",
    "person_home_ownership",
    "loan_intent",
    "previous_loan_defaults_on_file",
];

/// Dataset column holding the approval label.
pub const LABEL_COLUMN: &str = "loan_status";

/// One loan application as submitted by an applicant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    /// Client identifier (serving only, never a feature)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Age in years
    #[serde(alias = "age")]
    pub person_age: f64,

    /// Gender ("male", "female")
    #[serde(alias = "gender")]
    pub person_gender: String,

    /// Highest education level ("High School", "Bachelor", "Master", ...)
    #[serde(alias = "education")]
    pub person_education: String,

    /// Annual income
    #[serde(alias = "income")]
    pub person_income: f64,

    /// Years of employment
    #[serde(alias = "emp_exp")]
    pub person_emp_exp: f64,

    /// Home ownership ("RENT", "OWN", "MORTGAGE", "OTHER")
    #[serde(alias = "home_ownership")]
    pub person_home_ownership: String,

    /// Requested loan amount
    #[serde(alias = "loan_amount")]
    pub loan_amnt: f64,

    /// Loan purpose ("PERSONAL", "EDUCATION", "MEDICAL", ...)
    #[serde(alias = "loan_purpose")]
    pub loan_intent: String,

    /// Interest rate in percent
    #[serde(alias = "interest_rate")]
    pub loan_int_rate: f64,

    /// Loan amount as a fraction of income
    #[serde(alias = "percent_income")]
    pub loan_percent_income: f64,

    /// Length of credit history in years
    #[serde(alias = "credit_history")]
    pub cb_person_cred_hist_length: f64,

    /// Credit score
    pub credit_score: f64,

    /// Prior default on file ("Yes", "No")
    #[serde(alias = "previous_defaults")]
    pub previous_loan_defaults_on_file: String,
}

impl LoanApplication {
    /// Numeric fields in [`NUMERIC_COLUMNS`] order.
    pub fn numeric_values(&self) -> [f64; 8] {
        [
            self.person_age,
            self.person_income,
            self.person_emp_exp,
            self.loan_amnt,
            self.loan_int_rate,
            self.loan_percent_income,
            self.cb_person_cred_hist_length,
            self.credit_score,
        ]
    }

    /// Categorical fields in [`CATEGORICAL_COLUMNS`] order.
    pub fn categorical_values(&self) -> [&str; 5] {
        [
            &self.person_gender,
            &self.person_education,
            &self.person_home_ownership,
            &self.loan_intent,
            &self.previous_loan_defaults_on_file,
        ]
    }

    /// Attach a client identifier.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }
}

impl Default for LoanApplication {
    /// Defaults pre-filled on the application form.
    fn default() -> Self {
        Self {
            client_id: None,
            person_age: 30.0,
            person_gender: "male".to_string(),
            person_education: "High School".to_string(),
            person_income: 50_000.0,
            person_emp_exp: 5.0,
            person_home_ownership: "RENT".to_string(),
            loan_amnt: 10_000.0,
            loan_intent: "PERSONAL".to_string(),
            loan_int_rate: 10.0,
            loan_percent_income: 0.2,
            cb_person_cred_hist_length: 5.0,
            credit_score: 650.0,
            previous_loan_defaults_on_file: "No".to_string(),
        }
    }
}
