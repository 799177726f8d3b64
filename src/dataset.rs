//! Labeled loan application dataset loading and splitting

use crate::error::DataError;
use crate::types::application::{
    LoanApplication, CATEGORICAL_COLUMNS, LABEL_COLUMN, NUMERIC_COLUMNS,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::Path;
use tracing::{info, warn};

/// Applications with their approval labels (`1` = approved).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    applications: Vec<LoanApplication>,
    labels: Vec<u8>,
}

impl Dataset {
    pub fn new(applications: Vec<LoanApplication>, labels: Vec<u8>) -> Result<Self, DataError> {
        if applications.len() != labels.len() {
            return Err(DataError::LengthMismatch {
                records: applications.len(),
                labels: labels.len(),
            });
        }
        Ok(Self {
            applications,
            labels,
        })
    }

    /// Load a delimited dataset with a header row.
    ///
    /// Rows with an empty required field are dropped; a non-empty value that
    /// does not parse is an error, as is a file with no usable rows.
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Self, DataError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DataError::NotFound(path.to_path_buf()));
        }

        let csv_err = |source| DataError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(csv_err)?;

        let headers = reader.headers().map_err(csv_err)?.clone();
        let column_index = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| DataError::MissingColumn(name.to_string()))
        };

        let numeric_idx = NUMERIC_COLUMNS
            .iter()
            .map(|c| column_index(c))
            .collect::<Result<Vec<_>, _>>()?;
        let categorical_idx = CATEGORICAL_COLUMNS
            .iter()
            .map(|c| column_index(c))
            .collect::<Result<Vec<_>, _>>()?;
        let label_idx = column_index(LABEL_COLUMN)?;

        let mut applications = Vec::new();
        let mut labels = Vec::new();
        let mut dropped = 0usize;

        for row in reader.records() {
            let row = row.map_err(csv_err)?;
            let line = row.position().map_or(0, |p| p.line());

            let mut required = numeric_idx
                .iter()
                .chain(&categorical_idx)
                .chain(std::iter::once(&label_idx));
            if required.any(|&i| row.get(i).map_or(true, str::is_empty)) {
                dropped += 1;
                continue;
            }

            let mut numeric = [0.0f64; 8];
            for ((slot, &idx), column) in numeric
                .iter_mut()
                .zip(&numeric_idx)
                .zip(NUMERIC_COLUMNS)
            {
                *slot = parse_number(&row[idx], line, column)?;
            }
            let categorical: Vec<String> =
                categorical_idx.iter().map(|&i| row[i].to_string()).collect();

            labels.push(parse_label(&row[label_idx], line)?);
            applications.push(LoanApplication {
                client_id: None,
                person_age: numeric[0],
                person_income: numeric[1],
                person_emp_exp: numeric[2],
                loan_amnt: numeric[3],
                loan_int_rate: numeric[4],
                loan_percent_income: numeric[5],
                cb_person_cred_hist_length: numeric[6],
                credit_score: numeric[7],
                person_gender: categorical[0].clone(),
                person_education: categorical[1].clone(),
                person_home_ownership: categorical[2].clone(),
                loan_intent: categorical[3].clone(),
                previous_loan_defaults_on_file: categorical[4].clone(),
            });
        }

        if dropped > 0 {
            warn!(dropped = dropped, "Dropped rows with missing values");
        }
        if applications.is_empty() {
            return Err(DataError::Empty(path.to_path_buf()));
        }

        info!(
            rows = applications.len(),
            path = %path.display(),
            "Dataset loaded"
        );

        Ok(Self {
            applications,
            labels,
        })
    }

    /// Seeded shuffle split into `(train, test)`.
    ///
    /// The test set gets `round(len * test_fraction)` rows. The same seed
    /// and fraction always select the same rows.
    pub fn train_test_split(
        &self,
        test_fraction: f64,
        seed: u64,
    ) -> Result<(Dataset, Dataset), DataError> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(DataError::InvalidSplit(format!(
                "test fraction must be in (0, 1), got {}",
                test_fraction
            )));
        }

        let n = self.len();
        let n_test = (n as f64 * test_fraction).round() as usize;
        if n_test == 0 || n_test >= n {
            return Err(DataError::InvalidSplit(format!(
                "{} rows cannot be split with test fraction {}",
                n, test_fraction
            )));
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));
        let (test_idx, train_idx) = order.split_at(n_test);

        Ok((self.subset(train_idx), self.subset(test_idx)))
    }

    fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            applications: indices.iter().map(|&i| self.applications[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    /// Accuracy of always predicting the most frequent label.
    pub fn majority_rate(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let approvals = self.labels.iter().filter(|&&l| l == 1).count();
        approvals.max(self.len() - approvals) as f64 / self.len() as f64
    }

    pub fn applications(&self) -> &[LoanApplication] {
        &self.applications
    }

    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.applications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applications.is_empty()
    }
}

fn parse_number(value: &str, line: u64, column: &str) -> Result<f64, DataError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| DataError::InvalidValue {
            line,
            column: column.to_string(),
            value: value.to_string(),
        })
}

fn parse_label(value: &str, line: u64) -> Result<u8, DataError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" => Ok(1),
        "0" | "0.0" | "false" => Ok(0),
        _ => Err(DataError::InvalidLabel {
            line,
            value: value.to_string(),
        }),
    }
}
