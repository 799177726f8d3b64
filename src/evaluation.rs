//! Held-out evaluation and report files

use crate::config::AppConfig;
use crate::dataset::Dataset;
use crate::models::inference::LoanPredictor;
use crate::types::decision::Decision;
use anyhow::{bail, Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Confusion counts with "approved" as the positive class
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub true_positive: usize,
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
}

impl ConfusionMatrix {
    fn record(&mut self, predicted: Decision, actual: Decision) {
        match (predicted, actual) {
            (Decision::Approved, Decision::Approved) => self.true_positive += 1,
            (Decision::Rejected, Decision::Rejected) => self.true_negative += 1,
            (Decision::Approved, Decision::Rejected) => self.false_positive += 1,
            (Decision::Rejected, Decision::Approved) => self.false_negative += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.true_negative + self.false_positive + self.false_negative
    }

    pub fn correct(&self) -> usize {
        self.true_positive + self.true_negative
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub error_rate: f64,
    /// Accuracy of always predicting the majority class of the test set
    pub baseline_accuracy: f64,
    pub confusion: ConfusionMatrix,
    pub test_rows: usize,
    /// Feature importances, largest first
    pub importances: Vec<(String, f64)>,
}

/// Score `predictor` on a labeled dataset.
pub fn evaluate(predictor: &LoanPredictor, dataset: &Dataset) -> EvaluationReport {
    let mut confusion = ConfusionMatrix::default();
    let predictions = predictor.predict_batch(dataset.applications());
    for (prediction, &label) in predictions.iter().zip(dataset.labels()) {
        confusion.record(prediction.decision, Decision::from_label(label));
    }

    let accuracy = if confusion.total() > 0 {
        confusion.correct() as f64 / confusion.total() as f64
    } else {
        0.0
    };

    let mut importances: Vec<(String, f64)> = predictor.feature_importance().into_iter().collect();
    importances.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    EvaluationReport {
        accuracy,
        error_rate: 1.0 - accuracy,
        baseline_accuracy: dataset.majority_rate(),
        confusion,
        test_rows: dataset.len(),
        importances,
    }
}

/// Plain-text metrics report
pub fn render_metrics(report: &EvaluationReport) -> String {
    let c = &report.confusion;
    let mut out = String::new();
    let _ = writeln!(out, "Loan approval model evaluation");
    let _ = writeln!(out, "==============================");
    let _ = writeln!(out, "Test rows:          {}", report.test_rows);
    let _ = writeln!(out, "Accuracy:           {:.4}", report.accuracy);
    let _ = writeln!(out, "Error rate:         {:.4}", report.error_rate);
    let _ = writeln!(out, "Majority baseline:  {:.4}", report.baseline_accuracy);
    let _ = writeln!(out);
    let _ = writeln!(out, "Confusion matrix (rows = actual, columns = predicted)");
    let _ = writeln!(out, "              Approved  Rejected");
    let _ = writeln!(out, "  Approved   {:>9} {:>9}", c.true_positive, c.false_negative);
    let _ = writeln!(out, "  Rejected   {:>9} {:>9}", c.false_positive, c.true_negative);
    out
}

/// Horizontal bar chart of feature importances
pub fn render_importance_chart(importances: &[(String, f64)]) -> String {
    const BAR_WIDTH: f64 = 40.0;

    let name_width = importances.iter().map(|(n, _)| n.len()).max().unwrap_or(0);
    let max = importances
        .iter()
        .map(|(_, v)| *v)
        .fold(0.0f64, f64::max);

    let mut out = String::from("Feature importance\n");
    for (name, value) in importances {
        let len = if max > 0.0 {
            (value / max * BAR_WIDTH).round() as usize
        } else {
            0
        };
        let _ = writeln!(
            out,
            "{:<width$}  {:.4}  {}",
            name,
            value,
            "█".repeat(len),
            width = name_width
        );
    }
    out
}

/// Files written by [`evaluate_pipeline`]
#[derive(Debug)]
pub struct EvaluationOutcome {
    pub report: EvaluationReport,
    pub metrics_path: PathBuf,
    pub importance_path: PathBuf,
}

/// Re-create the held-out split recorded in the artifact, score it and
/// write the reports.
pub fn evaluate_pipeline(config: &AppConfig) -> Result<EvaluationOutcome> {
    let predictor = LoanPredictor::load(&config.paths.model)?;
    let dataset = Dataset::load_csv(&config.paths.dataset)?;

    let metadata = predictor.artifact().metadata();
    let trained_on = metadata.train_rows + metadata.test_rows;
    if dataset.len() != trained_on {
        bail!(
            "Dataset {} has {} usable rows but the model was split from {}; \
             the held-out rows cannot be reproduced",
            config.paths.dataset.display(),
            dataset.len(),
            trained_on
        );
    }
    let (_, test) = dataset
        .train_test_split(metadata.test_fraction, metadata.split_seed)
        .context("Failed to re-create evaluation split")?;

    let report = evaluate(&predictor, &test);
    info!(
        test_rows = report.test_rows,
        accuracy = format!("{:.4}", report.accuracy),
        baseline = format!("{:.4}", report.baseline_accuracy),
        "Evaluation complete"
    );

    let reports_dir = &config.paths.reports_dir;
    fs::create_dir_all(reports_dir)
        .with_context(|| format!("Failed to create {}", reports_dir.display()))?;

    let metrics_path = reports_dir.join("metrics.txt");
    fs::write(&metrics_path, render_metrics(&report))
        .with_context(|| format!("Failed to write {}", metrics_path.display()))?;

    let importance_path = reports_dir.join("feature_importance.txt");
    fs::write(&importance_path, render_importance_chart(&report.importances))
        .with_context(|| format!("Failed to write {}", importance_path.display()))?;

    info!(
        metrics = %metrics_path.display(),
        importance = %importance_path.display(),
        "Reports written"
    );

    Ok(EvaluationOutcome {
        report,
        metrics_path,
        importance_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_matrix() {
        let mut c = ConfusionMatrix::default();
        c.record(Decision::Approved, Decision::Approved);
        c.record(Decision::Approved, Decision::Rejected);
        c.record(Decision::Rejected, Decision::Rejected);
        c.record(Decision::Rejected, Decision::Rejected);

        assert_eq!(c.true_positive, 1);
        assert_eq!(c.false_positive, 1);
        assert_eq!(c.true_negative, 2);
        assert_eq!(c.false_negative, 0);
        assert_eq!(c.total(), 4);
        assert_eq!(c.correct(), 3);
    }

    #[test]
    fn test_render_metrics() {
        let report = EvaluationReport {
            accuracy: 0.9,
            error_rate: 0.1,
            baseline_accuracy: 0.7,
            confusion: ConfusionMatrix {
                true_positive: 5,
                true_negative: 4,
                false_positive: 1,
                false_negative: 0,
            },
            test_rows: 10,
            importances: vec![],
        };

        let text = render_metrics(&report);
        assert!(text.contains("Accuracy:           0.9000"));
        assert!(text.contains("Majority baseline:  0.7000"));
        assert!(text.contains("Test rows:          10"));
    }

    #[test]
    fn test_importance_chart_scales_to_largest() {
        let chart = render_importance_chart(&[
            ("credit_score".to_string(), 0.5),
            ("person_age".to_string(), 0.25),
            ("person_gender_male".to_string(), 0.0),
        ]);
        let lines: Vec<&str> = chart.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1].matches('█').count(), 40);
        assert_eq!(lines[2].matches('█').count(), 20);
        assert_eq!(lines[3].matches('█').count(), 0);
    }
}
