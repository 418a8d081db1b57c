//! Confusion counts and derived rates for boolean gene calls.

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};

/// TP / TN / FP / FN over one set of eligible genes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub true_positives: usize,
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl ConfusionCounts {
    /// Tally parallel truth / prediction vectors.
    pub fn tally(truth: &[bool], predicted: &[bool]) -> Result<Self> {
        if truth.len() != predicted.len() {
            return Err(EvalError::length_mismatch(
                "predicted calls",
                truth.len(),
                predicted.len(),
            ));
        }

        let mut counts = Self::default();
        for (&t, &p) in truth.iter().zip(predicted) {
            match (t, p) {
                (true, true) => counts.true_positives += 1,
                (false, false) => counts.true_negatives += 1,
                (false, true) => counts.false_positives += 1,
                (true, false) => counts.false_negatives += 1,
            }
        }
        Ok(counts)
    }

    /// Number of classified items (TP + TN + FP + FN).
    pub fn total(&self) -> usize {
        self.true_positives + self.true_negatives + self.false_positives + self.false_negatives
    }
}

/// `num / den`, or NaN when the denominator is zero.
pub fn rate(num: usize, den: usize) -> f64 {
    if den == 0 {
        f64::NAN
    } else {
        num as f64 / den as f64
    }
}

/// Classification quality of one call type (DE or marker) in one replicate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    /// Raw counts over the eligible genes.
    pub counts: ConfusionCounts,
    /// Total genes in the dataset, eligible or not.
    pub n_total: usize,
    /// (TP + TN) / n_total.
    pub accuracy: f64,
    /// TP / (TP + FN).
    pub recall: f64,
    /// TP / (TP + FP).
    pub precision: f64,
    /// Harmonic mean of precision and recall.
    pub f1: f64,
    /// FP / (FP + TN).
    pub fpr: f64,
}

impl ClassificationMetrics {
    /// Derive all rates from counts.
    ///
    /// Accuracy is taken over every gene in the dataset, so genes excluded
    /// before scoring count against it.
    pub fn from_counts(counts: ConfusionCounts, n_total: usize) -> Self {
        let c = &counts;
        let recall = rate(c.true_positives, c.true_positives + c.false_negatives);
        let precision = rate(c.true_positives, c.true_positives + c.false_positives);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            // Also reached when either side is NaN.
            f64::NAN
        };

        Self {
            counts,
            n_total,
            accuracy: rate(c.true_positives + c.true_negatives, n_total),
            recall,
            precision,
            f1,
            fpr: rate(c.false_positives, c.false_positives + c.true_negatives),
        }
    }

    /// Metrics with no counts and every rate undefined.
    pub fn undefined() -> Self {
        Self {
            counts: ConfusionCounts::default(),
            n_total: 0,
            accuracy: f64::NAN,
            recall: f64::NAN,
            precision: f64::NAN,
            f1: f64::NAN,
            fpr: f64::NAN,
        }
    }

    /// Number of genes that were scored.
    pub fn n_eligible(&self) -> usize {
        self.counts.total()
    }

    /// Rates in export order: accuracy, recall, precision, F1, FPR.
    pub fn rates(&self) -> [f64; 5] {
        [self.accuracy, self.recall, self.precision, self.f1, self.fpr]
    }

    /// Check if any rate is undefined.
    pub fn has_missing(&self) -> bool {
        self.rates().iter().any(|v| v.is_nan())
    }
}

impl std::fmt::Display for ClassificationMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let c = &self.counts;
        writeln!(
            f,
            "  TP: {}, FP: {}, FN: {}, TN: {} ({} of {} genes scored)",
            c.true_positives,
            c.false_positives,
            c.false_negatives,
            c.true_negatives,
            self.n_eligible(),
            self.n_total
        )?;
        writeln!(f, "  Accuracy:  {:.4}", self.accuracy)?;
        writeln!(f, "  Recall:    {:.4}", self.recall)?;
        writeln!(f, "  Precision: {:.4}", self.precision)?;
        writeln!(f, "  F1:        {:.4}", self.f1)?;
        writeln!(f, "  FPR:       {:.4}", self.fpr)?;
        Ok(())
    }
}

/// Score boolean calls against truth.
///
/// Callers pass only eligible genes; `n_total` is the dataset's full gene
/// count and must be at least the number of eligible genes.
pub fn score_binary(truth: &[bool], predicted: &[bool], n_total: usize) -> Result<ClassificationMetrics> {
    let counts = ConfusionCounts::tally(truth, predicted)?;
    if n_total < counts.total() {
        return Err(EvalError::InvalidParameter(format!(
            "total gene count {} is smaller than the {} eligible genes",
            n_total,
            counts.total()
        )));
    }
    Ok(ClassificationMetrics::from_counts(counts, n_total))
}
