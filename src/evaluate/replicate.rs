//! Evaluation of a single simulated replicate.

use crate::classify::{derive_truth, score_binary, ClassificationMetrics, GeneTruth};
use crate::compare::compare_partitions;
use crate::data::{CellAssignments, GeneTable, MetricsRow, Partition};
use crate::error::{EvalError, Result};
use tracing::{debug, warn};

/// Default significance threshold for DE and marker calls.
pub const DEFAULT_THRESHOLD: f64 = 0.05;

/// Ground truth and clustering output for one replicate.
#[derive(Debug, Clone)]
pub struct ReplicateInput {
    /// Replicate identifier.
    pub replicate_id: usize,
    /// Simulated group per cell.
    pub truth: Partition,
    /// Predicted cluster per cell, same cell order as `truth`.
    pub predicted: Partition,
    /// Per-gene DE factors, filter flags and calls.
    pub genes: GeneTable,
}

impl ReplicateInput {
    /// Create a replicate input.
    pub fn new(replicate_id: usize, truth: Partition, predicted: Partition, genes: GeneTable) -> Self {
        Self {
            replicate_id,
            truth,
            predicted,
            genes,
        }
    }

    /// Create a replicate input from loaded cell assignments.
    pub fn from_cells(replicate_id: usize, cells: CellAssignments, genes: GeneTable) -> Self {
        Self::new(replicate_id, cells.truth, cells.predicted, genes)
    }
}

/// Check a significance threshold.
pub fn validate_threshold(threshold: f64) -> Result<()> {
    if threshold.is_finite() && threshold > 0.0 && threshold <= 1.0 {
        Ok(())
    } else {
        Err(EvalError::InvalidParameter(format!(
            "significance threshold must be in (0, 1], got {}",
            threshold
        )))
    }
}

/// Score one call type over the genes eligible for it.
///
/// A gene is eligible when it passed the expression filter and has a
/// significance value for this call.
fn score_calls(
    genes: &GeneTable,
    truths: &[GeneTruth],
    pvalues: &[Option<f64>],
    is_true: impl Fn(&GeneTruth) -> bool,
    threshold: f64,
) -> Result<ClassificationMetrics> {
    let (truth, predicted): (Vec<bool>, Vec<bool>) = pvalues
        .iter()
        .zip(genes.passed_filter())
        .zip(truths)
        .filter_map(|((pvalue, &passed), gene_truth)| match pvalue {
            Some(p) if passed => Some((is_true(gene_truth), *p < threshold)),
            _ => None,
        })
        .unzip();

    score_binary(&truth, &predicted, genes.n_genes())
}

/// Evaluate one replicate: partition agreement plus DE and marker call scoring.
///
/// Shape errors are returned; undefined statistics are NaN in the row.
pub fn evaluate_replicate(input: &ReplicateInput, threshold: f64) -> Result<MetricsRow> {
    validate_threshold(threshold)?;

    let genes = &input.genes;
    let truths: Vec<GeneTruth> = (0..genes.n_genes())
        .map(|g| derive_truth(genes.de_factors().row(g).iter()))
        .collect();

    let de = score_calls(genes, &truths, genes.de_pvalues(), |t| t.is_de, threshold)?;
    let marker = score_calls(genes, &truths, genes.marker_pvalues(), |t| t.is_marker, threshold)?;
    let agreement = compare_partitions(&input.truth, &input.predicted)?;

    debug!(
        replicate = input.replicate_id,
        cells = input.truth.n_items(),
        genes = genes.n_genes(),
        de_eligible = de.n_eligible(),
        marker_eligible = marker.n_eligible(),
        "evaluated replicate"
    );

    Ok(MetricsRow::new(
        input.replicate_id,
        input.truth.n_items(),
        genes.n_genes(),
        agreement,
        de,
        marker,
    ))
}

/// Evaluate one replicate, turning input errors into a failed row.
pub fn evaluate_replicate_flagged(input: &ReplicateInput, threshold: f64) -> MetricsRow {
    match evaluate_replicate(input, threshold) {
        Ok(row) => row,
        Err(e) => {
            warn!(replicate = input.replicate_id, error = %e, "replicate failed");
            MetricsRow::failed(input.replicate_id, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{GeneRecord, RowStatus};
    use approx::assert_abs_diff_eq;

    fn genes() -> GeneTable {
        GeneTable::from_records(&[
            // Marker for group 2, called DE and marker.
            GeneRecord::new("g1", vec![1.0, 1.5, 1.0], true, Some(0.001), Some(0.01)),
            // DE in two groups, called DE, not marker.
            GeneRecord::new("g2", vec![1.2, 1.5, 1.0], true, Some(0.02), Some(0.3)),
            // Null gene, wrongly called DE.
            GeneRecord::new("g3", vec![1.0, 1.0, 1.0], true, Some(0.04), Some(0.9)),
            // Null gene, not called.
            GeneRecord::new("g4", vec![1.0, 1.0, 1.0], true, Some(0.5), Some(0.5)),
            // Marker gene missed by both calls.
            GeneRecord::new("g5", vec![0.5, 1.0, 1.0], true, Some(0.2), Some(0.07)),
            // Filtered out upstream.
            GeneRecord::new("g6", vec![2.0, 1.0, 1.0], false, Some(0.001), Some(0.001)),
            // Passed the filter but has no marker call.
            GeneRecord::new("g7", vec![1.0, 1.0, 3.0], true, Some(0.001), None),
        ])
        .unwrap()
    }

    fn input() -> ReplicateInput {
        ReplicateInput::new(
            7,
            Partition::from_labels(&["A", "A", "B", "B", "C", "C"]),
            Partition::from_labels(&[0, 0, 1, 1, 1, 2]),
            genes(),
        )
    }

    #[test]
    fn test_evaluate_counts() {
        let row = evaluate_replicate(&input(), DEFAULT_THRESHOLD).unwrap();
        assert_eq!(row.replicate_id, 7);
        assert_eq!(row.n_cells, 6);
        assert_eq!(row.n_genes, 7);

        // DE pass: g1..g5 and g7 eligible.
        let c = row.de.counts;
        assert_eq!(row.de.n_eligible(), 6);
        assert_eq!(c.true_positives, 3); // g1, g2, g7
        assert_eq!(c.false_positives, 1); // g3
        assert_eq!(c.true_negatives, 1); // g4
        assert_eq!(c.false_negatives, 1); // g5

        // Marker pass: g7 has no marker value.
        let m = row.marker.counts;
        assert_eq!(row.marker.n_eligible(), 5);
        assert_eq!(m.true_positives, 1); // g1
        assert_eq!(m.false_negatives, 1); // g5
        assert_eq!(m.true_negatives, 3); // g2, g3, g4
        assert_eq!(m.false_positives, 0);
    }

    #[test]
    fn test_evaluate_rates() {
        let row = evaluate_replicate(&input(), DEFAULT_THRESHOLD).unwrap();
        assert_abs_diff_eq!(row.de.accuracy, 4.0 / 7.0);
        assert_abs_diff_eq!(row.de.recall, 3.0 / 4.0);
        assert_abs_diff_eq!(row.de.precision, 3.0 / 4.0);
        assert_abs_diff_eq!(row.de.fpr, 1.0 / 2.0);
        assert_abs_diff_eq!(row.marker.accuracy, 4.0 / 7.0);
        assert_abs_diff_eq!(row.marker.recall, 0.5);
        assert_abs_diff_eq!(row.marker.precision, 1.0);
        assert_abs_diff_eq!(row.marker.fpr, 0.0);
        assert_eq!(row.status, RowStatus::Ok);
    }

    #[test]
    fn test_threshold_changes_calls() {
        let row = evaluate_replicate(&input(), 0.1).unwrap();
        // g5's marker call (0.07) is now significant.
        assert_eq!(row.marker.counts.true_positives, 2);
        assert_eq!(row.marker.counts.false_negatives, 0);
    }

    #[test]
    fn test_invalid_threshold() {
        assert!(evaluate_replicate(&input(), 0.0).is_err());
        assert!(evaluate_replicate(&input(), f64::NAN).is_err());
        assert!(evaluate_replicate(&input(), 1.5).is_err());
    }

    #[test]
    fn test_mismatched_cells_flagged() {
        let mut bad = input();
        bad.predicted = Partition::from_labels(&[0, 0, 1]);
        assert!(evaluate_replicate(&bad, DEFAULT_THRESHOLD).is_err());

        let row = evaluate_replicate_flagged(&bad, DEFAULT_THRESHOLD);
        assert_eq!(row.status, RowStatus::Failed);
        assert!(row.error.unwrap().contains("Length mismatch"));
    }

    #[test]
    fn test_no_true_markers_is_degraded() {
        let genes = GeneTable::from_records(&[
            GeneRecord::new("g1", vec![1.0, 1.0], true, Some(0.5), Some(0.5)),
            GeneRecord::new("g2", vec![1.0, 1.0], true, Some(0.6), Some(0.6)),
        ])
        .unwrap();
        let input = ReplicateInput::new(
            1,
            Partition::from_labels(&[1, 1, 2, 2]),
            Partition::from_labels(&[1, 1, 2, 2]),
            genes,
        );

        let row = evaluate_replicate_flagged(&input, DEFAULT_THRESHOLD);
        assert_eq!(row.status, RowStatus::Degraded);
        assert!(row.de.recall.is_nan());
        assert!(row.de.precision.is_nan());
        assert!(row.de.f1.is_nan());
        assert_abs_diff_eq!(row.de.fpr, 0.0);
        assert_abs_diff_eq!(row.agreement.adjusted_rand, 1.0);
    }

    #[test]
    fn test_conservation_and_accuracy_identity() {
        let row = evaluate_replicate(&input(), DEFAULT_THRESHOLD).unwrap();
        for metrics in [row.de, row.marker] {
            let c = metrics.counts;
            assert_eq!(
                c.true_positives + c.true_negatives + c.false_positives + c.false_negatives,
                metrics.n_eligible()
            );
            assert_abs_diff_eq!(
                metrics.accuracy * row.n_genes as f64,
                (c.true_positives + c.true_negatives) as f64,
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn test_nan_pvalue_excluded_from_scoring() {
        let genes = GeneTable::from_records(&[
            GeneRecord::new("g1", vec![1.0, 2.0], true, Some(0.01), Some(0.01)),
            GeneRecord::new("g2", vec![1.0, 2.0], true, Some(f64::NAN), Some(f64::NAN)),
        ])
        .unwrap();
        let input = ReplicateInput::new(
            1,
            Partition::from_labels(&[1, 1, 2, 2]),
            Partition::from_labels(&[1, 1, 2, 2]),
            genes,
        );

        let row = evaluate_replicate(&input, DEFAULT_THRESHOLD).unwrap();
        assert_eq!(row.de.n_eligible(), 1);
        assert_eq!(row.de.counts.false_negatives, 0);
        assert_abs_diff_eq!(row.de.recall, 1.0);
        assert_eq!(row.marker.n_eligible(), 1);
        assert_abs_diff_eq!(row.marker.recall, 1.0);
    }
}
