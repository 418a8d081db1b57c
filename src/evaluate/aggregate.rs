//! Evaluation of many replicates and assembly of the result table.

use crate::data::{MetricsRow, MetricsTable, RowStatus};
use crate::error::{EvalError, Result};
use crate::evaluate::replicate::{evaluate_replicate_flagged, validate_threshold, ReplicateInput};
use crate::evaluate::summary::{summarize_metrics, MetricDistribution};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

/// Counts of ok, degraded and failed replicates after a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureSummary {
    pub total: usize,
    pub ok: usize,
    pub degraded: usize,
    pub failed: usize,
    /// (replicate id, error message) for each failed replicate.
    pub failures: Vec<(usize, String)>,
}

impl FailureSummary {
    /// Tally row statuses.
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a MetricsRow>) -> Self {
        let mut summary = Self::default();
        for row in rows {
            summary.total += 1;
            match row.status {
                RowStatus::Ok => summary.ok += 1,
                RowStatus::Degraded => summary.degraded += 1,
                RowStatus::Failed => {
                    summary.failed += 1;
                    summary.failures.push((
                        row.replicate_id,
                        row.error.clone().unwrap_or_default(),
                    ));
                }
            }
        }
        summary
    }

    /// Check if every replicate produced a row with all metrics defined.
    pub fn all_ok(&self) -> bool {
        self.ok == self.total
    }
}

impl std::fmt::Display for FailureSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Replicates: {} total, {} ok, {} degraded, {} failed",
            self.total, self.ok, self.degraded, self.failed
        )?;
        for (id, error) in &self.failures {
            writeln!(f, "  replicate {}: {}", id, error)?;
        }
        Ok(())
    }
}

/// Collects one row per replicate, keyed by replicate id.
///
/// Replicates are independent: no row influences another, and the table is
/// always read back sorted by id regardless of evaluation order.
#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    threshold: f64,
    rows: BTreeMap<usize, MetricsRow>,
}

impl MetricsAggregator {
    /// Create an aggregator using the given significance threshold.
    pub fn new(threshold: f64) -> Result<Self> {
        validate_threshold(threshold)?;
        Ok(Self {
            threshold,
            rows: BTreeMap::new(),
        })
    }

    /// Significance threshold applied to DE and marker calls.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Number of collected rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Add an already evaluated row.
    pub fn insert(&mut self, row: MetricsRow) -> Result<()> {
        if self.rows.contains_key(&row.replicate_id) {
            return Err(EvalError::DuplicateReplicate(row.replicate_id));
        }
        self.rows.insert(row.replicate_id, row);
        Ok(())
    }

    /// Evaluate a single replicate and add its row.
    pub fn evaluate(&mut self, input: &ReplicateInput) -> Result<()> {
        self.insert(evaluate_replicate_flagged(input, self.threshold))
    }

    /// Evaluate replicates in parallel on the current rayon pool.
    ///
    /// Ids must be unique across `inputs` and rows already collected. A
    /// replicate with bad inputs becomes a failed row without affecting others.
    pub fn evaluate_all(&mut self, inputs: &[ReplicateInput]) -> Result<()> {
        let mut seen = HashSet::new();
        for input in inputs {
            if self.rows.contains_key(&input.replicate_id) || !seen.insert(input.replicate_id) {
                return Err(EvalError::DuplicateReplicate(input.replicate_id));
            }
        }

        let threshold = self.threshold;
        let rows: Vec<MetricsRow> = inputs
            .par_iter()
            .map(|input| evaluate_replicate_flagged(input, threshold))
            .collect();

        for row in rows {
            self.rows.insert(row.replicate_id, row);
        }
        Ok(())
    }

    /// Evaluate replicates on a dedicated pool of `n_threads` workers.
    ///
    /// `None` or zero uses the global pool (one worker per core).
    pub fn evaluate_all_with_threads(
        &mut self,
        inputs: &[ReplicateInput],
        n_threads: Option<usize>,
    ) -> Result<()> {
        match n_threads {
            Some(n) if n > 0 => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| EvalError::InvalidParameter(format!("thread pool: {}", e)))?;
                pool.install(|| self.evaluate_all(inputs))
            }
            _ => self.evaluate_all(inputs),
        }
    }

    /// Status counts over the collected rows.
    pub fn failure_summary(&self) -> FailureSummary {
        FailureSummary::from_rows(self.rows.values())
    }

    /// Per-metric distributions over the collected rows.
    pub fn distributions(&self) -> Vec<MetricDistribution> {
        summarize_metrics(&self.table())
    }

    /// Flat table sorted by replicate id.
    pub fn table(&self) -> MetricsTable {
        MetricsTable::from_rows(self.rows.values().cloned().collect())
    }

    /// Consume the aggregator, returning the table sorted by replicate id.
    pub fn into_table(self) -> MetricsTable {
        MetricsTable::from_rows(self.rows.into_values().collect())
    }
}

/// Evaluate all replicates in parallel and return the id-sorted table.
pub fn evaluate_replicates(
    inputs: &[ReplicateInput],
    threshold: f64,
    n_threads: Option<usize>,
) -> Result<MetricsTable> {
    info!(replicates = inputs.len(), threshold, "evaluating replicates");

    let mut aggregator = MetricsAggregator::new(threshold)?;
    aggregator.evaluate_all_with_threads(inputs, n_threads)?;

    let summary = aggregator.failure_summary();
    if summary.failed > 0 {
        warn!(failed = summary.failed, total = summary.total, "some replicates failed");
    }
    info!(
        ok = summary.ok,
        degraded = summary.degraded,
        failed = summary.failed,
        "evaluation finished"
    );

    Ok(aggregator.into_table())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{GeneRecord, GeneTable, Partition};

    fn replicate(id: usize, predicted: &[u32]) -> ReplicateInput {
        let genes = GeneTable::from_records(&[
            GeneRecord::new("g1", vec![1.0, 2.0], true, Some(0.01), Some(0.01)),
            GeneRecord::new("g2", vec![1.0, 1.0], true, Some(0.5), Some(0.5)),
            GeneRecord::new("g3", vec![1.5, 2.0], true, Some(0.3), Some(0.02)),
        ])
        .unwrap();
        ReplicateInput::new(
            id,
            Partition::from_labels(&[1, 1, 1, 2, 2, 2]),
            Partition::from_labels(predicted),
            genes,
        )
    }

    #[test]
    fn test_rows_sorted_by_id() {
        let inputs = vec![
            replicate(3, &[1, 1, 1, 2, 2, 2]),
            replicate(1, &[1, 1, 2, 2, 2, 2]),
            replicate(2, &[1, 2, 1, 2, 1, 2]),
        ];
        let table = evaluate_replicates(&inputs, 0.05, None).unwrap();

        let ids: Vec<usize> = table.iter().map(|r| r.replicate_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(table.get(3).unwrap().agreement.rand, 1.0);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let inputs: Vec<ReplicateInput> = (0..16)
            .map(|i| {
                let mut labels = vec![1, 1, 1, 2, 2, 2];
                labels[i % 6] = 3;
                replicate(i, &labels)
            })
            .collect();

        let mut sequential = MetricsAggregator::new(0.05).unwrap();
        for input in &inputs {
            sequential.evaluate(input).unwrap();
        }

        let parallel = evaluate_replicates(&inputs, 0.05, Some(4)).unwrap();
        assert_eq!(sequential.table().rows(), parallel.rows());
    }

    #[test]
    fn test_failed_replicate_isolated() {
        let inputs = vec![
            replicate(1, &[1, 1, 1, 2, 2, 2]),
            replicate(2, &[1, 1]),
            replicate(3, &[1, 1, 2, 2, 2, 2]),
        ];
        let mut aggregator = MetricsAggregator::new(0.05).unwrap();
        aggregator.evaluate_all(&inputs).unwrap();

        let summary = aggregator.failure_summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures[0].0, 2);
        assert!(!summary.all_ok());

        let table = aggregator.into_table();
        assert_eq!(table.get(2).unwrap().status, RowStatus::Failed);
        assert_ne!(table.get(1).unwrap().status, RowStatus::Failed);
        assert_ne!(table.get(3).unwrap().status, RowStatus::Failed);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let inputs = vec![replicate(1, &[1, 1, 1, 2, 2, 2]), replicate(1, &[1, 1, 1, 2, 2, 2])];
        let mut aggregator = MetricsAggregator::new(0.05).unwrap();
        let err = aggregator.evaluate_all(&inputs).unwrap_err();
        assert!(matches!(err, EvalError::DuplicateReplicate(1)));
        assert!(aggregator.is_empty());

        aggregator.evaluate(&inputs[0]).unwrap();
        assert!(aggregator.evaluate(&inputs[1]).is_err());
    }

    #[test]
    fn test_invalid_threshold() {
        assert!(MetricsAggregator::new(-0.1).is_err());
        assert!(evaluate_replicates(&[], 2.0, None).is_err());
    }

    #[test]
    fn test_distributions() {
        let inputs = vec![
            replicate(1, &[1, 1, 1, 2, 2, 2]),
            replicate(2, &[1, 1, 1, 2, 2, 2]),
        ];
        let mut aggregator = MetricsAggregator::new(0.05).unwrap();
        aggregator.evaluate_all(&inputs).unwrap();

        let distributions = aggregator.distributions();
        assert_eq!(distributions[0].n, 2);
        assert_eq!(distributions[0].median, 1.0);
    }
}
