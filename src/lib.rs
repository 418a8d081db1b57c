//! Single-Cell Clustering Evaluation Library
//!
//! This library scores clustering results from simulated single-cell data
//! against the known ground truth of the simulation.
//!
//! # Overview
//!
//! The library is organized into modules:
//!
//! - **data**: Core data structures (Partition, Contingency, GeneTable, MetricsTable)
//! - **compare**: Partition agreement indices (Rand, adjusted Rand, Fowlkes-Mallows, Jaccard)
//! - **classify**: DE/marker truth derivation and confusion-count scoring
//! - **evaluate**: Per-replicate evaluation, parallel aggregation and summaries
//! - **pipeline**: YAML-configured runs over replicate files
//!
//! # Example
//!
//! ```no_run
//! use scclust_eval::prelude::*;
//!
//! // Load a run configuration listing replicate files
//! let config = EvaluationConfig::from_file("evaluation.yaml").unwrap();
//!
//! // Evaluate every replicate and export one row per replicate
//! let report = run_evaluation(&config).unwrap();
//! report.table.to_tsv("metrics.tsv").unwrap();
//! println!("{}", report);
//! ```

pub mod classify;
pub mod compare;
pub mod data;
pub mod error;
pub mod evaluate;
pub mod pipeline;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::classify::{
        derive_truth, score_binary, ClassificationMetrics, ConfusionCounts, GeneTruth,
    };
    pub use crate::compare::{compare_contingency, compare_partitions, PartitionAgreement};
    pub use crate::data::{
        CellAssignments, Contingency, Delimiter, GeneRecord, GeneTable, LongRecord, Metric,
        MetricsRow, MetricsTable, PairCounts, Partition, RowStatus,
    };
    pub use crate::error::{EvalError, Result};
    pub use crate::evaluate::{
        evaluate_replicate, evaluate_replicate_flagged, evaluate_replicates, summarize_metrics,
        FailureSummary, MetricDistribution, MetricsAggregator, ReplicateInput, DEFAULT_THRESHOLD,
    };
    pub use crate::pipeline::{run_evaluation, EvaluationConfig, EvaluationReport, ReplicateSource};
}
