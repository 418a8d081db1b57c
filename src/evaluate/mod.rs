//! Per-replicate evaluation and aggregation across replicates.

pub mod aggregate;
pub mod replicate;
pub mod summary;

pub use aggregate::{evaluate_replicates, FailureSummary, MetricsAggregator};
pub use replicate::{
    evaluate_replicate, evaluate_replicate_flagged, validate_threshold, ReplicateInput,
    DEFAULT_THRESHOLD,
};
pub use summary::{format_distributions, summarize_metrics, MetricDistribution};
