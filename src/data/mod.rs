//! Data structures for clustering evaluation.

pub mod cells;
pub mod genes;
pub mod metrics;
pub mod partition;

pub use cells::CellAssignments;
pub use genes::{GeneRecord, GeneTable};
pub use metrics::{Delimiter, LongRecord, Metric, MetricsRow, MetricsTable, RowStatus};
pub use partition::{Contingency, PairCounts, Partition};
