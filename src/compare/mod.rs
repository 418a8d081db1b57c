//! Partition-agreement indices.

pub mod agreement;

pub use agreement::{compare_contingency, compare_partitions, PartitionAgreement};
