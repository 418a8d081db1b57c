//! Gene-level truth derivation and binary classification scoring.

pub mod confusion;
pub mod truth;

pub use confusion::{rate, score_binary, ClassificationMetrics, ConfusionCounts};
pub use truth::{derive_truth, GeneTruth, BASELINE_FACTOR};
