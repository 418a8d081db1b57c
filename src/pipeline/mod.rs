//! Config-driven evaluation of replicate files.

mod config;
mod runner;

pub use config::{EvaluationConfig, ReplicateSource};
pub use runner::{
    load_replicate, load_replicates, run_evaluation, write_example, EvaluationReport,
};
