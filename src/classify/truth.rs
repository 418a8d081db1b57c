//! Ground-truth DE and marker status derived from simulated DE factors.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

/// DE factor meaning "no change" in a group.
pub const BASELINE_FACTOR: f64 = 1.0;

/// Truth labels for one gene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneTruth {
    /// At least one group differs from baseline.
    pub is_de: bool,
    /// Exactly one group differs from baseline.
    pub is_marker: bool,
}

/// Derive DE and marker truth from a gene's per-group DE factors.
///
/// Comparison against the baseline is exact: the simulator writes unchanged
/// groups as exactly 1.0.
pub fn derive_truth<I>(de_factors: I) -> GeneTruth
where
    I: IntoIterator,
    I::Item: Borrow<f64>,
{
    let n_changed = de_factors
        .into_iter()
        .filter(|f| *f.borrow() != BASELINE_FACTOR)
        .count();
    GeneTruth {
        is_de: n_changed > 0,
        is_marker: n_changed == 1,
    }
}
