//! Pair-counting agreement indices between a ground-truth and a predicted partition.
//!
//! All five indices come from one contingency table, so they always agree on
//! how pairs were classified. Undefined values (zero denominators) are NaN.

use crate::data::partition::{Contingency, Partition};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Agreement between two partitions of the same items.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartitionAgreement {
    /// Fraction of item pairs on which both partitions agree.
    pub rand: f64,
    /// Hubert-Arabie adjusted Rand index.
    pub adjusted_rand: f64,
    /// Morey-Agresti adjusted Rand index.
    pub morey_agresti: f64,
    /// Fowlkes-Mallows index.
    pub fowlkes_mallows: f64,
    /// Jaccard index over same-group pairs.
    pub jaccard: f64,
}

impl PartitionAgreement {
    /// All indices undefined.
    pub fn undefined() -> Self {
        Self {
            rand: f64::NAN,
            adjusted_rand: f64::NAN,
            morey_agresti: f64::NAN,
            fowlkes_mallows: f64::NAN,
            jaccard: f64::NAN,
        }
    }

    /// Indices in export order.
    pub fn values(&self) -> [f64; 5] {
        [
            self.rand,
            self.adjusted_rand,
            self.morey_agresti,
            self.fowlkes_mallows,
            self.jaccard,
        ]
    }

    /// Check if any index is undefined.
    pub fn has_missing(&self) -> bool {
        self.values().iter().any(|v| v.is_nan())
    }
}

impl std::fmt::Display for PartitionAgreement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Partition agreement:")?;
        writeln!(f, "  Rand:            {:.4}", self.rand)?;
        writeln!(f, "  Adjusted Rand:   {:.4}", self.adjusted_rand)?;
        writeln!(f, "  Morey-Agresti:   {:.4}", self.morey_agresti)?;
        writeln!(f, "  Fowlkes-Mallows: {:.4}", self.fowlkes_mallows)?;
        writeln!(f, "  Jaccard:         {:.4}", self.jaccard)?;
        Ok(())
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        f64::NAN
    } else {
        num / den
    }
}

/// Compare a predicted partition against the ground truth.
///
/// Fails only on shape errors (different item counts, zero items). A single
/// item, or a partition placing everything in one group, is valid input and
/// produces NaN for the indices it leaves undefined.
pub fn compare_partitions(truth: &Partition, predicted: &Partition) -> Result<PartitionAgreement> {
    let table = Contingency::build(truth, predicted)?;
    Ok(compare_contingency(&table))
}

/// Derive all agreement indices from a prebuilt contingency table.
pub fn compare_contingency(table: &Contingency) -> PartitionAgreement {
    let pairs = table.pair_counts();
    let total = pairs.total as f64;
    let same_both = pairs.same_both as f64;
    let same_truth = pairs.same_truth as f64;
    let same_predicted = pairs.same_predicted as f64;

    // Agreements = pairs together in both + pairs apart in both.
    let agreements = pairs.same_both + pairs.different_both();
    let rand = ratio(agreements as f64, total);

    // Hubert-Arabie: chance expectation from the C(., 2) marginals.
    let expected = ratio(same_truth * same_predicted, total);
    let max_index = 0.5 * (same_truth + same_predicted);
    let adjusted_rand = if total == 0.0 {
        f64::NAN
    } else {
        ratio(same_both - expected, max_index - expected)
    };

    // Morey-Agresti: the same correction with sums of squares.
    let n_sq = (table.n() as f64).powi(2);
    let (cell_sq, row_sq, col_sq) = table.square_sums();
    let expected_sq = row_sq * col_sq / n_sq;
    let morey_agresti = if total == 0.0 {
        f64::NAN
    } else {
        ratio(cell_sq - expected_sq, 0.5 * (row_sq + col_sq) - expected_sq)
    };

    let fowlkes_mallows = ratio(same_both, (same_truth * same_predicted).sqrt());
    let jaccard = ratio(same_both, same_truth + same_predicted - same_both);

    PartitionAgreement {
        rand,
        adjusted_rand,
        morey_agresti,
        fowlkes_mallows,
        jaccard,
    }
}
