//! Partitions of an item set and the contingency table between two of them.

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use sprs::{CsMat, TriMat};
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

/// An assignment of items `0..n` to discrete group labels.
///
/// Labels are interned to dense codes in first-seen order; no ordering
/// between labels is implied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPartition")]
pub struct Partition {
    /// Dense group code per item.
    codes: Vec<usize>,
    /// Original label for each code.
    labels: Vec<String>,
}

/// Unchecked serialized form of a [`Partition`].
#[derive(Deserialize)]
struct RawPartition {
    codes: Vec<usize>,
    labels: Vec<String>,
}

impl TryFrom<RawPartition> for Partition {
    type Error = EvalError;

    fn try_from(raw: RawPartition) -> Result<Self> {
        if let Some(&code) = raw.codes.iter().find(|&&c| c >= raw.labels.len()) {
            return Err(EvalError::InvalidParameter(format!(
                "group code {} out of range for {} labels",
                code,
                raw.labels.len()
            )));
        }
        Ok(Self {
            codes: raw.codes,
            labels: raw.labels,
        })
    }
}

impl Partition {
    /// Build a partition from one label per item.
    pub fn from_labels<T>(labels: &[T]) -> Self
    where
        T: Eq + Hash + Clone + Display,
    {
        let mut lookup: HashMap<T, usize> = HashMap::new();
        let mut names = Vec::new();
        let codes = labels
            .iter()
            .map(|label| {
                *lookup.entry(label.clone()).or_insert_with(|| {
                    names.push(label.to_string());
                    names.len() - 1
                })
            })
            .collect();

        Self {
            codes,
            labels: names,
        }
    }

    /// Number of items.
    pub fn n_items(&self) -> usize {
        self.codes.len()
    }

    /// Number of distinct groups.
    pub fn n_groups(&self) -> usize {
        self.labels.len()
    }

    /// Check if the partition covers no items.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Dense group code per item.
    pub fn codes(&self) -> &[usize] {
        &self.codes
    }

    /// Original labels, indexed by code.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Label of a single item.
    pub fn label_of(&self, item: usize) -> Option<&str> {
        self.codes.get(item).map(|&c| self.labels[c].as_str())
    }

    /// Number of items in each group, indexed by code.
    pub fn group_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.labels.len()];
        for &c in &self.codes {
            sizes[c] += 1;
        }
        sizes
    }
}

/// Number of unordered pairs that can be drawn from `k` items.
pub(crate) fn choose2(k: u64) -> u64 {
    if k < 2 {
        0
    } else {
        k * (k - 1) / 2
    }
}

/// Pair classification shared by all agreement indices.
///
/// `same_truth` and `same_predicted` both include the `same_both` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairCounts {
    /// Σ C(n_ij, 2): pairs grouped together in both partitions.
    pub same_both: u64,
    /// Σ C(a_i, 2): pairs grouped together in the truth.
    pub same_truth: u64,
    /// Σ C(b_j, 2): pairs grouped together in the prediction.
    pub same_predicted: u64,
    /// C(n, 2).
    pub total: u64,
}

impl PairCounts {
    /// Pairs together in the truth but split by the prediction.
    pub fn truth_only(&self) -> u64 {
        self.same_truth - self.same_both
    }

    /// Pairs together in the prediction but split in the truth.
    pub fn predicted_only(&self) -> u64 {
        self.same_predicted - self.same_both
    }

    /// Pairs split in both partitions.
    pub fn different_both(&self) -> u64 {
        self.total + self.same_both - self.same_truth - self.same_predicted
    }
}

/// Sparse r x c table of items co-occurring in each (truth group, predicted group) pair.
#[derive(Debug, Clone)]
pub struct Contingency {
    /// Rows: truth groups; columns: predicted groups.
    table: CsMat<u64>,
    row_sums: Vec<u64>,
    col_sums: Vec<u64>,
    n: u64,
}

impl Contingency {
    /// Cross-tabulate two partitions over the same, identically ordered items.
    pub fn build(truth: &Partition, predicted: &Partition) -> Result<Self> {
        if truth.n_items() != predicted.n_items() {
            return Err(EvalError::length_mismatch(
                "predicted partition",
                truth.n_items(),
                predicted.n_items(),
            ));
        }
        if truth.is_empty() {
            return Err(EvalError::EmptyData(
                "cannot compare partitions of zero items".to_string(),
            ));
        }

        let shape = (truth.n_groups(), predicted.n_groups());
        let mut triplets = TriMat::with_capacity(shape, truth.n_items());
        for (&r, &c) in truth.codes().iter().zip(predicted.codes()) {
            triplets.add_triplet(r, c, 1u64);
        }
        // Duplicate triplets are summed on conversion.
        let table: CsMat<u64> = triplets.to_csr();

        let mut row_sums = vec![0u64; shape.0];
        let mut col_sums = vec![0u64; shape.1];
        for (&count, (r, c)) in table.iter() {
            row_sums[r] += count;
            col_sums[c] += count;
        }

        Ok(Self {
            table,
            row_sums,
            col_sums,
            n: truth.n_items() as u64,
        })
    }

    /// Total number of items.
    pub fn n(&self) -> u64 {
        self.n
    }

    /// Number of truth groups.
    pub fn n_rows(&self) -> usize {
        self.row_sums.len()
    }

    /// Number of predicted groups.
    pub fn n_cols(&self) -> usize {
        self.col_sums.len()
    }

    /// Truth group sizes (a_i).
    pub fn row_sums(&self) -> &[u64] {
        &self.row_sums
    }

    /// Predicted group sizes (b_j).
    pub fn col_sums(&self) -> &[u64] {
        &self.col_sums
    }

    /// Count for one cell of the table.
    pub fn get(&self, row: usize, col: usize) -> u64 {
        self.table.get(row, col).copied().unwrap_or(0)
    }

    /// Non-zero cells as `(row, col, count)`.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, u64)> + '_ {
        self.table.iter().map(|(&count, (r, c))| (r, c, count))
    }

    /// Pair counts from the cell and marginal counts.
    pub fn pair_counts(&self) -> PairCounts {
        PairCounts {
            same_both: self.cells().map(|(_, _, count)| choose2(count)).sum(),
            same_truth: self.row_sums.iter().map(|&a| choose2(a)).sum(),
            same_predicted: self.col_sums.iter().map(|&b| choose2(b)).sum(),
            total: choose2(self.n),
        }
    }

    /// Sums of squares (Σ n_ij², Σ a_i², Σ b_j²) for the Morey-Agresti correction.
    pub fn square_sums(&self) -> (f64, f64, f64) {
        let sq = |x: u64| (x as f64) * (x as f64);
        (
            self.cells().map(|(_, _, count)| sq(count)).sum(),
            self.row_sums.iter().map(|&a| sq(a)).sum(),
            self.col_sums.iter().map(|&b| sq(b)).sum(),
        )
    }
}
