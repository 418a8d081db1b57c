//! Per-cell ground-truth groups and predicted clusters.

use crate::data::partition::Partition;
use crate::error::{EvalError, Result};
use std::path::Path;

/// True group and predicted cluster for every cell of one replicate.
#[derive(Debug, Clone)]
pub struct CellAssignments {
    /// Cell identifiers in file order.
    pub cell_ids: Vec<String>,
    /// Simulated group labels.
    pub truth: Partition,
    /// Cluster labels reported by the clustering algorithm.
    pub predicted: Partition,
}

impl CellAssignments {
    /// Build from parallel label vectors.
    pub fn new(cell_ids: Vec<String>, truth: Partition, predicted: Partition) -> Result<Self> {
        if truth.n_items() != cell_ids.len() {
            return Err(EvalError::length_mismatch(
                "truth labels",
                cell_ids.len(),
                truth.n_items(),
            ));
        }
        if predicted.n_items() != cell_ids.len() {
            return Err(EvalError::length_mismatch(
                "predicted labels",
                cell_ids.len(),
                predicted.n_items(),
            ));
        }
        Ok(Self {
            cell_ids,
            truth,
            predicted,
        })
    }

    /// Number of cells.
    pub fn n_cells(&self) -> usize {
        self.cell_ids.len()
    }

    /// Load cell assignments from a TSV file.
    ///
    /// Expected format:
    /// - Header with `group` and `cluster` columns (any order)
    /// - Optional `cell_id` column; cells are named `cell_<row>` otherwise
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .trim(csv::Trim::All)
            .from_path(path)?;

        let headers = reader.headers()?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| EvalError::MissingColumn(name.to_string()))
        };
        let group_col = column("group")?;
        let cluster_col = column("cluster")?;
        let id_col = column("cell_id").ok();

        let mut cell_ids = Vec::new();
        let mut groups = Vec::new();
        let mut clusters = Vec::new();

        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let line = row + 2;
            let field = |col: usize, name: &str| -> Result<String> {
                match record.get(col) {
                    Some(v) if !v.is_empty() => Ok(v.to_string()),
                    _ => Err(EvalError::Parse {
                        line,
                        column: name.to_string(),
                        value: String::new(),
                        reason: "missing label".to_string(),
                    }),
                }
            };

            groups.push(field(group_col, "group")?);
            clusters.push(field(cluster_col, "cluster")?);
            cell_ids.push(match id_col {
                Some(col) => field(col, "cell_id")?,
                None => format!("cell_{}", row + 1),
            });
        }

        if cell_ids.is_empty() {
            return Err(EvalError::EmptyData("cell assignment file has no rows".to_string()));
        }

        Self::new(
            cell_ids,
            Partition::from_labels(&groups),
            Partition::from_labels(&clusters),
        )
    }
}
