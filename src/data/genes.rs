//! Per-gene simulation ground truth and clustering-side DE/marker calls.

use crate::error::{EvalError, Result};
use nalgebra::DMatrix;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One gene of one replicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneRecord {
    /// Gene identifier.
    pub gene_id: String,
    /// DE factor per simulated group (1.0 = unchanged).
    pub de_factors: Vec<f64>,
    /// Whether the gene passed the clustering tool's expression filter.
    pub passed_filter: bool,
    /// Significance value of the "is DE" call, if reported.
    pub de_pvalue: Option<f64>,
    /// Significance value of the "is marker" call, if reported.
    pub marker_pvalue: Option<f64>,
}

impl GeneRecord {
    /// Create a gene record.
    pub fn new(
        gene_id: &str,
        de_factors: Vec<f64>,
        passed_filter: bool,
        de_pvalue: Option<f64>,
        marker_pvalue: Option<f64>,
    ) -> Self {
        Self {
            gene_id: gene_id.to_string(),
            de_factors,
            passed_filter,
            de_pvalue,
            marker_pvalue,
        }
    }
}

/// All genes of one replicate.
///
/// DE factors are stored as a genes x groups matrix.
#[derive(Debug, Clone)]
pub struct GeneTable {
    gene_ids: Vec<String>,
    de_factors: DMatrix<f64>,
    passed_filter: Vec<bool>,
    de_pvalues: Vec<Option<f64>>,
    marker_pvalues: Vec<Option<f64>>,
}

impl GeneTable {
    /// Create a gene table, validating shapes and DE factors.
    pub fn new(
        gene_ids: Vec<String>,
        de_factors: DMatrix<f64>,
        passed_filter: Vec<bool>,
        de_pvalues: Vec<Option<f64>>,
        marker_pvalues: Vec<Option<f64>>,
    ) -> Result<Self> {
        let n = gene_ids.len();
        if n == 0 {
            return Err(EvalError::EmptyData("gene table has no genes".to_string()));
        }
        if de_factors.ncols() == 0 {
            return Err(EvalError::EmptyData(
                "gene table has no DE factor groups".to_string(),
            ));
        }
        for (what, len) in [
            ("DE factor rows", de_factors.nrows()),
            ("filter flags", passed_filter.len()),
            ("DE p-values", de_pvalues.len()),
            ("marker p-values", marker_pvalues.len()),
        ] {
            if len != n {
                return Err(EvalError::length_mismatch(what, n, len));
            }
        }
        for i in 0..n {
            for (group, &value) in de_factors.row(i).iter().enumerate() {
                if !value.is_finite() {
                    return Err(EvalError::NonFiniteFactor {
                        gene: gene_ids[i].clone(),
                        group: group + 1,
                        value,
                    });
                }
            }
        }

        let de_pvalues = clean_pvalues(de_pvalues, &gene_ids, "DE")?;
        let marker_pvalues = clean_pvalues(marker_pvalues, &gene_ids, "marker")?;

        Ok(Self {
            gene_ids,
            de_factors,
            passed_filter,
            de_pvalues,
            marker_pvalues,
        })
    }

    /// Build a table from individual records; all must have the same group count.
    pub fn from_records(records: &[GeneRecord]) -> Result<Self> {
        let n_groups = records.first().map(|r| r.de_factors.len()).unwrap_or(0);
        let mut values = Vec::with_capacity(records.len() * n_groups);
        for record in records {
            if record.de_factors.len() != n_groups {
                return Err(EvalError::length_mismatch(
                    &format!("DE factors of gene '{}'", record.gene_id),
                    n_groups,
                    record.de_factors.len(),
                ));
            }
            values.extend_from_slice(&record.de_factors);
        }

        Self::new(
            records.iter().map(|r| r.gene_id.clone()).collect(),
            DMatrix::from_row_slice(records.len(), n_groups, &values),
            records.iter().map(|r| r.passed_filter).collect(),
            records.iter().map(|r| r.de_pvalue).collect(),
            records.iter().map(|r| r.marker_pvalue).collect(),
        )
    }

    /// Total number of genes in the dataset.
    pub fn n_genes(&self) -> usize {
        self.gene_ids.len()
    }

    /// Number of simulated groups.
    pub fn n_groups(&self) -> usize {
        self.de_factors.ncols()
    }

    /// Gene identifiers.
    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    /// The genes x groups DE factor matrix.
    pub fn de_factors(&self) -> &DMatrix<f64> {
        &self.de_factors
    }

    /// DE factors of one gene.
    pub fn factors_of(&self, gene: usize) -> Vec<f64> {
        self.de_factors.row(gene).iter().copied().collect()
    }

    /// Expression filter flags.
    pub fn passed_filter(&self) -> &[bool] {
        &self.passed_filter
    }

    /// DE call significance values.
    pub fn de_pvalues(&self) -> &[Option<f64>] {
        &self.de_pvalues
    }

    /// Marker call significance values.
    pub fn marker_pvalues(&self) -> &[Option<f64>] {
        &self.marker_pvalues
    }

    /// Materialize one gene as a record.
    pub fn record(&self, gene: usize) -> GeneRecord {
        GeneRecord {
            gene_id: self.gene_ids[gene].clone(),
            de_factors: self.factors_of(gene),
            passed_filter: self.passed_filter[gene],
            de_pvalue: self.de_pvalues[gene],
            marker_pvalue: self.marker_pvalues[gene],
        }
    }

    /// Load a gene table from a TSV file.
    ///
    /// Expected format:
    /// - Header with `passed_filter`, `de_pvalue`, `marker_pvalue` and one
    ///   `DEFacGroup<k>` column per simulated group
    /// - Optional `gene_id` column
    /// - `NA`, `NaN` or an empty cell marks a missing p-value
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
        let filter_col = column("passed_filter")?;
        let de_col = column("de_pvalue")?;
        let marker_col = column("marker_pvalue")?;
        let id_col = column("gene_id").ok();

        let factor_pattern = Regex::new(r"(?i)^DEFac(Group)?\d+$")?;
        let factor_cols: Vec<usize> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| factor_pattern.is_match(h))
            .map(|(i, _)| i)
            .collect();
        if factor_cols.is_empty() {
            return Err(EvalError::MissingColumn("DEFacGroup<k>".to_string()));
        }

        let mut gene_ids = Vec::new();
        let mut factors = Vec::new();
        let mut passed_filter = Vec::new();
        let mut de_pvalues = Vec::new();
        let mut marker_pvalues = Vec::new();

        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let line = row + 2;
            let cell = |col: usize| record.get(col).unwrap_or("");

            gene_ids.push(match id_col {
                Some(col) if !cell(col).is_empty() => cell(col).to_string(),
                _ => format!("gene_{}", row + 1),
            });
            passed_filter.push(parse_flag(cell(filter_col), line, &headers[filter_col])?);
            de_pvalues.push(parse_pvalue(cell(de_col), line, &headers[de_col])?);
            marker_pvalues.push(parse_pvalue(cell(marker_col), line, &headers[marker_col])?);
            for &col in &factor_cols {
                let raw = cell(col);
                let value: f64 = raw.parse().map_err(|_| EvalError::Parse {
                    line,
                    column: headers[col].to_string(),
                    value: raw.to_string(),
                    reason: "expected a number".to_string(),
                })?;
                factors.push(value);
            }
        }

        if gene_ids.is_empty() {
            return Err(EvalError::EmptyData("gene file has no rows".to_string()));
        }

        let de_factors = DMatrix::from_row_slice(gene_ids.len(), factor_cols.len(), &factors);
        Self::new(gene_ids, de_factors, passed_filter, de_pvalues, marker_pvalues)
    }
}

/// NaN p-values become missing; anything else outside [0, 1] is rejected.
fn clean_pvalues(
    pvalues: Vec<Option<f64>>,
    gene_ids: &[String],
    call: &str,
) -> Result<Vec<Option<f64>>> {
    pvalues
        .into_iter()
        .zip(gene_ids)
        .map(|(pvalue, gene)| match pvalue {
            Some(p) if p.is_nan() => Ok(None),
            Some(p) if !(0.0..=1.0).contains(&p) => Err(EvalError::InvalidParameter(format!(
                "{} p-value {} of gene '{}' is outside [0, 1]",
                call, p, gene
            ))),
            other => Ok(other),
        })
        .collect()
}

/// Parse a boolean expression-filter flag.
fn parse_flag(raw: &str, line: usize, column: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" => Ok(true),
        "false" | "f" | "0" | "no" => Ok(false),
        _ => Err(EvalError::Parse {
            line,
            column: column.to_string(),
            value: raw.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

/// Parse an optional significance value in [0, 1].
fn parse_pvalue(raw: &str, line: usize, column: &str) -> Result<Option<f64>> {
    if raw.is_empty() || raw.eq_ignore_ascii_case("na") || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    let invalid = |reason: &str| EvalError::Parse {
        line,
        column: column.to_string(),
        value: raw.to_string(),
        reason: reason.to_string(),
    };
    let value: f64 = raw.parse().map_err(|_| invalid("expected a number or NA"))?;
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid("significance value outside [0, 1]"));
    }
    Ok(Some(value))
}
