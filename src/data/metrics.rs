//! Per-replicate metrics rows and the flat table they are exported as.

use crate::classify::{ClassificationMetrics, ConfusionCounts};
use crate::compare::PartitionAgreement;
use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Marker written for undefined numeric cells.
pub const MISSING: &str = "NA";

/// Field separator for exported tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    #[default]
    Tab,
    Comma,
}

impl Delimiter {
    /// Byte used by the CSV reader/writer.
    pub fn as_byte(&self) -> u8 {
        match self {
            Self::Tab => b'\t',
            Self::Comma => b',',
        }
    }

    /// Comma for `.csv` paths, tab otherwise.
    pub fn for_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Self::Comma,
            _ => Self::Tab,
        }
    }

    /// Infer the separator from a header line; `None` if it has neither.
    pub fn detect(header: &str) -> Option<Self> {
        if header.contains('\t') {
            Some(Self::Tab)
        } else if header.contains(',') {
            Some(Self::Comma)
        } else {
            None
        }
    }
}

/// Outcome of evaluating one replicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    /// Every metric is defined.
    Ok,
    /// Evaluated, but at least one metric is undefined.
    Degraded,
    /// The replicate's inputs were rejected; no metrics.
    Failed,
}

impl RowStatus {
    /// Get the descriptive name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
        }
    }

    /// Parse a status name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ok" => Some(Self::Ok),
            "degraded" => Some(Self::Degraded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// An exported per-replicate metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Rand,
    AdjustedRand,
    MoreyAgresti,
    FowlkesMallows,
    Jaccard,
    DeAccuracy,
    DeRecall,
    DePrecision,
    DeF1,
    DeFpr,
    MarkerAccuracy,
    MarkerRecall,
    MarkerPrecision,
    MarkerF1,
    MarkerFpr,
}

impl Metric {
    /// All metrics in export order.
    pub const ALL: [Metric; 15] = [
        Metric::Rand,
        Metric::AdjustedRand,
        Metric::MoreyAgresti,
        Metric::FowlkesMallows,
        Metric::Jaccard,
        Metric::DeAccuracy,
        Metric::DeRecall,
        Metric::DePrecision,
        Metric::DeF1,
        Metric::DeFpr,
        Metric::MarkerAccuracy,
        Metric::MarkerRecall,
        Metric::MarkerPrecision,
        Metric::MarkerF1,
        Metric::MarkerFpr,
    ];

    /// Column name in exported tables.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rand => "rand",
            Self::AdjustedRand => "adjusted_rand",
            Self::MoreyAgresti => "morey_agresti",
            Self::FowlkesMallows => "fowlkes_mallows",
            Self::Jaccard => "jaccard",
            Self::DeAccuracy => "de_accuracy",
            Self::DeRecall => "de_recall",
            Self::DePrecision => "de_precision",
            Self::DeF1 => "de_f1",
            Self::DeFpr => "de_fpr",
            Self::MarkerAccuracy => "marker_accuracy",
            Self::MarkerRecall => "marker_recall",
            Self::MarkerPrecision => "marker_precision",
            Self::MarkerF1 => "marker_f1",
            Self::MarkerFpr => "marker_fpr",
        }
    }

    /// Look up a metric by column name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.name() == name)
    }

    /// Value of this metric in a row.
    pub fn value(&self, row: &MetricsRow) -> f64 {
        let a = &row.agreement;
        match self {
            Self::Rand => a.rand,
            Self::AdjustedRand => a.adjusted_rand,
            Self::MoreyAgresti => a.morey_agresti,
            Self::FowlkesMallows => a.fowlkes_mallows,
            Self::Jaccard => a.jaccard,
            Self::DeAccuracy => row.de.accuracy,
            Self::DeRecall => row.de.recall,
            Self::DePrecision => row.de.precision,
            Self::DeF1 => row.de.f1,
            Self::DeFpr => row.de.fpr,
            Self::MarkerAccuracy => row.marker.accuracy,
            Self::MarkerRecall => row.marker.recall,
            Self::MarkerPrecision => row.marker.precision,
            Self::MarkerF1 => row.marker.f1,
            Self::MarkerFpr => row.marker.fpr,
        }
    }
}

/// Metrics for one replicate. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRow {
    /// Replicate identifier.
    pub replicate_id: usize,
    /// Number of cells compared.
    pub n_cells: usize,
    /// Total genes in the replicate.
    pub n_genes: usize,
    /// Clustering agreement with the simulated groups.
    pub agreement: PartitionAgreement,
    /// DE call quality.
    pub de: ClassificationMetrics,
    /// Marker call quality.
    pub marker: ClassificationMetrics,
    /// Ok / degraded / failed.
    pub status: RowStatus,
    /// Reason for a failed row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MetricsRow {
    /// Create a row for an evaluated replicate; the status is derived from the metrics.
    pub fn new(
        replicate_id: usize,
        n_cells: usize,
        n_genes: usize,
        agreement: PartitionAgreement,
        de: ClassificationMetrics,
        marker: ClassificationMetrics,
    ) -> Self {
        let degraded = agreement.has_missing() || de.has_missing() || marker.has_missing();
        Self {
            replicate_id,
            n_cells,
            n_genes,
            agreement,
            de,
            marker,
            status: if degraded {
                RowStatus::Degraded
            } else {
                RowStatus::Ok
            },
            error: None,
        }
    }

    /// Create a row for a replicate whose inputs were rejected.
    pub fn failed(replicate_id: usize, error: String) -> Self {
        Self {
            replicate_id,
            n_cells: 0,
            n_genes: 0,
            agreement: PartitionAgreement::undefined(),
            de: ClassificationMetrics::undefined(),
            marker: ClassificationMetrics::undefined(),
            status: RowStatus::Failed,
            error: Some(error),
        }
    }

    /// Metric values in export order.
    pub fn metric_values(&self) -> [f64; 15] {
        Metric::ALL.map(|m| m.value(self))
    }
}

/// Identifier, metric, count and status columns of the exported table, in order.
pub const COLUMNS: [&str; 30] = [
    "replicate_id",
    "rand",
    "adjusted_rand",
    "morey_agresti",
    "fowlkes_mallows",
    "jaccard",
    "de_accuracy",
    "de_recall",
    "de_precision",
    "de_f1",
    "de_fpr",
    "marker_accuracy",
    "marker_recall",
    "marker_precision",
    "marker_f1",
    "marker_fpr",
    "de_tp",
    "de_tn",
    "de_fp",
    "de_fn",
    "de_eligible",
    "marker_tp",
    "marker_tn",
    "marker_fp",
    "marker_fn",
    "marker_eligible",
    "n_cells",
    "n_genes",
    "status",
    "error",
];

/// Format a value so that parsing it back yields the identical `f64`.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        MISSING.to_string()
    } else {
        value.to_string()
    }
}

fn parse_value(raw: &str, line: usize, column: &str) -> Result<f64> {
    if raw.is_empty() || raw == MISSING {
        return Ok(f64::NAN);
    }
    raw.parse().map_err(|_| EvalError::Parse {
        line,
        column: column.to_string(),
        value: raw.to_string(),
        reason: "expected a number or NA".to_string(),
    })
}

fn parse_count(raw: &str, line: usize, column: &str) -> Result<usize> {
    raw.parse().map_err(|_| EvalError::Parse {
        line,
        column: column.to_string(),
        value: raw.to_string(),
        reason: "expected a non-negative integer".to_string(),
    })
}

fn count_fields(metrics: &ClassificationMetrics) -> [String; 5] {
    let c = &metrics.counts;
    [
        c.true_positives.to_string(),
        c.true_negatives.to_string(),
        c.false_positives.to_string(),
        c.false_negatives.to_string(),
        metrics.n_eligible().to_string(),
    ]
}

/// One (replicate, metric, value) observation, for distribution plots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongRecord {
    pub replicate_id: usize,
    pub metric: Metric,
    pub value: f64,
}

/// All replicate rows of an evaluation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsTable {
    rows: Vec<MetricsRow>,
}

impl MetricsTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table from rows, kept in the given order.
    pub fn from_rows(rows: Vec<MetricsRow>) -> Self {
        Self { rows }
    }

    /// Append a row.
    pub fn push(&mut self, row: MetricsRow) {
        self.rows.push(row);
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in table order.
    pub fn rows(&self) -> &[MetricsRow] {
        &self.rows
    }

    /// Row for a replicate id.
    pub fn get(&self, replicate_id: usize) -> Option<&MetricsRow> {
        self.rows.iter().find(|r| r.replicate_id == replicate_id)
    }

    /// Sort rows by replicate id.
    pub fn sort_by_id(&mut self) {
        self.rows.sort_by_key(|r| r.replicate_id);
    }

    /// Iterate over rows.
    pub fn iter(&self) -> impl Iterator<Item = &MetricsRow> {
        self.rows.iter()
    }

    /// One metric across all replicates, in row order.
    pub fn metric_values(&self, metric: Metric) -> Vec<f64> {
        self.rows.iter().map(|r| metric.value(r)).collect()
    }

    /// Number of rows with a given status.
    pub fn count_status(&self, status: RowStatus) -> usize {
        self.rows.iter().filter(|r| r.status == status).count()
    }

    /// Reshape to one record per (replicate, metric).
    pub fn to_long(&self) -> Vec<LongRecord> {
        self.rows
            .iter()
            .flat_map(|row| {
                Metric::ALL.iter().map(move |&metric| LongRecord {
                    replicate_id: row.replicate_id,
                    metric,
                    value: metric.value(row),
                })
            })
            .collect()
    }

    /// Write the flat table.
    pub fn to_writer<W: Write>(&self, writer: W, delimiter: Delimiter) -> Result<()> {
        let mut out = csv::WriterBuilder::new()
            .delimiter(delimiter.as_byte())
            .from_writer(writer);

        out.write_record(COLUMNS)?;
        for row in &self.rows {
            let mut record = Vec::with_capacity(COLUMNS.len());
            record.push(row.replicate_id.to_string());
            record.extend(row.metric_values().iter().map(|&v| format_value(v)));
            record.extend(count_fields(&row.de));
            record.extend(count_fields(&row.marker));
            record.push(row.n_cells.to_string());
            record.push(row.n_genes.to_string());
            record.push(row.status.name().to_string());
            record.push(row.error.clone().unwrap_or_default());
            out.write_record(&record)?;
        }
        out.flush()?;
        Ok(())
    }

    /// Write the flat table to a file.
    pub fn write<P: AsRef<Path>>(&self, path: P, delimiter: Delimiter) -> Result<()> {
        let file = File::create(path)?;
        self.to_writer(BufWriter::new(file), delimiter)
    }

    /// Write the flat table as TSV.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.write(path, Delimiter::Tab)
    }

    /// Write the long (replicate_id, metric, value) table.
    pub fn write_long<W: Write>(&self, writer: W, delimiter: Delimiter) -> Result<()> {
        let mut out = csv::WriterBuilder::new()
            .delimiter(delimiter.as_byte())
            .from_writer(writer);

        out.write_record(["replicate_id", "metric", "value"])?;
        for record in self.to_long() {
            out.write_record([
                record.replicate_id.to_string(),
                record.metric.name().to_string(),
                format_value(record.value),
            ])?;
        }
        out.flush()?;
        Ok(())
    }

    /// Read a flat table written by [`MetricsTable::to_writer`].
    ///
    /// Columns are matched by name; extra columns are ignored.
    pub fn from_reader<R: Read>(reader: R, delimiter: Delimiter) -> Result<Self> {
        let mut input = csv::ReaderBuilder::new()
            .delimiter(delimiter.as_byte())
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = input.headers()?.clone();
        let mut index: HashMap<&str, usize> = HashMap::new();
        for name in COLUMNS {
            let pos = headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| EvalError::MissingColumn(name.to_string()))?;
            index.insert(name, pos);
        }

        let mut rows = Vec::new();
        for (i, record) in input.records().enumerate() {
            let record = record?;
            let line = i + 2;
            let cell = |name: &str| record.get(index[name]).unwrap_or("");
            let value = |name: &str| parse_value(cell(name), line, name);
            let count = |name: &str| parse_count(cell(name), line, name);

            let agreement = PartitionAgreement {
                rand: value("rand")?,
                adjusted_rand: value("adjusted_rand")?,
                morey_agresti: value("morey_agresti")?,
                fowlkes_mallows: value("fowlkes_mallows")?,
                jaccard: value("jaccard")?,
            };

            let n_genes = count("n_genes")?;
            let classification = |prefix: &str| -> Result<ClassificationMetrics> {
                let col = |suffix: &str| format!("{}_{}", prefix, suffix);
                let counts = ConfusionCounts {
                    true_positives: count(&col("tp"))?,
                    true_negatives: count(&col("tn"))?,
                    false_positives: count(&col("fp"))?,
                    false_negatives: count(&col("fn"))?,
                };
                let eligible = count(&col("eligible"))?;
                if eligible != counts.total() {
                    return Err(EvalError::Parse {
                        line,
                        column: col("eligible"),
                        value: eligible.to_string(),
                        reason: format!("confusion counts sum to {}", counts.total()),
                    });
                }
                Ok(ClassificationMetrics {
                    counts,
                    n_total: n_genes,
                    accuracy: value(&col("accuracy"))?,
                    recall: value(&col("recall"))?,
                    precision: value(&col("precision"))?,
                    f1: value(&col("f1"))?,
                    fpr: value(&col("fpr"))?,
                })
            };
            let de = classification("de")?;
            let marker = classification("marker")?;

            let status = RowStatus::from_name(cell("status")).ok_or_else(|| EvalError::Parse {
                line,
                column: "status".to_string(),
                value: cell("status").to_string(),
                reason: "expected ok, degraded or failed".to_string(),
            })?;

            rows.push(MetricsRow {
                replicate_id: count("replicate_id")?,
                n_cells: count("n_cells")?,
                n_genes,
                agreement,
                de,
                marker,
                status,
                error: match cell("error") {
                    "" => None,
                    message => Some(message.to_string()),
                },
            });
        }

        Ok(Self { rows })
    }

    /// Read a flat table from a file.
    pub fn read<P: AsRef<Path>>(path: P, delimiter: Delimiter) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), delimiter)
    }

    /// Read a flat table, taking the separator from its header line.
    ///
    /// Falls back to the path's extension when the header is a single column.
    pub fn read_detected<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let header = text.lines().next().unwrap_or("");
        let delimiter = Delimiter::detect(header).unwrap_or_else(|| Delimiter::for_path(path));
        Self::from_reader(text.as_bytes(), delimiter)
    }

    /// Read a flat TSV table.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::read(path, Delimiter::Tab)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row(id: usize) -> MetricsRow {
        let agreement = PartitionAgreement {
            rand: 0.8125,
            adjusted_rand: 0.1 + 0.2,
            morey_agresti: 0.55,
            fowlkes_mallows: 2.0_f64.sqrt() / 3.0,
            jaccard: 1.0 / 3.0,
        };
        let de = ClassificationMetrics::from_counts(
            ConfusionCounts {
                true_positives: 3,
                true_negatives: 10,
                false_positives: 1,
                false_negatives: 2,
            },
            20,
        );
        let marker = ClassificationMetrics::from_counts(
            ConfusionCounts {
                true_positives: 0,
                true_negatives: 12,
                false_positives: 0,
                false_negatives: 0,
            },
            20,
        );
        MetricsRow::new(id, 100, 20, agreement, de, marker)
    }

    fn assert_same(a: f64, b: f64) {
        assert!(a == b || (a.is_nan() && b.is_nan()), "{} != {}", a, b);
    }

    #[test]
    fn test_status_from_metrics() {
        let row = sample_row(1);
        // Marker recall/precision are undefined without positives.
        assert_eq!(row.status, RowStatus::Degraded);

        let failed = MetricsRow::failed(2, "bad input".into());
        assert_eq!(failed.status, RowStatus::Failed);
        assert!(failed.metric_values().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_metric_names_unique() {
        for metric in Metric::ALL {
            assert_eq!(Metric::from_name(metric.name()), Some(metric));
        }
        assert_eq!(&COLUMNS[1..16], &Metric::ALL.map(|m| m.name())[..]);
    }

    #[test]
    fn test_round_trip_preserves_values() {
        let message = "Length mismatch for predicted partition: expected 4, got 2";
        let table =
            MetricsTable::from_rows(vec![sample_row(2), MetricsRow::failed(5, message.into())]);

        let mut buffer = Vec::new();
        table.to_writer(&mut buffer, Delimiter::Tab).unwrap();
        let text = String::from_utf8(buffer.clone()).unwrap();
        assert!(text.starts_with("replicate_id\trand\tadjusted_rand"));
        assert!(text.contains("\tNA\t"));

        let back = MetricsTable::from_reader(buffer.as_slice(), Delimiter::Tab).unwrap();
        assert_eq!(back.len(), 2);
        for (a, b) in table.iter().zip(back.iter()) {
            assert_eq!(a.replicate_id, b.replicate_id);
            assert_eq!(a.status, b.status);
            assert_eq!(a.de.counts, b.de.counts);
            assert_eq!(a.marker.counts, b.marker.counts);
            assert_eq!(a.error, b.error);
            for (x, y) in a.metric_values().iter().zip(b.metric_values().iter()) {
                assert_same(*x, *y);
            }
        }
    }

    #[test]
    fn test_round_trip_comma_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.csv");
        let table = MetricsTable::from_rows(vec![sample_row(1)]);

        let delimiter = Delimiter::for_path(&path);
        assert_eq!(delimiter, Delimiter::Comma);
        table.write(&path, delimiter).unwrap();

        let back = MetricsTable::read(&path, delimiter).unwrap();
        assert_same(back.rows()[0].agreement.adjusted_rand, 0.1 + 0.2);
        assert_eq!(back.rows()[0].n_cells, 100);
    }

    #[test]
    fn test_failure_message_survives_comma_file() {
        let message = "Length mismatch for predicted partition: expected 4, got 2";
        let table = MetricsTable::from_rows(vec![MetricsRow::failed(3, message.into())]);

        let mut buffer = Vec::new();
        table.to_writer(&mut buffer, Delimiter::Comma).unwrap();
        let back = MetricsTable::from_reader(buffer.as_slice(), Delimiter::Comma).unwrap();
        assert_eq!(back.rows()[0].error.as_deref(), Some(message));
        assert_eq!(back.rows()[0].status, RowStatus::Failed);
    }

    #[test]
    fn test_read_detects_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        let table = MetricsTable::from_rows(vec![sample_row(1), sample_row(2)]);

        // Comma-separated content behind a .tsv extension.
        let path = dir.path().join("metrics.tsv");
        table.write(&path, Delimiter::Comma).unwrap();
        assert!(MetricsTable::read(&path, Delimiter::for_path(&path)).is_err());

        let back = MetricsTable::read_detected(&path).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.rows()[1].replicate_id, 2);
        assert_same(back.rows()[0].agreement.adjusted_rand, 0.1 + 0.2);
        assert_same(back.rows()[0].marker.recall, f64::NAN);

        let csv_path = dir.path().join("metrics.csv");
        table.write(&csv_path, Delimiter::Tab).unwrap();
        let back = MetricsTable::read_detected(&csv_path).unwrap();
        assert_eq!(back.rows()[0].de.counts, table.rows()[0].de.counts);
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(Delimiter::detect("a\tb,c"), Some(Delimiter::Tab));
        assert_eq!(Delimiter::detect("a,b"), Some(Delimiter::Comma));
        assert_eq!(Delimiter::detect("a"), None);
    }

    #[test]
    fn test_missing_column_rejected() {
        let text = "replicate_id\trand\n1\t0.5\n";
        let err = MetricsTable::from_reader(text.as_bytes(), Delimiter::Tab).unwrap_err();
        assert!(matches!(err, EvalError::MissingColumn(_)));
    }

    #[test]
    fn test_long_format() {
        let mut table = MetricsTable::new();
        table.push(sample_row(3));
        table.push(sample_row(1));
        table.sort_by_id();

        let long = table.to_long();
        assert_eq!(long.len(), 2 * Metric::ALL.len());
        assert_eq!(long[0].replicate_id, 1);
        assert_eq!(long[0].metric, Metric::Rand);
        assert_eq!(table.metric_values(Metric::DeRecall), vec![0.6, 0.6]);

        let mut buffer = Vec::new();
        table.write_long(&mut buffer, Delimiter::Comma).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("replicate_id,metric,value\n1,rand,0.8125\n"));
        assert!(text.contains("3,marker_recall,NA\n"));
    }
}
