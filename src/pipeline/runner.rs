//! Config-driven evaluation runs.

use crate::data::{CellAssignments, GeneTable, MetricsRow, MetricsTable};
use crate::error::{EvalError, Result};
use crate::evaluate::{
    format_distributions, summarize_metrics, FailureSummary, MetricDistribution, MetricsAggregator,
    ReplicateInput,
};
use crate::pipeline::config::{EvaluationConfig, ReplicateSource};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of an evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Run name from the configuration.
    pub name: String,
    /// Significance threshold used for calls.
    pub threshold: f64,
    /// Status counts and failure messages.
    pub summary: FailureSummary,
    /// Per-metric distributions across replicates.
    pub distributions: Vec<MetricDistribution>,
    /// One row per replicate, sorted by id.
    #[serde(skip)]
    pub table: MetricsTable,
}

impl EvaluationReport {
    /// Build a report from a finished table.
    pub fn from_table(name: &str, threshold: f64, table: MetricsTable) -> Self {
        Self {
            name: name.to_string(),
            threshold,
            summary: FailureSummary::from_rows(table.iter()),
            distributions: summarize_metrics(&table),
            table,
        }
    }

    /// Serialize the summary to JSON. Undefined statistics become `null`.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(EvalError::from)
    }

    /// Serialize the summary to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(EvalError::from)
    }
}

impl std::fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Evaluation: {}", self.name)?;
        writeln!(f, "Significance threshold: {}", self.threshold)?;
        write!(f, "{}", self.summary)?;
        writeln!(f)?;
        write!(f, "{}", format_distributions(&self.distributions))
    }
}

/// Load one replicate's files.
pub fn load_replicate(source: &ReplicateSource) -> Result<ReplicateInput> {
    debug!(replicate = source.id, cells = %source.cells.display(), "loading replicate");
    let cells = CellAssignments::from_tsv(&source.cells)?;
    let genes = GeneTable::from_tsv(&source.genes)?;
    Ok(ReplicateInput::from_cells(source.id, cells, genes))
}

/// Load every configured replicate.
///
/// A replicate whose files cannot be read or parsed becomes a failed row
/// instead of aborting the run.
pub fn load_replicates(config: &EvaluationConfig) -> (Vec<ReplicateInput>, Vec<MetricsRow>) {
    let mut inputs = Vec::with_capacity(config.replicates.len());
    let mut failed = Vec::new();
    for source in &config.replicates {
        match load_replicate(source) {
            Ok(input) => inputs.push(input),
            Err(e) => {
                warn!(replicate = source.id, error = %e, "could not load replicate");
                failed.push(MetricsRow::failed(source.id, e.to_string()));
            }
        }
    }
    (inputs, failed)
}

/// Validate the configuration, load all replicates and evaluate them in parallel.
pub fn run_evaluation(config: &EvaluationConfig) -> Result<EvaluationReport> {
    config.validate()?;
    info!(
        name = %config.name,
        replicates = config.replicates.len(),
        threshold = config.significance_threshold,
        "starting evaluation"
    );

    let (inputs, load_failures) = load_replicates(config);

    let mut aggregator = MetricsAggregator::new(config.significance_threshold)?;
    for row in load_failures {
        aggregator.insert(row)?;
    }
    aggregator.evaluate_all_with_threads(&inputs, config.n_threads)?;

    let report = EvaluationReport::from_table(
        &config.name,
        config.significance_threshold,
        aggregator.into_table(),
    );
    info!(
        ok = report.summary.ok,
        degraded = report.summary.degraded,
        failed = report.summary.failed,
        "evaluation finished"
    );
    Ok(report)
}

/// Write a small synthetic data set with a matching config into `dir`.
///
/// Returns the path of the written config.
pub fn write_example<P: AsRef<Path>>(dir: P) -> Result<PathBuf> {
    let dir = dir.as_ref();
    let config = EvaluationConfig::example();

    for source in &config.replicates {
        let cells_path = dir.join(&source.cells);
        if let Some(parent) = cells_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_example_cells(&cells_path, source.id)?;
        write_example_genes(&dir.join(&source.genes), source.id)?;
    }

    let config_path = dir.join("evaluation.yaml");
    std::fs::write(&config_path, config.to_yaml()?)?;
    Ok(config_path)
}

/// Three groups of 20 cells; replicate `id` misassigns `id` cells per group.
fn write_example_cells(path: &Path, id: usize) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "cell_id\tgroup\tcluster")?;
    for group in 0..3 {
        for cell in 0..20 {
            let cluster = if cell < id { (group + 1) % 3 } else { group };
            writeln!(
                writer,
                "cell_{}_{}\tGroup{}\t{}",
                group,
                cell,
                group + 1,
                cluster
            )?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Thirty genes: markers, shared DE genes and null genes with noisy calls.
fn write_example_genes(path: &Path, id: usize) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(
        writer,
        "gene_id\tpassed_filter\tde_pvalue\tmarker_pvalue\tDEFacGroup1\tDEFacGroup2\tDEFacGroup3"
    )?;
    for gene in 0..30 {
        let factors = match gene % 3 {
            0 => [1.0, 1.0 + 0.5 * ((gene / 3) % 2) as f64, 1.0],
            1 => [1.8, 1.0, 1.0],
            _ => [1.0, 1.0, 1.0],
        };
        // Replicate id shifts which genes receive a significant call.
        let called = (gene + id) % 4 != 0;
        let de_pvalue = if called { 0.001 * (gene + 1) as f64 } else { 0.4 };
        let marker_pvalue = if called && gene % 3 == 1 { 0.01 } else { 0.6 };
        let passed = gene % 10 != 9;
        writeln!(
            writer,
            "gene_{}\t{}\t{}\t{}\t{}\t{}\t{}",
            gene + 1,
            passed,
            de_pvalue,
            marker_pvalue,
            factors[0],
            factors[1],
            factors[2]
        )?;
    }
    writer.flush()?;
    Ok(())
}
