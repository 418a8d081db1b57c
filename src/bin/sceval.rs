//! sceval - Single-Cell Clustering Evaluation CLI
//!
//! Command-line interface for scoring simulated clustering replicates.

use clap::{Parser, Subcommand, ValueEnum};
use scclust_eval::compare::compare_partitions;
use scclust_eval::data::{CellAssignments, Delimiter, MetricsTable};
use scclust_eval::error::Result;
use scclust_eval::evaluate::{format_distributions, summarize_metrics, FailureSummary};
use scclust_eval::pipeline::{run_evaluation, write_example, EvaluationConfig, EvaluationReport};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Report output format
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Aligned text tables
    Text,
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
}

/// Single-Cell Clustering Evaluation
#[derive(Parser)]
#[command(name = "sceval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Show info-level log events
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every replicate listed in a YAML configuration
    Evaluate {
        /// Path to evaluation configuration YAML
        #[arg(short, long)]
        config: PathBuf,

        /// Output path for the per-replicate metrics table
        #[arg(short, long)]
        output: PathBuf,

        /// Also write the run summary here (.json or .yaml)
        #[arg(short, long)]
        summary: Option<PathBuf>,

        /// Format of the report printed to stdout
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Override the configured significance threshold
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Override the configured number of worker threads
        #[arg(long)]
        threads: Option<usize>,
    },

    /// Summarize a previously exported metrics table
    Summarize {
        /// Path to the metrics table (.tsv or .csv)
        #[arg(short, long)]
        input: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Write the long (replicate_id, metric, value) table here
        #[arg(short, long)]
        long: Option<PathBuf>,
    },

    /// Partition agreement for a single cell assignment file
    Compare {
        /// Path to cell assignments TSV (group, cluster)
        #[arg(short, long)]
        cells: PathBuf,
    },

    /// Write an example configuration with synthetic replicate files
    Example {
        /// Directory to write into
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Evaluate {
            config,
            output,
            summary,
            format,
            threshold,
            threads,
        } => cmd_evaluate(&config, &output, summary.as_deref(), format, threshold, threads),

        Commands::Summarize { input, format, long } => {
            cmd_summarize(&input, format, long.as_deref())
        }

        Commands::Compare { cells } => cmd_compare(&cells),

        Commands::Example { output } => cmd_example(&output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Install the stderr log subscriber; `RUST_LOG` takes precedence.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Delimiter implied by an output path, falling back to the configured one.
fn table_delimiter(path: &Path, configured: Delimiter) -> Delimiter {
    match Delimiter::for_path(path) {
        Delimiter::Comma => Delimiter::Comma,
        Delimiter::Tab => configured,
    }
}

fn print_report(report: &EvaluationReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{}", report),
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Yaml => print!("{}", report.to_yaml()?),
    }
    Ok(())
}

/// Run a full evaluation from configuration
fn cmd_evaluate(
    config_path: &Path,
    output_path: &Path,
    summary_path: Option<&Path>,
    format: OutputFormat,
    threshold: Option<f64>,
    threads: Option<usize>,
) -> Result<()> {
    eprintln!("Loading evaluation configuration from {:?}...", config_path);
    let mut config = EvaluationConfig::from_file(config_path)?;
    if let Some(t) = threshold {
        config = config.with_threshold(t);
    }
    if let Some(n) = threads {
        config = config.with_threads(n);
    }

    eprintln!(
        "Evaluating {} replicates for '{}' (threshold {})...",
        config.replicates.len(),
        config.name,
        config.significance_threshold
    );
    let report = run_evaluation(&config)?;

    eprintln!("Writing metrics table to {:?}...", output_path);
    report
        .table
        .write(output_path, table_delimiter(output_path, config.delimiter))?;

    if let Some(path) = summary_path {
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
            .unwrap_or(false);
        let contents = if is_yaml {
            report.to_yaml()?
        } else {
            report.to_json()?
        };
        std::fs::write(path, contents)?;
        eprintln!("Wrote run summary to {:?}", path);
    }

    eprintln!(
        "Done! {} replicates: {} ok, {} degraded, {} failed",
        report.summary.total, report.summary.ok, report.summary.degraded, report.summary.failed
    );
    eprintln!();
    print_report(&report, format)
}

/// Summarize an exported metrics table
fn cmd_summarize(input_path: &Path, format: OutputFormat, long_path: Option<&Path>) -> Result<()> {
    eprintln!("Loading metrics table from {:?}...", input_path);
    let table = MetricsTable::read_detected(input_path)?;
    eprintln!("Loaded {} replicates", table.len());

    if let Some(path) = long_path {
        let file = std::fs::File::create(path)?;
        table.write_long(file, Delimiter::for_path(path))?;
        eprintln!("Wrote long-format table to {:?}", path);
    }

    let distributions = summarize_metrics(&table);
    match format {
        OutputFormat::Text => {
            print!("{}", FailureSummary::from_rows(table.iter()));
            println!();
            print!("{}", format_distributions(&distributions));
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&distributions)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&distributions)?),
    }
    Ok(())
}

/// Compare simulated groups with predicted clusters for one file
fn cmd_compare(cells_path: &Path) -> Result<()> {
    eprintln!("Loading cell assignments from {:?}...", cells_path);
    let cells = CellAssignments::from_tsv(cells_path)?;
    eprintln!(
        "Loaded {} cells: {} groups, {} clusters",
        cells.n_cells(),
        cells.truth.n_groups(),
        cells.predicted.n_groups()
    );

    let agreement = compare_partitions(&cells.truth, &cells.predicted)?;
    print!("{}", agreement);
    Ok(())
}

/// Write an example configuration and data set
fn cmd_example(output_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(output_dir)?;
    let config_path = write_example(output_dir)?;

    eprintln!("Wrote example evaluation to {:?}", output_dir);
    eprintln!("Run it with: sceval evaluate --config {:?} --output metrics.tsv", config_path);
    eprintln!();
    eprintln!("Contents:");
    println!("{}", std::fs::read_to_string(&config_path)?);
    Ok(())
}
