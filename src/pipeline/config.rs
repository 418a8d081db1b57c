//! Evaluation run configuration.

use crate::data::Delimiter;
use crate::error::{EvalError, Result};
use crate::evaluate::{validate_threshold, DEFAULT_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Input files for one simulated replicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicateSource {
    /// Replicate identifier.
    pub id: usize,
    /// Cell assignment TSV (`group`, `cluster`).
    pub cells: PathBuf,
    /// Gene table TSV (filter flag, p-values, DE factors).
    pub genes: PathBuf,
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

/// Configuration of an evaluation run, loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Name of the run.
    pub name: String,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Significance threshold for DE and marker calls.
    #[serde(default = "default_threshold")]
    pub significance_threshold: f64,
    /// Worker threads; absent or 0 uses every core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_threads: Option<usize>,
    /// Separator for the exported table.
    #[serde(default)]
    pub delimiter: Delimiter,
    /// Replicates to evaluate.
    #[serde(default)]
    pub replicates: Vec<ReplicateSource>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            name: "evaluation".to_string(),
            description: None,
            significance_threshold: DEFAULT_THRESHOLD,
            n_threads: None,
            delimiter: Delimiter::Tab,
            replicates: Vec::new(),
        }
    }
}

impl EvaluationConfig {
    /// Create a config with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Set the significance threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.significance_threshold = threshold;
        self
    }

    /// Set the number of worker threads.
    pub fn with_threads(mut self, n_threads: usize) -> Self {
        self.n_threads = Some(n_threads);
        self
    }

    /// Set the table separator.
    pub fn with_delimiter(mut self, delimiter: Delimiter) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Add a replicate.
    pub fn add_replicate<P: Into<PathBuf>>(mut self, id: usize, cells: P, genes: P) -> Self {
        self.replicates.push(ReplicateSource {
            id,
            cells: cells.into(),
            genes: genes.into(),
        });
        self
    }

    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(EvalError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(EvalError::from)
    }

    /// Load from a YAML file; relative replicate paths resolve against its directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self::from_yaml(&std::fs::read_to_string(path)?)?;
        if let Some(base) = path.parent() {
            for source in &mut config.replicates {
                if source.cells.is_relative() {
                    source.cells = base.join(&source.cells);
                }
                if source.genes.is_relative() {
                    source.genes = base.join(&source.genes);
                }
            }
        }
        Ok(config)
    }

    /// Check the threshold, replicate list and id uniqueness.
    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.significance_threshold)?;
        if self.replicates.is_empty() {
            return Err(EvalError::EmptyData(
                "configuration lists no replicates".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for source in &self.replicates {
            if !seen.insert(source.id) {
                return Err(EvalError::DuplicateReplicate(source.id));
            }
        }
        Ok(())
    }

    /// Example configuration with three replicates.
    pub fn example() -> Self {
        let mut config = Self::new("example-evaluation").with_threshold(DEFAULT_THRESHOLD);
        config.description =
            Some("Clustering accuracy on simulated replicates with known groups".to_string());
        for id in 1..=3 {
            config = config.add_replicate(
                id,
                format!("replicate_{}/cells.tsv", id),
                format!("replicate_{}/genes.tsv", id),
            );
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_yaml_round_trip() {
        let config = EvaluationConfig::example().with_threads(4);
        let yaml = config.to_yaml().unwrap();
        let parsed = EvaluationConfig::from_yaml(&yaml).unwrap();

        assert_eq!(parsed.name, "example-evaluation");
        assert_eq!(parsed.replicates.len(), 3);
        assert_eq!(parsed.n_threads, Some(4));
        assert_eq!(parsed.replicates[1], config.replicates[1]);
    }

    #[test]
    fn test_defaults() {
        let yaml = "name: minimal\nreplicates:\n  - id: 1\n    cells: c.tsv\n    genes: g.tsv\n";
        let config = EvaluationConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.significance_threshold, 0.05);
        assert_eq!(config.delimiter, Delimiter::Tab);
        assert!(config.n_threads.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_comma_delimiter() {
        let yaml = "name: x\ndelimiter: comma\n";
        let config = EvaluationConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.delimiter, Delimiter::Comma);
    }

    #[test]
    fn test_validate() {
        assert!(EvaluationConfig::new("empty").validate().is_err());

        let bad_threshold = EvaluationConfig::example().with_threshold(0.0);
        assert!(bad_threshold.validate().is_err());

        let duplicated = EvaluationConfig::new("dup")
            .add_replicate(1, "a.tsv", "b.tsv")
            .add_replicate(1, "c.tsv", "d.tsv");
        assert!(matches!(
            duplicated.validate().unwrap_err(),
            EvalError::DuplicateReplicate(1)
        ));
    }

    #[test]
    fn test_from_file_resolves_relative_paths() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "name: files").unwrap();
        writeln!(file, "replicates:").unwrap();
        writeln!(file, "  - id: 1").unwrap();
        writeln!(file, "    cells: rep1/cells.tsv").unwrap();
        writeln!(file, "    genes: /abs/genes.tsv").unwrap();
        file.flush().unwrap();

        let config = EvaluationConfig::from_file(file.path()).unwrap();
        let base = file.path().parent().unwrap();
        assert_eq!(config.replicates[0].cells, base.join("rep1/cells.tsv"));
        assert_eq!(config.replicates[0].genes, PathBuf::from("/abs/genes.tsv"));
    }
}
