//! Per-metric distributions across replicates, for reporting and plotting.

use crate::data::{Metric, MetricsTable};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics, Statistics};

/// Distribution of one metric over all replicates.
///
/// Statistics are taken over the defined (non-NaN) values only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDistribution {
    pub metric: Metric,
    /// Number of defined values.
    pub n: usize,
    /// Number of replicates where the metric was undefined.
    pub n_missing: usize,
    pub mean: f64,
    /// Sample standard deviation.
    pub sd: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl MetricDistribution {
    /// Summarize one metric's values.
    pub fn from_values(metric: Metric, values: &[f64]) -> Self {
        let finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        let n = finite.len();
        let n_missing = values.len() - n;

        if n == 0 {
            return Self {
                metric,
                n,
                n_missing,
                mean: f64::NAN,
                sd: f64::NAN,
                min: f64::NAN,
                q1: f64::NAN,
                median: f64::NAN,
                q3: f64::NAN,
                max: f64::NAN,
            };
        }

        let mean = finite.iter().mean();
        let sd = if n > 1 { finite.iter().std_dev() } else { 0.0 };
        let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let mut data = Data::new(finite);
        Self {
            metric,
            n,
            n_missing,
            mean,
            sd,
            min,
            q1: data.lower_quartile(),
            median: data.median(),
            q3: data.upper_quartile(),
            max,
        }
    }
}

/// Summarize every exported metric of a table.
pub fn summarize_metrics(table: &MetricsTable) -> Vec<MetricDistribution> {
    Metric::ALL
        .iter()
        .map(|&metric| MetricDistribution::from_values(metric, &table.metric_values(metric)))
        .collect()
}

/// Render distributions as an aligned text table.
pub fn format_distributions(distributions: &[MetricDistribution]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<18} {:>4} {:>4} {:>8} {:>8} {:>8} {:>8} {:>8}\n",
        "metric", "n", "NA", "mean", "sd", "min", "median", "max"
    ));
    for d in distributions {
        out.push_str(&format!(
            "{:<18} {:>4} {:>4} {:>8.4} {:>8.4} {:>8.4} {:>8.4} {:>8.4}\n",
            d.metric.name(),
            d.n,
            d.n_missing,
            d.mean,
            d.sd,
            d.min,
            d.median,
            d.max
        ));
    }
    out
}
