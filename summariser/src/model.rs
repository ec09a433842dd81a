use schedsim_sweep_model::{NormalizationRule, PointParameter, SweepStatus};
use serde::{Deserialize, Serialize};

use crate::aggregator::{MetricSelector, Series};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesOutput {
    pub name: String,
    pub selector: MetricSelector,
    /// `(normalised load, normalised latency)` in axis order
    pub points: Vec<(f64, f64)>,
}

impl SeriesOutput {
    pub fn new(series: &Series, selector: MetricSelector) -> Self {
        Self {
            name: series.name().to_string(),
            selector,
            points: series.points().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MissingPointOutput {
    pub index: usize,
    pub point: String,
    pub cause: String,
}

/// The renderer's view of one persisted sweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryOutput {
    pub sweep_name: String,
    pub run_id: String,
    pub started_at: i64,
    pub normalization: NormalizationRule,
    pub status: SweepStatus,
    pub missing: Vec<MissingPointOutput>,
    pub series: Vec<SeriesOutput>,
}

/// Sweeps that only differ in `parameter`, drawn on one plot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonOutput {
    pub parameter: PointParameter,
    pub sweeps: Vec<String>,
    pub series: Vec<SeriesOutput>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReportOutput {
    pub summaries: Vec<SummaryOutput>,
    pub comparisons: Vec<ComparisonOutput>,
}
