use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use schedsim_sweep_model::{
    InvalidMetricInput, NormalizationRule, Percentile, PointParameter, Slot, SweepIntegrityError,
    SweepResult, SweepSummary,
};
use serde::{Deserialize, Serialize};

use crate::metrics::{normalized_latency, normalized_load};

/// Which latency a series plots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricSelector {
    #[serde(rename = "avg")]
    Average,
    P50,
    P90,
    P95,
    P99,
}

impl MetricSelector {
    pub fn percentile(&self) -> Option<Percentile> {
        match self {
            MetricSelector::Average => None,
            MetricSelector::P50 => Some(Percentile::P50),
            MetricSelector::P90 => Some(Percentile::P90),
            MetricSelector::P95 => Some(Percentile::P95),
            MetricSelector::P99 => Some(Percentile::P99),
        }
    }
}

impl fmt::Display for MetricSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.percentile() {
            Some(percentile) => write!(f, "{percentile}"),
            None => f.write_str("avg"),
        }
    }
}

impl FromStr for MetricSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "avg" | "average" => Ok(MetricSelector::Average),
            "p50" => Ok(MetricSelector::P50),
            "p90" => Ok(MetricSelector::P90),
            "p95" => Ok(MetricSelector::P95),
            "p99" => Ok(MetricSelector::P99),
            _ => Err(format!("Unknown metric selector: {s}")),
        }
    }
}

/// What to do with slots that have no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Leave the point out of the series
    #[default]
    Drop,
    /// Refuse to build the series
    Abort,
}

impl FromStr for MissingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "drop" => Ok(MissingPolicy::Drop),
            "abort" => Ok(MissingPolicy::Abort),
            _ => Err(format!("Unknown missing point policy: {s}")),
        }
    }
}

/// A named, ordered list of `(x, y)` points, ready for a renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    name: String,
    points: Vec<(f64, f64)>,
}

impl Series {
    /// Pair up `xs` and `ys`. They must have the same length.
    pub fn from_xy(
        name: impl Into<String>,
        xs: Vec<f64>,
        ys: Vec<f64>,
    ) -> Result<Self, SweepIntegrityError> {
        let name = name.into();
        if xs.len() != ys.len() {
            return Err(SweepIntegrityError::LengthMismatch {
                name,
                xs: xs.len(),
                ys: ys.len(),
            });
        }

        Ok(Self {
            name,
            points: xs.into_iter().zip(ys).collect(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error("sweep `{sweep}` is missing points at indexes {indexes:?}")]
    MissingSlots { sweep: String, indexes: Vec<usize> },
    #[error("sweep `{sweep}`, point {index}: {source}")]
    InvalidMetric {
        sweep: String,
        index: usize,
        source: InvalidMetricInput,
    },
    #[error(transparent)]
    Integrity(#[from] SweepIntegrityError),
}

/// Build one series from a sweep: x is the normalised load, y the selected normalised latency.
///
/// Points stay in axis order. Missing slots are dropped or abort the series, per `policy`.
pub fn series_for_sweep(
    result: &SweepResult,
    selector: MetricSelector,
    rule: NormalizationRule,
    policy: MissingPolicy,
    name: impl Into<String>,
) -> Result<Series, AggregateError> {
    let missing = result.missing().map(|(index, _)| index).collect::<Vec<_>>();
    if !missing.is_empty() {
        match policy {
            MissingPolicy::Abort => {
                return Err(AggregateError::MissingSlots {
                    sweep: result.name().to_string(),
                    indexes: missing,
                })
            }
            MissingPolicy::Drop => log::warn!(
                "Dropping {} missing points from sweep {}: {missing:?}",
                missing.len(),
                result.name()
            ),
        }
    }

    let invalid = |index, source| AggregateError::InvalidMetric {
        sweep: result.name().to_string(),
        index,
        source,
    };
    let mut xs = Vec::with_capacity(result.len());
    let mut ys = Vec::with_capacity(result.len());
    for (index, slot) in result.slots().iter().enumerate() {
        let Slot::Record(record) = slot else {
            continue;
        };
        xs.push(normalized_load(record, rule).map_err(|e| invalid(index, e))?);
        ys.push(normalized_latency(record, selector).map_err(|e| invalid(index, e))?);
    }

    Ok(Series::from_xy(name, xs, ys)?)
}

/// One series per sweep, for sweeps that only differ in `parameter`.
///
/// Series are named `<parameter>=<value> <selector>` and keep the order of `results`.
pub fn compare_series(
    parameter: PointParameter,
    results: &[SweepResult],
    selector: MetricSelector,
    rule: NormalizationRule,
    policy: MissingPolicy,
) -> Result<Vec<Series>, AggregateError> {
    let mut names = HashSet::new();
    results
        .iter()
        .map(|result| {
            let name = format!(
                "{parameter}={} {selector}",
                result.base().coordinate_label(parameter)
            );
            if !names.insert(name.clone()) {
                return Err(SweepIntegrityError::DuplicateSeriesName(name).into());
            }
            series_for_sweep(result, selector, rule, policy, name)
        })
        .collect()
}

/// Group summaries whose sweeps agree on everything except `parameter`.
///
/// Only groups of two or more sweeps are returned. Each group is ordered by the value of
/// `parameter`, and groups by the name of their first sweep.
pub fn group_for_comparison(
    summaries: Vec<SweepSummary>,
    parameter: PointParameter,
) -> Vec<Vec<SweepSummary>> {
    summaries
        .into_iter()
        .into_group_map_by(|summary| {
            (
                summary.axis.parameter(),
                summary
                    .axis
                    .values()
                    .iter()
                    .map(|v| v.to_bits())
                    .collect::<Vec<_>>(),
                summary.normalization,
                summary.base.without_coordinate(parameter).fingerprint(),
            )
        })
        .into_values()
        .filter(|group| group.len() > 1)
        .map(|mut group| {
            group.sort_by(|a, b| compare_coordinate(a, b, parameter));
            group
        })
        .sorted_by(|a, b| a[0].sweep_name.cmp(&b[0].sweep_name))
        .collect()
}

fn compare_coordinate(a: &SweepSummary, b: &SweepSummary, parameter: PointParameter) -> Ordering {
    match parameter {
        PointParameter::Axis(axis) => a
            .base
            .axis_value(axis)
            .partial_cmp(&b.base.axis_value(axis))
            .unwrap_or(Ordering::Equal),
        _ => a
            .base
            .coordinate_label(parameter)
            .cmp(&b.base.coordinate_label(parameter)),
    }
}
