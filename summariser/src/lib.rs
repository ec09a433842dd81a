use std::path::Path;

use anyhow::Context;
use schedsim_sweep_model::{PointParameter, SweepResult, SweepSummary};

use crate::aggregator::{compare_series, series_for_sweep, MetricSelector, MissingPolicy};
use crate::model::{ComparisonOutput, MissingPointOutput, SeriesOutput, SummaryOutput};

pub mod aggregator;
pub mod filter;
pub mod load;
pub mod metrics;
pub mod model;

/// Build the renderer output for one persisted sweep, one series per selector.
///
/// Series are named `<sweep> <selector>`.
pub fn summarise_sweep_summary(
    summary: &SweepSummary,
    base_dir: &Path,
    selectors: &[MetricSelector],
    policy: MissingPolicy,
) -> anyhow::Result<SummaryOutput> {
    let result = load::load_sweep_result(summary, base_dir)?;

    let series = selectors
        .iter()
        .map(|selector| {
            series_for_sweep(
                &result,
                *selector,
                summary.normalization,
                policy,
                format!("{} {selector}", summary.sweep_name),
            )
            .map(|series| SeriesOutput::new(&series, *selector))
        })
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Sweep {} summary", summary.sweep_name))?;

    Ok(SummaryOutput {
        sweep_name: summary.sweep_name.clone(),
        run_id: summary.run_id.clone(),
        started_at: summary.started_at,
        normalization: summary.normalization,
        status: result.status(),
        missing: result
            .missing()
            .map(|(index, slot)| MissingPointOutput {
                index,
                point: slot.point.to_string(),
                cause: slot.cause.to_string(),
            })
            .collect(),
        series,
    })
}

/// Build one comparison plot per selector for a group of sweeps that only differ in `parameter`.
///
/// The group must share one normalisation rule, see [aggregator::group_for_comparison].
pub fn summarise_comparison(
    group: &[SweepSummary],
    parameter: PointParameter,
    base_dir: &Path,
    selectors: &[MetricSelector],
    policy: MissingPolicy,
) -> anyhow::Result<ComparisonOutput> {
    let Some(first) = group.first() else {
        anyhow::bail!("Cannot compare an empty group of sweeps");
    };
    let results = group
        .iter()
        .map(|summary| load::load_sweep_result(summary, base_dir))
        .collect::<anyhow::Result<Vec<SweepResult>>>()?;

    let mut series = Vec::new();
    for selector in selectors {
        let compared = compare_series(
            parameter,
            &results,
            *selector,
            first.normalization,
            policy,
        )
        .with_context(|| format!("Comparison by {parameter} starting at {}", first.sweep_name))?;
        series.extend(compared.iter().map(|s| SeriesOutput::new(s, *selector)));
    }

    Ok(ComparisonOutput {
        parameter,
        sweeps: group.iter().map(|s| s.sweep_name.clone()).collect(),
        series,
    })
}
