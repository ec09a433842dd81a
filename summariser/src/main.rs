use anyhow::anyhow;
use chrono::Utc;
use clap::Parser;
use log::debug;
use schedsim_sweep_model::{load_sweep_summaries, PointParameter};
use schedsim_summariser::aggregator::{group_for_comparison, MetricSelector, MissingPolicy};
use schedsim_summariser::model::ReportOutput;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Environment variable name to set a custom sweep summary file path
const SWEEP_SUMMARY_PATH_ENV: &str = "SWEEP_SUMMARY_PATH";
/// Default path for the sweep summary file
const DEFAULT_SWEEP_SUMMARY_PATH: &str = "sweep_summary.jsonl";

#[derive(Debug, Parser)]
#[command(version, about = "Turn persisted schedsim sweeps into plottable series")]
struct SummariserCli {
    /// Sweep summary file to read.
    ///
    /// Falls back to `SWEEP_SUMMARY_PATH`, then `sweep_summary.jsonl`.
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Latencies to plot, one series per selector
    #[arg(long, value_delimiter = ',', default_value = "avg,p50,p99")]
    selector: Vec<MetricSelector>,

    /// Also plot sweeps that only differ in this parameter side by side
    #[arg(long)]
    compare_by: Option<PointParameter>,

    /// What to do with points that failed to run: `drop` or `abort`
    #[arg(long, default_value = "drop")]
    missing: MissingPolicy,

    /// Directory to write the report to
    #[arg(long, default_value = ".")]
    report_dir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = SummariserCli::parse();
    let ignore_errors = std::env::var("IGNORE_SUMMARY_ERRORS").is_ok();

    let summary_path = cli.summary.clone().unwrap_or_else(|| {
        std::env::var(SWEEP_SUMMARY_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SWEEP_SUMMARY_PATH))
    });
    debug!("Loading summaries from {}", summary_path.display());
    let summaries = load_sweep_summaries(&summary_path)?;
    let base_dir = summary_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let latest = schedsim_summariser::filter::latest_sweep_summaries_by_name_and_config(summaries)
        .into_iter()
        .map(|(name, fingerprint, summary)| {
            debug!("Selected summary for {name} ({fingerprint}) from run {}", summary.run_id);
            summary
        })
        .collect::<Vec<_>>();

    let mut total = 0;
    let mut errors = vec![];
    let mut report = ReportOutput::default();

    for summary in &latest {
        total += 1;
        match schedsim_summariser::summarise_sweep_summary(
            summary,
            &base_dir,
            &cli.selector,
            cli.missing,
        ) {
            Ok(output) => report.summaries.push(output),
            Err(e) => errors.push(e),
        }
    }

    if let Some(parameter) = cli.compare_by {
        let groups = group_for_comparison(latest, parameter);
        if groups.is_empty() {
            log::warn!("No sweeps differ only in {parameter}, nothing to compare");
        }
        for group in groups {
            total += 1;
            match schedsim_summariser::summarise_comparison(
                &group,
                parameter,
                &base_dir,
                &cli.selector,
                cli.missing,
            ) {
                Ok(output) => report.comparisons.push(output),
                Err(e) => errors.push(e),
            }
        }
    }

    let report_path = cli.report_dir.join(format!(
        "summariser-report-{}.json",
        Utc::now().format("%Y-%m-%dT%H.%M.%S%.fZ")
    ));
    serde_json::to_writer_pretty(File::create_new(&report_path)?, &report)?;
    log::info!("Wrote report to {}", report_path.display());

    // If any of the summaries failed and errors should not explicitly be ignored, return an error
    if !errors.is_empty() {
        let error_message = format!(
            "{} out of {} summaries failed:\n{:#?}",
            errors.len(),
            total,
            errors
        );

        if ignore_errors {
            log::warn!("{error_message}");
        } else {
            return Err(anyhow!(error_message));
        }
    }

    Ok(())
}
