use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use schedsim_sweep_model::{LogParser, SweepStatus, SweepSummary};

use crate::cli::SweepCli;
use crate::config::{PlannedSweep, SweepPlan};
use crate::driver::{DriverConfig, PersistContext, PointRun, SweepDriver};
use crate::progress::start_progress;
use crate::report::print_status_table;
use crate::shutdown::start_shutdown_listener;
use crate::simulator_binary::simulator_path;
use crate::types::SweepRunnerResult;

/// What happened to one sweep of a plan.
#[derive(Debug)]
pub struct SweepReport {
    pub name: String,
    pub total_points: usize,
    /// Set when the sweep ran and was persisted
    pub summary: Option<SweepSummary>,
    /// Points that produced no record, with the reason
    pub failed_points: Vec<(String, String)>,
    /// Set when the sweep as a whole could not be run or persisted
    pub error: Option<String>,
}

impl SweepReport {
    pub fn status(&self) -> Option<SweepStatus> {
        self.summary.as_ref().map(SweepSummary::status)
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.status().is_some_and(|s| s.is_complete())
    }
}

#[derive(Debug)]
pub struct PlanReport {
    pub run_id: String,
    pub output_dir: PathBuf,
    pub sweeps: Vec<SweepReport>,
}

impl PlanReport {
    pub fn is_complete(&self) -> bool {
        self.sweeps.iter().all(SweepReport::is_complete)
    }

    pub fn incomplete_count(&self) -> usize {
        self.sweeps.iter().filter(|s| !s.is_complete()).count()
    }
}

/// Run every sweep of the plan named on the command line, then print a status table.
///
/// Partial results are always persisted. The run fails if any sweep is incomplete, unless
/// `--allow-partial` is set, or if a sweep could not be run at all.
pub fn run(cli: SweepCli) -> SweepRunnerResult<PlanReport> {
    let plan = SweepPlan::load(&cli.plan)?;
    let sweeps = plan.expand()?;

    let simulator = simulator_path(plan.simulator.as_deref())?;
    let parallelism = cli
        .parallelism
        .or(plan.parallelism)
        .unwrap_or_else(default_parallelism);
    if parallelism == 0 {
        bail!("Parallelism must be at least 1");
    }
    let config = DriverConfig {
        simulator,
        flags: plan.flags.clone(),
        extra_args: plan.extra_args.clone(),
        parallelism,
        timeout: cli.timeout_secs.or(plan.timeout_secs).map(Duration::from_secs),
        output_dir: cli.output_dir.clone().unwrap_or(plan.output_dir.clone()),
    };

    log::info!(
        "Running {} sweeps with {} using up to {} parallel invocations",
        sweeps.len(),
        config.simulator.display(),
        config.parallelism
    );

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let shutdown_handle = start_shutdown_listener(&runtime);

    let mut driver = SweepDriver::new(config).with_shutdown(shutdown_handle);
    let progress = (!cli.no_progress).then(|| {
        let total = sweeps.iter().map(|s| s.axis.len() as u64).sum();
        start_progress(total)
    });
    if let Some(progress) = &progress {
        driver = driver.with_progress(progress.clone());
    }

    let report = runtime.block_on(run_sweeps(&driver, &sweeps));
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }

    print_status_table(&report);

    if report.sweeps.iter().any(|s| s.error.is_some()) {
        bail!(
            "{} out of {} sweeps could not be completed",
            report.sweeps.iter().filter(|s| s.error.is_some()).count(),
            report.sweeps.len()
        );
    }
    if !report.is_complete() && !cli.allow_partial {
        bail!(
            "{} out of {} sweeps are missing points, results were written to {}. Pass --allow-partial to accept them",
            report.incomplete_count(),
            report.sweeps.len(),
            report.output_dir.display()
        );
    }

    Ok(report)
}

/// Run the sweeps concurrently on `driver`, then parse and persist each one.
///
/// A sweep whose output is malformed is reported but not persisted, other sweeps are unaffected.
pub async fn run_sweeps(driver: &SweepDriver, sweeps: &[PlannedSweep]) -> PlanReport {
    let run_id = nanoid::nanoid!();
    let started_at = chrono::Utc::now().timestamp();
    let output_dir = driver.config().output_dir.clone();

    let runs = futures::future::join_all(
        sweeps
            .iter()
            .map(|sweep| driver.run_axis(&sweep.name, &sweep.base, &sweep.axis)),
    )
    .await;

    let mut reports = Vec::with_capacity(sweeps.len());
    for (sweep, run) in sweeps.iter().zip(runs) {
        let mut report = SweepReport {
            name: sweep.name.clone(),
            total_points: sweep.axis.len(),
            summary: None,
            failed_points: Vec::new(),
            error: None,
        };

        let run = match run {
            Ok(run) => run,
            Err(e) => {
                log::error!("Sweep {} was not run: {e}", sweep.name);
                report.error = Some(e.to_string());
                reports.push(report);
                continue;
            }
        };
        report.failed_points = run
            .points()
            .iter()
            .filter_map(|PointRun { point, outcome, .. }| {
                outcome
                    .as_ref()
                    .err()
                    .map(|cause| (point.to_string(), cause.to_string()))
            })
            .collect();

        let parser = LogParser::new(sweep.layout.clone());
        if let Err(e) = run.into_result(&parser) {
            log::error!("{e}");
            report.error = Some(e.to_string());
            reports.push(report);
            continue;
        }

        let context = PersistContext {
            output_dir: output_dir.clone(),
            run_id: run_id.clone(),
            started_at,
            normalization: sweep.normalization,
            layout: sweep.layout.clone(),
        };
        match run.persist(&context) {
            Ok(summary) => report.summary = Some(summary),
            Err(e) => {
                log::error!("Failed to persist sweep {}: {e:?}", sweep.name);
                report.error = Some(format!("{e:#}"));
            }
        }
        reports.push(report);
    }

    PlanReport {
        run_id,
        output_dir,
        sweeps: reports,
    }
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
