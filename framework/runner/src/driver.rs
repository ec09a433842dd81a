use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use indicatif::ProgressBar;
use parking_lot::Mutex;
use schedsim_sweep_model::{
    append_sweep_summary, BlockLayout, InvocationFailure, LogParser, MissingSlot,
    NormalizationRule, PointOutcome, PointSummary, Slot, SweepAxis, SweepIntegrityError,
    SweepPoint, SweepResult, SweepResultBuilder, SweepStatus, SweepSummary,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::SweepError;
use crate::invocation::{invoke, SimulatorFlags};
use crate::shutdown::{ShutdownHandle, ShutdownListener};

/// Everything the driver needs to invoke the simulator.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub simulator: PathBuf,
    pub flags: SimulatorFlags,
    /// Passed to every invocation after the point's flags
    pub extra_args: Vec<String>,
    /// Maximum number of simulator processes running at once, across all sweeps
    pub parallelism: usize,
    pub timeout: Option<Duration>,
    pub output_dir: PathBuf,
}

impl DriverConfig {
    pub fn new(simulator: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            simulator: simulator.into(),
            flags: SimulatorFlags::default(),
            extra_args: Vec::new(),
            parallelism: 1,
            timeout: None,
            output_dir: output_dir.into(),
        }
    }

    fn args_for(&self, point: &SweepPoint) -> Vec<String> {
        let mut args = self.flags.args(point);
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// Output destinations claimed so far by any sweep sharing this registry.
#[derive(Debug, Default)]
pub struct DestinationRegistry {
    claimed: Mutex<HashSet<PathBuf>>,
}

impl DestinationRegistry {
    /// Claim `destination` for `point`. Two invocations may never write the same file.
    pub fn claim(&self, destination: &Path, point: &SweepPoint) -> Result<(), SweepIntegrityError> {
        self.claim_all([(destination, point)])
    }

    /// Claim every destination or none of them.
    ///
    /// Nothing is registered when one of the destinations is already taken, or appears twice.
    pub fn claim_all<'a>(
        &self,
        claims: impl IntoIterator<Item = (&'a Path, &'a SweepPoint)>,
    ) -> Result<(), SweepIntegrityError> {
        let mut claimed = self.claimed.lock();
        let mut pending = HashSet::new();
        for (destination, point) in claims {
            if claimed.contains(destination) || !pending.insert(destination.to_path_buf()) {
                return Err(SweepIntegrityError::DuplicateDestination {
                    fingerprint: point.fingerprint(),
                    point: point.to_string(),
                });
            }
        }
        claimed.extend(pending);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.claimed.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.lock().is_empty()
    }
}

/// Runs axis sweeps against the simulator with bounded parallelism.
///
/// One driver is shared by every sweep of a plan so the parallelism limit and the destination
/// registry hold across all of them.
#[derive(Debug)]
pub struct SweepDriver {
    config: Arc<DriverConfig>,
    permits: Arc<Semaphore>,
    destinations: Arc<DestinationRegistry>,
    shutdown: ShutdownHandle,
    progress: Option<ProgressBar>,
}

impl SweepDriver {
    pub fn new(config: DriverConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.parallelism.max(1)));
        Self {
            config: Arc::new(config),
            permits,
            destinations: Arc::new(DestinationRegistry::default()),
            shutdown: ShutdownHandle::default(),
            progress: None,
        }
    }

    /// Cancel invocations when `shutdown` fires.
    pub fn with_shutdown(mut self, shutdown: ShutdownHandle) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Tick `progress` once per finished invocation.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn shutdown_handle(&self) -> &ShutdownHandle {
        &self.shutdown
    }

    /// Invoke the simulator once per value of `axis`, every other coordinate taken from `base`.
    ///
    /// Invocations run concurrently but the returned points are in axis order. A failed
    /// invocation only fails its own point. The sweep is rejected before anything runs if one of
    /// its output destinations is already claimed.
    pub async fn run_axis(
        &self,
        name: &str,
        base: &SweepPoint,
        axis: &SweepAxis,
    ) -> Result<SweepRun, SweepIntegrityError> {
        let points = axis.points(base);
        let points_dir = self.config.output_dir.join(name).join("points");
        let destinations = points
            .iter()
            .map(|point| points_dir.join(format!("{}.out", point.fingerprint())))
            .collect::<Vec<_>>();
        self.destinations.claim_all(
            destinations
                .iter()
                .map(PathBuf::as_path)
                .zip(points.iter()),
        )?;

        log::info!(
            "Running sweep {name} over {} with {} points",
            axis.parameter(),
            points.len()
        );

        let mut set = JoinSet::new();
        for (index, (point, destination)) in points.iter().zip(&destinations).enumerate() {
            let config = self.config.clone();
            let permits = self.permits.clone();
            let progress = self.progress.clone();
            let mut shutdown = self.shutdown.new_listener();
            let point = point.clone();
            let destination = destination.clone();
            set.spawn(async move {
                let outcome =
                    run_point(&config, &point, &destination, &permits, &mut shutdown).await;
                if let Err(cause) = &outcome {
                    log::warn!("Invocation for {point} failed: {cause}");
                }
                if let Some(progress) = progress {
                    progress.inc(1);
                }
                (index, outcome)
            });
        }

        let mut outcomes: Vec<Option<Result<String, InvocationFailure>>> =
            vec![None; points.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(e) => log::error!("Invocation task for sweep {name} did not complete: {e:?}"),
            }
        }

        let points = points
            .into_iter()
            .zip(destinations)
            .zip(outcomes)
            .map(|((point, destination), outcome)| PointRun {
                point,
                destination,
                outcome: outcome.unwrap_or_else(|| {
                    Err(InvocationFailure::Io {
                        message: "invocation task did not complete".to_string(),
                    })
                }),
            })
            .collect();

        Ok(SweepRun {
            name: name.to_string(),
            axis: axis.clone(),
            base: base.clone(),
            points,
        })
    }
}

async fn run_point(
    config: &DriverConfig,
    point: &SweepPoint,
    destination: &Path,
    permits: &Semaphore,
    shutdown: &mut ShutdownListener,
) -> Result<String, InvocationFailure> {
    let _permit = tokio::select! {
        permit = permits.acquire() => permit.map_err(|_| InvocationFailure::Cancelled)?,
        _ = shutdown.wait_for_shutdown() => return Err(InvocationFailure::Cancelled),
    };
    if shutdown.should_shutdown() {
        return Err(InvocationFailure::Cancelled);
    }

    let args = config.args_for(point);
    log::debug!("Invoking {} {}", config.simulator.display(), args.join(" "));
    let stdout = invoke(&config.simulator, &args, config.timeout, shutdown).await?;

    let io_failure = |e: std::io::Error| InvocationFailure::Io {
        message: format!("{}: {e}", destination.display()),
    };
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_failure)?;
    }
    tokio::fs::write(destination, &stdout)
        .await
        .map_err(io_failure)?;

    Ok(stdout)
}

/// The outcome of one point of a [SweepRun].
#[derive(Debug, Clone)]
pub struct PointRun {
    pub point: SweepPoint,
    /// Where the captured stdout was written
    pub destination: PathBuf,
    /// Captured stdout, or why there is none
    pub outcome: Result<String, InvocationFailure>,
}

/// Raw outcomes of one executed axis sweep, in axis order.
#[derive(Debug, Clone)]
pub struct SweepRun {
    name: String,
    axis: SweepAxis,
    base: SweepPoint,
    points: Vec<PointRun>,
}

/// Where and under which identity a [SweepRun] is persisted.
#[derive(Debug, Clone)]
pub struct PersistContext {
    pub output_dir: PathBuf,
    pub run_id: String,
    pub started_at: i64,
    pub normalization: NormalizationRule,
    pub layout: BlockLayout,
}

/// File name of the sweep summary log inside the output directory.
pub const SWEEP_SUMMARY_FILE: &str = "sweep_summary.jsonl";

impl SweepRun {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn axis(&self) -> &SweepAxis {
        &self.axis
    }

    pub fn base(&self) -> &SweepPoint {
        &self.base
    }

    pub fn points(&self) -> &[PointRun] {
        &self.points
    }

    pub fn status(&self) -> SweepStatus {
        let failed = self.points.iter().filter(|p| p.outcome.is_err()).count();
        if failed == 0 {
            SweepStatus::Complete
        } else {
            SweepStatus::PartiallyFailed {
                failed,
                total: self.points.len(),
            }
        }
    }

    /// Parse every captured output into a [SweepResult].
    ///
    /// Each succeeded invocation must print exactly one block. Failed invocations become missing
    /// slots. A malformed output fails the whole sweep.
    pub fn into_result(&self, parser: &LogParser) -> Result<SweepResult, SweepError> {
        let integrity = |source| SweepError::Integrity {
            sweep: self.name.clone(),
            source,
        };

        let mut builder =
            SweepResultBuilder::new(self.name.clone(), self.axis.clone(), self.base.clone());
        for run in &self.points {
            let slot = match &run.outcome {
                Ok(stdout) => {
                    let parser = parser
                        .clone()
                        .with_origin(run.destination.display().to_string());
                    let mut records =
                        parser
                            .parse_all(stdout)
                            .map_err(|source| SweepError::Parse {
                                sweep: self.name.clone(),
                                axis: self.axis.parameter(),
                                point: run.point.clone(),
                                source,
                            })?;
                    if records.len() != 1 {
                        return Err(integrity(SweepIntegrityError::UnexpectedBlockCount {
                            point: run.point.to_string(),
                            found: records.len(),
                        }));
                    }
                    Slot::Record(records.remove(0))
                }
                Err(cause) => Slot::Missing(MissingSlot {
                    point: run.point.clone(),
                    cause: cause.clone(),
                }),
            };
            builder.push(slot);
        }

        builder.build().map_err(integrity)
    }

    /// Write `<output_dir>/<name>.dat` and append this sweep's summary to the summary log.
    ///
    /// The data file holds the outputs of the succeeded points concatenated in axis order. The
    /// summary records which points those were.
    pub fn persist(&self, context: &PersistContext) -> anyhow::Result<SweepSummary> {
        std::fs::create_dir_all(&context.output_dir).with_context(|| {
            format!(
                "Failed to create output directory {}",
                context.output_dir.display()
            )
        })?;

        let data_file = PathBuf::from(format!("{}.dat", self.name));
        let mut contents = String::new();
        for stdout in self.points.iter().filter_map(|p| p.outcome.as_ref().ok()) {
            contents.push_str(stdout);
            if !stdout.ends_with('\n') {
                contents.push('\n');
            }
        }
        let data_path = context.output_dir.join(&data_file);
        std::fs::write(&data_path, contents)
            .with_context(|| format!("Failed to write sweep output {}", data_path.display()))?;

        let summary = SweepSummary {
            run_id: context.run_id.clone(),
            sweep_name: self.name.clone(),
            started_at: context.started_at,
            normalization: context.normalization,
            layout: context.layout.clone(),
            axis: self.axis.clone(),
            base: self.base.clone(),
            data_file,
            points: self
                .points
                .iter()
                .map(|run| PointSummary {
                    point: run.point.clone(),
                    outcome: match &run.outcome {
                        Ok(_) => PointOutcome::Succeeded,
                        Err(cause) => PointOutcome::Failed {
                            cause: cause.clone(),
                        },
                    },
                })
                .collect(),
            harness_version: env!("CARGO_PKG_VERSION").to_string(),
        };
        append_sweep_summary(
            &summary,
            &context.output_dir.join(SWEEP_SUMMARY_FILE),
        )
        .context("Failed to append sweep summary")?;

        log::info!(
            "Wrote {} ({} of {} points)",
            data_path.display(),
            summary.succeeded_count(),
            summary.points.len()
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schedsim_sweep_model::{AxisParameter, LoadDescriptor, PercentileLatency, RunRecord};

    fn sweep_run(outcomes: Vec<Result<String, InvocationFailure>>) -> SweepRun {
        let base = SweepPoint::builder().service_rate(0.2).build();
        let values = (1..=outcomes.len()).map(|i| i as f64 * 0.05).collect();
        let axis = SweepAxis::discrete(AxisParameter::ArrivalRate, values).unwrap();
        let points = axis
            .points(&base)
            .into_iter()
            .zip(outcomes)
            .map(|(point, outcome)| PointRun {
                destination: PathBuf::from(format!("{}.out", point.fingerprint())),
                point,
                outcome,
            })
            .collect();
        SweepRun {
            name: "mm1".to_string(),
            axis,
            base,
            points,
        }
    }

    fn block(lambda: f64) -> String {
        format!("lambda={lambda}\tmu=0.2\navg 10\n50 5\t90 9\t95 12\t99 20\nthroughput: {lambda}\n")
    }

    #[test]
    fn registry_rejects_second_claim() {
        let registry = DestinationRegistry::default();
        let point = SweepPoint::builder().build();
        let path = Path::new("out/mm1/points/a.out");

        registry.claim(path, &point).unwrap();
        assert!(matches!(
            registry.claim(path, &point),
            Err(SweepIntegrityError::DuplicateDestination { .. })
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn failed_claim_registers_nothing() {
        let registry = DestinationRegistry::default();
        let point = SweepPoint::builder().build();
        let taken = Path::new("out/mm1/points/b.out");
        registry.claim(taken, &point).unwrap();

        let fresh = Path::new("out/mm1/points/a.out");
        assert!(registry
            .claim_all([(fresh, &point), (taken, &point)])
            .is_err());
        assert_eq!(registry.len(), 1);
        // The destination that was free before the failed claim still is
        registry.claim(fresh, &point).unwrap();

        let repeated = Path::new("out/mm1/points/c.out");
        assert!(registry
            .claim_all([(repeated, &point), (repeated, &point)])
            .is_err());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn failed_points_become_missing_slots() {
        let run = sweep_run(vec![
            Ok(block(0.05)),
            Err(InvocationFailure::EmptyOutput),
            Ok(block(0.15)),
        ]);
        let parser = LogParser::new(BlockLayout::single_queue());

        let result = run.into_result(&parser).unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(
            result.status(),
            SweepStatus::PartiallyFailed {
                failed: 1,
                total: 3
            }
        );
        let missing = result.missing().collect::<Vec<_>>();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].0, 1);
        assert_eq!(missing[0].1.cause, InvocationFailure::EmptyOutput);

        let expected = RunRecord::new(
            0.2,
            LoadDescriptor::ArrivalRate(0.15),
            0.15,
            10.0,
            PercentileLatency::new([5.0, 9.0, 12.0, 20.0]).unwrap(),
        )
        .unwrap();
        assert_eq!(result.slots()[2].record(), Some(&expected));
    }

    #[test]
    fn more_than_one_block_per_point_is_rejected() {
        let run = sweep_run(vec![Ok(format!("{}{}", block(0.05), block(0.05)))]);
        let parser = LogParser::new(BlockLayout::single_queue());

        let err = run.into_result(&parser).unwrap_err();
        assert!(matches!(
            err,
            SweepError::Integrity {
                source: SweepIntegrityError::UnexpectedBlockCount { found: 2, .. },
                ..
            }
        ));
    }

    #[test]
    fn malformed_output_names_sweep_and_point() {
        let run = sweep_run(vec![Ok("lambda=0.05\tmu=0.2\navg 10\n".to_string())]);
        let parser = LogParser::new(BlockLayout::single_queue());

        let err = run.into_result(&parser).unwrap_err();
        match &err {
            SweepError::Parse {
                sweep, axis, point, ..
            } => {
                assert_eq!(sweep, "mm1");
                assert_eq!(*axis, AxisParameter::ArrivalRate);
                assert_eq!(point.arrival_rate(), 0.05);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().contains("mm1"));
    }

    #[test]
    fn persist_writes_only_succeeded_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let run = sweep_run(vec![
            Ok(block(0.05)),
            Err(InvocationFailure::Cancelled),
            Ok(block(0.15).trim_end().to_string()),
        ]);
        let context = PersistContext {
            output_dir: dir.path().to_path_buf(),
            run_id: "run".to_string(),
            started_at: 0,
            normalization: NormalizationRule::SingleQueue,
            layout: BlockLayout::single_queue(),
        };

        let summary = run.persist(&context).unwrap();

        let data = std::fs::read_to_string(dir.path().join("mm1.dat")).unwrap();
        assert_eq!(data, format!("{}{}", block(0.05), block(0.15)));
        assert_eq!(summary.succeeded_count(), 2);
        assert_eq!(
            summary.points[1].outcome,
            PointOutcome::Failed {
                cause: InvocationFailure::Cancelled
            }
        );

        let stored =
            schedsim_sweep_model::load_sweep_summaries(&dir.path().join(SWEEP_SUMMARY_FILE))
                .unwrap();
        assert_eq!(stored, vec![summary]);
    }
}
