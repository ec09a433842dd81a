use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use schedsim_sweep_model::{InvocationFailure, SweepPoint};
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::shutdown::ShutdownListener;

/// The command line flag the simulator expects for each coordinate of a [SweepPoint].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulatorFlags {
    pub arrival_rate: String,
    pub service_rate: String,
    pub service: String,
    pub discipline: String,
    pub quantum: String,
    pub context_switch_cost: String,
    pub cores: String,
    pub duration: String,
}

impl Default for SimulatorFlags {
    fn default() -> Self {
        Self {
            arrival_rate: "--lambda".to_string(),
            service_rate: "--mu".to_string(),
            service: "--service".to_string(),
            discipline: "--processor".to_string(),
            quantum: "--quantum".to_string(),
            context_switch_cost: "--ctx-cost".to_string(),
            cores: "--cores".to_string(),
            duration: "--duration".to_string(),
        }
    }
}

impl SimulatorFlags {
    /// Flag and value pairs for `point`. Unset optional coordinates are left out so the
    /// simulator falls back to its own default.
    pub fn args(&self, point: &SweepPoint) -> Vec<String> {
        let mut args = vec![
            self.arrival_rate.clone(),
            point.arrival_rate().to_string(),
            self.service_rate.clone(),
            point.service_rate().to_string(),
            self.service.clone(),
            point.service().selector().to_string(),
            self.discipline.clone(),
            point.discipline().selector().to_string(),
            self.quantum.clone(),
            point.quantum().to_string(),
            self.context_switch_cost.clone(),
            point.context_switch_cost().to_string(),
        ];
        if let Some(cores) = point.cores() {
            args.push(self.cores.clone());
            args.push(cores.to_string());
        }
        if let Some(duration) = point.duration() {
            args.push(self.duration.clone());
            args.push(duration.to_string());
        }
        args
    }
}

/// Run the simulator once and return its stdout.
///
/// The child is killed if it outlives `timeout` or if shutdown is requested while it runs.
pub(crate) async fn invoke(
    simulator: &Path,
    args: &[String],
    timeout: Option<Duration>,
    shutdown: &mut ShutdownListener,
) -> Result<String, InvocationFailure> {
    let child = Command::new(simulator)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| InvocationFailure::Spawn {
            message: format!("{}: {e}", simulator.display()),
        })?;

    let wait = child.wait_with_output();
    let output = tokio::select! {
        output = async {
            match timeout {
                Some(after) => tokio::time::timeout(after, wait)
                    .await
                    .map_err(|_| InvocationFailure::TimedOut { after }),
                None => Ok(wait.await),
            }
        } => output?,
        _ = shutdown.wait_for_shutdown() => return Err(InvocationFailure::Cancelled),
    };
    let output = output.map_err(|e| InvocationFailure::Io {
        message: format!("failed to collect simulator output: {e}"),
    })?;

    if !output.status.success() {
        return Err(InvocationFailure::NonZeroExit {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8(output.stdout).map_err(|e| InvocationFailure::Io {
        message: format!("simulator output is not valid UTF-8: {e}"),
    })?;
    if stdout.trim().is_empty() {
        return Err(InvocationFailure::EmptyOutput);
    }

    Ok(stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use schedsim_sweep_model::{ProcessorDiscipline, ServiceDistribution};

    #[test]
    fn args_follow_point_coordinates() {
        let point = SweepPoint::builder()
            .arrival_rate(0.01)
            .service_rate(0.02)
            .service(ServiceDistribution::Deterministic)
            .discipline(ProcessorDiscipline::TimeSlice)
            .quantum(30.0)
            .build();

        assert_eq!(
            SimulatorFlags::default().args(&point),
            vec![
                "--lambda", "0.01", "--mu", "0.02", "--service", "d", "--processor", "ts",
                "--quantum", "30", "--ctx-cost", "0",
            ]
        );
    }

    #[test]
    fn optional_coordinates_are_passed_when_set() {
        let point = SweepPoint::builder()
            .cores(Some(16))
            .duration(Some(100000.0))
            .build();
        let flags = SimulatorFlags {
            cores: "-cores".to_string(),
            ..Default::default()
        };

        let args = flags.args(&point);
        assert_eq!(
            &args[args.len() - 4..],
            &["-cores", "16", "--duration", "100000"]
        );
    }
}
