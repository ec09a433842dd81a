use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use schedsim_sweep_model::{
    AxisParameter, BlockLayout, LayoutPreset, NormalizationRule, PointParameter,
    ProcessorDiscipline, ServiceDistribution, SweepAxis, SweepPoint,
};
use serde::Deserialize;

use crate::invocation::SimulatorFlags;
use crate::types::SweepRunnerResult;

/// A sweep plan, loaded from TOML.
///
/// ```toml
/// output_dir = "results"
/// parallelism = 4
///
/// [base]
/// service_rate = 0.02
///
/// [[sweep]]
/// name = "mm1_ts"
/// normalization = "single_queue"
/// base = { service = "m", discipline = "ts" }
/// axis = { parameter = "arrival_rate", start = 0.001, stop = 0.019, step = 0.0015 }
/// vary = { parameter = "quantum", values = [10, 30, 50] }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepPlan {
    pub output_dir: PathBuf,
    /// Path to the simulator, otherwise resolved from the environment
    #[serde(default)]
    pub simulator: Option<PathBuf>,
    #[serde(default)]
    pub parallelism: Option<usize>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub flags: SimulatorFlags,
    /// Passed unchanged to every invocation, e.g. `["--topo", "1"]`
    #[serde(default)]
    pub extra_args: Vec<String>,
    /// Coordinates shared by every sweep unless a sweep overrides them
    #[serde(default)]
    pub base: BasePoint,
    #[serde(rename = "sweep")]
    pub sweeps: Vec<SweepEntry>,
}

/// A partial [SweepPoint]. Unset coordinates fall back to the enclosing level.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BasePoint {
    pub arrival_rate: Option<f64>,
    pub service_rate: Option<f64>,
    pub service: Option<ServiceDistribution>,
    pub discipline: Option<ProcessorDiscipline>,
    pub quantum: Option<f64>,
    pub context_switch_cost: Option<f64>,
    pub cores: Option<u32>,
    pub duration: Option<f64>,
}

impl BasePoint {
    /// `self` with every coordinate that `other` sets replaced.
    fn overridden_by(&self, other: &BasePoint) -> BasePoint {
        BasePoint {
            arrival_rate: other.arrival_rate.or(self.arrival_rate),
            service_rate: other.service_rate.or(self.service_rate),
            service: other.service.or(self.service),
            discipline: other.discipline.or(self.discipline),
            quantum: other.quantum.or(self.quantum),
            context_switch_cost: other.context_switch_cost.or(self.context_switch_cost),
            cores: other.cores.or(self.cores),
            duration: other.duration.or(self.duration),
        }
    }

    fn build(&self) -> SweepPoint {
        let mut builder = SweepPoint::builder()
            .cores(self.cores)
            .duration(self.duration);
        if let Some(arrival_rate) = self.arrival_rate {
            builder = builder.arrival_rate(arrival_rate);
        }
        if let Some(service_rate) = self.service_rate {
            builder = builder.service_rate(service_rate);
        }
        if let Some(service) = self.service {
            builder = builder.service(service);
        }
        if let Some(discipline) = self.discipline {
            builder = builder.discipline(discipline);
        }
        if let Some(quantum) = self.quantum {
            builder = builder.quantum(quantum);
        }
        if let Some(context_switch_cost) = self.context_switch_cost {
            builder = builder.context_switch_cost(context_switch_cost);
        }
        builder.build()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepEntry {
    pub name: String,
    pub normalization: NormalizationRule,
    /// Defaults to the preset matching `normalization`
    #[serde(default)]
    pub layout: Option<LayoutSpec>,
    #[serde(default)]
    pub base: BasePoint,
    pub axis: AxisSpec,
    #[serde(default)]
    pub vary: Option<VarySpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LayoutSpec {
    Preset(LayoutPreset),
    Custom(BlockLayout),
}

/// Either an explicit list of `values` or an inclusive `start`, `stop`, `step` range.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AxisSpec {
    pub parameter: AxisParameter,
    #[serde(default)]
    pub values: Option<Vec<f64>>,
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub stop: Option<f64>,
    #[serde(default)]
    pub step: Option<f64>,
}

impl AxisSpec {
    fn build(&self) -> SweepRunnerResult<SweepAxis> {
        let axis = match (&self.values, self.start, self.stop, self.step) {
            (Some(values), None, None, None) => {
                SweepAxis::discrete(self.parameter, values.clone())?
            }
            (None, Some(start), Some(stop), Some(step)) => {
                SweepAxis::arithmetic(self.parameter, start, stop, step)?
            }
            _ => bail!("An axis needs either 'values' or all of 'start', 'stop' and 'step'"),
        };
        Ok(axis)
    }
}

/// Run the sweep once per value of a second, fixed coordinate.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VarySpec {
    pub parameter: PointParameter,
    pub values: Vec<VaryValue>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum VaryValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for VaryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VaryValue::Number(n) => write!(f, "{n}"),
            VaryValue::Text(s) => f.write_str(s),
        }
    }
}

/// One concrete axis sweep, after plan defaults and `vary` expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedSweep {
    /// Unique within the plan, also the stem of the sweep's data file
    pub name: String,
    pub normalization: NormalizationRule,
    pub layout: BlockLayout,
    pub base: SweepPoint,
    pub axis: SweepAxis,
}

impl SweepPlan {
    pub fn load(path: &Path) -> SweepRunnerResult<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read sweep plan {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid sweep plan {}", path.display()))
    }

    pub fn from_toml(content: &str) -> SweepRunnerResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Expand every entry into concrete sweeps, in plan order.
    ///
    /// An entry with `vary` becomes one sweep per value, named `<name>_<parameter>_<value>`.
    pub fn expand(&self) -> SweepRunnerResult<Vec<PlannedSweep>> {
        if self.sweeps.is_empty() {
            bail!("Sweep plan has no sweeps");
        }

        let mut planned = Vec::new();
        for entry in &self.sweeps {
            if entry.name.is_empty()
                || entry
                    .name
                    .contains(|c: char| c == '/' || c == '\\' || c.is_whitespace())
            {
                bail!(
                    "Sweep name '{}' must be non-empty and usable as a file name",
                    entry.name
                );
            }

            let axis = entry
                .axis
                .build()
                .with_context(|| format!("Invalid axis for sweep '{}'", entry.name))?;
            let base = self.base.overridden_by(&entry.base).build();
            let layout = match &entry.layout {
                Some(LayoutSpec::Preset(preset)) => preset.layout(),
                Some(LayoutSpec::Custom(layout)) => layout.clone(),
                None => match entry.normalization {
                    NormalizationRule::SingleQueue => BlockLayout::single_queue(),
                    NormalizationRule::MultiCore => BlockLayout::multi_core(),
                },
            };

            let Some(vary) = &entry.vary else {
                planned.push(PlannedSweep {
                    name: entry.name.clone(),
                    normalization: entry.normalization,
                    layout,
                    base,
                    axis,
                });
                continue;
            };

            if vary.parameter == PointParameter::Axis(axis.parameter()) {
                bail!(
                    "Sweep '{}' varies {} which is already its axis",
                    entry.name,
                    vary.parameter
                );
            }
            if vary.values.is_empty() {
                bail!("Sweep '{}' has an empty 'vary' list", entry.name);
            }
            for value in &vary.values {
                let value = value.to_string();
                let base = base
                    .with_coordinate(vary.parameter, &value)
                    .with_context(|| format!("Invalid 'vary' value for sweep '{}'", entry.name))?;
                planned.push(PlannedSweep {
                    name: format!(
                        "{}_{}_{}",
                        entry.name,
                        vary.parameter,
                        base.coordinate_label(vary.parameter)
                    ),
                    normalization: entry.normalization,
                    layout: layout.clone(),
                    base,
                    axis: axis.clone(),
                });
            }
        }

        let mut names = HashSet::new();
        for sweep in &planned {
            if !names.insert(sweep.name.as_str()) {
                bail!("Sweep name '{}' is used more than once", sweep.name);
            }
        }

        Ok(planned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PLAN: &str = r#"
output_dir = "results"
parallelism = 4
extra_args = ["--topo", "1"]

[base]
service_rate = 0.02
duration = 100000.0

[[sweep]]
name = "mm1"
normalization = "single_queue"
axis = { parameter = "arrival_rate", start = 0.001, stop = 0.019, step = 0.0015 }

[[sweep]]
name = "mm1_ts"
normalization = "single_queue"
base = { discipline = "ts", context_switch_cost = 0.5 }
axis = { parameter = "arrival_rate", values = [0.005, 0.01] }
vary = { parameter = "quantum", values = [10, 30] }

[[sweep]]
name = "cores"
normalization = "multi_core"
layout = "topology_report"
base = { arrival_rate = 0.1 }
axis = { parameter = "cores", values = [1, 2, 4, 8] }
"#;

    #[test]
    fn expands_plan_in_order() {
        let plan = SweepPlan::from_toml(PLAN).unwrap();
        assert_eq!(plan.parallelism, Some(4));
        assert_eq!(plan.flags, SimulatorFlags::default());

        let sweeps = plan.expand().unwrap();
        let names = sweeps.iter().map(|s| s.name.as_str()).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec!["mm1", "mm1_ts_quantum_10", "mm1_ts_quantum_30", "cores"]
        );

        assert_eq!(sweeps[0].axis.len(), 13);
        assert_eq!(sweeps[0].layout, BlockLayout::single_queue());
        assert_eq!(sweeps[0].base.service_rate(), 0.02);
        assert_eq!(sweeps[0].base.duration(), Some(100000.0));

        assert_eq!(sweeps[2].base.quantum(), 30.0);
        assert_eq!(sweeps[2].base.discipline(), ProcessorDiscipline::TimeSlice);
        assert_eq!(sweeps[2].base.context_switch_cost(), 0.5);

        assert_eq!(sweeps[3].layout, BlockLayout::topology_report());
        assert_eq!(sweeps[3].normalization, NormalizationRule::MultiCore);
    }

    #[test]
    fn vary_over_service_distribution() {
        let plan = SweepPlan::from_toml(
            r#"
output_dir = "results"

[[sweep]]
name = "rtc"
normalization = "single_queue"
axis = { parameter = "arrival_rate", values = [0.005] }
vary = { parameter = "service", values = ["m", "d", "lg"] }
"#,
        )
        .unwrap();

        let sweeps = plan.expand().unwrap();
        let services = sweeps.iter().map(|s| s.base.service()).collect::<Vec<_>>();
        assert_eq!(
            services,
            vec![
                ServiceDistribution::Exponential,
                ServiceDistribution::Deterministic,
                ServiceDistribution::LogNormal
            ]
        );
        assert_eq!(sweeps[1].name, "rtc_service_d");
    }

    #[test]
    fn rejects_invalid_plans() {
        let duplicate = r#"
output_dir = "results"

[[sweep]]
name = "mm1"
normalization = "single_queue"
axis = { parameter = "arrival_rate", values = [0.005] }

[[sweep]]
name = "mm1"
normalization = "single_queue"
axis = { parameter = "arrival_rate", values = [0.01] }
"#;
        assert!(SweepPlan::from_toml(duplicate).unwrap().expand().is_err());

        let half_range = r#"
output_dir = "results"

[[sweep]]
name = "mm1"
normalization = "single_queue"
axis = { parameter = "arrival_rate", start = 0.001, stop = 0.01 }
"#;
        assert!(SweepPlan::from_toml(half_range).unwrap().expand().is_err());

        let vary_axis = r#"
output_dir = "results"

[[sweep]]
name = "mm1"
normalization = "single_queue"
axis = { parameter = "quantum", values = [1, 2] }
vary = { parameter = "quantum", values = [10] }
"#;
        assert!(SweepPlan::from_toml(vary_axis).unwrap().expand().is_err());

        let unknown_field = r#"
output_dir = "results"
paralelism = 2
sweep = []
"#;
        assert!(SweepPlan::from_toml(unknown_field).is_err());
    }
}
