use serde::{Deserialize, Serialize};
use sha3::Digest;
use std::fmt;
use std::str::FromStr;

use crate::axis::AxisParameter;
use crate::error::AxisError;

/// Service time distribution selector understood by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceDistribution {
    #[serde(alias = "m")]
    Exponential,
    #[serde(alias = "d")]
    Deterministic,
    #[serde(alias = "lg")]
    LogNormal,
    #[serde(alias = "b")]
    Bimodal,
}

impl ServiceDistribution {
    /// The short selector passed on the simulator command line.
    pub fn selector(&self) -> &'static str {
        match self {
            ServiceDistribution::Exponential => "m",
            ServiceDistribution::Deterministic => "d",
            ServiceDistribution::LogNormal => "lg",
            ServiceDistribution::Bimodal => "b",
        }
    }
}

impl fmt::Display for ServiceDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.selector())
    }
}

impl FromStr for ServiceDistribution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "m" | "exponential" => Ok(ServiceDistribution::Exponential),
            "d" | "deterministic" => Ok(ServiceDistribution::Deterministic),
            "lg" | "log_normal" => Ok(ServiceDistribution::LogNormal),
            "b" | "bimodal" => Ok(ServiceDistribution::Bimodal),
            _ => Err(format!("Unknown service distribution: {s}")),
        }
    }
}

/// How the simulated processor shares time between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorDiscipline {
    /// Run to completion
    #[serde(alias = "rtc")]
    RunToCompletion,
    /// Time slicing with a fixed quantum
    #[serde(alias = "ts")]
    TimeSlice,
    /// Processor sharing
    #[serde(alias = "ps")]
    ProcessorSharing,
}

impl ProcessorDiscipline {
    pub fn selector(&self) -> &'static str {
        match self {
            ProcessorDiscipline::RunToCompletion => "rtc",
            ProcessorDiscipline::TimeSlice => "ts",
            ProcessorDiscipline::ProcessorSharing => "ps",
        }
    }
}

impl fmt::Display for ProcessorDiscipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.selector())
    }
}

impl FromStr for ProcessorDiscipline {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rtc" | "run_to_completion" => Ok(ProcessorDiscipline::RunToCompletion),
            "ts" | "time_slice" => Ok(ProcessorDiscipline::TimeSlice),
            "ps" | "processor_sharing" => Ok(ProcessorDiscipline::ProcessorSharing),
            _ => Err(format!("Unknown processor discipline: {s}")),
        }
    }
}

/// Any coordinate of a [SweepPoint], including the categorical ones an axis cannot vary.
///
/// Used to hold one coordinate fixed per sweep while a family of sweeps varies it, and to group
/// those sweeps back together for comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PointParameter {
    Service,
    Discipline,
    Axis(AxisParameter),
}

impl PointParameter {
    pub fn name(&self) -> &'static str {
        match self {
            PointParameter::Service => "service",
            PointParameter::Discipline => "discipline",
            PointParameter::Axis(parameter) => parameter.name(),
        }
    }
}

impl fmt::Display for PointParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PointParameter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "service" => Ok(PointParameter::Service),
            "discipline" | "processor" => Ok(PointParameter::Discipline),
            _ => s.parse().map(PointParameter::Axis),
        }
    }
}

impl TryFrom<String> for PointParameter {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PointParameter> for String {
    fn from(value: PointParameter) -> Self {
        value.name().to_string()
    }
}

/// One coordinate in the sweep parameter space.
///
/// Points are never modified in place, [SweepPoint::with_axis_value] returns a new point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    arrival_rate: f64,
    service_rate: f64,
    service: ServiceDistribution,
    discipline: ProcessorDiscipline,
    quantum: f64,
    context_switch_cost: f64,
    cores: Option<u32>,
    duration: Option<f64>,
}

impl SweepPoint {
    pub fn builder() -> SweepPointBuilder {
        SweepPointBuilder::default()
    }

    /// λ
    pub fn arrival_rate(&self) -> f64 {
        self.arrival_rate
    }

    /// μ
    pub fn service_rate(&self) -> f64 {
        self.service_rate
    }

    pub fn service(&self) -> ServiceDistribution {
        self.service
    }

    pub fn discipline(&self) -> ProcessorDiscipline {
        self.discipline
    }

    pub fn quantum(&self) -> f64 {
        self.quantum
    }

    pub fn context_switch_cost(&self) -> f64 {
        self.context_switch_cost
    }

    pub fn cores(&self) -> Option<u32> {
        self.cores
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// The value of the coordinate that `parameter` names.
    ///
    /// An unset core count reads as `None`.
    pub fn axis_value(&self, parameter: AxisParameter) -> Option<f64> {
        match parameter {
            AxisParameter::ArrivalRate => Some(self.arrival_rate),
            AxisParameter::ServiceRate => Some(self.service_rate),
            AxisParameter::Quantum => Some(self.quantum),
            AxisParameter::ContextSwitchCost => Some(self.context_switch_cost),
            AxisParameter::Cores => self.cores.map(f64::from),
        }
    }

    /// A copy of this point with one coordinate replaced.
    ///
    /// Core counts are expected to be whole numbers, which [crate::SweepAxis] guarantees.
    pub fn with_axis_value(&self, parameter: AxisParameter, value: f64) -> SweepPoint {
        let mut point = self.clone();
        match parameter {
            AxisParameter::ArrivalRate => point.arrival_rate = value,
            AxisParameter::ServiceRate => point.service_rate = value,
            AxisParameter::Quantum => point.quantum = value,
            AxisParameter::ContextSwitchCost => point.context_switch_cost = value,
            AxisParameter::Cores => point.cores = Some(value as u32),
        }
        point
    }

    /// The value of any coordinate as text, the way it appears in file and series names.
    ///
    /// An unset core count renders as `-`.
    pub fn coordinate_label(&self, parameter: PointParameter) -> String {
        match parameter {
            PointParameter::Service => self.service.to_string(),
            PointParameter::Discipline => self.discipline.to_string(),
            PointParameter::Axis(axis) => self
                .axis_value(axis)
                .map(|value| value.to_string())
                .unwrap_or_else(|| "-".to_string()),
        }
    }

    /// A copy of this point with any coordinate replaced by a textual value.
    pub fn with_coordinate(
        &self,
        parameter: PointParameter,
        value: &str,
    ) -> Result<SweepPoint, AxisError> {
        let invalid = || AxisError::InvalidValue {
            parameter: parameter.to_string(),
            value: value.to_string(),
        };
        let mut point = self.clone();
        match parameter {
            PointParameter::Service => point.service = value.parse().map_err(|_| invalid())?,
            PointParameter::Discipline => {
                point.discipline = value.parse().map_err(|_| invalid())?
            }
            PointParameter::Axis(axis) => {
                let value = value.trim().parse::<f64>().map_err(|_| invalid())?;
                if !value.is_finite() {
                    return Err(AxisError::NonFinite);
                }
                if axis == AxisParameter::Cores && (value.fract() != 0.0 || value < 1.0) {
                    return Err(AxisError::InvalidCoreCount(value));
                }
                point = point.with_axis_value(axis, value);
            }
        }
        Ok(point)
    }

    /// This point with `parameter` reset to the builder default, so points that only differ in
    /// that coordinate compare equal.
    pub fn without_coordinate(&self, parameter: PointParameter) -> SweepPoint {
        let defaults = SweepPointBuilder::default().point;
        let mut point = self.clone();
        match parameter {
            PointParameter::Service => point.service = defaults.service,
            PointParameter::Discipline => point.discipline = defaults.discipline,
            PointParameter::Axis(AxisParameter::ArrivalRate) => {
                point.arrival_rate = defaults.arrival_rate
            }
            PointParameter::Axis(AxisParameter::ServiceRate) => {
                point.service_rate = defaults.service_rate
            }
            PointParameter::Axis(AxisParameter::Quantum) => point.quantum = defaults.quantum,
            PointParameter::Axis(AxisParameter::ContextSwitchCost) => {
                point.context_switch_cost = defaults.context_switch_cost
            }
            PointParameter::Axis(AxisParameter::Cores) => point.cores = defaults.cores,
        }
        point
    }

    /// Compute a fingerprint for this point
    ///
    /// Every coordinate contributes, so two points share a fingerprint only when they describe the
    /// same simulator invocation. Used to key output destinations.
    ///
    /// The fingerprint is computed using [sha3::Sha3_256].
    pub fn fingerprint(&self) -> String {
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, self.arrival_rate.to_bits().to_le_bytes());
        Digest::update(&mut hasher, self.service_rate.to_bits().to_le_bytes());
        Digest::update(&mut hasher, self.service.selector().as_bytes());
        Digest::update(&mut hasher, self.discipline.selector().as_bytes());
        Digest::update(&mut hasher, self.quantum.to_bits().to_le_bytes());
        Digest::update(&mut hasher, self.context_switch_cost.to_bits().to_le_bytes());
        if let Some(cores) = self.cores {
            Digest::update(&mut hasher, b"cores");
            Digest::update(&mut hasher, cores.to_le_bytes());
        }
        if let Some(duration) = self.duration {
            Digest::update(&mut hasher, b"duration");
            Digest::update(&mut hasher, duration.to_bits().to_le_bytes());
        }

        format!("{:x}", hasher.finalize())
    }
}

impl fmt::Display for SweepPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lambda={} mu={} service={} discipline={} quantum={} ctx_cost={}",
            self.arrival_rate,
            self.service_rate,
            self.service,
            self.discipline,
            self.quantum,
            self.context_switch_cost
        )?;
        if let Some(cores) = self.cores {
            write!(f, " cores={cores}")?;
        }
        Ok(())
    }
}

/// Builder for [SweepPoint], defaulting to the simulator's own defaults.
#[derive(Debug, Clone)]
pub struct SweepPointBuilder {
    point: SweepPoint,
}

impl Default for SweepPointBuilder {
    fn default() -> Self {
        Self {
            point: SweepPoint {
                arrival_rate: 0.005,
                service_rate: 0.02,
                service: ServiceDistribution::Exponential,
                discipline: ProcessorDiscipline::RunToCompletion,
                quantum: 1.0,
                context_switch_cost: 0.0,
                cores: None,
                duration: None,
            },
        }
    }
}

impl SweepPointBuilder {
    pub fn arrival_rate(mut self, arrival_rate: f64) -> Self {
        self.point.arrival_rate = arrival_rate;
        self
    }

    pub fn service_rate(mut self, service_rate: f64) -> Self {
        self.point.service_rate = service_rate;
        self
    }

    pub fn service(mut self, service: ServiceDistribution) -> Self {
        self.point.service = service;
        self
    }

    pub fn discipline(mut self, discipline: ProcessorDiscipline) -> Self {
        self.point.discipline = discipline;
        self
    }

    pub fn quantum(mut self, quantum: f64) -> Self {
        self.point.quantum = quantum;
        self
    }

    pub fn context_switch_cost(mut self, context_switch_cost: f64) -> Self {
        self.point.context_switch_cost = context_switch_cost;
        self
    }

    pub fn cores(mut self, cores: Option<u32>) -> Self {
        self.point.cores = cores;
        self
    }

    pub fn duration(mut self, duration: Option<f64>) -> Self {
        self.point.duration = duration;
        self
    }

    pub fn build(self) -> SweepPoint {
        self.point
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_for_equal_points() {
        let a = SweepPoint::builder().arrival_rate(0.01).build();
        let b = SweepPoint::builder().arrival_rate(0.01).build();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_covers_every_coordinate() {
        let base = SweepPoint::builder().build();
        let variants = [
            base.with_axis_value(AxisParameter::ArrivalRate, 0.006),
            base.with_axis_value(AxisParameter::ServiceRate, 0.03),
            base.with_axis_value(AxisParameter::Quantum, 2.0),
            base.with_axis_value(AxisParameter::ContextSwitchCost, 0.5),
            base.with_axis_value(AxisParameter::Cores, 4.0),
            SweepPoint::builder()
                .discipline(ProcessorDiscipline::TimeSlice)
                .build(),
            SweepPoint::builder()
                .service(ServiceDistribution::Deterministic)
                .build(),
            SweepPoint::builder().duration(Some(1000.0)).build(),
        ];

        for variant in &variants {
            assert_ne!(base.fingerprint(), variant.fingerprint(), "{variant}");
        }
    }

    #[test]
    fn with_axis_value_leaves_base_untouched() {
        let base = SweepPoint::builder().quantum(10.0).build();
        let moved = base.with_axis_value(AxisParameter::Quantum, 30.0);
        assert_eq!(base.quantum(), 10.0);
        assert_eq!(moved.quantum(), 30.0);
        assert_eq!(moved.axis_value(AxisParameter::Quantum), Some(30.0));
    }

    #[test]
    fn parses_selectors() {
        assert_eq!(
            "lg".parse::<ServiceDistribution>().unwrap(),
            ServiceDistribution::LogNormal
        );
        assert_eq!(
            "ps".parse::<ProcessorDiscipline>().unwrap(),
            ProcessorDiscipline::ProcessorSharing
        );
        assert!("x".parse::<ProcessorDiscipline>().is_err());
    }

    #[test]
    fn with_coordinate_parses_by_parameter() {
        let base = SweepPoint::builder().build();

        let deterministic = base
            .with_coordinate(PointParameter::Service, "d")
            .unwrap();
        assert_eq!(deterministic.service(), ServiceDistribution::Deterministic);

        let sliced = base
            .with_coordinate(PointParameter::Axis(AxisParameter::Quantum), "30")
            .unwrap();
        assert_eq!(sliced.quantum(), 30.0);
        assert_eq!(
            sliced.coordinate_label(PointParameter::Axis(AxisParameter::Quantum)),
            "30"
        );

        assert_eq!(
            base.with_coordinate(PointParameter::Axis(AxisParameter::Cores), "2.5"),
            Err(AxisError::InvalidCoreCount(2.5))
        );
        assert!(base
            .with_coordinate(PointParameter::Discipline, "fifo")
            .is_err());
    }

    #[test]
    fn without_coordinate_ignores_only_that_coordinate() {
        let a = SweepPoint::builder().quantum(10.0).build();
        let b = SweepPoint::builder().quantum(30.0).build();
        let quantum = PointParameter::Axis(AxisParameter::Quantum);
        assert_eq!(a.without_coordinate(quantum), b.without_coordinate(quantum));
        assert_ne!(
            a.without_coordinate(PointParameter::Service),
            b.without_coordinate(PointParameter::Service)
        );
    }

    #[test]
    fn point_parameter_names_round_trip() {
        for name in ["service", "discipline", "quantum", "cores", "arrival_rate"] {
            let parameter: PointParameter = name.parse().unwrap();
            assert_eq!(parameter.to_string(), name);
        }
        assert_eq!(
            "lambda".parse::<PointParameter>().unwrap(),
            PointParameter::Axis(AxisParameter::ArrivalRate)
        );
    }
}
