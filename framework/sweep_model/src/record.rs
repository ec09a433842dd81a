use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RecordError;

/// The latency percentiles reported by the simulator, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Percentile {
    P50,
    P90,
    P95,
    P99,
}

impl Percentile {
    pub const ALL: [Percentile; 4] = [
        Percentile::P50,
        Percentile::P90,
        Percentile::P95,
        Percentile::P99,
    ];

    /// The numeric label, e.g. `50` for [Percentile::P50].
    pub fn label(&self) -> u32 {
        match self {
            Percentile::P50 => 50,
            Percentile::P90 => 90,
            Percentile::P95 => 95,
            Percentile::P99 => 99,
        }
    }

    fn index(&self) -> usize {
        match self {
            Percentile::P50 => 0,
            Percentile::P90 => 1,
            Percentile::P95 => 2,
            Percentile::P99 => 3,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Percentile::P50 => "p50",
            Percentile::P90 => "p90",
            Percentile::P95 => "p95",
            Percentile::P99 => "p99",
        }
    }
}

impl fmt::Display for Percentile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Exactly the four percentile latencies of one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileLatency {
    p50: f64,
    p90: f64,
    p95: f64,
    p99: f64,
}

impl PercentileLatency {
    /// Build from values in p50, p90, p95, p99 order.
    ///
    /// Values must be non-negative and non-decreasing. An out of order set points at a parsing or
    /// simulator defect and is rejected rather than sorted.
    pub fn new(values: [f64; 4]) -> Result<Self, RecordError> {
        for (percentile, value) in Percentile::ALL.iter().zip(values) {
            check_non_negative(percentile.name(), value)?;
        }
        for (pair, window) in Percentile::ALL.windows(2).zip(values.windows(2)) {
            if window[0] > window[1] {
                return Err(RecordError::PercentileOrder {
                    lower: pair[0].name(),
                    lower_value: window[0],
                    upper: pair[1].name(),
                    upper_value: window[1],
                });
            }
        }

        Ok(Self {
            p50: values[0],
            p90: values[1],
            p95: values[2],
            p99: values[3],
        })
    }

    pub fn get(&self, percentile: Percentile) -> f64 {
        self.as_array()[percentile.index()]
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.p50, self.p90, self.p95, self.p99]
    }
}

/// What the simulator was loaded with, which depends on the sweep family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadDescriptor {
    ArrivalRate(f64),
    CoreCount(u32),
}

impl LoadDescriptor {
    pub fn core_count(&self) -> Option<u32> {
        match self {
            LoadDescriptor::CoreCount(cores) => Some(*cores),
            LoadDescriptor::ArrivalRate(_) => None,
        }
    }
}

/// How achieved throughput is turned into a normalised load.
///
/// Single queue sweeps divide by μ, multi-core sweeps by `cores × μ`. Always chosen explicitly
/// per sweep, never inferred from the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationRule {
    SingleQueue,
    MultiCore,
}

impl fmt::Display for NormalizationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizationRule::SingleQueue => write!(f, "single_queue"),
            NormalizationRule::MultiCore => write!(f, "multi_core"),
        }
    }
}

/// The parsed result of one simulator invocation.
///
/// Created once by the log parser and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    service_rate: f64,
    load: LoadDescriptor,
    achieved_throughput: f64,
    average_latency: f64,
    percentile_latency: PercentileLatency,
}

impl RunRecord {
    pub fn new(
        service_rate: f64,
        load: LoadDescriptor,
        achieved_throughput: f64,
        average_latency: f64,
        percentile_latency: PercentileLatency,
    ) -> Result<Self, RecordError> {
        // μ ≤ 0 is left to the metrics layer, which reports it against the record
        if !service_rate.is_finite() {
            return Err(RecordError::NonFinite {
                name: "service rate",
                value: service_rate,
            });
        }
        if let LoadDescriptor::ArrivalRate(arrival_rate) = load {
            check_non_negative("arrival rate", arrival_rate)?;
        }
        check_non_negative("achieved throughput", achieved_throughput)?;
        check_non_negative("average latency", average_latency)?;

        Ok(Self {
            service_rate,
            load,
            achieved_throughput,
            average_latency,
            percentile_latency,
        })
    }

    /// μ, service completions per unit time
    pub fn service_rate(&self) -> f64 {
        self.service_rate
    }

    pub fn load(&self) -> LoadDescriptor {
        self.load
    }

    pub fn achieved_throughput(&self) -> f64 {
        self.achieved_throughput
    }

    pub fn average_latency(&self) -> f64 {
        self.average_latency
    }

    pub fn percentile_latency(&self) -> &PercentileLatency {
        &self.percentile_latency
    }
}

fn check_non_negative(name: &'static str, value: f64) -> Result<(), RecordError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(RecordError::Negative { name, value })
    }
}
