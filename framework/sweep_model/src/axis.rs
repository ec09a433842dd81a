use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AxisError;
use crate::point::SweepPoint;

/// Relative slack when deciding whether the last step of an arithmetic progression still lands
/// on `stop`.
const STOP_TOLERANCE: f64 = 1e-9;

/// Upper bound on the number of values an arithmetic axis may expand to.
pub const MAX_AXIS_VALUES: usize = 10_000;

/// A numeric simulator parameter that a sweep can vary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisParameter {
    ArrivalRate,
    ServiceRate,
    Quantum,
    ContextSwitchCost,
    Cores,
}

impl AxisParameter {
    pub fn name(&self) -> &'static str {
        match self {
            AxisParameter::ArrivalRate => "arrival_rate",
            AxisParameter::ServiceRate => "service_rate",
            AxisParameter::Quantum => "quantum",
            AxisParameter::ContextSwitchCost => "context_switch_cost",
            AxisParameter::Cores => "cores",
        }
    }
}

impl fmt::Display for AxisParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AxisParameter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "arrival_rate" | "lambda" => Ok(AxisParameter::ArrivalRate),
            "service_rate" | "mu" => Ok(AxisParameter::ServiceRate),
            "quantum" => Ok(AxisParameter::Quantum),
            "context_switch_cost" | "ctx_cost" => Ok(AxisParameter::ContextSwitchCost),
            "cores" => Ok(AxisParameter::Cores),
            _ => Err(format!("Unknown sweep parameter: {s}")),
        }
    }
}

/// An ordered, finite, duplicate free set of values for exactly one varying parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepAxis {
    parameter: AxisParameter,
    values: Vec<f64>,
}

impl SweepAxis {
    /// `start, start + step, start + 2*step, ...` up to and including `stop`.
    ///
    /// Values are computed from the index rather than accumulated so long axes do not drift.
    pub fn arithmetic(
        parameter: AxisParameter,
        start: f64,
        stop: f64,
        step: f64,
    ) -> Result<Self, AxisError> {
        if !(start.is_finite() && stop.is_finite() && step.is_finite()) {
            return Err(AxisError::NonFinite);
        }
        if step <= 0.0 {
            return Err(AxisError::NonPositiveStep(step));
        }
        if stop < start {
            return Err(AxisError::EmptyRange { start, stop });
        }

        let slack = STOP_TOLERANCE * stop.abs().max(step);
        let steps = ((stop - start + slack) / step).floor();
        if !steps.is_finite() || steps >= MAX_AXIS_VALUES as f64 {
            return Err(AxisError::TooManyValues {
                limit: MAX_AXIS_VALUES,
            });
        }
        let count = (steps as usize)
            .checked_add(1)
            .ok_or(AxisError::TooManyValues {
                limit: MAX_AXIS_VALUES,
            })?;
        let values = (0..count).map(|i| start + i as f64 * step).collect();

        Self::discrete(parameter, values)
    }

    /// An explicit list of values, kept in the given order.
    pub fn discrete(parameter: AxisParameter, values: Vec<f64>) -> Result<Self, AxisError> {
        if values.is_empty() {
            return Err(AxisError::Empty);
        }
        for (i, value) in values.iter().enumerate() {
            if !value.is_finite() {
                return Err(AxisError::NonFinite);
            }
            if parameter == AxisParameter::Cores && (value.fract() != 0.0 || *value < 1.0) {
                return Err(AxisError::InvalidCoreCount(*value));
            }
            if values[..i].contains(value) {
                return Err(AxisError::Duplicate(*value));
            }
        }

        Ok(Self { parameter, values })
    }

    pub fn parameter(&self) -> AxisParameter {
        self.parameter
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The sweep points along this axis, in axis order, with every other coordinate taken from
    /// `base`.
    pub fn points(&self, base: &SweepPoint) -> Vec<SweepPoint> {
        self.values
            .iter()
            .map(|value| base.with_axis_value(self.parameter, *value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_axis_includes_stop() {
        let axis = SweepAxis::arithmetic(AxisParameter::Quantum, 10.0, 190.0, 20.0).unwrap();
        assert_eq!(
            axis.values(),
            &[10.0, 30.0, 50.0, 70.0, 90.0, 110.0, 130.0, 150.0, 170.0, 190.0]
        );
    }

    #[test]
    fn arithmetic_axis_does_not_drift() {
        let axis = SweepAxis::arithmetic(AxisParameter::ArrivalRate, 0.001, 0.02, 0.0015).unwrap();
        assert_eq!(axis.len(), 13);
        assert_eq!(axis.values()[12], 0.001 + 12.0 * 0.0015);
        assert!(axis.values().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn arithmetic_axis_rejects_bad_ranges() {
        assert_eq!(
            SweepAxis::arithmetic(AxisParameter::Quantum, 1.0, 2.0, 0.0),
            Err(AxisError::NonPositiveStep(0.0))
        );
        assert_eq!(
            SweepAxis::arithmetic(AxisParameter::Quantum, 3.0, 2.0, 1.0),
            Err(AxisError::EmptyRange {
                start: 3.0,
                stop: 2.0
            })
        );
        assert_eq!(
            SweepAxis::arithmetic(AxisParameter::Quantum, f64::NAN, 2.0, 1.0),
            Err(AxisError::NonFinite)
        );
    }

    #[test]
    fn oversized_arithmetic_axis_is_rejected() {
        assert_eq!(
            SweepAxis::arithmetic(AxisParameter::ArrivalRate, 0.0, 1e300, 1e-300),
            Err(AxisError::TooManyValues {
                limit: MAX_AXIS_VALUES
            })
        );
        assert_eq!(
            SweepAxis::arithmetic(AxisParameter::Quantum, 0.0, 1e6, 1.0),
            Err(AxisError::TooManyValues {
                limit: MAX_AXIS_VALUES
            })
        );

        let largest =
            SweepAxis::arithmetic(AxisParameter::Quantum, 1.0, MAX_AXIS_VALUES as f64, 1.0)
                .unwrap();
        assert_eq!(largest.len(), MAX_AXIS_VALUES);
    }

    #[test]
    fn discrete_axis_rejects_duplicates() {
        assert_eq!(
            SweepAxis::discrete(AxisParameter::ContextSwitchCost, vec![0.0, 1.0, 0.0]),
            Err(AxisError::Duplicate(0.0))
        );
        assert_eq!(
            SweepAxis::discrete(AxisParameter::ContextSwitchCost, vec![]),
            Err(AxisError::Empty)
        );
    }

    #[test]
    fn core_axis_requires_whole_numbers() {
        assert!(SweepAxis::discrete(AxisParameter::Cores, vec![1.0, 2.0, 4.0]).is_ok());
        assert_eq!(
            SweepAxis::discrete(AxisParameter::Cores, vec![1.5]),
            Err(AxisError::InvalidCoreCount(1.5))
        );
        assert_eq!(
            SweepAxis::discrete(AxisParameter::Cores, vec![0.0]),
            Err(AxisError::InvalidCoreCount(0.0))
        );
    }

    #[test]
    fn points_follow_axis_order() {
        let base = SweepPoint::builder().build();
        let axis = SweepAxis::discrete(AxisParameter::ArrivalRate, vec![0.3, 0.1, 0.2]).unwrap();
        let rates = axis
            .points(&base)
            .iter()
            .map(|p| p.arrival_rate())
            .collect::<Vec<_>>();
        assert_eq!(rates, vec![0.3, 0.1, 0.2]);
    }
}
