use serde::{Deserialize, Serialize};

use crate::axis::SweepAxis;
use crate::error::{InvocationFailure, SweepIntegrityError};
use crate::point::SweepPoint;
use crate::record::RunRecord;

/// A point whose invocation did not produce a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingSlot {
    pub point: SweepPoint,
    pub cause: InvocationFailure,
}

/// One entry of a [SweepResult], at the same index as its axis value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Record(RunRecord),
    Missing(MissingSlot),
}

impl Slot {
    pub fn record(&self) -> Option<&RunRecord> {
        match self {
            Slot::Record(record) => Some(record),
            Slot::Missing(_) => None,
        }
    }
}

/// Whether every point of a sweep produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SweepStatus {
    Complete,
    PartiallyFailed { failed: usize, total: usize },
}

impl SweepStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, SweepStatus::Complete)
    }
}

/// The records of one axis sweep, in axis enumeration order.
///
/// The order is the x-axis of the resulting plot. A finished result is never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    name: String,
    axis: SweepAxis,
    base: SweepPoint,
    slots: Vec<Slot>,
}

impl SweepResult {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn axis(&self) -> &SweepAxis {
        &self.axis
    }

    pub fn base(&self) -> &SweepPoint {
        &self.base
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Indexes and causes of the slots without a record.
    pub fn missing(&self) -> impl Iterator<Item = (usize, &MissingSlot)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| match slot {
                Slot::Missing(missing) => Some((i, missing)),
                Slot::Record(_) => None,
            })
    }

    pub fn status(&self) -> SweepStatus {
        let failed = self.missing().count();
        if failed == 0 {
            SweepStatus::Complete
        } else {
            SweepStatus::PartiallyFailed {
                failed,
                total: self.slots.len(),
            }
        }
    }
}

/// Assembles a [SweepResult] slot by slot in axis order.
#[derive(Debug)]
pub struct SweepResultBuilder {
    name: String,
    axis: SweepAxis,
    base: SweepPoint,
    slots: Vec<Slot>,
}

impl SweepResultBuilder {
    pub fn new(name: impl Into<String>, axis: SweepAxis, base: SweepPoint) -> Self {
        let capacity = axis.len();
        Self {
            name: name.into(),
            axis,
            base,
            slots: Vec::with_capacity(capacity),
        }
    }

    /// The point the next pushed slot belongs to, `None` once every axis value has a slot.
    pub fn next_point(&self) -> Option<SweepPoint> {
        self.axis
            .values()
            .get(self.slots.len())
            .map(|value| self.base.with_axis_value(self.axis.parameter(), *value))
    }

    pub fn push(&mut self, slot: Slot) -> &mut Self {
        self.slots.push(slot);
        self
    }

    /// Finish the result. Every axis value must have exactly one slot.
    pub fn build(self) -> Result<SweepResult, SweepIntegrityError> {
        if self.slots.len() != self.axis.len() {
            return Err(SweepIntegrityError::SlotCountMismatch {
                expected: self.axis.len(),
                found: self.slots.len(),
            });
        }

        Ok(SweepResult {
            name: self.name,
            axis: self.axis,
            base: self.base,
            slots: self.slots,
        })
    }
}
