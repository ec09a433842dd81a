//! Data model shared by the sweep runner and the summariser: run records parsed from simulator
//! output, the sweep parameter space, assembled sweep results and the persisted sweep summaries.

mod axis;
mod error;
pub mod parse;
mod point;
mod record;
mod result;
mod summary;

pub use axis::{AxisParameter, SweepAxis, MAX_AXIS_VALUES};
pub use error::{
    AxisError, BlockField, InvalidMetricInput, InvocationFailure, ParseError, ParseFailure,
    RecordError, SweepIntegrityError,
};
pub use parse::{BlockLayout, LayoutPreset, LogParser};
pub use point::{
    PointParameter, ProcessorDiscipline, ServiceDistribution, SweepPoint, SweepPointBuilder,
};
pub use record::{LoadDescriptor, NormalizationRule, Percentile, PercentileLatency, RunRecord};
pub use result::{MissingSlot, Slot, SweepResult, SweepResultBuilder, SweepStatus};
pub use summary::{
    append_sweep_summary, load_sweep_summaries, load_sweep_summary, store_sweep_summary,
    PointOutcome, PointSummary, SweepSummary,
};
