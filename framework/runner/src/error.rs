use schedsim_sweep_model::{AxisParameter, ParseError, SweepIntegrityError, SweepPoint};

/// A sweep whose output could not be turned into a result.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("sweep `{sweep}` over {axis}: output of point {point} is malformed: {source}")]
    Parse {
        sweep: String,
        axis: AxisParameter,
        point: SweepPoint,
        source: ParseError,
    },
    #[error("sweep `{sweep}`: {source}")]
    Integrity {
        sweep: String,
        source: SweepIntegrityError,
    },
}
