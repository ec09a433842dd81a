use std::fmt;
use std::time::Duration;

/// The field of a simulator output block that a [ParseError] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockField {
    LeadingLine,
    Header,
    ServiceRate,
    ArrivalRate,
    CoreCount,
    AverageLatency,
    PercentileLine,
    P50,
    P90,
    P95,
    P99,
    Throughput,
}

impl fmt::Display for BlockField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockField::LeadingLine => write!(f, "leading line"),
            BlockField::Header => write!(f, "header"),
            BlockField::ServiceRate => write!(f, "service rate"),
            BlockField::ArrivalRate => write!(f, "arrival rate"),
            BlockField::CoreCount => write!(f, "core count"),
            BlockField::AverageLatency => write!(f, "average latency"),
            BlockField::PercentileLine => write!(f, "percentile line"),
            BlockField::P50 => write!(f, "p50"),
            BlockField::P90 => write!(f, "p90"),
            BlockField::P95 => write!(f, "p95"),
            BlockField::P99 => write!(f, "p99"),
            BlockField::Throughput => write!(f, "throughput"),
        }
    }
}

/// Why a block failed to parse.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseFailure {
    #[error("field is missing")]
    Missing,
    #[error("expected label `{expected}`, found `{found}`")]
    UnexpectedLabel { expected: String, found: String },
    #[error("`{value}` is not a valid number")]
    InvalidNumber { value: String },
    #[error("block is truncated, stream ended before this line")]
    Truncated,
    #[error("invalid record: {0}")]
    InvalidRecord(#[from] RecordError),
    #[error("failed to read input: {0}")]
    Read(String),
}

/// A malformed or truncated block in simulator output.
///
/// Parsing always stops at the first failing block, so `block_index` is also the number of
/// records that were successfully parsed before it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{origin}: block {block_index}, line {line_in_block}: {field}: {reason} (raw line: {line:?})")]
pub struct ParseError {
    /// Identifies the stream that was parsed, usually a file path
    pub origin: String,
    /// 0-based index of the failing block
    pub block_index: usize,
    /// 0-based line offset inside the block
    pub line_in_block: usize,
    pub field: BlockField,
    /// The raw text that failed to match, empty when the stream ended early
    pub line: String,
    pub reason: ParseFailure,
}

/// A record that violates the invariants of a [crate::RunRecord].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    #[error("{name} must be a finite, non-negative number, got {value}")]
    Negative { name: &'static str, value: f64 },
    #[error("{name} must be a finite number, got {value}")]
    NonFinite { name: &'static str, value: f64 },
    #[error("percentiles are out of order: {lower} ({lower_value}) > {upper} ({upper_value})")]
    PercentileOrder {
        lower: &'static str,
        lower_value: f64,
        upper: &'static str,
        upper_value: f64,
    },
}

/// Normalisation was asked to divide by a non-positive quantity.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidMetricInput {
    #[error("service rate must be positive and finite, got {0}")]
    NonPositiveServiceRate(f64),
    #[error("core count must be at least 1")]
    ZeroCores,
    #[error("multi-core normalisation needs a core count but the record only has an arrival rate")]
    MissingCoreCount,
}

/// A simulator invocation that did not produce usable output.
#[derive(Debug, Clone, PartialEq, thiserror::Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvocationFailure {
    #[error("failed to start simulator: {message}")]
    Spawn { message: String },
    #[error("simulator exited with {}: {stderr}", exit_code_display(.code))]
    NonZeroExit { code: Option<i32>, stderr: String },
    #[error("simulator produced no output")]
    EmptyOutput,
    #[error("simulator did not finish within {after:?}")]
    TimedOut { after: Duration },
    #[error("invocation cancelled by shutdown signal")]
    Cancelled,
    #[error("failed to store simulator output: {message}")]
    Io { message: String },
}

fn exit_code_display(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// A logic defect in how sweep data was assembled. Never tolerated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SweepIntegrityError {
    #[error("series `{name}` has {xs} x values but {ys} y values")]
    LengthMismatch { name: String, xs: usize, ys: usize },
    #[error("output destination {fingerprint} is already claimed, point {point}")]
    DuplicateDestination { fingerprint: String, point: String },
    #[error("expected {expected} records for the succeeded points but found {found}")]
    RecordCountMismatch { expected: usize, found: usize },
    #[error("sweep has {expected} axis values but {found} slots")]
    SlotCountMismatch { expected: usize, found: usize },
    #[error("expected exactly one block from point {point} but found {found}")]
    UnexpectedBlockCount { point: String, found: usize },
    #[error("series name `{0}` is used more than once")]
    DuplicateSeriesName(String),
}

/// Invalid sweep axis definition.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AxisError {
    #[error("axis values must be finite")]
    NonFinite,
    #[error("axis step must be positive, got {0}")]
    NonPositiveStep(f64),
    #[error("axis stop {stop} is below start {start}")]
    EmptyRange { start: f64, stop: f64 },
    #[error("axis has no values")]
    Empty,
    #[error("axis value {0} appears more than once")]
    Duplicate(f64),
    #[error("core count axis values must be whole numbers of at least 1, got {0}")]
    InvalidCoreCount(f64),
    #[error("`{value}` is not a valid value for {parameter}")]
    InvalidValue { parameter: String, value: String },
    #[error("axis would have more than {limit} values")]
    TooManyValues { limit: usize },
}
