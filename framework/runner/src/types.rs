/// Result type used by the runner's orchestration code and the `schedsim-sweep` binary.
pub type SweepRunnerResult<T> = anyhow::Result<T>;
