use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(about, long_about = None)]
pub struct SweepCli {
    /// Path to the sweep plan, a TOML file listing the sweeps to run
    #[clap(long)]
    pub plan: PathBuf,

    /// The maximum number of simulator processes to run at once, across all sweeps.
    ///
    /// Overrides the plan. Defaults to the number of available CPUs.
    #[clap(long)]
    pub parallelism: Option<usize>,

    /// Kill a simulator invocation that runs for longer than this many seconds.
    ///
    /// Overrides the plan. The point is recorded as failed and the sweep continues.
    #[clap(long)]
    pub timeout_secs: Option<u64>,

    /// Write sweep output to this directory instead of the plan's `output_dir`
    #[clap(long)]
    pub output_dir: Option<PathBuf>,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// Exit successfully even if some points of a sweep failed.
    ///
    /// Partial sweeps are always written, this only changes the exit status.
    #[clap(long, default_value = "false")]
    pub allow_partial: bool,
}
