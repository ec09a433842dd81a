mod cli;
mod config;
mod driver;
mod error;
mod init;
mod invocation;
mod progress;
mod report;
mod run;
mod shutdown;
mod simulator_binary;
mod types;

pub mod prelude {
    pub use crate::cli::SweepCli;
    pub use crate::config::{
        AxisSpec, BasePoint, LayoutSpec, PlannedSweep, SweepEntry, SweepPlan, VarySpec, VaryValue,
    };
    pub use crate::driver::{
        DestinationRegistry, DriverConfig, PersistContext, PointRun, SweepDriver, SweepRun,
        SWEEP_SUMMARY_FILE,
    };
    pub use crate::error::SweepError;
    pub use crate::init::init;
    pub use crate::invocation::SimulatorFlags;
    pub use crate::report::print_status_table;
    pub use crate::run::{run, run_sweeps, PlanReport, SweepReport};
    pub use crate::shutdown::{ShutdownHandle, ShutdownListener};
    pub use crate::simulator_binary::{simulator_path, SCHEDSIM_BINARY, SCHEDSIM_PATH_ENV};
    pub use crate::types::SweepRunnerResult;
}
