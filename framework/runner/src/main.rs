use schedsim_sweep_runner::prelude::{init, run};

fn main() -> anyhow::Result<()> {
    let cli = init();
    let report = run(cli)?;
    log::info!(
        "Sweep run {} finished, results in {}",
        report.run_id,
        report.output_dir.display()
    );
    Ok(())
}
