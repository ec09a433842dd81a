use std::path::Path;

use anyhow::Context;
use schedsim_sweep_model::{
    LogParser, MissingSlot, PointOutcome, Slot, SweepIntegrityError, SweepResult,
    SweepResultBuilder, SweepSummary,
};

/// Rebuild the [SweepResult] of a persisted sweep.
///
/// The data file is resolved against `base_dir`, normally the directory of the summary file. It
/// must hold exactly one block per succeeded point, in axis order.
pub fn load_sweep_result(summary: &SweepSummary, base_dir: &Path) -> anyhow::Result<SweepResult> {
    let data_path = base_dir.join(&summary.data_file);
    let data = std::fs::read_to_string(&data_path)
        .with_context(|| format!("Failed to read sweep output {}", data_path.display()))?;

    let records = LogParser::new(summary.layout.clone())
        .with_origin(data_path.display().to_string())
        .parse_all(&data)?;
    let expected = summary.succeeded_count();
    if records.len() != expected {
        return Err(anyhow::Error::new(SweepIntegrityError::RecordCountMismatch {
            expected,
            found: records.len(),
        })
        .context(format!(
            "Sweep {} does not match its summary",
            summary.sweep_name
        )));
    }

    let mut records = records.into_iter();
    let mut builder = SweepResultBuilder::new(
        summary.sweep_name.clone(),
        summary.axis.clone(),
        summary.base.clone(),
    );
    for point in &summary.points {
        let slot = match &point.outcome {
            PointOutcome::Succeeded => match records.next() {
                Some(record) => Slot::Record(record),
                None => break,
            },
            PointOutcome::Failed { cause } => Slot::Missing(MissingSlot {
                point: point.point.clone(),
                cause: cause.clone(),
            }),
        };
        builder.push(slot);
    }

    builder
        .build()
        .with_context(|| format!("Sweep {} does not match its summary", summary.sweep_name))
}
