use schedsim_sweep_model::SweepStatus;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::run::{PlanReport, SweepReport};

#[derive(Tabled)]
pub struct SweepStatusRow {
    #[tabled(rename = "Sweep")]
    pub name: String,
    #[tabled(rename = "Points")]
    pub points: usize,
    #[tabled(rename = "Succeeded")]
    pub succeeded: usize,
    #[tabled(rename = "Failed")]
    pub failed: usize,
    #[tabled(rename = "Status")]
    pub status: String,
}

impl From<&SweepReport> for SweepStatusRow {
    fn from(report: &SweepReport) -> Self {
        let failed = report.failed_points.len();
        let status = match (&report.error, report.status()) {
            (Some(error), _) => format!("error: {error}"),
            (None, Some(SweepStatus::Complete)) => "complete".to_string(),
            (None, Some(SweepStatus::PartiallyFailed { .. })) => "partially failed".to_string(),
            (None, None) => "not run".to_string(),
        };
        Self {
            name: report.name.clone(),
            points: report.total_points,
            succeeded: report.total_points.saturating_sub(failed),
            failed,
            status,
        }
    }
}

#[derive(Tabled)]
pub struct FailedPointRow {
    #[tabled(rename = "Sweep")]
    pub sweep: String,
    #[tabled(rename = "Point")]
    pub point: String,
    #[tabled(rename = "Cause")]
    pub cause: String,
}

pub fn status_rows(report: &PlanReport) -> Vec<SweepStatusRow> {
    report.sweeps.iter().map(SweepStatusRow::from).collect()
}

pub fn failed_point_rows(report: &PlanReport) -> Vec<FailedPointRow> {
    report
        .sweeps
        .iter()
        .flat_map(|sweep| {
            sweep
                .failed_points
                .iter()
                .map(|(point, cause)| FailedPointRow {
                    sweep: sweep.name.clone(),
                    point: point.clone(),
                    cause: cause.clone(),
                })
        })
        .collect()
}

/// Print the per sweep status and, if any, the failed points.
pub fn print_status_table(report: &PlanReport) {
    println!("\nSweeps (run {})", report.run_id);
    let mut table = Table::new(status_rows(report));
    table.with(Style::modern());
    println!("{table}");

    let failed = failed_point_rows(report);
    if !failed.is_empty() {
        println!("\nFailed points");
        let mut table = Table::new(failed);
        table.with(Style::modern());
        println!("{table}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn rows_reflect_sweep_outcomes() {
        let report = PlanReport {
            run_id: "run".to_string(),
            output_dir: PathBuf::from("out"),
            sweeps: vec![
                SweepReport {
                    name: "mm1".to_string(),
                    total_points: 3,
                    summary: None,
                    failed_points: vec![(
                        "lambda=0.01".to_string(),
                        "simulator produced no output".to_string(),
                    )],
                    error: None,
                },
                SweepReport {
                    name: "md1".to_string(),
                    total_points: 2,
                    summary: None,
                    failed_points: vec![],
                    error: Some("duplicate".to_string()),
                },
            ],
        };

        let rows = status_rows(&report);
        assert_eq!(rows[0].succeeded, 2);
        assert_eq!(rows[0].failed, 1);
        assert_eq!(rows[0].status, "not run");
        assert_eq!(rows[1].status, "error: duplicate");

        let failed = failed_point_rows(&report);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].sweep, "mm1");
    }
}
