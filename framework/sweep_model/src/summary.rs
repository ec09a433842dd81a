use serde::{Deserialize, Serialize};
use sha3::Digest;
use std::io::{BufRead, Read, Write};
use std::path::{Path, PathBuf};

use crate::axis::SweepAxis;
use crate::error::InvocationFailure;
use crate::parse::BlockLayout;
use crate::point::SweepPoint;
use crate::record::NormalizationRule;
use crate::result::SweepStatus;

/// What happened to one point of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PointOutcome {
    /// The point's block is in the sweep's data file
    Succeeded,
    Failed { cause: InvocationFailure },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointSummary {
    pub point: SweepPoint,
    pub outcome: PointOutcome,
}

/// Summary of one executed axis sweep
///
/// Written by the sweep runner next to the data file and read back by the summariser. The data
/// file only holds the blocks of succeeded points, in axis order, so `points` is needed to put
/// records back into their slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSummary {
    /// Unique per runner invocation, shared by every sweep of a plan
    pub run_id: String,
    pub sweep_name: String,
    /// Unix timestamp in seconds
    pub started_at: i64,
    pub normalization: NormalizationRule,
    pub layout: BlockLayout,
    pub axis: SweepAxis,
    pub base: SweepPoint,
    /// Raw simulator output of the succeeded points, concatenated in axis order
    pub data_file: PathBuf,
    /// One entry per axis value, in axis order
    pub points: Vec<PointSummary>,
    pub harness_version: String,
}

impl SweepSummary {
    pub fn status(&self) -> SweepStatus {
        let failed = self
            .points
            .iter()
            .filter(|p| matches!(p.outcome, PointOutcome::Failed { .. }))
            .count();
        if failed == 0 {
            SweepStatus::Complete
        } else {
            SweepStatus::PartiallyFailed {
                failed,
                total: self.points.len(),
            }
        }
    }

    pub fn succeeded_count(&self) -> usize {
        self.points
            .iter()
            .filter(|p| p.outcome == PointOutcome::Succeeded)
            .count()
    }

    /// Compute a fingerprint for this sweep's configuration
    ///
    /// Two runs of the same plan entry share a fingerprint, so the summariser can pick the latest
    /// one. It uses the
    ///     - Sweep name
    ///     - Normalisation rule
    ///     - Block layout
    ///     - Axis parameter and values
    ///     - Base point
    ///     - Harness version
    ///
    /// The fingerprint is computed using [sha3::Sha3_256].
    pub fn fingerprint(&self) -> String {
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, self.sweep_name.as_bytes());
        Digest::update(&mut hasher, self.normalization.to_string().as_bytes());
        Digest::update(
            &mut hasher,
            serde_json::to_vec(&self.layout).unwrap_or_default(),
        );
        Digest::update(&mut hasher, self.axis.parameter().name().as_bytes());
        self.axis.values().iter().for_each(|v| {
            Digest::update(&mut hasher, v.to_bits().to_le_bytes());
        });
        Digest::update(&mut hasher, self.base.fingerprint().as_bytes());
        Digest::update(&mut hasher, self.harness_version.as_bytes());

        format!("{:x}", hasher.finalize())
    }
}

/// Append the sweep summary to a file
///
/// The summary will be serialized to JSON and output as a single line followed by a newline. The
/// recommended file extension is `.jsonl`.
pub fn append_sweep_summary(summary: &SweepSummary, path: &Path) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    store_sweep_summary(summary, &mut file)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Serialize the sweep summary to a writer
pub fn store_sweep_summary<W: Write>(summary: &SweepSummary, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, summary)?;
    Ok(())
}

/// Load a sweep summary from a reader
pub fn load_sweep_summary<R: Read>(reader: R) -> anyhow::Result<SweepSummary> {
    let reader = std::io::BufReader::new(reader);
    let summary: SweepSummary = serde_json::from_reader(reader)?;
    Ok(summary)
}

/// Load sweep summaries from a file
///
/// The file should contain one JSON object per line. This is the format produced by
/// [append_sweep_summary].
pub fn load_sweep_summaries(path: &Path) -> anyhow::Result<Vec<SweepSummary>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut summaries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let summary: SweepSummary = serde_json::from_str(&line)?;
        summaries.push(summary);
    }
    Ok(summaries)
}
