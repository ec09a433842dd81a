use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::BlockField;

/// Lines in a block after the leading lines: header, averages, percentiles, throughput.
pub(crate) const RECORD_LINES: usize = 4;

/// Which load coordinate the header carries, and under which key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadField {
    ArrivalRate { key: String },
    CoreCount { key: String },
}

/// How the header line names its values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderLayout {
    /// Key of the μ token, matched ignoring ASCII case
    pub service_rate_key: String,
    pub load: LoadField,
    /// Characters that split a `key=value` style token, the first one found wins
    #[serde(default = "default_separators")]
    pub separators: Vec<char>,
}

fn default_separators() -> Vec<char> {
    vec!['=', ':']
}

/// The schema of one simulator output block.
///
/// The simulator prints the same logical record in a few textual variants. Rather than a parser
/// per variant, a layout describes the one in use and is chosen once per parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockLayout {
    /// Lines printed before the header of every block, skipped unread
    #[serde(default)]
    pub leading_lines: usize,
    pub header: HeaderLayout,
    /// Label in front of the average latency value
    pub average_label: String,
    /// Separates the `label value` pairs of the percentile line
    #[serde(default = "default_percentile_delimiter")]
    pub percentile_delimiter: char,
    /// Label in front of the `:` on the throughput line
    pub throughput_label: String,
}

fn default_percentile_delimiter() -> char {
    '\t'
}

impl BlockLayout {
    /// Single queue sweeps, loaded by arrival rate: `lambda=0.01\tmu=0.02`.
    pub fn single_queue() -> Self {
        Self {
            leading_lines: 0,
            header: HeaderLayout {
                service_rate_key: "mu".to_string(),
                load: LoadField::ArrivalRate {
                    key: "lambda".to_string(),
                },
                separators: default_separators(),
            },
            average_label: "avg".to_string(),
            percentile_delimiter: default_percentile_delimiter(),
            throughput_label: "throughput".to_string(),
        }
    }

    /// Multi-core sweeps, loaded by core count: `cores:4\tmu=0.2`.
    pub fn multi_core() -> Self {
        Self {
            header: HeaderLayout {
                service_rate_key: "mu".to_string(),
                load: LoadField::CoreCount {
                    key: "cores".to_string(),
                },
                separators: default_separators(),
            },
            ..Self::single_queue()
        }
    }

    /// The simulator's own topology printer: a `Stats collector` line, then
    /// `Cores:4\tservice_rate:0.2\tinterarrival_rate:0.1`, `AVG`, `50th: ...` and
    /// `Req/time_unit:...`.
    pub fn topology_report() -> Self {
        Self {
            leading_lines: 1,
            header: HeaderLayout {
                service_rate_key: "service_rate".to_string(),
                load: LoadField::CoreCount {
                    key: "cores".to_string(),
                },
                separators: default_separators(),
            },
            average_label: "AVG".to_string(),
            percentile_delimiter: default_percentile_delimiter(),
            throughput_label: "Req/time_unit".to_string(),
        }
    }

    pub fn lines_per_block(&self) -> usize {
        self.leading_lines + RECORD_LINES
    }

    /// The field that a line offset inside a block holds.
    pub(crate) fn field_at(&self, line_in_block: usize) -> BlockField {
        match line_in_block.checked_sub(self.leading_lines) {
            None => BlockField::LeadingLine,
            Some(0) => BlockField::Header,
            Some(1) => BlockField::AverageLatency,
            Some(2) => BlockField::PercentileLine,
            Some(_) => BlockField::Throughput,
        }
    }
}

/// The built in layouts, selectable by name from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutPreset {
    SingleQueue,
    MultiCore,
    TopologyReport,
}

impl LayoutPreset {
    pub fn layout(&self) -> BlockLayout {
        match self {
            LayoutPreset::SingleQueue => BlockLayout::single_queue(),
            LayoutPreset::MultiCore => BlockLayout::multi_core(),
            LayoutPreset::TopologyReport => BlockLayout::topology_report(),
        }
    }
}

impl FromStr for LayoutPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single_queue" => Ok(LayoutPreset::SingleQueue),
            "multi_core" => Ok(LayoutPreset::MultiCore),
            "topology_report" => Ok(LayoutPreset::TopologyReport),
            _ => Err(format!("Unknown block layout: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_offsets_account_for_leading_lines() {
        let layout = BlockLayout::topology_report();
        assert_eq!(layout.lines_per_block(), 5);
        assert_eq!(layout.field_at(0), BlockField::LeadingLine);
        assert_eq!(layout.field_at(1), BlockField::Header);
        assert_eq!(layout.field_at(3), BlockField::PercentileLine);
        assert_eq!(layout.field_at(4), BlockField::Throughput);
    }

    #[test]
    fn layout_deserializes_with_defaults() {
        let layout: BlockLayout = serde_json::from_value(serde_json::json!({
            "header": {
                "service_rate_key": "mu",
                "load": { "kind": "arrival_rate", "key": "lambda" }
            },
            "average_label": "avg",
            "throughput_label": "throughput"
        }))
        .unwrap();

        assert_eq!(layout, BlockLayout::single_queue());
    }
}
