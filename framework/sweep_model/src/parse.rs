//! Parser for the simulator's text output.
//!
//! Each run prints one fixed size block:
//!
//! ```text
//! [leading lines]
//! cores:4	mu=0.2
//! ... avg 12.5
//! 50 10	90 20	95 25	99 40
//! throughput: 0.75
//! ```
//!
//! Blocks repeat until the end of the stream. The exact labels and keys are described by a
//! [BlockLayout].

mod layout;

pub use layout::{BlockLayout, HeaderLayout, LayoutPreset, LoadField};

use std::io::{self, BufRead};
use std::iter::FusedIterator;

use crate::error::{BlockField, ParseError, ParseFailure, RecordError};
use crate::record::{LoadDescriptor, Percentile, PercentileLatency, RunRecord};

const DEFAULT_ORIGIN: &str = "<input>";

/// A field failure inside a block, before it is tied to a stream position.
type FieldError = (usize, BlockField, ParseFailure);

/// Parses simulator output into [RunRecord]s using one [BlockLayout].
#[derive(Debug, Clone)]
pub struct LogParser {
    layout: BlockLayout,
    origin: String,
}

impl LogParser {
    pub fn new(layout: BlockLayout) -> Self {
        Self {
            layout,
            origin: DEFAULT_ORIGIN.to_string(),
        }
    }

    /// Name the stream in errors, usually the path of the file being parsed.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn layout(&self) -> &BlockLayout {
        &self.layout
    }

    /// Lazily parse records from a string.
    ///
    /// Parsing the same string again yields the same sequence. The iterator ends after the first
    /// error.
    pub fn parse_str<'a>(
        &'a self,
        input: &'a str,
    ) -> Records<'a, impl Iterator<Item = io::Result<String>> + 'a> {
        Records::new(self, input.lines().map(|line| Ok(line.to_string())))
    }

    /// Lazily parse records from a reader.
    pub fn parse_reader<R: BufRead>(&self, reader: R) -> Records<'_, io::Lines<R>> {
        Records::new(self, reader.lines())
    }

    /// Parse every record in `input`, or fail with the first malformed block.
    pub fn parse_all(&self, input: &str) -> Result<Vec<RunRecord>, ParseError> {
        self.parse_str(input).collect()
    }

    fn parse_block(&self, lines: &[String]) -> Result<RunRecord, FieldError> {
        let header_at = self.layout.leading_lines;
        let average_at = header_at + 1;
        let percentiles_at = header_at + 2;
        let throughput_at = header_at + 3;

        let (service_rate, load) = self
            .parse_header(&lines[header_at])
            .map_err(|(field, reason)| (header_at, field, reason))?;
        let average_latency = self
            .parse_average(&lines[average_at])
            .map_err(|(field, reason)| (average_at, field, reason))?;
        let percentile_latency = self
            .parse_percentiles(&lines[percentiles_at])
            .map_err(|(field, reason)| (percentiles_at, field, reason))?;
        let achieved_throughput = self
            .parse_throughput(&lines[throughput_at])
            .map_err(|reason| (throughput_at, BlockField::Throughput, reason))?;

        RunRecord::new(
            service_rate,
            load,
            achieved_throughput,
            average_latency,
            percentile_latency,
        )
        .map_err(|e| {
            let (at, field) = match &e {
                RecordError::NonFinite {
                    name: "service rate",
                    ..
                } => (header_at, BlockField::ServiceRate),
                RecordError::Negative {
                    name: "arrival rate",
                    ..
                } => (header_at, BlockField::ArrivalRate),
                RecordError::Negative {
                    name: "average latency",
                    ..
                } => (average_at, BlockField::AverageLatency),
                _ => (throughput_at, BlockField::Throughput),
            };
            (at, field, e.into())
        })
    }

    fn parse_header(&self, line: &str) -> Result<(f64, LoadDescriptor), (BlockField, ParseFailure)> {
        let header = &self.layout.header;
        let tokens = line
            .split(['\t', ' '])
            .filter(|token| !token.is_empty())
            .filter_map(|token| split_key_value(token, &header.separators))
            .collect::<Vec<_>>();
        let lookup = |key: &str| {
            tokens
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| *v)
        };

        let service_rate = lookup(&header.service_rate_key)
            .ok_or((BlockField::ServiceRate, ParseFailure::Missing))
            .and_then(|v| parse_float(v).map_err(|e| (BlockField::ServiceRate, e)))?;

        let load = match &header.load {
            LoadField::ArrivalRate { key } => lookup(key)
                .ok_or((BlockField::ArrivalRate, ParseFailure::Missing))
                .and_then(|v| parse_float(v).map_err(|e| (BlockField::ArrivalRate, e)))
                .map(LoadDescriptor::ArrivalRate)?,
            LoadField::CoreCount { key } => lookup(key)
                .ok_or((BlockField::CoreCount, ParseFailure::Missing))
                .and_then(|v| {
                    v.parse::<u32>().map_err(|_| {
                        (
                            BlockField::CoreCount,
                            ParseFailure::InvalidNumber {
                                value: v.to_string(),
                            },
                        )
                    })
                })
                .map(LoadDescriptor::CoreCount)?,
        };

        Ok((service_rate, load))
    }

    fn parse_average(&self, line: &str) -> Result<f64, (BlockField, ParseFailure)> {
        let label = self.layout.average_label.as_str();
        let separators = &self.layout.header.separators;
        let tokens = line.split_whitespace().collect::<Vec<_>>();

        for (i, token) in tokens.iter().enumerate() {
            let bare = token.trim_end_matches(separators.as_slice());
            if bare.eq_ignore_ascii_case(label) {
                let value = tokens
                    .get(i + 1)
                    .ok_or((BlockField::AverageLatency, ParseFailure::Missing))?;
                return parse_float(value).map_err(|e| (BlockField::AverageLatency, e));
            }
            if let Some((key, value)) = split_key_value(token, separators) {
                if key.eq_ignore_ascii_case(label) {
                    return parse_float(value).map_err(|e| (BlockField::AverageLatency, e));
                }
            }
        }

        Err((BlockField::AverageLatency, ParseFailure::Missing))
    }

    fn parse_percentiles(&self, line: &str) -> Result<PercentileLatency, (BlockField, ParseFailure)> {
        let mut pairs = line
            .split(self.layout.percentile_delimiter)
            .map(str::trim)
            .filter(|pair| !pair.is_empty());

        let mut values = [0.0; 4];
        for (slot, percentile) in values.iter_mut().zip(Percentile::ALL) {
            let field = percentile_field(percentile);
            let pair = pairs.next().ok_or((field, ParseFailure::Missing))?;
            let (label, value) = split_percentile_pair(pair).ok_or((field, ParseFailure::Missing))?;

            if parse_percentile_label(label) != Some(percentile.label()) {
                return Err((
                    field,
                    ParseFailure::UnexpectedLabel {
                        expected: percentile.label().to_string(),
                        found: label.to_string(),
                    },
                ));
            }
            *slot = parse_float(value).map_err(|e| (field, e))?;
        }

        if let Some(extra) = pairs.next() {
            return Err((
                BlockField::PercentileLine,
                ParseFailure::UnexpectedLabel {
                    expected: "end of line".to_string(),
                    found: extra.to_string(),
                },
            ));
        }

        PercentileLatency::new(values).map_err(|e| (BlockField::PercentileLine, e.into()))
    }

    fn parse_throughput(&self, line: &str) -> Result<f64, ParseFailure> {
        let (label, value) = line.split_once(':').ok_or(ParseFailure::Missing)?;
        let label = label.trim();
        if !label.eq_ignore_ascii_case(&self.layout.throughput_label) {
            return Err(ParseFailure::UnexpectedLabel {
                expected: self.layout.throughput_label.clone(),
                found: label.to_string(),
            });
        }

        parse_float(value.trim())
    }
}

/// Lazy sequence of records from one stream, see [LogParser::parse_str].
pub struct Records<'p, L> {
    parser: &'p LogParser,
    lines: L,
    block_index: usize,
    finished: bool,
}

impl<'p, L> Records<'p, L>
where
    L: Iterator<Item = io::Result<String>>,
{
    fn new(parser: &'p LogParser, lines: L) -> Self {
        Self {
            parser,
            lines,
            block_index: 0,
            finished: false,
        }
    }

    fn fail(&mut self, line_in_block: usize, line: String, reason: ParseFailure) -> ParseError {
        self.finished = true;
        ParseError {
            origin: self.parser.origin.clone(),
            block_index: self.block_index,
            line_in_block,
            field: self.parser.layout.field_at(line_in_block),
            line,
            reason,
        }
    }

    /// The next non blank line, `Ok(None)` at the end of the stream.
    fn first_line(&mut self) -> Result<Option<String>, ParseError> {
        while let Some(line) = self.lines.next() {
            match line {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => return Ok(Some(line)),
                Err(e) => return Err(self.fail(0, String::new(), ParseFailure::Read(e.to_string()))),
            }
        }
        Ok(None)
    }
}

impl<L> Iterator for Records<'_, L>
where
    L: Iterator<Item = io::Result<String>>,
{
    type Item = Result<RunRecord, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let first = match self.first_line() {
            Ok(Some(line)) => line,
            Ok(None) => {
                self.finished = true;
                return None;
            }
            Err(e) => return Some(Err(e)),
        };

        let lines_per_block = self.parser.layout.lines_per_block();
        let mut block = Vec::with_capacity(lines_per_block);
        block.push(first);
        while block.len() < lines_per_block {
            match self.lines.next() {
                Some(Ok(line)) => block.push(line),
                Some(Err(e)) => {
                    let at = block.len();
                    return Some(Err(self.fail(
                        at,
                        String::new(),
                        ParseFailure::Read(e.to_string()),
                    )));
                }
                None => {
                    let at = block.len();
                    return Some(Err(self.fail(at, String::new(), ParseFailure::Truncated)));
                }
            }
        }

        match self.parser.parse_block(&block) {
            Ok(record) => {
                self.block_index += 1;
                Some(Ok(record))
            }
            Err((at, field, reason)) => {
                let line = block.swap_remove(at);
                let mut err = self.fail(at, line, reason);
                err.field = field;
                Some(Err(err))
            }
        }
    }
}

impl<L> FusedIterator for Records<'_, L> where L: Iterator<Item = io::Result<String>> {}

fn split_key_value<'a>(token: &'a str, separators: &[char]) -> Option<(&'a str, &'a str)> {
    let (key, value) = token.split_once(separators)?;
    (!key.is_empty() && !value.is_empty()).then_some((key, value))
}

/// `50 10`, `50th: 10`, `p50 10` or `50th:10`.
fn split_percentile_pair(pair: &str) -> Option<(&str, &str)> {
    let mut parts = pair.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(label), Some(value), None) => Some((label, value)),
        (Some(token), None, None) => token
            .split_once(':')
            .filter(|(label, value)| !label.is_empty() && !value.is_empty()),
        _ => None,
    }
}

fn parse_percentile_label(label: &str) -> Option<u32> {
    let label = label.trim_end_matches(':');
    let label = label
        .strip_prefix(['p', 'P'])
        .unwrap_or(label);
    let label = label.strip_suffix("th").unwrap_or(label);
    label.parse().ok()
}

fn percentile_field(percentile: Percentile) -> BlockField {
    match percentile {
        Percentile::P50 => BlockField::P50,
        Percentile::P90 => BlockField::P90,
        Percentile::P95 => BlockField::P95,
        Percentile::P99 => BlockField::P99,
    }
}

fn parse_float(value: &str) -> Result<f64, ParseFailure> {
    value.parse::<f64>().map_err(|_| ParseFailure::InvalidNumber {
        value: value.to_string(),
    })
}
