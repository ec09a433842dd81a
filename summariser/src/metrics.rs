//! Dimensionless metrics derived from a single [RunRecord].
//!
//! Load is normalised by service capacity so sweeps with different μ or core counts share an
//! x-axis. Latency is expressed in mean service times.

use schedsim_sweep_model::{InvalidMetricInput, NormalizationRule, Percentile, RunRecord};
use serde::{Deserialize, Serialize};

use crate::aggregator::MetricSelector;

/// ρ: achieved throughput over service capacity.
///
/// `X / μ` for a single queue, `X / (cores × μ)` for multi-core sweeps.
pub fn normalized_load(
    record: &RunRecord,
    rule: NormalizationRule,
) -> Result<f64, InvalidMetricInput> {
    let mu = checked_service_rate(record)?;
    match rule {
        NormalizationRule::SingleQueue => Ok(record.achieved_throughput() / mu),
        NormalizationRule::MultiCore => {
            let cores = record
                .load()
                .core_count()
                .ok_or(InvalidMetricInput::MissingCoreCount)?;
            if cores == 0 {
                return Err(InvalidMetricInput::ZeroCores);
            }
            Ok(record.achieved_throughput() / (f64::from(cores) * mu))
        }
    }
}

/// The selected latency multiplied by μ.
pub fn normalized_latency(
    record: &RunRecord,
    selector: MetricSelector,
) -> Result<f64, InvalidMetricInput> {
    let mu = checked_service_rate(record)?;
    Ok(raw_latency(record, selector) * mu)
}

fn raw_latency(record: &RunRecord, selector: MetricSelector) -> f64 {
    match selector.percentile() {
        Some(percentile) => record.percentile_latency().get(percentile),
        None => record.average_latency(),
    }
}

fn checked_service_rate(record: &RunRecord) -> Result<f64, InvalidMetricInput> {
    let mu = record.service_rate();
    if mu.is_finite() && mu > 0.0 {
        Ok(mu)
    } else {
        Err(InvalidMetricInput::NonPositiveServiceRate(mu))
    }
}

/// Every normalised metric of one record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub normalized_load: f64,
    pub average: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl DerivedMetrics {
    pub fn latency(&self, selector: MetricSelector) -> f64 {
        match selector {
            MetricSelector::Average => self.average,
            MetricSelector::P50 => self.p50,
            MetricSelector::P90 => self.p90,
            MetricSelector::P95 => self.p95,
            MetricSelector::P99 => self.p99,
        }
    }
}

pub fn derive(
    record: &RunRecord,
    rule: NormalizationRule,
) -> Result<DerivedMetrics, InvalidMetricInput> {
    let normalized_load = normalized_load(record, rule)?;
    let mu = checked_service_rate(record)?;
    let latency = |percentile| record.percentile_latency().get(percentile) * mu;

    Ok(DerivedMetrics {
        normalized_load,
        average: record.average_latency() * mu,
        p50: latency(Percentile::P50),
        p90: latency(Percentile::P90),
        p95: latency(Percentile::P95),
        p99: latency(Percentile::P99),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use schedsim_sweep_model::{BlockLayout, LoadDescriptor, LogParser, PercentileLatency};

    fn record(service_rate: f64, load: LoadDescriptor, throughput: f64) -> RunRecord {
        RunRecord::new(
            service_rate,
            load,
            throughput,
            12.5,
            PercentileLatency::new([10.0, 20.0, 25.0, 40.0]).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn multi_core_block_end_to_end() {
        let input = "cores:4\tmu=0.2\n... avg 12.5\n50 10\t90 20\t95 25\t99 40\nthroughput: 0.75\n";
        let records = LogParser::new(BlockLayout::multi_core())
            .parse_all(input)
            .unwrap();

        assert_eq!(
            normalized_load(&records[0], NormalizationRule::MultiCore).unwrap(),
            0.9375
        );
        assert_eq!(
            normalized_latency(&records[0], MetricSelector::P99).unwrap(),
            8.0
        );
    }

    #[test]
    fn single_queue_divides_by_service_rate() {
        let r = record(0.5, LoadDescriptor::ArrivalRate(0.25), 0.25);
        assert_eq!(normalized_load(&r, NormalizationRule::SingleQueue).unwrap(), 0.5);
        assert_eq!(normalized_latency(&r, MetricSelector::Average).unwrap(), 6.25);
    }

    #[test]
    fn derive_is_deterministic() {
        let r = record(0.2, LoadDescriptor::CoreCount(4), 0.75);
        let first = derive(&r, NormalizationRule::MultiCore).unwrap();
        let second = derive(&r, NormalizationRule::MultiCore).unwrap();

        assert_eq!(first.normalized_load.to_bits(), second.normalized_load.to_bits());
        assert_eq!(first.p99.to_bits(), second.p99.to_bits());
        assert_eq!(first.latency(MetricSelector::P99), 8.0);
        assert_eq!(
            first.latency(MetricSelector::P50),
            normalized_latency(&r, MetricSelector::P50).unwrap()
        );
    }

    #[test]
    fn rejects_invalid_inputs() {
        let zero_mu = record(0.0, LoadDescriptor::ArrivalRate(0.1), 0.1);
        assert_eq!(
            normalized_load(&zero_mu, NormalizationRule::SingleQueue),
            Err(InvalidMetricInput::NonPositiveServiceRate(0.0))
        );
        assert!(normalized_latency(&zero_mu, MetricSelector::P99).is_err());

        let negative_mu = record(-0.2, LoadDescriptor::CoreCount(4), 0.1);
        assert!(derive(&negative_mu, NormalizationRule::MultiCore).is_err());

        let no_cores = record(0.2, LoadDescriptor::CoreCount(0), 0.1);
        assert_eq!(
            normalized_load(&no_cores, NormalizationRule::MultiCore),
            Err(InvalidMetricInput::ZeroCores)
        );

        let single_queue = record(0.2, LoadDescriptor::ArrivalRate(0.1), 0.1);
        assert_eq!(
            normalized_load(&single_queue, NormalizationRule::MultiCore),
            Err(InvalidMetricInput::MissingCoreCount)
        );
    }
}
