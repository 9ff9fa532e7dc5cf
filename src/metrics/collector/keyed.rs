use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

use super::DomainCollector;
use crate::metrics::aggregator::KeyedAggregator;
use crate::metrics::notifier::MetricNotifier;
use crate::metrics::sample::{CrcSample, KeyedSample, ModulationSample, PrecodingSample, ScramblingSample};
use crate::metrics::snapshot::{FromTotals, KeyedMetrics, RateMetrics, SymbolRateMetrics, ThroughputMetrics};

/// Collector for one keyed block, reporting one `M` per bucket.
pub struct KeyedCollector<S: KeyedSample, M> {
    aggregator: KeyedAggregator<S>,
    _metrics: PhantomData<fn() -> M>,
}

pub type CrcCollector = KeyedCollector<CrcSample, ThroughputMetrics>;
pub type ScramblingCollector = KeyedCollector<ScramblingSample, ThroughputMetrics>;
pub type ModulationCollector = KeyedCollector<ModulationSample, SymbolRateMetrics>;
pub type PrecodingCollector = KeyedCollector<PrecodingSample, RateMetrics>;

impl<S: KeyedSample, M> KeyedCollector<S, M> {
    pub fn new() -> Self {
        Self {
            aggregator: KeyedAggregator::new(),
            _metrics: PhantomData,
        }
    }

    pub fn notifier(&self) -> &dyn MetricNotifier<S> {
        &self.aggregator
    }
}

impl<S: KeyedSample, M: FromTotals> DomainCollector for KeyedCollector<S, M> {
    type Metrics = KeyedMetrics<S::Key, M>;

    fn collect_metrics(&self, period: Duration) -> Self::Metrics {
        KeyedMetrics::from_totals(self.aggregator.take(), period)
    }

    fn reset(&self) {
        self.aggregator.reset();
    }
}

impl<S: KeyedSample, M> Default for KeyedCollector<S, M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: KeyedSample, M> fmt::Debug for KeyedCollector<S, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedCollector")
            .field("aggregator", &self.aggregator)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::sample::{CrcPolynomial, ModulationScheme, ScramblingMethod};

    #[test]
    fn test_crc_collector_reports_every_bucket() {
        let collector = CrcCollector::new();
        let notifier = collector.notifier();
        for (polynomial, nof_bits) in [
            (CrcPolynomial::Crc24A, 1_000),
            (CrcPolynomial::Crc24A, 3_000),
            (CrcPolynomial::Crc11, 11),
        ] {
            notifier.on_new_metric(&CrcSample {
                polynomial,
                nof_bits,
                elapsed: Duration::from_micros(1),
                cpu_time: Duration::from_micros(1),
            });
        }

        let m = collector.collect_metrics(Duration::from_secs(1));
        let crc24a = m.get(CrcPolynomial::Crc24A);
        assert_eq!(crc24a.latency.nof_calls, 2);
        assert!((crc24a.average_block_size_bits - 2_000.0).abs() < 1e-9);
        // 4000 bits over 2us.
        assert!((crc24a.average_throughput_mbps - 2_000.0).abs() < 1e-9);
        assert_eq!(m.get(CrcPolynomial::Crc16).latency.nof_calls, 0);
        assert_eq!(m.other().latency.nof_calls, 1);
        assert_eq!(m.iter().count(), 5);

        let again = collector.collect_metrics(Duration::from_secs(1));
        assert_eq!(again, KeyedMetrics::default());
    }

    #[test]
    fn test_scrambling_collector_splits_methods() {
        let collector = ScramblingCollector::new();
        for method in [ScramblingMethod::Init, ScramblingMethod::Generate, ScramblingMethod::Generate] {
            collector.notifier().on_new_metric(&ScramblingSample {
                method,
                nof_bits: 64,
                elapsed: Duration::from_nanos(100),
                cpu_time: Duration::from_nanos(100),
            });
        }
        let m = collector.collect_metrics(Duration::from_millis(10));
        assert_eq!(m.get(ScramblingMethod::Init).latency.nof_calls, 1);
        assert_eq!(m.get(ScramblingMethod::Advance).latency.nof_calls, 0);
        assert_eq!(m.get(ScramblingMethod::Generate).latency.nof_calls, 2);
        assert_eq!(m.other().latency.nof_calls, 0);
    }

    #[test]
    fn test_modulation_collector_reset() {
        let collector = ModulationCollector::new();
        collector.notifier().on_new_metric(&ModulationSample {
            scheme: ModulationScheme::Qam256,
            nof_symbols: 1_200,
            elapsed: Duration::from_micros(3),
            cpu_time: Duration::from_micros(3),
        });
        collector.reset();
        let m = collector.collect_metrics(Duration::from_secs(1));
        assert_eq!(m, KeyedMetrics::default());
    }
}
