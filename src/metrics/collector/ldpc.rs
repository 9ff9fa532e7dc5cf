use std::time::Duration;

use super::DomainCollector;
use crate::metrics::aggregator::{Aggregator, LdpcDecoderAggregator};
use crate::metrics::notifier::MetricNotifier;
use crate::metrics::sample::{
    LdpcDecoderSample, LdpcEncoderSample, LdpcRateDematcherSample, LdpcRateMatcherSample,
};
use crate::metrics::snapshot::{
    FromTotals, LdpcDecoderMetrics, LdpcDecodingMetrics, LdpcEncodingMetrics, ThroughputMetrics,
};

/// Transmit-side LDPC: encoder and rate matcher.
#[derive(Debug, Default)]
pub struct LdpcEncoderCollector {
    encoder: Aggregator<LdpcEncoderSample>,
    rate_matcher: Aggregator<LdpcRateMatcherSample>,
}

impl LdpcEncoderCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encoder_notifier(&self) -> &dyn MetricNotifier<LdpcEncoderSample> {
        &self.encoder
    }

    pub fn rate_matcher_notifier(&self) -> &dyn MetricNotifier<LdpcRateMatcherSample> {
        &self.rate_matcher
    }
}

impl DomainCollector for LdpcEncoderCollector {
    type Metrics = LdpcEncodingMetrics;

    fn collect_metrics(&self, period: Duration) -> LdpcEncodingMetrics {
        LdpcEncodingMetrics {
            ldpc_encoder: ThroughputMetrics::from_totals(&self.encoder.take(), period),
            ldpc_rate_matcher: ThroughputMetrics::from_totals(&self.rate_matcher.take(), period),
        }
    }

    fn reset(&self) {
        self.encoder.reset();
        self.rate_matcher.reset();
    }
}

/// Receive-side LDPC: decoder and rate dematcher.
#[derive(Debug, Default)]
pub struct LdpcDecoderCollector {
    decoder: LdpcDecoderAggregator,
    rate_dematcher: Aggregator<LdpcRateDematcherSample>,
}

impl LdpcDecoderCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decoder_notifier(&self) -> &dyn MetricNotifier<LdpcDecoderSample> {
        &self.decoder
    }

    pub fn rate_dematcher_notifier(&self) -> &dyn MetricNotifier<LdpcRateDematcherSample> {
        &self.rate_dematcher
    }
}

impl DomainCollector for LdpcDecoderCollector {
    type Metrics = LdpcDecodingMetrics;

    fn collect_metrics(&self, period: Duration) -> LdpcDecodingMetrics {
        LdpcDecodingMetrics {
            ldpc_decoder: LdpcDecoderMetrics::from_decoder(&self.decoder.take(), period),
            ldpc_rate_dematcher: ThroughputMetrics::from_totals(
                &self.rate_dematcher.take(),
                period,
            ),
        }
    }

    fn reset(&self) {
        self.decoder.reset();
        self.rate_dematcher.reset();
    }
}
