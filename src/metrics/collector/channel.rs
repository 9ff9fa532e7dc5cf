use std::time::Duration;

use super::DomainCollector;
use crate::metrics::aggregator::Aggregator;
use crate::metrics::notifier::MetricNotifier;
use crate::metrics::sample::{ChannelEstimatorSample, EqualizerSample, TransformPrecoderSample};
use crate::metrics::snapshot::{ChannelProcessingMetrics, FromTotals, RateMetrics};

/// Uplink channel processing: estimation, equalization and transform
/// precoding, all measured in resource elements.
#[derive(Debug, Default)]
pub struct ChannelProcessingCollector {
    estimator: Aggregator<ChannelEstimatorSample>,
    equalizer: Aggregator<EqualizerSample>,
    transform_precoder: Aggregator<TransformPrecoderSample>,
}

impl ChannelProcessingCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn estimator_notifier(&self) -> &dyn MetricNotifier<ChannelEstimatorSample> {
        &self.estimator
    }

    pub fn equalizer_notifier(&self) -> &dyn MetricNotifier<EqualizerSample> {
        &self.equalizer
    }

    pub fn transform_precoder_notifier(&self) -> &dyn MetricNotifier<TransformPrecoderSample> {
        &self.transform_precoder
    }
}

impl DomainCollector for ChannelProcessingCollector {
    type Metrics = ChannelProcessingMetrics;

    fn collect_metrics(&self, period: Duration) -> ChannelProcessingMetrics {
        ChannelProcessingMetrics {
            channel_estimator: RateMetrics::from_totals(&self.estimator.take(), period),
            equalizer: RateMetrics::from_totals(&self.equalizer.take(), period),
            transform_precoder: RateMetrics::from_totals(&self.transform_precoder.take(), period),
        }
    }

    fn reset(&self) {
        self.estimator.reset();
        self.equalizer.reset();
        self.transform_precoder.reset();
    }
}
