use std::time::Duration;

use super::DomainCollector;
use crate::metrics::aggregator::{Aggregator, ProcessorAggregator};
use crate::metrics::notifier::MetricNotifier;
use crate::metrics::sample::{PdschEncoderSample, PdschProcessorSample};
use crate::metrics::snapshot::{FromTotals, PdschMetrics, ProcessorMetrics, ThroughputMetrics};

/// PDSCH processor and transport block encoder.
#[derive(Default)]
pub struct PdschCollector {
    processor: ProcessorAggregator<PdschProcessorSample>,
    encoder: Aggregator<PdschEncoderSample>,
}

impl PdschCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn processor_notifier(&self) -> &dyn MetricNotifier<PdschProcessorSample> {
        &self.processor
    }

    pub fn encoder_notifier(&self) -> &dyn MetricNotifier<PdschEncoderSample> {
        &self.encoder
    }
}

impl DomainCollector for PdschCollector {
    type Metrics = PdschMetrics;

    fn collect_metrics(&self, period: Duration) -> PdschMetrics {
        PdschMetrics {
            processor: ProcessorMetrics::from_processor(&self.processor.take(), period),
            fec: ThroughputMetrics::from_totals(&self.encoder.take(), period),
        }
    }

    fn reset(&self) {
        self.processor.reset();
        self.encoder.reset();
    }
}
