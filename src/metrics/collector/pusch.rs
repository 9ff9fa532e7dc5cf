use std::time::Duration;

use super::DomainCollector;
use crate::metrics::aggregator::{DecoderAggregator, ProcessorAggregator};
use crate::metrics::notifier::MetricNotifier;
use crate::metrics::sample::{PuschDecoderSample, PuschProcessorSample};
use crate::metrics::snapshot::{PuschMetrics, PuschProcessorMetrics, TbDecoderMetrics};

/// PUSCH processor and transport block decoder.
#[derive(Default)]
pub struct PuschCollector {
    processor: ProcessorAggregator<PuschProcessorSample>,
    decoder: DecoderAggregator<PuschDecoderSample>,
}

impl PuschCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn processor_notifier(&self) -> &dyn MetricNotifier<PuschProcessorSample> {
        &self.processor
    }

    pub fn decoder_notifier(&self) -> &dyn MetricNotifier<PuschDecoderSample> {
        &self.decoder
    }
}

impl DomainCollector for PuschCollector {
    type Metrics = PuschMetrics;

    fn collect_metrics(&self, period: Duration) -> PuschMetrics {
        PuschMetrics {
            processor: PuschProcessorMetrics::from_processor(&self.processor.take(), period),
            fec: TbDecoderMetrics::from_decoder(&self.decoder.take(), period),
        }
    }

    fn reset(&self) {
        self.processor.reset();
        self.decoder.reset();
    }
}
