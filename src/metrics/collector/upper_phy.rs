use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{
    ChannelProcessingCollector, CrcCollector, DomainCollector, LdpcDecoderCollector,
    LdpcEncoderCollector, ModulationCollector, PdschCollector, PrecodingCollector, PuschCollector,
    ScramblingCollector,
};
use crate::clock::TimeSource;
use crate::metrics::aggregate::duration_as_ns;
use crate::metrics::notifier::MetricNotifier;
use crate::metrics::sample::{
    ChannelEstimatorSample, CrcSample, EqualizerSample, LdpcDecoderSample, LdpcEncoderSample,
    LdpcRateDematcherSample, LdpcRateMatcherSample, ModulationSample, PdschEncoderSample,
    PdschProcessorSample, PrecodingSample, PuschDecoderSample, PuschProcessorSample,
    ScramblingSample, TransformPrecoderSample,
};
use crate::metrics::snapshot::{DlMetrics, UlMetrics, UpperPhyMetrics};

/// Marks a collector that has not collected yet.
const UNINITIALIZED: u64 = u64::MAX;

/// Every leaf notifier of one sector's upper PHY.
///
/// Used once at startup to wire each instrumented block to its aggregator.
pub trait UpperPhyNotifiers: Send + Sync {
    fn pdsch_processor(&self) -> &dyn MetricNotifier<PdschProcessorSample>;
    fn pdsch_encoder(&self) -> &dyn MetricNotifier<PdschEncoderSample>;
    fn ldpc_encoder(&self) -> &dyn MetricNotifier<LdpcEncoderSample>;
    fn ldpc_rate_matcher(&self) -> &dyn MetricNotifier<LdpcRateMatcherSample>;
    fn dl_crc(&self) -> &dyn MetricNotifier<CrcSample>;
    fn dl_scrambling(&self) -> &dyn MetricNotifier<ScramblingSample>;
    fn modulation_mapper(&self) -> &dyn MetricNotifier<ModulationSample>;
    fn precoding_layer_mapping(&self) -> &dyn MetricNotifier<PrecodingSample>;

    fn pusch_processor(&self) -> &dyn MetricNotifier<PuschProcessorSample>;
    fn pusch_decoder(&self) -> &dyn MetricNotifier<PuschDecoderSample>;
    fn ldpc_decoder(&self) -> &dyn MetricNotifier<LdpcDecoderSample>;
    fn ldpc_rate_dematcher(&self) -> &dyn MetricNotifier<LdpcRateDematcherSample>;
    fn ul_crc(&self) -> &dyn MetricNotifier<CrcSample>;
    fn ul_scrambling(&self) -> &dyn MetricNotifier<ScramblingSample>;
    fn demodulation_mapper(&self) -> &dyn MetricNotifier<ModulationSample>;
    fn channel_estimator(&self) -> &dyn MetricNotifier<ChannelEstimatorSample>;
    fn equalizer(&self) -> &dyn MetricNotifier<EqualizerSample>;
    fn transform_precoder(&self) -> &dyn MetricNotifier<TransformPrecoderSample>;
}

/// Collector for one sector's upper PHY.
///
/// The first [`collect_metrics`](Self::collect_metrics) call only seeds the
/// period baseline: it discards everything aggregated so far and returns an
/// empty snapshot with a zero period. Later calls report the time elapsed
/// since the previous call.
pub struct UpperPhyCollector {
    sector_id: usize,
    time: Arc<dyn TimeSource>,
    /// Nanoseconds on `time` at the previous collection.
    last_collected_at: AtomicU64,

    pdsch: PdschCollector,
    ldpc_encoder: LdpcEncoderCollector,
    dl_crc: CrcCollector,
    dl_scrambling: ScramblingCollector,
    modulation: ModulationCollector,
    precoding: PrecodingCollector,

    pusch: PuschCollector,
    ldpc_decoder: LdpcDecoderCollector,
    ul_crc: CrcCollector,
    ul_scrambling: ScramblingCollector,
    demodulation: ModulationCollector,
    channel: ChannelProcessingCollector,
}

impl UpperPhyCollector {
    pub fn new(sector_id: usize, time: Arc<dyn TimeSource>) -> Self {
        Self {
            sector_id,
            time,
            last_collected_at: AtomicU64::new(UNINITIALIZED),
            pdsch: PdschCollector::new(),
            ldpc_encoder: LdpcEncoderCollector::new(),
            dl_crc: CrcCollector::new(),
            dl_scrambling: ScramblingCollector::new(),
            modulation: ModulationCollector::new(),
            precoding: PrecodingCollector::new(),
            pusch: PuschCollector::new(),
            ldpc_decoder: LdpcDecoderCollector::new(),
            ul_crc: CrcCollector::new(),
            ul_scrambling: ScramblingCollector::new(),
            demodulation: ModulationCollector::new(),
            channel: ChannelProcessingCollector::new(),
        }
    }

    pub fn sector_id(&self) -> usize {
        self.sector_id
    }

    pub fn get_notifiers(&self) -> &dyn UpperPhyNotifiers {
        self
    }

    /// Whether a baseline has been taken.
    pub fn is_initialized(&self) -> bool {
        self.last_collected_at.load(Ordering::Relaxed) != UNINITIALIZED
    }

    /// Drains every aggregator into a snapshot.
    ///
    /// Must not be called from more than one thread at a time.
    pub fn collect_metrics(&self) -> UpperPhyMetrics {
        let now = duration_as_ns(self.time.now()).min(UNINITIALIZED - 1);
        let previous = self.last_collected_at.swap(now, Ordering::Relaxed);

        if previous == UNINITIALIZED {
            self.reset();
            return UpperPhyMetrics::empty(self.sector_id);
        }

        let period = Duration::from_nanos(now.saturating_sub(previous));

        UpperPhyMetrics {
            sector_id: self.sector_id,
            metrics_period: period,
            dl: DlMetrics {
                pdsch: self.pdsch.collect_metrics(period),
                ldpc: self.ldpc_encoder.collect_metrics(period),
                crc: self.dl_crc.collect_metrics(period),
                scrambling: self.dl_scrambling.collect_metrics(period),
                modulation_mapper: self.modulation.collect_metrics(period),
                precoding_layer_mapping: self.precoding.collect_metrics(period),
            },
            ul: UlMetrics {
                pusch: self.pusch.collect_metrics(period),
                ldpc: self.ldpc_decoder.collect_metrics(period),
                crc: self.ul_crc.collect_metrics(period),
                scrambling: self.ul_scrambling.collect_metrics(period),
                demodulation_mapper: self.demodulation.collect_metrics(period),
                channel: self.channel.collect_metrics(period),
            },
        }
    }

    /// Discards everything aggregated so far. The period baseline is kept.
    pub fn reset(&self) {
        self.pdsch.reset();
        self.ldpc_encoder.reset();
        self.dl_crc.reset();
        self.dl_scrambling.reset();
        self.modulation.reset();
        self.precoding.reset();
        self.pusch.reset();
        self.ldpc_decoder.reset();
        self.ul_crc.reset();
        self.ul_scrambling.reset();
        self.demodulation.reset();
        self.channel.reset();
    }
}

impl std::fmt::Debug for UpperPhyCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpperPhyCollector")
            .field("sector_id", &self.sector_id)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl UpperPhyNotifiers for UpperPhyCollector {
    fn pdsch_processor(&self) -> &dyn MetricNotifier<PdschProcessorSample> {
        self.pdsch.processor_notifier()
    }

    fn pdsch_encoder(&self) -> &dyn MetricNotifier<PdschEncoderSample> {
        self.pdsch.encoder_notifier()
    }

    fn ldpc_encoder(&self) -> &dyn MetricNotifier<LdpcEncoderSample> {
        self.ldpc_encoder.encoder_notifier()
    }

    fn ldpc_rate_matcher(&self) -> &dyn MetricNotifier<LdpcRateMatcherSample> {
        self.ldpc_encoder.rate_matcher_notifier()
    }

    fn dl_crc(&self) -> &dyn MetricNotifier<CrcSample> {
        self.dl_crc.notifier()
    }

    fn dl_scrambling(&self) -> &dyn MetricNotifier<ScramblingSample> {
        self.dl_scrambling.notifier()
    }

    fn modulation_mapper(&self) -> &dyn MetricNotifier<ModulationSample> {
        self.modulation.notifier()
    }

    fn precoding_layer_mapping(&self) -> &dyn MetricNotifier<PrecodingSample> {
        self.precoding.notifier()
    }

    fn pusch_processor(&self) -> &dyn MetricNotifier<PuschProcessorSample> {
        self.pusch.processor_notifier()
    }

    fn pusch_decoder(&self) -> &dyn MetricNotifier<PuschDecoderSample> {
        self.pusch.decoder_notifier()
    }

    fn ldpc_decoder(&self) -> &dyn MetricNotifier<LdpcDecoderSample> {
        self.ldpc_decoder.decoder_notifier()
    }

    fn ldpc_rate_dematcher(&self) -> &dyn MetricNotifier<LdpcRateDematcherSample> {
        self.ldpc_decoder.rate_dematcher_notifier()
    }

    fn ul_crc(&self) -> &dyn MetricNotifier<CrcSample> {
        self.ul_crc.notifier()
    }

    fn ul_scrambling(&self) -> &dyn MetricNotifier<ScramblingSample> {
        self.ul_scrambling.notifier()
    }

    fn demodulation_mapper(&self) -> &dyn MetricNotifier<ModulationSample> {
        self.demodulation.notifier()
    }

    fn channel_estimator(&self) -> &dyn MetricNotifier<ChannelEstimatorSample> {
        self.channel.estimator_notifier()
    }

    fn equalizer(&self) -> &dyn MetricNotifier<EqualizerSample> {
        self.channel.equalizer_notifier()
    }

    fn transform_precoder(&self) -> &dyn MetricNotifier<TransformPrecoderSample> {
        self.channel.transform_precoder_notifier()
    }
}
