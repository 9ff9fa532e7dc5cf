//! Sample-typed aggregators.
//!
//! One generic [`Aggregator`] serves every plain processing block and one
//! [`KeyedAggregator`] serves every block whose samples are split by a small
//! closed key. The remaining types add side counters (decoder iterations, CRC
//! outcomes) or slot-tagged latency extrema on top of the same
//! [`BlockAggregate`].

use std::fmt;
use std::marker::PhantomData;

use super::aggregate::{BlockAggregate, BlockTotals, CounterAggregate, CounterTotals};
use super::notifier::MetricNotifier;
use super::packed::{SlotLatency, SlotLatencyExtremum};
use super::sample::{
    BlockSample, DecodeOutcome, KeyedSample, LdpcDecoderSample, MetricKey, SlotSample,
};

/// Aggregates one stream of `S` samples.
pub struct Aggregator<S> {
    block: BlockAggregate,
    _sample: PhantomData<fn(&S)>,
}

impl<S> Aggregator<S> {
    pub fn new() -> Self {
        Self {
            block: BlockAggregate::new(),
            _sample: PhantomData,
        }
    }

    pub fn totals(&self) -> BlockTotals {
        self.block.totals()
    }

    /// Reads and resets.
    pub fn take(&self) -> BlockTotals {
        self.block.take()
    }

    pub fn reset(&self) {
        self.block.reset();
    }
}

impl<S: BlockSample> MetricNotifier<S> for Aggregator<S> {
    #[inline]
    fn on_new_metric(&self, sample: &S) {
        self.block
            .record(sample.units(), sample.elapsed(), sample.cpu_time());
    }
}

impl<S> Default for Aggregator<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for Aggregator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregator")
            .field("totals", &self.block.totals())
            .finish()
    }
}

/// Aggregates `S` samples into one bucket per tracked key plus a trailing
/// "other" bucket.
pub struct KeyedAggregator<S: KeyedSample> {
    buckets: Box<[BlockAggregate]>,
    _sample: PhantomData<fn(&S)>,
}

impl<S: KeyedSample> KeyedAggregator<S> {
    pub fn new() -> Self {
        Self {
            buckets: (0..S::Key::nof_buckets())
                .map(|_| BlockAggregate::new())
                .collect(),
            _sample: PhantomData,
        }
    }

    /// Bucket that samples carrying `key` fold into.
    #[inline]
    pub fn select(&self, key: S::Key) -> &BlockAggregate {
        &self.buckets[Self::index(key)]
    }

    pub fn other(&self) -> &BlockAggregate {
        &self.buckets[S::Key::TRACKED.len()]
    }

    /// Reads and resets every bucket, in bucket order.
    pub fn take(&self) -> impl Iterator<Item = BlockTotals> + '_ {
        self.buckets.iter().map(BlockAggregate::take)
    }

    pub fn totals(&self) -> impl Iterator<Item = BlockTotals> + '_ {
        self.buckets.iter().map(BlockAggregate::totals)
    }

    pub fn reset(&self) {
        self.buckets.iter().for_each(BlockAggregate::reset);
    }

    #[inline]
    fn index(key: S::Key) -> usize {
        let other = S::Key::TRACKED.len();
        key.bucket().filter(|&i| i < other).unwrap_or(other)
    }
}

impl<S: KeyedSample> MetricNotifier<S> for KeyedAggregator<S> {
    #[inline]
    fn on_new_metric(&self, sample: &S) {
        self.select(sample.key())
            .record(sample.units(), sample.elapsed(), sample.cpu_time());
    }
}

impl<S: KeyedSample> Default for KeyedAggregator<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: KeyedSample> fmt::Debug for KeyedAggregator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                S::Key::TRACKED
                    .iter()
                    .chain(std::iter::once(&"other"))
                    .zip(self.totals()),
            )
            .finish()
    }
}

/// LDPC decoder: block statistics plus iteration and codeblock CRC counters.
#[derive(Debug, Default)]
pub struct LdpcDecoderAggregator {
    block: BlockAggregate,
    iterations: CounterAggregate,
    crc: CounterAggregate,
}

/// Read-out of an [`LdpcDecoderAggregator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LdpcDecoderTotals {
    pub block: BlockTotals,
    /// `sum` is the total number of iterations.
    pub iterations: CounterTotals,
    /// `sum` is the number of codeblocks whose CRC matched.
    pub crc: CounterTotals,
}

impl LdpcDecoderTotals {
    pub fn nof_crc_failures(&self) -> u64 {
        self.crc.count.saturating_sub(self.crc.sum)
    }
}

impl LdpcDecoderAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> LdpcDecoderTotals {
        LdpcDecoderTotals {
            block: self.block.take(),
            iterations: self.iterations.take(),
            crc: self.crc.take(),
        }
    }

    pub fn reset(&self) {
        self.block.reset();
        self.iterations.reset();
        self.crc.reset();
    }
}

impl MetricNotifier<LdpcDecoderSample> for LdpcDecoderAggregator {
    #[inline]
    fn on_new_metric(&self, sample: &LdpcDecoderSample) {
        self.block
            .record(sample.units(), sample.elapsed, sample.cpu_time);
        self.iterations.add(u64::from(sample.nof_iterations));
        self.crc.add(u64::from(sample.crc_ok));
    }
}

/// Transport block decoder: block statistics plus CRC OK/KO counts.
pub struct DecoderAggregator<S> {
    block: BlockAggregate,
    crc: CounterAggregate,
    _sample: PhantomData<fn(&S)>,
}

/// Read-out of a [`DecoderAggregator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderTotals {
    pub block: BlockTotals,
    /// `sum` is the number of transport blocks whose CRC matched.
    pub crc: CounterTotals,
}

impl<S> DecoderAggregator<S> {
    pub fn new() -> Self {
        Self {
            block: BlockAggregate::new(),
            crc: CounterAggregate::new(),
            _sample: PhantomData,
        }
    }

    pub fn take(&self) -> DecoderTotals {
        DecoderTotals {
            block: self.block.take(),
            crc: self.crc.take(),
        }
    }

    pub fn reset(&self) {
        self.block.reset();
        self.crc.reset();
    }
}

impl<S: DecodeOutcome> MetricNotifier<S> for DecoderAggregator<S> {
    #[inline]
    fn on_new_metric(&self, sample: &S) {
        self.block
            .record(sample.units(), sample.elapsed(), sample.cpu_time());
        self.crc.add(u64::from(sample.crc_ok()));
    }
}

impl<S> Default for DecoderAggregator<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Channel processor: block statistics plus the slots in which the minimum and
/// maximum latencies occurred.
pub struct ProcessorAggregator<S> {
    block: BlockAggregate,
    min_latency: SlotLatencyExtremum,
    max_latency: SlotLatencyExtremum,
    crc: CounterAggregate,
    _sample: PhantomData<fn(&S)>,
}

/// Read-out of a [`ProcessorAggregator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorTotals {
    pub block: BlockTotals,
    pub min_latency: Option<SlotLatency>,
    pub max_latency: Option<SlotLatency>,
    /// Only fed by samples that carry a CRC outcome.
    pub crc: CounterTotals,
}

impl<S> ProcessorAggregator<S> {
    pub fn new() -> Self {
        Self {
            block: BlockAggregate::new(),
            min_latency: SlotLatencyExtremum::min(),
            max_latency: SlotLatencyExtremum::max(),
            crc: CounterAggregate::new(),
            _sample: PhantomData,
        }
    }

    pub fn min_latency(&self) -> Option<SlotLatency> {
        self.min_latency.get()
    }

    pub fn max_latency(&self) -> Option<SlotLatency> {
        self.max_latency.get()
    }

    pub fn take(&self) -> ProcessorTotals {
        ProcessorTotals {
            block: self.block.take(),
            min_latency: self.min_latency.take(),
            max_latency: self.max_latency.take(),
            crc: self.crc.take(),
        }
    }

    pub fn reset(&self) {
        self.block.reset();
        self.min_latency.reset();
        self.max_latency.reset();
        self.crc.reset();
    }
}

impl<S: SlotSample> MetricNotifier<S> for ProcessorAggregator<S> {
    #[inline]
    fn on_new_metric(&self, sample: &S) {
        let elapsed = sample.elapsed();
        self.block
            .record(sample.units(), elapsed, sample.cpu_time());

        let tagged = SlotLatency {
            latency: elapsed,
            slot: sample.slot(),
        };
        self.min_latency.update(tagged);
        self.max_latency.update(tagged);

        if let Some(ok) = sample.crc_ok() {
            self.crc.add(u64::from(ok));
        }
    }
}

impl<S> Default for ProcessorAggregator<S> {
    fn default() -> Self {
        Self::new()
    }
}
