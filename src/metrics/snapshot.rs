//! Snapshot value types produced by one collection.
//!
//! The tree mirrors the collector hierarchy: leaf structs hold the derived
//! read-out of one aggregator, domain structs group the leaves of one domain
//! collector and [`UpperPhyMetrics`] carries the collection period. Snapshots
//! hold no reference back into the collectors.

use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::aggregate::{BlockTotals, CounterTotals};
use super::aggregator::{DecoderTotals, LdpcDecoderTotals, ProcessorTotals};
use super::packed::{SlotIndex, SlotLatency};
use super::sample::{CrcPolynomial, LayerCount, MetricKey, ModulationScheme, ScramblingMethod};
use crate::render::finite;

/// Builds a leaf read-out from raw block totals.
pub trait FromTotals {
    fn from_totals(totals: &BlockTotals, period: Duration) -> Self;
}

/// Call count, latency and CPU load shared by every leaf.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencyMetrics {
    pub nof_calls: u64,
    #[serde(serialize_with = "finite")]
    pub average_latency_us: f64,
    #[serde(serialize_with = "finite")]
    pub min_latency_us: f64,
    #[serde(serialize_with = "finite")]
    pub max_latency_us: f64,
    #[serde(serialize_with = "finite")]
    pub cpu_usage_percent: f64,
}

impl FromTotals for LatencyMetrics {
    fn from_totals(totals: &BlockTotals, period: Duration) -> Self {
        Self {
            nof_calls: totals.count,
            average_latency_us: totals.average_latency_us(),
            min_latency_us: totals.min_latency_us(),
            max_latency_us: totals.max_latency_us(),
            cpu_usage_percent: totals.cpu_usage_percent(period),
        }
    }
}

/// Blocks measured in bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ThroughputMetrics {
    #[serde(flatten)]
    pub latency: LatencyMetrics,
    #[serde(serialize_with = "finite")]
    pub average_block_size_bits: f64,
    #[serde(serialize_with = "finite")]
    pub average_throughput_mbps: f64,
}

impl FromTotals for ThroughputMetrics {
    fn from_totals(totals: &BlockTotals, period: Duration) -> Self {
        Self {
            latency: LatencyMetrics::from_totals(totals, period),
            average_block_size_bits: totals.average_units(),
            average_throughput_mbps: totals.rate_mega(),
        }
    }
}

/// Blocks measured in resource elements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RateMetrics {
    #[serde(flatten)]
    pub latency: LatencyMetrics,
    #[serde(serialize_with = "finite")]
    pub average_nof_re: f64,
    #[serde(serialize_with = "finite")]
    pub processing_rate_mres: f64,
}

impl FromTotals for RateMetrics {
    fn from_totals(totals: &BlockTotals, period: Duration) -> Self {
        Self {
            latency: LatencyMetrics::from_totals(totals, period),
            average_nof_re: totals.average_units(),
            processing_rate_mres: totals.rate_mega(),
        }
    }
}

/// Blocks measured in modulation symbols.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SymbolRateMetrics {
    #[serde(flatten)]
    pub latency: LatencyMetrics,
    #[serde(serialize_with = "finite")]
    pub average_nof_symbols: f64,
    #[serde(serialize_with = "finite")]
    pub processing_rate_msymbols: f64,
}

impl FromTotals for SymbolRateMetrics {
    fn from_totals(totals: &BlockTotals, period: Duration) -> Self {
        Self {
            latency: LatencyMetrics::from_totals(totals, period),
            average_nof_symbols: totals.average_units(),
            processing_rate_msymbols: totals.rate_mega(),
        }
    }
}

/// CRC outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CrcCounts {
    pub nof_crc_ok: u64,
    pub nof_crc_ko: u64,
    #[serde(serialize_with = "finite")]
    pub crc_ok_percent: f64,
}

impl CrcCounts {
    /// `totals.sum` counts the passing checks out of `totals.count`.
    pub fn from_counter(totals: &CounterTotals) -> Self {
        Self {
            nof_crc_ok: totals.sum,
            nof_crc_ko: totals.count.saturating_sub(totals.sum),
            crc_ok_percent: totals.percent(),
        }
    }
}

/// Slot-tagged channel processor read-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProcessorMetrics {
    #[serde(flatten)]
    pub throughput: ThroughputMetrics,
    /// Slot of the fastest transmission, `None` when idle.
    pub min_latency_slot: Option<SlotIndex>,
    pub max_latency_slot: Option<SlotIndex>,
}

impl ProcessorMetrics {
    pub fn from_processor(totals: &ProcessorTotals, period: Duration) -> Self {
        let mut throughput = ThroughputMetrics::from_totals(&totals.block, period);
        // Report the extrema paired with their slot so value and tag agree.
        if let Some(min) = totals.min_latency {
            throughput.latency.min_latency_us = latency_us(min);
        }
        if let Some(max) = totals.max_latency {
            throughput.latency.max_latency_us = latency_us(max);
        }
        Self {
            throughput,
            min_latency_slot: totals.min_latency.map(|v| v.slot),
            max_latency_slot: totals.max_latency.map(|v| v.slot),
        }
    }
}

fn latency_us(value: SlotLatency) -> f64 {
    value.latency.as_nanos() as f64 / 1000.0
}

/// PUSCH processor read-out: slot-tagged latency plus CRC outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PuschProcessorMetrics {
    #[serde(flatten)]
    pub processor: ProcessorMetrics,
    #[serde(flatten)]
    pub crc: CrcCounts,
}

impl PuschProcessorMetrics {
    pub fn from_processor(totals: &ProcessorTotals, period: Duration) -> Self {
        Self {
            processor: ProcessorMetrics::from_processor(totals, period),
            crc: CrcCounts::from_counter(&totals.crc),
        }
    }
}

/// Transport block decoder read-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TbDecoderMetrics {
    #[serde(flatten)]
    pub throughput: ThroughputMetrics,
    #[serde(flatten)]
    pub crc: CrcCounts,
}

impl TbDecoderMetrics {
    pub fn from_decoder(totals: &DecoderTotals, period: Duration) -> Self {
        Self {
            throughput: ThroughputMetrics::from_totals(&totals.block, period),
            crc: CrcCounts::from_counter(&totals.crc),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LdpcDecoderMetrics {
    #[serde(flatten)]
    pub throughput: ThroughputMetrics,
    #[serde(serialize_with = "finite")]
    pub average_nof_iterations: f64,
    pub nof_crc_failures: u64,
}

impl LdpcDecoderMetrics {
    pub fn from_decoder(totals: &LdpcDecoderTotals, period: Duration) -> Self {
        Self {
            throughput: ThroughputMetrics::from_totals(&totals.block, period),
            average_nof_iterations: totals.iterations.average(),
            nof_crc_failures: totals.nof_crc_failures(),
        }
    }
}

/// One read-out per bucket of a keyed aggregator, serialized as an object
/// keyed by bucket label with `other` last.
pub struct KeyedMetrics<K, M> {
    buckets: Vec<M>,
    _key: PhantomData<fn() -> K>,
}

impl<K: MetricKey, M> KeyedMetrics<K, M> {
    /// Expects one entry per bucket, in bucket order.
    pub fn from_buckets(buckets: impl IntoIterator<Item = M>) -> Self {
        let buckets: Vec<M> = buckets.into_iter().collect();
        assert_eq!(
            buckets.len(),
            K::nof_buckets(),
            "keyed metrics need one entry per bucket"
        );
        Self {
            buckets,
            _key: PhantomData,
        }
    }

    pub fn get(&self, key: K) -> &M {
        match key.bucket() {
            Some(i) if i < K::TRACKED.len() => &self.buckets[i],
            _ => self.other(),
        }
    }

    pub fn other(&self) -> &M {
        &self.buckets[K::TRACKED.len()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &M)> {
        K::TRACKED
            .iter()
            .copied()
            .chain(std::iter::once("other"))
            .zip(self.buckets.iter())
    }
}

impl<K: MetricKey, M: FromTotals> KeyedMetrics<K, M> {
    pub fn from_totals(totals: impl IntoIterator<Item = BlockTotals>, period: Duration) -> Self {
        Self::from_buckets(totals.into_iter().map(|t| M::from_totals(&t, period)))
    }
}

impl<K: MetricKey, M: Default> Default for KeyedMetrics<K, M> {
    fn default() -> Self {
        Self {
            buckets: (0..K::nof_buckets()).map(|_| M::default()).collect(),
            _key: PhantomData,
        }
    }
}

impl<K, M: Clone> Clone for KeyedMetrics<K, M> {
    fn clone(&self) -> Self {
        Self {
            buckets: self.buckets.clone(),
            _key: PhantomData,
        }
    }
}

impl<K, M: PartialEq> PartialEq for KeyedMetrics<K, M> {
    fn eq(&self, other: &Self) -> bool {
        self.buckets == other.buckets
    }
}

impl<K: MetricKey, M: fmt::Debug> fmt::Debug for KeyedMetrics<K, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: MetricKey, M: Serialize> Serialize for KeyedMetrics<K, M> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.buckets.len()))?;
        for (label, metrics) in self.iter() {
            map.serialize_entry(label, metrics)?;
        }
        map.end()
    }
}

/// PDSCH processor and TB encoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PdschMetrics {
    #[serde(rename = "pdsch")]
    pub processor: ProcessorMetrics,
    pub fec: ThroughputMetrics,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LdpcEncodingMetrics {
    pub ldpc_encoder: ThroughputMetrics,
    pub ldpc_rate_matcher: ThroughputMetrics,
}

/// PUSCH processor and TB decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PuschMetrics {
    #[serde(rename = "pusch")]
    pub processor: PuschProcessorMetrics,
    pub fec: TbDecoderMetrics,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LdpcDecodingMetrics {
    pub ldpc_decoder: LdpcDecoderMetrics,
    pub ldpc_rate_dematcher: ThroughputMetrics,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ChannelProcessingMetrics {
    pub channel_estimator: RateMetrics,
    pub equalizer: RateMetrics,
    pub transform_precoder: RateMetrics,
}

pub type CrcMetrics = KeyedMetrics<CrcPolynomial, ThroughputMetrics>;
pub type ScramblingMetrics = KeyedMetrics<ScramblingMethod, ThroughputMetrics>;
pub type ModulationMetrics = KeyedMetrics<ModulationScheme, SymbolRateMetrics>;
pub type PrecodingMetrics = KeyedMetrics<LayerCount, RateMetrics>;

/// Downlink processing chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DlMetrics {
    #[serde(flatten)]
    pub pdsch: PdschMetrics,
    #[serde(flatten)]
    pub ldpc: LdpcEncodingMetrics,
    pub crc: CrcMetrics,
    pub scrambling: ScramblingMetrics,
    pub modulation_mapper: ModulationMetrics,
    pub precoding_layer_mapping: PrecodingMetrics,
}

/// Uplink processing chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UlMetrics {
    #[serde(flatten)]
    pub pusch: PuschMetrics,
    #[serde(flatten)]
    pub ldpc: LdpcDecodingMetrics,
    pub crc: CrcMetrics,
    pub scrambling: ScramblingMetrics,
    pub demodulation_mapper: ModulationMetrics,
    #[serde(flatten)]
    pub channel: ChannelProcessingMetrics,
}

/// One sector's upper-PHY snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpperPhyMetrics {
    /// Index into the sector table, not the PCI.
    pub sector_id: usize,
    /// Wall-clock time covered by this snapshot. Zero for the first one.
    pub metrics_period: Duration,
    pub dl: DlMetrics,
    pub ul: UlMetrics,
}

impl UpperPhyMetrics {
    pub fn empty(sector_id: usize) -> Self {
        Self {
            sector_id,
            ..Self::default()
        }
    }

    pub fn metrics_period_ms(&self) -> f64 {
        self.metrics_period.as_secs_f64() * 1000.0
    }
}

/// Snapshot of every sector, in sector order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DuLowMetrics {
    pub upper_phy: Vec<UpperPhyMetrics>,
}
