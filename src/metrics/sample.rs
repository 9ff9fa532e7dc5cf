//! Metric samples: one value per completed processing operation.
//!
//! Samples are built on the producing thread at the end of a call, handed to
//! a [`MetricNotifier`](super::notifier::MetricNotifier) by reference and
//! dropped. They are never stored.

use std::time::Duration;

use super::packed::SlotIndex;

/// Common view over every sample that feeds a
/// [`BlockAggregate`](super::aggregate::BlockAggregate).
pub trait BlockSample {
    /// Amount of work processed: bits, symbols or resource elements.
    fn units(&self) -> u64;
    /// Wall-clock time spent in the call.
    fn elapsed(&self) -> Duration;
    /// User plus system CPU time spent in the call.
    fn cpu_time(&self) -> Duration;
}

/// A sample whose aggregator bucket is selected by a small closed key.
pub trait KeyedSample: BlockSample {
    type Key: MetricKey;

    fn key(&self) -> Self::Key;
}

/// A sample tagged with the slot it was processed for.
pub trait SlotSample: BlockSample {
    fn slot(&self) -> SlotIndex;

    /// Transport block CRC outcome, for receive chains.
    fn crc_ok(&self) -> Option<bool> {
        None
    }
}

/// A decoding sample carrying a CRC outcome.
pub trait DecodeOutcome: BlockSample {
    fn crc_ok(&self) -> bool;
}

/// Key selecting one bucket of a keyed aggregator.
///
/// Keys that map to no tracked bucket fold into a trailing "other" bucket.
pub trait MetricKey: Copy {
    /// Labels of the tracked buckets, in bucket order.
    const TRACKED: &'static [&'static str];

    /// Bucket index into [`Self::TRACKED`], or `None` for the other bucket.
    fn bucket(self) -> Option<usize>;

    /// Total number of buckets including the other bucket.
    fn nof_buckets() -> usize {
        Self::TRACKED.len() + 1
    }
}

/// CRC generator polynomials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrcPolynomial {
    Crc6,
    Crc11,
    Crc16,
    Crc24A,
    Crc24B,
    Crc24C,
}

impl CrcPolynomial {
    pub const ALL: [CrcPolynomial; 6] = [
        Self::Crc6,
        Self::Crc11,
        Self::Crc16,
        Self::Crc24A,
        Self::Crc24B,
        Self::Crc24C,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Crc6 => "crc6",
            Self::Crc11 => "crc11",
            Self::Crc16 => "crc16",
            Self::Crc24A => "crc24a",
            Self::Crc24B => "crc24b",
            Self::Crc24C => "crc24c",
        }
    }
}

impl MetricKey for CrcPolynomial {
    const TRACKED: &'static [&'static str] = &["crc16", "crc24a", "crc24b", "crc24c"];

    fn bucket(self) -> Option<usize> {
        match self {
            Self::Crc16 => Some(0),
            Self::Crc24A => Some(1),
            Self::Crc24B => Some(2),
            Self::Crc24C => Some(3),
            Self::Crc6 | Self::Crc11 => None,
        }
    }
}

/// Modulation schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModulationScheme {
    Pi2Bpsk,
    Bpsk,
    Qpsk,
    Qam16,
    Qam64,
    Qam256,
}

impl ModulationScheme {
    pub const ALL: [ModulationScheme; 6] = [
        Self::Pi2Bpsk,
        Self::Bpsk,
        Self::Qpsk,
        Self::Qam16,
        Self::Qam64,
        Self::Qam256,
    ];

    pub const fn bits_per_symbol(self) -> u32 {
        match self {
            Self::Pi2Bpsk | Self::Bpsk => 1,
            Self::Qpsk => 2,
            Self::Qam16 => 4,
            Self::Qam64 => 6,
            Self::Qam256 => 8,
        }
    }
}

impl MetricKey for ModulationScheme {
    const TRACKED: &'static [&'static str] = &["qpsk", "qam16", "qam64", "qam256"];

    fn bucket(self) -> Option<usize> {
        match self {
            Self::Qpsk => Some(0),
            Self::Qam16 => Some(1),
            Self::Qam64 => Some(2),
            Self::Qam256 => Some(3),
            Self::Pi2Bpsk | Self::Bpsk => None,
        }
    }
}

/// Pseudo-random sequence generator operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScramblingMethod {
    Init,
    Advance,
    Generate,
}

impl MetricKey for ScramblingMethod {
    const TRACKED: &'static [&'static str] = &["init", "advance", "generate"];

    fn bucket(self) -> Option<usize> {
        Some(match self {
            Self::Init => 0,
            Self::Advance => 1,
            Self::Generate => 2,
        })
    }
}

/// Number of spatial layers of a precoding operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerCount(pub u8);

impl MetricKey for LayerCount {
    const TRACKED: &'static [&'static str] = &["one_layer", "two_layers", "three_layers", "four_layers"];

    fn bucket(self) -> Option<usize> {
        match self.0 {
            1..=4 => Some(usize::from(self.0) - 1),
            _ => None,
        }
    }
}

/// One LDPC codeblock encoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LdpcEncoderSample {
    /// Codeblock size in bits.
    pub cb_size: u32,
    pub elapsed: Duration,
    pub cpu_time: Duration,
}

/// One codeblock rate-matched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LdpcRateMatcherSample {
    /// Rate-matched output length in bits.
    pub output_size: u32,
    pub elapsed: Duration,
    pub cpu_time: Duration,
}

/// One LDPC codeblock decoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LdpcDecoderSample {
    /// Codeblock size in bits.
    pub cb_size: u32,
    pub nof_iterations: u32,
    /// Whether the codeblock CRC matched after decoding.
    pub crc_ok: bool,
    pub elapsed: Duration,
    pub cpu_time: Duration,
}

/// One codeblock rate-dematched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LdpcRateDematcherSample {
    /// Number of soft bits consumed.
    pub input_size: u32,
    pub elapsed: Duration,
    pub cpu_time: Duration,
}

/// One CRC calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrcSample {
    pub polynomial: CrcPolynomial,
    pub nof_bits: u32,
    pub elapsed: Duration,
    pub cpu_time: Duration,
}

/// One pseudo-random sequence generator call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScramblingSample {
    pub method: ScramblingMethod,
    /// Sequence bits produced or skipped. Zero for `Init`.
    pub nof_bits: u32,
    pub elapsed: Duration,
    pub cpu_time: Duration,
}

/// One modulation or demodulation mapping call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModulationSample {
    pub scheme: ModulationScheme,
    pub nof_symbols: u32,
    pub elapsed: Duration,
    pub cpu_time: Duration,
}

/// One layer mapping and precoding call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrecodingSample {
    pub nof_layers: u8,
    /// Resource elements per layer.
    pub nof_re: u32,
    pub elapsed: Duration,
    pub cpu_time: Duration,
}

/// One port channel estimation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelEstimatorSample {
    pub nof_re: u32,
    pub elapsed: Duration,
    pub cpu_time: Duration,
}

/// One channel equalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EqualizerSample {
    pub nof_re: u32,
    pub nof_layers: u8,
    pub elapsed: Duration,
    pub cpu_time: Duration,
}

/// One transform precoding (DFT-s-OFDM) call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformPrecoderSample {
    pub nof_re: u32,
    pub elapsed: Duration,
    pub cpu_time: Duration,
}

/// One transport block channel-encoded for PDSCH.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdschEncoderSample {
    pub tbs_bytes: u32,
    pub nof_cb: u32,
    pub elapsed: Duration,
    pub cpu_time: Duration,
}

/// One transport block channel-decoded for PUSCH.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PuschDecoderSample {
    pub tbs_bytes: u32,
    pub nof_cb: u32,
    pub crc_ok: bool,
    pub elapsed: Duration,
    pub cpu_time: Duration,
}

/// One PDSCH transmission processed end to end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdschProcessorSample {
    pub slot: SlotIndex,
    pub tbs_bytes: u32,
    pub elapsed: Duration,
    pub cpu_time: Duration,
}

/// One PUSCH reception processed end to end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PuschProcessorSample {
    pub slot: SlotIndex,
    pub tbs_bytes: u32,
    pub crc_ok: bool,
    pub elapsed: Duration,
    pub cpu_time: Duration,
}

macro_rules! block_sample {
    ($sample:ty, |$s:ident| $units:expr) => {
        impl BlockSample for $sample {
            #[inline]
            fn units(&self) -> u64 {
                let $s = self;
                $units
            }

            #[inline]
            fn elapsed(&self) -> Duration {
                self.elapsed
            }

            #[inline]
            fn cpu_time(&self) -> Duration {
                self.cpu_time
            }
        }
    };
}

block_sample!(LdpcEncoderSample, |s| u64::from(s.cb_size));
block_sample!(LdpcRateMatcherSample, |s| u64::from(s.output_size));
block_sample!(LdpcDecoderSample, |s| u64::from(s.cb_size));
block_sample!(LdpcRateDematcherSample, |s| u64::from(s.input_size));
block_sample!(CrcSample, |s| u64::from(s.nof_bits));
block_sample!(ScramblingSample, |s| u64::from(s.nof_bits));
block_sample!(ModulationSample, |s| u64::from(s.nof_symbols));
block_sample!(PrecodingSample, |s| u64::from(s.nof_re) * u64::from(s.nof_layers));
block_sample!(ChannelEstimatorSample, |s| u64::from(s.nof_re));
block_sample!(EqualizerSample, |s| u64::from(s.nof_re) * u64::from(s.nof_layers));
block_sample!(TransformPrecoderSample, |s| u64::from(s.nof_re));
block_sample!(PdschEncoderSample, |s| u64::from(s.tbs_bytes) * 8);
block_sample!(PuschDecoderSample, |s| u64::from(s.tbs_bytes) * 8);
block_sample!(PdschProcessorSample, |s| u64::from(s.tbs_bytes) * 8);
block_sample!(PuschProcessorSample, |s| u64::from(s.tbs_bytes) * 8);

impl KeyedSample for CrcSample {
    type Key = CrcPolynomial;

    fn key(&self) -> CrcPolynomial {
        self.polynomial
    }
}

impl KeyedSample for ScramblingSample {
    type Key = ScramblingMethod;

    fn key(&self) -> ScramblingMethod {
        self.method
    }
}

impl KeyedSample for ModulationSample {
    type Key = ModulationScheme;

    fn key(&self) -> ModulationScheme {
        self.scheme
    }
}

impl KeyedSample for PrecodingSample {
    type Key = LayerCount;

    fn key(&self) -> LayerCount {
        LayerCount(self.nof_layers)
    }
}

impl SlotSample for PdschProcessorSample {
    fn slot(&self) -> SlotIndex {
        self.slot
    }
}

impl SlotSample for PuschProcessorSample {
    fn slot(&self) -> SlotIndex {
        self.slot
    }

    fn crc_ok(&self) -> Option<bool> {
        Some(self.crc_ok)
    }
}

impl DecodeOutcome for PuschDecoderSample {
    fn crc_ok(&self) -> bool {
        self.crc_ok
    }
}
