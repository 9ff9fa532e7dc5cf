//! One simulated slot of PDSCH and PUSCH processing.
//!
//! Sizes follow the NR resource grid (12 subcarriers per PRB, up to 273 PRBs,
//! 8448-bit LDPC base graph 1 codeblocks). Latencies scale with the work done
//! and are jittered so extrema and averages move between periods.

use std::time::Duration;

use rand::Rng;

use crate::metrics::packed::SlotIndex;
use crate::metrics::sample::{
    ChannelEstimatorSample, CrcPolynomial, CrcSample, EqualizerSample, LdpcDecoderSample,
    LdpcEncoderSample, LdpcRateDematcherSample, LdpcRateMatcherSample, ModulationSample,
    ModulationScheme, PdschEncoderSample, PdschProcessorSample, PrecodingSample,
    PuschDecoderSample, PuschProcessorSample, ScramblingMethod, ScramblingSample,
    TransformPrecoderSample,
};
use crate::metrics::UpperPhyNotifiers;

const MAX_PRB: u32 = 273;
const SUBCARRIERS_PER_PRB: u32 = 12;
const DATA_SYMBOLS_PER_SLOT: u32 = 12;
const MAX_CB_SIZE: u32 = 8_448;

/// Shape of the simulated traffic.
#[derive(Debug, Clone, Copy)]
pub struct SlotProfile {
    /// Highest PDSCH layer count, 1..=4.
    pub max_layers: u8,
    /// Probability that a PUSCH transport block fails its CRC.
    pub ul_bler: f64,
    /// Probability that a PUSCH transmission uses transform precoding.
    pub transform_precoding_ratio: f64,
}

impl Default for SlotProfile {
    fn default() -> Self {
        Self {
            max_layers: 2,
            ul_bler: 0.05,
            transform_precoding_ratio: 0.2,
        }
    }
}

/// Simulated cost of processing `units` at `ns_per_unit`.
fn cost<R: Rng + ?Sized>(rng: &mut R, units: u64, ns_per_unit: f64) -> (Duration, Duration) {
    let elapsed_ns = (units.max(1) as f64 * ns_per_unit * rng.gen_range(0.8..1.6)) as u64;
    let cpu_ns = (elapsed_ns as f64 * rng.gen_range(0.85..1.0)) as u64;
    (Duration::from_nanos(elapsed_ns), Duration::from_nanos(cpu_ns))
}

fn pick_scheme<R: Rng + ?Sized>(rng: &mut R) -> ModulationScheme {
    const DATA_SCHEMES: [ModulationScheme; 4] = [
        ModulationScheme::Qpsk,
        ModulationScheme::Qam16,
        ModulationScheme::Qam64,
        ModulationScheme::Qam256,
    ];
    // Control and low-rate transmissions land in the other bucket.
    if rng.gen_bool(0.02) {
        ModulationScheme::Pi2Bpsk
    } else {
        DATA_SCHEMES[rng.gen_range(0..DATA_SCHEMES.len())]
    }
}

/// Transport block layout derived from the allocation.
struct Allocation {
    scheme: ModulationScheme,
    nof_layers: u8,
    /// Resource elements per layer.
    nof_re: u32,
    /// Coded bits across all layers.
    coded_bits: u32,
    tbs_bytes: u32,
    nof_cb: u32,
    cb_size: u32,
}

impl Allocation {
    fn random<R: Rng + ?Sized>(rng: &mut R, max_layers: u8) -> Self {
        let scheme = pick_scheme(rng);
        let nof_layers = rng.gen_range(1..=max_layers.clamp(1, 4));
        let nof_prb = rng.gen_range(1..=MAX_PRB);
        let nof_re = nof_prb * SUBCARRIERS_PER_PRB * DATA_SYMBOLS_PER_SLOT;
        let coded_bits = nof_re * u32::from(nof_layers) * scheme.bits_per_symbol();
        let code_rate = rng.gen_range(0.1..0.93);
        let tb_bits = ((f64::from(coded_bits) * code_rate) as u32).max(24);
        let nof_cb = tb_bits.div_ceil(MAX_CB_SIZE);
        Self {
            scheme,
            nof_layers,
            nof_re,
            coded_bits,
            tbs_bytes: tb_bits.div_ceil(8),
            nof_cb,
            cb_size: tb_bits.div_ceil(nof_cb),
        }
    }
}

/// Pushes one slot of downlink and uplink samples through `notifiers`.
///
/// Returns the number of samples pushed.
pub fn simulate_slot<R: Rng + ?Sized>(
    notifiers: &dyn UpperPhyNotifiers,
    slot: SlotIndex,
    rng: &mut R,
    profile: &SlotProfile,
) -> u64 {
    simulate_downlink(notifiers, slot, rng, profile) + simulate_uplink(notifiers, slot, rng, profile)
}

fn simulate_downlink<R: Rng + ?Sized>(
    notifiers: &dyn UpperPhyNotifiers,
    slot: SlotIndex,
    rng: &mut R,
    profile: &SlotProfile,
) -> u64 {
    let alloc = Allocation::random(rng, profile.max_layers);
    let mut pushed = 0;
    let mut total = Duration::ZERO;
    let mut total_cpu = Duration::ZERO;
    let mut account = |(elapsed, cpu): (Duration, Duration)| {
        total += elapsed;
        total_cpu += cpu;
        (elapsed, cpu)
    };

    let (elapsed, cpu_time) = account(cost(rng, u64::from(alloc.tbs_bytes) * 8, 0.05));
    notifiers.dl_crc().on_new_metric(&CrcSample {
        polynomial: CrcPolynomial::Crc24A,
        nof_bits: alloc.tbs_bytes * 8,
        elapsed,
        cpu_time,
    });
    pushed += 1;

    let rm_output = alloc.coded_bits / alloc.nof_cb;
    let mut fec = Duration::ZERO;
    let mut fec_cpu = Duration::ZERO;
    for _ in 0..alloc.nof_cb {
        if alloc.nof_cb > 1 {
            let (elapsed, cpu_time) = cost(rng, u64::from(alloc.cb_size), 0.04);
            notifiers.dl_crc().on_new_metric(&CrcSample {
                polynomial: CrcPolynomial::Crc24B,
                nof_bits: alloc.cb_size,
                elapsed,
                cpu_time,
            });
            fec += elapsed;
            fec_cpu += cpu_time;
            pushed += 1;
        }

        let (elapsed, cpu_time) = cost(rng, u64::from(alloc.cb_size), 0.6);
        notifiers.ldpc_encoder().on_new_metric(&LdpcEncoderSample {
            cb_size: alloc.cb_size,
            elapsed,
            cpu_time,
        });
        fec += elapsed;
        fec_cpu += cpu_time;

        let (elapsed, cpu_time) = cost(rng, u64::from(rm_output), 0.1);
        notifiers
            .ldpc_rate_matcher()
            .on_new_metric(&LdpcRateMatcherSample {
                output_size: rm_output,
                elapsed,
                cpu_time,
            });
        fec += elapsed;
        fec_cpu += cpu_time;
        pushed += 2;
    }
    let (elapsed, cpu_time) = account((fec, fec_cpu));
    notifiers.pdsch_encoder().on_new_metric(&PdschEncoderSample {
        tbs_bytes: alloc.tbs_bytes,
        nof_cb: alloc.nof_cb,
        elapsed,
        cpu_time,
    });
    pushed += 1;

    let (elapsed, cpu_time) = account(cost(rng, 1, 150.0));
    notifiers.dl_scrambling().on_new_metric(&ScramblingSample {
        method: ScramblingMethod::Init,
        nof_bits: 0,
        elapsed,
        cpu_time,
    });
    let (elapsed, cpu_time) = account(cost(rng, u64::from(alloc.coded_bits), 0.02));
    notifiers.dl_scrambling().on_new_metric(&ScramblingSample {
        method: ScramblingMethod::Generate,
        nof_bits: alloc.coded_bits,
        elapsed,
        cpu_time,
    });
    pushed += 2;

    let nof_symbols = alloc.nof_re * u32::from(alloc.nof_layers);
    let (elapsed, cpu_time) = account(cost(rng, u64::from(nof_symbols), 0.3));
    notifiers.modulation_mapper().on_new_metric(&ModulationSample {
        scheme: alloc.scheme,
        nof_symbols,
        elapsed,
        cpu_time,
    });
    pushed += 1;

    let (elapsed, cpu_time) = account(cost(rng, u64::from(nof_symbols), 0.5));
    notifiers
        .precoding_layer_mapping()
        .on_new_metric(&PrecodingSample {
            nof_layers: alloc.nof_layers,
            nof_re: alloc.nof_re,
            elapsed,
            cpu_time,
        });
    pushed += 1;

    notifiers.pdsch_processor().on_new_metric(&PdschProcessorSample {
        slot,
        tbs_bytes: alloc.tbs_bytes,
        elapsed: total,
        cpu_time: total_cpu,
    });
    pushed + 1
}

fn simulate_uplink<R: Rng + ?Sized>(
    notifiers: &dyn UpperPhyNotifiers,
    slot: SlotIndex,
    rng: &mut R,
    profile: &SlotProfile,
) -> u64 {
    // Uplink is single layer in this simulation.
    let alloc = Allocation::random(rng, 1);
    let crc_ok = !rng.gen_bool(profile.ul_bler.clamp(0.0, 1.0));
    let mut pushed = 0;
    let mut total = Duration::ZERO;
    let mut total_cpu = Duration::ZERO;
    let mut account = |(elapsed, cpu): (Duration, Duration)| {
        total += elapsed;
        total_cpu += cpu;
        (elapsed, cpu)
    };

    let (elapsed, cpu_time) = account(cost(rng, u64::from(alloc.nof_re), 0.8));
    notifiers
        .channel_estimator()
        .on_new_metric(&ChannelEstimatorSample {
            nof_re: alloc.nof_re,
            elapsed,
            cpu_time,
        });
    let (elapsed, cpu_time) = account(cost(rng, u64::from(alloc.nof_re), 0.6));
    notifiers.equalizer().on_new_metric(&EqualizerSample {
        nof_re: alloc.nof_re,
        nof_layers: alloc.nof_layers,
        elapsed,
        cpu_time,
    });
    pushed += 2;

    if rng.gen_bool(profile.transform_precoding_ratio.clamp(0.0, 1.0)) {
        let (elapsed, cpu_time) = account(cost(rng, u64::from(alloc.nof_re), 0.9));
        notifiers
            .transform_precoder()
            .on_new_metric(&TransformPrecoderSample {
                nof_re: alloc.nof_re,
                elapsed,
                cpu_time,
            });
        pushed += 1;
    }

    let (elapsed, cpu_time) = account(cost(rng, u64::from(alloc.nof_re), 1.2));
    notifiers
        .demodulation_mapper()
        .on_new_metric(&ModulationSample {
            scheme: alloc.scheme,
            nof_symbols: alloc.nof_re,
            elapsed,
            cpu_time,
        });
    let (elapsed, cpu_time) = account(cost(rng, 1, 150.0));
    notifiers.ul_scrambling().on_new_metric(&ScramblingSample {
        method: ScramblingMethod::Init,
        nof_bits: 0,
        elapsed,
        cpu_time,
    });
    let (elapsed, cpu_time) = account(cost(rng, u64::from(alloc.coded_bits), 0.02));
    notifiers.ul_scrambling().on_new_metric(&ScramblingSample {
        method: ScramblingMethod::Generate,
        nof_bits: alloc.coded_bits,
        elapsed,
        cpu_time,
    });
    pushed += 3;

    let dematcher_input = alloc.coded_bits / alloc.nof_cb;
    let mut fec = Duration::ZERO;
    let mut fec_cpu = Duration::ZERO;
    for cb in 0..alloc.nof_cb {
        let (elapsed, cpu_time) = cost(rng, u64::from(dematcher_input), 0.15);
        notifiers
            .ldpc_rate_dematcher()
            .on_new_metric(&LdpcRateDematcherSample {
                input_size: dematcher_input,
                elapsed,
                cpu_time,
            });
        fec += elapsed;
        fec_cpu += cpu_time;

        // A failed transport block fails in its last codeblock.
        let cb_ok = crc_ok || cb + 1 < alloc.nof_cb;
        let nof_iterations = if cb_ok { rng.gen_range(1..=4) } else { 6 };
        let (elapsed, cpu_time) = cost(
            rng,
            u64::from(alloc.cb_size) * u64::from(nof_iterations),
            0.5,
        );
        notifiers.ldpc_decoder().on_new_metric(&LdpcDecoderSample {
            cb_size: alloc.cb_size,
            nof_iterations,
            crc_ok: cb_ok,
            elapsed,
            cpu_time,
        });
        fec += elapsed;
        fec_cpu += cpu_time;
        pushed += 2;
    }
    let (elapsed, cpu_time) = account((fec, fec_cpu));
    notifiers.pusch_decoder().on_new_metric(&PuschDecoderSample {
        tbs_bytes: alloc.tbs_bytes,
        nof_cb: alloc.nof_cb,
        crc_ok,
        elapsed,
        cpu_time,
    });
    pushed += 1;

    let (elapsed, cpu_time) = account(cost(rng, u64::from(alloc.tbs_bytes) * 8, 0.05));
    notifiers.ul_crc().on_new_metric(&CrcSample {
        polynomial: CrcPolynomial::Crc24A,
        nof_bits: alloc.tbs_bytes * 8,
        elapsed,
        cpu_time,
    });
    pushed += 1;

    // UCI multiplexed on PUSCH now and then.
    if rng.gen_bool(0.1) {
        let (elapsed, cpu_time) = account(cost(rng, 11, 2.0));
        notifiers.ul_crc().on_new_metric(&CrcSample {
            polynomial: CrcPolynomial::Crc11,
            nof_bits: 11,
            elapsed,
            cpu_time,
        });
        pushed += 1;
    }

    notifiers.pusch_processor().on_new_metric(&PuschProcessorSample {
        slot,
        tbs_bytes: alloc.tbs_bytes,
        crc_ok,
        elapsed: total,
        cpu_time: total_cpu,
    });
    pushed + 1
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::clock::ManualClock;
    use crate::metrics::UpperPhyCollector;

    #[test]
    fn test_allocation_is_consistent() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            let alloc = Allocation::random(&mut rng, 4);
            assert!((1..=4).contains(&alloc.nof_layers));
            assert!(alloc.nof_cb >= 1);
            assert!(alloc.cb_size <= MAX_CB_SIZE);
            assert!(alloc.cb_size * alloc.nof_cb >= alloc.tbs_bytes * 8 - 7);
            assert!(alloc.coded_bits >= alloc.nof_re);
        }
    }

    #[test]
    fn test_simulate_slot_feeds_every_leaf() {
        let time = Arc::new(ManualClock::new());
        let collector = UpperPhyCollector::new(0, time.clone());
        collector.collect_metrics();

        let mut rng = StdRng::seed_from_u64(42);
        let profile = SlotProfile {
            max_layers: 4,
            ul_bler: 0.5,
            transform_precoding_ratio: 0.5,
        };
        let mut pushed = 0;
        for count in 0..200 {
            let slot = SlotIndex::new(1, count).unwrap();
            pushed += simulate_slot(collector.get_notifiers(), slot, &mut rng, &profile);
        }
        assert!(pushed > 200 * 19);

        time.advance(Duration::from_millis(100));
        let m = collector.collect_metrics();
        assert_eq!(m.dl.pdsch.processor.throughput.latency.nof_calls, 200);
        assert_eq!(m.ul.pusch.processor.processor.throughput.latency.nof_calls, 200);
        assert!(m.dl.ldpc.ldpc_encoder.latency.nof_calls >= 200);
        assert!(m.dl.ldpc.ldpc_encoder.average_throughput_mbps > 0.0);
        assert!(m.dl.pdsch.fec.average_throughput_mbps > 0.0);
        assert!(m.ul.ldpc.ldpc_decoder.average_nof_iterations >= 1.0);
        assert!(m.ul.pusch.processor.crc.nof_crc_ko > 0);
        assert!(m.ul.pusch.processor.crc.nof_crc_ok > 0);
        assert_eq!(
            m.ul.ldpc.ldpc_decoder.nof_crc_failures,
            m.ul.pusch.fec.crc.nof_crc_ko
        );
        assert!(m.ul.channel.transform_precoder.latency.nof_calls > 0);
        assert!(m.dl.pdsch.processor.max_latency_slot.is_some());
        assert_eq!(m.dl.scrambling.get(ScramblingMethod::Init).latency.nof_calls, 200);
        assert_eq!(m.dl.scrambling.get(ScramblingMethod::Advance).latency.nof_calls, 0);
        assert!(m.dl.precoding_layer_mapping.iter().any(|(label, p)| {
            label == "four_layers" && p.latency.nof_calls > 0
        }));
    }
}
