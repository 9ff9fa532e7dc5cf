//! Synthetic upper-PHY workload.
//!
//! Spawns OS threads that behave like PHY processing threads: each one pushes
//! samples through the notifiers of its sector once per slot and never touches
//! anything else of the metrics engine.

mod workload;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub use workload::{simulate_slot, SlotProfile};

use crate::clock::{SlotClock, TimeSource};
use crate::config::LoadgenConfig;
use crate::metrics::DuLowCollector;

/// Lock-free counters of the work pushed by the generator.
#[derive(Debug, Default)]
pub struct LoadgenStats {
    slots: AtomicU64,
    samples: AtomicU64,
}

impl LoadgenStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, samples: u64) {
        self.slots.fetch_add(1, Ordering::Relaxed);
        self.samples.fetch_add(samples, Ordering::Relaxed);
    }

    /// Atomically read and reset, returning `(slots, samples)`.
    pub fn snapshot(&self) -> (u64, u64) {
        (
            self.slots.swap(0, Ordering::Relaxed),
            self.samples.swap(0, Ordering::Relaxed),
        )
    }
}

/// Running producer threads.
pub struct LoadGenerator {
    threads: Vec<JoinHandle<()>>,
    stats: Arc<LoadgenStats>,
}

impl std::fmt::Debug for LoadGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadGenerator")
            .field("threads", &self.threads.len())
            .finish()
    }
}

impl LoadGenerator {
    /// Spawns `threads_per_sector` producers for every sector of `collector`.
    pub fn start(
        cfg: &LoadgenConfig,
        collector: Arc<DuLowCollector>,
        time: Arc<dyn TimeSource>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let profile = SlotProfile {
            max_layers: cfg.max_layers,
            ..SlotProfile::default()
        };
        let stats = Arc::new(LoadgenStats::new());
        let nof_threads = collector.nof_sectors() * cfg.threads_per_sector;
        let mut threads = Vec::with_capacity(nof_threads);

        for sector_id in 0..collector.nof_sectors() {
            for n in 0..cfg.threads_per_sector {
                let clock = SlotClock::new(cfg.numerology, Arc::clone(&time))?;
                let collector = Arc::clone(&collector);
                let stats = Arc::clone(&stats);
                let cancel = cancel.clone();

                let handle = std::thread::Builder::new()
                    .name(format!("loadgen-{sector_id}-{n}"))
                    .spawn(move || {
                        run_producer(sector_id, &collector, &clock, &profile, &stats, &cancel)
                    })
                    .with_context(|| format!("spawning loadgen thread {sector_id}-{n}"))?;
                threads.push(handle);
            }
        }

        info!(
            threads = threads.len(),
            numerology = cfg.numerology,
            max_layers = cfg.max_layers,
            "load generator started",
        );

        Ok(Self { threads, stats })
    }

    pub fn stats(&self) -> Arc<LoadgenStats> {
        Arc::clone(&self.stats)
    }

    /// Waits for every producer to exit. Cancel the token passed to
    /// [`start`](Self::start) first.
    pub fn join(self) {
        for handle in self.threads {
            let name = handle.thread().name().map(str::to_owned);
            if handle.join().is_err() {
                error!(thread = ?name, "loadgen thread panicked");
            }
        }
        debug!("load generator stopped");
    }
}

fn run_producer(
    sector_id: usize,
    collector: &DuLowCollector,
    clock: &SlotClock,
    profile: &SlotProfile,
    stats: &LoadgenStats,
    cancel: &CancellationToken,
) {
    let Some(sector) = collector.sector(sector_id) else {
        error!(sector_id, "loadgen sector does not exist");
        return;
    };
    let notifiers = sector.get_notifiers();
    let mut rng = StdRng::from_entropy();

    while !cancel.is_cancelled() {
        let slot = clock.current_slot();
        let pushed = simulate_slot(notifiers, slot, &mut rng, profile);
        stats.record(pushed);
        std::thread::sleep(clock.until_next_slot());
    }
}
