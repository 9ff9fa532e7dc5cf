use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};

use crate::metrics::packed::{slots_per_hyper_frame, SlotIndex, MAX_NUMEROLOGY};

/// Monotonic time measured from an arbitrary, fixed origin.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`], with its origin at construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ns: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now_ns
            .fetch_add(saturating_ns(by), Ordering::Relaxed);
    }

    pub fn set(&self, now: Duration) {
        self.now_ns.store(saturating_ns(now), Ordering::Relaxed);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.now_ns.load(Ordering::Relaxed))
    }
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

fn saturating_ns(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Maps elapsed time onto 5G NR slots for one numerology.
pub struct SlotClock {
    numerology: u8,
    time: Arc<dyn TimeSource>,
    origin: Duration,
}

impl std::fmt::Debug for SlotClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotClock")
            .field("numerology", &self.numerology)
            .field("origin", &self.origin)
            .finish()
    }
}

impl SlotClock {
    /// Creates a clock whose slot 0 of SFN 0 starts now.
    pub fn new(numerology: u8, time: Arc<dyn TimeSource>) -> Result<Self> {
        if numerology > MAX_NUMEROLOGY {
            bail!("numerology must be <= {MAX_NUMEROLOGY}, got {numerology}");
        }

        let origin = time.now();

        Ok(Self {
            numerology,
            time,
            origin,
        })
    }

    pub fn numerology(&self) -> u8 {
        self.numerology
    }

    /// Duration of one slot.
    pub fn slot_duration(&self) -> Duration {
        slot_duration(self.numerology)
    }

    /// Slot in progress, wrapping once per hyper frame.
    pub fn current_slot(&self) -> SlotIndex {
        let elapsed = self.time.now().saturating_sub(self.origin);
        let count = compute_slot_count(elapsed, self.numerology);
        // compute_slot_count wraps below slots_per_hyper_frame.
        SlotIndex::new(self.numerology, count)
            .unwrap_or_else(|_| unreachable!("slot count {count} wrapped"))
    }

    /// Time left until the next slot boundary.
    pub fn until_next_slot(&self) -> Duration {
        let elapsed = self.time.now().saturating_sub(self.origin);
        let slot_ns = saturating_ns(self.slot_duration());
        let into_slot = saturating_ns(elapsed) % slot_ns;
        Duration::from_nanos(slot_ns - into_slot)
    }
}

/// `1ms >> numerology`.
pub const fn slot_duration(numerology: u8) -> Duration {
    Duration::from_nanos(1_000_000 >> numerology)
}

/// Slot count reached after `elapsed`, modulo one hyper frame.
fn compute_slot_count(elapsed: Duration, numerology: u8) -> u32 {
    let slot_ns = saturating_ns(slot_duration(numerology));
    let slots = saturating_ns(elapsed) / slot_ns;
    (slots % u64::from(slots_per_hyper_frame(numerology))) as u32
}
