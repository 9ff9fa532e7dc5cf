//! Latency extrema tagged with the slot they were observed in.
//!
//! A `(latency, slot)` pair is packed into a single `u64` so the pair can be
//! replaced with one compare-and-swap:
//!
//! ```text
//!  63        56 55                      32 31                         0
//! +------------+-------------------------+----------------------------+
//! | numerology |   slot count (24 bits)  |   latency ns (32 bits)     |
//! +------------+-------------------------+----------------------------+
//! ```
//!
//! Latencies above `u32::MAX` ns (about 4.29 s) saturate. Numerology `0xFF`
//! never occurs in a valid [`SlotIndex`] and marks an empty extremum.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Largest supported subcarrier-spacing numerology (240 kHz).
pub const MAX_NUMEROLOGY: u8 = 4;

/// Number of system frames in a hyper frame.
pub const NOF_SFNS: u32 = 1024;

/// Number of subframes per radio frame.
pub const NOF_SUBFRAMES_PER_FRAME: u32 = 10;

const LATENCY_BITS: u32 = 32;
const SLOT_BITS: u32 = 24;
const NUMEROLOGY_SHIFT: u32 = LATENCY_BITS + SLOT_BITS;
const LATENCY_MASK: u64 = (1 << LATENCY_BITS) - 1;
const SLOT_MASK: u64 = (1 << SLOT_BITS) - 1;
const EMPTY_NUMEROLOGY: u64 = 0xFF;
const EMPTY: u64 = EMPTY_NUMEROLOGY << NUMEROLOGY_SHIFT;

/// Errors raised when building a [`SlotIndex`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    #[error("invalid numerology {numerology}, must be <= {MAX_NUMEROLOGY}")]
    InvalidNumerology { numerology: u8 },

    #[error("slot count {count} out of range for numerology {numerology} (max {max})")]
    CountOutOfRange { numerology: u8, count: u32, max: u32 },

    #[error("slot {slot} out of range for numerology {numerology} ({slots_per_frame} slots per frame)")]
    SlotOutOfRange {
        numerology: u8,
        slot: u32,
        slots_per_frame: u32,
    },

    #[error("system frame number {sfn} out of range (must be < {NOF_SFNS})")]
    SfnOutOfRange { sfn: u32 },
}

/// A slot within the hyper frame, counted from SFN 0 slot 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotIndex {
    numerology: u8,
    count: u32,
}

impl SlotIndex {
    /// Creates a slot index from a numerology and a slot count within the
    /// hyper frame.
    pub fn new(numerology: u8, count: u32) -> Result<Self, SlotError> {
        if numerology > MAX_NUMEROLOGY {
            return Err(SlotError::InvalidNumerology { numerology });
        }
        let max = slots_per_hyper_frame(numerology);
        if count >= max {
            return Err(SlotError::CountOutOfRange {
                numerology,
                count,
                max,
            });
        }
        Ok(Self { numerology, count })
    }

    /// Creates a slot index from a system frame number and a slot within it.
    pub fn from_sfn(numerology: u8, sfn: u32, slot: u32) -> Result<Self, SlotError> {
        if numerology > MAX_NUMEROLOGY {
            return Err(SlotError::InvalidNumerology { numerology });
        }
        if sfn >= NOF_SFNS {
            return Err(SlotError::SfnOutOfRange { sfn });
        }
        let slots_per_frame = slots_per_frame(numerology);
        if slot >= slots_per_frame {
            return Err(SlotError::SlotOutOfRange {
                numerology,
                slot,
                slots_per_frame,
            });
        }
        Self::new(numerology, sfn * slots_per_frame + slot)
    }

    pub fn numerology(self) -> u8 {
        self.numerology
    }

    pub fn count(self) -> u32 {
        self.count
    }

    pub fn slots_per_frame(self) -> u32 {
        slots_per_frame(self.numerology)
    }

    /// System frame number.
    pub fn sfn(self) -> u32 {
        self.count / self.slots_per_frame()
    }

    /// Slot index within the frame.
    pub fn slot(self) -> u32 {
        self.count % self.slots_per_frame()
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.sfn(), self.slot())
    }
}

impl Serialize for SlotIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("SlotIndex", 2)?;
        s.serialize_field("sfn", &self.sfn())?;
        s.serialize_field("slot", &self.slot())?;
        s.end()
    }
}

/// Number of slots per radio frame for the given numerology.
pub const fn slots_per_frame(numerology: u8) -> u32 {
    NOF_SUBFRAMES_PER_FRAME << numerology
}

/// Number of slots before the slot count wraps around.
pub const fn slots_per_hyper_frame(numerology: u8) -> u32 {
    NOF_SFNS * slots_per_frame(numerology)
}

/// A latency observed in a given slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLatency {
    pub latency: Duration,
    pub slot: SlotIndex,
}

impl SlotLatency {
    /// Largest latency that survives packing unchanged.
    pub const MAX_LATENCY: Duration = Duration::from_nanos(LATENCY_MASK);

    /// Packs into the 64-bit layout described in the module docs. Latencies
    /// above [`Self::MAX_LATENCY`] saturate.
    pub fn pack(self) -> u64 {
        let latency_ns = u64::try_from(self.latency.as_nanos())
            .unwrap_or(u64::MAX)
            .min(LATENCY_MASK);
        (u64::from(self.slot.numerology) << NUMEROLOGY_SHIFT)
            | ((u64::from(self.slot.count) & SLOT_MASK) << LATENCY_BITS)
            | latency_ns
    }

    /// Inverse of [`Self::pack`]. Returns `None` for the empty marker.
    pub fn unpack(word: u64) -> Option<Self> {
        if is_empty(word) {
            return None;
        }
        Some(Self {
            latency: Duration::from_nanos(packed_latency_ns(word)),
            slot: SlotIndex {
                numerology: (word >> NUMEROLOGY_SHIFT) as u8,
                count: ((word >> LATENCY_BITS) & SLOT_MASK) as u32,
            },
        })
    }
}

#[inline]
fn packed_latency_ns(word: u64) -> u64 {
    word & LATENCY_MASK
}

#[inline]
fn is_empty(word: u64) -> bool {
    word >> NUMEROLOGY_SHIFT == EMPTY_NUMEROLOGY
}

/// Which extreme a [`SlotLatencyExtremum`] keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    Min,
    Max,
}

/// Lock-free argmin/argmax of latency with the slot that produced it.
pub struct SlotLatencyExtremum {
    word: AtomicU64,
    kind: Extremum,
}

impl SlotLatencyExtremum {
    pub fn new(kind: Extremum) -> Self {
        Self {
            word: AtomicU64::new(EMPTY),
            kind,
        }
    }

    pub fn min() -> Self {
        Self::new(Extremum::Min)
    }

    pub fn max() -> Self {
        Self::new(Extremum::Max)
    }

    /// Replaces the stored pair if `value` is strictly more extreme.
    ///
    /// Retries until either the CAS succeeds or another thread has stored a
    /// value at least as extreme.
    #[inline]
    pub fn update(&self, value: SlotLatency) {
        let candidate = value.pack();
        let mut current = self.word.load(Ordering::Relaxed);
        while is_empty(current) || self.more_extreme(candidate, current) {
            match self.word.compare_exchange_weak(
                current,
                candidate,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    #[inline]
    fn more_extreme(&self, candidate: u64, current: u64) -> bool {
        let candidate = packed_latency_ns(candidate);
        let current = packed_latency_ns(current);
        match self.kind {
            Extremum::Min => candidate < current,
            Extremum::Max => candidate > current,
        }
    }

    pub fn get(&self) -> Option<SlotLatency> {
        SlotLatency::unpack(self.word.load(Ordering::Relaxed))
    }

    /// Reads and clears the stored pair.
    pub fn take(&self) -> Option<SlotLatency> {
        SlotLatency::unpack(self.word.swap(EMPTY, Ordering::Relaxed))
    }

    pub fn reset(&self) {
        self.word.store(EMPTY, Ordering::Relaxed);
    }
}

impl fmt::Debug for SlotLatencyExtremum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotLatencyExtremum")
            .field("kind", &self.kind)
            .field("value", &self.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(numerology: u8, count: u32) -> SlotIndex {
        SlotIndex::new(numerology, count).expect("valid slot")
    }

    fn at(ns: u64, numerology: u8, count: u32) -> SlotLatency {
        SlotLatency {
            latency: Duration::from_nanos(ns),
            slot: slot(numerology, count),
        }
    }

    #[test]
    fn test_pack_layout() {
        let word = at(0x1234_5678, 3, 0xCDEF).pack();
        assert_eq!(word & 0xFFFF_FFFF, 0x1234_5678);
        assert_eq!((word >> 32) & 0xFF_FFFF, 0xCDEF);
        assert_eq!(word >> 56, 3);
    }

    #[test]
    fn test_pack_unpack_inverse_at_limits() {
        for numerology in 0..=MAX_NUMEROLOGY {
            let last = slots_per_hyper_frame(numerology) - 1;
            for value in [
                at(0, numerology, 0),
                at(1, numerology, last),
                at(LATENCY_MASK, numerology, last / 2),
            ] {
                assert_eq!(SlotLatency::unpack(value.pack()), Some(value));
            }
        }
    }

    #[test]
    fn test_pack_saturates_latency() {
        let value = SlotLatency {
            latency: Duration::from_secs(10),
            slot: slot(1, 20),
        };
        let unpacked = SlotLatency::unpack(value.pack()).expect("not empty");
        assert_eq!(unpacked.latency, SlotLatency::MAX_LATENCY);
        assert_eq!(unpacked.slot, value.slot);

        let huge = SlotLatency {
            latency: Duration::MAX,
            slot: slot(0, 0),
        };
        assert_eq!(
            SlotLatency::unpack(huge.pack()).map(|v| v.latency),
            Some(SlotLatency::MAX_LATENCY)
        );
    }

    #[test]
    fn test_empty_marker_never_produced_by_valid_pair() {
        assert!(SlotLatency::unpack(EMPTY).is_none());
        assert!(SlotLatency::unpack(at(u64::MAX, 4, 0).pack()).is_some());
    }

    #[test]
    fn test_slot_index_validation() {
        assert_eq!(
            SlotIndex::new(5, 0),
            Err(SlotError::InvalidNumerology { numerology: 5 })
        );
        assert!(matches!(
            SlotIndex::new(0, 10_240),
            Err(SlotError::CountOutOfRange { max: 10_240, .. })
        ));
        assert!(SlotIndex::new(4, 163_839).is_ok());
        assert!(matches!(
            SlotIndex::from_sfn(1, 3, 20),
            Err(SlotError::SlotOutOfRange { .. })
        ));
        assert_eq!(
            SlotIndex::from_sfn(1, 1024, 0),
            Err(SlotError::SfnOutOfRange { sfn: 1024 })
        );
    }

    #[test]
    fn test_slot_index_sfn_and_slot() {
        let s = SlotIndex::from_sfn(1, 512, 7).expect("valid");
        assert_eq!(s.count(), 512 * 20 + 7);
        assert_eq!(s.sfn(), 512);
        assert_eq!(s.slot(), 7);
        assert_eq!(s.to_string(), "512.7");
    }

    #[test]
    fn test_slot_index_serializes_as_sfn_slot() {
        let s = SlotIndex::from_sfn(0, 3, 9).expect("valid");
        let json = serde_json::to_value(s).expect("serialize");
        assert_eq!(json, serde_json::json!({"sfn": 3, "slot": 9}));
    }

    #[test]
    fn test_extremum_max_keeps_largest() {
        let max = SlotLatencyExtremum::max();
        assert!(max.get().is_none());

        max.update(at(5_000, 1, 10));
        max.update(at(9_000, 1, 20));
        max.update(at(7_000, 1, 30));
        assert_eq!(max.get(), Some(at(9_000, 1, 20)));
    }

    #[test]
    fn test_extremum_min_keeps_smallest() {
        let min = SlotLatencyExtremum::min();
        min.update(at(5_000, 1, 10));
        min.update(at(9_000, 1, 20));
        min.update(at(3_000, 1, 30));
        assert_eq!(min.get(), Some(at(3_000, 1, 30)));
    }

    #[test]
    fn test_extremum_first_value_accepted_even_if_zero() {
        let max = SlotLatencyExtremum::max();
        max.update(at(0, 0, 0));
        assert_eq!(max.get(), Some(at(0, 0, 0)));

        let min = SlotLatencyExtremum::min();
        min.update(at(LATENCY_MASK, 0, 1));
        assert_eq!(min.get(), Some(at(LATENCY_MASK, 0, 1)));
    }

    #[test]
    fn test_extremum_ties_keep_first() {
        let max = SlotLatencyExtremum::max();
        max.update(at(4_000, 0, 1));
        max.update(at(4_000, 0, 2));
        assert_eq!(max.get().map(|v| v.slot.count()), Some(1));
    }

    #[test]
    fn test_extremum_take_clears() {
        let max = SlotLatencyExtremum::max();
        max.update(at(1_000, 2, 5));
        assert_eq!(max.take(), Some(at(1_000, 2, 5)));
        assert!(max.get().is_none());

        max.update(at(10, 2, 6));
        max.reset();
        assert!(max.take().is_none());
    }

    #[test]
    fn test_extremum_concurrent_race() {
        use std::sync::Arc;
        use std::thread;

        for _ in 0..100 {
            let max = Arc::new(SlotLatencyExtremum::max());
            let a = {
                let max = Arc::clone(&max);
                thread::spawn(move || max.update(at(5_000, 0, 10)))
            };
            let b = {
                let max = Arc::clone(&max);
                thread::spawn(move || max.update(at(9_000, 0, 20)))
            };
            a.join().expect("thread panicked");
            b.join().expect("thread panicked");
            assert_eq!(max.get(), Some(at(9_000, 0, 20)));
        }
    }

    #[test]
    fn test_extremum_concurrent_many_values() {
        use std::sync::Arc;
        use std::thread;

        let max = Arc::new(SlotLatencyExtremum::max());
        let min = Arc::new(SlotLatencyExtremum::min());
        let mut handles = Vec::new();
        for t in 0..8u32 {
            let max = Arc::clone(&max);
            let min = Arc::clone(&min);
            handles.push(thread::spawn(move || {
                for i in 0..1_000u32 {
                    let v = u64::from(t * 1_000 + i + 1);
                    max.update(at(v, 0, t * 1_000 + i));
                    min.update(at(v, 0, t * 1_000 + i));
                }
            }));
        }
        for h in handles {
            h.join().expect("thread panicked");
        }
        assert_eq!(max.get(), Some(at(8_000, 0, 7_999)));
        assert_eq!(min.get(), Some(at(1, 0, 0)));
    }
}
