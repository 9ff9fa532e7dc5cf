use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Sentinel stored in a min slot that has not seen a value yet.
const MIN_UNSET: u64 = u64::MAX;

/// Tracks the running state of one processing block: call count, processed
/// units (bits, symbols or resource elements), elapsed and CPU time sums, and
/// the elapsed-time extrema.
/// All operations are atomic and safe for concurrent use.
pub struct BlockAggregate {
    count: AtomicU64,
    sum_units: AtomicU64,
    sum_elapsed_ns: AtomicU64,
    sum_cpu_ns: AtomicU64,
    min_elapsed_ns: AtomicU64,
    max_elapsed_ns: AtomicU64,
}

impl BlockAggregate {
    /// Creates a new aggregate with min initialized to MAX and max to zero.
    pub fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            sum_units: AtomicU64::new(0),
            sum_elapsed_ns: AtomicU64::new(0),
            sum_cpu_ns: AtomicU64::new(0),
            min_elapsed_ns: AtomicU64::new(MIN_UNSET),
            max_elapsed_ns: AtomicU64::new(0),
        }
    }

    /// Folds one completed operation into the running state.
    #[inline]
    pub fn record(&self, units: u64, elapsed: Duration, cpu_time: Duration) {
        let elapsed_ns = duration_as_ns(elapsed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_units.fetch_add(units, Ordering::Relaxed);
        self.sum_elapsed_ns.fetch_add(elapsed_ns, Ordering::Relaxed);
        self.sum_cpu_ns
            .fetch_add(duration_as_ns(cpu_time), Ordering::Relaxed);
        update_min(&self.min_elapsed_ns, elapsed_ns);
        update_max(&self.max_elapsed_ns, elapsed_ns);
    }

    /// Returns a point-in-time view without resetting.
    pub fn totals(&self) -> BlockTotals {
        BlockTotals::from_raw(
            self.count.load(Ordering::Relaxed),
            self.sum_units.load(Ordering::Relaxed),
            self.sum_elapsed_ns.load(Ordering::Relaxed),
            self.sum_cpu_ns.load(Ordering::Relaxed),
            self.min_elapsed_ns.load(Ordering::Relaxed),
            self.max_elapsed_ns.load(Ordering::Relaxed),
        )
    }

    /// Reads and resets every counter in one pass.
    ///
    /// Each counter is swapped individually, so a sample racing with the
    /// read-out lands in exactly one period per field.
    pub fn take(&self) -> BlockTotals {
        BlockTotals::from_raw(
            self.count.swap(0, Ordering::Relaxed),
            self.sum_units.swap(0, Ordering::Relaxed),
            self.sum_elapsed_ns.swap(0, Ordering::Relaxed),
            self.sum_cpu_ns.swap(0, Ordering::Relaxed),
            self.min_elapsed_ns.swap(MIN_UNSET, Ordering::Relaxed),
            self.max_elapsed_ns.swap(0, Ordering::Relaxed),
        )
    }

    /// Zeroes every counter.
    pub fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
        self.sum_units.store(0, Ordering::Relaxed);
        self.sum_elapsed_ns.store(0, Ordering::Relaxed);
        self.sum_cpu_ns.store(0, Ordering::Relaxed);
        self.min_elapsed_ns.store(MIN_UNSET, Ordering::Relaxed);
        self.max_elapsed_ns.store(0, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn average_units(&self) -> f64 {
        self.totals().average_units()
    }

    pub fn average_latency_us(&self) -> f64 {
        self.totals().average_latency_us()
    }

    pub fn min_latency_us(&self) -> f64 {
        self.totals().min_latency_us()
    }

    pub fn max_latency_us(&self) -> f64 {
        self.totals().max_latency_us()
    }

    /// Units per microsecond, i.e. millions of units per second.
    pub fn rate_mega(&self) -> f64 {
        self.totals().rate_mega()
    }

    pub fn cpu_usage_percent(&self, period: Duration) -> f64 {
        self.totals().cpu_usage_percent(period)
    }
}

impl Default for BlockAggregate {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BlockAggregate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockAggregate")
            .field("totals", &self.totals())
            .finish()
    }
}

/// Raw sums read out of a [`BlockAggregate`], plus the derived formulas.
///
/// Every ratio returns `0.0` when its denominator is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockTotals {
    pub count: u64,
    pub sum_units: u64,
    pub sum_elapsed_ns: u64,
    pub sum_cpu_ns: u64,
    /// Zero when no sample was recorded.
    pub min_elapsed_ns: u64,
    pub max_elapsed_ns: u64,
}

impl BlockTotals {
    fn from_raw(
        count: u64,
        sum_units: u64,
        sum_elapsed_ns: u64,
        sum_cpu_ns: u64,
        min_elapsed_ns: u64,
        max_elapsed_ns: u64,
    ) -> Self {
        Self {
            count,
            sum_units,
            sum_elapsed_ns,
            sum_cpu_ns,
            min_elapsed_ns: if min_elapsed_ns == MIN_UNSET {
                0
            } else {
                min_elapsed_ns
            },
            max_elapsed_ns,
        }
    }

    pub fn average_units(&self) -> f64 {
        ratio(self.sum_units as f64, self.count as f64)
    }

    pub fn average_latency_us(&self) -> f64 {
        ratio(self.sum_elapsed_ns as f64, self.count as f64) / 1000.0
    }

    pub fn min_latency_us(&self) -> f64 {
        self.min_elapsed_ns as f64 / 1000.0
    }

    pub fn max_latency_us(&self) -> f64 {
        self.max_elapsed_ns as f64 / 1000.0
    }

    /// `sum_units / sum_elapsed_ns * 1000`: Mbps for bits, MRE/s for
    /// resource elements, Msymbol/s for symbols.
    pub fn rate_mega(&self) -> f64 {
        ratio(self.sum_units as f64, self.sum_elapsed_ns as f64) * 1000.0
    }

    pub fn cpu_time_us(&self) -> f64 {
        self.sum_cpu_ns as f64 / 1000.0
    }

    /// `100 * cpu_time_us / period_us`.
    pub fn cpu_usage_percent(&self, period: Duration) -> f64 {
        100.0 * ratio(self.cpu_time_us(), period.as_secs_f64() * 1e6)
    }
}

/// Tracks count and sum for counter-type side metrics (decoder iterations,
/// CRC outcomes).
/// All operations are atomic and safe for concurrent use.
pub struct CounterAggregate {
    count: AtomicU64,
    sum: AtomicU64,
}

impl CounterAggregate {
    /// Creates a new counter aggregate.
    pub fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: AtomicU64::new(0),
        }
    }

    /// Records a value, incrementing count by 1.
    #[inline]
    pub fn add(&self, value: u64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum.fetch_add(value, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot.
    pub fn totals(&self) -> CounterTotals {
        CounterTotals {
            count: self.count.load(Ordering::Relaxed),
            sum: self.sum.load(Ordering::Relaxed),
        }
    }

    /// Reads and resets both counters.
    pub fn take(&self) -> CounterTotals {
        CounterTotals {
            count: self.count.swap(0, Ordering::Relaxed),
            sum: self.sum.swap(0, Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
        self.sum.store(0, Ordering::Relaxed);
    }
}

impl Default for CounterAggregate {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CounterAggregate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterAggregate")
            .field("totals", &self.totals())
            .finish()
    }
}

/// Point-in-time view of counter statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterTotals {
    pub count: u64,
    pub sum: u64,
}

impl CounterTotals {
    pub fn average(&self) -> f64 {
        ratio(self.sum as f64, self.count as f64)
    }

    /// Share of the count carried by `sum`, in percent. Meaningful when every
    /// recorded value is 0 or 1.
    pub fn percent(&self) -> f64 {
        100.0 * self.average()
    }
}

/// Divides, returning zero for a zero denominator.
#[inline]
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Lowers `target` to `value` if `value` is strictly smaller.
#[inline]
pub(crate) fn update_min(target: &AtomicU64, value: u64) {
    let mut current = target.load(Ordering::Relaxed);
    while value < current {
        match target.compare_exchange_weak(current, value, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }
}

/// Raises `target` to `value` if `value` is strictly larger.
#[inline]
pub(crate) fn update_max(target: &AtomicU64, value: u64) {
    let mut current = target.load(Ordering::Relaxed);
    while value > current {
        match target.compare_exchange_weak(current, value, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }
}

#[inline]
pub(crate) fn duration_as_ns(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(v: u64) -> Duration {
        Duration::from_nanos(v)
    }

    #[test]
    fn test_block_aggregate_single_value() {
        let agg = BlockAggregate::new();
        agg.record(1_000, ns(5_000), ns(4_000));

        let t = agg.totals();
        assert_eq!(t.count, 1);
        assert_eq!(t.sum_units, 1_000);
        assert_eq!(t.sum_elapsed_ns, 5_000);
        assert_eq!(t.sum_cpu_ns, 4_000);
        assert_eq!(t.min_elapsed_ns, 5_000);
        assert_eq!(t.max_elapsed_ns, 5_000);
    }

    #[test]
    fn test_block_aggregate_multiple_values() {
        let agg = BlockAggregate::new();
        agg.record(100, ns(10_000), Duration::ZERO);
        agg.record(200, ns(20_000), Duration::ZERO);
        agg.record(300, ns(15_000), Duration::ZERO);

        assert_eq!(agg.count(), 3);
        assert!((agg.average_units() - 200.0).abs() < 1e-9);
        assert!((agg.average_latency_us() - 15.0).abs() < 1e-9);
        assert!((agg.min_latency_us() - 10.0).abs() < 1e-9);
        assert!((agg.max_latency_us() - 20.0).abs() < 1e-9);
        assert!((agg.rate_mega() - 600.0 / 45_000.0 * 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_block_aggregate_empty_reads_zero() {
        let agg = BlockAggregate::new();
        let t = agg.totals();
        assert_eq!(t, BlockTotals::default());
        assert_eq!(agg.average_units(), 0.0);
        assert_eq!(agg.average_latency_us(), 0.0);
        assert_eq!(agg.min_latency_us(), 0.0);
        assert_eq!(agg.max_latency_us(), 0.0);
        assert_eq!(agg.rate_mega(), 0.0);
        assert_eq!(agg.cpu_usage_percent(Duration::from_secs(1)), 0.0);
    }

    #[test]
    fn test_block_aggregate_reset_is_hard_zero() {
        let agg = BlockAggregate::new();
        for i in 1..=50u64 {
            agg.record(i * 8, ns(i * 100), ns(i * 90));
        }
        agg.reset();

        assert_eq!(agg.totals(), BlockTotals::default());
        assert_eq!(agg.average_latency_us(), 0.0);
        assert_eq!(agg.rate_mega(), 0.0);

        // Extrema start over after a reset.
        agg.record(8, ns(7_000), Duration::ZERO);
        assert_eq!(agg.totals().min_elapsed_ns, 7_000);
        assert_eq!(agg.totals().max_elapsed_ns, 7_000);
    }

    #[test]
    fn test_block_aggregate_take_resets() {
        let agg = BlockAggregate::new();
        agg.record(64, ns(1_000), ns(800));
        agg.record(64, ns(3_000), ns(900));

        let first = agg.take();
        assert_eq!(first.count, 2);
        assert_eq!(first.sum_units, 128);
        assert_eq!(first.min_elapsed_ns, 1_000);
        assert_eq!(first.max_elapsed_ns, 3_000);

        let second = agg.take();
        assert_eq!(second, BlockTotals::default());
    }

    #[test]
    fn test_cpu_usage_percent() {
        let agg = BlockAggregate::new();
        // 250ms of CPU over a 1s period.
        agg.record(0, ns(1), Duration::from_millis(250));
        let pct = agg.cpu_usage_percent(Duration::from_secs(1));
        assert!((pct - 25.0).abs() < 1e-9);
        assert_eq!(agg.cpu_usage_percent(Duration::ZERO), 0.0);
    }

    #[test]
    fn test_duration_saturates() {
        assert_eq!(duration_as_ns(Duration::MAX), u64::MAX);
        assert_eq!(duration_as_ns(ns(42)), 42);
    }

    #[test]
    fn test_counter_aggregate_add() {
        let agg = CounterAggregate::new();
        agg.add(100);
        agg.add(200);

        let snap = agg.totals();
        assert_eq!(snap.count, 2);
        assert_eq!(snap.sum, 300);
        assert!((snap.average() - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_counter_aggregate_percent() {
        let agg = CounterAggregate::new();
        agg.add(1);
        agg.add(1);
        agg.add(1);
        agg.add(0);

        let snap = agg.take();
        assert!((snap.percent() - 75.0).abs() < 1e-9);
        assert_eq!(agg.totals(), CounterTotals::default());
    }

    #[test]
    fn test_counter_aggregate_empty_snapshot() {
        let agg = CounterAggregate::new();
        let snap = agg.totals();
        assert_eq!(snap.count, 0);
        assert_eq!(snap.sum, 0);
        assert_eq!(snap.average(), 0.0);
        assert_eq!(snap.percent(), 0.0);
    }

    #[test]
    fn test_block_aggregate_concurrent() {
        use std::sync::Arc;
        use std::thread;

        let agg = Arc::new(BlockAggregate::new());
        let mut handles = Vec::new();

        for t in 0..4u64 {
            let agg = Arc::clone(&agg);
            handles.push(thread::spawn(move || {
                for i in 1..=1000u64 {
                    agg.record(1, ns(t * 1000 + i), Duration::ZERO);
                }
            }));
        }

        for h in handles {
            h.join().expect("thread panicked");
        }

        let t = agg.totals();
        assert_eq!(t.count, 4000);
        assert_eq!(t.sum_units, 4000);
        assert_eq!(t.min_elapsed_ns, 1);
        assert_eq!(t.max_elapsed_ns, 4000);
    }
}
