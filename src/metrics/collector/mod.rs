//! Collectors drain aggregators into snapshots.
//!
//! Each domain collector owns a fixed set of aggregators and hands out
//! references to their notifiers for wiring. [`UpperPhyCollector`] composes the
//! domain collectors of one sector and stamps the collection period;
//! [`DuLowCollector`] holds one of those per sector.

use std::time::Duration;

mod channel;
mod du_low;
mod keyed;
mod ldpc;
mod pdsch;
mod pusch;
mod upper_phy;

pub use channel::ChannelProcessingCollector;
pub use du_low::DuLowCollector;
pub use keyed::{CrcCollector, KeyedCollector, ModulationCollector, PrecodingCollector, ScramblingCollector};
pub use ldpc::{LdpcDecoderCollector, LdpcEncoderCollector};
pub use pdsch::PdschCollector;
pub use pusch::PuschCollector;
pub use upper_phy::{UpperPhyCollector, UpperPhyNotifiers};

/// A collector owning the aggregators of one processing domain.
pub trait DomainCollector {
    type Metrics;

    /// Reads out every owned aggregator, resetting each as it is read.
    ///
    /// `period` is the wall-clock time covered by this collection and scales
    /// CPU usage. Only one thread may collect at a time.
    fn collect_metrics(&self, period: Duration) -> Self::Metrics;

    /// Discards everything aggregated so far.
    fn reset(&self);
}
