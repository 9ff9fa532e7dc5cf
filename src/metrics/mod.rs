//! Lock-free metrics aggregation for upper-PHY processing blocks.
//!
//! Processing threads push one sample per completed operation through a
//! [`MetricNotifier`]; aggregators fold samples into atomic counters; a single
//! collection thread drains them through the collector tree into a snapshot.

pub mod aggregate;
pub mod aggregator;
pub mod collector;
pub mod notifier;
pub mod packed;
pub mod sample;
pub mod snapshot;

pub use collector::{DuLowCollector, UpperPhyCollector, UpperPhyNotifiers};
pub use notifier::MetricNotifier;
pub use snapshot::{DuLowMetrics, UpperPhyMetrics};
