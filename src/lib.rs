//! Lock-free aggregation of 5G NR upper-PHY processing metrics.
//!
//! Processing blocks push one sample per operation through a
//! [`metrics::MetricNotifier`]; a single reader periodically calls
//! [`metrics::DuLowCollector::collect_metrics`] to turn the accumulated
//! counters into per-period snapshots, which [`render`] turns into JSON.

pub mod agent;
pub mod clock;
pub mod config;
pub mod loadgen;
pub mod metrics;
pub mod render;
pub mod reporter;
