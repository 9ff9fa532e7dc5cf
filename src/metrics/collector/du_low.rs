use std::sync::Arc;

use super::UpperPhyCollector;
use crate::clock::TimeSource;
use crate::metrics::snapshot::DuLowMetrics;

/// Collector for every sector of the DU low, one [`UpperPhyCollector`] each.
#[derive(Debug)]
pub struct DuLowCollector {
    sectors: Vec<UpperPhyCollector>,
}

impl DuLowCollector {
    pub fn new(nof_sectors: usize, time: Arc<dyn TimeSource>) -> Self {
        Self {
            sectors: (0..nof_sectors)
                .map(|sector_id| UpperPhyCollector::new(sector_id, Arc::clone(&time)))
                .collect(),
        }
    }

    pub fn nof_sectors(&self) -> usize {
        self.sectors.len()
    }

    pub fn sector(&self, sector_id: usize) -> Option<&UpperPhyCollector> {
        self.sectors.get(sector_id)
    }

    pub fn sectors(&self) -> impl Iterator<Item = &UpperPhyCollector> {
        self.sectors.iter()
    }

    /// Collects every sector, in sector order.
    ///
    /// Must not be called from more than one thread at a time.
    pub fn collect_metrics(&self) -> DuLowMetrics {
        DuLowMetrics {
            upper_phy: self
                .sectors
                .iter()
                .map(UpperPhyCollector::collect_metrics)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::clock::ManualClock;
    use crate::metrics::sample::ChannelEstimatorSample;

    #[test]
    fn test_sectors_are_independent() {
        let time = Arc::new(ManualClock::new());
        let du = DuLowCollector::new(3, time.clone());
        assert_eq!(du.nof_sectors(), 3);
        assert!(du.sector(3).is_none());

        du.collect_metrics();
        let estimator = du.sector(1).unwrap().get_notifiers().channel_estimator();
        estimator.on_new_metric(&ChannelEstimatorSample {
            nof_re: 3_276,
            elapsed: Duration::from_micros(10),
            cpu_time: Duration::from_micros(10),
        });

        time.advance(Duration::from_millis(100));
        let m = du.collect_metrics();
        let ids: Vec<_> = m.upper_phy.iter().map(|s| s.sector_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        let calls: Vec<_> = m
            .upper_phy
            .iter()
            .map(|s| s.ul.channel.channel_estimator.latency.nof_calls)
            .collect();
        assert_eq!(calls, vec![0, 1, 0]);
        assert!(m
            .upper_phy
            .iter()
            .all(|s| s.metrics_period == Duration::from_millis(100)));
    }

    #[test]
    fn test_first_collection_is_empty_for_every_sector() {
        let du = DuLowCollector::new(2, Arc::new(ManualClock::new()));
        let m = du.collect_metrics();
        assert_eq!(m.upper_phy.len(), 2);
        assert!(m
            .upper_phy
            .iter()
            .all(|s| s.metrics_period == Duration::ZERO));
    }
}
