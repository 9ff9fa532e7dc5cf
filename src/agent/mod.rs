use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::clock::{SystemClock, TimeSource};
use crate::config::Config;
use crate::loadgen::{LoadGenerator, LoadgenStats};
use crate::metrics::DuLowCollector;
use crate::render::PciTable;
use crate::reporter::{Output, Reporter};

const LOADGEN_STATS_INTERVAL: Duration = Duration::from_secs(10);

/// Agent wires the collector, the reporter and the optional load generator.
pub struct Agent {
    cfg: Config,
    time: Arc<dyn TimeSource>,
    collector: Arc<DuLowCollector>,
    output: Option<Output>,
    reporter: Option<JoinHandle<()>>,
    loadgen: Option<LoadGenerator>,
    cancel: CancellationToken,
    reporter_cancel: CancellationToken,
}

impl Agent {
    /// Creates an agent writing to the output named in `cfg`.
    pub fn new(cfg: Config) -> Result<Self> {
        let output = Output::from_config(&cfg.output).context("opening metrics output")?;
        Ok(Self::with_output(cfg, output))
    }

    /// Creates an agent writing to `output`, ignoring `cfg.output`.
    pub fn with_output(cfg: Config, output: Output) -> Self {
        let time: Arc<dyn TimeSource> = Arc::new(SystemClock::new());
        let collector = Arc::new(DuLowCollector::new(cfg.sectors.len(), Arc::clone(&time)));

        Self {
            cfg,
            time,
            collector,
            output: Some(output),
            reporter: None,
            loadgen: None,
            cancel: CancellationToken::new(),
            reporter_cancel: CancellationToken::new(),
        }
    }

    /// The collector producers report into.
    pub fn collector(&self) -> Arc<DuLowCollector> {
        Arc::clone(&self.collector)
    }

    /// Starts the reporter, then the load generator if enabled.
    pub async fn start(&mut self) -> Result<()> {
        let output = self.output.take().context("agent already started")?;

        let reporter = Reporter::new(
            Arc::clone(&self.collector),
            PciTable::new(self.cfg.pcis()),
            output,
            self.cfg.output.pretty,
            self.cfg.collection.interval,
        )
        .context("creating reporter")?;
        self.reporter = Some(tokio::spawn(reporter.run(self.reporter_cancel.clone())));

        if self.cfg.loadgen.enabled {
            let generator = LoadGenerator::start(
                &self.cfg.loadgen,
                Arc::clone(&self.collector),
                Arc::clone(&self.time),
                self.cancel.clone(),
            )
            .context("starting load generator")?;
            self.spawn_loadgen_stats_reporter(generator.stats());
            self.loadgen = Some(generator);
        }

        info!(
            sectors = self.collector.nof_sectors(),
            interval = ?self.cfg.collection.interval,
            loadgen = self.cfg.loadgen.enabled,
            "agent started",
        );

        Ok(())
    }

    /// Stops the producers, then lets the reporter write its final document.
    pub async fn stop(&mut self) -> Result<()> {
        self.cancel.cancel();

        if let Some(generator) = self.loadgen.take() {
            tokio::task::spawn_blocking(move || generator.join())
                .await
                .context("joining load generator")?;
        }

        self.reporter_cancel.cancel();

        if let Some(reporter) = self.reporter.take() {
            if let Err(e) = reporter.await {
                error!(error = %e, "reporter task failed");
            }
        }

        info!("agent stopped");

        Ok(())
    }

    /// Spawn background load generator stats logger.
    fn spawn_loadgen_stats_reporter(&self, stats: Arc<LoadgenStats>) {
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(LOADGEN_STATS_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {
                        let (slots, samples) = stats.snapshot();

                        if slots == 0 {
                            continue;
                        }

                        debug!(slots, samples, "load generator stats (10s)");
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::config::{LoadgenConfig, SectorConfig};
    use crate::reporter::LineBuffer;

    fn test_config(loadgen: bool) -> Config {
        let mut cfg = Config {
            sectors: vec![SectorConfig { pci: 11 }, SectorConfig { pci: 22 }],
            loadgen: LoadgenConfig {
                enabled: loadgen,
                numerology: 2,
                ..Default::default()
            },
            ..Default::default()
        };
        cfg.collection.interval = Duration::from_millis(25);
        cfg
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_agent_reports_loadgen_traffic() {
        let lines = LineBuffer::default();
        let mut agent = Agent::with_output(test_config(true), Output::Buffer(Arc::clone(&lines)));

        agent.start().await.expect("start");
        tokio::time::sleep(Duration::from_millis(120)).await;
        agent.stop().await.expect("stop");

        let lines = lines.lock();
        assert!(lines.len() >= 2, "got {} lines", lines.len());

        let last: Value = serde_json::from_str(lines.last().expect("last line")).expect("json");
        let sectors = last["du_low"]["upper_phy"].as_array().expect("sectors");
        assert_eq!(sectors.len(), 2);
        assert_eq!(sectors[0]["pci"], 11);
        assert_eq!(sectors[1]["pci"], 22);

        let total_calls: u64 = lines
            .iter()
            .map(|l| serde_json::from_str::<Value>(l).expect("json"))
            .flat_map(|doc| {
                doc["du_low"]["upper_phy"]
                    .as_array()
                    .cloned()
                    .unwrap_or_default()
            })
            .filter_map(|s| s["dl"]["pdsch"]["nof_calls"].as_u64())
            .sum();
        assert!(total_calls > 0);
    }

    #[tokio::test]
    async fn test_agent_without_loadgen_reports_idle_sectors() {
        let lines = LineBuffer::default();
        let mut agent = Agent::with_output(test_config(false), Output::Buffer(Arc::clone(&lines)));

        agent.start().await.expect("start");
        tokio::time::sleep(Duration::from_millis(60)).await;
        agent.stop().await.expect("stop");

        let lines = lines.lock();
        assert!(!lines.is_empty());
        for line in lines.iter() {
            let doc: Value = serde_json::from_str(line).expect("json");
            assert_eq!(doc["du_low"]["upper_phy"][1]["dl"]["pdsch"]["nof_calls"], 0);
        }
    }

    #[tokio::test]
    async fn test_agent_start_twice_fails() {
        let mut agent = Agent::with_output(test_config(false), Output::Buffer(LineBuffer::default()));
        agent.start().await.expect("start");
        assert!(agent.start().await.is_err());
        agent.stop().await.expect("stop");
    }
}
