//! Periodic collection and rendering of DU-low metrics.

mod output;

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{bail, Context, Result};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub use output::{LineBuffer, Output};

use crate::metrics::DuLowCollector;
use crate::render::{self, PciTable};

/// Drives the collector on a fixed cadence and writes one JSON document per
/// collection.
///
/// The reporter is the only caller of `collect_metrics` on its collector.
#[derive(Debug)]
pub struct Reporter {
    collector: Arc<DuLowCollector>,
    pcis: PciTable,
    output: Output,
    pretty: bool,
    interval: Duration,
}

impl Reporter {
    pub fn new(
        collector: Arc<DuLowCollector>,
        pcis: PciTable,
        output: Output,
        pretty: bool,
        interval: Duration,
    ) -> Result<Self> {
        if pcis.len() < collector.nof_sectors() {
            bail!(
                "{} sectors but only {} PCIs configured",
                collector.nof_sectors(),
                pcis.len()
            );
        }

        if interval.is_zero() {
            bail!("report interval must be positive");
        }

        Ok(Self {
            collector,
            pcis,
            output,
            pretty,
            interval,
        })
    }

    /// Collects every sector once and writes the rendered document.
    pub fn report_once(&mut self) -> Result<()> {
        let metrics = self.collector.collect_metrics();
        let now = SystemTime::now();

        let line = if self.pretty {
            render::generate_string_pretty(&metrics, &self.pcis, now)
        } else {
            render::generate_string(&metrics, &self.pcis, now)
        }
        .context("rendering metrics")?;

        self.output.write_line(&line)?;

        debug!(
            output = self.output.name(),
            sectors = metrics.upper_phy.len(),
            bytes = line.len(),
            "metrics reported",
        );

        Ok(())
    }

    /// Reports every interval until `cancel` fires, then reports the partial
    /// period one last time.
    pub async fn run(mut self, cancel: CancellationToken) {
        // The first collection of a sector only sets its baseline.
        if !self.collector.sectors().all(|s| s.is_initialized()) {
            self.collector.collect_metrics();
        }

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval = ?self.interval,
            output = self.output.name(),
            sectors = self.collector.nof_sectors(),
            "reporter started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    if let Err(e) = self.report_once() {
                        error!(output = self.output.name(), error = %e, "final report failed");
                    }
                    break;
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.report_once() {
                        error!(output = self.output.name(), error = %e, "report failed");
                    }
                }
            }
        }

        info!("reporter stopped");
    }
}
