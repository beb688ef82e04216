//! Poll the vacuum and publish its state.

use crate::device::data::DeviceSnapshot;
use crate::device::traits::VacuumClient;
use crate::error::Result;
use crate::metrics::catalog::RoborockMetrics;
use std::time::Duration;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Drives the poll/translate/publish cycle for one vacuum.
pub struct Poller<C> {
    client: C,
    metrics: RoborockMetrics,
    interval: Duration,
}

impl<C: VacuumClient> Poller<C> {
    pub fn new(client: C, metrics: RoborockMetrics, interval: Duration) -> Self {
        Self {
            client,
            metrics,
            interval,
        }
    }

    pub fn metrics(&self) -> &RoborockMetrics {
        &self.metrics
    }

    /// Query status, history and consumables, in that order.
    ///
    /// Nothing is published; the first failing query aborts the cycle.
    pub async fn poll_once(&mut self) -> Result<DeviceSnapshot> {
        let status = self.client.status().await?;
        let history = self.client.clean_history().await?;
        let consumables = self.client.consumable_status().await?;
        Ok(DeviceSnapshot::new(status, history, consumables))
    }

    /// Run one cycle. On failure the previously published values stay.
    pub async fn run_cycle(&mut self) -> Result<()> {
        let snapshot = self.poll_once().await?;
        self.metrics.publish(&snapshot);
        debug!(
            "Published snapshot: battery {}%, state {}",
            snapshot.status.battery, snapshot.status.state
        );
        Ok(())
    }

    /// Poll until `cancel` fires, sleeping one interval after every cycle.
    pub async fn run(&mut self, cancel: CancellationToken) {
        info!("Polling vacuum every {}s", self.interval.as_secs());

        loop {
            if let Err(err) = self.run_cycle().await {
                warn!("Failed to poll vacuum, keeping previous values: {}", err);
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = time::sleep(self.interval) => {}
            }
        }

        info!("Polling stopped");
    }
}
