//! Periodic status polling.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::orchestrator::Orchestrator;

/// Call `get_status` every `interval` until `shutdown` flips.
pub async fn run_status_poller(
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(interval_secs = interval.as_secs(), "status poller started");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let reading = orchestrator.get_status(None).await;
                debug!(intensity = reading.intensity, status = %reading.status, "status poll");
            }
            _ = shutdown.changed() => {
                info!("status poller shutting down");
                break;
            }
        }
    }
}
