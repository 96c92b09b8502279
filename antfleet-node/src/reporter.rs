use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::error::NodeError;
use crate::request::ScrapeResult;
use crate::service::ServiceHandle;
use crate::FleetNode;

const REPORTING_INTERVAL: Duration = if cfg!(test) {
    Duration::from_millis(10)
} else {
    Duration::from_millis(100)
};

#[derive(Clone, Default)]
/// A handle to the result reporter service.
///
/// The service periodically drains the crawl engine's results and reports
/// each one to the master.
pub struct Reporter {
    service: ServiceHandle,
}

impl Reporter {
    /// Starts the reporter service if it is not already running.
    pub(crate) fn start(&self, node: FleetNode, results: flume::Receiver<ScrapeResult>) {
        self.service
            .start(move |kill_switch| reporter_service(node, results, kill_switch));
    }

    /// Stops the reporter service.
    pub fn stop(&self) -> Result<(), NodeError> {
        self.service.stop("reporter")
    }

    /// Waits for the background task to exit.
    pub(crate) async fn wait(&self) {
        self.service.wait().await
    }
}

async fn reporter_service(
    node: FleetNode,
    results: flume::Receiver<ScrapeResult>,
    kill_switch: Arc<AtomicBool>,
) {
    info!(self_node_id = %node.me().id, "Result reporter service is running.");

    let mut interval = interval(REPORTING_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;

        if kill_switch.load(Ordering::Relaxed) {
            break;
        }

        while let Ok(result) = results.try_recv() {
            let key = result.request.clone();
            if let Err(e) = node.report_to_master(result).await {
                error!(
                    error = ?e,
                    owner_node_id = %key.owner_node_id,
                    unique_name = %key.unique_name,
                    "Failed to report crawl result to master."
                );
            }
        }
    }

    info!(self_node_id = %node.me().id, "Result reporter service has stopped.");
}
