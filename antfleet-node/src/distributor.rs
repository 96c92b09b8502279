use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::coordinator::RequestQueue;
use crate::error::NodeError;
use crate::identity::NodeId;
use crate::request::CrawlRequest;
use crate::service::ServiceHandle;
use crate::FleetNode;

const DISTRIBUTION_INTERVAL: Duration = if cfg!(test) {
    Duration::from_millis(10)
} else {
    Duration::from_millis(100)
};

#[derive(Clone)]
/// A handle to the request distributor service.
///
/// Routed requests are queued on the handle and delivered to their owning
/// node in batches by a background task. This handle is cheap to clone.
pub struct Distributor {
    tx: flume::Sender<CrawlRequest>,
    rx: flume::Receiver<CrawlRequest>,
    service: ServiceHandle,
}

impl Default for Distributor {
    fn default() -> Self {
        let (tx, rx) = flume::unbounded();
        Self {
            tx,
            rx,
            service: ServiceHandle::default(),
        }
    }
}

impl RequestQueue for Distributor {
    fn push(&self, request: CrawlRequest) {
        // The handle keeps the receiver alive, sending cannot fail.
        let _ = self.tx.send(request);
    }

    fn pending(&self) -> usize {
        self.tx.len()
    }
}

impl Distributor {
    /// Starts the distributor service if it is not already running.
    pub(crate) fn start(&self, node: FleetNode) {
        let rx = self.rx.clone();
        self.service
            .start(move |kill_switch| distributor_service(node, rx, kill_switch));
    }

    /// Stops the distributor service.
    ///
    /// Requests still queued stay queued until the service is started again.
    pub fn stop(&self) -> Result<(), NodeError> {
        self.service.stop("distributor")
    }

    /// Waits for the background task to exit.
    pub(crate) async fn wait(&self) {
        self.service.wait().await
    }
}

async fn distributor_service(
    node: FleetNode,
    rx: flume::Receiver<CrawlRequest>,
    kill_switch: Arc<AtomicBool>,
) {
    info!(self_node_id = %node.me().id, "Request distributor service is running.");

    let mut interval = interval(DISTRIBUTION_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;

        if kill_switch.load(Ordering::Relaxed) {
            break;
        }

        let mut batches = BTreeMap::<NodeId, Vec<CrawlRequest>>::new();
        while let Ok(request) = rx.try_recv() {
            batches
                .entry(request.owner_node_id.clone())
                .or_default()
                .push(request);
        }

        if batches.is_empty() {
            continue;
        }

        join_all(
            batches
                .into_iter()
                .map(|(owner, requests)| deliver_batch(&node, owner, requests)),
        )
        .await;
    }

    info!(self_node_id = %node.me().id, "Request distributor service has stopped.");
}

async fn deliver_batch(node: &FleetNode, owner: NodeId, requests: Vec<CrawlRequest>) {
    if node.is_me(&owner) {
        for request in requests {
            node.accept_request(request);
        }
        return;
    }

    let peer = match node.membership().member(&owner) {
        Some(member) => member.peer_addr(),
        None => {
            warn!(
                target_node_id = %owner,
                num_requests = requests.len(),
                "Owner of requests is not a known member, crawling locally."
            );
            for request in requests {
                node.accept_request(request);
            }
            return;
        },
    };

    debug!(target_addr = %peer, num_requests = requests.len(), "Delivering requests.");
    for request in requests {
        if let Err(e) = node.transport().accept_request(&peer, &request).await {
            warn!(
                error = ?e,
                target_addr = %peer,
                url = %request.url,
                "Failed to deliver request to owner, crawling locally."
            );
            node.accept_request(request);
        }
    }
}
