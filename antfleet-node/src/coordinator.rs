use std::collections::BTreeSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::membership::ClusterMembership;
use crate::request::{CrawlRequest, RequestKey, ScrapeResult};
use crate::router::RequestRouter;
use crate::statistics::FleetStatistics;

/// The queue routed requests are handed to before being delivered to
/// their owning node.
pub trait RequestQueue: Send + Sync + 'static {
    /// Enqueues a routed request for delivery.
    fn push(&self, request: CrawlRequest);

    /// The number of requests which have not been picked up for delivery yet.
    fn pending(&self) -> usize;
}

/// Tracks in-flight work and answers whether the distributed crawl is done.
///
/// Only the master's coordinator sees every in-flight request, so it is
/// the only one whose [CrawlCoordinator::is_stop] is authoritative.
pub struct CrawlCoordinator {
    membership: ClusterMembership,
    router: Arc<dyn RequestRouter>,
    queue: Arc<dyn RequestQueue>,
    in_flight: Mutex<BTreeSet<RequestKey>>,
    statistics: FleetStatistics,
}

impl CrawlCoordinator {
    pub fn new(
        membership: ClusterMembership,
        router: Arc<dyn RequestRouter>,
        queue: Arc<dyn RequestQueue>,
        statistics: FleetStatistics,
    ) -> Self {
        Self {
            membership,
            router,
            queue,
            in_flight: Mutex::new(BTreeSet::new()),
            statistics,
        }
    }

    /// Routes the request to its owner and tracks it as in-flight.
    ///
    /// The request is registered before it is queued so a completion can
    /// never arrive for an entry that does not exist yet. A request whose
    /// key is already in-flight is dropped.
    pub fn distribute_request(&self, mut request: CrawlRequest) {
        if !request.is_routed() {
            let members = self.membership.all_members();
            match self.router.route(&request, &members) {
                Some(owner) => request.owner_node_id = owner,
                None => {
                    warn!(
                        url = %request.url,
                        "No members available to own request, keeping it local."
                    );
                    request.owner_node_id = self.membership.me().id.clone();
                },
            }
        }

        let key = request.key();
        {
            let mut in_flight = self.in_flight.lock();
            if !in_flight.insert(key.clone()) {
                debug!(
                    owner_node_id = %key.owner_node_id,
                    unique_name = %key.unique_name,
                    "Request is already in-flight, skipping."
                );
                return;
            }
            self.statistics
                .num_in_flight
                .store(in_flight.len() as u64, Ordering::Relaxed);
        }
        self.statistics.num_distributed.fetch_add(1, Ordering::Relaxed);

        trace!(
            owner_node_id = %key.owner_node_id,
            unique_name = %key.unique_name,
            "Distributing request."
        );
        self.queue.push(request);
    }

    /// Processes a finished unit of work.
    ///
    /// Follow-up requests are registered before the crawled request is
    /// released so the in-flight set never transiently empties.
    pub fn accept_result(&self, result: ScrapeResult) {
        for request in result.scraped_requests.into_iter().flatten() {
            self.distribute_request(request);
        }

        self.crawled(&result.request);
    }

    /// Marks the request as crawled, removing it from the in-flight set.
    pub fn crawled(&self, key: &RequestKey) -> bool {
        let mut in_flight = self.in_flight.lock();
        let removed = in_flight.remove(key);
        self.statistics
            .num_in_flight
            .store(in_flight.len() as u64, Ordering::Relaxed);
        drop(in_flight);

        if removed {
            self.statistics.num_crawled.fetch_add(1, Ordering::Relaxed);
        } else {
            debug!(
                owner_node_id = %key.owner_node_id,
                unique_name = %key.unique_name,
                "Crawled request was not in-flight."
            );
        }

        removed
    }

    /// Returns `true` when there is no in-flight work and nothing is queued
    /// for delivery.
    pub fn is_stop(&self) -> bool {
        self.in_flight.lock().is_empty() && self.queue.pending() == 0
    }

    /// A snapshot of the in-flight keys.
    pub fn in_flight(&self) -> Vec<RequestKey> {
        self.in_flight.lock().iter().cloned().collect()
    }

    pub fn num_in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }
}
