use std::sync::Arc;
use std::time::Duration;

use datacake_rpc::Server;
use futures::future::join_all;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, error, info, warn};

use crate::coordinator::CrawlCoordinator;
use crate::distributor::Distributor;
use crate::engine::CrawlEngine;
use crate::error::NodeError;
use crate::identity::{NodeId, NodeIdentity};
use crate::join::JoinProtocol;
use crate::membership::ClusterMembership;
use crate::reporter::Reporter;
use crate::request::{CrawlRequest, ScrapeResult, StartSpiderResult};
use crate::router::{HashRouter, RequestRouter};
use crate::statistics::FleetStatistics;
use crate::transport::{ClusterTransport, JoinResponse, MembershipNotice};

const TERMINATION_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Clone)]
/// A single crawler process taking part in the fleet.
///
/// The node wires the membership, the join protocol, the coordinator and the
/// local crawl engine together and answers the fleet protocol on behalf of
/// all of them. This handle is cheap to clone.
pub struct FleetNode(Arc<FleetNodeInner>);

struct FleetNodeInner {
    me: NodeIdentity,
    seed_nodes: Vec<String>,
    membership: ClusterMembership,
    join_protocol: JoinProtocol,
    coordinator: CrawlCoordinator,
    engine: Arc<dyn CrawlEngine>,
    transport: Arc<dyn ClusterTransport>,
    distributor: Distributor,
    reporter: Reporter,
    crawl_task: Mutex<Option<JoinHandle<()>>>,
    rpc_server: Mutex<Option<Server>>,
    statistics: FleetStatistics,
}

impl FleetNode {
    /// Creates a new node routing requests with a [HashRouter].
    ///
    /// The node does nothing until [FleetNode::join_node] is called.
    pub fn new(
        me: NodeIdentity,
        seed_nodes: Vec<String>,
        engine: Arc<dyn CrawlEngine>,
        transport: Arc<dyn ClusterTransport>,
    ) -> Self {
        Self::with_router(me, seed_nodes, engine, transport, Arc::new(HashRouter))
    }

    /// Creates a new node using a custom request router.
    pub fn with_router(
        me: NodeIdentity,
        seed_nodes: Vec<String>,
        engine: Arc<dyn CrawlEngine>,
        transport: Arc<dyn ClusterTransport>,
        router: Arc<dyn RequestRouter>,
    ) -> Self {
        let statistics = FleetStatistics::default();
        let membership = ClusterMembership::new(me.clone(), statistics.clone());
        let join_protocol =
            JoinProtocol::new(membership.clone(), engine.clone(), transport.clone());

        let distributor = Distributor::default();
        let coordinator = CrawlCoordinator::new(
            membership.clone(),
            router,
            Arc::new(distributor.clone()),
            statistics.clone(),
        );

        Self(Arc::new(FleetNodeInner {
            me,
            seed_nodes,
            membership,
            join_protocol,
            coordinator,
            engine,
            transport,
            distributor,
            reporter: Reporter::default(),
            crawl_task: Mutex::new(None),
            rpc_server: Mutex::new(None),
            statistics,
        }))
    }

    pub(crate) fn attach_rpc_server(&self, server: Server) {
        *self.0.rpc_server.lock() = Some(server);
    }

    #[inline]
    /// The identity of this node.
    pub fn me(&self) -> &NodeIdentity {
        &self.0.me
    }

    #[inline]
    /// The membership view of this node.
    pub fn membership(&self) -> &ClusterMembership {
        &self.0.membership
    }

    #[inline]
    /// The coordinator tracking in-flight work.
    ///
    /// Only the master's coordinator is authoritative.
    pub fn coordinator(&self) -> &CrawlCoordinator {
        &self.0.coordinator
    }

    #[inline]
    pub(crate) fn transport(&self) -> &Arc<dyn ClusterTransport> {
        &self.0.transport
    }

    #[inline]
    /// Gets the live fleet statistics.
    pub fn statistics(&self) -> FleetStatistics {
        self.0.statistics.clone()
    }

    #[inline]
    /// Get a stream of membership changes.
    pub fn membership_changes(&self) -> WatchStream<Vec<NodeIdentity>> {
        self.0.membership.member_change_watcher()
    }

    /// Starts the background services and attaches the node to the fleet.
    ///
    /// Returns if an existing cluster was found through the seed nodes,
    /// otherwise the node has elected itself master.
    pub async fn join_node(&self) -> bool {
        self.start_services();
        self.0.join_protocol.join_node(&self.0.seed_nodes).await
    }

    fn start_services(&self) {
        self.0.distributor.start(self.clone());
        self.0
            .reporter
            .start(self.clone(), self.0.engine.subscribe_results());
    }

    /// Enters the reconfiguration lock, pausing crawl processing.
    pub fn join(&self) {
        self.0.join_protocol.join();
    }

    /// Leaves the reconfiguration lock if a master is known.
    pub fn ready(&self) -> bool {
        self.0.join_protocol.ready()
    }

    /// Handles a remote node asking to join the cluster.
    pub async fn handle_join(&self, caller: NodeIdentity) -> JoinResponse {
        self.0.join_protocol.handle_join(caller).await
    }

    /// Adds a remote node to the cluster.
    pub async fn add_node_to_cluster(&self, info: NodeIdentity) {
        self.0.join_protocol.add_node_to_cluster(info).await
    }

    /// Sets the master to an already known member.
    pub fn add_master_node(&self, master: &NodeIdentity) -> bool {
        self.0.join_protocol.add_master_node(master)
    }

    /// Applies a membership announcement from the master.
    pub fn handle_membership_notice(&self, notice: MembershipNotice) {
        self.0.join_protocol.handle_membership_notice(notice)
    }

    #[inline]
    pub fn is_me(&self, node_id: &str) -> bool {
        self.0.me.id == node_id
    }

    #[inline]
    /// Returns if this node is the cluster master.
    pub fn is_master_node(&self) -> bool {
        self.0.membership.is_master(&self.0.me.id)
    }

    #[inline]
    pub fn get_master_name(&self) -> Option<NodeId> {
        self.0.membership.master_id()
    }

    #[inline]
    pub fn get_master_node(&self) -> Option<NodeIdentity> {
        self.0.membership.master_node()
    }

    /// Every member which has to be told to stop when the cluster closes.
    pub fn get_all_node_for_close(&self) -> Vec<NodeIdentity> {
        self.0.membership.all_members()
    }

    /// Introduces new work into the fleet.
    ///
    /// The master routes and tracks the request, any other node forwards it
    /// to the master.
    pub async fn distribute_request(&self, request: CrawlRequest) -> Result<(), NodeError> {
        if self.is_master_node() {
            self.0.coordinator.distribute_request(request);
            return Ok(());
        }

        let master = self.get_master_node().ok_or(NodeError::NoMaster)?;
        self.0
            .transport
            .distribute(&master.peer_addr(), &request)
            .await
    }

    /// Hands a request routed to this node to the local crawl engine.
    pub fn accept_request(&self, request: CrawlRequest) {
        self.0.engine.push(request);
        self.start_crawl();
    }

    /// Processes a finished unit of work on the master.
    pub fn accept_result(&self, result: ScrapeResult) {
        self.0.coordinator.accept_result(result);
    }

    /// Reports a crawl result to the master, or accepts it directly if
    /// this node is the master.
    pub async fn report_to_master(&self, result: ScrapeResult) -> Result<(), NodeError> {
        if self.is_master_node() {
            self.accept_result(result);
            return Ok(());
        }

        let master = self.get_master_node().ok_or(NodeError::NoMaster)?;
        self.0
            .transport
            .report_result(&master.peer_addr(), &result)
            .await
    }

    /// Returns `true` once the fleet has no work left.
    ///
    /// Only meaningful on the master.
    pub fn is_stop(&self) -> bool {
        self.0.coordinator.is_stop()
    }

    /// Waits until the fleet has no work left or the timeout elapses.
    pub async fn wait_for_termination(&self, timeout: Duration) -> Result<(), anyhow::Error> {
        let fut = async {
            while !self.is_stop() {
                tokio::time::sleep(TERMINATION_POLL_INTERVAL).await;
            }
        };

        tokio::time::timeout(timeout, fut).await?;
        Ok(())
    }

    /// Starts the named spider on this node and on every peer, then
    /// distributes the spider's start requests.
    pub async fn start_spider(&self, name: &str) -> StartSpiderResult {
        let result = self.activate_spider(name);
        if !result.success {
            return result;
        }

        let transport = &self.0.transport;
        join_all(
            self.0
                .membership
                .all_members()
                .into_iter()
                .filter(|member| !self.is_me(&member.id))
                .map(|member| async move {
                    let peer = member.peer_addr();
                    match transport.start_spider(&peer, name).await {
                        Ok(remote) if !remote.success => warn!(
                            target_node_id = %member.id,
                            spider = name,
                            detail = %remote.detail,
                            "Peer refused to start spider."
                        ),
                        Ok(_) => {},
                        Err(error) => warn!(
                            error = %error,
                            target_node_id = %member.id,
                            spider = name,
                            "Failed to start spider on peer."
                        ),
                    }
                }),
        )
        .await;

        for request in self.0.engine.start_requests(name) {
            if let Err(error) = self.distribute_request(request).await {
                error!(error = %error, spider = name, "Failed to distribute start request.");
            }
        }

        result
    }

    /// Starts the named spider on this node only.
    pub fn activate_spider(&self, name: &str) -> StartSpiderResult {
        let result = self.0.engine.start_spider(name);
        if result.success {
            self.start_services();
            self.start_crawl();
        }
        result
    }

    /// Stops the local spider, distributor and reporter.
    ///
    /// Every subsystem is asked to stop even if an earlier one fails,
    /// the first failure is returned.
    pub fn stop_crawl(&self) -> Result<(), NodeError> {
        let outcomes = [
            self.0.engine.stop_spider(),
            self.0.distributor.stop(),
            self.0.reporter.stop(),
        ];

        let mut first_error = None;
        for outcome in outcomes {
            if let Err(error) = outcome {
                warn!(self_node_id = %self.0.me.id, error = %error, "Failed to stop crawl subsystem.");
                first_error.get_or_insert(error);
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Stops crawling on every member of the cluster.
    pub async fn close_cluster(&self) {
        info!(self_node_id = %self.0.me.id, "Closing cluster.");

        let transport = &self.0.transport;
        join_all(
            self.get_all_node_for_close()
                .into_iter()
                .filter(|member| !self.is_me(&member.id))
                .map(|member| async move {
                    if let Err(error) = transport.stop_crawl(&member.peer_addr()).await {
                        warn!(
                            error = %error,
                            target_node_id = %member.id,
                            "Failed to stop crawl on peer."
                        );
                    }
                }),
        )
        .await;

        if let Err(error) = self.stop_crawl() {
            debug!(error = %error, "Local crawl was already partially stopped.");
        }
    }

    pub fn pause_crawl(&self) {
        self.0.engine.pause();
    }

    pub fn unpause_crawl(&self) {
        self.0.engine.unpause();
    }

    /// Spawns the crawl loop if it is not already running.
    pub fn start_crawl(&self) {
        let mut task = self.0.crawl_task.lock();
        if task.as_ref().map(|handle| !handle.is_finished()).unwrap_or(false) {
            return;
        }

        let engine = self.0.engine.clone();
        *task = Some(tokio::spawn(async move { engine.run().await }));
    }

    /// Waits for the given number of members to be part of the cluster.
    pub async fn wait_for_members(
        &self,
        num_members: usize,
        timeout: Duration,
    ) -> Result<(), anyhow::Error> {
        let mut changes = self.membership_changes();
        let fut = async move {
            while let Some(members) = changes.next().await {
                if members.len() >= num_members {
                    return;
                }
            }
        };

        tokio::time::timeout(timeout, fut).await?;
        Ok(())
    }

    /// Stops every local subsystem and waits for the background tasks
    /// to exit.
    pub async fn shutdown(self) {
        if let Err(error) = self.stop_crawl() {
            debug!(error = %error, "Crawl was already partially stopped before shutdown.");
        }

        self.0.distributor.wait().await;
        self.0.reporter.wait().await;

        let crawl_task = self.0.crawl_task.lock().take();
        if let Some(handle) = crawl_task {
            let _ = handle.await;
        }

        if let Some(server) = self.0.rpc_server.lock().take() {
            server.shutdown();
        }

        info!(self_node_id = %self.0.me.id, "Node has shut down.");
    }
}
