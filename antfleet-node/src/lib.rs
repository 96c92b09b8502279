mod coordinator;
mod crawler;
mod distributor;
mod engine;
mod error;
mod identity;
mod join;
mod membership;
mod node;
mod reporter;
mod request;
mod router;
mod rpc;
mod service;
mod statistics;
mod transport;

use std::net::SocketAddr;
use std::sync::Arc;

pub use coordinator::{CrawlCoordinator, RequestQueue};
pub use crawler::{Crawler, Spider};
use datacake_rpc::Server;
pub use distributor::Distributor;
pub use engine::CrawlEngine;
pub use error::NodeError;
pub use identity::{NodeId, NodeIdentity};
pub use join::JoinProtocol;
pub use membership::{ClusterMembership, ClusterStatus};
pub use node::FleetNode;
pub use reporter::Reporter;
pub use request::{CrawlRequest, RequestKey, ScrapeResult, StartSpiderResult};
pub use router::{HashRouter, RequestRouter};
pub use rpc::network::RpcNetwork;
pub use rpc::RpcTransport;
pub use statistics::FleetStatistics;
use tracing::info;
pub use transport::{ClusterTransport, JoinResponse, LocalTransport, MembershipNotice};

use crate::rpc::services::fleet_impl::FleetService;

/// Build a fleet node using provided settings.
pub struct FleetNodeBuilder {
    connection_cfg: ConnectionConfig,
    engine: Arc<dyn CrawlEngine>,
    router: Arc<dyn RequestRouter>,
}

impl FleetNodeBuilder {
    /// Create a new node builder.
    pub fn new(connection_cfg: ConnectionConfig, engine: impl CrawlEngine) -> Self {
        Self {
            connection_cfg,
            engine: Arc::new(engine),
            router: Arc::new(HashRouter),
        }
    }

    /// Set the router deciding which member owns each request.
    pub fn with_router(mut self, router: impl RequestRouter) -> Self {
        self.router = Arc::new(router);
        self
    }

    /// Starts the RPC server and joins the fleet through the seed nodes.
    ///
    /// The node's id is derived from its public address, so every node
    /// **must** advertise a unique public address.
    ///
    /// No seed nodes need to be live at the time of connecting, if none of
    /// them belongs to a cluster the node elects itself master.
    pub async fn connect(self) -> Result<FleetNode, NodeError> {
        let me = NodeIdentity::from_addr(self.connection_cfg.public_addr);
        let network = RpcNetwork::default();

        let rpc_server = Server::listen(self.connection_cfg.listen_addr).await?;
        let transport = RpcTransport::new(me.id.clone(), network);

        let node = FleetNode::with_router(
            me,
            self.connection_cfg.seed_nodes,
            self.engine,
            Arc::new(transport),
            self.router,
        );
        rpc_server.add_service(FleetService::new(node.clone()));
        node.attach_rpc_server(rpc_server);

        let cluster_exists = node.join_node().await;

        info!(
            self_node_id = %node.me().id,
            listen_addr = %self.connection_cfg.listen_addr,
            is_master = node.is_master_node(),
            cluster_exists = cluster_exists,
            "Fleet node connected."
        );

        Ok(node)
    }

    /// Joins the fleet over an in-process transport.
    ///
    /// The node is registered with the transport before joining so peers
    /// can reach it while the join is still in progress.
    pub async fn connect_local(self, transport: LocalTransport) -> FleetNode {
        let me = NodeIdentity::from_addr(self.connection_cfg.public_addr);
        let node = FleetNode::with_router(
            me,
            self.connection_cfg.seed_nodes,
            self.engine,
            Arc::new(transport.clone()),
            self.router,
        );
        transport.register(&node);

        node.join_node().await;
        node
    }
}

#[derive(Debug, Clone)]
/// Configuration for the fleet network.
pub struct ConnectionConfig {
    /// The binding address for the RPC server to bind and listen on.
    ///
    /// This is often `0.0.0.0` + your chosen port.
    pub listen_addr: SocketAddr,

    /// The public address to be broadcast to other fleet members.
    ///
    /// This also determines the node's id.
    pub public_addr: SocketAddr,

    /// A set of `address:port` seed nodes which the node will attempt to
    /// join through.
    ///
    /// The node's own address may be part of the list, it is skipped.
    pub seed_nodes: Vec<String>,
}

impl ConnectionConfig {
    /// Creates a new connection config.
    pub fn new(
        listen_addr: SocketAddr,
        public_addr: SocketAddr,
        seeds: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Self {
        Self {
            listen_addr,
            public_addr,
            seed_nodes: seeds
                .into_iter()
                .map(|seed| seed.as_ref().to_string())
                .collect(),
        }
    }
}
