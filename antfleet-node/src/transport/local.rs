use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::trace;

use super::{ClusterTransport, JoinResponse, MembershipNotice};
use crate::error::NodeError;
use crate::identity::NodeIdentity;
use crate::request::{CrawlRequest, ScrapeResult, StartSpiderResult};
use crate::FleetNode;

#[derive(Clone, Default)]
/// An in-process transport delivering messages straight into the
/// handlers of nodes living in the same process.
///
/// Peers which have not been registered are unreachable.
pub struct LocalTransport {
    nodes: Arc<RwLock<HashMap<String, FleetNode>>>,
}

impl LocalTransport {
    /// Makes the node reachable under its peer address.
    pub fn register(&self, node: &FleetNode) {
        let peer = node.me().peer_addr();
        trace!(peer = %peer, "Registering node with local transport.");
        self.nodes.write().insert(peer, node.clone());
    }

    /// Makes the peer unreachable.
    pub fn disconnect(&self, peer: &str) {
        self.nodes.write().remove(peer);
    }

    fn get(&self, peer: &str) -> Result<FleetNode, NodeError> {
        self.nodes
            .read()
            .get(peer)
            .cloned()
            .ok_or_else(|| NodeError::Unreachable(peer.to_string()))
    }
}

#[async_trait]
impl ClusterTransport for LocalTransport {
    async fn join(
        &self,
        peer: &str,
        caller: &NodeIdentity,
    ) -> Result<JoinResponse, NodeError> {
        let node = self.get(peer)?;
        Ok(node.handle_join(caller.clone()).await)
    }

    async fn announce_membership(
        &self,
        peer: &str,
        notice: &MembershipNotice,
    ) -> Result<(), NodeError> {
        let node = self.get(peer)?;
        node.handle_membership_notice(notice.clone());
        Ok(())
    }

    async fn distribute(
        &self,
        peer: &str,
        request: &CrawlRequest,
    ) -> Result<(), NodeError> {
        let node = self.get(peer)?;
        node.distribute_request(request.clone()).await
    }

    async fn accept_request(
        &self,
        peer: &str,
        request: &CrawlRequest,
    ) -> Result<(), NodeError> {
        let node = self.get(peer)?;
        node.accept_request(request.clone());
        Ok(())
    }

    async fn report_result(
        &self,
        peer: &str,
        result: &ScrapeResult,
    ) -> Result<(), NodeError> {
        let node = self.get(peer)?;
        node.report_to_master(result.clone()).await
    }

    async fn start_spider(
        &self,
        peer: &str,
        name: &str,
    ) -> Result<StartSpiderResult, NodeError> {
        let node = self.get(peer)?;
        Ok(node.activate_spider(name))
    }

    async fn stop_crawl(&self, peer: &str) -> Result<(), NodeError> {
        let node = self.get(peer)?;
        node.stop_crawl()
    }
}
