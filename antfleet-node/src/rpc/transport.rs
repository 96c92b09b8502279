use async_trait::async_trait;

use super::client::FleetClient;
use super::network::RpcNetwork;
use crate::error::NodeError;
use crate::identity::{NodeId, NodeIdentity};
use crate::request::{CrawlRequest, ScrapeResult, StartSpiderResult};
use crate::transport::{ClusterTransport, JoinResponse, MembershipNotice};

#[derive(Clone)]
/// A transport sending the fleet protocol over datacake RPC.
pub struct RpcTransport {
    self_node_id: NodeId,
    network: RpcNetwork,
}

impl RpcTransport {
    pub fn new(self_node_id: NodeId, network: RpcNetwork) -> Self {
        Self {
            self_node_id,
            network,
        }
    }

    #[inline]
    /// Get access to the underlying connection pool.
    pub fn network(&self) -> &RpcNetwork {
        &self.network
    }

    fn client(&self, peer: &str) -> Result<FleetClient, NodeError> {
        let channel = self.network.get_or_connect_peer(peer)?;
        Ok(FleetClient::new(channel))
    }
}

#[async_trait]
impl ClusterTransport for RpcTransport {
    async fn join(
        &self,
        peer: &str,
        caller: &NodeIdentity,
    ) -> Result<JoinResponse, NodeError> {
        let response = self.client(peer)?.join(caller).await?;
        Ok(response)
    }

    async fn announce_membership(
        &self,
        peer: &str,
        notice: &MembershipNotice,
    ) -> Result<(), NodeError> {
        self.client(peer)?.announce_membership(notice).await?;
        Ok(())
    }

    async fn distribute(
        &self,
        peer: &str,
        request: &CrawlRequest,
    ) -> Result<(), NodeError> {
        self.client(peer)?.distribute(request).await?;
        Ok(())
    }

    async fn accept_request(
        &self,
        peer: &str,
        request: &CrawlRequest,
    ) -> Result<(), NodeError> {
        self.client(peer)?.accept_request(request).await?;
        Ok(())
    }

    async fn report_result(
        &self,
        peer: &str,
        result: &ScrapeResult,
    ) -> Result<(), NodeError> {
        self.client(peer)?.report_result(result).await?;
        Ok(())
    }

    async fn start_spider(
        &self,
        peer: &str,
        name: &str,
    ) -> Result<StartSpiderResult, NodeError> {
        let result = self.client(peer)?.start_spider(name).await?;
        Ok(result)
    }

    async fn stop_crawl(&self, peer: &str) -> Result<(), NodeError> {
        self.client(peer)?.stop_crawl(&self.self_node_id).await?;
        Ok(())
    }
}
