use datacake_rpc::{Channel, RpcClient, Status};

use crate::identity::{NodeId, NodeIdentity};
use crate::request::{CrawlRequest, ScrapeResult, StartSpiderResult};
use crate::rpc::services::fleet_impl::{
    AcceptRequest,
    DistributeRequest,
    FleetService,
    JoinRequest,
    ReportResult,
    StartSpider,
    StopCrawl,
};
use crate::transport::{JoinResponse, MembershipNotice};

/// A RPC client for talking to a remote fleet node.
pub struct FleetClient {
    inner: RpcClient<FleetService>,
}

impl FleetClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: RpcClient::new(channel),
        }
    }
}

impl FleetClient {
    /// Asks the remote node to let the caller join its cluster.
    pub async fn join(&mut self, caller: &NodeIdentity) -> Result<JoinResponse, Status> {
        self.inner
            .send(&JoinRequest {
                caller: caller.clone(),
            })
            .await?
            .to_owned()
            .map_err(Status::internal)
    }

    pub async fn announce_membership(
        &mut self,
        notice: &MembershipNotice,
    ) -> Result<(), Status> {
        self.inner.send(notice).await?;
        Ok(())
    }

    pub async fn distribute(&mut self, request: &CrawlRequest) -> Result<(), Status> {
        self.inner
            .send(&DistributeRequest {
                request: request.clone(),
            })
            .await?;
        Ok(())
    }

    pub async fn accept_request(&mut self, request: &CrawlRequest) -> Result<(), Status> {
        self.inner
            .send(&AcceptRequest {
                request: request.clone(),
            })
            .await?;
        Ok(())
    }

    pub async fn report_result(&mut self, result: &ScrapeResult) -> Result<(), Status> {
        self.inner
            .send(&ReportResult {
                result: result.clone(),
            })
            .await?;
        Ok(())
    }

    /// Activates the named spider on the remote node.
    pub async fn start_spider(&mut self, name: &str) -> Result<StartSpiderResult, Status> {
        self.inner
            .send(&StartSpider {
                name: name.to_string(),
            })
            .await?
            .to_owned()
            .map_err(Status::internal)
    }

    pub async fn stop_crawl(&mut self, requested_by: &NodeId) -> Result<(), Status> {
        self.inner
            .send(&StopCrawl {
                requested_by: requested_by.clone(),
            })
            .await?;
        Ok(())
    }
}
