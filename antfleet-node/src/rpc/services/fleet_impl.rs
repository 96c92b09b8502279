use datacake_rpc::{Handler, Request, RpcService, ServiceRegistry, Status};
use rkyv::{Archive, Deserialize, Serialize};
use tracing::debug;

use crate::identity::{NodeId, NodeIdentity};
use crate::request::{CrawlRequest, ScrapeResult, StartSpiderResult};
use crate::transport::{JoinResponse, MembershipNotice};
use crate::FleetNode;

/// The RPC surface every fleet node exposes to its peers.
pub struct FleetService {
    node: FleetNode,
}

impl FleetService {
    pub fn new(node: FleetNode) -> Self {
        Self { node }
    }
}

impl RpcService for FleetService {
    fn register_handlers(registry: &mut ServiceRegistry<Self>) {
        registry.add_handler::<JoinRequest>();
        registry.add_handler::<MembershipNotice>();
        registry.add_handler::<DistributeRequest>();
        registry.add_handler::<AcceptRequest>();
        registry.add_handler::<ReportResult>();
        registry.add_handler::<StartSpider>();
        registry.add_handler::<StopCrawl>();
    }
}

#[datacake_rpc::async_trait]
impl Handler<JoinRequest> for FleetService {
    type Reply = JoinResponse;

    async fn on_message(&self, msg: Request<JoinRequest>) -> Result<Self::Reply, Status> {
        let msg = msg
            .into_inner()
            .to_owned()
            .map_err(Status::internal)?;

        Ok(self.node.handle_join(msg.caller).await)
    }
}

#[datacake_rpc::async_trait]
impl Handler<MembershipNotice> for FleetService {
    type Reply = ();

    async fn on_message(
        &self,
        msg: Request<MembershipNotice>,
    ) -> Result<Self::Reply, Status> {
        let notice = msg
            .into_inner()
            .to_owned()
            .map_err(Status::internal)?;

        self.node.handle_membership_notice(notice);
        Ok(())
    }
}

#[datacake_rpc::async_trait]
impl Handler<DistributeRequest> for FleetService {
    type Reply = ();

    async fn on_message(
        &self,
        msg: Request<DistributeRequest>,
    ) -> Result<Self::Reply, Status> {
        let msg = msg
            .into_inner()
            .to_owned()
            .map_err(Status::internal)?;

        self.node
            .distribute_request(msg.request)
            .await
            .map_err(|e| Status::internal(e.to_string()))
    }
}

#[datacake_rpc::async_trait]
impl Handler<AcceptRequest> for FleetService {
    type Reply = ();

    async fn on_message(
        &self,
        msg: Request<AcceptRequest>,
    ) -> Result<Self::Reply, Status> {
        let msg = msg
            .into_inner()
            .to_owned()
            .map_err(Status::internal)?;

        self.node.accept_request(msg.request);
        Ok(())
    }
}

#[datacake_rpc::async_trait]
impl Handler<ReportResult> for FleetService {
    type Reply = ();

    async fn on_message(
        &self,
        msg: Request<ReportResult>,
    ) -> Result<Self::Reply, Status> {
        let msg = msg
            .into_inner()
            .to_owned()
            .map_err(Status::internal)?;

        self.node
            .report_to_master(msg.result)
            .await
            .map_err(|e| Status::internal(e.to_string()))
    }
}

#[datacake_rpc::async_trait]
impl Handler<StartSpider> for FleetService {
    type Reply = StartSpiderResult;

    async fn on_message(
        &self,
        msg: Request<StartSpider>,
    ) -> Result<Self::Reply, Status> {
        let msg = msg
            .into_inner()
            .to_owned()
            .map_err(Status::internal)?;

        Ok(self.node.activate_spider(&msg.name))
    }
}

#[datacake_rpc::async_trait]
impl Handler<StopCrawl> for FleetService {
    type Reply = ();

    async fn on_message(&self, msg: Request<StopCrawl>) -> Result<Self::Reply, Status> {
        let msg = msg
            .into_inner()
            .to_owned()
            .map_err(Status::internal)?;

        debug!(source_node_id = %msg.requested_by, "Received stop crawl request.");
        self.node
            .stop_crawl()
            .map_err(|e| Status::internal(e.to_string()))
    }
}

#[repr(C)]
#[derive(Serialize, Deserialize, Archive, Debug)]
#[archive(check_bytes)]
pub struct JoinRequest {
    pub caller: NodeIdentity,
}

#[repr(C)]
#[derive(Serialize, Deserialize, Archive, Debug)]
#[archive(check_bytes)]
pub struct DistributeRequest {
    pub request: CrawlRequest,
}

#[repr(C)]
#[derive(Serialize, Deserialize, Archive, Debug)]
#[archive(check_bytes)]
pub struct AcceptRequest {
    pub request: CrawlRequest,
}

#[repr(C)]
#[derive(Serialize, Deserialize, Archive, Debug)]
#[archive(check_bytes)]
pub struct ReportResult {
    pub result: ScrapeResult,
}

#[repr(C)]
#[derive(Serialize, Deserialize, Archive, Debug)]
#[archive(check_bytes)]
pub struct StartSpider {
    pub name: String,
}

#[repr(C)]
#[derive(Serialize, Deserialize, Archive, Debug)]
#[archive(check_bytes)]
pub struct StopCrawl {
    pub requested_by: NodeId,
}
