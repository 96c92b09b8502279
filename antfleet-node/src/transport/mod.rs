mod local;

use async_trait::async_trait;
pub use local::LocalTransport;
use rkyv::{Archive, Deserialize, Serialize};

use crate::error::NodeError;
use crate::identity::NodeIdentity;
use crate::request::{CrawlRequest, ScrapeResult, StartSpiderResult};

#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Archive)]
#[archive(check_bytes)]
/// The answer of a peer to a join request.
pub struct JoinResponse {
    /// If the peer belongs to an established cluster.
    pub accepted: bool,
    /// The master known by the peer.
    pub master: Option<NodeIdentity>,
    /// Every member known by the peer.
    pub members: Vec<NodeIdentity>,
    /// The spider running on the peer, the joining node activates it too.
    pub spider: Option<String>,
}

#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Archive)]
#[archive(check_bytes)]
/// Sent by the master to every member after the membership has changed.
pub struct MembershipNotice {
    pub master: NodeIdentity,
    pub members: Vec<NodeIdentity>,
    /// The spider running on the master.
    pub spider: Option<String>,
}

#[async_trait]
/// The client side of the fleet protocol.
///
/// Peers are addressed with `address:port` strings.
pub trait ClusterTransport: Send + Sync + 'static {
    /// Asks the peer to let the caller into its cluster.
    async fn join(
        &self,
        peer: &str,
        caller: &NodeIdentity,
    ) -> Result<JoinResponse, NodeError>;

    /// Tells the peer about the current master and members.
    async fn announce_membership(
        &self,
        peer: &str,
        notice: &MembershipNotice,
    ) -> Result<(), NodeError>;

    /// Hands new work to the master to be tracked and routed.
    async fn distribute(&self, peer: &str, request: &CrawlRequest)
        -> Result<(), NodeError>;

    /// Hands a routed request to its owning node for crawling.
    async fn accept_request(
        &self,
        peer: &str,
        request: &CrawlRequest,
    ) -> Result<(), NodeError>;

    /// Reports a crawl result to the master.
    async fn report_result(
        &self,
        peer: &str,
        result: &ScrapeResult,
    ) -> Result<(), NodeError>;

    /// Activates the named spider on the peer.
    async fn start_spider(
        &self,
        peer: &str,
        name: &str,
    ) -> Result<StartSpiderResult, NodeError>;

    /// Stops all crawl work on the peer.
    async fn stop_crawl(&self, peer: &str) -> Result<(), NodeError>;
}
