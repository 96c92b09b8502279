use crate::identity::{NodeId, NodeIdentity};
use crate::request::CrawlRequest;

/// Decides which member of the fleet owns a request.
pub trait RequestRouter: Send + Sync + 'static {
    /// Selects the owning node for the request out of the known members.
    ///
    /// Returns `None` if there are no members to route to.
    fn route(&self, request: &CrawlRequest, members: &[NodeIdentity]) -> Option<NodeId>;
}

#[derive(Debug, Default, Copy, Clone)]
/// Routes requests by hashing their unique name over the members sorted by id.
///
/// Every node with the same member set routes a request to the same owner.
pub struct HashRouter;

impl RequestRouter for HashRouter {
    fn route(&self, request: &CrawlRequest, members: &[NodeIdentity]) -> Option<NodeId> {
        if members.is_empty() {
            return None;
        }

        let mut ids = members.iter().map(|member| &member.id).collect::<Vec<_>>();
        ids.sort();

        let slot = crc32fast::hash(request.unique_name.as_bytes()) as usize % ids.len();
        Some(ids[slot].clone())
    }
}
