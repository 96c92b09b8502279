use rkyv::{Archive, Deserialize, Serialize};

use crate::identity::NodeId;

#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Archive)]
#[archive(check_bytes)]
/// A unit of crawl work travelling through the fleet.
pub struct CrawlRequest {
    /// The node responsible for downloading the request.
    ///
    /// Empty until the request has been routed.
    pub owner_node_id: NodeId,
    /// A name unique to the request within its owner, normally the
    /// fingerprint of the URL.
    pub unique_name: String,
    /// The target of the request.
    pub url: String,
    /// Opaque data attached by the spider.
    pub payload: Vec<u8>,
}

impl CrawlRequest {
    /// Creates a new, unrouted request.
    pub fn new(unique_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            owner_node_id: NodeId::new(),
            unique_name: unique_name.into(),
            url: url.into(),
            payload: Vec::new(),
        }
    }

    /// Sets the owner of the request.
    pub fn with_owner(mut self, owner_node_id: impl Into<NodeId>) -> Self {
        self.owner_node_id = owner_node_id.into();
        self
    }

    /// Attaches opaque spider data to the request.
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    #[inline]
    pub fn is_routed(&self) -> bool {
        !self.owner_node_id.is_empty()
    }

    #[inline]
    /// The key the request is tracked under while in-flight.
    pub fn key(&self) -> RequestKey {
        RequestKey {
            owner_node_id: self.owner_node_id.clone(),
            unique_name: self.unique_name.clone(),
        }
    }
}

#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Archive)]
#[archive(check_bytes)]
/// Identifies an in-flight request across the fleet.
pub struct RequestKey {
    pub owner_node_id: NodeId,
    pub unique_name: String,
}

impl RequestKey {
    pub fn new(owner_node_id: impl Into<NodeId>, unique_name: impl Into<String>) -> Self {
        Self {
            owner_node_id: owner_node_id.into(),
            unique_name: unique_name.into(),
        }
    }
}

#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Archive)]
#[archive(check_bytes)]
/// The outcome of crawling a single request.
pub struct ScrapeResult {
    /// The request which has been crawled.
    pub request: RequestKey,
    /// Follow-up requests discovered while crawling.
    pub scraped_requests: Vec<Option<CrawlRequest>>,
}

impl ScrapeResult {
    pub fn new(request: RequestKey, scraped_requests: Vec<Option<CrawlRequest>>) -> Self {
        Self {
            request,
            scraped_requests,
        }
    }

    /// A result with no follow-up work.
    pub fn leaf(request: RequestKey) -> Self {
        Self::new(request, Vec::new())
    }
}

#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Archive)]
#[archive(check_bytes)]
/// The outcome of starting a spider.
pub struct StartSpiderResult {
    pub success: bool,
    pub detail: String,
}

impl StartSpiderResult {
    pub fn started(detail: impl Into<String>) -> Self {
        Self {
            success: true,
            detail: detail.into(),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: detail.into(),
        }
    }
}
