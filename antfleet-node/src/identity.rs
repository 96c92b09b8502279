use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;

use rkyv::{Archive, Deserialize, Serialize};

use crate::error::NodeError;

/// The unique ID of a node within the fleet.
pub type NodeId = String;

#[repr(C)]
#[derive(Clone, Debug, Serialize, Deserialize, Archive)]
#[archive(check_bytes)]
/// The identity of a single fleet member.
///
/// The `id` is derived from the address and port of the node, so two
/// processes bound to the same public address always agree on it.
/// Equality, ordering and hashing only consider the `id`.
pub struct NodeIdentity {
    /// A unique ID for the given node in the cluster.
    pub id: NodeId,
    /// The public address of the node, without the port.
    pub address: String,
    /// The port the node's RPC server is reachable on.
    pub port: u16,
}

impl NodeIdentity {
    /// Creates a new identity for the node reachable at `address:port`.
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        let address = address.into();
        let id = derive_node_id(&address, port);
        Self { id, address, port }
    }

    /// Creates the identity of a node from its public socket address.
    pub fn from_addr(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }

    #[inline]
    /// The `address:port` string peers use to contact this node.
    pub fn peer_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Returns if the identity points at the given `address` and `port`.
    pub fn is_located_at(&self, address: &str, port: u16) -> bool {
        self.address == address && self.port == port
    }
}

impl PartialEq for NodeIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NodeIdentity {}

impl PartialOrd for NodeIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for NodeIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl Display for NodeIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}:{}", self.id, self.address, self.port)
    }
}

fn derive_node_id(address: &str, port: u16) -> NodeId {
    let key = format!("{address}:{port}");
    crc32fast::hash(key.as_bytes()).to_string()
}

/// Splits a `address:port` peer string into its parts.
pub(crate) fn parse_peer_addr(peer: &str) -> Result<(&str, u16), NodeError> {
    let (address, port) = peer
        .trim()
        .rsplit_once(':')
        .ok_or_else(|| NodeError::InvalidAddress(peer.to_string()))?;

    let port = port
        .parse::<u16>()
        .map_err(|_| NodeError::InvalidAddress(peer.to_string()))?;

    if address.is_empty() {
        return Err(NodeError::InvalidAddress(peer.to_string()));
    }

    Ok((address, port))
}
