use std::collections::HashMap;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use datacake_rpc::Channel;
use parking_lot::RwLock;
use tracing::trace;

use crate::error::NodeError;

#[derive(Clone, Default)]
/// A collection of RPC client connections which can be reused and multiplexed.
pub struct RpcNetwork {
    clients: Arc<RwLock<HashMap<SocketAddr, Channel>>>,
}

impl RpcNetwork {
    /// Attempts to get an already existing connection or creates a new connection.
    pub fn get_or_connect(&self, addr: SocketAddr) -> Channel {
        {
            let guard = self.clients.read();
            if let Some(channel) = guard.get(&addr) {
                return channel.clone();
            }
        }

        trace!(addr = %addr, "Connect client to network.");
        self.connect(addr)
    }

    /// Resolves a `address:port` peer and gets a connection to it.
    pub fn get_or_connect_peer(&self, peer: &str) -> Result<Channel, NodeError> {
        let addr = resolve_peer(peer)?;
        Ok(self.get_or_connect(addr))
    }

    /// Connects to a given address and adds it to the clients.
    pub fn connect(&self, addr: SocketAddr) -> Channel {
        let channel = Channel::connect(addr);

        {
            let mut guard = self.clients.write();
            guard.insert(addr, channel.clone());
        }

        channel
    }

    /// Removes a client from the network.
    pub fn disconnect(&self, addr: SocketAddr) {
        let mut guard = self.clients.write();
        guard.remove(&addr);
    }
}

fn resolve_peer(peer: &str) -> Result<SocketAddr, NodeError> {
    if let Ok(addr) = peer.parse::<SocketAddr>() {
        return Ok(addr);
    }

    peer.to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| NodeError::InvalidAddress(peer.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_peer() {
        let addr = resolve_peer("127.0.0.1:8000").expect("Resolve ip peer");
        assert_eq!(addr, SocketAddr::from(([127, 0, 0, 1], 8000)));

        assert!(matches!(
            resolve_peer("no-port-here"),
            Err(NodeError::InvalidAddress(_))
        ));
    }
}
