use std::fmt::Debug;
use std::io;

use datacake_rpc::Status;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("{0}")]
    /// An IO error has occurred,
    IO(#[from] io::Error),

    #[error("RPC failure: {0}")]
    /// The remote node answered the RPC with an error status or
    /// the RPC channel failed mid-request.
    Rpc(#[from] Status),

    #[error("Peer {0} could not be reached")]
    /// The peer is not part of the transport or refused the connection.
    Unreachable(String),

    #[error("Invalid peer address: {0}")]
    /// A peer address is not in the `address:port` form.
    InvalidAddress(String),

    #[error("The cluster has no master node")]
    /// The operation must be routed through the master but none is known yet.
    NoMaster,

    #[error("The {0} is not running")]
    /// A subsystem was asked to stop while it was already stopped.
    NotRunning(&'static str),

    #[error("Crawl engine failure: {0}")]
    Engine(anyhow::Error),
}
