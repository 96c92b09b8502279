//! # antfleet
//! Coordination tooling for running a crawler across a fleet of nodes.
//!
//! This is a convenience package re-exporting the sub-projects:
//!
//! ### Features
//! - `antfleet_node` - Membership, master election, request routing and termination detection.
//! - `datacake_rpc` - The RPC framework the nodes talk to each other over.

#[cfg(feature = "antfleet-node")]
pub use antfleet_node as node;
#[cfg(feature = "datacake-rpc")]
pub use datacake_rpc as rpc;
