pub(crate) mod client;
pub(crate) mod network;
pub(crate) mod services;
mod transport;

pub use transport::RpcTransport;
