pub mod network;
pub mod transport;

pub use network::SsidSource;
pub use transport::{ProbeRequest, Transport};
