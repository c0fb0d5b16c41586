//! API gateway HTTP listen address.
//!
//! The node's own `NodeConfig::http_api_port` (spec.md §6) decides whether
//! this gateway runs at all and which port it binds; this type just holds
//! the resolved bind address.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Configuration for the API gateway HTTP server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub listen_addr: SocketAddr,
}

impl ApiConfig {
    /// Binds on all interfaces at `port` so a container's port mapping is
    /// reachable from the host.
    pub fn on_port(port: u16) -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::on_port(8081)
    }
}
