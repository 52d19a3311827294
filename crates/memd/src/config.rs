//! Server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Listen on all IPv4 interfaces unless told otherwise
pub const DEFAULT_BIND_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Time given to in-flight replies before connections are force-closed
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

/// Runtime settings for the membership daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface the control listener binds to
    pub bind_addr: IpAddr,

    /// Control channel TCP port (0 picks an ephemeral port)
    pub port: u16,

    /// Grace period between stopping the listener and closing connections
    pub shutdown_grace: Duration,
}

impl ServerConfig {
    /// Creates a configuration for `port` with default settings.
    pub fn new(port: u16) -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR,
            port,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    #[must_use]
    pub fn with_bind_addr(mut self, bind_addr: IpAddr) -> Self {
        self.bind_addr = bind_addr;
        self
    }

    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Socket address for the control listener.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::new(4000);
        assert_eq!(config.listen_addr(), "0.0.0.0:4000".parse().unwrap());
        assert_eq!(config.shutdown_grace, Duration::from_millis(200));
    }

    #[test]
    fn test_builders() {
        let config = ServerConfig::new(0)
            .with_bind_addr(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .with_shutdown_grace(Duration::from_millis(5));
        assert_eq!(config.listen_addr().to_string(), "127.0.0.1:0");
        assert_eq!(config.shutdown_grace, Duration::from_millis(5));
    }
}
