//! Configuration types for the mox-transport crate

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::error::{Result, TransportError};

/// Controller address used when the house record does not name one
pub const DEFAULT_SERVER_ADDRESS: &str = "172.16.254.254";

/// Controller port used when the house record does not name one
pub const DEFAULT_SERVER_PORT: u16 = 6670;

/// Local port the controller replies to by default
pub const DEFAULT_CLIENT_PORT: u16 = 6666;

/// Configuration for a DeviceTransport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Local IP address to bind, all interfaces when unset
    /// Default: None
    pub local_address: Option<String>,

    /// Local UDP port; 0 asks the OS for an ephemeral port
    /// Default: 6666
    pub local_port: u16,

    /// Controller IP address
    /// Default: 172.16.254.254
    pub server_address: String,

    /// Controller UDP port
    /// Default: 6670
    pub server_port: u16,

    /// Size of the datagram receive buffer
    /// Default: 2048
    pub receive_buffer_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            local_address: None,
            local_port: DEFAULT_CLIENT_PORT,
            server_address: DEFAULT_SERVER_ADDRESS.to_string(),
            server_port: DEFAULT_SERVER_PORT,
            receive_buffer_size: 2048,
        }
    }
}

impl TransportConfig {
    /// Create a new TransportConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Loopback configuration on an ephemeral local port, talking to a
    /// controller on this host
    pub fn loopback(server_port: u16) -> Self {
        Self {
            local_address: Some(Ipv4Addr::LOCALHOST.to_string()),
            local_port: 0,
            server_address: Ipv4Addr::LOCALHOST.to_string(),
            server_port,
            ..Default::default()
        }
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.server_port == 0 {
            return Err(TransportError::Configuration(
                "Server port must be greater than 0".to_string(),
            ));
        }

        if self.receive_buffer_size == 0 {
            return Err(TransportError::Configuration(
                "Receive buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// The local endpoint to bind
    pub fn local_socket_address(&self) -> Result<SocketAddr> {
        let ip = match self.local_address.as_deref().map(str::trim) {
            None | Some("") => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            Some(address) => parse_ip(address, self.local_port)?,
        };
        Ok(SocketAddr::new(ip, self.local_port))
    }

    /// The controller endpoint frames are sent to
    pub fn server_socket_address(&self) -> Result<SocketAddr> {
        let ip = parse_ip(self.server_address.trim(), self.server_port)?;
        Ok(SocketAddr::new(ip, self.server_port))
    }

    /// Builder pattern methods for fluent configuration

    pub fn with_local_address(mut self, address: impl Into<String>) -> Self {
        self.local_address = Some(address.into());
        self
    }

    pub fn with_local_port(mut self, port: u16) -> Self {
        self.local_port = port;
        self
    }

    pub fn with_server(mut self, address: impl Into<String>, port: u16) -> Self {
        self.server_address = address.into();
        self.server_port = port;
        self
    }

    pub fn with_receive_buffer_size(mut self, size: usize) -> Self {
        self.receive_buffer_size = size;
        self
    }
}

fn parse_ip(address: &str, port: u16) -> Result<IpAddr> {
    address.parse().map_err(|e| TransportError::Bind {
        address: format!("{address}:{port}"),
        reason: format!("invalid IP address: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TransportConfig::default();
        assert_eq!(config.local_port, 6666);
        assert_eq!(config.server_port, 6670);
        assert_eq!(
            config.server_socket_address().unwrap(),
            "172.16.254.254:6670".parse().unwrap()
        );
        assert_eq!(
            config.local_socket_address().unwrap(),
            "0.0.0.0:6666".parse().unwrap()
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blank_local_address_binds_all_interfaces() {
        let config = TransportConfig::new().with_local_address("");
        assert_eq!(
            config.local_socket_address().unwrap().ip(),
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        );
    }

    #[test]
    fn test_invalid_addresses_are_bind_errors() {
        let config = TransportConfig::new().with_server("not-an-ip", 6670);
        assert!(matches!(
            config.server_socket_address(),
            Err(TransportError::Bind { .. })
        ));

        let config = TransportConfig::new().with_local_address("300.1.1.1");
        assert!(matches!(
            config.local_socket_address(),
            Err(TransportError::Bind { .. })
        ));
    }

    #[test]
    fn test_config_validation() {
        let invalid = TransportConfig {
            server_port: 0,
            ..Default::default()
        };
        assert!(invalid.validate().is_err());

        let invalid = TransportConfig::new().with_receive_buffer_size(0);
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_builder_pattern() {
        let config = TransportConfig::new()
            .with_local_address("127.0.0.1")
            .with_local_port(0)
            .with_server("10.0.0.2", 7000)
            .with_receive_buffer_size(512);

        assert_eq!(config.local_socket_address().unwrap(), "127.0.0.1:0".parse().unwrap());
        assert_eq!(config.server_socket_address().unwrap(), "10.0.0.2:7000".parse().unwrap());
        assert_eq!(config.receive_buffer_size, 512);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_loopback_preset() {
        let config = TransportConfig::loopback(40000);
        assert_eq!(config.local_socket_address().unwrap(), "127.0.0.1:0".parse().unwrap());
        assert_eq!(config.server_socket_address().unwrap(), "127.0.0.1:40000".parse().unwrap());
    }
}
