//! Client configuration.
//!
//! The configuration is deliberately small: which device to talk to and over
//! which transport. It can be built in code or loaded from a YAML file:
//!
//! ```yaml
//! host: 192.168.1.39
//! connection_protocol: UDP
//! ```

use std::fmt;
use std::net::IpAddr;
use std::path::Path;

use p3k_protocol::{TCP_PORT, UDP_PORT};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which transport to use to reach the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectionProtocol {
    /// Connection-oriented stream on port 5000, with automatic reconnect.
    #[default]
    Tcp,
    /// Connectionless datagrams on port 50000.
    Udp,
}

impl ConnectionProtocol {
    /// The device port for this protocol.
    pub fn default_port(&self) -> u16 {
        match self {
            ConnectionProtocol::Tcp => TCP_PORT,
            ConnectionProtocol::Udp => UDP_PORT,
        }
    }

    /// Whether the transport has a handshake that must complete before it
    /// can be used.
    pub fn has_handshake(&self) -> bool {
        matches!(self, ConnectionProtocol::Tcp)
    }

    /// Parse a protocol name (case-insensitive).
    pub fn from_str(s: &str) -> Option<ConnectionProtocol> {
        match s.to_ascii_uppercase().as_str() {
            "TCP" => Some(ConnectionProtocol::Tcp),
            "UDP" => Some(ConnectionProtocol::Udp),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionProtocol::Tcp => f.write_str("TCP"),
            ConnectionProtocol::Udp => f.write_str("UDP"),
        }
    }
}

/// Configuration for one matrix connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Target device address. Empty or absent means "not configured yet".
    #[serde(default)]
    pub host: Option<String>,
    /// Transport to use; TCP when absent.
    #[serde(default, alias = "connectionProtocol")]
    pub connection_protocol: ConnectionProtocol,
}

impl ClientConfig {
    /// Create a config for the given host and protocol.
    pub fn new(host: impl Into<String>, connection_protocol: ConnectionProtocol) -> Self {
        ClientConfig {
            host: Some(host.into()),
            connection_protocol,
        }
    }

    /// The configured host, if it is non-empty.
    pub fn host(&self) -> Option<&str> {
        self.host
            .as_deref()
            .map(str::trim)
            .filter(|host| !host.is_empty())
    }

    /// Check that the host, when set, is an IP address.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(host) = self.host() {
            if host.parse::<IpAddr>().is_err() {
                return Err(ConfigError::InvalidHost(host.to_string()));
            }
        }
        Ok(())
    }

    /// Parse a config from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a config from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }
}
