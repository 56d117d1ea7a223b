//! # p3k-client
//!
//! Client for Kramer matrix switchers speaking Protocol 3000.
//!
//! ## Features
//!
//! - **Transports**: TCP with automatic reconnect, or connectionless UDP
//! - **Connection Manager**: state machine with error suppression and stale
//!   event filtering
//! - **Capability Detection**: input, output and preset counts reported by
//!   the device
//! - **Actions**: fixed and placeholder-based routing, level and mute commands
//!
//! ## Example
//!
//! ```no_run
//! use p3k_client::{Action, ClientConfig, ConnectionProtocol, MatrixClient, TracingSink};
//! use std::time::Duration;
//!
//! # async fn run() -> p3k_client::ClientResult<()> {
//! let mut client = MatrixClient::with_sink("lobby", TracingSink::new("lobby"));
//! client.configure(ClientConfig::new("192.168.1.39", ConnectionProtocol::Tcp));
//! client.wait_connected(Duration::from_secs(5)).await?;
//! client.dispatch(Action::SwitchVideo { input: 3 });
//! # Ok(())
//! # }
//! ```

mod actions;
mod capabilities;
mod client;
mod config;
mod error;
mod manager;
mod status;
mod tcp;
pub mod telemetry;
mod transport;
mod udp;

pub use actions::{Action, NoVariables, VariableMap, VariableResolver, PLACEHOLDER_START};
pub use capabilities::{Capabilities, Detection};
pub use client::MatrixClient;
pub use config::{ClientConfig, ConnectionProtocol};
pub use error::{ClientError, ClientResult, ConfigError, ParameterError, TransportError};
pub use manager::{ConnectOutcome, ConnectSignal, ConnectionManager, ConnectionState};
pub use status::{ModuleStatus, StatusSink, TracingSink};
pub use tcp::TcpTransport;
pub use transport::{
    EventSink, NetworkTransportFactory, Transport, TransportEvent, TransportFactory, TransportId,
    TransportMessage, RECONNECT_INTERVAL,
};
pub use udp::UdpTransport;
