//! Error types for the matrix client.

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Errors raised by a transport while connecting or moving data.
///
/// The I/O source is shared so the same error can be reported to the status
/// sink and delivered to whoever is waiting on the connection.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Could not establish the connection.
    #[error("connect to {addr} failed: {source}")]
    Connect {
        /// Target address.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// Could not open the local socket.
    #[error("cannot open socket for {addr}: {source}")]
    Bind {
        /// Target address.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// Read or write failure on an open socket.
    #[error("I/O error: {0}")]
    Io(#[source] Arc<io::Error>),

    /// The peer closed the connection.
    #[error("connection closed by peer")]
    Closed,
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        TransportError::Io(Arc::new(e))
    }
}

/// A dynamic action parameter that did not resolve to a number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    /// The resolved text is not a non-negative integer.
    #[error("cannot parse '{value}' in '{action}.{option}' as a number")]
    NotANumber {
        /// Action name, e.g. `switch_video_dynamic`.
        action: &'static str,
        /// Option name, e.g. `input`.
        option: &'static str,
        /// The text after placeholder resolution.
        value: String,
    },
}

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading a config file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The config file is not valid YAML for this schema.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The configured host is not an IP address.
    #[error("invalid host '{0}': expected an IP address")]
    InvalidHost(String),
}

/// Errors surfaced to the host through fallible client calls.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration problem.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The connection attempt failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// No host is configured, so there is nothing to wait for.
    #[error("no host configured")]
    NotConfigured,

    /// The connection attempt was abandoned by a reconfiguration or teardown.
    #[error("connection attempt superseded")]
    Superseded,

    /// The connection was not established in time.
    #[error("timed out waiting for connection")]
    Timeout,
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
