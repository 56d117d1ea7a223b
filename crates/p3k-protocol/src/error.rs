//! Error types for Protocol 3000.

use thiserror::Error;

/// Errors that can occur when working with Protocol 3000 data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The line does not follow the `~<address>@<COMMAND> <params>` framing.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// A recognized response carried parameters that could not be parsed.
    #[error("invalid {command} parameters: {params}")]
    InvalidParameters {
        /// The response command name.
        command: String,
        /// The raw parameter text.
        params: String,
    },

    /// A partial line grew past the maximum line length.
    #[error("buffer overflow: max {max} bytes, got {actual}")]
    BufferOverflow { max: usize, actual: usize },
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
