//! Status and log reporting towards the host.
//!
//! The connection manager never logs user-facing messages on its own; it hands
//! them to a [`StatusSink`] supplied at construction. [`TracingSink`] turns them
//! into `tracing` events for hosts that have no UI of their own.

use std::fmt;

use tracing::{debug, error, info, trace, warn, Level};

/// Coarse health indicator shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleStatus {
    /// Connected and usable.
    Ok,
    /// Not usable yet (e.g. still connecting).
    Warning,
    /// Failed; the transport may be retrying.
    Error,
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleStatus::Ok => write!(f, "OK"),
            ModuleStatus::Warning => write!(f, "WARNING"),
            ModuleStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Receiver of status changes and user-visible log lines.
pub trait StatusSink {
    /// Report a status change with an optional message.
    fn status(&mut self, status: ModuleStatus, message: Option<&str>);

    /// Report a log line at the given level.
    fn log(&mut self, level: Level, message: &str);
}

/// A sink that forwards everything to `tracing`.
#[derive(Debug, Clone)]
pub struct TracingSink {
    name: String,
    current: Option<ModuleStatus>,
}

impl TracingSink {
    /// Create a sink that prefixes events with `name`.
    pub fn new(name: impl Into<String>) -> Self {
        TracingSink {
            name: name.into(),
            current: None,
        }
    }

    /// The last status reported through this sink.
    pub fn current(&self) -> Option<ModuleStatus> {
        self.current
    }
}

impl StatusSink for TracingSink {
    fn status(&mut self, status: ModuleStatus, message: Option<&str>) {
        self.current = Some(status);
        let message = message.unwrap_or("");
        match status {
            ModuleStatus::Ok => info!("{}: status {} {}", self.name, status, message),
            ModuleStatus::Warning => warn!("{}: status {} {}", self.name, status, message),
            ModuleStatus::Error => error!("{}: status {} {}", self.name, status, message),
        }
    }

    fn log(&mut self, level: Level, message: &str) {
        if level == Level::ERROR {
            error!("{}: {}", self.name, message);
        } else if level == Level::WARN {
            warn!("{}: {}", self.name, message);
        } else if level == Level::INFO {
            info!("{}: {}", self.name, message);
        } else if level == Level::DEBUG {
            debug!("{}: {}", self.name, message);
        } else {
            trace!("{}: {}", self.name, message);
        }
    }
}
