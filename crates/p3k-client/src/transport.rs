//! Transport abstraction shared by the TCP and UDP variants.
//!
//! A transport owns one socket to the device. It reports what happens on that
//! socket as [`TransportEvent`]s through an [`EventSink`] instead of callbacks;
//! the connection manager drains those events on its own task, in order.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::config::ConnectionProtocol;
use crate::error::TransportError;
use crate::status::ModuleStatus;
use crate::tcp::TcpTransport;
use crate::udp::UdpTransport;

/// Fixed delay between TCP reconnection attempts.
pub const RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// Identifies one transport instance for the lifetime of a manager.
///
/// Events carry the id of the transport that produced them, so events from a
/// transport that has since been destroyed can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransportId(pub u64);

/// Something that happened on a transport.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The stream connected (TCP only).
    Connect,
    /// Connecting, reading or writing failed.
    Error(TransportError),
    /// Bytes arrived from the device.
    Data(Vec<u8>),
    /// The transport's own status changed.
    StatusChange(ModuleStatus, Option<String>),
}

/// A transport event tagged with its source.
#[derive(Debug, Clone)]
pub struct TransportMessage {
    /// The transport that produced the event.
    pub id: TransportId,
    /// The event itself.
    pub event: TransportEvent,
}

/// Sending half used by a transport to report events.
#[derive(Debug, Clone)]
pub struct EventSink {
    id: TransportId,
    sender: mpsc::UnboundedSender<TransportMessage>,
}

impl EventSink {
    /// Create a sink that tags events with `id`.
    pub fn new(id: TransportId, sender: mpsc::UnboundedSender<TransportMessage>) -> Self {
        EventSink { id, sender }
    }

    /// The id attached to every event.
    pub fn id(&self) -> TransportId {
        self.id
    }

    /// Report an event. Returns false once the receiver is gone.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.sender
            .send(TransportMessage { id: self.id, event })
            .is_ok()
    }
}

/// A connection to the device.
pub trait Transport: Send {
    /// Write bytes to the device.
    ///
    /// Returns false without writing if the transport is not currently usable.
    fn send(&self, data: &[u8]) -> bool;

    /// Whether `send` can currently deliver data.
    fn is_connected(&self) -> bool;

    /// Release the socket and any background work. Safe to call repeatedly.
    fn destroy(&mut self);
}

/// Creates transports for the connection manager.
pub trait TransportFactory {
    /// Open a transport of the given kind to `host`.
    fn open(
        &mut self,
        protocol: ConnectionProtocol,
        host: &str,
        events: EventSink,
    ) -> Result<Box<dyn Transport>, TransportError>;
}

/// Factory for real TCP and UDP sockets.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone)]
pub struct NetworkTransportFactory {
    tcp_port: u16,
    udp_port: u16,
    reconnect_interval: Duration,
}

impl Default for NetworkTransportFactory {
    fn default() -> Self {
        NetworkTransportFactory {
            tcp_port: ConnectionProtocol::Tcp.default_port(),
            udp_port: ConnectionProtocol::Udp.default_port(),
            reconnect_interval: RECONNECT_INTERVAL,
        }
    }
}

impl NetworkTransportFactory {
    /// Create a factory using the standard device ports.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the port used for one protocol.
    pub fn with_port(mut self, protocol: ConnectionProtocol, port: u16) -> Self {
        match protocol {
            ConnectionProtocol::Tcp => self.tcp_port = port,
            ConnectionProtocol::Udp => self.udp_port = port,
        }
        self
    }

    /// Set the delay between TCP reconnection attempts.
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// The port used for a protocol.
    pub fn port(&self, protocol: ConnectionProtocol) -> u16 {
        match protocol {
            ConnectionProtocol::Tcp => self.tcp_port,
            ConnectionProtocol::Udp => self.udp_port,
        }
    }
}

impl TransportFactory for NetworkTransportFactory {
    fn open(
        &mut self,
        protocol: ConnectionProtocol,
        host: &str,
        events: EventSink,
    ) -> Result<Box<dyn Transport>, TransportError> {
        let port = self.port(protocol);
        match protocol {
            ConnectionProtocol::Tcp => Ok(Box::new(TcpTransport::connect(
                host,
                port,
                self.reconnect_interval,
                events,
            ))),
            ConnectionProtocol::Udp => Ok(Box::new(UdpTransport::open(host, port, events)?)),
        }
    }
}

/// Format `host:port`, bracketing IPv6 literals.
pub(crate) fn socket_addr(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_sink_tags_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(TransportId(7), tx);
        assert!(sink.emit(TransportEvent::Connect));

        let message = rx.try_recv().unwrap();
        assert_eq!(message.id, TransportId(7));
        assert!(matches!(message.event, TransportEvent::Connect));

        drop(rx);
        assert!(!sink.emit(TransportEvent::Data(vec![1])));
    }

    #[test]
    fn test_factory_ports() {
        let factory = NetworkTransportFactory::new().with_port(ConnectionProtocol::Udp, 6000);
        assert_eq!(factory.port(ConnectionProtocol::Tcp), 5000);
        assert_eq!(factory.port(ConnectionProtocol::Udp), 6000);
    }

    #[test]
    fn test_socket_addr() {
        assert_eq!(socket_addr("10.0.0.1", 5000), "10.0.0.1:5000");
        assert_eq!(socket_addr("::1", 5000), "[::1]:5000");
    }
}
