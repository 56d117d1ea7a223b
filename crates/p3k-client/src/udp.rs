//! Datagram transport over UDP.
//!
//! There is no handshake: the socket is usable as soon as it is bound and
//! connected to the device address, so this transport never emits
//! [`TransportEvent::Connect`].

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::TransportError;
use crate::status::ModuleStatus;
use crate::transport::{socket_addr, EventSink, Transport, TransportEvent};

/// Largest datagram accepted from the device.
const MAX_DATAGRAM: usize = 2048;

/// Pause after a receive error before listening again.
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// UDP socket connected to the device.
pub struct UdpTransport {
    addr: String,
    /// Non-blocking handle for sends; the receive task owns a tokio clone.
    socket: Option<std::net::UdpSocket>,
    task: Option<JoinHandle<()>>,
}

impl UdpTransport {
    /// Bind a local socket and point it at `host:port`.
    ///
    /// `host` must be an IP address; no name lookup is done. Must be called
    /// from within a tokio runtime.
    pub fn open(host: &str, port: u16, events: EventSink) -> Result<Self, TransportError> {
        let addr = socket_addr(host, port);
        let bind_error = |e: io::Error| TransportError::Bind {
            addr: addr.clone(),
            source: Arc::new(e),
        };

        let ip: IpAddr = host.trim_matches(|c: char| c == '[' || c == ']').parse().map_err(|_| {
            bind_error(io::Error::new(
                io::ErrorKind::InvalidInput,
                "host is not an IP address",
            ))
        })?;
        let target = SocketAddr::new(ip, port);
        let local: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };

        let socket = std::net::UdpSocket::bind(local).map_err(bind_error)?;
        socket.connect(target).map_err(bind_error)?;
        socket.set_nonblocking(true).map_err(bind_error)?;
        let receiver = UdpSocket::from_std(socket.try_clone().map_err(bind_error)?)
            .map_err(bind_error)?;

        debug!("Udp[{}]: opened transport {:?}", addr, events.id());
        let task = tokio::spawn(run_receiver(receiver, events));

        Ok(UdpTransport {
            addr,
            socket: Some(socket),
            task: Some(task),
        })
    }
}

impl Transport for UdpTransport {
    fn send(&self, data: &[u8]) -> bool {
        let Some(socket) = &self.socket else {
            return false;
        };
        match socket.send(data) {
            Ok(n) => n == data.len(),
            Err(e) => {
                trace!("Udp[{}]: send failed: {}", self.addr, e);
                false
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    fn destroy(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if self.socket.take().is_some() {
            debug!("Udp[{}]: destroyed", self.addr);
        }
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Forward every datagram from the device to the manager.
async fn run_receiver(socket: UdpSocket, events: EventSink) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    let mut failed = false;

    loop {
        match socket.recv(&mut buf).await {
            Ok(n) => {
                trace!("Udp: received {} bytes", n);
                if !events.emit(TransportEvent::Data(buf[..n].to_vec())) {
                    return;
                }
            }
            Err(e) => {
                let error = TransportError::from(e);
                if !failed {
                    failed = true;
                    events.emit(TransportEvent::StatusChange(
                        ModuleStatus::Error,
                        Some(error.to_string()),
                    ));
                }
                if !events.emit(TransportEvent::Error(error)) {
                    return;
                }
                tokio::time::sleep(RECEIVE_ERROR_BACKOFF).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{TransportId, TransportMessage};
    use tokio::sync::mpsc;

    fn events() -> (EventSink, mpsc::UnboundedReceiver<TransportMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventSink::new(TransportId(0), tx), rx)
    }

    #[tokio::test]
    async fn test_send_immediately_after_open() {
        let device = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        device.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let port = device.local_addr().unwrap().port();

        let (sink, _rx) = events();
        let transport = UdpTransport::open("127.0.0.1", port, sink).unwrap();
        assert!(transport.is_connected());
        // No yield to the runtime between open and send
        assert!(transport.send(b"#ROUTE 1,1,3\r"));

        let mut buf = [0u8; 64];
        let n = device.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"#ROUTE 1,1,3\r");
    }

    #[tokio::test]
    async fn test_receives_datagrams() {
        let device = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = device.local_addr().unwrap().port();

        let (sink, mut rx) = events();
        let transport = UdpTransport::open("127.0.0.1", port, sink).unwrap();
        assert!(transport.send(b"#VMUTE 1,0\r"));
        let mut buf = [0u8; 64];
        let (_, from) = device.recv_from(&mut buf).unwrap();
        device.send_to(b"~01@VMUTE 1,0\r\n", from).unwrap();

        let message = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match message.event {
            TransportEvent::Data(data) => assert_eq!(data, b"~01@VMUTE 1,0\r\n"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejects_hostnames() {
        let (sink, _rx) = events();
        let result = UdpTransport::open("matrix.local", 50000, sink);
        assert!(matches!(result, Err(TransportError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_destroy_stops_sending() {
        let device = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = device.local_addr().unwrap().port();

        let (sink, _rx) = events();
        let mut transport = UdpTransport::open("127.0.0.1", port, sink).unwrap();
        transport.destroy();
        transport.destroy();
        assert!(!transport.is_connected());
        assert!(!transport.send(b"#MUTE 1,1\r"));
    }
}
