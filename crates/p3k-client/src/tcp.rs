//! Stream transport over TCP.
//!
//! A background task owns the socket. It connects, then shuttles bytes in both
//! directions until the connection drops, and retries at a fixed interval until
//! the transport is destroyed.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::TransportError;
use crate::status::ModuleStatus;
use crate::transport::{socket_addr, EventSink, Transport, TransportEvent};

/// TCP connection to the device with automatic reconnect.
pub struct TcpTransport {
    addr: String,
    /// Set by the socket task while a connection is established.
    connected: Arc<AtomicBool>,
    /// Queue of outbound writes; `None` once destroyed.
    outgoing: Option<mpsc::UnboundedSender<Vec<u8>>>,
    task: Option<JoinHandle<()>>,
}

impl TcpTransport {
    /// Start connecting to `host:port` in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(
        host: &str,
        port: u16,
        reconnect_interval: Duration,
        events: EventSink,
    ) -> Self {
        let addr = socket_addr(host, port);
        let connected = Arc::new(AtomicBool::new(false));
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();

        debug!("Tcp[{}]: starting transport {:?}", addr, events.id());
        let task = tokio::spawn(run_stream(
            addr.clone(),
            reconnect_interval,
            outgoing_rx,
            connected.clone(),
            events,
        ));

        TcpTransport {
            addr,
            connected,
            outgoing: Some(outgoing),
            task: Some(task),
        }
    }
}

impl Transport for TcpTransport {
    fn send(&self, data: &[u8]) -> bool {
        if !self.is_connected() {
            return false;
        }
        match &self.outgoing {
            Some(outgoing) => outgoing.send(data.to_vec()).is_ok(),
            None => false,
        }
    }

    fn is_connected(&self) -> bool {
        self.task.is_some() && self.connected.load(Ordering::Acquire)
    }

    fn destroy(&mut self) {
        self.connected.store(false, Ordering::Release);
        self.outgoing = None;
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Tcp[{}]: destroyed", self.addr);
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// How a connected session ended without an I/O error.
enum StreamEnd {
    /// The device closed the connection.
    Closed,
    /// The transport was dropped.
    Shutdown,
}

/// Connect, pump, and reconnect until shut down.
async fn run_stream(
    addr: String,
    reconnect_interval: Duration,
    mut outgoing: mpsc::UnboundedReceiver<Vec<u8>>,
    connected: Arc<AtomicBool>,
    events: EventSink,
) {
    let mut status = None;

    loop {
        let error = match TcpStream::connect(&addr).await {
            Ok(stream) => {
                let _ = stream.set_nodelay(true);
                connected.store(true, Ordering::Release);
                debug!("Tcp[{}]: connected", addr);
                report_status(&events, &mut status, ModuleStatus::Ok, None);
                if !events.emit(TransportEvent::Connect) {
                    return;
                }

                let result = handle_stream(stream, &mut outgoing, &events).await;
                connected.store(false, Ordering::Release);
                match result {
                    Ok(StreamEnd::Closed) => TransportError::Closed,
                    Ok(StreamEnd::Shutdown) => return,
                    Err(e) => TransportError::from(e),
                }
            }
            Err(e) => TransportError::Connect {
                addr: addr.clone(),
                source: Arc::new(e),
            },
        };

        // Writes queued for the lost connection are not retried
        while outgoing.try_recv().is_ok() {}

        debug!("Tcp[{}]: {}; retrying in {:?}", addr, error, reconnect_interval);
        report_status(&events, &mut status, ModuleStatus::Error, Some(error.to_string()));
        if !events.emit(TransportEvent::Error(error)) {
            return;
        }

        tokio::time::sleep(reconnect_interval).await;
    }
}

/// Emit a status change only when the level differs from the last one.
fn report_status(
    events: &EventSink,
    current: &mut Option<ModuleStatus>,
    status: ModuleStatus,
    message: Option<String>,
) {
    if *current != Some(status) {
        *current = Some(status);
        events.emit(TransportEvent::StatusChange(status, message));
    }
}

/// Shuttle bytes between the socket and the manager until the session ends.
async fn handle_stream(
    mut stream: TcpStream,
    outgoing: &mut mpsc::UnboundedReceiver<Vec<u8>>,
    events: &EventSink,
) -> io::Result<StreamEnd> {
    let (mut reader, mut writer) = stream.split();
    let mut read_buf = [0u8; 1024];

    loop {
        tokio::select! {
            // Read from device -> manager
            result = reader.read(&mut read_buf) => {
                let n = result?;
                if n == 0 {
                    return Ok(StreamEnd::Closed);
                }
                trace!("Tcp: received {} bytes", n);
                if !events.emit(TransportEvent::Data(read_buf[..n].to_vec())) {
                    return Ok(StreamEnd::Shutdown);
                }
            }

            // Outbound command -> device
            data = outgoing.recv() => {
                let Some(data) = data else {
                    return Ok(StreamEnd::Shutdown);
                };
                writer.write_all(&data).await?;
                writer.flush().await?;
            }
        }
    }
}
