//! Connection manager for one matrix.
//!
//! The manager owns the single live transport and drives the connection state
//! machine:
//!
//! ```text
//! Disconnected --configure(host)--> Connecting --Connect / UDP open--> Connected
//! Connecting | Connected --Error--> Error --Connect (TCP retry)--> Connected
//! any --reconfigure / destroy--> Disconnected (then Connecting if a host is set)
//! ```
//!
//! Transport events arrive on one queue and are handled on the caller's task,
//! in order. Events from a transport that has been replaced are dropped.

use std::time::Duration;

use p3k_protocol::{LineCodec, Response, ResponseKind};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, Level};

use crate::capabilities::Capabilities;
use crate::config::{ClientConfig, ConnectionProtocol};
use crate::error::{ClientError, ClientResult, TransportError};
use crate::status::{ModuleStatus, StatusSink};
use crate::telemetry;
use crate::transport::{
    EventSink, Transport, TransportEvent, TransportFactory, TransportId, TransportMessage,
};

/// Connection state as seen by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No transport.
    Disconnected,
    /// Transport created, waiting for the stream to connect.
    Connecting,
    /// Transport usable.
    Connected,
    /// The transport reported a failure; TCP keeps retrying.
    Error,
}

/// Outcome delivered to whoever waits on a connection attempt.
pub type ConnectOutcome = Result<(), TransportError>;

/// Receiving half of the pending-connect signal.
///
/// Resolves once per connection attempt. If the attempt is abandoned by a
/// reconfiguration or teardown, the receiver sees the sender dropped.
pub type ConnectSignal = oneshot::Receiver<ConnectOutcome>;

/// The live transport together with its id.
struct ActiveTransport {
    id: TransportId,
    transport: Box<dyn Transport>,
}

/// Owns the transport to one matrix and routes traffic through it.
pub struct ConnectionManager<F: TransportFactory, S: StatusSink> {
    label: String,
    config: ClientConfig,
    factory: F,
    sink: S,
    state: ConnectionState,
    transport: Option<ActiveTransport>,
    next_id: u64,
    events_tx: mpsc::UnboundedSender<TransportMessage>,
    events_rx: mpsc::UnboundedReceiver<TransportMessage>,
    codec: LineCodec,
    capabilities: Capabilities,
    pending: Option<oneshot::Sender<ConnectOutcome>>,
    signal: Option<ConnectSignal>,
}

impl<F: TransportFactory, S: StatusSink> ConnectionManager<F, S> {
    /// Create a manager with no configuration applied.
    pub fn new(label: impl Into<String>, factory: F, sink: S) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        ConnectionManager {
            label: label.into(),
            config: ClientConfig::default(),
            factory,
            sink,
            state: ConnectionState::Disconnected,
            transport: None,
            next_id: 0,
            events_tx,
            events_rx,
            codec: LineCodec::new(),
            capabilities: Capabilities::default(),
            pending: None,
            signal: None,
        }
    }

    /// The applied configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Capabilities learned so far.
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// The status sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// The status sink, mutably.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// The transport factory.
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Id of the live transport, if any.
    pub fn transport_id(&self) -> Option<TransportId> {
        self.transport.as_ref().map(|active| active.id)
    }

    /// Take the pending-connect signal for the current attempt.
    ///
    /// Returns `None` if there is no attempt or the signal was already taken.
    pub fn take_connect_signal(&mut self) -> Option<ConnectSignal> {
        self.signal.take()
    }

    /// Apply a new configuration.
    ///
    /// Reconnects if the host or protocol changed, or if the manager is not
    /// currently connected. Reapplying the same configuration while connected
    /// keeps the existing transport.
    pub fn configure(&mut self, config: ClientConfig) {
        let changed = self.config.host() != config.host()
            || self.config.connection_protocol != config.connection_protocol;

        if changed || !self.is_connected() {
            self.config.host = config.host.clone();
            self.config.connection_protocol = config.connection_protocol;
            self.connect();
        }

        self.config = config;
    }

    /// Tear down any transport and start a fresh connection attempt.
    ///
    /// Without a configured host the manager is left disconnected and nothing
    /// is reported.
    pub fn connect(&mut self) {
        self.teardown();

        let Some(host) = self.config.host().map(str::to_string) else {
            trace!("Connection[{}]: no host configured", self.label);
            return;
        };
        let protocol = self.config.connection_protocol;

        self.state = ConnectionState::Connecting;
        self.sink.status(ModuleStatus::Warning, Some("Connecting"));

        let (tx, rx) = oneshot::channel();
        self.pending = Some(tx);
        self.signal = Some(rx);

        let id = TransportId(self.next_id);
        self.next_id += 1;
        metrics::counter!(telemetry::CONNECTION_ATTEMPTS).increment(1);
        debug!(
            "Connection[{}]: opening {} transport {:?} to {}",
            self.label, protocol, id, host
        );

        let events = EventSink::new(id, self.events_tx.clone());
        match self.factory.open(protocol, &host, events) {
            Ok(transport) => {
                self.transport = Some(ActiveTransport { id, transport });
                if !protocol.has_handshake() {
                    // Datagram transports are usable immediately
                    self.on_connected(protocol);
                }
            }
            Err(e) => self.on_error(e),
        }
    }

    /// Whether commands can currently be delivered.
    ///
    /// TCP needs a live socket; UDP only needs a transport instance.
    pub fn is_connected(&self) -> bool {
        self.transport
            .as_ref()
            .is_some_and(|active| active.transport.is_connected())
    }

    /// Write a command to the device.
    ///
    /// Returns false without writing anything when not connected. Nothing is
    /// queued or retried.
    pub fn send(&mut self, data: &[u8]) -> bool {
        let sent = match &self.transport {
            Some(active) if active.transport.is_connected() => {
                debug!(
                    "Connection[{}]: sending {:?} to {}",
                    self.label,
                    String::from_utf8_lossy(data),
                    self.config.host().unwrap_or("")
                );
                active.transport.send(data)
            }
            _ => {
                debug!("Connection[{}]: socket not connected", self.label);
                false
            }
        };

        if sent {
            metrics::counter!(telemetry::COMMANDS_SENT).increment(1);
        } else {
            metrics::counter!(telemetry::COMMANDS_REJECTED).increment(1);
        }
        sent
    }

    /// Report a log line through the status sink.
    pub fn log(&mut self, level: Level, message: &str) {
        self.sink.log(level, message);
    }

    /// Release the transport. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        debug!("Connection[{}]: destroy", self.label);
        self.teardown();
    }

    /// Wait for the next transport event and handle it.
    pub async fn next_event(&mut self) {
        // The manager holds a sender itself, so the queue never closes
        if let Some(message) = self.events_rx.recv().await {
            self.handle_message(message);
        }
    }

    /// Handle every event already queued, without waiting.
    ///
    /// Returns the number of events handled.
    pub fn process_pending_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.events_rx.try_recv() {
            self.handle_message(message);
            handled += 1;
        }
        handled
    }

    /// Drive events until the current connection attempt resolves.
    pub async fn wait_connected(&mut self, timeout: Duration) -> ClientResult<()> {
        if self.is_connected() {
            return Ok(());
        }
        let mut signal = match self.take_connect_signal() {
            Some(signal) => signal,
            None if self.config.host().is_none() => return Err(ClientError::NotConfigured),
            None => return Err(ClientError::Superseded),
        };

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            match signal.try_recv() {
                Ok(outcome) => return outcome.map_err(ClientError::from),
                Err(oneshot::error::TryRecvError::Closed) => return Err(ClientError::Superseded),
                Err(oneshot::error::TryRecvError::Empty) => {}
            }

            tokio::select! {
                _ = self.next_event() => {}
                _ = &mut deadline => return Err(ClientError::Timeout),
            }
        }
    }

    /// Dispatch one tagged transport event.
    pub fn handle_message(&mut self, message: TransportMessage) {
        if self.transport_id() != Some(message.id) {
            trace!(
                "Connection[{}]: ignoring event from stale transport {:?}",
                self.label,
                message.id
            );
            return;
        }

        match message.event {
            TransportEvent::Connect => self.on_connected(self.config.connection_protocol),
            TransportEvent::Error(e) => self.on_error(e),
            TransportEvent::StatusChange(status, text) => {
                self.sink.status(status, text.as_deref());
            }
            TransportEvent::Data(chunk) => self.on_data(&chunk),
        }
    }

    /// Destroy the transport and abandon the pending attempt.
    fn teardown(&mut self) {
        if let Some(mut active) = self.transport.take() {
            active.transport.destroy();
        }
        // Dropping the sender cancels anyone waiting on the old attempt
        self.pending = None;
        self.signal = None;
        self.codec.clear();
        self.state = ConnectionState::Disconnected;
    }

    fn on_connected(&mut self, protocol: ConnectionProtocol) {
        self.state = ConnectionState::Connected;
        self.sink.status(ModuleStatus::Ok, None);
        debug!("Connection[{}]: connected ({})", self.label, protocol);
        if let Some(pending) = self.pending.take() {
            let _ = pending.send(Ok(()));
        }
    }

    fn on_error(&mut self, error: TransportError) {
        metrics::counter!(telemetry::TRANSPORT_ERRORS).increment(1);

        // Only report the first error of an episode; TCP retries would
        // otherwise flood the log.
        if self.state != ConnectionState::Error {
            debug!("Connection[{}]: network error: {}", self.label, error);
            let message = error.to_string();
            self.sink.status(ModuleStatus::Error, Some(&message));
            self.sink.log(Level::ERROR, &format!("Network error: {}", message));
        } else {
            trace!("Connection[{}]: repeated network error: {}", self.label, error);
        }

        self.state = ConnectionState::Error;
        if let Some(pending) = self.pending.take() {
            let _ = pending.send(Err(error));
        }
    }

    fn on_data(&mut self, chunk: &[u8]) {
        match self.codec.push(chunk) {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                // Complete lines ahead of the dropped tail are still handled
                self.sink.log(Level::WARN, &format!("Dropping response data: {}", e));
            }
        }

        while let Some(line) = self.codec.decode_line() {
            match Response::parse(&line) {
                Ok(response) => {
                    metrics::counter!(telemetry::RESPONSES_PARSED).increment(1);
                    trace!("Connection[{}]: response {:?}", self.label, response);
                    self.on_response(&response);
                }
                Err(e) => {
                    metrics::counter!(telemetry::RESPONSES_REJECTED).increment(1);
                    trace!("Connection[{}]: {}", self.label, e);
                    self.sink
                        .log(Level::ERROR, &format!("Error parsing response: {}", line));
                }
            }
        }
    }

    fn on_response(&mut self, response: &Response) {
        if let ResponseKind::DeviceError { code } = response.kind {
            self.sink.log(
                Level::WARN,
                &format!("Device rejected {}: error {:03}", response.command, code),
            );
            return;
        }

        for detection in self.capabilities.observe(&response.kind) {
            self.sink.log(Level::INFO, &detection.to_string());
        }
    }
}

impl<F: TransportFactory, S: StatusSink> Drop for ConnectionManager<F, S> {
    fn drop(&mut self) {
        self.teardown();
    }
}
