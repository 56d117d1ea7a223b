//! The matrix client: actions in, commands out.

use std::time::Duration;

use tracing::{debug, Level};

use crate::actions::{Action, NoVariables, VariableResolver};
use crate::capabilities::Capabilities;
use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::manager::{ConnectionManager, ConnectionState};
use crate::status::StatusSink;
use crate::transport::{NetworkTransportFactory, TransportFactory};

/// Controls one matrix switcher.
///
/// Wraps a [`ConnectionManager`] and turns [`Action`]s into encoded commands.
/// The caller drives the transport events, either with [`Self::next_event`] in
/// a loop or with [`Self::process_pending_events`] between other work.
pub struct MatrixClient<F: TransportFactory, S: StatusSink, R: VariableResolver = NoVariables> {
    manager: ConnectionManager<F, S>,
    resolver: R,
}

impl<S: StatusSink> MatrixClient<NetworkTransportFactory, S, NoVariables> {
    /// Create a client that talks to the network on the default ports.
    pub fn with_sink(label: impl Into<String>, sink: S) -> Self {
        MatrixClient::new(label, NetworkTransportFactory::default(), sink, NoVariables)
    }
}

impl<F: TransportFactory, S: StatusSink, R: VariableResolver> MatrixClient<F, S, R> {
    /// Create a client from its parts. Nothing connects until [`Self::configure`].
    pub fn new(label: impl Into<String>, factory: F, sink: S, resolver: R) -> Self {
        MatrixClient {
            manager: ConnectionManager::new(label, factory, sink),
            resolver,
        }
    }

    /// Apply a configuration, connecting or reconnecting as needed.
    pub fn configure(&mut self, config: ClientConfig) {
        self.manager.configure(config);
    }

    /// Run an action against the device.
    ///
    /// Returns whether the command was handed to the transport. Parameter
    /// errors are logged through the status sink and nothing is sent.
    pub fn dispatch(&mut self, action: Action) -> bool {
        let name = action.name();
        match action.into_command(&self.resolver) {
            Ok(command) => {
                debug!("Client: {} -> {}", name, command);
                self.manager.send(&command.encode())
            }
            Err(e) => {
                self.manager.log(Level::ERROR, &e.to_string());
                false
            }
        }
    }

    /// Wait until the current connection attempt resolves.
    pub async fn wait_connected(&mut self, timeout: Duration) -> ClientResult<()> {
        self.manager.wait_connected(timeout).await
    }

    /// Wait for and handle one transport event.
    pub async fn next_event(&mut self) {
        self.manager.next_event().await;
    }

    /// Handle every queued transport event without waiting.
    pub fn process_pending_events(&mut self) -> usize {
        self.manager.process_pending_events()
    }

    /// Whether commands can currently be delivered.
    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    /// The current connection state.
    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Capabilities learned so far.
    pub fn capabilities(&self) -> &Capabilities {
        self.manager.capabilities()
    }

    /// The applied configuration.
    pub fn config(&self) -> &ClientConfig {
        self.manager.config()
    }

    /// The resolver used for dynamic actions.
    pub fn resolver_mut(&mut self) -> &mut R {
        &mut self.resolver
    }

    /// The connection manager.
    pub fn manager(&self) -> &ConnectionManager<F, S> {
        &self.manager
    }

    /// The connection manager, mutably.
    pub fn manager_mut(&mut self) -> &mut ConnectionManager<F, S> {
        &mut self.manager
    }

    /// Release the transport. The client can be configured again afterwards.
    pub fn shutdown(&mut self) {
        self.manager.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::VariableMap;
    use crate::config::ConnectionProtocol;
    use crate::manager::tests::{MockFactory, RecordingSink};
    use crate::transport::TransportEvent;

    type TestClient = MatrixClient<MockFactory, RecordingSink, VariableMap>;

    fn connected_client() -> TestClient {
        let vars: VariableMap = [("input", "5"), ("label", "lobby")].into_iter().collect();
        let mut client =
            MatrixClient::new("test", MockFactory::default(), RecordingSink::default(), vars);
        client.configure(ClientConfig::new("10.0.0.1", ConnectionProtocol::Tcp));
        client.manager().factory().last().emit(TransportEvent::Connect);
        client.process_pending_events();
        client
    }

    #[test]
    fn test_dispatch_writes_encoded_command() {
        let mut client = connected_client();
        assert!(client.dispatch(Action::SwitchVideo { input: 3 }));
        assert!(client.dispatch(Action::AudioMute { state: 1 }));
        assert_eq!(
            client.manager().factory().writes(),
            vec![b"#ROUTE 1,1,3\r".to_vec(), b"#MUTE 1,1\r".to_vec()]
        );
    }

    #[test]
    fn test_dispatch_dynamic_resolves_variables() {
        let mut client = connected_client();
        assert!(client.dispatch(Action::SwitchAudioDynamic { input: "$(input)".to_string() }));
        assert_eq!(client.manager().factory().writes(), vec![b"#ROUTE 2,1,5\r".to_vec()]);
    }

    #[test]
    fn test_dispatch_dynamic_non_number_sends_nothing() {
        let mut client = connected_client();
        let logs_before = client.manager().sink().logs.len();

        assert!(!client.dispatch(Action::SwitchVideoDynamic { input: "$(label)".to_string() }));
        assert!(client.manager().factory().writes().is_empty());

        let logs = &client.manager().sink().logs[logs_before..];
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].0, Level::ERROR);
        assert!(logs[0].1.contains("lobby"));
        assert!(logs[0].1.contains("switch_video_dynamic"));
    }

    #[test]
    fn test_dispatch_while_disconnected() {
        let mut client =
            MatrixClient::new("test", MockFactory::default(), RecordingSink::default(), NoVariables);
        assert!(!client.dispatch(Action::VideoMute { state: 2 }));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_shutdown_releases_transport() {
        let mut client = connected_client();
        client.shutdown();
        assert!(!client.is_connected());
        assert_eq!(client.manager().factory().destroyed(), 1);
        assert!(!client.dispatch(Action::SwitchVideo { input: 1 }));
    }
}
