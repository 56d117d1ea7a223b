//! `p3k`: drive a Protocol 3000 matrix switcher from the command line.
//!
//! Sends one action and lingers briefly to log the device's replies, or stays
//! connected and logs everything until interrupted.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use p3k_client::{
    Action, ClientConfig, ClientError, ClientResult, ConnectionProtocol, MatrixClient,
    NetworkTransportFactory, TracingSink, VariableMap, telemetry,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "p3k")]
#[command(about = "Control a Kramer matrix switcher over Protocol 3000")]
#[command(version)]
struct Cli {
    /// YAML file with `host` and `connection_protocol`
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Device IP address (overrides the config file)
    #[arg(long)]
    host: Option<String>,

    /// Transport: tcp or udp (overrides the config file)
    #[arg(long, value_parser = parse_protocol)]
    protocol: Option<ConnectionProtocol>,

    /// Device port (defaults to 5000 for TCP, 50000 for UDP)
    #[arg(long)]
    port: Option<u16>,

    /// Variable for dynamic actions, as name=value (repeatable)
    #[arg(long = "var", value_parser = parse_var)]
    vars: Vec<(String, String)>,

    /// How long to wait for the connection
    #[arg(long, default_value_t = 5000)]
    connect_timeout_ms: u64,

    /// How long to keep logging replies after sending
    #[arg(long, default_value_t = 500)]
    linger_ms: u64,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Route a video input to the output
    Video { input: u32 },
    /// Route an audio input to the output
    Audio { input: u32 },
    /// Route a video input given as text, e.g. '$(input)'
    VideoDyn { input: String },
    /// Route an audio input given as text, e.g. '$(input)'
    AudioDyn { input: String },
    /// Set the output audio level
    Level { level: u32 },
    /// Set audio mute (0 = unmuted, 1 = muted)
    Mute { state: u32 },
    /// Set video mute (0 = enabled, 1 = muted, 2 = blank)
    Vmute { state: u32 },
    /// Stay connected and log replies until interrupted
    Monitor,
}

impl Commands {
    /// The action to dispatch, or `None` for monitoring.
    fn into_action(self) -> Option<Action> {
        match self {
            Commands::Video { input } => Some(Action::SwitchVideo { input }),
            Commands::Audio { input } => Some(Action::SwitchAudio { input }),
            Commands::VideoDyn { input } => Some(Action::SwitchVideoDynamic { input }),
            Commands::AudioDyn { input } => Some(Action::SwitchAudioDynamic { input }),
            Commands::Level { level } => Some(Action::AudioLevel { level }),
            Commands::Mute { state } => Some(Action::AudioMute { state }),
            Commands::Vmute { state } => Some(Action::VideoMute { state }),
            Commands::Monitor => None,
        }
    }
}

fn parse_protocol(s: &str) -> Result<ConnectionProtocol, String> {
    ConnectionProtocol::from_str(s)
        .ok_or_else(|| format!("unknown protocol '{}', expected tcp or udp", s))
}

fn parse_var(s: &str) -> Result<(String, String), String> {
    VariableMap::parse_pair(s).ok_or_else(|| format!("expected name=value, got '{}'", s))
}

type Client = MatrixClient<NetworkTransportFactory, TracingSink, VariableMap>;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
    telemetry::describe_metrics();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Merge the config file with command-line overrides.
fn load_config(cli: &Cli) -> ClientResult<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    if let Some(host) = &cli.host {
        config.host = Some(host.clone());
    }
    if let Some(protocol) = cli.protocol {
        config.connection_protocol = protocol;
    }
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config = load_config(&cli)?;
    let Some(host) = config.host().map(str::to_string) else {
        return Err(ClientError::NotConfigured);
    };
    let protocol = config.connection_protocol;

    let mut factory = NetworkTransportFactory::new();
    if let Some(port) = cli.port {
        factory = factory.with_port(protocol, port);
    }
    let vars: VariableMap = cli.vars.into_iter().collect();

    let mut client: Client = MatrixClient::new(host.clone(), factory, TracingSink::new(host), vars);
    client.configure(config);
    client
        .wait_connected(Duration::from_millis(cli.connect_timeout_ms))
        .await?;
    info!("Connected over {}", protocol);

    let result = match cli.command.into_action() {
        Some(action) => {
            send_action(&mut client, action, Duration::from_millis(cli.linger_ms)).await
        }
        None => monitor(&mut client).await,
    };

    client.shutdown();
    result
}

/// Dispatch one action, then keep handling replies for `linger`.
async fn send_action(client: &mut Client, action: Action, linger: Duration) -> ClientResult<()> {
    let name = action.name();
    if !client.dispatch(action) {
        warn!("{} was not sent", name);
    }

    let deadline = tokio::time::Instant::now() + linger;
    while tokio::time::timeout_at(deadline, client.next_event()).await.is_ok() {}
    Ok(())
}

/// Handle events until Ctrl+C.
async fn monitor(client: &mut Client) -> ClientResult<()> {
    info!("Monitoring, press Ctrl+C to stop");
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            _ = client.next_event() => {}
            result = &mut interrupted => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                }
                break;
            }
        }
    }

    let caps = client.capabilities();
    info!(
        "Capabilities: inputs={:?} outputs={:?} video_presets={:?}",
        caps.inputs, caps.outputs, caps.video_presets
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let cli = Cli::try_parse_from([
            "p3k", "--host", "10.0.0.1", "--protocol", "udp", "--var", "input=4", "video-dyn",
            "$(input)",
        ])
        .unwrap();
        assert_eq!(cli.host.as_deref(), Some("10.0.0.1"));
        assert_eq!(cli.protocol, Some(ConnectionProtocol::Udp));
        assert_eq!(cli.vars, vec![("input".to_string(), "4".to_string())]);
        assert_eq!(
            cli.command.into_action(),
            Some(Action::SwitchVideoDynamic { input: "$(input)".to_string() })
        );
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Cli::try_parse_from(["p3k", "--protocol", "serial", "monitor"]).is_err());
        assert!(Cli::try_parse_from(["p3k", "--var", "novalue", "monitor"]).is_err());
        assert!(Cli::try_parse_from(["p3k", "video", "three"]).is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::try_parse_from(["p3k", "--host", "10.0.0.9", "monitor"]).unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.host(), Some("10.0.0.9"));
        assert_eq!(config.connection_protocol, ConnectionProtocol::Tcp);

        let cli = Cli::try_parse_from(["p3k", "--host", "matrix.local", "monitor"]).unwrap();
        assert!(matches!(load_config(&cli), Err(ClientError::Config(_))));
    }
}
