//! `bridge-hub` binary.
//!
//! ```text
//! bridge-hub [--config hub.toml] [--host 127.0.0.1] [--port 5004] [serve|validate]
//! ```
//!
//! Flags override values from the config file.

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use bridge_hub::{HubConfig, HubServer};
use bridge_telemetry::{init_telemetry, TelemetryConfig};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "bridge-hub", version, about = "Relay hub for desktop bridge peers")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, env = "BRIDGE_HUB_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind (overrides the config file).
    #[arg(long, env = "BRIDGE_HUB_HOST")]
    host: Option<IpAddr>,

    /// Port to bind (overrides the config file).
    #[arg(long, env = "BRIDGE_HUB_PORT")]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, Default)]
enum Command {
    /// Run the relay.
    #[default]
    Serve,
    /// Check the configuration and exit.
    Validate,
}

impl Cli {
    fn resolve_config(&self) -> Result<HubConfig> {
        let mut config = match &self.config {
            Some(path) => HubConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => HubConfig::default(),
        };
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _telemetry = init_telemetry(TelemetryConfig::from_env())?;

    let config = cli.resolve_config()?;

    match cli.command.unwrap_or_default() {
        Command::Validate => {
            info!(addr = %config.bind_addr(), "Configuration is valid");
            Ok(())
        }
        Command::Serve => {
            let server = HubServer::new(config)?;
            let listener = server.bind().await?;
            server.run(listener, shutdown_signal()).await?;
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received shutdown signal");
    }
}
