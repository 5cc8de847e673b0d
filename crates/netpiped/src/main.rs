//! netpiped - The netpipe daemon
//!
//! This is the main entry point for the daemon.
//! It wires together all the components:
//! - Configuration loading (file, then command-line overrides)
//! - Pipe fabric creation
//! - Process supervisor and SIGCHLD-driven reaper
//! - Control server

use anyhow::{Context, Result};
use clap::Parser;
use netpipe_api::banner;
use netpipe_config::{read_config, resolve_config, FabricConfig, RawConfig, RawFabricKind, Settings};
use netpipe_core::{Reaper, Supervisor};
use netpipe_host_linux::{LinuxHost, PipeFabric};
use netpipe_ipc::ControlServer;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// netpiped - connect a remotely chosen writer and reader through one pipe
#[derive(Parser, Debug)]
#[command(name = "netpiped", version)]
#[command(about = "Network-controlled writer/reader pipeline daemon", long_about = None)]
struct Args {
    /// Configuration file path (optional; every setting has a default)
    #[arg(short, long, env = "NETPIPE_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address [default: 0.0.0.0]
    #[arg(short, long, env = "NETPIPE_ADDRESS")]
    address: Option<IpAddr>,

    /// Bind port [default: 30000]
    #[arg(short, long, env = "NETPIPE_PORT")]
    port: Option<u16>,

    /// Use a named FIFO at this path instead of an anonymous pipe
    #[arg(long, value_name = "PATH")]
    fifo: Option<PathBuf>,

    /// Grace interval between SIGTERM and respawn, in milliseconds [default: 1000]
    #[arg(long, value_name = "MS")]
    grace_ms: Option<u64>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

impl Args {
    /// Defaults, then the config file, then flags, validated together
    fn settings(&self) -> Result<Settings> {
        let mut raw = match &self.config {
            Some(path) => read_config(path)
                .with_context(|| format!("Failed to load config from {:?}", path))?,
            None => RawConfig::default(),
        };

        if let Some(address) = self.address {
            raw.server.address = Some(address.to_string());
        }
        if let Some(port) = self.port {
            raw.server.port = Some(port);
        }
        if let Some(path) = &self.fifo {
            raw.fabric.kind = RawFabricKind::Named;
            raw.fabric.path = Some(path.clone());
        }
        if let Some(grace_ms) = self.grace_ms {
            raw.supervisor.grace_ms = Some(grace_ms);
        }

        resolve_config(raw).context("Invalid settings")
    }
}

/// Main service state
struct Service {
    supervisor: Arc<Supervisor<LinuxHost>>,
    server: ControlServer,
}

impl Service {
    async fn new(settings: &Settings) -> Result<Self> {
        let fabric = match &settings.fabric {
            FabricConfig::Anonymous => PipeFabric::anonymous(),
            FabricConfig::Named { path, mode } => PipeFabric::named(path, *mode),
        }
        .context("Failed to create pipe fabric")?;

        info!(fabric = ?settings.fabric, "Pipe fabric ready");

        let host = Arc::new(LinuxHost::new(fabric));
        let supervisor = Arc::new(Supervisor::new(host, settings.supervisor.grace));

        let server = ControlServer::bind(&settings.server)
            .await
            .with_context(|| format!("Failed to bind {}", settings.server.socket_addr()))?;

        Ok(Self { supervisor, server })
    }

    async fn run(self) -> Result<()> {
        // Registered before the first spawn so no exit notification is missed
        let sigchld = signal(SignalKind::child()).context("Failed to create SIGCHLD handler")?;
        let reaper_handle = tokio::spawn(reap_on_sigchld(sigchld, self.supervisor.reaper()));

        let mut sigterm = signal(SignalKind::terminate())
            .context("Failed to create SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt())
            .context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup())
            .context("Failed to create SIGHUP handler")?;

        info!(
            addr = %self.server.local_addr()?,
            grace_ms = self.supervisor.grace().as_millis() as u64,
            "Service running"
        );

        tokio::select! {
            result = self.server.run(self.supervisor.clone()) => {
                if let Err(e) = result {
                    error!(error = %e, "Control server error");
                }
            }
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("Received SIGINT, shutting down"),
            _ = sighup.recv() => info!("Received SIGHUP, shutting down"),
        }

        // A launch still waiting out its grace interval on the blocking pool
        // must not spawn once the fabric is going away
        self.supervisor.shutdown();

        // Closes the listening socket. Children are left running.
        drop(self.server);
        reaper_handle.abort();

        if let Err(e) = self.supervisor.host().remove_fabric() {
            warn!(error = %e, "Failed to remove named fabric");
        }

        info!("Exit");
        Ok(())
    }
}

/// Drain terminated children once now and again after every SIGCHLD
async fn reap_on_sigchld(mut sigchld: Signal, reaper: Reaper<LinuxHost>) {
    reaper.drain();
    while sigchld.recv().await.is_some() {
        reaper.drain();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        banner = banner().trim_end(),
        "netpiped starting"
    );

    let settings = args.settings()?;
    let service = Service::new(&settings).await?;
    service.run().await
}
