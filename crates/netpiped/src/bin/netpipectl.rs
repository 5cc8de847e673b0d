//! netpipectl - ask a running netpiped to (re)launch the writer or reader

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use netpipe_api::Role;
use netpipe_ipc::ControlClient;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleArg {
    #[value(alias = "out")]
    Writer,
    #[value(alias = "in")]
    Reader,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Writer => Role::Writer,
            RoleArg::Reader => Role::Reader,
        }
    }
}

/// netpipectl - request a launch from netpiped
#[derive(Parser, Debug)]
#[command(name = "netpipectl", version)]
#[command(about = "Ask netpiped to (re)launch the writer or reader", long_about = None)]
struct Args {
    /// Daemon control address
    #[arg(short, long, env = "NETPIPE_ADDR", default_value = "127.0.0.1:30000")]
    addr: String,

    /// Log level
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Which child to launch
    role: RoleArg,

    /// Command line for the child
    #[arg(last = true, required = true)]
    argv: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let client = ControlClient::connect(&args.addr)
        .await
        .with_context(|| format!("Failed to connect to {}", args.addr))?;
    debug!(banner = client.banner(), "Connected");

    let role = Role::from(args.role);
    client
        .request(role, &args.argv)
        .await
        .context("Launch request failed")?;

    info!(role = %role, argv = ?args.argv, "Launch requested");
    println!("{role} launch requested");

    Ok(())
}
