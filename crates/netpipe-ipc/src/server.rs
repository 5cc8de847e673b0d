//! Control listener
//!
//! Accepts control connections one at a time. A second client waits in the
//! listen backlog until the current session (and any launch it triggered) has
//! finished.

use netpipe_api::{banner, Launcher, Role};
use netpipe_config::ServerConfig;
use std::net::SocketAddr;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::{debug, error, info, warn};

use crate::{ControlSession, IpcError, IpcResult, SessionOutcome};

/// Pause after an accept error that will not clear by itself (fd or memory
/// exhaustion), so the loop does not spin
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// TCP control server
pub struct ControlServer {
    listener: TcpListener,
}

impl ControlServer {
    /// Bind and listen with the configured backlog.
    ///
    /// Sets `SO_REUSEADDR` so a restarted daemon can rebind at once.
    pub async fn bind(config: &ServerConfig) -> IpcResult<Self> {
        let addr = config.socket_addr();

        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(config.backlog)?;

        info!(
            addr = %listener.local_addr()?,
            backlog = config.backlog,
            "Control server listening"
        );

        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> IpcResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and serve connections forever
    pub async fn run<L: Launcher>(&self, launcher: Arc<L>) -> IpcResult<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    info!(peer = %peer, "Client connected");
                    self.serve_connection(stream, peer, &launcher).await;
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    let delay = accept_retry_delay(&e);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    /// Run one session to completion, then launch if it negotiated a request
    async fn serve_connection<L: Launcher>(
        &self,
        mut stream: TcpStream,
        peer: SocketAddr,
        launcher: &Arc<L>,
    ) {
        if let Err(e) = stream.write_all(banner().as_bytes()).await {
            debug!(peer = %peer, error = %e, "Failed to send banner");
            return;
        }

        match ControlSession::new(stream).run().await {
            SessionOutcome::Dispatch { role, argv } => {
                info!(peer = %peer, role = %role, argv = ?argv, "Request negotiated, connection closed");
                launch(launcher, role, argv).await;
            }
            SessionOutcome::Aborted(IpcError::ConnectionClosed) => {
                debug!(peer = %peer, "Client disconnected before completing a request");
            }
            SessionOutcome::Aborted(e) => {
                warn!(peer = %peer, error = %e, "Session aborted");
            }
        }
    }
}

/// How long to wait before accepting again after `e`.
///
/// A connection that died in the backlog only affects that client, so the
/// next accept can follow at once.
fn accept_retry_delay(e: &std::io::Error) -> Duration {
    match e.kind() {
        ErrorKind::ConnectionAborted
        | ErrorKind::ConnectionReset
        | ErrorKind::Interrupted
        | ErrorKind::WouldBlock => Duration::ZERO,
        _ => ACCEPT_BACKOFF,
    }
}

/// Run a launch on the blocking pool and wait for it.
///
/// The launch may sleep through a replace grace interval; awaiting it keeps
/// the next session from starting before the launch is done.
async fn launch<L: Launcher>(launcher: &Arc<L>, role: Role, argv: Vec<String>) {
    let launcher = launcher.clone();

    match tokio::task::spawn_blocking(move || launcher.launch(role, argv)).await {
        Ok(Ok(pid)) => debug!(role = %role, pid = pid, "Launch initiated"),
        Ok(Err(e)) => error!(role = %role, error = %e, "Launch failed"),
        Err(e) => error!(role = %role, error = %e, "Launch task failed"),
    }
}
