//! Control session state machine
//!
//! ```text
//! AwaitRole --valid keyword--> AwaitArgs --non-empty argv--> Dispatch
//!     ^  |                       ^  |
//!     +--+ unknown keyword       +--+ empty line
//! ```
//!
//! Any read or write failure aborts the session. On dispatch the connection is
//! dropped before the outcome is handed back, so the launched child can never
//! inherit it and the client sees the close before anything is spawned.

use netpipe_api::{parse_argv, parse_role, Role, ASK_ARGS, ASK_ROLE, MAX_LINE_LEN};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::debug;

use crate::{IpcError, IpcResult};

/// Where the negotiation stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitRole,
    AwaitArgs(Role),
}

/// Result of one control session. The connection is closed in both cases.
#[derive(Debug)]
pub enum SessionOutcome {
    Dispatch { role: Role, argv: Vec<String> },
    Aborted(IpcError),
}

/// One client's run through the negotiation
pub struct ControlSession<S> {
    stream: BufReader<S>,
    state: SessionState,
}

impl<S: AsyncRead + AsyncWrite + Unpin> ControlSession<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
            state: SessionState::AwaitRole,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Negotiate to completion, then close the connection.
    pub async fn run(mut self) -> SessionOutcome {
        let result = self.negotiate().await;

        // Closed here, before the caller gets a chance to launch anything
        drop(self.stream);

        match result {
            Ok((role, argv)) => SessionOutcome::Dispatch { role, argv },
            Err(e) => SessionOutcome::Aborted(e),
        }
    }

    async fn negotiate(&mut self) -> IpcResult<(Role, Vec<String>)> {
        loop {
            match self.state {
                SessionState::AwaitRole => {
                    self.send(ASK_ROLE).await?;
                    let line = self.read_line().await?;
                    match parse_role(&line) {
                        Ok(role) => self.state = SessionState::AwaitArgs(role),
                        Err(e) => debug!(error = %e, "Re-prompting for role"),
                    }
                }
                SessionState::AwaitArgs(role) => {
                    self.send(ASK_ARGS).await?;
                    let line = self.read_line().await?;
                    match parse_argv(&line) {
                        Ok(argv) => return Ok((role, argv)),
                        Err(e) => debug!(role = %role, error = %e, "Re-prompting for args"),
                    }
                }
            }
        }
    }

    async fn send(&mut self, msg: &str) -> IpcResult<()> {
        self.stream.write_all(msg.as_bytes()).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read one `\n`-terminated line, delimiter included
    async fn read_line(&mut self) -> IpcResult<String> {
        let mut buf = Vec::new();
        let n = (&mut self.stream)
            .take(MAX_LINE_LEN as u64)
            .read_until(b'\n', &mut buf)
            .await?;

        if n == 0 {
            return Err(IpcError::ConnectionClosed);
        }

        if buf.last() != Some(&b'\n') {
            return Err(if buf.len() >= MAX_LINE_LEN {
                IpcError::LineTooLong
            } else {
                IpcError::ConnectionClosed
            });
        }

        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
