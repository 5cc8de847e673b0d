//! Control channel for netpiped
//!
//! Provides:
//! - TCP listener serving one control session at a time
//! - The line-oriented negotiation state machine
//! - A client that drives the negotiation from the other side

mod client;
mod server;
mod session;

pub use client::*;
pub use server::*;
pub use session::*;

use netpipe_api::ProtocolError;
use thiserror::Error;

/// Transport errors on the control channel
#[derive(Debug, Error)]
pub enum IpcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Line exceeds {} bytes", netpipe_api::MAX_LINE_LEN)]
    LineTooLong,

    #[error("Unexpected line from server: {0:?}")]
    UnexpectedPrompt(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

pub type IpcResult<T> = Result<T, IpcError>;
