//! Protocol types for the netpipe control channel
//!
//! This crate defines:
//! - The two child roles (writer, reader) and their keywords
//! - The line-oriented prompts exchanged with control clients
//! - Argument line tokenizing
//! - The launcher seam between the listener and the process supervisor

mod protocol;
mod types;

pub use protocol::*;
pub use types::*;
