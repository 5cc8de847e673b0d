//! Control protocol framing
//!
//! The protocol is plain text, one `\n`-terminated line per message:
//!
//! ```text
//! S: <banner>
//! S: which prog?
//! C: out | writer | in | reader
//! S: what args?
//! C: argv0 argv1 ...
//! (server closes the connection and launches)
//! ```

use thiserror::Error;

use crate::Role;

/// Prompt asking which role to launch
pub const ASK_ROLE: &str = "which prog?\n";

/// Prompt asking for the command line
pub const ASK_ARGS: &str = "what args?\n";

/// Longest accepted control line, delimiter included
pub const MAX_LINE_LEN: usize = 1024;

/// Default TCP port for the control listener
pub const DEFAULT_PORT: u16 = 30000;

/// Banner line sent when a control connection is accepted
pub fn banner() -> String {
    format!("netpipe {}\n", env!("CARGO_PKG_VERSION"))
}

/// Recoverable protocol errors; the session re-prompts on these
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Unknown role keyword: {0:?}")]
    UnknownRole(String),

    #[error("Empty argument line")]
    EmptyArgs,
}

/// Strip the line delimiter (`\n` or `\r\n`) from a received line
pub fn strip_delimiter(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Parse an answer to [`ASK_ROLE`]
pub fn parse_role(line: &str) -> Result<Role, ProtocolError> {
    let line = strip_delimiter(line);
    Role::from_keyword(line).ok_or_else(|| ProtocolError::UnknownRole(line.to_string()))
}

/// Parse an answer to [`ASK_ARGS`] into an argv.
///
/// Tokens are separated by any run of whitespace.
pub fn parse_argv(line: &str) -> Result<Vec<String>, ProtocolError> {
    let argv: Vec<String> = strip_delimiter(line)
        .split_whitespace()
        .map(str::to_string)
        .collect();

    if argv.is_empty() {
        return Err(ProtocolError::EmptyArgs);
    }

    Ok(argv)
}

/// Render an argv as an answer line for [`ASK_ARGS`]
pub fn format_argv(argv: &[String]) -> String {
    let mut line = argv.join(" ");
    line.push('\n');
    line
}
