//! Control client implementation

use netpipe_api::{format_argv, strip_delimiter, ProtocolError, Role, ASK_ARGS, ASK_ROLE};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::{IpcError, IpcResult};

/// Client for requesting a launch from netpiped
pub struct ControlClient {
    stream: BufReader<TcpStream>,
    banner: String,
}

impl ControlClient {
    /// Connect and read the banner
    pub async fn connect(addr: impl ToSocketAddrs) -> IpcResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        let mut stream = BufReader::new(stream);

        let banner = read_line(&mut stream).await?;

        Ok(Self {
            stream,
            banner: strip_delimiter(&banner).to_string(),
        })
    }

    /// Banner sent by the server, without its line delimiter
    pub fn banner(&self) -> &str {
        &self.banner
    }

    /// Ask the server to (re)launch `role` with `argv`.
    ///
    /// Completes when the server closes the connection, which it does before
    /// starting the child.
    pub async fn request(mut self, role: Role, argv: &[String]) -> IpcResult<()> {
        if argv.is_empty() {
            return Err(ProtocolError::EmptyArgs.into());
        }

        self.expect(ASK_ROLE).await?;
        self.send(&format!("{}\n", role.keyword())).await?;

        self.expect(ASK_ARGS).await?;
        self.send(&format_argv(argv)).await?;

        let mut line = String::new();
        match self.stream.read_line(&mut line).await? {
            0 => Ok(()),
            _ => Err(IpcError::UnexpectedPrompt(line)),
        }
    }

    async fn expect(&mut self, prompt: &str) -> IpcResult<()> {
        let line = read_line(&mut self.stream).await?;
        if line != prompt {
            return Err(IpcError::UnexpectedPrompt(line));
        }
        Ok(())
    }

    async fn send(&mut self, line: &str) -> IpcResult<()> {
        self.stream.get_mut().write_all(line.as_bytes()).await?;
        Ok(())
    }
}

async fn read_line(stream: &mut BufReader<TcpStream>) -> IpcResult<String> {
    let mut line = String::new();
    if stream.read_line(&mut line).await? == 0 {
        return Err(IpcError::ConnectionClosed);
    }
    Ok(line)
}

