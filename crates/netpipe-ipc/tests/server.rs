//! Control server tests over real TCP connections

use netpipe_api::{Launcher, Role};
use netpipe_config::ServerConfig;
use netpipe_ipc::{ControlClient, ControlServer};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Records launches; can be made to fail or to block until released
#[derive(Default)]
struct RecordingLauncher {
    calls: Mutex<Vec<(Role, Vec<String>)>>,
    entered: AtomicUsize,
    fail: AtomicBool,
    gate: Mutex<Option<mpsc::Receiver<()>>>,
}

impl RecordingLauncher {
    fn calls(&self) -> Vec<(Role, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    fn gated(&self) -> mpsc::Sender<()> {
        let (tx, rx) = mpsc::channel();
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }
}

impl Launcher for RecordingLauncher {
    type Error = std::io::Error;

    fn launch(&self, role: Role, argv: Vec<String>) -> Result<u32, Self::Error> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = self.gate.lock().unwrap().take() {
            let _ = gate.recv();
        }

        self.calls.lock().unwrap().push((role, argv));

        if self.fail.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("launch refused"));
        }
        Ok(4242)
    }
}

async fn start(launcher: Arc<RecordingLauncher>) -> SocketAddr {
    let config = ServerConfig {
        bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        bind_port: 0,
        backlog: 1,
    };
    let server = ControlServer::bind(&config).await.unwrap();
    let addr = server.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = server.run(launcher).await;
    });

    addr
}

async fn wait_for_calls(launcher: &RecordingLauncher, n: usize) -> Vec<(Role, Vec<String>)> {
    tokio::time::timeout(TIMEOUT, async {
        loop {
            let calls = launcher.calls();
            if calls.len() >= n {
                return calls;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("launcher was not called")
}

fn argv(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

/// Speaks the protocol by hand
struct RawClient {
    stream: BufReader<TcpStream>,
}

impl RawClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        Self {
            stream: BufReader::new(stream),
        }
    }

    async fn line(&mut self) -> String {
        let mut line = String::new();
        tokio::time::timeout(TIMEOUT, self.stream.read_line(&mut line))
            .await
            .expect("no line from server")
            .unwrap();
        line
    }

    async fn send(&mut self, line: &str) {
        self.stream.get_mut().write_all(line.as_bytes()).await.unwrap();
    }

    async fn expect_closed(&mut self) {
        let mut rest = Vec::new();
        tokio::time::timeout(TIMEOUT, self.stream.read_to_end(&mut rest))
            .await
            .expect("server kept the connection open")
            .unwrap();
        assert!(rest.is_empty(), "unexpected trailing data: {rest:?}");
    }
}

#[tokio::test]
async fn client_request_launches_writer() {
    let launcher = Arc::new(RecordingLauncher::default());
    let addr = start(launcher.clone()).await;

    let client = ControlClient::connect(addr).await.unwrap();
    assert!(client.banner().starts_with("netpipe "));
    client
        .request(Role::Writer, &argv("cat /tmp/source"))
        .await
        .unwrap();

    let calls = wait_for_calls(&launcher, 1).await;
    assert_eq!(calls, vec![(Role::Writer, argv("cat /tmp/source"))]);
}

#[tokio::test]
async fn raw_protocol_transcript() {
    let launcher = Arc::new(RecordingLauncher::default());
    let addr = start(launcher.clone()).await;

    let mut raw = RawClient::connect(addr).await;
    assert!(raw.line().await.starts_with("netpipe "));
    assert_eq!(raw.line().await, "which prog?\n");
    raw.send("reader\n").await;
    assert_eq!(raw.line().await, "what args?\n");
    raw.send("tee  /tmp/copy\n").await;
    raw.expect_closed().await;

    let calls = wait_for_calls(&launcher, 1).await;
    assert_eq!(calls, vec![(Role::Reader, argv("tee /tmp/copy"))]);
}

#[tokio::test]
async fn unknown_role_reprompts_without_launch() {
    let launcher = Arc::new(RecordingLauncher::default());
    let addr = start(launcher.clone()).await;

    let mut raw = RawClient::connect(addr).await;
    raw.line().await;
    assert_eq!(raw.line().await, "which prog?\n");
    raw.send("sideways\n").await;
    assert_eq!(raw.line().await, "which prog?\n");
    drop(raw);

    ControlClient::connect(addr)
        .await
        .unwrap()
        .request(Role::Reader, &argv("wc -c"))
        .await
        .unwrap();

    let calls = wait_for_calls(&launcher, 1).await;
    assert_eq!(calls, vec![(Role::Reader, argv("wc -c"))]);
}

#[tokio::test]
async fn empty_args_reprompt_without_launch() {
    let launcher = Arc::new(RecordingLauncher::default());
    let addr = start(launcher.clone()).await;

    let mut raw = RawClient::connect(addr).await;
    raw.line().await;
    raw.line().await;
    raw.send("in\n").await;
    assert_eq!(raw.line().await, "what args?\n");
    raw.send("\n").await;
    assert_eq!(raw.line().await, "what args?\n");
    raw.send(" \t \n").await;
    assert_eq!(raw.line().await, "what args?\n");
    drop(raw);

    ControlClient::connect(addr)
        .await
        .unwrap()
        .request(Role::Writer, &argv("yes"))
        .await
        .unwrap();

    let calls = wait_for_calls(&launcher, 1).await;
    assert_eq!(calls, vec![(Role::Writer, argv("yes"))]);
}

#[tokio::test]
async fn socket_closed_before_launch() {
    let launcher = Arc::new(RecordingLauncher::default());
    let release = launcher.gated();
    let addr = start(launcher.clone()).await;

    let client = ControlClient::connect(addr).await.unwrap();

    // The launcher stays blocked until released, so the client can only see
    // the close if it happened before the launch.
    tokio::time::timeout(TIMEOUT, client.request(Role::Writer, &argv("cat")))
        .await
        .expect("connection was not closed before launch")
        .unwrap();
    assert!(launcher.calls().is_empty());

    release.send(()).unwrap();
    let calls = wait_for_calls(&launcher, 1).await;
    assert_eq!(calls, vec![(Role::Writer, argv("cat"))]);
}

#[tokio::test]
async fn disconnect_mid_negotiation_then_next_client() {
    let launcher = Arc::new(RecordingLauncher::default());
    let addr = start(launcher.clone()).await;

    let mut raw = RawClient::connect(addr).await;
    raw.line().await;
    raw.line().await;
    raw.send("out\n").await;
    assert_eq!(raw.line().await, "what args?\n");
    drop(raw);

    let client = tokio::time::timeout(TIMEOUT, ControlClient::connect(addr))
        .await
        .expect("next client was not accepted")
        .unwrap();
    client.request(Role::Reader, &argv("cat")).await.unwrap();

    let calls = wait_for_calls(&launcher, 1).await;
    assert_eq!(calls, vec![(Role::Reader, argv("cat"))]);
    assert_eq!(launcher.entered.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn second_client_waits_for_current_session() {
    let launcher = Arc::new(RecordingLauncher::default());
    let addr = start(launcher.clone()).await;

    let mut first = RawClient::connect(addr).await;
    assert!(first.line().await.starts_with("netpipe "));

    // Completes the TCP handshake from the backlog, but is not served yet
    let mut second = RawClient::connect(addr).await;
    let mut line = String::new();
    let waited = tokio::time::timeout(
        Duration::from_millis(200),
        second.stream.read_line(&mut line),
    )
    .await;
    assert!(waited.is_err(), "second client served concurrently: {line:?}");

    first.line().await;
    first.send("out\n").await;
    first.line().await;
    first.send("true\n").await;
    first.expect_closed().await;

    assert!(line.is_empty());
    assert!(second.line().await.starts_with("netpipe "));
    assert_eq!(second.line().await, "which prog?\n");
}

#[tokio::test]
async fn launch_failure_keeps_serving() {
    let launcher = Arc::new(RecordingLauncher::default());
    launcher.fail.store(true, Ordering::SeqCst);
    let addr = start(launcher.clone()).await;

    ControlClient::connect(addr)
        .await
        .unwrap()
        .request(Role::Writer, &argv("false"))
        .await
        .unwrap();
    wait_for_calls(&launcher, 1).await;

    launcher.fail.store(false, Ordering::SeqCst);
    ControlClient::connect(addr)
        .await
        .unwrap()
        .request(Role::Writer, &argv("true"))
        .await
        .unwrap();

    let calls = wait_for_calls(&launcher, 2).await;
    assert_eq!(
        calls,
        vec![(Role::Writer, argv("false")), (Role::Writer, argv("true"))]
    );
}

#[tokio::test]
async fn client_rejects_empty_argv() {
    let launcher = Arc::new(RecordingLauncher::default());
    let addr = start(launcher.clone()).await;

    let client = ControlClient::connect(addr).await.unwrap();
    assert!(client.request(Role::Writer, &[]).await.is_err());
}
