//! Robustness tests for the control server.
//!
//! Malformed input, out-of-order commands, oversized lines and connection
//! churn must never take the server down or corrupt the roster.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use memd::config::ServerConfig;
use memd::registry::{spawn_registry, RegistryHandle};
use memd::server::MemberServer;
use memd::shutdown::ShutdownCoordinator;
use memd_protocol::{DaemonMessage, MAX_LINE_LENGTH};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(5);

// ============================================================================
// Test Helpers
// ============================================================================

struct TestServer {
    addr: SocketAddr,
    registry: RegistryHandle,
    coordinator: ShutdownCoordinator,
    task: JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let config = ServerConfig::new(0)
            .with_bind_addr(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .with_shutdown_grace(Duration::from_millis(20));

        let registry = spawn_registry();
        let coordinator = ShutdownCoordinator::new(config.shutdown_grace);
        let server = MemberServer::bind(&config, registry.clone(), coordinator.clone())
            .await
            .expect("bind server");
        let addr = server.local_addr().expect("local addr");

        let task = tokio::spawn(async move {
            server.run().await.expect("server run");
        });

        TestServer {
            addr,
            registry,
            coordinator,
            task,
        }
    }

    async fn connect(&self) -> TestClient {
        TestClient::new(TcpStream::connect(self.addr).await.expect("connect"))
    }

    async fn wait_for_roster_len(&self, expected: usize) {
        let start = tokio::time::Instant::now();
        while self.registry.len().await != expected {
            assert!(start.elapsed() < WAIT, "roster did not reach {expected} members");
            sleep(Duration::from_millis(10)).await;
        }
    }

    async fn shutdown(self) {
        self.coordinator.shutdown().await;
        timeout(WAIT, self.task)
            .await
            .expect("server stopped in time")
            .expect("server task");
    }
}

struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Registers with an unused notification port on loopback.
    async fn helo(&mut self, name: &str) {
        self.send_raw(format!("HELO {name} 127.0.0.1 9\n").as_bytes()).await;
    }

    async fn recv(&mut self) -> DaemonMessage {
        let mut line = String::new();
        timeout(WAIT, self.reader.read_line(&mut line))
            .await
            .expect("reply within timeout")
            .unwrap();
        line.parse().expect("valid reply")
    }

    /// True once the server has closed the connection, by FIN or reset.
    async fn is_closed(&mut self) -> bool {
        let mut line = String::new();
        match timeout(WAIT, self.reader.read_line(&mut line)).await {
            Ok(Ok(0)) | Ok(Err(_)) => true,
            Ok(Ok(_)) | Err(_) => false,
        }
    }

    /// True if nothing arrives within a short window.
    async fn is_silent(&mut self) -> bool {
        let mut line = String::new();
        timeout(Duration::from_millis(100), self.reader.read_line(&mut line))
            .await
            .is_err()
    }
}

// ============================================================================
// Malformed Input Tests
// ============================================================================

#[tokio::test]
async fn test_empty_and_garbage_lines_ignored() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.send_raw(b"\n\n   \n").await;
    client.send_raw(b"helo alice 127.0.0.1 9\n").await;
    client.send_raw(b"HELO alice 127.0.0.1 9 extra\n").await;
    client.send_raw(b"HELO alice 127.0.0.1 0\n").await;
    assert!(client.is_silent().await);

    client.helo("alice").await;
    assert!(matches!(client.recv().await, DaemonMessage::Accept { .. }));

    server.shutdown().await;
}

#[tokio::test]
async fn test_crlf_line_endings_accepted() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.send_raw(b"HELO alice 127.0.0.1 9\r\n").await;
    assert!(matches!(client.recv().await, DaemonMessage::Accept { .. }));

    client.send_raw(b"EXIT\r\n").await;
    assert!(client.is_closed().await);
    server.wait_for_roster_len(0).await;

    server.shutdown().await;
}

// ============================================================================
// Out-of-Order Command Tests
// ============================================================================

#[tokio::test]
async fn test_exit_before_helo_ignored() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.send_raw(b"EXIT\n").await;
    assert!(client.is_silent().await);

    client.helo("alice").await;
    assert!(matches!(client.recv().await, DaemonMessage::Accept { .. }));

    server.shutdown().await;
}

#[tokio::test]
async fn test_second_helo_ignored() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.helo("alice").await;
    assert!(matches!(client.recv().await, DaemonMessage::Accept { .. }));

    client.helo("alias").await;
    assert!(client.is_silent().await);

    let roster = server.registry.snapshot().await;
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].screen_name(), "alice");

    client.send_raw(b"EXIT\n").await;
    assert!(client.is_closed().await);

    server.shutdown().await;
}

// ============================================================================
// Message Size Limit Tests
// ============================================================================

#[tokio::test]
async fn test_oversized_line_closes_connection() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    let oversized = "x".repeat(MAX_LINE_LENGTH * 2);
    client.send_raw(oversized.as_bytes()).await;
    assert!(client.is_closed().await);

    // Server should still accept new connections
    let mut client2 = server.connect().await;
    client2.helo("bob").await;
    assert!(matches!(client2.recv().await, DaemonMessage::Accept { .. }));

    server.shutdown().await;
}

#[tokio::test]
async fn test_oversized_line_from_member_removes_it() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.helo("alice").await;
    assert!(matches!(client.recv().await, DaemonMessage::Accept { .. }));

    let oversized = "x".repeat(MAX_LINE_LENGTH + 10);
    client.send_raw(oversized.as_bytes()).await;
    assert!(client.is_closed().await);

    server.wait_for_roster_len(0).await;
    server.shutdown().await;
}

// ============================================================================
// Connection Churn Tests
// ============================================================================

#[tokio::test]
async fn test_rapid_connect_disconnect() {
    let server = TestServer::spawn().await;

    for i in 0..20 {
        let mut client = server.connect().await;
        client.helo(&format!("rapid{i}")).await;
        let _ = client.recv().await;
        client.send_raw(b"EXIT\n").await;
        // Don't wait, just move on
    }

    server.wait_for_roster_len(0).await;

    let mut last = server.connect().await;
    last.helo("rapid0").await;
    assert!(matches!(last.recv().await, DaemonMessage::Accept { .. }));

    server.shutdown().await;
}

#[tokio::test]
async fn test_many_concurrent_registrations() {
    let server = TestServer::spawn().await;

    let mut handles = Vec::new();
    for i in 0..20 {
        let addr = server.addr;
        handles.push(tokio::spawn(async move {
            let mut client = TestClient::new(TcpStream::connect(addr).await.unwrap());
            let screen_name = format!("user{i}");
            client.helo(&screen_name).await;
            match client.recv().await {
                DaemonMessage::Accept { roster } => {
                    assert!(roster.iter().any(|e| e.screen_name == screen_name.as_str()));
                }
                other => panic!("Expected Accept, got {other:?}"),
            }
            client
        }));
    }

    let mut clients = Vec::new();
    for handle in handles {
        clients.push(handle.await.expect("concurrent registration should succeed"));
    }
    assert_eq!(server.registry.len().await, 20);

    drop(clients);
    server.wait_for_roster_len(0).await;

    server.shutdown().await;
}
