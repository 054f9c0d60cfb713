//! Outbound connection to the downstream muxing process.
//!
//! One connection per client session: opened when the session starts,
//! closed when it ends. Writes are best effort; a failed write is reported
//! to the caller and nothing is retried or reconnected.

use crate::error::{Result, RelayError};
use log::{debug, info, warn};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Byte sink on the downstream side of a session.
#[async_trait::async_trait]
pub trait RelaySink: Send {
    /// Writes all of `bytes`.
    ///
    /// Errors are `RelayError::RelayWrite` (or `RelayClosed`) and are
    /// recoverable for the session.
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Tears the connection down. Safe to call more than once.
    async fn close(&mut self) -> Result<()>;

    /// Whether the connection is still open.
    fn is_connected(&self) -> bool;
}

/// Opens one relay connection per session.
#[async_trait::async_trait]
pub trait RelayConnector: Send + Sync {
    type Sink: RelaySink;

    async fn open(&self) -> Result<Self::Sink>;

    /// Human-readable target, for logs.
    fn target(&self) -> String;
}

/// TCP relay connection.
#[derive(Debug)]
pub struct RelayConnection {
    addr: String,
    stream: Option<TcpStream>,
    bytes_sent: u64,
}

impl RelayConnection {
    /// Connects to `host:port`.
    pub async fn open(host: &str, port: u16) -> Result<Self> {
        let addr = format!("{}:{}", host, port);
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| RelayError::RelayConnect {
                addr: addr.clone(),
                message: e.to_string(),
            })?;
        // Small PCM/JPEG writes should leave immediately.
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY on relay {}: {}", addr, e);
        }
        info!("Opened relay connection to {}", addr);
        Ok(Self {
            addr,
            stream: Some(stream),
            bytes_sent: 0,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }
}

#[async_trait::async_trait]
impl RelaySink for RelayConnection {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(RelayError::RelayClosed)?;
        stream
            .write_all(bytes)
            .await
            .map_err(|e| RelayError::RelayWrite {
                message: format!("{} ({:?})", e, e.kind()),
            })?;
        self.bytes_sent += bytes.len() as u64;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                // Peer already gone; dropping the stream closes the socket.
                warn!("Relay {} shutdown: {}", self.addr, e);
            }
            info!(
                "Closed relay connection to {} ({} bytes sent)",
                self.addr, self.bytes_sent
            );
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

/// Connector for a fixed TCP endpoint.
#[derive(Debug, Clone)]
pub struct TcpRelayConnector {
    host: String,
    port: u16,
}

impl TcpRelayConnector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

#[async_trait::async_trait]
impl RelayConnector for TcpRelayConnector {
    type Sink = RelayConnection;

    async fn open(&self) -> Result<RelayConnection> {
        RelayConnection::open(&self.host, self.port).await
    }

    fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Shared record of what a [`MemoryRelay`] received.
#[derive(Debug, Default)]
pub struct RelayLog {
    /// Every successful write, in order.
    pub writes: Vec<Vec<u8>>,
    /// Number of failed writes.
    pub failed_writes: usize,
    /// Connections opened / closed.
    pub opened: usize,
    pub closed: usize,
}

impl RelayLog {
    /// All successfully written bytes, concatenated.
    pub fn bytes(&self) -> Vec<u8> {
        self.writes.concat()
    }
}

/// In-memory relay for testing.
///
/// Records writes into a shared [`RelayLog`] and can be told to fail
/// specific writes, the way a reset peer would.
#[derive(Debug, Clone)]
pub struct MemoryRelay {
    log: Arc<Mutex<RelayLog>>,
    fail_writes: Vec<usize>,
    write_index: usize,
    connected: bool,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::with_log(Arc::new(Mutex::new(RelayLog::default())))
    }

    pub fn with_log(log: Arc<Mutex<RelayLog>>) -> Self {
        if let Ok(mut log) = log.lock() {
            log.opened += 1;
        }
        Self {
            log,
            fail_writes: Vec::new(),
            write_index: 0,
            connected: true,
        }
    }

    /// Fails the writes at these zero-based indices with a reset error.
    pub fn with_failing_writes(mut self, indices: Vec<usize>) -> Self {
        self.fail_writes = indices;
        self
    }

    pub fn log(&self) -> Arc<Mutex<RelayLog>> {
        Arc::clone(&self.log)
    }
}

impl Default for MemoryRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RelaySink for MemoryRelay {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(RelayError::RelayClosed);
        }
        let index = self.write_index;
        self.write_index += 1;
        let mut log = self
            .log
            .lock()
            .map_err(|e| RelayError::Other(format!("relay log poisoned: {}", e)))?;
        if self.fail_writes.contains(&index) {
            log.failed_writes += 1;
            return Err(RelayError::RelayWrite {
                message: "Connection reset by peer (ConnectionReset)".to_string(),
            });
        }
        log.writes.push(bytes.to_vec());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.connected {
            self.connected = false;
            if let Ok(mut log) = self.log.lock() {
                log.closed += 1;
            }
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Connector handing out [`MemoryRelay`]s that share one log.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    log: Arc<Mutex<RelayLog>>,
    fail_writes: Vec<usize>,
    refuse: bool,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every relay opened fails writes at these indices.
    pub fn with_failing_writes(mut self, indices: Vec<usize>) -> Self {
        self.fail_writes = indices;
        self
    }

    /// Refuse every connection attempt.
    pub fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }

    pub fn log(&self) -> Arc<Mutex<RelayLog>> {
        Arc::clone(&self.log)
    }
}

#[async_trait::async_trait]
impl RelayConnector for MemoryConnector {
    type Sink = MemoryRelay;

    async fn open(&self) -> Result<MemoryRelay> {
        if self.refuse {
            return Err(RelayError::RelayConnect {
                addr: self.target(),
                message: "connection refused".to_string(),
            });
        }
        Ok(MemoryRelay::with_log(self.log()).with_failing_writes(self.fail_writes.clone()))
    }

    fn target(&self) -> String {
        "memory".to_string()
    }
}
