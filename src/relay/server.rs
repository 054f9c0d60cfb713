//! Sequential TCP accept loop.
//!
//! One client is served at a time. Each accepted connection gets a fresh
//! direction from the factory and its own relay connection; both sockets
//! are closed when the session ends, however it ends.

use crate::defaults;
use crate::error::{RelayError, Result};
use crate::pipeline::direction::Direction;
use crate::relay::connection::{RelayConnector, RelaySink};
use crate::relay::session::{Session, SessionReport};
use log::{debug, error, info, warn};
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

/// Pause after a failed accept so a persistent error does not spin.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// How a single client was handled.
#[derive(Debug)]
pub enum ClientOutcome {
    /// The session ran to the end of the inbound stream.
    Completed(SessionReport),
    /// The relay could not be opened; the client was dropped.
    RelayUnavailable,
    /// Shutdown was requested while the session was running.
    Interrupted,
}

/// Relay server for one direction.
pub struct RelayServer<C, F> {
    listen_addr: String,
    connector: C,
    factory: F,
    read_size: usize,
}

impl<C, F, D> RelayServer<C, F>
where
    C: RelayConnector,
    F: Fn() -> D + Send + Sync,
    D: Direction,
{
    /// `factory` builds the per-session direction state.
    pub fn new(listen_addr: impl Into<String>, connector: C, factory: F) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            connector,
            factory,
            read_size: defaults::READ_CHUNK_BYTES,
        }
    }

    pub fn with_read_size(mut self, read_size: usize) -> Self {
        self.read_size = read_size.max(1);
        self
    }

    pub fn listen_addr(&self) -> &str {
        &self.listen_addr
    }

    pub async fn bind(&self) -> Result<TcpListener> {
        TcpListener::bind(&self.listen_addr)
            .await
            .map_err(|e| RelayError::Bind {
                addr: self.listen_addr.clone(),
                message: e.to_string(),
            })
    }

    /// Binds and serves until `shutdown` resolves.
    pub async fn run<S>(&self, shutdown: S) -> Result<u64>
    where
        S: Future<Output = ()> + Send,
    {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Accepts clients one after another until `shutdown` resolves.
    ///
    /// Returns the number of connections accepted. Accept errors are
    /// logged and the loop resumes.
    pub async fn serve<S>(&self, listener: TcpListener, shutdown: S) -> Result<u64>
    where
        S: Future<Output = ()> + Send,
    {
        match listener.local_addr() {
            Ok(addr) => info!(
                "Listening on {}, relaying to {}",
                addr,
                self.connector.target()
            ),
            Err(e) => debug!("Listening (local address unavailable: {})", e),
        }

        tokio::pin!(shutdown);
        let mut accepted = 0u64;

        loop {
            let accept = tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting");
                    break;
                }
                accept = listener.accept() => accept,
            };

            match accept {
                Ok((stream, peer)) => {
                    accepted += 1;
                    let outcome = self.handle_client(stream, peer, shutdown.as_mut()).await;
                    if matches!(outcome, ClientOutcome::Interrupted) {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
            }
        }

        Ok(accepted)
    }

    /// Serves one client and closes both of its sockets.
    pub async fn handle_client<S>(
        &self,
        mut inbound: TcpStream,
        peer: SocketAddr,
        shutdown: Pin<&mut S>,
    ) -> ClientOutcome
    where
        S: Future<Output = ()> + Send,
    {
        info!("Connected by {}", peer);

        let mut relay = match self.connector.open().await {
            Ok(relay) => relay,
            Err(e) => {
                error!("Dropping client {}: {}", peer, e);
                close_inbound(&mut inbound, peer).await;
                return ClientOutcome::RelayUnavailable;
            }
        };

        let mut session = Session::new((self.factory)()).with_read_size(self.read_size);
        let outcome = tokio::select! {
            report = session.run(&mut inbound, &mut relay) => ClientOutcome::Completed(report),
            _ = shutdown => {
                info!("Shutdown requested, ending session with {}", peer);
                ClientOutcome::Interrupted
            }
        };

        if let Err(e) = relay.close().await {
            warn!("Failed to close relay for {}: {}", peer, e);
        }
        close_inbound(&mut inbound, peer).await;
        info!("Disconnected {}", peer);

        outcome
    }
}

async fn close_inbound(inbound: &mut TcpStream, peer: SocketAddr) {
    if let Err(e) = inbound.shutdown().await {
        debug!("Inbound {} already closed: {}", peer, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::packetizer::{AudioPacketizer, PacketizerConfig};
    use crate::inference::classifier::MockClassifier;
    use crate::inference::synthesizer::MockSynthesizer;
    use crate::pipeline::gesture::{GestureServices, GestureSettings, GestureToSpeech};
    use crate::relay::connection::MemoryConnector;
    use crate::streaming::frame::encode_jpeg;
    use image::{Rgb, RgbImage};
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;
    use tokio::sync::oneshot;

    fn gesture_services(label: &str) -> Arc<GestureServices> {
        Arc::new(GestureServices {
            classifier: Arc::new(MockClassifier::new(label)),
            synthesizer: Arc::new(MockSynthesizer::new()),
            packetizer: AudioPacketizer::new(PacketizerConfig::default()).unwrap(),
            settings: GestureSettings::default(),
        })
    }

    fn mjpeg(frames: usize) -> Vec<u8> {
        encode_jpeg(&RgbImage::from_pixel(16, 16, Rgb([0, 0, 255])), 80)
            .unwrap()
            .repeat(frames)
    }

    /// Sends `data`, half-closes, and waits for the server to hang up.
    async fn send_session(addr: SocketAddr, data: &[u8]) {
        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(data).await.unwrap();
        client.shutdown().await.unwrap();
        let mut rest = Vec::new();
        // Ok(0) or a reset both mean the server closed its side
        client.read_to_end(&mut rest).await.ok();
    }

    #[tokio::test]
    async fn test_sessions_get_fresh_state_and_relays() {
        let connector = MemoryConnector::new();
        let log = connector.log();
        let services = gesture_services("ciao");
        let server = RelayServer::new("127.0.0.1:0", connector, move || {
            GestureToSpeech::new(Arc::clone(&services))
        });
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            server
                .serve(listener, async move {
                    rx.await.ok();
                })
                .await
        });

        send_session(addr, &mjpeg(5)).await;
        send_session(addr, &mjpeg(5)).await;
        tx.send(()).unwrap();
        let accepted = handle.await.unwrap().unwrap();

        assert_eq!(accepted, 2);
        let log = log.lock().unwrap();
        assert_eq!((log.opened, log.closed), (2, 2));
        // The same label is emitted once per session
        assert_eq!(log.writes.len(), 6);
    }

    #[tokio::test]
    async fn test_relay_refusal_drops_client_and_keeps_accepting() {
        let services = gesture_services("x");
        let server = RelayServer::new("127.0.0.1:0", MemoryConnector::new().refusing(), move || {
            GestureToSpeech::new(Arc::clone(&services))
        });
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            server
                .serve(listener, async move {
                    rx.await.ok();
                })
                .await
        });

        send_session(addr, b"").await;
        send_session(addr, b"").await;
        tx.send(()).unwrap();

        assert_eq!(handle.await.unwrap().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_stalled_session() {
        let connector = MemoryConnector::new();
        let log = connector.log();
        let services = gesture_services("x");
        let server = RelayServer::new("127.0.0.1:0", connector, move || {
            GestureToSpeech::new(Arc::clone(&services))
        });
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            server
                .serve(listener, async move {
                    rx.await.ok();
                })
                .await
        });

        // Connected but silent: the session blocks on its first read
        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&[0xFF]).await.unwrap();
        while log.lock().unwrap().opened == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tx.send(()).unwrap();

        assert_eq!(handle.await.unwrap().unwrap(), 1);
        assert_eq!(log.lock().unwrap().closed, 1);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_slow_inference() {
        let classifier = Arc::new(MockClassifier::new("x").with_delay(Duration::from_secs(2)));
        let services = Arc::new(GestureServices {
            classifier: classifier.clone(),
            synthesizer: Arc::new(MockSynthesizer::new()),
            packetizer: AudioPacketizer::new(PacketizerConfig::default()).unwrap(),
            settings: GestureSettings {
                stride: 1,
                ..GestureSettings::default()
            },
        });
        let connector = MemoryConnector::new();
        let log = connector.log();
        let server = RelayServer::new("127.0.0.1:0", connector, move || {
            GestureToSpeech::new(Arc::clone(&services))
        });
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            server
                .serve(listener, async move {
                    rx.await.ok();
                })
                .await
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&mjpeg(1)).await.unwrap();
        while classifier.calls().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let signalled = std::time::Instant::now();
        tx.send(()).unwrap();
        assert_eq!(handle.await.unwrap().unwrap(), 1);

        assert!(
            signalled.elapsed() < Duration::from_secs(1),
            "shutdown waited {:?} for the classifier",
            signalled.elapsed()
        );
        assert_eq!(log.lock().unwrap().closed, 1);
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap().to_string();
        let services = gesture_services("x");
        let server = RelayServer::new(addr, MemoryConnector::new(), move || {
            GestureToSpeech::new(Arc::clone(&services))
        });

        assert!(matches!(server.bind().await, Err(RelayError::Bind { .. })));
    }
}
