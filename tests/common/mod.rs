//! Shared harness: a downstream muxer on a local port and a client that
//! streams one session.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Accepts `sessions` relay connections one after another and returns the
/// bytes received on each.
pub async fn spawn_muxer(sessions: usize) -> (u16, JoinHandle<Vec<Vec<u8>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let mut received = Vec::new();
        for _ in 0..sessions {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut bytes = Vec::new();
            stream.read_to_end(&mut bytes).await.unwrap();
            received.push(bytes);
        }
        received
    });
    (port, handle)
}

/// A port nothing listens on.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Streams `data` in `chunk`-sized writes, half-closes and waits until the
/// server hangs up. A server that hangs up early just cuts the stream short.
pub async fn stream_session(addr: SocketAddr, data: &[u8], chunk: usize) {
    let mut client = TcpStream::connect(addr).await.unwrap();
    for piece in data.chunks(chunk.max(1)) {
        if client.write_all(piece).await.is_err() {
            break;
        }
    }
    client.shutdown().await.ok();
    let mut rest = Vec::new();
    client.read_to_end(&mut rest).await.ok();
}

/// Shutdown trigger plus the future handed to `serve`.
pub fn shutdown_pair() -> (oneshot::Sender<()>, impl Future<Output = ()> + Send) {
    let (tx, rx) = oneshot::channel::<()>();
    (tx, async move {
        rx.await.ok();
    })
}
