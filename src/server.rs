//! Loopback echo server.
//!
//! Every accepted connection gets its own handler task that performs a fixed
//! number of exact-size read / write-back / flush cycles and then returns.
//! The accept loop runs until the owning `ServerHandle` asks it to stop.

use bytes::BytesMut;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// Counters updated by the accept loop and connection handlers.
#[derive(Debug, Default)]
pub struct EchoStats {
    accepted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    bytes_echoed: AtomicU64,
}

impl EchoStats {
    pub fn snapshot(&self) -> ServerSummary {
        ServerSummary {
            accepted: self.accepted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            bytes_echoed: self.bytes_echoed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of `EchoStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerSummary {
    /// Connections accepted by the listener
    pub accepted: u64,
    /// Handlers that finished all of their cycles
    pub completed: u64,
    /// Handlers that stopped on an I/O error
    pub failed: u64,
    /// Bytes written back to peers across all handlers
    pub bytes_echoed: u64,
}

/// A bound, not yet running, echo server.
pub struct EchoServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    iterations: u64,
    message_size: usize,
    stats: Arc<EchoStats>,
}

impl EchoServer {
    /// Bind the listening socket.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(
        addr: SocketAddr,
        backlog: i32,
        iterations: u64,
        message_size: usize,
    ) -> io::Result<Self> {
        let listener = TcpListener::from_std(create_listener(addr, backlog)?)?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, backlog, "Server listening");

        Ok(EchoServer {
            listener,
            local_addr,
            iterations,
            message_size,
            stats: Arc::new(EchoStats::default()),
        })
    }

    /// Start the accept loop on the current runtime.
    pub fn spawn(self) -> ServerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let local_addr = self.local_addr;
        let stats = Arc::clone(&self.stats);
        let task = tokio::spawn(self.accept_loop(shutdown_rx));

        ServerHandle {
            local_addr,
            shutdown: shutdown_tx,
            task,
            stats,
        }
    }

    async fn accept_loop(self, mut shutdown: oneshot::Receiver<()>) {
        let EchoServer {
            listener,
            iterations,
            message_size,
            stats,
            ..
        } = self;
        let mut handlers = JoinSet::new();

        loop {
            tokio::select! {
                // Also fires if the handle was dropped without a shutdown call
                _ = &mut shutdown => break,

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(peer = %peer, "New connection");
                        stats.accepted.fetch_add(1, Ordering::Relaxed);
                        if let Err(e) = stream.set_nodelay(true) {
                            warn!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
                        }

                        let stats = Arc::clone(&stats);
                        handlers.spawn(async move {
                            match handle_connection(stream, iterations, message_size, &stats).await {
                                Ok(bytes) => {
                                    stats.completed.fetch_add(1, Ordering::Relaxed);
                                    debug!(peer = %peer, bytes, "Connection handler finished");
                                }
                                Err(e) => {
                                    stats.failed.fetch_add(1, Ordering::Relaxed);
                                    warn!(peer = %peer, error = %e, "Connection handler failed");
                                }
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                    }
                },

                Some(result) = handlers.join_next(), if !handlers.is_empty() => {
                    reap(result, &stats);
                }
            }
        }

        drop(listener);
        info!("Listener closed");

        while let Some(result) = handlers.join_next().await {
            reap(result, &stats);
        }
    }
}

fn reap(result: Result<(), JoinError>, stats: &EchoStats) {
    if let Err(e) = result {
        stats.failed.fetch_add(1, Ordering::Relaxed);
        warn!(error = %e, "Connection handler panicked");
    }
}

/// Control handle for a running echo server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
    stats: Arc<EchoStats>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, close the listening socket and wait for in-flight
    /// handlers to finish.
    pub async fn shutdown(self) -> Result<ServerSummary, JoinError> {
        // The accept loop may already be gone; awaiting the task covers both cases
        let _ = self.shutdown.send(());
        self.task.await?;
        Ok(self.stats.snapshot())
    }
}

/// Echo `iterations` messages of `message_size` bytes back to the peer.
///
/// Returns the number of bytes echoed. A peer that closes early surfaces as
/// an `UnexpectedEof` error.
pub async fn handle_connection<S>(
    mut stream: S,
    iterations: u64,
    message_size: usize,
    stats: &EchoStats,
) -> io::Result<u64>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buffer = BytesMut::zeroed(message_size);
    let mut echoed = 0u64;

    for _ in 0..iterations {
        stream.read_exact(&mut buffer[..]).await?;
        stream.write_all(&buffer[..]).await?;
        stream.flush().await?;

        echoed += message_size as u64;
        stats
            .bytes_echoed
            .fetch_add(message_size as u64, Ordering::Relaxed);
    }

    Ok(echoed)
}

/// Create a non-blocking TCP listener with the given accept backlog.
fn create_listener(addr: SocketAddr, backlog: i32) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    Ok(socket.into())
}
