//! TCP echo peer for exercising links end to end.
//!
//! Every byte a client sends is written straight back to it. Any number of
//! clients may connect, one after another or at the same time.
//!
//! # Example
//!
//! ```no_run
//! use std::net::{IpAddr, Ipv4Addr};
//! use groundlink::transport::LoopbackServer;
//!
//! # async fn example() -> groundlink::Result<()> {
//! let server = LoopbackServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 5760).await?;
//! println!("echoing on {}", server.local_addr());
//! server.quit();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::error::Result;

// ============================================================================
// Constants
// ============================================================================

/// Size of the per-client echo buffer.
const ECHO_BUFFER_SIZE: usize = 4096;

// ============================================================================
// LoopbackServer
// ============================================================================

/// A listening echo peer.
///
/// Runs on the tokio runtime it was bound from. Stops on [`quit`](Self::quit)
/// or drop, closing every client connection.
pub struct LoopbackServer {
    /// Bound address.
    local_addr: SocketAddr,
    /// Accept loop; owns the client tasks.
    accept_task: JoinHandle<()>,
}

impl LoopbackServer {
    /// Binds the echo peer to `ip:port` and starts accepting.
    ///
    /// Use port 0 to let the OS assign a free port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if binding fails.
    pub async fn bind(ip: IpAddr, port: u16) -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::new(ip, port)).await?;
        let local_addr = listener.local_addr()?;

        let accept_task = tokio::spawn(Self::accept_loop(listener));
        info!(%local_addr, "Loopback server listening");

        Ok(Self {
            local_addr,
            accept_task,
        })
    }

    /// Returns the bound port.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Returns the bound address.
    #[inline]
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting and closes every client connection.
    pub fn quit(self) {
        drop(self);
    }

    async fn accept_loop(listener: TcpListener) {
        let mut clients = JoinSet::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            debug!(%peer, "Loopback client accepted");
                            clients.spawn(Self::echo(stream, peer));
                        }
                        Err(e) => {
                            warn!(error = %e, "Loopback accept failed");
                        }
                    }
                }

                Some(_) = clients.join_next(), if !clients.is_empty() => {}
            }
        }
    }

    async fn echo(mut stream: TcpStream, peer: SocketAddr) {
        let mut buf = vec![0u8; ECHO_BUFFER_SIZE];

        loop {
            match stream.read(&mut buf).await {
                Ok(0) => {
                    debug!(%peer, "Loopback client closed");
                    break;
                }
                Ok(n) => {
                    if let Err(e) = stream.write_all(&buf[..n]).await {
                        warn!(%peer, error = %e, "Loopback echo failed");
                        break;
                    }
                }
                Err(e) => {
                    debug!(%peer, error = %e, "Loopback read failed");
                    break;
                }
            }
        }
    }
}

impl Drop for LoopbackServer {
    fn drop(&mut self) {
        self.accept_task.abort();
        debug!(local_addr = %self.local_addr, "Loopback server stopped");
    }
}

// ============================================================================
// Tests
// ============================================================================
