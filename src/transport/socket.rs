//! Thin adapter over one TCP stream.
//!
//! No retry and no buffering policy beyond the OS socket; the connection
//! worker owns all policy. A transport is created per connect attempt and
//! never reused.
//!
//! An open transport is split into a [`SocketReader`], polled by the worker
//! loop, and a [`SocketWriter`], driven by a separate task so a peer that
//! stops reading can never stall the loop. The socket closes once both halves
//! are dropped.

// ============================================================================
// Imports
// ============================================================================

use std::io;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;
use tracing::trace;

use crate::error::{Error, Result};
use crate::link::LinkConfig;

// ============================================================================
// ReadOutcome
// ============================================================================

/// Result of one read from the transport.
#[derive(Debug)]
pub(crate) enum ReadOutcome {
    /// One readable chunk.
    Data(Vec<u8>),
    /// Peer closed the stream.
    Closed,
    /// Read failed.
    Failed(io::Error),
}

// ============================================================================
// SocketTransport
// ============================================================================

/// One freshly opened OS stream socket.
#[derive(Debug)]
pub(crate) struct SocketTransport {
    stream: TcpStream,
    read_buffer_size: usize,
}

impl SocketTransport {
    /// Opens a connection to `host:port`.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if the attempt exceeds `connect_timeout`
    /// - [`Error::Connection`] if the host cannot be resolved or refuses
    /// - [`Error::Io`] if socket options cannot be applied
    pub(crate) async fn open(host: &str, port: u16, config: &LinkConfig) -> Result<Self> {
        let stream = timeout(config.connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| Error::connection_timeout(config.connect_timeout.as_millis() as u64))?
            .map_err(|e| Error::connection(e.to_string()))?;

        stream.set_nodelay(config.nodelay)?;
        trace!(host, port, local = ?stream.local_addr().ok(), "Socket opened");

        Ok(Self {
            stream,
            read_buffer_size: config.read_buffer_size,
        })
    }

    /// Splits the socket into its read and write halves.
    pub(crate) fn split(self) -> (SocketReader, SocketWriter) {
        let (read_half, write_half) = self.stream.into_split();
        let reader = SocketReader {
            half: Some(read_half),
            read_buf: vec![0; self.read_buffer_size],
        };
        (reader, SocketWriter { half: write_half })
    }
}

// ============================================================================
// SocketReader
// ============================================================================

/// Read side of an open transport.
#[derive(Debug)]
pub(crate) struct SocketReader {
    /// `None` once closed.
    half: Option<OwnedReadHalf>,
    /// Reused read buffer, sized by `LinkConfig::read_buffer_size`.
    read_buf: Vec<u8>,
}

impl SocketReader {
    /// Waits for the next readable chunk.
    ///
    /// Cancel safe: dropping the future before it completes loses no data.
    pub(crate) async fn read(&mut self) -> ReadOutcome {
        let Some(half) = self.half.as_mut() else {
            return ReadOutcome::Closed;
        };

        match half.read(&mut self.read_buf).await {
            Ok(0) => ReadOutcome::Closed,
            Ok(n) => ReadOutcome::Data(self.read_buf[..n].to_vec()),
            Err(e) => ReadOutcome::Failed(e),
        }
    }

    /// Stops reading. Idempotent.
    pub(crate) fn close(&mut self) {
        if let Some(half) = self.half.take() {
            trace!(peer = ?half.peer_addr().ok(), "Socket read side closed");
        }
    }

    /// Returns `true` until [`close`](Self::close) is called.
    #[inline]
    pub(crate) fn is_open(&self) -> bool {
        self.half.is_some()
    }
}

// ============================================================================
// SocketWriter
// ============================================================================

/// Write side of an open transport. Dropping it shuts down the write side.
#[derive(Debug)]
pub(crate) struct SocketWriter {
    half: OwnedWriteHalf,
}

impl SocketWriter {
    /// Writes all of `bytes`.
    pub(crate) async fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.half.write_all(bytes).await
    }

    /// Flushes anything buffered on the write side.
    pub(crate) async fn flush(&mut self) -> io::Result<()> {
        self.half.flush().await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::net::TcpListener;

    async fn listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[tokio::test]
    async fn test_open_refused() {
        let (listener, port) = listener().await;
        drop(listener);

        let err = SocketTransport::open("127.0.0.1", port, &LinkConfig::default())
            .await
            .unwrap_err();
        assert!(err.is_connection_error());
    }

    #[tokio::test]
    async fn test_write_then_read_back() {
        let (listener, port) = listener().await;
        let peer = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            socket.read_exact(&mut buf).await.unwrap();
            socket.write_all(&buf).await.unwrap();
        });

        let (mut reader, mut writer) =
            SocketTransport::open("127.0.0.1", port, &LinkConfig::default())
                .await
                .unwrap()
                .split();
        writer.write(b"ping").await.unwrap();
        writer.flush().await.unwrap();

        match timeout(Duration::from_secs(1), reader.read()).await.unwrap() {
            ReadOutcome::Data(data) => assert_eq!(data, b"ping"),
            other => panic!("unexpected read outcome: {other:?}"),
        }
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_read_reports_peer_close() {
        let (listener, port) = listener().await;
        let peer = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let (mut reader, _writer) =
            SocketTransport::open("127.0.0.1", port, &LinkConfig::default())
                .await
                .unwrap()
                .split();
        peer.await.unwrap();

        let outcome = timeout(Duration::from_secs(1), reader.read()).await.unwrap();
        assert!(matches!(outcome, ReadOutcome::Closed));
    }

    #[tokio::test]
    async fn test_read_chunk_bounded_by_buffer_size() {
        let (listener, port) = listener().await;
        let peer = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"abcdefgh").await.unwrap();
        });

        let config = LinkConfig::default().with_read_buffer_size(3);
        let (mut reader, _writer) = SocketTransport::open("127.0.0.1", port, &config)
            .await
            .unwrap()
            .split();
        peer.await.unwrap();

        match reader.read().await {
            ReadOutcome::Data(data) => assert!(data.len() <= 3),
            other => panic!("unexpected read outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (listener, port) = listener().await;
        let _accept = tokio::spawn(async move { listener.accept().await });

        let (mut reader, _writer) =
            SocketTransport::open("127.0.0.1", port, &LinkConfig::default())
                .await
                .unwrap()
                .split();
        assert!(reader.is_open());

        reader.close();
        reader.close();
        assert!(!reader.is_open());
        assert!(matches!(reader.read().await, ReadOutcome::Closed));
    }

    #[tokio::test]
    async fn test_dropping_both_halves_closes_socket() {
        let (listener, port) = listener().await;

        let (reader, writer) = SocketTransport::open("127.0.0.1", port, &LinkConfig::default())
            .await
            .unwrap()
            .split();
        let (mut socket, _) = listener.accept().await.unwrap();

        drop(writer);
        drop(reader);

        let mut buf = [0u8; 1];
        let n = timeout(Duration::from_secs(1), socket.read(&mut buf))
            .await
            .unwrap()
            .unwrap_or(0);
        assert_eq!(n, 0);
    }
}
