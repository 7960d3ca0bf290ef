//! Transport layer: framed JSON over TCP, one request/response exchange per
//! connection.
//!
//! - `TcpTransport`: production client for peer and web-tier calls
//! - `InMemoryTransport`: channel-based transport for deterministic tests

pub mod inmemory;
pub mod tcp;
pub mod wire;

pub use tcp::TcpTransport;
pub use wire::{Request, RequestName, Response, ResponseCode, Sender};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Errors surfaced by peer RPC calls. A failed call counts as a non-vote;
/// the caller does not distinguish a rejection from an unreachable peer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("failed to dial {0}")]
    DialFailed(String),
    #[error("failed to encode request")]
    EncodeFailed,
    #[error("failed to decode response")]
    DecodeFailed,
    #[error("request timed out")]
    Timeout,
    #[error("peer rejected request")]
    PeerRejected,
}

/// One-shot request/response exchange with a named peer.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn call(&self, addr: &str, request: Request) -> Result<ResponseCode, TransportError>;
}

/// Write one newline-delimited JSON frame.
pub(crate) async fn write_frame<W, T>(writer: &mut W, value: &T) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut buf = serde_json::to_vec(value)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
    buf.push(b'\n');
    writer.write_all(&buf).await?;
    writer.flush().await
}

/// Read one newline-delimited JSON frame.
pub(crate) async fn read_frame<R, T>(reader: &mut R) -> std::io::Result<T>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    let read = reader.read_line(&mut line).await?;
    if read == 0 {
        return Err(std::io::ErrorKind::UnexpectedEof.into());
    }
    serde_json::from_str(line.trim_end())
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
}
