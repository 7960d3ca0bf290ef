//! TCP transport client.
//!
//! Opens a connection, writes one framed request, reads one framed response,
//! closes. No retries and no pooling; a per-call deadline keeps one slow peer
//! from stalling a heartbeat round.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::wire::{Request, Response, ResponseCode};
use super::{read_frame, write_frame, Transport, TransportError};

/// One-shot framed request/response client.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    deadline: Duration,
}

impl TcpTransport {
    pub fn new(deadline: Duration) -> Self {
        TcpTransport { deadline }
    }

    /// Full exchange returning whatever the node wrote back.
    async fn exchange(&self, addr: &str, request: &Request) -> Result<Response, TransportError> {
        let exchange = async {
            let stream = TcpStream::connect(addr)
                .await
                .map_err(|_| TransportError::DialFailed(addr.to_string()))?;
            let (read_half, mut write_half) = stream.into_split();
            write_frame(&mut write_half, request)
                .await
                .map_err(|_| TransportError::EncodeFailed)?;
            let mut reader = BufReader::new(read_half);
            read_frame::<_, Response>(&mut reader)
                .await
                .map_err(|_| TransportError::DecodeFailed)
        };
        timeout(self.deadline, exchange)
            .await
            .map_err(|_| TransportError::Timeout)?
    }

    /// Fetch a store snapshot from the leader (`itemMap`). A non-leader
    /// answers with a bare `0`, surfaced here as a rejection.
    pub async fn fetch_items(
        &self,
        addr: &str,
    ) -> Result<HashMap<String, String>, TransportError> {
        match self.exchange(addr, &Request::item_map()).await? {
            Response::Items(items) => Ok(items),
            Response::Code(_) => Err(TransportError::PeerRejected),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn call(&self, addr: &str, request: Request) -> Result<ResponseCode, TransportError> {
        match self.exchange(addr, &request).await? {
            Response::Code(code) => Ok(code),
            Response::Items(_) => Err(TransportError::DecodeFailed),
        }
    }
}
