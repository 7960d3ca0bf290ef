//! In-memory transport for deterministic tests.
//!
//! Requests are delivered over channels; each simulated peer is pumped
//! explicitly with `NodeHandle::process_one`, so tests control exactly which
//! peers answer, in what order, and with what.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::wire::{Request, ResponseCode};
use super::{Transport, TransportError};
use crate::core::node::ClusterNode;

/// One in-flight request awaiting a reply.
pub struct Envelope {
    pub request: Request,
    reply: oneshot::Sender<ResponseCode>,
}

/// Channel-backed transport keyed by peer address.
pub struct InMemoryTransport {
    senders: HashMap<String, mpsc::Sender<Envelope>>,
    timeout: Option<Duration>,
}

impl InMemoryTransport {
    pub fn new(senders: HashMap<String, mpsc::Sender<Envelope>>) -> Self {
        InMemoryTransport {
            senders,
            timeout: None,
        }
    }

    pub fn with_timeout(
        senders: HashMap<String, mpsc::Sender<Envelope>>,
        timeout: Duration,
    ) -> Self {
        InMemoryTransport {
            senders,
            timeout: Some(timeout),
        }
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn call(&self, addr: &str, request: Request) -> Result<ResponseCode, TransportError> {
        let sender = self
            .senders
            .get(addr)
            .ok_or_else(|| TransportError::DialFailed(addr.to_string()))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        sender
            .send(Envelope {
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| TransportError::DialFailed(addr.to_string()))?;

        match self.timeout {
            Some(deadline) => tokio::time::timeout(deadline, reply_rx)
                .await
                .map_err(|_| TransportError::Timeout)?
                .map_err(|_| TransportError::DecodeFailed),
            None => reply_rx.await.map_err(|_| TransportError::DecodeFailed),
        }
    }
}

/// Receiving end of one simulated peer.
pub struct NodeHandle {
    receiver: mpsc::Receiver<Envelope>,
}

impl NodeHandle {
    /// Serve one request through a real node's dispatcher. Returns the
    /// request that was processed, for assertions on the traffic.
    pub async fn process_one<T: Transport>(
        &mut self,
        node: &Arc<ClusterNode<T>>,
    ) -> Option<Request> {
        let envelope = self.receiver.recv().await?;
        let request = envelope.request.clone();
        let response = node.handle_request(envelope.request).await;
        let code = response.code().unwrap_or(ResponseCode::Deny);
        let _ = envelope.reply.send(code);
        Some(request)
    }

    /// Answer one request with a scripted code, without any node behind it.
    pub async fn respond_one(&mut self, code: ResponseCode) -> Option<Request> {
        let envelope = self.receiver.recv().await?;
        let _ = envelope.reply.send(code);
        Some(envelope.request)
    }
}

/// Build transports and handles for a set of addresses. Each transport can
/// reach every address except its own.
pub fn create_cluster(
    addrs: &[&str],
    timeout: Option<Duration>,
) -> (
    HashMap<String, InMemoryTransport>,
    HashMap<String, NodeHandle>,
) {
    let mut senders: HashMap<String, mpsc::Sender<Envelope>> = HashMap::new();
    let mut handles: HashMap<String, NodeHandle> = HashMap::new();

    for &addr in addrs {
        let (tx, rx) = mpsc::channel(32);
        senders.insert(addr.to_string(), tx);
        handles.insert(addr.to_string(), NodeHandle { receiver: rx });
    }

    let mut transports = HashMap::new();
    for &addr in addrs {
        let others: HashMap<String, mpsc::Sender<Envelope>> = senders
            .iter()
            .filter(|(peer, _)| peer.as_str() != addr)
            .map(|(peer, tx)| (peer.clone(), tx.clone()))
            .collect();
        let transport = match timeout {
            Some(deadline) => InMemoryTransport::with_timeout(others, deadline),
            None => InMemoryTransport::new(others),
        };
        transports.insert(addr.to_string(), transport);
    }

    (transports, handles)
}
