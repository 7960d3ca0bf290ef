//! Inbound request acceptor.
//!
//! One task per connection; each connection carries exactly one framed
//! request and one framed response. Undecodable requests are answered with
//! `0` where possible and the connection dropped. The process never exits on
//! a bad connection.

use std::sync::Arc;

use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use super::node::ClusterNode;
use crate::transport::wire::{Request, Response, ResponseCode};
use crate::transport::{read_frame, write_frame, Transport};

/// Accept loop. Runs until the task is dropped.
pub async fn serve<T: Transport>(node: Arc<ClusterNode<T>>, listener: TcpListener) {
    loop {
        match listener.accept().await {
            Ok((stream, _remote)) => {
                let node = Arc::clone(&node);
                tokio::spawn(handle_connection(node, stream));
            }
            Err(err) => warn!(%err, "failed to accept connection"),
        }
    }
}

async fn handle_connection<T: Transport>(node: Arc<ClusterNode<T>>, stream: TcpStream) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let request: Request = match read_frame(&mut reader).await {
        Ok(request) => request,
        Err(err) => {
            debug!(%err, "rejecting undecodable request");
            let _ = write_frame(&mut write_half, &Response::Code(ResponseCode::Deny)).await;
            return;
        }
    };

    debug!(from = ?request.from, name = ?request.name, "inbound request");
    let response = node.handle_request(request).await;
    if let Err(err) = write_frame(&mut write_half, &response).await {
        debug!(%err, "failed to write response");
    }
}
