//! Replication node binary.
//!
//! Usage: replikv-node --listen <host:port> --nodes <addr,addr,...>
//!
//! `--nodes` lists the peer addresses, excluding this node. Example 3-node
//! cluster:
//!   replikv-node --listen 127.0.0.1:8090 --nodes 127.0.0.1:8091,127.0.0.1:8092
//!   replikv-node --listen 127.0.0.1:8091 --nodes 127.0.0.1:8090,127.0.0.1:8092
//!   replikv-node --listen 127.0.0.1:8092 --nodes 127.0.0.1:8090,127.0.0.1:8091

use std::env;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use replikv::core::config::NodeConfig;
use replikv::core::node::ClusterNode;
use replikv::core::server;
use replikv::transport::TcpTransport;

fn parse_args() -> (String, Vec<String>) {
    let args: Vec<String> = env::args().collect();

    let mut listen: Option<String> = None;
    let mut nodes: Option<Vec<String>> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--listen" if i + 1 < args.len() => {
                listen = Some(args[i + 1].clone());
                i += 2;
            }
            "--nodes" if i + 1 < args.len() => {
                nodes = Some(
                    args[i + 1]
                        .split(',')
                        .filter(|addr| !addr.is_empty())
                        .map(str::to_string)
                        .collect(),
                );
                i += 2;
            }
            other => {
                eprintln!("Unknown argument: {other}");
                i += 1;
            }
        }
    }

    match (listen, nodes) {
        (Some(listen), Some(nodes)) => (listen, nodes),
        _ => {
            eprintln!("Usage: replikv-node --listen <host:port> --nodes <addr,addr,...>");
            process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let (listen, peers) = parse_args();

    let listener = TcpListener::bind(&listen)
        .await
        .with_context(|| format!("could not bind {listen}"))?;

    info!(%listen, peers = ?peers, "node starting");

    let config = NodeConfig::default();
    let transport = TcpTransport::new(config.rpc_deadline);
    let node = Arc::new(ClusterNode::new(config, peers, transport));

    tokio::spawn(Arc::clone(&node).run_ticker());
    tokio::spawn(Arc::clone(&node).run_heartbeat());
    tokio::spawn(Arc::clone(&node).run_status_reporter());

    server::serve(node, listener).await;
    Ok(())
}
