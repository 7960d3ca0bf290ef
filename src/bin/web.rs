//! Web tier binary: the HTML front-end for the cluster.
//!
//! Usage: replikv-web --listen <host:port> --nodes <addr,addr,...>
//!
//! `--nodes` lists every replication node; the front-end probes them to find
//! the current leader and forwards all reads and mutations there.

use std::env;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use replikv::api::web::{router, run_leader_probe, WebState};
use replikv::transport::TcpTransport;

const LEADER_PROBE_INTERVAL: Duration = Duration::from_secs(5);
const RPC_DEADLINE: Duration = Duration::from_secs(2);

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
        (Some(listen), Some(nodes)) if !nodes.is_empty() => (listen, nodes),
        _ => {
            eprintln!("Usage: replikv-web --listen <host:port> --nodes <addr,addr,...>");
            process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let (listen, nodes) = parse_args();

    let listener = TcpListener::bind(&listen)
        .await
        .with_context(|| format!("could not bind {listen}"))?;

    info!(%listen, nodes = ?nodes, "web tier starting");

    let state = Arc::new(WebState::new(
        nodes,
        TcpTransport::new(RPC_DEADLINE),
        LEADER_PROBE_INTERVAL,
    ));
    tokio::spawn(run_leader_probe(Arc::clone(&state)));

    axum::serve(listener, router(state))
        .await
        .context("web server failed")?;
    Ok(())
}
