//! Testing utilities: an in-process cluster over real TCP sockets.
//!
//! Nodes run their full task set (acceptor, election ticker, heartbeat loop)
//! on scaled-down timings; tests observe state directly through the shared
//! node handles and talk to the cluster through a plain `TcpTransport`.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::core::config::NodeConfig;
use crate::core::node::ClusterNode;
use crate::core::raft::Role;
use crate::core::server;
use crate::transport::TcpTransport;

/// One running node plus its background tasks.
pub struct TestNode {
    pub addr: String,
    pub node: Arc<ClusterNode<TcpTransport>>,
    tasks: Vec<JoinHandle<()>>,
}

impl TestNode {
    fn spawn(addr: String, listener: TcpListener, peers: Vec<String>, config: NodeConfig) -> Self {
        let node = Arc::new(ClusterNode::new(
            config.clone(),
            peers,
            TcpTransport::new(config.rpc_deadline),
        ));
        let tasks = vec![
            tokio::spawn(server::serve(Arc::clone(&node), listener)),
            tokio::spawn(Arc::clone(&node).run_ticker()),
            tokio::spawn(Arc::clone(&node).run_heartbeat()),
        ];
        TestNode { addr, node, tasks }
    }

    pub fn is_running(&self) -> bool {
        !self.tasks.is_empty()
    }

    fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for TestNode {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A cluster of in-process nodes.
pub struct TestCluster {
    pub nodes: Vec<TestNode>,
    config: NodeConfig,
}

impl TestCluster {
    /// A running 3-node cluster on fast timings.
    pub async fn new() -> Self {
        Self::with_nodes(3).await
    }

    pub async fn with_nodes(count: usize) -> Self {
        Self::with_config(count, NodeConfig::fast()).await
    }

    pub async fn with_config(count: usize, config: NodeConfig) -> Self {
        let mut listeners = Vec::new();
        for _ in 0..count {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap().to_string();
            listeners.push((addr, listener));
        }
        let addrs: Vec<String> = listeners.iter().map(|(addr, _)| addr.clone()).collect();

        let nodes = listeners
            .into_iter()
            .map(|(addr, listener)| {
                let peers: Vec<String> =
                    addrs.iter().filter(|a| **a != addr).cloned().collect();
                TestNode::spawn(addr, listener, peers, config.clone())
            })
            .collect();

        TestCluster { nodes, config }
    }

    /// A client sharing the cluster's RPC deadline.
    pub fn client(&self) -> TcpTransport {
        TcpTransport::new(self.config.rpc_deadline)
    }

    pub fn addrs(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.addr.clone()).collect()
    }

    /// Wait until some running node holds leadership; returns its index.
    pub async fn wait_for_leader(&self, timeout: Duration) -> Option<usize> {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if let Some(index) = self.find_leader().await {
                return Some(index);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        None
    }

    pub async fn find_leader(&self) -> Option<usize> {
        for (index, test_node) in self.nodes.iter().enumerate() {
            if test_node.is_running() && test_node.node.role().await == Role::Leader {
                return Some(index);
            }
        }
        None
    }

    /// Kill a node: acceptor, ticker, and heartbeat all stop.
    pub fn shutdown_node(&mut self, index: usize) {
        self.nodes[index].stop();
    }

    /// Bring a killed node back on its old address with a wiped state
    /// (bootstrap store, empty log, term 0).
    pub async fn restart_node(&mut self, index: usize) {
        let addr = self.nodes[index].addr.clone();
        let peers: Vec<String> = self
            .addrs()
            .into_iter()
            .filter(|a| *a != addr)
            .collect();

        // The old listener may take a moment to release the port.
        let listener = {
            let mut attempt = 0;
            loop {
                match TcpListener::bind(&addr).await {
                    Ok(listener) => break listener,
                    Err(err) => {
                        attempt += 1;
                        if attempt > 50 {
                            panic!("could not rebind {addr}: {err}");
                        }
                        tokio::time::sleep(Duration::from_millis(20)).await;
                    }
                }
            }
        };

        self.nodes[index] = TestNode::spawn(addr, listener, peers, self.config.clone());
    }
}
