//! Replication core: role state, the replicated log, the node record with
//! its handlers and background activities, and the TCP acceptor.

pub mod config;
pub mod log;
pub mod node;
pub mod raft;
pub mod server;

pub use config::NodeConfig;
pub use log::{CommitOp, Commitment, ReplicatedLog};
pub use node::ClusterNode;
pub use raft::{quorum, RaftLite, Role};
