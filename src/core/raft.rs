//! Role state, term counter, and quorum arithmetic.
//!
//! The whole record lives behind one mutex so every decision about serving a
//! request sees a consistent `(role, term)` pair.

use super::log::ReplicatedLog;

/// The three roles a node occupies. Exactly one leader per term when the
/// protocol is respected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Follower,
    Candidate,
    Leader,
}

/// Mutable replication state of one node.
#[derive(Debug)]
pub struct RaftLite {
    pub role: Role,
    /// Monotonically non-decreasing election epoch.
    pub term: u64,
    pub log: ReplicatedLog,
    /// Ticks remaining until the election timer fires.
    pub time_left: u32,
}

impl RaftLite {
    pub fn new(initial_ticks: u32) -> Self {
        RaftLite {
            role: Role::Follower,
            term: 0,
            log: ReplicatedLog::new(),
            time_left: initial_ticks,
        }
    }

    /// Adopt a term seen on the wire. Terms never go backwards.
    pub fn observe_term(&mut self, term: u64) {
        if term > self.term {
            self.term = term;
        }
    }

    /// Re-arm the election timer.
    pub fn reset_timer(&mut self, ticks: u32) {
        self.time_left = ticks;
    }
}

/// Strict majority of the cluster, including self: with N peer addresses the
/// cluster has N+1 members and quorum is `floor((N+1)/2) + 1`.
pub fn quorum(peer_count: usize) -> usize {
    (peer_count + 1) / 2 + 1
}
