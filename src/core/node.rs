//! The replication node: one record of shared state plus every activity that
//! touches it.
//!
//! Four concurrent activities mutate the record: the election ticker, the
//! heartbeat loop, inbound peer handlers, and inbound client handlers. The
//! raft mutex guards `(role, term, log, time_left)` so role/term decisions
//! are made on a consistent view; the vote ledger and the store carry their
//! own locks. No lock is ever held across a network call.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use tokio::sync::{Mutex, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::config::NodeConfig;
use super::log::Commitment;
use super::raft::{quorum, RaftLite, Role};
use crate::state_machine::ItemStore;
use crate::transport::wire::{Request, RequestName, Response, ResponseCode, Sender};
use crate::transport::Transport;

/// One replication node's entire state and behavior.
pub struct ClusterNode<T> {
    config: NodeConfig,
    /// Peer addresses, fixed at startup. Excludes self.
    peers: Vec<String>,
    /// Votes or acceptances needed for a majority of the whole cluster.
    quorum: usize,
    raft: Mutex<RaftLite>,
    /// Terms this node has already voted in.
    voted_terms: StdMutex<HashSet<u64>>,
    store: RwLock<ItemStore>,
    transport: T,
}

impl<T: Transport> ClusterNode<T> {
    pub fn new(config: NodeConfig, peers: Vec<String>, transport: T) -> Self {
        let initial_ticks = config.random_election_ticks();
        ClusterNode {
            quorum: quorum(peers.len()),
            raft: Mutex::new(RaftLite::new(initial_ticks)),
            voted_terms: StdMutex::new(HashSet::new()),
            store: RwLock::new(ItemStore::bootstrap()),
            config,
            peers,
            transport,
        }
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    pub fn quorum(&self) -> usize {
        self.quorum
    }

    pub async fn role(&self) -> Role {
        self.raft.lock().await.role
    }

    pub async fn term(&self) -> u64 {
        self.raft.lock().await.term
    }

    pub async fn log_entries(&self) -> Vec<Commitment> {
        self.raft.lock().await.log.snapshot()
    }

    pub async fn store_snapshot(&self) -> HashMap<String, String> {
        self.store.read().await.all()
    }

    /// Skip the election and take leadership directly. Test setup helper;
    /// production leadership only ever comes from `hold_election`.
    pub async fn become_leader(&self) {
        let mut raft = self.raft.lock().await;
        raft.role = Role::Leader;
    }

    // === Dispatcher ===

    /// Route one inbound request. Web-tier requests are only served by the
    /// leader; peer requests are served regardless of role, with each
    /// handler checking its own preconditions.
    pub async fn handle_request(self: &Arc<Self>, request: Request) -> Response {
        match request.from {
            Sender::Web => {
                if self.role().await != Role::Leader {
                    return Response::Code(ResponseCode::Deny);
                }
                self.handle_client(request).await
            }
            Sender::Node => Response::Code(self.handle_peer(request).await),
        }
    }

    // === Leader handler (client requests) ===

    async fn handle_client(self: &Arc<Self>, request: Request) -> Response {
        match request.name {
            RequestName::Leader => Response::Code(ResponseCode::Accept),
            RequestName::ItemMap => Response::Items(self.store.read().await.all()),
            RequestName::Add | RequestName::Update | RequestName::Delete => {
                let key = request.key.unwrap_or_default();
                let value = request.value.unwrap_or_default();
                let commitment = match request.name {
                    RequestName::Add => Commitment::add(key, value),
                    RequestName::Update => {
                        Commitment::update(request.old_key.unwrap_or_default(), key, value)
                    }
                    _ => Commitment::delete(key),
                };
                Response::Code(self.replicate(commitment).await)
            }
            // Peer request names carrying a web sender class.
            _ => Response::Code(ResponseCode::Deny),
        }
    }

    /// The replication path: append tentatively, fan out to peers, commit on
    /// quorum, roll back otherwise.
    async fn replicate(self: &Arc<Self>, commitment: Commitment) -> ResponseCode {
        {
            let mut raft = self.raft.lock().await;
            raft.log.append_tentative(commitment.clone());
        }

        // Fan out in peer order; a failed call is simply not counted.
        let mut voters = Vec::new();
        for peer in &self.peers {
            match self
                .transport
                .call(peer, Request::add_to_log(commitment.clone()))
                .await
            {
                Ok(ResponseCode::Accept) => voters.push(peer.clone()),
                Ok(code) => debug!(peer = %peer, ?code, "append declined"),
                Err(err) => debug!(peer = %peer, %err, "append unreachable"),
            }
        }

        if 1 + voters.len() < self.quorum {
            warn!(
                accepted = voters.len() + 1,
                needed = self.quorum,
                key = %commitment.key,
                "no quorum, rolling back"
            );
            self.abandon_last_entry(&voters).await;
            return ResponseCode::Deny;
        }

        let applied = {
            let mut store = self.store.write().await;
            store.apply(&commitment)
        };
        match applied {
            Ok(()) => {
                info!(op = ?commitment.op, key = %commitment.key, "mutation committed");
                // The client is answered first; commits to voters follow.
                let node = Arc::clone(self);
                tokio::spawn(async move { node.broadcast_commit(voters).await });
                ResponseCode::Accept
            }
            Err(err) => {
                debug!(key = %commitment.key, %err, "apply rejected, rolling back");
                self.abandon_last_entry(&voters).await;
                ResponseCode::Deny
            }
        }
    }

    /// Pop the tentative tail locally and on every peer that accepted it.
    async fn abandon_last_entry(&self, voters: &[String]) {
        {
            let mut raft = self.raft.lock().await;
            raft.log.rollback_last();
        }
        for peer in voters {
            if let Err(err) = self.transport.call(peer, Request::rm_from_log()).await {
                warn!(peer = %peer, %err, "rollback delivery failed");
            }
        }
    }

    /// Tell every voter to apply the entry it accepted. Individual failures
    /// are logged but do not unwind the commit.
    async fn broadcast_commit(self: Arc<Self>, voters: Vec<String>) {
        for peer in &voters {
            match self.transport.call(peer, Request::commit()).await {
                Ok(ResponseCode::Accept) => {}
                Ok(code) => warn!(peer = %peer, ?code, "peer declined commit"),
                Err(err) => warn!(peer = %peer, %err, "commit delivery failed"),
            }
        }
    }

    // === Follower / peer handler ===

    async fn handle_peer(&self, request: Request) -> ResponseCode {
        // Any peer traffic means the cluster is alive; push the election out.
        {
            let mut raft = self.raft.lock().await;
            raft.reset_timer(self.config.random_election_ticks());
        }

        match request.name {
            RequestName::VoteForMe => self.handle_vote(request.term.unwrap_or(0)).await,
            RequestName::AddToLog => match request.ci {
                Some(commitment) => {
                    let mut raft = self.raft.lock().await;
                    raft.log.append_tentative(commitment);
                    ResponseCode::Accept
                }
                None => ResponseCode::Deny,
            },
            RequestName::RmFromLog => {
                let mut raft = self.raft.lock().await;
                if raft.log.rollback_last().is_some() {
                    ResponseCode::Accept
                } else {
                    ResponseCode::Deny
                }
            }
            RequestName::Commit => self.handle_commit().await,
            RequestName::Alive => self.handle_alive(request.term.unwrap_or(0)).await,
            RequestName::UpdateLog => {
                self.handle_update_log(
                    request.term.unwrap_or(0),
                    request.ci_log.unwrap_or_default(),
                )
                .await
            }
            // Client request names carrying a node sender class.
            _ => ResponseCode::Deny,
        }
    }

    /// One vote per term, ever. Leaders do not vote. The whole decision
    /// happens under one raft lock acquisition so a concurrent election on
    /// this node cannot promote it mid-vote.
    async fn handle_vote(&self, term: u64) -> ResponseCode {
        let mut raft = self.raft.lock().await;
        if raft.role == Role::Leader {
            return ResponseCode::Deny;
        }
        let granted = self.voted_terms.lock().unwrap().insert(term);
        if !granted {
            return ResponseCode::Deny;
        }
        raft.observe_term(term);
        debug!(term, "vote granted");
        ResponseCode::Accept
    }

    async fn handle_commit(&self) -> ResponseCode {
        let last = {
            let raft = self.raft.lock().await;
            raft.log.last().cloned()
        };
        let Some(commitment) = last else {
            return ResponseCode::Deny;
        };
        let applied = {
            let mut store = self.store.write().await;
            store.apply(&commitment)
        };
        match applied {
            Ok(()) => ResponseCode::Accept,
            Err(err) => {
                warn!(key = %commitment.key, %err, "commit apply failed");
                ResponseCode::Deny
            }
        }
    }

    /// Heartbeat from a leader. `2` asks that leader for a full log push.
    async fn handle_alive(&self, term: u64) -> ResponseCode {
        let mut raft = self.raft.lock().await;
        match raft.role {
            Role::Leader if raft.term < term => {
                info!(term, "saw newer leader, stepping down");
                raft.role = Role::Follower;
                ResponseCode::Resync
            }
            Role::Candidate => {
                info!(term, "leader is alive, standing down");
                raft.role = Role::Follower;
                ResponseCode::Resync
            }
            Role::Follower if raft.term < term => ResponseCode::Resync,
            _ => ResponseCode::Accept,
        }
    }

    /// Wholesale log replacement pushed by the leader after a `2`.
    async fn handle_update_log(&self, term: u64, entries: Vec<Commitment>) -> ResponseCode {
        let rebuilt = ItemStore::rebuild(&entries);
        {
            let mut raft = self.raft.lock().await;
            raft.log.replace(entries);
            raft.observe_term(term);
        }
        *self.store.write().await = rebuilt;
        info!(term, "log resynced from leader");
        ResponseCode::Accept
    }

    // === Election ticker ===

    /// Count the election timer down once per tick; on expiry run an
    /// election and re-arm with a fresh random window.
    pub async fn run_ticker(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let expired = {
                let mut raft = self.raft.lock().await;
                if raft.time_left > 0 {
                    raft.time_left -= 1;
                }
                raft.time_left == 0
            };
            if expired {
                self.hold_election().await;
                let mut raft = self.raft.lock().await;
                raft.reset_timer(self.config.random_election_ticks());
            }
        }
    }

    /// Timer expiry: a follower stands as candidate, a candidate bumps the
    /// term and solicits votes, a leader does nothing.
    async fn hold_election(&self) {
        let term = {
            let mut raft = self.raft.lock().await;
            match raft.role {
                Role::Leader => return,
                Role::Follower => {
                    info!("election timer fired, standing as candidate");
                    raft.role = Role::Candidate;
                }
                Role::Candidate => {}
            }
            raft.term += 1;
            raft.term
        };

        // Every peer hears the solicitation, in peer order, once per election.
        let mut votes = 1; // self
        for peer in &self.peers {
            match self.transport.call(peer, Request::vote_for_me(term)).await {
                Ok(ResponseCode::Accept) => votes += 1,
                Ok(code) => debug!(peer = %peer, ?code, "vote declined"),
                Err(err) => debug!(peer = %peer, %err, "vote request failed"),
            }
        }

        if votes >= self.quorum {
            let mut raft = self.raft.lock().await;
            // A heartbeat may have demoted us or moved the term on while the
            // ballots were out; leadership only stands on the same view.
            if raft.role == Role::Candidate && raft.term == term {
                info!(term, votes, quorum = self.quorum, "won election");
                raft.role = Role::Leader;
            }
        } else {
            debug!(term, votes, quorum = self.quorum, "election failed");
        }
    }

    // === Heartbeat loop ===

    /// Leaders probe each peer in turn, pausing between targets and between
    /// rounds. A `2` answer triggers a full log push to that peer.
    pub async fn run_heartbeat(self: Arc<Self>) {
        loop {
            let leading_term = {
                let raft = self.raft.lock().await;
                (raft.role == Role::Leader).then_some(raft.term)
            };
            if let Some(term) = leading_term {
                for peer in &self.peers {
                    match self.transport.call(peer, Request::alive(term)).await {
                        Ok(ResponseCode::Resync) => self.push_log(peer).await,
                        Ok(_) => {}
                        Err(err) => warn!(peer = %peer, %err, "detected peer failure"),
                    }
                    tokio::time::sleep(self.config.heartbeat_peer_pause()).await;
                }
            }
            tokio::time::sleep(self.config.heartbeat_round_pause()).await;
        }
    }

    async fn push_log(&self, peer: &str) {
        let (term, snapshot) = {
            let raft = self.raft.lock().await;
            (raft.term, raft.log.snapshot())
        };
        info!(peer, term, entries = snapshot.len(), "pushing log to lagging peer");
        match self
            .transport
            .call(peer, Request::update_log(term, snapshot))
            .await
        {
            Ok(ResponseCode::Accept) => {}
            Ok(code) => warn!(peer, ?code, "log push declined"),
            Err(err) => warn!(peer, %err, "log push failed"),
        }
    }

    /// Periodic state dump at debug level.
    pub async fn run_status_reporter(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.heartbeat_round_pause());
        loop {
            ticker.tick().await;
            let (role, term, time_left, log_len) = {
                let raft = self.raft.lock().await;
                (raft.role, raft.term, raft.time_left, raft.log.len())
            };
            let items = self.store.read().await.len();
            debug!(?role, term, time_left, log_len, items, "node status");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::inmemory::{create_cluster, InMemoryTransport, NodeHandle};
    use crate::transport::wire::ResponseCode::{Accept, Deny, Resync};

    const SELF: &str = "127.0.0.1:7001";
    const P2: &str = "127.0.0.1:7002";
    const P3: &str = "127.0.0.1:7003";

    /// A node plus scripted handles for its two peers.
    fn three_node_setup() -> (Arc<ClusterNode<InMemoryTransport>>, NodeHandle, NodeHandle) {
        let (mut transports, mut handles) = create_cluster(&[SELF, P2, P3], None);
        let node = Arc::new(ClusterNode::new(
            NodeConfig::fast(),
            vec![P2.to_string(), P3.to_string()],
            transports.remove(SELF).unwrap(),
        ));
        (
            node,
            handles.remove(P2).unwrap(),
            handles.remove(P3).unwrap(),
        )
    }

    /// A node with no reachable peers, for handler-only tests.
    fn lone_node() -> Arc<ClusterNode<InMemoryTransport>> {
        let (mut transports, _handles) = create_cluster(&[SELF], None);
        Arc::new(ClusterNode::new(
            NodeConfig::fast(),
            Vec::new(),
            transports.remove(SELF).unwrap(),
        ))
    }

    #[tokio::test]
    async fn votes_once_per_term() {
        let node = lone_node();

        assert_eq!(node.handle_peer(Request::vote_for_me(5)).await, Accept);
        assert_eq!(node.term().await, 5);
        // Second solicitation for the same term is refused.
        assert_eq!(node.handle_peer(Request::vote_for_me(5)).await, Deny);
    }

    #[tokio::test]
    async fn voting_never_lowers_term() {
        let node = lone_node();
        node.handle_peer(Request::vote_for_me(5)).await;

        // A stale candidate still gets its ballot, but our term stands.
        assert_eq!(node.handle_peer(Request::vote_for_me(3)).await, Accept);
        assert_eq!(node.term().await, 5);
    }

    #[tokio::test]
    async fn leaders_do_not_vote() {
        let node = lone_node();
        node.become_leader().await;
        assert_eq!(node.handle_peer(Request::vote_for_me(9)).await, Deny);
    }

    #[tokio::test]
    async fn web_requests_denied_unless_leader() {
        let node = lone_node();
        let denied = node.handle_request(Request::leader_probe()).await;
        assert_eq!(denied, Response::Code(Deny));

        node.become_leader().await;
        let granted = node.handle_request(Request::leader_probe()).await;
        assert_eq!(granted, Response::Code(Accept));
    }

    #[tokio::test]
    async fn item_map_returns_store_snapshot() {
        let node = lone_node();
        node.become_leader().await;

        let response = node.handle_request(Request::item_map()).await;
        let Response::Items(items) = response else {
            panic!("expected item mapping");
        };
        assert_eq!(items.len(), 7);
        assert_eq!(items.get("banana").map(String::as_str), Some("1111"));
    }

    #[tokio::test]
    async fn peer_request_names_from_web_are_denied() {
        let node = lone_node();
        node.become_leader().await;

        let mut request = Request::alive(1);
        request.from = Sender::Web;
        assert_eq!(
            node.handle_request(request).await,
            Response::Code(Deny)
        );
    }

    #[tokio::test]
    async fn client_names_from_peers_are_denied() {
        let node = lone_node();
        let mut request = Request::add("k", "v");
        request.from = Sender::Node;
        assert_eq!(node.handle_request(request).await, Response::Code(Deny));
    }

    #[tokio::test]
    async fn append_then_commit_applies_once() {
        let node = lone_node();

        let append = Request::add_to_log(Commitment::add("k1", "v1"));
        assert_eq!(node.handle_peer(append).await, Accept);
        assert_eq!(node.log_entries().await.len(), 1);

        assert_eq!(node.handle_peer(Request::commit()).await, Accept);
        assert_eq!(
            node.store_snapshot().await.get("k1").map(String::as_str),
            Some("v1")
        );

        // Re-applying the same tail entry is not idempotent by design.
        assert_eq!(node.handle_peer(Request::commit()).await, Deny);
    }

    #[tokio::test]
    async fn commit_on_empty_log_is_denied() {
        let node = lone_node();
        assert_eq!(node.handle_peer(Request::commit()).await, Deny);
    }

    #[tokio::test]
    async fn rm_from_log_pops_the_tail() {
        let node = lone_node();
        assert_eq!(node.handle_peer(Request::rm_from_log()).await, Deny);

        node.handle_peer(Request::add_to_log(Commitment::add("k", "v")))
            .await;
        assert_eq!(node.handle_peer(Request::rm_from_log()).await, Accept);
        assert!(node.log_entries().await.is_empty());
    }

    #[tokio::test]
    async fn alive_codes_by_role_and_term() {
        // Follower at the leader's term: plain ack.
        let node = lone_node();
        assert_eq!(node.handle_peer(Request::alive(0)).await, Accept);

        // Follower behind the leader: asks for resync.
        assert_eq!(node.handle_peer(Request::alive(3)).await, Resync);

        // Candidate stands down on any heartbeat.
        let node = lone_node();
        {
            let mut raft = node.raft.lock().await;
            raft.role = Role::Candidate;
        }
        assert_eq!(node.handle_peer(Request::alive(0)).await, Resync);
        assert_eq!(node.role().await, Role::Follower);

        // Stale leader yields to a higher term.
        let node = lone_node();
        node.become_leader().await;
        assert_eq!(node.handle_peer(Request::alive(2)).await, Resync);
        assert_eq!(node.role().await, Role::Follower);

        // A leader at or above the incoming term stands its ground.
        let node = lone_node();
        node.become_leader().await;
        assert_eq!(node.handle_peer(Request::alive(0)).await, Accept);
    }

    #[tokio::test]
    async fn update_log_rebuilds_store_from_baseline() {
        let node = lone_node();
        let pushed = vec![
            Commitment::add("k1", "v1"),
            Commitment::delete("banana"),
        ];

        let code = node
            .handle_peer(Request::update_log(4, pushed.clone()))
            .await;
        assert_eq!(code, Accept);
        assert_eq!(node.term().await, 4);
        assert_eq!(node.log_entries().await, pushed);

        let store = node.store_snapshot().await;
        assert_eq!(store.get("k1").map(String::as_str), Some("v1"));
        assert!(!store.contains_key("banana"));
        assert_eq!(store.get("apple").map(String::as_str), Some("2222"));
    }

    #[tokio::test]
    async fn peer_traffic_resets_election_timer() {
        let node = lone_node();
        {
            let mut raft = node.raft.lock().await;
            raft.time_left = 0;
        }
        node.handle_peer(Request::alive(0)).await;

        let raft = node.raft.lock().await;
        assert!(raft.time_left >= node.config.election_ticks_min);
        assert!(raft.time_left <= node.config.election_ticks_max);
    }

    #[tokio::test]
    async fn election_won_on_quorum() {
        let (node, mut h2, mut h3) = three_node_setup();

        let (_, b2, b3) = tokio::join!(
            node.hold_election(),
            h2.respond_one(Accept),
            h3.respond_one(Accept),
        );

        assert_eq!(b2.unwrap().name, RequestName::VoteForMe);
        assert_eq!(b3.unwrap().name, RequestName::VoteForMe);
        assert_eq!(node.role().await, Role::Leader);
        assert_eq!(node.term().await, 1);
    }

    #[tokio::test]
    async fn election_grants_flow_through_follower_nodes() {
        let (mut transports, mut handles) = create_cluster(&[SELF, P2, P3], None);
        let node1 = Arc::new(ClusterNode::new(
            NodeConfig::fast(),
            vec![P2.to_string(), P3.to_string()],
            transports.remove(SELF).unwrap(),
        ));
        let node2 = Arc::new(ClusterNode::new(
            NodeConfig::fast(),
            vec![SELF.to_string(), P3.to_string()],
            transports.remove(P2).unwrap(),
        ));
        let node3 = Arc::new(ClusterNode::new(
            NodeConfig::fast(),
            vec![SELF.to_string(), P2.to_string()],
            transports.remove(P3).unwrap(),
        ));
        let mut h1 = handles.remove(SELF).unwrap();
        let mut h2 = handles.remove(P2).unwrap();
        let mut h3 = handles.remove(P3).unwrap();

        let (_, _, _) = tokio::join!(
            node1.hold_election(),
            h2.process_one(&node2),
            h3.process_one(&node3),
        );

        assert_eq!(node1.role().await, Role::Leader);
        assert_eq!(node1.term().await, 1);
        // Voters adopted the candidate's term.
        assert_eq!(node2.term().await, 1);
        assert_eq!(node3.term().await, 1);

        // A rival trying the next term finds the ledger spent at the leader
        // (leaders never vote) and node3 free to grant only once.
        let (_, _, _) = tokio::join!(
            node2.hold_election(),
            h1.process_one(&node1),
            h3.process_one(&node3),
        );
        // node2 ran at term 2: node3 grants (first vote there), node1 denies.
        assert_eq!(node2.role().await, Role::Leader);
        assert_eq!(node2.term().await, 2);

        // No two leaders ever share a term.
        assert_ne!(node1.term().await, node2.term().await);
    }

    #[tokio::test]
    async fn election_with_single_peer_vote_still_wins() {
        // Quorum of 3 nodes is 2: self plus one ballot.
        let (node, mut h2, mut h3) = three_node_setup();

        let (_, _, _) = tokio::join!(
            node.hold_election(),
            h2.respond_one(Accept),
            h3.respond_one(Deny),
        );

        assert_eq!(node.role().await, Role::Leader);
    }

    #[tokio::test]
    async fn election_lost_stays_candidate_and_bumps_term() {
        let (node, mut h2, mut h3) = three_node_setup();

        let (_, _, _) = tokio::join!(
            node.hold_election(),
            h2.respond_one(Deny),
            h3.respond_one(Deny),
        );
        assert_eq!(node.role().await, Role::Candidate);
        assert_eq!(node.term().await, 1);

        // A retry runs in a fresh term.
        let (_, _, _) = tokio::join!(
            node.hold_election(),
            h2.respond_one(Deny),
            h3.respond_one(Deny),
        );
        assert_eq!(node.term().await, 2);
    }

    #[tokio::test]
    async fn mutation_commits_on_quorum_with_one_commit_per_voter() {
        let (node, h2, h3) = three_node_setup();
        node.become_leader().await;

        let pump = |mut handle: NodeHandle| async move {
            let mut seen = Vec::new();
            seen.push(handle.respond_one(Accept).await.unwrap().name);
            seen.push(handle.respond_one(Accept).await.unwrap().name);
            seen
        };

        let (response, seen2, seen3) = tokio::join!(
            node.handle_request(Request::add("k1", "v1")),
            pump(h2),
            pump(h3),
        );

        assert_eq!(response, Response::Code(Accept));
        assert_eq!(seen2, vec![RequestName::AddToLog, RequestName::Commit]);
        assert_eq!(seen3, vec![RequestName::AddToLog, RequestName::Commit]);

        assert_eq!(
            node.store_snapshot().await.get("k1").map(String::as_str),
            Some("v1")
        );
        let log = node.log_entries().await;
        assert_eq!(log.last().unwrap().key, "k1");
    }

    #[tokio::test]
    async fn mutation_without_quorum_rolls_back() {
        let (node, mut h2, mut h3) = three_node_setup();
        node.become_leader().await;
        let log_before = node.log_entries().await.len();

        let (response, r2, r3) = tokio::join!(
            node.handle_request(Request::add("k1", "v1")),
            h2.respond_one(Deny),
            h3.respond_one(Deny),
        );

        assert_eq!(response, Response::Code(Deny));
        assert_eq!(r2.unwrap().name, RequestName::AddToLog);
        assert_eq!(r3.unwrap().name, RequestName::AddToLog);
        assert_eq!(node.log_entries().await.len(), log_before);
        assert!(!node.store_snapshot().await.contains_key("k1"));
    }

    #[tokio::test]
    async fn duplicate_add_rolls_back_on_every_voter() {
        let (node, h2, h3) = three_node_setup();
        node.become_leader().await;
        let log_before = node.log_entries().await.len();

        // Voters accept the append; the apply then fails on the leader and
        // each voter is told to pop the entry again.
        let pump = |mut handle: NodeHandle| async move {
            let mut seen = Vec::new();
            seen.push(handle.respond_one(Accept).await.unwrap().name);
            seen.push(handle.respond_one(Accept).await.unwrap().name);
            seen
        };

        let (response, seen2, seen3) = tokio::join!(
            node.handle_request(Request::add("banana", "X")),
            pump(h2),
            pump(h3),
        );

        assert_eq!(response, Response::Code(Deny));
        assert_eq!(seen2, vec![RequestName::AddToLog, RequestName::RmFromLog]);
        assert_eq!(seen3, vec![RequestName::AddToLog, RequestName::RmFromLog]);
        assert_eq!(node.log_entries().await.len(), log_before);
        assert_eq!(
            node.store_snapshot().await.get("banana").map(String::as_str),
            Some("1111")
        );
    }

    #[tokio::test]
    async fn rename_collision_rejected() {
        let (node, h2, h3) = three_node_setup();
        node.become_leader().await;

        let pump = |mut handle: NodeHandle| async move {
            handle.respond_one(Accept).await;
            handle.respond_one(Accept).await;
        };

        let (response, _, _) = tokio::join!(
            node.handle_request(Request::update("apple", "banana", "Y")),
            pump(h2),
            pump(h3),
        );

        assert_eq!(response, Response::Code(Deny));
        let store = node.store_snapshot().await;
        assert_eq!(store.get("apple").map(String::as_str), Some("2222"));
        assert_eq!(store.get("banana").map(String::as_str), Some("1111"));
    }

    #[tokio::test]
    async fn unreachable_peers_count_as_non_votes() {
        // Both peers drop the request channel entirely.
        let (mut transports, handles) = create_cluster(&[SELF, P2, P3], None);
        drop(handles);
        let node = Arc::new(ClusterNode::new(
            NodeConfig::fast(),
            vec![P2.to_string(), P3.to_string()],
            transports.remove(SELF).unwrap(),
        ));
        node.become_leader().await;

        let response = node.handle_request(Request::add("k1", "v1")).await;
        assert_eq!(response, Response::Code(Deny));
        assert!(node.log_entries().await.is_empty());
    }
}
