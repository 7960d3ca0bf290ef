//! Node timing parameters.

use std::time::Duration;

/// Timing knobs for one replication node. Defaults reproduce the production
/// cadence: 1 s ticks, elections after 5–14 idle ticks, heartbeats paced at
/// 1 tick per peer with 5 ticks between rounds, 2 s RPC deadline. Tests
/// shrink `tick` and keep the ratios.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Length of one election-timer countdown step.
    pub tick: Duration,
    /// Inclusive lower bound of the election window, in ticks.
    pub election_ticks_min: u32,
    /// Inclusive upper bound of the election window, in ticks.
    pub election_ticks_max: u32,
    /// Pause between heartbeat targets, in ticks.
    pub heartbeat_peer_pause_ticks: u32,
    /// Pause between heartbeat rounds, in ticks.
    pub heartbeat_round_pause_ticks: u32,
    /// Per-RPC deadline; a call past this counts as a failure.
    pub rpc_deadline: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            election_ticks_min: 5,
            election_ticks_max: 14,
            heartbeat_peer_pause_ticks: 1,
            heartbeat_round_pause_ticks: 5,
            rpc_deadline: Duration::from_secs(2),
        }
    }
}

impl NodeConfig {
    /// Config with all durations scaled down for tests. Heartbeat rounds are
    /// tightened so in a small cluster every follower hears the leader well
    /// inside its shortest election window.
    pub fn fast() -> Self {
        Self {
            tick: Duration::from_millis(20),
            heartbeat_round_pause_ticks: 1,
            rpc_deadline: Duration::from_millis(500),
            ..Self::default()
        }
    }

    /// Uniform draw from the election window.
    pub fn random_election_ticks(&self) -> u32 {
        use rand::Rng;
        rand::rng().random_range(self.election_ticks_min..=self.election_ticks_max)
    }

    pub fn heartbeat_peer_pause(&self) -> Duration {
        self.tick * self.heartbeat_peer_pause_ticks
    }

    pub fn heartbeat_round_pause(&self) -> Duration {
        self.tick * self.heartbeat_round_pause_ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn election_window_draw_is_in_range() {
        let config = NodeConfig::default();
        for _ in 0..100 {
            let ticks = config.random_election_ticks();
            assert!((5..=14).contains(&ticks));
        }
    }

    #[test]
    fn default_cadence() {
        let config = NodeConfig::default();
        assert_eq!(config.tick, Duration::from_secs(1));
        assert_eq!(config.heartbeat_peer_pause(), Duration::from_secs(1));
        assert_eq!(config.heartbeat_round_pause(), Duration::from_secs(5));
        assert_eq!(config.rpc_deadline, Duration::from_secs(2));
    }
}
