//! State machine layer: the deterministic key-value map that committed log
//! entries are folded into.

pub mod kv;

pub use kv::ItemStore;

use crate::core::log::Commitment;

/// Errors surfaced by the state machine. The leader maps any of these to a
/// `0` response; the kind is only visible in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("key must not be empty")]
    EmptyKey,
    #[error("key already exists")]
    Exists,
    #[error("new key is taken")]
    Taken,
    #[error("no such key")]
    Missing,
}

/// The fixed bootstrap sequence every node folds into its store at startup.
/// Treated as pre-committed before term 0; resync re-seeds from this baseline.
pub fn bootstrap_log() -> Vec<Commitment> {
    vec![
        Commitment::add("banana", "1111"),
        Commitment::add("apple", "2222"),
        Commitment::add("orange", "3333"),
        Commitment::add("grapes", "tes4"),
        Commitment::add("peach", "tes5"),
        Commitment::add("fruits", "tes6"),
        Commitment::add("oreo", "tes7"),
    ]
}
