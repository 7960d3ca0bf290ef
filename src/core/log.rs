//! The replicated log: an ordered, in-memory sequence of commitments.
//!
//! The leader appends tentatively before soliciting quorum and rolls the
//! entry back when quorum or the state-machine apply fails. Followers only
//! ever append, pop, or wholesale-replace their log on resync.

use serde::{Deserialize, Serialize};

/// The three mutations the state machine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitOp {
    Add,
    Update,
    Delete,
}

/// A single command to the state machine. Immutable once constructed.
///
/// On the wire this is the `CI` record: `{name, key, value, oldKey}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    #[serde(rename = "name")]
    pub op: CommitOp,
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(rename = "oldKey", default)]
    pub old_key: String,
}

impl Commitment {
    pub fn add(key: impl Into<String>, value: impl Into<String>) -> Self {
        Commitment {
            op: CommitOp::Add,
            key: key.into(),
            value: value.into(),
            old_key: String::new(),
        }
    }

    pub fn update(
        old_key: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Commitment {
            op: CommitOp::Update,
            key: key.into(),
            value: value.into(),
            old_key: old_key.into(),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Commitment {
            op: CommitOp::Delete,
            key: key.into(),
            value: String::new(),
            old_key: String::new(),
        }
    }
}

/// Ordered sequence of commitments. The commit protocol only ever references
/// the last entry; everything before it is settled history.
#[derive(Debug, Clone, Default)]
pub struct ReplicatedLog {
    entries: Vec<Commitment>,
}

impl ReplicatedLog {
    pub fn new() -> Self {
        ReplicatedLog::default()
    }

    /// Append an entry that is not yet known to be committed.
    pub fn append_tentative(&mut self, commitment: Commitment) {
        self.entries.push(commitment);
    }

    /// Undo the most recent tentative append. Returns the removed entry,
    /// or `None` if the log is empty.
    pub fn rollback_last(&mut self) -> Option<Commitment> {
        self.entries.pop()
    }

    pub fn last(&self) -> Option<&Commitment> {
        self.entries.last()
    }

    /// Copy of the full log for transport (`updateLog` / resync).
    pub fn snapshot(&self) -> Vec<Commitment> {
        self.entries.clone()
    }

    /// Replace the entire log with one pushed by the leader.
    pub fn replace(&mut self, entries: Vec<Commitment>) {
        self.entries = entries;
    }

    pub fn entries(&self) -> &[Commitment] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_rollback_restores_previous_tail() {
        let mut log = ReplicatedLog::new();
        log.append_tentative(Commitment::add("a", "1"));
        log.append_tentative(Commitment::add("b", "2"));

        let popped = log.rollback_last().unwrap();
        assert_eq!(popped.key, "b");
        assert_eq!(log.last().unwrap().key, "a");
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn rollback_on_empty_log_is_none() {
        let mut log = ReplicatedLog::new();
        assert!(log.rollback_last().is_none());
    }

    #[test]
    fn replace_swaps_full_contents() {
        let mut log = ReplicatedLog::new();
        log.append_tentative(Commitment::add("stale", "x"));

        log.replace(vec![
            Commitment::add("a", "1"),
            Commitment::delete("a"),
        ]);

        assert_eq!(log.len(), 2);
        assert_eq!(log.last().unwrap().op, CommitOp::Delete);
    }

    #[test]
    fn snapshot_is_a_copy() {
        let mut log = ReplicatedLog::new();
        log.append_tentative(Commitment::add("a", "1"));

        let snap = log.snapshot();
        log.rollback_last();

        assert_eq!(snap.len(), 1);
        assert!(log.is_empty());
    }

    #[test]
    fn commitment_wire_shape() {
        let c = Commitment::update("old", "new", "v");
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["name"], "update");
        assert_eq!(json["key"], "new");
        assert_eq!(json["value"], "v");
        assert_eq!(json["oldKey"], "old");

        let back: Commitment = serde_json::from_value(json).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn commitment_decodes_with_missing_optionals() {
        let c: Commitment =
            serde_json::from_str(r#"{"name":"delete","key":"banana"}"#).unwrap();
        assert_eq!(c.op, CommitOp::Delete);
        assert_eq!(c.value, "");
        assert_eq!(c.old_key, "");
    }
}
