//! Wire records: one framed JSON request and one framed JSON response per
//! TCP connection.
//!
//! Requests carry a sender class and a request name plus whichever optional
//! fields that request uses. Peer responses are a bare integer `0 | 1 | 2`;
//! the one exception is `itemMap`, answered with a key→value mapping.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::log::Commitment;

/// Who is asking: the web tier or a cluster peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Web,
    Node,
}

/// Every request the dispatcher understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestName {
    Leader,
    ItemMap,
    Add,
    Update,
    Delete,
    VoteForMe,
    AddToLog,
    RmFromLog,
    Commit,
    Alive,
    UpdateLog,
}

/// The framed request record. All fields beyond `from` and `name` are
/// optional and absent unless the request uses them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub from: Sender,
    pub name: RequestName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(rename = "oldKey", default, skip_serializing_if = "Option::is_none")]
    pub old_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<u64>,
    #[serde(rename = "CI", default, skip_serializing_if = "Option::is_none")]
    pub ci: Option<Commitment>,
    #[serde(rename = "CILog", default, skip_serializing_if = "Option::is_none")]
    pub ci_log: Option<Vec<Commitment>>,
}

impl Request {
    fn bare(from: Sender, name: RequestName) -> Self {
        Request {
            from,
            name,
            key: None,
            value: None,
            old_key: None,
            term: None,
            ci: None,
            ci_log: None,
        }
    }

    /// Web-tier probe: "are you the leader?"
    pub fn leader_probe() -> Self {
        Self::bare(Sender::Web, RequestName::Leader)
    }

    /// Web-tier request for a snapshot of the store.
    pub fn item_map() -> Self {
        Self::bare(Sender::Web, RequestName::ItemMap)
    }

    pub fn add(key: impl Into<String>, value: impl Into<String>) -> Self {
        Request {
            key: Some(key.into()),
            value: Some(value.into()),
            ..Self::bare(Sender::Web, RequestName::Add)
        }
    }

    pub fn update(
        old_key: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Request {
            key: Some(key.into()),
            value: Some(value.into()),
            old_key: Some(old_key.into()),
            ..Self::bare(Sender::Web, RequestName::Update)
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Request {
            key: Some(key.into()),
            ..Self::bare(Sender::Web, RequestName::Delete)
        }
    }

    pub fn vote_for_me(term: u64) -> Self {
        Request {
            term: Some(term),
            ..Self::bare(Sender::Node, RequestName::VoteForMe)
        }
    }

    pub fn add_to_log(commitment: Commitment) -> Self {
        Request {
            ci: Some(commitment),
            ..Self::bare(Sender::Node, RequestName::AddToLog)
        }
    }

    pub fn rm_from_log() -> Self {
        Self::bare(Sender::Node, RequestName::RmFromLog)
    }

    pub fn commit() -> Self {
        Self::bare(Sender::Node, RequestName::Commit)
    }

    pub fn alive(term: u64) -> Self {
        Request {
            term: Some(term),
            ..Self::bare(Sender::Node, RequestName::Alive)
        }
    }

    pub fn update_log(term: u64, log: Vec<Commitment>) -> Self {
        Request {
            term: Some(term),
            ci_log: Some(log),
            ..Self::bare(Sender::Node, RequestName::UpdateLog)
        }
    }
}

/// Single-integer peer response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ResponseCode {
    /// Failure or denial.
    Deny,
    /// Success or acceptance.
    Accept,
    /// Heartbeat path only: the responder needs a log resync.
    Resync,
}

impl From<ResponseCode> for u8 {
    fn from(code: ResponseCode) -> u8 {
        match code {
            ResponseCode::Deny => 0,
            ResponseCode::Accept => 1,
            ResponseCode::Resync => 2,
        }
    }
}

impl TryFrom<u8> for ResponseCode {
    type Error = String;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(ResponseCode::Deny),
            1 => Ok(ResponseCode::Accept),
            2 => Ok(ResponseCode::Resync),
            other => Err(format!("unknown response code {other}")),
        }
    }
}

/// Everything a node can write back on a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Code(ResponseCode),
    Items(HashMap<String, String>),
}

impl Response {
    pub fn code(&self) -> Option<ResponseCode> {
        match self {
            Response::Code(code) => Some(*code),
            Response::Items(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_names_use_wire_spelling() {
        let cases = [
            (RequestName::Leader, "leader"),
            (RequestName::ItemMap, "itemMap"),
            (RequestName::Add, "add"),
            (RequestName::Update, "update"),
            (RequestName::Delete, "delete"),
            (RequestName::VoteForMe, "voteForMe"),
            (RequestName::AddToLog, "addToLog"),
            (RequestName::RmFromLog, "rmFromLog"),
            (RequestName::Commit, "commit"),
            (RequestName::Alive, "alive"),
            (RequestName::UpdateLog, "updateLog"),
        ];
        for (name, expected) in cases {
            assert_eq!(serde_json::to_value(name).unwrap(), expected);
        }
    }

    #[test]
    fn request_omits_unused_fields() {
        let json = serde_json::to_value(Request::alive(3)).unwrap();
        assert_eq!(json["from"], "node");
        assert_eq!(json["name"], "alive");
        assert_eq!(json["term"], 3);
        assert!(json.get("key").is_none());
        assert!(json.get("CI").is_none());
        assert!(json.get("CILog").is_none());
    }

    #[test]
    fn request_round_trips() {
        let req = Request::update_log(7, vec![Commitment::add("k", "v")]);
        let json = serde_json::to_string(&req).unwrap();
        let back: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn unknown_sender_class_fails_to_decode() {
        let raw = r#"{"from":"stranger","name":"leader"}"#;
        assert!(serde_json::from_str::<Request>(raw).is_err());
    }

    #[test]
    fn response_code_is_a_bare_integer() {
        assert_eq!(
            serde_json::to_string(&Response::Code(ResponseCode::Resync)).unwrap(),
            "2"
        );
        let back: Response = serde_json::from_str("1").unwrap();
        assert_eq!(back, Response::Code(ResponseCode::Accept));
    }

    #[test]
    fn response_items_is_a_mapping() {
        let mut items = HashMap::new();
        items.insert("banana".to_string(), "1111".to_string());
        let json = serde_json::to_string(&Response::Items(items.clone())).unwrap();
        let back: Response = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Response::Items(items));
    }

    #[test]
    fn out_of_range_code_rejected() {
        assert!(serde_json::from_str::<ResponseCode>("3").is_err());
    }
}
