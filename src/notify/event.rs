//! Distributed events and their batch encoding

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::util::time::unix_nanos;

/// Event kinds observer clients key their behavior off
pub mod kind {
    pub const GAME: &str = "game";
    pub const STATS: &str = "stats";
    pub const FLAG: &str = "flag";
    pub const USERINFO: &str = "userinfo";
    pub const INITIAL: &str = "initial";
    pub const INFO: &str = "info";
    pub const CHAT: &str = "chat";
}

/// One queued notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "obj")]
    pub payload: serde_json::Value,
    #[serde(rename = "unixn")]
    pub timestamp_nanos: i64,
}

impl Event {
    /// Serialize `payload` and stamp it with the current time
    pub fn new<T: Serialize + ?Sized>(kind: &str, payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind: kind.to_string(),
            payload: serde_json::to_value(payload)?,
            timestamp_nanos: unix_nanos(),
        })
    }
}

/// Encode a drained queue as one JSON array
pub fn serialize_batch(events: &[Event]) -> Result<Bytes, serde_json::Error> {
    serde_json::to_vec(events).map(Bytes::from)
}

/// Inverse of [`serialize_batch`], used by tests and tooling
pub fn parse_batch(batch: &[u8]) -> Result<Vec<Event>, serde_json::Error> {
    serde_json::from_slice(batch)
}
