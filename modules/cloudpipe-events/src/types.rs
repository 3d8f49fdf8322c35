//! Core types for the stream primitive. Domain-agnostic.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload of a stream record. Streams only store string fields.
pub type Fields = BTreeMap<String, String>;

/// Store-assigned id of a stream record.
///
/// Opaque to callers apart from its ordering: within one stream, a later
/// append always has a greater id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(i64);

impl MessageId {
    /// Exclusive lower bound that selects the whole stream.
    pub const BEGINNING: MessageId = MessageId(0);

    /// Sentinel for "the tip of the stream". Never assigned to a record;
    /// consumers resolve it to a concrete id before reading.
    pub const NEWEST: MessageId = MessageId(i64::MAX);

    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> i64 {
        self.0
    }

    pub fn is_beginning(self) -> bool {
        self == Self::BEGINNING
    }

    pub fn is_newest(self) -> bool {
        self == Self::NEWEST
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A record as read back from a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEntry {
    pub id: MessageId,
    pub stream: String,
    pub fields: Fields,
    pub ts: DateTime<Utc>,
}

impl StreamEntry {
    /// Look up a single field.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}
