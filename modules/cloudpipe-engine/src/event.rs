//! The event envelope.

use cloudpipe_events::{Fields, StreamEntry};

/// Reserved payload key carrying the event type on stream records.
pub const EVENT_TYPE_FIELD: &str = "eventType";

/// An immutable type tag plus string payload.
///
/// Built with `Event::new(..).with_field(..)` on the producer side and
/// handed to handlers by the engine. Not retained by the engine after
/// delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    event_type: String,
    data: Fields,
}

impl Event {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: Fields::new(),
        }
    }

    pub fn from_parts(event_type: impl Into<String>, data: Fields) -> Self {
        Self {
            event_type: event_type.into(),
            data,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn data(&self) -> &Fields {
        &self.data
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    /// The type the producer stamped onto the record, if any.
    ///
    /// Delivered events are labelled with the receiving handler's type, so
    /// this is the only way to see what was actually written.
    pub fn stored_type(&self) -> Option<&str> {
        self.get(EVENT_TYPE_FIELD)
    }

    /// Payload as written to the stream: data plus the reserved type key.
    pub(crate) fn to_record(&self) -> Fields {
        let mut record = self.data.clone();
        record.insert(EVENT_TYPE_FIELD.to_string(), self.event_type.clone());
        record
    }

    /// Rebuild an event from a stream record under the handler's type.
    pub(crate) fn from_entry(event_type: &str, entry: StreamEntry) -> Self {
        Self::from_parts(event_type, entry.fields)
    }
}
