//! EventProducer: a stream-bound append function.

use std::sync::Arc;

use cloudpipe_events::{MessageId, StreamStore};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::event::Event;

/// Appends events to one stream. Cheap to clone; the engine keeps no record
/// of producers.
#[derive(Clone)]
pub struct EventProducer {
    stream: String,
    streams: Arc<dyn StreamStore>,
}

impl EventProducer {
    pub(crate) fn new(stream: impl Into<String>, streams: Arc<dyn StreamStore>) -> Self {
        Self {
            stream: stream.into(),
            streams,
        }
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Append `event` with its type stamped under `eventType`. Returns once
    /// the store has acknowledged the write.
    pub async fn produce(&self, event: &Event) -> EngineResult<MessageId> {
        if event.event_type().is_empty() {
            return Err(EngineError::EmptyEventType);
        }

        let id = self
            .streams
            .append(&self.stream, &event.to_record())
            .await
            .map_err(EngineError::Store)?;

        debug!(
            stream = self.stream.as_str(),
            event_type = event.event_type(),
            %id,
            "Produced event"
        );
        Ok(id)
    }
}
