//! In-memory stream store for tests and single-process setups.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use crate::store::StreamStore;
use crate::types::{Fields, MessageId, StreamEntry};

/// Streams held in process memory. Ids come from one counter shared by
/// all streams, so they increase within each stream as well. Thread-safe.
pub struct MemoryStreamStore {
    next_id: AtomicI64,
    streams: Mutex<HashMap<String, Vec<StreamEntry>>>,
}

impl MemoryStreamStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            streams: Mutex::new(HashMap::new()),
        }
    }

    /// Every record on a stream (for test assertions).
    pub fn entries(&self, stream: &str) -> Vec<StreamEntry> {
        let streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
        streams.get(stream).cloned().unwrap_or_default()
    }
}

impl Default for MemoryStreamStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamStore for MemoryStreamStore {
    async fn append(&self, stream: &str, fields: &Fields) -> Result<MessageId> {
        let mut streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
        // Allocate under the lock so pushes stay in id order.
        let id = MessageId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        streams
            .entry(stream.to_string())
            .or_default()
            .push(StreamEntry {
                id,
                stream: stream.to_string(),
                fields: fields.clone(),
                ts: Utc::now(),
            });
        Ok(id)
    }

    async fn read_after(
        &self,
        stream: &str,
        after: MessageId,
        limit: Option<usize>,
    ) -> Result<Vec<StreamEntry>> {
        let streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(entries) = streams.get(stream) else {
            return Ok(Vec::new());
        };

        let start = entries.partition_point(|e| e.id <= after);
        let available = &entries[start..];
        let take = limit.unwrap_or(available.len()).min(available.len());
        Ok(available[..take].to_vec())
    }

    async fn latest_id(&self, stream: &str) -> Result<MessageId> {
        let streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(streams
            .get(stream)
            .and_then(|entries| entries.last())
            .map(|e| e.id)
            .unwrap_or(MessageId::BEGINNING))
    }
}
