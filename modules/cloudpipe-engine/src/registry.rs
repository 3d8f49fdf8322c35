//! Polling task handles and the in-memory cursor/task stores.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use cloudpipe_events::MessageId;
use tokio::task::JoinHandle;

use crate::traits::{CursorStore, EventHandler, TaskRegistry};

// ---------------------------------------------------------------------------
// PollTarget / PollTask
// ---------------------------------------------------------------------------

/// A handler bound to a stream and polling interval, plus the guard that
/// keeps its batches from overlapping.
#[derive(Clone)]
pub struct PollTarget {
    stream: String,
    handler: Arc<dyn EventHandler>,
    frequency: Duration,
    batch_guard: Arc<tokio::sync::Mutex<()>>,
    retired: Arc<AtomicBool>,
}

impl PollTarget {
    pub fn new(
        stream: impl Into<String>,
        handler: Arc<dyn EventHandler>,
        frequency: Duration,
    ) -> Self {
        Self {
            stream: stream.into(),
            handler,
            frequency,
            batch_guard: Arc::new(tokio::sync::Mutex::new(())),
            retired: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn handler(&self) -> &Arc<dyn EventHandler> {
        &self.handler
    }

    pub fn frequency(&self) -> Duration {
        self.frequency
    }

    /// A fresh, unretired target for the same handler, stream and interval.
    pub(crate) fn successor(&self) -> Self {
        Self::new(self.stream.clone(), self.handler.clone(), self.frequency)
    }

    pub(crate) fn batch_guard(&self) -> &tokio::sync::Mutex<()> {
        &self.batch_guard
    }

    /// Set once the owning task is cancelled. A retired target delivers
    /// nothing, even to a manual poll that was already waiting on it.
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }
}

/// The recurring polling task of one handler. Aborted on drop.
pub struct PollTask {
    target: PollTarget,
    join: JoinHandle<()>,
}

impl PollTask {
    pub fn new(target: PollTarget, join: JoinHandle<()>) -> Self {
        Self { target, join }
    }

    pub fn target(&self) -> &PollTarget {
        &self.target
    }

    /// Abort the task and wait until neither it nor a manual poll is still
    /// running a batch for this target.
    pub async fn cancel(mut self) {
        self.target.retired.store(true, Ordering::SeqCst);
        self.join.abort();
        // JoinError is expected here: the task was cancelled.
        let _ = (&mut self.join).await;
        let _idle = self.target.batch_guard.lock().await;
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.join.abort();
    }
}

// ---------------------------------------------------------------------------
// MemoryCursorStore
// ---------------------------------------------------------------------------

/// Cursors kept in process memory. Lost on restart.
#[derive(Default)]
pub struct MemoryCursorStore {
    cursors: Mutex<HashMap<String, MessageId>>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn get(&self, handler: &str) -> Result<Option<MessageId>> {
        let cursors = self.cursors.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(cursors.get(handler).copied())
    }

    async fn set(&self, handler: &str, id: MessageId) -> Result<()> {
        let mut cursors = self.cursors.lock().unwrap_or_else(PoisonError::into_inner);
        cursors.insert(handler.to_string(), id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryTaskRegistry
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryTaskRegistry {
    tasks: Mutex<HashMap<String, PollTask>>,
}

impl MemoryTaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PollTask>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TaskRegistry for MemoryTaskRegistry {
    fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    fn get(&self, name: &str) -> Option<PollTarget> {
        self.lock().get(name).map(|task| task.target().clone())
    }

    fn insert(&self, name: String, task: PollTask) -> Option<PollTask> {
        self.lock().insert(name, task)
    }

    fn take(&self, name: &str) -> Option<PollTask> {
        self.lock().remove(name)
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn drain(&self) -> Vec<PollTask> {
        self.lock().drain().map(|(_, task)| task).collect()
    }
}
