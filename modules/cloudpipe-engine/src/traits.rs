//! Seams of the engine: handlers, cursor storage, task bookkeeping.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use cloudpipe_events::MessageId;

use crate::event::Event;
use crate::registry::{PollTarget, PollTask};

/// A named consumer of stream records.
///
/// The engine does not filter by type: every record on the bound stream is
/// delivered, labelled with `event_type()`. Use `Event::stored_type` to see
/// the type the producer wrote.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Stable, process-unique identity. Used as the cursor key.
    fn name(&self) -> &str;

    /// The type this handler is interested in.
    fn event_type(&self) -> &str;

    /// Process one event. An error aborts the rest of the current batch;
    /// the failing record is retried on the next poll.
    async fn handle(&self, event: Event) -> Result<()>;
}

#[async_trait]
impl<H: EventHandler + ?Sized> EventHandler for Arc<H> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn event_type(&self) -> &str {
        (**self).event_type()
    }

    async fn handle(&self, event: Event) -> Result<()> {
        (**self).handle(event).await
    }
}

/// Last delivered message id per handler name.
///
/// Implemented by `MemoryCursorStore`. A durable implementation turns the
/// cursor into a restart checkpoint.
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn get(&self, handler: &str) -> Result<Option<MessageId>>;

    async fn set(&self, handler: &str, id: MessageId) -> Result<()>;
}

/// Active polling tasks per handler name.
///
/// Holds task handles, so it is always process-local. Implemented by
/// `MemoryTaskRegistry`.
pub trait TaskRegistry: Send + Sync {
    fn contains(&self, name: &str) -> bool;

    /// What to poll for `name`, without touching its task.
    fn get(&self, name: &str) -> Option<PollTarget>;

    /// Install a task, returning whatever was there before.
    fn insert(&self, name: String, task: PollTask) -> Option<PollTask>;

    fn take(&self, name: &str) -> Option<PollTask>;

    fn names(&self) -> Vec<String>;

    /// Remove every task. Only used at shutdown.
    fn drain(&self) -> Vec<PollTask>;
}
