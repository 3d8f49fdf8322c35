//! The dispatcher: handler registration, cursors, and fixed-delay polling.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use cloudpipe_events::{MessageId, StreamStore};
use futures::FutureExt;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::event::Event;
use crate::producer::EventProducer;
use crate::registry::{MemoryCursorStore, MemoryTaskRegistry, PollTarget, PollTask};
use crate::traits::{CursorStore, EventHandler, TaskRegistry};

/// Where a newly enabled handler starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    /// Replay the whole stream.
    Beginning,
    /// Skip the backlog; only records appended after registration.
    Newest,
    /// Resume strictly after this message id.
    After(MessageId),
}

impl StartPosition {
    /// Decode a numeric start pointer: `0` replays everything, `i64::MAX`
    /// starts at the tip, any other positive value resumes after that id.
    pub fn from_pointer(pointer: i64) -> EngineResult<Self> {
        match pointer {
            0 => Ok(Self::Beginning),
            i64::MAX => Ok(Self::Newest),
            p if p > 0 => Ok(Self::After(MessageId::new(p))),
            p => Err(EngineError::InvalidStartPointer(p)),
        }
    }
}

/// Runs one recurring polling task per enabled handler.
///
/// Tasks for different handlers run concurrently, bounded by
/// `EngineConfig::worker_threads`. Batches for the same handler never
/// overlap: the next poll is scheduled one interval after the previous one
/// completes, and `poll_now` shares the same per-handler guard.
///
/// There is no way to disable a single handler. Tasks live until they are
/// replaced with `force`, until `shutdown`, or until the engine is dropped.
pub struct EventSourcingEngine {
    streams: Arc<dyn StreamStore>,
    cursors: Arc<dyn CursorStore>,
    tasks: Arc<dyn TaskRegistry>,
    workers: Arc<Semaphore>,
    read_limit: Option<usize>,
    // Serialises enable_handler so check-then-install is atomic per engine.
    registration: Mutex<()>,
}

impl EventSourcingEngine {
    /// Engine with in-memory cursors and task registry.
    pub fn new(streams: impl StreamStore + 'static, config: EngineConfig) -> Self {
        Self::with_stores(
            Arc::new(streams),
            Arc::new(MemoryCursorStore::new()),
            Arc::new(MemoryTaskRegistry::new()),
            config,
        )
    }

    pub fn with_stores(
        streams: Arc<dyn StreamStore>,
        cursors: Arc<dyn CursorStore>,
        tasks: Arc<dyn TaskRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            streams,
            cursors,
            tasks,
            workers: Arc::new(Semaphore::new(config.worker_threads.max(1))),
            read_limit: config.read_limit,
            registration: Mutex::new(()),
        }
    }

    /// Bind a producer to `stream`.
    pub fn register_producer(&self, stream: &str) -> EngineResult<EventProducer> {
        if stream.is_empty() {
            return Err(EngineError::EmptyStream);
        }
        Ok(EventProducer::new(stream, self.streams.clone()))
    }

    /// Register `handler` against `stream` and start polling it every
    /// `frequency`. The first poll fires after one interval.
    ///
    /// If a handler with the same name is already enabled, `force = false`
    /// fails with `AlreadyRegistered` and leaves everything untouched;
    /// `force = true` cancels the old task, waits for it to stop, and
    /// starts over from `start`. If the new cursor cannot be resolved or
    /// stored, the old registration is put back as it was.
    pub async fn enable_handler(
        &self,
        stream: &str,
        start: StartPosition,
        handler: impl EventHandler + 'static,
        frequency: Duration,
        force: bool,
    ) -> EngineResult<()> {
        if stream.is_empty() {
            return Err(EngineError::EmptyStream);
        }
        let name = handler.name().to_string();
        if name.is_empty() {
            return Err(EngineError::EmptyHandlerName);
        }
        if frequency.is_zero() {
            return Err(EngineError::InvalidFrequency { name });
        }

        let _registering = self.registration.lock().await;

        let replacing = self.tasks.contains(&name);
        if replacing && !force {
            warn!(handler = name.as_str(), stream, "Handler already registered");
            return Err(EngineError::AlreadyRegistered { name });
        }

        // Stop the old task before reading the start position, so nothing it
        // delivers can also fall after the new cursor.
        let previous = match self.tasks.take(&name) {
            Some(task) => {
                let target = task.target().clone();
                task.cancel().await;
                info!(
                    handler = name.as_str(),
                    stream = target.stream(),
                    "Cancelled previous polling task"
                );
                Some(target)
            }
            None => None,
        };

        let cursor = match self.install_cursor(&name, stream, start).await {
            Ok(cursor) => cursor,
            Err(e) => {
                if let Some(previous) = previous {
                    self.restore(&name, &previous);
                }
                return Err(e);
            }
        };

        let target = PollTarget::new(stream, Arc::new(handler), frequency);
        let join = self.spawn_poll_loop(target.clone());
        self.tasks.insert(name.clone(), PollTask::new(target, join));

        info!(
            handler = name.as_str(),
            stream,
            %cursor,
            frequency_ms = frequency.as_millis() as u64,
            replaced = replacing,
            "Handler enabled"
        );
        Ok(())
    }

    /// Run one poll batch for `name` right now. Returns how many records
    /// were delivered.
    pub async fn poll_now(&self, name: &str) -> EngineResult<usize> {
        let target = self
            .tasks
            .get(name)
            .ok_or_else(|| EngineError::NotRegistered {
                name: name.to_string(),
            })?;

        self.poller()
            .poll(&target)
            .await
            .map_err(|source| EngineError::Poll {
                name: name.to_string(),
                source,
            })
    }

    /// Last delivered id for `name`, or its start cursor if nothing has been
    /// delivered yet.
    pub async fn cursor(&self, name: &str) -> EngineResult<Option<MessageId>> {
        self.cursors.get(name).await.map_err(EngineError::Store)
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.tasks.contains(name)
    }

    pub fn handler_names(&self) -> Vec<String> {
        self.tasks.names()
    }

    /// Cancel every polling task and wait for all of them to stop.
    pub async fn shutdown(&self) {
        let _registering = self.registration.lock().await;
        let tasks = self.tasks.drain();
        let count = tasks.len();
        futures::future::join_all(tasks.into_iter().map(PollTask::cancel)).await;
        info!(tasks = count, "Engine shut down");
    }

    async fn install_cursor(
        &self,
        name: &str,
        stream: &str,
        start: StartPosition,
    ) -> EngineResult<MessageId> {
        let cursor = self.resolve_start(stream, start).await?;
        self.cursors
            .set(name, cursor)
            .await
            .map_err(EngineError::Store)?;
        Ok(cursor)
    }

    /// Reinstall a cancelled registration unchanged. Its cursor was never
    /// touched, so it resumes where it stopped.
    fn restore(&self, name: &str, previous: &PollTarget) {
        let target = previous.successor();
        let join = self.spawn_poll_loop(target.clone());
        self.tasks.insert(name.to_string(), PollTask::new(target, join));
        warn!(
            handler = name,
            stream = previous.stream(),
            "Re-registration failed, previous polling task restored"
        );
    }

    async fn resolve_start(&self, stream: &str, start: StartPosition) -> EngineResult<MessageId> {
        match start {
            StartPosition::Beginning => Ok(MessageId::BEGINNING),
            StartPosition::After(id) if !id.is_newest() => Ok(id),
            StartPosition::Newest | StartPosition::After(_) => self
                .streams
                .latest_id(stream)
                .await
                .map_err(EngineError::Store),
        }
    }

    fn poller(&self) -> Poller {
        Poller {
            streams: self.streams.clone(),
            cursors: self.cursors.clone(),
            workers: self.workers.clone(),
            read_limit: self.read_limit,
        }
    }

    fn spawn_poll_loop(&self, target: PollTarget) -> JoinHandle<()> {
        let poller = self.poller();
        let frequency = target.frequency();

        tokio::spawn(async move {
            let name = target.handler().name().to_string();
            loop {
                tokio::time::sleep(frequency).await;

                match poller.poll(&target).await {
                    Ok(0) => {}
                    Ok(delivered) => debug!(
                        handler = name.as_str(),
                        stream = target.stream(),
                        delivered,
                        "Poll batch delivered"
                    ),
                    Err(e) => warn!(
                        handler = name.as_str(),
                        stream = target.stream(),
                        error = %format!("{e:#}"),
                        "Poll batch aborted, retrying next interval"
                    ),
                }
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Poller: one batch. Read after cursor, deliver, advance
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct Poller {
    streams: Arc<dyn StreamStore>,
    cursors: Arc<dyn CursorStore>,
    workers: Arc<Semaphore>,
    read_limit: Option<usize>,
}

impl Poller {
    async fn poll(&self, target: &PollTarget) -> Result<usize> {
        let _batch = target.batch_guard().lock().await;
        if target.is_retired() {
            return Ok(0);
        }
        let _worker = self.workers.acquire().await?;

        let handler = target.handler();
        let name = handler.name();

        let after = self
            .cursors
            .get(name)
            .await?
            .unwrap_or(MessageId::BEGINNING);

        let entries = self
            .streams
            .read_after(target.stream(), after, self.read_limit)
            .await
            .with_context(|| format!("reading {} after {after}", target.stream()))?;

        let mut delivered = 0;
        for entry in entries {
            let id = entry.id;
            let event = Event::from_entry(handler.event_type(), entry);

            AssertUnwindSafe(handler.handle(event))
                .catch_unwind()
                .await
                .map_err(|_| anyhow!("handler panicked"))
                .and_then(|result| result)
                .with_context(|| format!("handling message {id}"))?;

            // Advance only after the handler accepted the record.
            self.cursors.set(name, id).await?;
            delivered += 1;
        }

        Ok(delivered)
    }
}
