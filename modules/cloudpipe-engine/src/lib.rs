//! Event-sourcing engine over a keyed stream.
//!
//! Producers append typed events to named streams. Handlers are enabled
//! against a stream with a starting position and a polling frequency; the
//! engine runs one fixed-delay polling task per handler, delivers every new
//! record in id order, and advances that handler's cursor after each
//! successful delivery. Delivery is at-least-once.
//!
//! Cursor and task state sit behind `CursorStore` and `TaskRegistry`, so the
//! in-memory defaults can be swapped for a durable backend.

pub mod acl;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod producer;
pub mod registry;
pub mod traits;

pub use config::EngineConfig;
pub use engine::{EventSourcingEngine, StartPosition};
pub use error::{EngineError, EngineResult};
pub use event::{Event, EVENT_TYPE_FIELD};
pub use producer::EventProducer;
pub use registry::{MemoryCursorStore, MemoryTaskRegistry, PollTarget, PollTask};
pub use traits::{CursorStore, EventHandler, TaskRegistry};
