//! Keyed, append-only stream primitive.
//!
//! A stream is a named, totally ordered log of string-to-string field maps.
//! Every appended record gets a store-assigned [`MessageId`] that only grows
//! within its stream. Readers address records by an exclusive lower bound,
//! which is all a polling consumer needs to keep a cursor.
//!
//! Zero knowledge of event types, handlers, or cursors. Those live in
//! `cloudpipe-engine`.

pub mod memory;
pub mod store;
pub mod types;

pub use memory::MemoryStreamStore;
pub use store::{PgStreamStore, StreamStore};
pub use types::{Fields, MessageId, StreamEntry};
