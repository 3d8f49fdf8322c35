//! StreamStore: the read/write contract, plus the Postgres backend.
//!
//! Records of every stream share one `stream_entries` table. Appends to the
//! same stream are serialised by a transaction-scoped advisory lock, so ids
//! within a stream commit in the order they were allocated. A reader can
//! therefore never observe id N+1 before id N, and a cursor that moves past
//! an id never skips a late commit.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::debug;

use crate::types::{Fields, MessageId, StreamEntry};

/// Append-with-generated-id and exclusive range reads over named streams.
///
/// Implemented by `PgStreamStore` (production) and `MemoryStreamStore`
/// (tests). Also implemented for `Arc<S>` so a store can be shared between
/// an engine and test assertions.
#[async_trait]
pub trait StreamStore: Send + Sync {
    /// Append one record and return the id the store assigned to it.
    async fn append(&self, stream: &str, fields: &Fields) -> Result<MessageId>;

    /// Read every record with an id strictly greater than `after`, oldest
    /// first. Never waits for new data: an empty vector means "nothing yet".
    /// `limit = None` returns everything available.
    async fn read_after(
        &self,
        stream: &str,
        after: MessageId,
        limit: Option<usize>,
    ) -> Result<Vec<StreamEntry>>;

    /// Id of the newest record, or `MessageId::BEGINNING` if the stream is empty.
    async fn latest_id(&self, stream: &str) -> Result<MessageId>;
}

#[async_trait]
impl<S: StreamStore + ?Sized> StreamStore for Arc<S> {
    async fn append(&self, stream: &str, fields: &Fields) -> Result<MessageId> {
        (**self).append(stream, fields).await
    }

    async fn read_after(
        &self,
        stream: &str,
        after: MessageId,
        limit: Option<usize>,
    ) -> Result<Vec<StreamEntry>> {
        (**self).read_after(stream, after, limit).await
    }

    async fn latest_id(&self, stream: &str) -> Result<MessageId> {
        (**self).latest_id(stream).await
    }
}

// ---------------------------------------------------------------------------
// PgStreamStore
// ---------------------------------------------------------------------------

/// Stream store backed by a single Postgres table.
#[derive(Clone)]
pub struct PgStreamStore {
    pool: PgPool,
}

impl PgStreamStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the backing table and index. Idempotent.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS stream_entries (
                id      BIGSERIAL    PRIMARY KEY,
                stream  TEXT         NOT NULL,
                fields  JSONB        NOT NULL,
                ts      TIMESTAMPTZ  NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS stream_entries_stream_id ON stream_entries (stream, id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StreamStore for PgStreamStore {
    async fn append(&self, stream: &str, fields: &Fields) -> Result<MessageId> {
        let mut tx = self.pool.begin().await?;

        // Held until commit: the next append to this stream cannot allocate
        // an id until ours is visible.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(stream)
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query_as::<_, (i64,)>(
            r#"
            INSERT INTO stream_entries (stream, fields)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(stream)
        .bind(Json(fields))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let id = MessageId::new(row.0);
        debug!(stream, %id, "Appended stream entry");
        Ok(id)
    }

    async fn read_after(
        &self,
        stream: &str,
        after: MessageId,
        limit: Option<usize>,
    ) -> Result<Vec<StreamEntry>> {
        // LIMIT NULL is "no limit" in Postgres.
        let limit = limit.map(|n| n as i64);

        let rows = sqlx::query_as::<_, StreamEntry>(
            r#"
            SELECT id, stream, fields, ts
            FROM stream_entries
            WHERE stream = $1 AND id > $2
            ORDER BY id ASC
            LIMIT $3
            "#,
        )
        .bind(stream)
        .bind(after.value())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn latest_id(&self, stream: &str) -> Result<MessageId> {
        let row = sqlx::query_as::<_, (Option<i64>,)>(
            "SELECT MAX(id) FROM stream_entries WHERE stream = $1",
        )
        .bind(stream)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0.map(MessageId::new).unwrap_or(MessageId::BEGINNING))
    }
}

// ---------------------------------------------------------------------------
// sqlx::FromRow for StreamEntry
// ---------------------------------------------------------------------------

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StreamEntry {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        use sqlx::Row;
        let fields: Json<Fields> = row.try_get("fields")?;
        Ok(StreamEntry {
            id: MessageId::new(row.try_get("id")?),
            stream: row.try_get("stream")?,
            fields: fields.0,
            ts: row.try_get("ts")?,
        })
    }
}
