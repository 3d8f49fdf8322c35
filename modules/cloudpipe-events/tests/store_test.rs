//! Integration tests for PgStreamStore.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use cloudpipe_events::{Fields, MessageId, PgStreamStore, StreamStore};
use sqlx::PgPool;

/// Get a migrated, empty store, or skip if no test DB is available.
async fn test_store() -> Option<PgStreamStore> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;
    let store = PgStreamStore::new(pool);
    store.migrate().await.ok()?;

    // Clean slate for each test
    sqlx::query("TRUNCATE stream_entries RESTART IDENTITY")
        .execute(store.pool())
        .await
        .ok()?;

    Some(store)
}

fn fields(pairs: &[(&str, &str)]) -> Fields {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn append_then_read_round_trips_fields() {
    let Some(store) = test_store().await else {
        return;
    };

    let id = store
        .append("runs", &fields(&[("runId", "7"), ("eventType", "RUN_STARTED")]))
        .await
        .unwrap();

    let entries = store.read_after("runs", MessageId::BEGINNING, None).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, id);
    assert_eq!(entries[0].field("runId"), Some("7"));
    assert_eq!(entries[0].field("eventType"), Some("RUN_STARTED"));
}

#[tokio::test]
async fn read_after_excludes_lower_bound() {
    let Some(store) = test_store().await else {
        return;
    };

    let a = store.append("runs", &fields(&[("n", "1")])).await.unwrap();
    let b = store.append("runs", &fields(&[("n", "2")])).await.unwrap();

    let entries = store.read_after("runs", a, None).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, b);
}

#[tokio::test]
async fn reads_are_scoped_to_stream() {
    let Some(store) = test_store().await else {
        return;
    };

    store.append("runs", &fields(&[("n", "1")])).await.unwrap();
    store.append("acl", &fields(&[("n", "2")])).await.unwrap();
    store.append("runs", &fields(&[("n", "3")])).await.unwrap();

    let runs = store.read_after("runs", MessageId::BEGINNING, None).await.unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|e| e.stream == "runs"));
    assert!(runs[0].id < runs[1].id);
}

#[tokio::test]
async fn limit_caps_batch() {
    let Some(store) = test_store().await else {
        return;
    };

    for n in 0..4 {
        store
            .append("runs", &fields(&[("n", n.to_string().as_str())]))
            .await
            .unwrap();
    }

    let page = store.read_after("runs", MessageId::BEGINNING, Some(3)).await.unwrap();
    assert_eq!(page.len(), 3);
}

#[tokio::test]
async fn latest_id_is_beginning_for_empty_stream() {
    let Some(store) = test_store().await else {
        return;
    };

    assert_eq!(store.latest_id("empty").await.unwrap(), MessageId::BEGINNING);

    let id = store.append("empty", &fields(&[])).await.unwrap();
    assert_eq!(store.latest_id("empty").await.unwrap(), id);
}

#[tokio::test]
async fn concurrent_appends_stay_ordered() {
    let Some(store) = test_store().await else {
        return;
    };

    let mut tasks = Vec::new();
    for n in 0..20 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            store
                .append("runs", &fields(&[("n", n.to_string().as_str())]))
                .await
                .unwrap()
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let entries = store.read_after("runs", MessageId::BEGINNING, None).await.unwrap();
    assert_eq!(entries.len(), 20);
    assert!(entries.windows(2).all(|w| w[0].id < w[1].id));
}
