//! Behaviour tests for MemoryStreamStore. No database required.

use cloudpipe_events::{Fields, MemoryStreamStore, MessageId, StreamStore};

fn fields(pairs: &[(&str, &str)]) -> Fields {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn append_assigns_increasing_ids() {
    let store = MemoryStreamStore::new();

    let a = store.append("jobs", &fields(&[("n", "1")])).await.unwrap();
    let b = store.append("jobs", &fields(&[("n", "2")])).await.unwrap();

    assert!(a > MessageId::BEGINNING);
    assert!(b > a);
}

#[tokio::test]
async fn read_after_is_exclusive_and_ordered() {
    let store = MemoryStreamStore::new();
    let first = store.append("jobs", &fields(&[("n", "1")])).await.unwrap();
    store.append("jobs", &fields(&[("n", "2")])).await.unwrap();
    store.append("jobs", &fields(&[("n", "3")])).await.unwrap();

    let all = store.read_after("jobs", MessageId::BEGINNING, None).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].field("n"), Some("1"));
    assert_eq!(all[2].field("n"), Some("3"));

    let rest = store.read_after("jobs", first, None).await.unwrap();
    assert_eq!(rest.len(), 2);
    assert_eq!(rest[0].field("n"), Some("2"));
}

#[tokio::test]
async fn read_after_respects_limit() {
    let store = MemoryStreamStore::new();
    for n in 0..5 {
        store
            .append("jobs", &fields(&[("n", n.to_string().as_str())]))
            .await
            .unwrap();
    }

    let page = store.read_after("jobs", MessageId::BEGINNING, Some(2)).await.unwrap();
    assert_eq!(page.len(), 2);

    let rest = store.read_after("jobs", page[1].id, Some(10)).await.unwrap();
    assert_eq!(rest.len(), 3);
}

#[tokio::test]
async fn streams_are_isolated() {
    let store = MemoryStreamStore::new();
    store.append("a", &fields(&[("k", "a")])).await.unwrap();
    let b = store.append("b", &fields(&[("k", "b")])).await.unwrap();

    let entries = store.read_after("b", MessageId::BEGINNING, None).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, b);
    assert_eq!(entries[0].stream, "b");
}

#[tokio::test]
async fn unknown_stream_reads_empty() {
    let store = MemoryStreamStore::new();

    let entries = store.read_after("nope", MessageId::BEGINNING, None).await.unwrap();
    assert!(entries.is_empty());
    assert_eq!(store.latest_id("nope").await.unwrap(), MessageId::BEGINNING);
}

#[tokio::test]
async fn latest_id_tracks_tip() {
    let store = MemoryStreamStore::new();
    store.append("jobs", &fields(&[])).await.unwrap();
    let tip = store.append("jobs", &fields(&[])).await.unwrap();

    assert_eq!(store.latest_id("jobs").await.unwrap(), tip);
    assert!(store.read_after("jobs", tip, None).await.unwrap().is_empty());
}

#[test]
fn sentinels_bracket_every_assigned_id() {
    let id = MessageId::new(42);
    assert!(MessageId::BEGINNING < id);
    assert!(id < MessageId::NEWEST);
    assert!(MessageId::BEGINNING.is_beginning());
    assert!(MessageId::NEWEST.is_newest());
    assert_eq!(id.to_string(), "42");
}
