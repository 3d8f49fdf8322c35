//! ACL cache invalidation through the engine.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cloudpipe_engine::acl::{
    acl_update_event, AclCache, AclCacheInvalidator, ObjectIdentity, ACL_UPDATE,
    ENTITY_CLASS_FIELD, ENTITY_ID_FIELD,
};
use cloudpipe_engine::{EngineConfig, Event, EventHandler, EventSourcingEngine, StartPosition};
use cloudpipe_events::MemoryStreamStore;

#[derive(Default)]
struct RecordingCache {
    evicted: Mutex<Vec<ObjectIdentity>>,
}

impl AclCache for RecordingCache {
    fn evict(&self, identity: &ObjectIdentity) {
        self.evicted.lock().unwrap().push(identity.clone());
    }
}

#[test]
fn update_event_carries_entity_fields() {
    let event = acl_update_event("Pipeline", "42");
    assert_eq!(event.event_type(), ACL_UPDATE);
    assert_eq!(event.get(ENTITY_CLASS_FIELD), Some("Pipeline"));
    assert_eq!(event.get(ENTITY_ID_FIELD), Some("42"));
}

#[test]
fn identity_is_built_from_entity_class() {
    let event = acl_update_event("Pipeline", "42");
    let identity = AclCacheInvalidator::<Arc<RecordingCache>>::identity_for(&event).unwrap();
    assert_eq!(identity, ObjectIdentity::new("Pipeline", "Pipeline"));
}

#[tokio::test]
async fn missing_entity_class_is_skipped() {
    let cache = Arc::new(RecordingCache::default());
    let invalidator = AclCacheInvalidator::new(cache.clone());

    invalidator
        .handle(Event::new(ACL_UPDATE).with_field(ENTITY_ID_FIELD, "42"))
        .await
        .unwrap();
    assert!(cache.evicted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn published_update_evicts_cache_entry() {
    let engine = EventSourcingEngine::new(MemoryStreamStore::new(), EngineConfig::default());
    let cache = Arc::new(RecordingCache::default());
    let invalidator = AclCacheInvalidator::new(cache.clone());
    assert_eq!(invalidator.name(), "acl-cache-invalidator");

    engine
        .enable_handler(
            "acl",
            StartPosition::Newest,
            invalidator,
            Duration::from_secs(3600),
            false,
        )
        .await
        .unwrap();

    let producer = engine.register_producer("acl").unwrap();
    producer
        .produce(&acl_update_event("Folder", "7"))
        .await
        .unwrap();

    assert_eq!(engine.poll_now("acl-cache-invalidator").await.unwrap(), 1);
    assert_eq!(
        *cache.evicted.lock().unwrap(),
        vec![ObjectIdentity::new("Folder", "Folder")]
    );
}
