//! ACL cache invalidation driven by `ACL_UPDATE` events.
//!
//! Permission changes are published on a stream; every node runs an
//! `AclCacheInvalidator` against it and evicts the affected object identity
//! from its local ACL cache.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::event::Event;
use crate::traits::EventHandler;

pub const ACL_UPDATE: &str = "ACL_UPDATE";
pub const ENTITY_CLASS_FIELD: &str = "entityClass";
pub const ENTITY_ID_FIELD: &str = "entityId";

const INVALIDATOR_NAME: &str = "acl-cache-invalidator";

/// Key of an ACL cache entry: the secured object's type and identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectIdentity {
    pub kind: String,
    pub identifier: String,
}

impl ObjectIdentity {
    pub fn new(kind: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            identifier: identifier.into(),
        }
    }
}

/// A cache of ACL entries that can drop a single object's entry.
pub trait AclCache: Send + Sync {
    fn evict(&self, identity: &ObjectIdentity);
}

impl<C: AclCache + ?Sized> AclCache for Arc<C> {
    fn evict(&self, identity: &ObjectIdentity) {
        (**self).evict(identity)
    }
}

/// Build the event a permission change publishes.
pub fn acl_update_event(entity_class: &str, entity_id: &str) -> Event {
    Event::new(ACL_UPDATE)
        .with_field(ENTITY_CLASS_FIELD, entity_class)
        .with_field(ENTITY_ID_FIELD, entity_id)
}

/// Evicts ACL cache entries named by `ACL_UPDATE` events.
pub struct AclCacheInvalidator<C> {
    cache: C,
}

impl<C: AclCache> AclCacheInvalidator<C> {
    pub fn new(cache: C) -> Self {
        Self { cache }
    }

    /// The identity evicted for `event`.
    ///
    /// Both halves come from `entityClass`; `entityId` is not read. This
    /// matches the deployed invalidator and is kept until the intended key
    /// is confirmed.
    pub fn identity_for(event: &Event) -> Option<ObjectIdentity> {
        let class = event.get(ENTITY_CLASS_FIELD)?;
        Some(ObjectIdentity::new(class, class))
    }
}

#[async_trait]
impl<C: AclCache> EventHandler for AclCacheInvalidator<C> {
    fn name(&self) -> &str {
        INVALIDATOR_NAME
    }

    fn event_type(&self) -> &str {
        ACL_UPDATE
    }

    async fn handle(&self, event: Event) -> Result<()> {
        let Some(identity) = Self::identity_for(&event) else {
            // Retrying cannot fix a malformed record, so skip it.
            warn!(
                stored_type = event.stored_type().unwrap_or("<none>"),
                "ACL update without entityClass, skipping"
            );
            return Ok(());
        };

        self.cache.evict(&identity);
        debug!(
            kind = identity.kind.as_str(),
            identifier = identity.identifier.as_str(),
            "Evicted ACL cache entry"
        );
        Ok(())
    }
}
