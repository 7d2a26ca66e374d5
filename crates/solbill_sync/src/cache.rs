//! Typed layer over the durable store: one snapshot document per collection.

use crate::entity::{now_millis, Entity, EntityId};
use crate::error::SyncResult;
use crate::remote::RemoteRecord;
use parking_lot::Mutex;
use solbill_store::StoreBackend;
use std::sync::Arc;

/// The local durable cache of entity collections.
///
/// Each collection is persisted as one JSON document named after the
/// collection. The cache holds both canonical-looking snapshots (the last
/// known remote state) and unsynced entities awaiting replay.
///
/// Read-modify-write cycles serialize behind one mutex; the UI thread and
/// the background replayer both mutate the cache.
pub struct LocalCache {
    backend: Arc<dyn StoreBackend>,
    write_lock: Mutex<()>,
}

impl LocalCache {
    /// Creates a cache over the given store backend.
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self {
            backend,
            write_lock: Mutex::new(()),
        }
    }

    /// Reads all cached entities of a collection.
    pub fn read_all(&self, collection: &str) -> SyncResult<Vec<Entity>> {
        match self.backend.load(collection)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    /// Replaces the cached snapshot of a collection.
    pub fn write_all(&self, collection: &str, entities: &[Entity]) -> SyncResult<()> {
        let _guard = self.write_lock.lock();
        self.save(collection, entities)
    }

    /// Fetches one cached entity by id.
    pub fn get(&self, collection: &str, id: &EntityId) -> SyncResult<Option<Entity>> {
        Ok(self
            .read_all(collection)?
            .into_iter()
            .find(|e| e.id == *id))
    }

    /// Inserts or replaces one entity.
    pub fn upsert(&self, collection: &str, entity: Entity) -> SyncResult<()> {
        let _guard = self.write_lock.lock();
        let mut entities = self.read_all(collection)?;
        match entities.iter_mut().find(|e| e.id == entity.id) {
            Some(slot) => *slot = entity,
            None => entities.push(entity),
        }
        self.save(collection, &entities)
    }

    /// Removes one entity. Returns true if it was present.
    pub fn remove(&self, collection: &str, id: &EntityId) -> SyncResult<bool> {
        let _guard = self.write_lock.lock();
        let mut entities = self.read_all(collection)?;
        let before = entities.len();
        entities.retain(|e| e.id != *id);
        let removed = entities.len() != before;
        if removed {
            self.save(collection, &entities)?;
        }
        Ok(removed)
    }

    /// Promotes a cached entity to its remote-confirmed state: the id is
    /// replaced and the record is marked synced with the remote's payload.
    ///
    /// Returns true if the entity was found.
    pub fn promote(&self, collection: &str, old: &EntityId, record: &RemoteRecord) -> SyncResult<bool> {
        let _guard = self.write_lock.lock();
        let mut entities = self.read_all(collection)?;
        let Some(entity) = entities.iter_mut().find(|e| e.id == *old) else {
            return Ok(false);
        };

        entity.id = EntityId::remote(record.id.clone());
        entity.fields = record.payload.clone();
        entity.updated_at = record.updated_at;
        entity.synced = true;
        self.save(collection, &entities)?;
        Ok(true)
    }

    /// Marks a cached entity as confirmed by the remote store.
    pub fn mark_synced(&self, collection: &str, id: &EntityId) -> SyncResult<bool> {
        let _guard = self.write_lock.lock();
        let mut entities = self.read_all(collection)?;
        let Some(entity) = entities.iter_mut().find(|e| e.id == *id) else {
            return Ok(false);
        };
        entity.synced = true;
        entity.updated_at = now_millis();
        self.save(collection, &entities)?;
        Ok(true)
    }

    fn save(&self, collection: &str, entities: &[Entity]) -> SyncResult<()> {
        let bytes = serde_json::to_vec(entities)?;
        self.backend.save(collection, &bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Document;
    use serde_json::json;
    use solbill_store::MemoryBackend;

    fn cache() -> LocalCache {
        LocalCache::new(Arc::new(MemoryBackend::new()))
    }

    fn doc(value: serde_json::Value) -> Document {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn empty_collection_reads_empty() {
        let cache = cache();
        assert!(cache.read_all("customers").unwrap().is_empty());
        assert!(cache.get("customers", &EntityId::local()).unwrap().is_none());
    }

    #[test]
    fn upsert_then_get() {
        let cache = cache();
        let entity = Entity::new_local(doc(json!({"name": "Ana"})));

        cache.upsert("customers", entity.clone()).unwrap();
        let found = cache.get("customers", &entity.id).unwrap();
        assert_eq!(found, Some(entity));
    }

    #[test]
    fn upsert_replaces_same_id() {
        let cache = cache();
        let mut entity = Entity::new_local(doc(json!({"name": "Ana"})));
        cache.upsert("customers", entity.clone()).unwrap();

        entity.merge_patch(&doc(json!({"name": "Ana Lima"})));
        cache.upsert("customers", entity.clone()).unwrap();

        let all = cache.read_all("customers").unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].fields["name"], json!("Ana Lima"));
    }

    #[test]
    fn remove_reports_presence() {
        let cache = cache();
        let entity = Entity::new_local(Document::new());
        cache.upsert("customers", entity.clone()).unwrap();

        assert!(cache.remove("customers", &entity.id).unwrap());
        assert!(!cache.remove("customers", &entity.id).unwrap());
    }

    #[test]
    fn promote_rewrites_id_and_marks_synced() {
        let cache = cache();
        let entity = Entity::new_local(doc(json!({"name": "Ana"})));
        let old_id = entity.id.clone();
        cache.upsert("customers", entity).unwrap();

        let record = RemoteRecord {
            id: "cust-1".into(),
            payload: doc(json!({"name": "Ana"})),
            created_at: 1,
            updated_at: 2,
        };
        assert!(cache.promote("customers", &old_id, &record).unwrap());

        let all = cache.read_all("customers").unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, EntityId::remote("cust-1"));
        assert!(all[0].synced);
        assert!(cache.get("customers", &old_id).unwrap().is_none());
    }

    #[test]
    fn promote_missing_returns_false() {
        let cache = cache();
        let record = RemoteRecord {
            id: "cust-1".into(),
            payload: Document::new(),
            created_at: 0,
            updated_at: 0,
        };
        assert!(!cache.promote("customers", &EntityId::local(), &record).unwrap());
    }

    #[test]
    fn collections_are_independent() {
        let cache = cache();
        let customer = Entity::new_local(Document::new());
        let plant = Entity::new_local(Document::new());

        cache.upsert("customers", customer.clone()).unwrap();
        cache.upsert("plants", plant.clone()).unwrap();

        assert_eq!(cache.read_all("customers").unwrap(), vec![customer]);
        assert_eq!(cache.read_all("plants").unwrap(), vec![plant]);
    }
}
