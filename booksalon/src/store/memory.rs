use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard},
};

use log::debug;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::errors::SalonError;

use super::{
    CHANGE_CHANNEL_CAPACITY, Change, DocumentStore, FieldOp, Query, SetMode,
    document::{Document, apply_ops, into_object, merge, run_query},
};

type Collections = HashMap<String, BTreeMap<String, Map<String, Value>>>;

/// In-process document store used by tests and local runs.
///
/// Every operation holds the lock for its whole read-modify-write, so op lists
/// and create-if-absent are atomic exactly as they are against a remote store.
#[derive(Clone)]
pub struct MemoryStore {
    collections: Arc<Mutex<Collections>>,
    changes: broadcast::Sender<Change>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            collections: Arc::new(Mutex::new(HashMap::new())),
            changes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        // Ops run on a copy, so a poisoned map is still consistent.
        self.collections.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, change: Change) {
        debug!("memory store {:?} {}/{}", change.kind, change.collection, change.id);
        // No receivers is not an error.
        let _ = self.changes.send(change);
    }

    /// Number of documents currently stored in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        self.lock().get(collection).map(BTreeMap::len).unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, SalonError> {
        let guard = self.lock();
        Ok(guard
            .get(collection)
            .and_then(|documents| documents.get(id))
            .map(|data| Document::new(id, data.clone())))
    }

    async fn set(&self, collection: &str, id: &str, data: Value, mode: SetMode) -> Result<(), SalonError> {
        let incoming = into_object(data)?;
        {
            let mut guard = self.lock();
            let documents = guard.entry(collection.to_string()).or_default();
            if mode == SetMode::Merge && documents.contains_key(id) {
                if let Some(existing) = documents.get_mut(id) {
                    merge(existing, incoming);
                }
            } else {
                documents.insert(id.to_string(), incoming);
            }
        }
        self.publish(Change::written(collection, id));
        Ok(())
    }

    async fn create(&self, collection: &str, id: &str, data: Value) -> Result<(), SalonError> {
        let incoming = into_object(data)?;
        {
            let mut guard = self.lock();
            let documents = guard.entry(collection.to_string()).or_default();
            if documents.contains_key(id) {
                return Err(SalonError::AlreadyExists {
                    entity: "document",
                    id: format!("{collection}/{id}"),
                });
            }
            documents.insert(id.to_string(), incoming);
        }
        self.publish(Change::written(collection, id));
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, ops: &[FieldOp]) -> Result<(), SalonError> {
        {
            let mut guard = self.lock();
            let Some(existing) = guard.get_mut(collection).and_then(|documents| documents.get_mut(id)) else {
                return Err(SalonError::not_found("document", format!("{collection}/{id}")));
            };
            let mut next = existing.clone();
            apply_ops(&mut next, ops)?;
            *existing = next;
        }
        self.publish(Change::written(collection, id));
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), SalonError> {
        let removed = self
            .lock()
            .get_mut(collection)
            .and_then(|documents| documents.remove(id))
            .is_some();
        if removed {
            self.publish(Change::deleted(collection, id));
        }
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, SalonError> {
        let documents: Vec<Document> = {
            let guard = self.lock();
            match guard.get(&query.collection) {
                Some(documents) => documents
                    .iter()
                    .map(|(id, data)| Document::new(id.clone(), data.clone()))
                    .collect(),
                None => Vec::new(),
            }
        };
        Ok(run_query(documents, query))
    }

    fn changes(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }
}
