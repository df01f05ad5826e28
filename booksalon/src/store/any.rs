use serde_json::Value;
use tokio::sync::broadcast;

use crate::errors::SalonError;

use super::{Change, Document, DocumentStore, FieldOp, MemoryStore, Query, RedisStore, SetMode};

/// Store chosen at runtime from configuration.
#[derive(Clone)]
pub enum AnyStore {
    Memory(MemoryStore),
    Redis(RedisStore),
}

impl From<MemoryStore> for AnyStore {
    fn from(store: MemoryStore) -> Self {
        Self::Memory(store)
    }
}

impl From<RedisStore> for AnyStore {
    fn from(store: RedisStore) -> Self {
        Self::Redis(store)
    }
}

impl AnyStore {
    pub fn backend(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Redis(_) => "redis",
        }
    }
}

macro_rules! delegate {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            AnyStore::Memory($store) => $call,
            AnyStore::Redis($store) => $call,
        }
    };
}

impl DocumentStore for AnyStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, SalonError> {
        delegate!(self, store => store.get(collection, id).await)
    }

    async fn set(&self, collection: &str, id: &str, data: Value, mode: SetMode) -> Result<(), SalonError> {
        delegate!(self, store => store.set(collection, id, data, mode).await)
    }

    async fn create(&self, collection: &str, id: &str, data: Value) -> Result<(), SalonError> {
        delegate!(self, store => store.create(collection, id, data).await)
    }

    async fn update(&self, collection: &str, id: &str, ops: &[FieldOp]) -> Result<(), SalonError> {
        delegate!(self, store => store.update(collection, id, ops).await)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), SalonError> {
        delegate!(self, store => store.delete(collection, id).await)
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, SalonError> {
        delegate!(self, store => store.query(query).await)
    }

    fn changes(&self) -> broadcast::Receiver<Change> {
        delegate!(self, store => store.changes())
    }
}
