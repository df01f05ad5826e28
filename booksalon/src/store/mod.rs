//! Document store contract consumed by every domain service.
//!
//! The store is schema-less: documents are JSON objects addressed by a
//! slash-separated collection path and an id. Besides CRUD it offers atomic
//! per-document field ops, filtered/ordered/cursored queries, and a change
//! feed that real-time bindings turn into full-snapshot subscriptions.

pub mod any;
pub mod document;
pub mod memory;
pub mod redis;
pub mod saga;
mod scripts;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::{errors::SalonError, id::generate_document_id};

pub use any::AnyStore;
pub use document::{Document, encode};
pub use memory::MemoryStore;
pub use redis::RedisStore;
pub use saga::Saga;

/// Capacity of the in-process change hub.
pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 1024;

#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Atomic field-level mutation. Paths are dotted (`unreadCount.uid`).
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    Set(String, Value),
    Increment(String, i64),
    ArrayUnion(String, Vec<Value>),
    ArrayRemove(String, Vec<Value>),
    Delete(String),
}

impl FieldOp {
    pub fn set(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Set(path.into(), value.into())
    }

    pub fn increment(path: impl Into<String>, delta: i64) -> Self {
        Self::Increment(path.into(), delta)
    }

    pub fn union(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::ArrayUnion(path.into(), vec![value.into()])
    }

    pub fn remove(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::ArrayRemove(path.into(), vec![value.into()])
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::Delete(path.into())
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Set(path, _)
            | Self::Increment(path, _)
            | Self::ArrayUnion(path, _)
            | Self::ArrayRemove(path, _)
            | Self::Delete(path) => path,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    Overwrite,
    Merge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    In,
    ArrayContains,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    pub fn is_in<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        Self::new(field, FilterOp::In, Value::Array(values))
    }

    pub fn array_contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::ArrayContains, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Gte, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Lte, value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortOrder,
}

/// Position after which a query resumes: the last document's id and order-by values.
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub id: String,
    #[serde(default)]
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
    pub start_after: Option<Cursor>,
}

impl Query {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            start_after: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: SortOrder) -> Self {
        self.order_by.push(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start_after(mut self, cursor: Cursor) -> Self {
        self.start_after = Some(cursor);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Written,
    Deleted,
}

/// Emitted after every successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub collection: String,
    pub id: String,
    pub kind: ChangeKind,
}

impl Change {
    pub fn written(collection: &str, id: &str) -> Self {
        Self {
            collection: collection.to_string(),
            id: id.to_string(),
            kind: ChangeKind::Written,
        }
    }

    pub fn deleted(collection: &str, id: &str) -> Self {
        Self {
            collection: collection.to_string(),
            id: id.to_string(),
            kind: ChangeKind::Deleted,
        }
    }
}

/// Remote document store operations.
#[allow(async_fn_in_trait)]
pub trait DocumentStore: Clone {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, SalonError>;

    async fn set(&self, collection: &str, id: &str, data: Value, mode: SetMode) -> Result<(), SalonError>;

    /// Writes only if no document exists under `id`; otherwise `AlreadyExists`.
    async fn create(&self, collection: &str, id: &str, data: Value) -> Result<(), SalonError>;

    /// Applies every op to one document atomically; `NotFound` when the document is absent.
    async fn update(&self, collection: &str, id: &str, ops: &[FieldOp]) -> Result<(), SalonError>;

    /// Removes the document; absent documents are not an error.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), SalonError>;

    async fn query(&self, query: &Query) -> Result<Vec<Document>, SalonError>;

    fn changes(&self) -> broadcast::Receiver<Change>;

    /// Creates a document under a generated id and returns the id.
    async fn add(&self, collection: &str, data: Value) -> Result<String, SalonError> {
        let id = generate_document_id();
        self.create(collection, &id, data).await?;
        Ok(id)
    }

    async fn fetch<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<Option<T>, SalonError> {
        match self.get(collection, id).await? {
            Some(document) => Ok(Some(document.decode()?)),
            None => Ok(None),
        }
    }

    async fn fetch_all<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<T>, SalonError> {
        self.query(query).await?.iter().map(Document::decode).collect()
    }

    async fn exists(&self, collection: &str, id: &str) -> Result<bool, SalonError> {
        Ok(self.get(collection, id).await?.is_some())
    }

    async fn put<T: Serialize>(&self, collection: &str, id: &str, value: &T) -> Result<(), SalonError> {
        let data = serde_json::to_value(value)?;
        self.set(collection, id, data, SetMode::Overwrite).await
    }
}
