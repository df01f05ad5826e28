//! Real-time view binding.
//!
//! A subscription delivers the complete current result on open and a fresh
//! complete result after every relevant write; there are no diffs. Live views
//! hold the latest snapshot as local state, accept optimistic local edits
//! that the next snapshot overwrites, and unsubscribe on unmount or drop.
//! Independent bindings are not coordinated with one another.

use log::debug;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{
    errors::SalonError,
    store::{Change, Document, DocumentStore, Query},
};

/// Waits for the next change accepted by `relevant`, coalescing anything
/// already queued behind it. `false` once the hub is closed.
async fn wait_for_change(changes: &mut broadcast::Receiver<Change>, relevant: impl Fn(&Change) -> bool) -> bool {
    loop {
        match changes.recv().await {
            Ok(change) if relevant(&change) => break,
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                debug!("subscription lagged by {skipped} changes; re-reading");
                break;
            }
            Err(RecvError::Closed) => return false,
        }
    }
    while let Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) = changes.try_recv() {}
    true
}

/// Push-based live query over one collection.
pub struct QuerySubscription<S> {
    store: S,
    query: Query,
    changes: broadcast::Receiver<Change>,
    primed: bool,
}

impl<S: DocumentStore> QuerySubscription<S> {
    /// Subscribes before the first read so no write between the two is missed.
    pub fn open(store: &S, query: Query) -> Self {
        Self {
            changes: store.changes(),
            store: store.clone(),
            query,
            primed: false,
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Next full snapshot; `None` when the store's change hub has closed.
    pub async fn next(&mut self) -> Option<Result<Vec<Document>, SalonError>> {
        if self.primed {
            let collection = self.query.collection.as_str();
            if !wait_for_change(&mut self.changes, |change| change.collection == collection).await {
                return None;
            }
        }
        self.primed = true;
        Some(self.store.query(&self.query).await)
    }
}

/// Push-based live view of one document; `None` snapshots mean "absent".
pub struct DocumentSubscription<S> {
    store: S,
    collection: String,
    id: String,
    changes: broadcast::Receiver<Change>,
    primed: bool,
}

impl<S: DocumentStore> DocumentSubscription<S> {
    pub fn open(store: &S, collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            changes: store.changes(),
            store: store.clone(),
            collection: collection.into(),
            id: id.into(),
            primed: false,
        }
    }

    pub async fn next(&mut self) -> Option<Result<Option<Document>, SalonError>> {
        if self.primed {
            let (collection, id) = (self.collection.as_str(), self.id.as_str());
            if !wait_for_change(&mut self.changes, |change| change.collection == collection && change.id == id).await {
                return None;
            }
        }
        self.primed = true;
        Some(self.store.get(&self.collection, &self.id).await)
    }
}

/// Local state bound to a query subscription.
pub struct LiveQuery<T, S> {
    subscription: Option<QuerySubscription<S>>,
    items: Vec<T>,
    snapshots: u64,
}

impl<T, S> LiveQuery<T, S>
where
    T: DeserializeOwned,
    S: DocumentStore,
{
    /// Subscribes and loads the initial snapshot.
    pub async fn mount(store: &S, query: Query) -> Result<Self, SalonError> {
        let mut live = Self {
            subscription: Some(QuerySubscription::open(store, query)),
            items: Vec::new(),
            snapshots: 0,
        };
        live.refresh().await?;
        Ok(live)
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Number of snapshots applied so far, the initial one included.
    pub fn snapshots(&self) -> u64 {
        self.snapshots
    }

    pub fn is_mounted(&self) -> bool {
        self.subscription.is_some()
    }

    /// Waits for the next pushed snapshot and replaces local state with it.
    /// Returns `false` when unmounted or when the store stopped publishing.
    pub async fn refresh(&mut self) -> Result<bool, SalonError> {
        let Some(subscription) = self.subscription.as_mut() else {
            return Ok(false);
        };
        let Some(snapshot) = subscription.next().await else {
            return Ok(false);
        };
        self.items = snapshot?.iter().map(Document::decode).collect::<Result<_, _>>()?;
        self.snapshots += 1;
        Ok(true)
    }

    /// Edits local state ahead of the server; the next snapshot wins.
    pub fn apply_optimistic(&mut self, edit: impl FnOnce(&mut Vec<T>)) {
        edit(&mut self.items);
    }

    pub fn unmount(&mut self) {
        if self.subscription.take().is_some() {
            debug!("live query unmounted after {} snapshots", self.snapshots);
        }
    }
}

impl<T, S> Drop for LiveQuery<T, S> {
    fn drop(&mut self) {
        self.subscription.take();
    }
}

/// Local state bound to a single-document subscription.
pub struct LiveDocument<T, S> {
    subscription: Option<DocumentSubscription<S>>,
    value: Option<T>,
}

impl<T, S> LiveDocument<T, S>
where
    T: DeserializeOwned,
    S: DocumentStore,
{
    pub async fn mount(store: &S, collection: &str, id: &str) -> Result<Self, SalonError> {
        let mut live = Self {
            subscription: Some(DocumentSubscription::open(store, collection, id)),
            value: None,
        };
        live.refresh().await?;
        Ok(live)
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn is_mounted(&self) -> bool {
        self.subscription.is_some()
    }

    pub async fn refresh(&mut self) -> Result<bool, SalonError> {
        let Some(subscription) = self.subscription.as_mut() else {
            return Ok(false);
        };
        let Some(snapshot) = subscription.next().await else {
            return Ok(false);
        };
        self.value = snapshot?.map(|document| document.decode()).transpose()?;
        Ok(true)
    }

    pub fn apply_optimistic(&mut self, edit: impl FnOnce(&mut Option<T>)) {
        edit(&mut self.value);
    }

    pub fn unmount(&mut self) {
        self.subscription.take();
    }
}

impl<T, S> Drop for LiveDocument<T, S> {
    fn drop(&mut self) {
        self.subscription.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FieldOp, MemoryStore};
    use serde::Deserialize;
    use serde_json::json;
    use std::time::Duration;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        id: String,
        #[serde(default)]
        n: i64,
    }

    #[tokio::test]
    async fn subscription_yields_full_snapshots() {
        let store = MemoryStore::new();
        store.create("rows", "a", json!({"n": 1})).await.expect("seed");
        let mut subscription = QuerySubscription::open(&store, Query::collection("rows"));
        let first = subscription.next().await.expect("open").expect("query");
        assert_eq!(first.len(), 1);

        store.create("other", "x", json!({})).await.expect("unrelated write");
        store.create("rows", "b", json!({"n": 2})).await.expect("write");
        let second = subscription.next().await.expect("open").expect("query");
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn optimistic_edit_is_replaced_by_next_snapshot() {
        let store = MemoryStore::new();
        store.create("rows", "a", json!({"n": 1})).await.expect("seed");
        let mut live: LiveQuery<Row, _> = LiveQuery::mount(&store, Query::collection("rows")).await.expect("mount");
        live.apply_optimistic(|rows| rows[0].n = 99);
        assert_eq!(live.items()[0].n, 99);

        store.update("rows", "a", &[FieldOp::increment("n", 1)]).await.expect("update");
        assert!(live.refresh().await.expect("refresh"));
        assert_eq!(live.items(), &[Row { id: "a".into(), n: 2 }]);
        assert_eq!(live.snapshots(), 2);
    }

    #[tokio::test]
    async fn unmounted_views_stop_updating() {
        let store = MemoryStore::new();
        store.create("rows", "a", json!({"n": 1})).await.expect("seed");
        let mut live: LiveDocument<Row, _> = LiveDocument::mount(&store, "rows", "a").await.expect("mount");
        assert_eq!(live.value().map(|row| row.n), Some(1));
        live.unmount();
        store.update("rows", "a", &[FieldOp::increment("n", 1)]).await.expect("update");
        let refreshed = tokio::time::timeout(Duration::from_millis(50), live.refresh())
            .await
            .expect("returns immediately")
            .expect("refresh");
        assert!(!refreshed);
        assert_eq!(live.value().map(|row| row.n), Some(1));
    }

    #[tokio::test]
    async fn document_subscription_reports_deletion() {
        let store = MemoryStore::new();
        store.create("rows", "a", json!({})).await.expect("seed");
        let mut subscription = DocumentSubscription::open(&store, "rows", "a");
        assert!(subscription.next().await.expect("open").expect("get").is_some());
        store.delete("rows", "a").await.expect("delete");
        assert!(subscription.next().await.expect("open").expect("get").is_none());
    }
}
