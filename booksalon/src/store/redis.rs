//! Redis-backed document store.
//!
//! Layout under a key prefix:
//! - `{prefix}:doc:{collection}:{id}` holds the document body as a JSON string;
//! - `{prefix}:idx:{collection}` is the set of ids in a collection;
//! - `{prefix}:changes` is the pub/sub channel carrying [`ChangeEnvelope`]s.
//!
//! Every write goes through `lua/document_write.lua`, a compare-and-set
//! script that checks a guard, writes or deletes the body, maintains the id
//! set and publishes the change in one atomic step. Field ops are applied in
//! Rust against the body that was read and retried when another writer got in
//! first.

use futures_util::StreamExt;
use log::{debug, warn};
use redis::{AsyncCommands, aio::ConnectionManager};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::{
    errors::{RemoteService, SalonError},
    id::generate_event_id,
    keys::KeyContext,
};

use super::{
    CHANGE_CHANNEL_CAPACITY, Change, DocumentStore, FieldOp, Query, SetMode,
    document::{ChangeEnvelope, Document, apply_ops, into_object, merge, run_query},
    scripts::DOCUMENT_WRITE_SCRIPT,
};

/// Upper bound on compare-and-set retries for one update.
const MAX_CAS_ATTEMPTS: usize = 16;
/// Keys fetched per MGET round trip while scanning a collection.
const MGET_CHUNK_SIZE: usize = 256;

#[derive(Debug, Clone, Copy)]
enum WriteMode {
    Put,
    Delete,
}

impl WriteMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Put => "put",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Guard<'a> {
    Any,
    Absent,
    Match(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteOutcome {
    Ok,
    Exists,
    Missing,
    Conflict,
    Noop,
}

impl WriteOutcome {
    fn parse(raw: &str) -> Result<Self, SalonError> {
        match raw {
            "ok" => Ok(Self::Ok),
            "exists" => Ok(Self::Exists),
            "missing" => Ok(Self::Missing),
            "conflict" => Ok(Self::Conflict),
            "noop" => Ok(Self::Noop),
            other => Err(SalonError::remote(
                RemoteService::DocumentStore,
                format!("unexpected write script reply: {other}"),
            )),
        }
    }
}

#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    conn: ConnectionManager,
    prefix: String,
    origin: String,
    changes: broadcast::Sender<Change>,
}

impl RedisStore {
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, SalonError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client.clone()).await?;
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            client,
            conn,
            prefix: prefix.into(),
            origin: generate_event_id(),
            changes,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn keys(&self) -> KeyContext<'_> {
        KeyContext::new(&self.prefix)
    }

    async fn raw(&self, collection: &str, id: &str) -> Result<Option<String>, SalonError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(self.keys().document(collection, id)).await?;
        Ok(raw)
    }

    async fn write(
        &self,
        collection: &str,
        id: &str,
        mode: WriteMode,
        guard: Guard<'_>,
        body: &str,
    ) -> Result<WriteOutcome, SalonError> {
        let keys = self.keys();
        let change = match mode {
            WriteMode::Put => Change::written(collection, id),
            WriteMode::Delete => Change::deleted(collection, id),
        };
        let message = serde_json::to_string(&ChangeEnvelope {
            origin: self.origin.clone(),
            change: change.clone(),
        })?;
        let (guard_name, expected) = match guard {
            Guard::Any => ("any", ""),
            Guard::Absent => ("absent", ""),
            Guard::Match(expected) => ("match", expected),
        };

        let mut conn = self.conn.clone();
        let mut invocation = DOCUMENT_WRITE_SCRIPT.prepare_invoke();
        invocation
            .key(keys.document(collection, id))
            .key(keys.collection_index(collection))
            .arg(mode.as_str())
            .arg(guard_name)
            .arg(expected)
            .arg(body)
            .arg(id)
            .arg(keys.changes_channel())
            .arg(message);
        let reply: String = invocation.invoke_async(&mut conn).await?;
        let outcome = WriteOutcome::parse(&reply)?;

        if outcome == WriteOutcome::Ok {
            debug!("redis store {:?} {}/{}", change.kind, collection, id);
            let _ = self.changes.send(change);
        }
        Ok(outcome)
    }

    /// Read-modify-write with optimistic retries. `edit` receives the current
    /// body (`None` when absent) and returns the body to store.
    async fn compare_and_set<F>(&self, collection: &str, id: &str, mut edit: F) -> Result<(), SalonError>
    where
        F: FnMut(Option<serde_json::Map<String, Value>>) -> Result<serde_json::Map<String, Value>, SalonError>,
    {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let current = self.raw(collection, id).await?;
            let parsed = match &current {
                Some(raw) => Some(into_object(serde_json::from_str(raw)?)?),
                None => None,
            };
            let next = serde_json::to_string(&Value::Object(edit(parsed)?))?;
            let guard = match &current {
                Some(raw) => Guard::Match(raw),
                None => Guard::Absent,
            };
            match self.write(collection, id, WriteMode::Put, guard, &next).await? {
                WriteOutcome::Ok => return Ok(()),
                outcome => debug!("write to {collection}/{id} lost a race ({outcome:?}), attempt {attempt}"),
            }
        }
        Err(SalonError::remote(
            RemoteService::DocumentStore,
            format!("gave up on {collection}/{id} after {MAX_CAS_ATTEMPTS} conflicting writes"),
        ))
    }

    /// Forwards changes published by other processes into the local hub. Runs
    /// until the subscription closes.
    pub async fn listen_for_remote_changes(&self) -> Result<(), SalonError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(self.keys().changes_channel()).await?;
        let mut messages = pubsub.on_message();
        while let Some(message) = messages.next().await {
            let payload: String = match message.get_payload() {
                Ok(payload) => payload,
                Err(err) => {
                    warn!("dropping unreadable change message: {err}");
                    continue;
                }
            };
            let envelope: ChangeEnvelope = match serde_json::from_str(&payload) {
                Ok(envelope) => envelope,
                Err(err) => {
                    warn!("dropping malformed change message: {err}");
                    continue;
                }
            };
            if envelope.origin == self.origin {
                continue;
            }
            let _ = self.changes.send(envelope.change);
        }
        Ok(())
    }

    /// Deletes every key under the prefix. Intended for test namespaces.
    pub async fn flush_prefix(&self) -> Result<usize, SalonError> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(self.keys().prefix_pattern())
            .query_async(&mut conn)
            .await?;
        if keys.is_empty() {
            return Ok(0);
        }
        let removed: usize = conn.del(&keys).await?;
        Ok(removed)
    }
}

impl DocumentStore for RedisStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, SalonError> {
        match self.raw(collection, id).await? {
            Some(raw) => Ok(Some(Document::new(id, into_object(serde_json::from_str(&raw)?)?))),
            None => Ok(None),
        }
    }

    async fn set(&self, collection: &str, id: &str, data: Value, mode: SetMode) -> Result<(), SalonError> {
        let incoming = into_object(data)?;
        match mode {
            SetMode::Overwrite => {
                let body = serde_json::to_string(&Value::Object(incoming))?;
                self.write(collection, id, WriteMode::Put, Guard::Any, &body).await?;
                Ok(())
            }
            SetMode::Merge => {
                self.compare_and_set(collection, id, |current| {
                    let mut next = current.unwrap_or_default();
                    merge(&mut next, incoming.clone());
                    Ok(next)
                })
                .await
            }
        }
    }

    async fn create(&self, collection: &str, id: &str, data: Value) -> Result<(), SalonError> {
        let body = serde_json::to_string(&Value::Object(into_object(data)?))?;
        match self.write(collection, id, WriteMode::Put, Guard::Absent, &body).await? {
            WriteOutcome::Ok => Ok(()),
            _ => Err(SalonError::AlreadyExists {
                entity: "document",
                id: format!("{collection}/{id}"),
            }),
        }
    }

    async fn update(&self, collection: &str, id: &str, ops: &[FieldOp]) -> Result<(), SalonError> {
        self.compare_and_set(collection, id, |current| {
            let Some(mut next) = current else {
                return Err(SalonError::not_found("document", format!("{collection}/{id}")));
            };
            apply_ops(&mut next, ops)?;
            Ok(next)
        })
        .await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), SalonError> {
        self.write(collection, id, WriteMode::Delete, Guard::Any, "").await?;
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, SalonError> {
        let keys = self.keys();
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.smembers(keys.collection_index(&query.collection)).await?;

        let mut documents = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(MGET_CHUNK_SIZE) {
            let doc_keys: Vec<String> = chunk.iter().map(|id| keys.document(&query.collection, id)).collect();
            let bodies: Vec<Option<String>> = redis::cmd("MGET").arg(&doc_keys).query_async(&mut conn).await?;
            for (id, body) in chunk.iter().zip(bodies) {
                // Deleted between SMEMBERS and MGET.
                let Some(body) = body else { continue };
                documents.push(Document::new(id.clone(), into_object(serde_json::from_str(&body)?)?));
            }
        }
        debug!("redis query on {} scanned {} documents", query.collection, documents.len());
        Ok(run_query(documents, query))
    }

    fn changes(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }
}
