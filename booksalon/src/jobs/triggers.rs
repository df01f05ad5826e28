//! Write-triggered counter maintenance.
//!
//! An event fans out into counter steps (parent document, forum, totals).
//! Before a step writes, its receipt `triggerReceipts/{event id}_{step}` is
//! created with create-if-absent. A replay skips every step whose receipt
//! exists, so a step that landed is never applied twice. A step whose write
//! fails releases its own receipt, and redispatching the event resumes there.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    errors::SalonError,
    id::generate_event_id,
    keys::{self, FORUMS, STATS, TOTALS_DOC, TRIGGER_RECEIPTS},
    services::update_counter,
    store::{DocumentStore, FieldOp},
    timestamp::Timestamp,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TriggerKind {
    #[serde(rename_all = "camelCase")]
    ForumCreated { isbn: String },
    #[serde(rename_all = "camelCase")]
    PostCreated { isbn: String, post_id: String },
    #[serde(rename_all = "camelCase")]
    CommentCreated {
        isbn: String,
        post_id: String,
        comment_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub id: String,
    #[serde(flatten)]
    pub kind: TriggerKind,
}

impl TriggerEvent {
    pub fn new(kind: TriggerKind) -> Self {
        Self {
            id: generate_event_id(),
            kind,
        }
    }

    pub fn forum_created(isbn: impl Into<String>) -> Self {
        Self::new(TriggerKind::ForumCreated { isbn: isbn.into() })
    }

    pub fn post_created(isbn: impl Into<String>, post_id: impl Into<String>) -> Self {
        Self::new(TriggerKind::PostCreated {
            isbn: isbn.into(),
            post_id: post_id.into(),
        })
    }

    pub fn comment_created(isbn: impl Into<String>, post_id: impl Into<String>, comment_id: impl Into<String>) -> Self {
        Self::new(TriggerKind::CommentCreated {
            isbn: isbn.into(),
            post_id: post_id.into(),
            comment_id: comment_id.into(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Applied,
    Replayed,
}

/// One independently receipted write of an event.
enum Step {
    Counter {
        name: &'static str,
        collection: String,
        id: String,
        ops: Vec<FieldOp>,
    },
    Total(&'static str),
}

impl Step {
    fn plan(kind: &TriggerKind) -> Vec<Step> {
        let now = Timestamp::now().to_value();
        match kind {
            TriggerKind::ForumCreated { .. } => vec![Step::Total("totalForums")],
            TriggerKind::PostCreated { isbn, .. } => vec![
                Step::Counter {
                    name: "forum",
                    collection: FORUMS.to_string(),
                    id: isbn.clone(),
                    ops: vec![FieldOp::increment("postCount", 1), FieldOp::set("lastActivityAt", now)],
                },
                Step::Total("totalPosts"),
            ],
            TriggerKind::CommentCreated { isbn, post_id, .. } => vec![
                Step::Counter {
                    name: "post",
                    collection: keys::posts(isbn),
                    id: post_id.clone(),
                    ops: vec![FieldOp::increment("commentCount", 1), FieldOp::set("lastCommentAt", now.clone())],
                },
                Step::Counter {
                    name: "forum",
                    collection: FORUMS.to_string(),
                    id: isbn.clone(),
                    ops: vec![FieldOp::set("lastActivityAt", now)],
                },
                Step::Total("totalComments"),
            ],
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Step::Counter { name, .. } => *name,
            Step::Total(_) => "totals",
        }
    }
}

#[derive(Clone)]
pub struct Triggers<S> {
    store: S,
}

impl<S: DocumentStore> Triggers<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn dispatch(&self, event: &TriggerEvent) -> Result<TriggerOutcome, SalonError> {
        let mut applied = 0;
        for step in Step::plan(&event.kind) {
            let receipt_id = format!("{}_{}", event.id, step.name());
            let receipt = json!({
                "event": serde_json::to_value(event)?,
                "step": step.name(),
                "receivedAt": Timestamp::now().to_value(),
            });
            match self.store.create(TRIGGER_RECEIPTS, &receipt_id, receipt).await {
                Ok(()) => {}
                Err(SalonError::AlreadyExists { .. }) => {
                    debug!("trigger {} step {} already applied", event.id, step.name());
                    continue;
                }
                Err(err) => return Err(err),
            }

            if let Err(err) = self.apply(&step).await {
                if let Err(cleanup) = self.store.delete(TRIGGER_RECEIPTS, &receipt_id).await {
                    warn!("could not release receipt {receipt_id}: {cleanup}");
                }
                return Err(err);
            }
            applied += 1;
        }

        if applied == 0 {
            warn!("trigger event {} already applied; skipping replay", event.id);
            return Ok(TriggerOutcome::Replayed);
        }
        debug!("applied trigger {} {:?}", event.id, event.kind);
        Ok(TriggerOutcome::Applied)
    }

    async fn apply(&self, step: &Step) -> Result<(), SalonError> {
        match step {
            Step::Counter { collection, id, ops, .. } => update_counter(&self.store, collection, id, ops).await,
            Step::Total(field) => self.bump_total(field).await,
        }
    }

    /// Increments a field of `stats/totals`, creating the document on first use.
    async fn bump_total(&self, field: &str) -> Result<(), SalonError> {
        let ops = [FieldOp::increment(field, 1)];
        match self.store.update(STATS, TOTALS_DOC, &ops).await {
            Err(err) if err.is_not_found() => match self.store.create(STATS, TOTALS_DOC, json!({ field: 1 })).await {
                Err(SalonError::AlreadyExists { .. }) => self.store.update(STATS, TOTALS_DOC, &ops).await,
                other => other,
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::Totals, store::MemoryStore};

    #[tokio::test]
    async fn replayed_event_is_skipped() {
        let store = MemoryStore::new();
        store
            .create(FORUMS, "123", json!({"isbn": "123", "postCount": 0}))
            .await
            .expect("seed forum");
        let triggers = Triggers::new(store.clone());
        let event = TriggerEvent::post_created("123", "p1");

        assert_eq!(triggers.dispatch(&event).await.expect("first"), TriggerOutcome::Applied);
        assert_eq!(triggers.dispatch(&event).await.expect("replay"), TriggerOutcome::Replayed);

        let forum = store.get(FORUMS, "123").await.expect("get").expect("forum");
        assert_eq!(forum.data["postCount"], json!(1));
        let totals: Totals = store.fetch(STATS, TOTALS_DOC).await.expect("fetch").expect("totals");
        assert_eq!(totals.total_posts, 1);
    }

    #[tokio::test]
    async fn distinct_events_both_count() {
        let store = MemoryStore::new();
        let triggers = Triggers::new(store.clone());
        triggers.dispatch(&TriggerEvent::forum_created("1")).await.expect("first");
        triggers.dispatch(&TriggerEvent::forum_created("2")).await.expect("second");
        let totals: Totals = store.fetch(STATS, TOTALS_DOC).await.expect("fetch").expect("totals");
        assert_eq!(totals.total_forums, 2);
    }

    #[test]
    fn events_serialize_with_kind_tag() {
        let event = TriggerEvent::comment_created("1", "p", "c");
        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(value["kind"], json!("commentCreated"));
        assert_eq!(value["postId"], json!("p"));
        let back: TriggerEvent = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, event);
    }
}
