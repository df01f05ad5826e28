//! Ordered multi-document writes with compensations.
//!
//! The store only guarantees atomicity within one document. A saga runs its
//! steps in order; when step `k` fails, the compensations of steps `0..k` run
//! in reverse and the original error is returned. A compensation that itself
//! fails is logged and skipped.

use log::{debug, warn};
use serde_json::Value;

use crate::errors::SalonError;

use super::{DocumentStore, FieldOp};

#[derive(Debug, Clone)]
enum Step {
    /// Undone by applying `undo` to the same document.
    Update {
        collection: String,
        id: String,
        ops: Vec<FieldOp>,
        undo: Vec<FieldOp>,
    },
    /// Undone by deleting the created document.
    Create { collection: String, id: String, data: Value },
}

impl Step {
    fn target(&self) -> (&str, &str) {
        match self {
            Step::Update { collection, id, .. } | Step::Create { collection, id, .. } => (collection, id),
        }
    }

    async fn apply<S: DocumentStore>(&self, store: &S) -> Result<(), SalonError> {
        match self {
            Step::Update { collection, id, ops, .. } => store.update(collection, id, ops).await,
            Step::Create { collection, id, data } => store.create(collection, id, data.clone()).await,
        }
    }

    async fn compensate<S: DocumentStore>(&self, store: &S) -> Result<(), SalonError> {
        match self {
            Step::Update { collection, id, undo, .. } => store.update(collection, id, undo).await,
            Step::Create { collection, id, .. } => store.delete(collection, id).await,
        }
    }
}

#[must_use = "a saga does nothing until `run` is awaited"]
pub struct Saga<'a, S> {
    store: &'a S,
    name: &'static str,
    steps: Vec<Step>,
}

impl<'a, S: DocumentStore> Saga<'a, S> {
    pub fn new(store: &'a S, name: &'static str) -> Self {
        Self {
            store,
            name,
            steps: Vec::new(),
        }
    }

    pub fn update(mut self, collection: impl Into<String>, id: impl Into<String>, ops: Vec<FieldOp>, undo: Vec<FieldOp>) -> Self {
        self.steps.push(Step::Update {
            collection: collection.into(),
            id: id.into(),
            ops,
            undo,
        });
        self
    }

    pub fn create(mut self, collection: impl Into<String>, id: impl Into<String>, data: Value) -> Self {
        self.steps.push(Step::Create {
            collection: collection.into(),
            id: id.into(),
            data,
        });
        self
    }

    pub async fn run(self) -> Result<(), SalonError> {
        for (index, step) in self.steps.iter().enumerate() {
            if let Err(err) = step.apply(self.store).await {
                let (collection, id) = step.target();
                warn!(
                    "{} failed at step {} ({collection}/{id}): {err}; compensating {} step(s)",
                    self.name,
                    index + 1,
                    index
                );
                for done in self.steps[..index].iter().rev() {
                    let (collection, id) = done.target();
                    match done.compensate(self.store).await {
                        Ok(()) => debug!("{} compensated {collection}/{id}", self.name),
                        Err(undo_err) => warn!("{} could not compensate {collection}/{id}: {undo_err}", self.name),
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }
}
