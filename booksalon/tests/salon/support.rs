pub(crate) use booksalon::{
    DocumentStore, FieldOp, Identity, MemoryStore, Salon, SalonError, Session, Timestamp,
    keys::{CHAT_ROOMS, STATS, TOTALS_DOC, USERS},
    models::{Book, Forum, Post, Totals},
    services::forums::NewPost,
};
pub(crate) use serde_json::Value;

use booksalon::{
    RemoteService,
    store::{Change, Document, Query, SetMode},
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

pub(crate) fn memory_salon() -> Salon<MemoryStore> {
    Salon::new(MemoryStore::new())
}

pub(crate) fn book(isbn: &str, title: &str) -> Book {
    Book {
        isbn: isbn.to_string(),
        title: title.to_string(),
        authors: vec!["김작가".to_string()],
        publisher: "살롱출판".to_string(),
        thumbnail: String::new(),
        contents: String::new(),
    }
}

/// Signs `uid` in, creating the profile on first use.
pub(crate) async fn member<S: DocumentStore>(salon: &Salon<S>, uid: &str) -> Session {
    let identity = Identity {
        uid: uid.to_string(),
        email: format!("{uid}@example.com"),
    };
    salon.users().sync_profile(&identity).await.expect("sync profile");
    Session::signed_in(identity)
}

pub(crate) async fn admin<S: DocumentStore>(salon: &Salon<S>, uid: &str) -> Session {
    let session = member(salon, uid).await;
    salon
        .store()
        .update(USERS, uid, &[FieldOp::set("role", "admin")])
        .await
        .expect("promote to admin");
    session
}

pub(crate) async fn seed_forum<S: DocumentStore>(salon: &Salon<S>, session: &Session, isbn: &str, title: &str) -> Forum {
    salon
        .forums()
        .create_forum(session, book(isbn, title))
        .await
        .expect("create forum")
}

pub(crate) async fn seed_post<S: DocumentStore>(salon: &Salon<S>, session: &Session, isbn: &str, title: &str) -> Post {
    salon
        .forums()
        .create_post(session, isbn, NewPost::new(title, format!("{title} 본문")))
        .await
        .expect("create post")
}

/// Memory store whose updates to chosen documents fail.
#[derive(Clone)]
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    failing: Arc<Mutex<HashSet<(String, String)>>>,
}

impl FlakyStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            failing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub(crate) fn fail_updates_to(&self, collection: &str, id: &str) {
        self.failing
            .lock()
            .expect("lock")
            .insert((collection.to_string(), id.to_string()));
    }

    pub(crate) fn recover_updates_to(&self, collection: &str, id: &str) {
        self.failing
            .lock()
            .expect("lock")
            .remove(&(collection.to_string(), id.to_string()));
    }

    fn should_fail(&self, collection: &str, id: &str) -> bool {
        self.failing
            .lock()
            .expect("lock")
            .contains(&(collection.to_string(), id.to_string()))
    }
}

impl DocumentStore for FlakyStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, SalonError> {
        self.inner.get(collection, id).await
    }

    async fn set(&self, collection: &str, id: &str, data: Value, mode: SetMode) -> Result<(), SalonError> {
        self.inner.set(collection, id, data, mode).await
    }

    async fn create(&self, collection: &str, id: &str, data: Value) -> Result<(), SalonError> {
        self.inner.create(collection, id, data).await
    }

    async fn update(&self, collection: &str, id: &str, ops: &[FieldOp]) -> Result<(), SalonError> {
        if self.should_fail(collection, id) {
            return Err(SalonError::remote(RemoteService::DocumentStore, "injected failure"));
        }
        self.inner.update(collection, id, ops).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), SalonError> {
        self.inner.delete(collection, id).await
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, SalonError> {
        self.inner.query(query).await
    }

    fn changes(&self) -> broadcast::Receiver<Change> {
        self.inner.changes()
    }
}
