use futures_util::future::join_all;

use crate::{
    auth::Session,
    errors::SalonError,
    keys::{FORUMS, USERS},
    models::Forum,
    store::{DocumentStore, FieldOp},
};

use super::require_profile;

#[derive(Clone)]
pub struct BookmarkService<S> {
    store: S,
}

impl<S: DocumentStore> BookmarkService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Adds or removes a forum bookmark; returns whether it is now bookmarked.
    pub async fn toggle_bookmark(&self, session: &Session, isbn: &str) -> Result<bool, SalonError> {
        let identity = session.require()?;
        let profile = require_profile(&self.store, &identity.uid).await?;
        let bookmarked = profile.bookmarked_forums.iter().any(|saved| saved == isbn);

        let op = if bookmarked {
            FieldOp::remove("bookmarkedForums", isbn)
        } else {
            if !self.store.exists(FORUMS, isbn).await? {
                return Err(SalonError::not_found("forum", isbn));
            }
            FieldOp::union("bookmarkedForums", isbn)
        };
        self.store.update(USERS, &identity.uid, &[op]).await?;
        Ok(!bookmarked)
    }

    pub async fn is_bookmarked(&self, uid: &str, isbn: &str) -> Result<bool, SalonError> {
        let profile = require_profile(&self.store, uid).await?;
        Ok(profile.bookmarked_forums.iter().any(|saved| saved == isbn))
    }

    /// Bookmarked forums in bookmark order; forums deleted since are skipped.
    pub async fn bookmarked_forums(&self, uid: &str) -> Result<Vec<Forum>, SalonError> {
        let profile = require_profile(&self.store, uid).await?;
        let fetched = join_all(
            profile
                .bookmarked_forums
                .iter()
                .map(|isbn| self.store.fetch::<Forum>(FORUMS, isbn)),
        )
        .await;
        let mut forums = Vec::with_capacity(fetched.len());
        for forum in fetched {
            if let Some(forum) = forum? {
                forums.push(forum);
            }
        }
        Ok(forums)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{auth::Identity, services::users::UserService, store::MemoryStore};

    #[tokio::test]
    async fn bookmarks_toggle_and_skip_deleted_forums() {
        let store = MemoryStore::new();
        let identity = Identity {
            uid: "u1".into(),
            email: "u1@example.com".into(),
        };
        UserService::new(store.clone()).sync_profile(&identity).await.expect("profile");
        store.create(FORUMS, "111", json!({"isbn": "111", "book": {"isbn": "111"}})).await.expect("forum");
        store.create(FORUMS, "222", json!({"isbn": "222", "book": {"isbn": "222"}})).await.expect("forum");
        let bookmarks = BookmarkService::new(store.clone());
        let session = Session::signed_in(identity);

        assert!(bookmarks.toggle_bookmark(&session, "111").await.expect("add"));
        assert!(bookmarks.toggle_bookmark(&session, "222").await.expect("add"));
        assert!(bookmarks.toggle_bookmark(&session, "333").await.expect_err("missing").is_not_found());

        store.delete(FORUMS, "222").await.expect("delete forum");
        let forums = bookmarks.bookmarked_forums("u1").await.expect("list");
        assert_eq!(forums.len(), 1);
        assert_eq!(forums[0].isbn, "111");

        assert!(!bookmarks.toggle_bookmark(&session, "111").await.expect("remove"));
        assert!(!bookmarks.is_bookmarked("u1", "111").await.expect("check"));
    }
}
