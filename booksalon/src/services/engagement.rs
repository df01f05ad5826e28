use log::debug;
use serde::Serialize;

use crate::{
    auth::Session,
    errors::SalonError,
    keys::{self, COMMENT_INDEX},
    models::{ActivityType, CommentLocator, NotificationType},
    store::{Document, DocumentStore, FieldOp, Query},
};

use super::{
    activity::{ActivityService, NewActivity},
    excerpt,
    notifications::{NewNotification, NotificationService},
};

/// Something a user can like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LikeTarget {
    Post { isbn: String, post_id: String },
    Comment { isbn: String, comment_id: String },
}

impl LikeTarget {
    pub fn post(isbn: impl Into<String>, post_id: impl Into<String>) -> Self {
        Self::Post {
            isbn: isbn.into(),
            post_id: post_id.into(),
        }
    }

    pub fn comment(isbn: impl Into<String>, comment_id: impl Into<String>) -> Self {
        Self::Comment {
            isbn: isbn.into(),
            comment_id: comment_id.into(),
        }
    }

    fn entity(&self) -> &'static str {
        match self {
            Self::Post { .. } => "post",
            Self::Comment { .. } => "comment",
        }
    }

    fn id(&self) -> &str {
        match self {
            Self::Post { post_id, .. } => post_id,
            Self::Comment { comment_id, .. } => comment_id,
        }
    }

    fn isbn(&self) -> &str {
        match self {
            Self::Post { isbn, .. } | Self::Comment { isbn, .. } => isbn,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeOutcome {
    pub liked: bool,
    pub like_count: i64,
}

/// Resolved storage location of a like target.
struct Located {
    collection: String,
    document: Document,
    post_id: String,
}

#[derive(Clone)]
pub struct EngagementService<S> {
    store: S,
}

impl<S: DocumentStore> EngagementService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    async fn locate(&self, target: &LikeTarget) -> Result<Located, SalonError> {
        match target {
            LikeTarget::Post { isbn, post_id } => {
                let collection = keys::posts(isbn);
                let document = self
                    .store
                    .get(&collection, post_id)
                    .await?
                    .ok_or_else(|| SalonError::not_found("post", post_id.as_str()))?;
                Ok(Located {
                    collection,
                    document,
                    post_id: post_id.clone(),
                })
            }
            LikeTarget::Comment { isbn, comment_id } => {
                if let Some(locator) = self.store.fetch::<CommentLocator>(COMMENT_INDEX, comment_id).await? {
                    let collection = keys::comments(&locator.isbn, &locator.post_id);
                    if let Some(document) = self.store.get(&collection, comment_id).await? {
                        return Ok(Located {
                            collection,
                            document,
                            post_id: locator.post_id,
                        });
                    }
                }
                // Comments written before the index existed: scan the forum's posts.
                debug!("comment {comment_id} missing from index; scanning forum {isbn}");
                let posts = self.store.query(&Query::collection(keys::posts(isbn))).await?;
                for post in posts {
                    let collection = keys::comments(isbn, &post.id);
                    if let Some(document) = self.store.get(&collection, comment_id).await? {
                        return Ok(Located {
                            collection,
                            document,
                            post_id: post.id,
                        });
                    }
                }
                Err(SalonError::not_found("comment", comment_id.as_str()))
            }
        }
    }

    /// Adds or removes the caller's like and keeps `likeCount` equal to the
    /// number of likers in the same write.
    pub async fn toggle_like(&self, session: &Session, target: &LikeTarget) -> Result<LikeOutcome, SalonError> {
        let identity = session.require()?;
        let located = self.locate(target).await?;
        let uid = identity.uid.as_str();
        let already = located
            .document
            .field("likes")
            .and_then(|likes| likes.as_array())
            .is_some_and(|likes| likes.iter().any(|liker| liker.as_str() == Some(uid)));

        let ops = if already {
            [FieldOp::remove("likes", uid), FieldOp::increment("likeCount", -1)]
        } else {
            [FieldOp::union("likes", uid), FieldOp::increment("likeCount", 1)]
        };
        self.store.update(&located.collection, target.id(), &ops).await?;

        let like_count = self
            .store
            .get(&located.collection, target.id())
            .await?
            .and_then(|document| document.field("likeCount").and_then(|count| count.as_i64()))
            .unwrap_or(0);

        self.on_toggled(identity.uid.as_str(), identity.email.as_str(), target, &located, !already)
            .await?;
        Ok(LikeOutcome {
            liked: !already,
            like_count,
        })
    }

    /// Both directions leave an activity entry; only a like notifies the author.
    async fn on_toggled(
        &self,
        uid: &str,
        email: &str,
        target: &LikeTarget,
        located: &Located,
        liked: bool,
    ) -> Result<(), SalonError> {
        let author = located
            .document
            .field("author.uid")
            .and_then(|value| value.as_str())
            .unwrap_or_default()
            .to_string();
        let title = match target {
            LikeTarget::Post { .. } => located
                .document
                .field("title")
                .and_then(|value| value.as_str())
                .unwrap_or_default()
                .to_string(),
            LikeTarget::Comment { .. } => excerpt(
                located.document.field("content").and_then(|value| value.as_str()).unwrap_or_default(),
                30,
            ),
        };

        ActivityService::new(self.store.clone())
            .record(
                NewActivity::new(ActivityType::Like, uid, target.id(), title.as_str())
                    .in_forum(target.isbn())
                    .with("targetType", target.entity())
                    .with("postId", located.post_id.as_str())
                    .with("liked", liked),
            )
            .await?;

        if liked && !author.is_empty() && author != uid {
            NotificationService::new(self.store.clone())
                .notify(
                    NewNotification::new(
                        author,
                        NotificationType::Like,
                        "새 좋아요",
                        format!("{email}님이 회원님의 글 '{title}'을 좋아합니다"),
                    )
                    .with("isbn", target.isbn())
                    .with("postId", located.post_id.as_str())
                    .with("targetType", target.entity()),
                )
                .await?;
        }
        Ok(())
    }

    pub async fn has_liked(&self, uid: &str, target: &LikeTarget) -> Result<bool, SalonError> {
        let located = self.locate(target).await?;
        Ok(located
            .document
            .field("likes")
            .and_then(|likes| likes.as_array())
            .is_some_and(|likes| likes.iter().any(|liker| liker.as_str() == Some(uid))))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{auth::Identity, store::MemoryStore};

    fn session(uid: &str) -> Session {
        Session::signed_in(Identity {
            uid: uid.into(),
            email: format!("{uid}@example.com"),
        })
    }

    async fn seed_post(store: &MemoryStore) {
        store
            .create(
                &keys::posts("123"),
                "p1",
                json!({"title": "t", "content": "c", "author": {"uid": "author", "email": "a@x"}, "createdAt": 1}),
            )
            .await
            .expect("seed");
    }

    #[tokio::test]
    async fn toggling_twice_restores_the_count() {
        let store = MemoryStore::new();
        seed_post(&store).await;
        let engagement = EngagementService::new(store.clone());
        let target = LikeTarget::post("123", "p1");

        let liked = engagement.toggle_like(&session("u1"), &target).await.expect("like");
        assert_eq!(liked, LikeOutcome { liked: true, like_count: 1 });
        assert!(engagement.has_liked("u1", &target).await.expect("has liked"));

        let unliked = engagement.toggle_like(&session("u1"), &target).await.expect("unlike");
        assert_eq!(unliked, LikeOutcome { liked: false, like_count: 0 });
    }

    #[tokio::test]
    async fn unlike_is_recorded_but_only_like_notifies() {
        let store = MemoryStore::new();
        seed_post(&store).await;
        crate::services::users::UserService::new(store.clone())
            .sync_profile(&Identity {
                uid: "author".into(),
                email: "author@example.com".into(),
            })
            .await
            .expect("author profile");
        let engagement = EngagementService::new(store.clone());
        let target = LikeTarget::post("123", "p1");
        engagement.toggle_like(&session("u1"), &target).await.expect("like");
        engagement.toggle_like(&session("u1"), &target).await.expect("unlike");

        let activities = ActivityService::new(store.clone())
            .user_activities("u1", 10)
            .await
            .expect("activities");
        assert_eq!(activities.len(), 2);
        let mut states: Vec<bool> = activities
            .iter()
            .map(|activity| activity.metadata["liked"].as_bool().unwrap_or_default())
            .collect();
        states.sort();
        assert_eq!(states, vec![false, true]);

        let notified = NotificationService::new(store.clone())
            .notifications("author", 10)
            .await
            .expect("notifications");
        assert_eq!(notified.len(), 1);
    }

    #[tokio::test]
    async fn unindexed_comments_are_found_by_scan() {
        let store = MemoryStore::new();
        seed_post(&store).await;
        store
            .create(
                &keys::comments("123", "p1"),
                "c1",
                json!({"postId": "p1", "content": "hi", "author": {"uid": "author", "email": "a@x"}, "createdAt": 2}),
            )
            .await
            .expect("seed comment");
        let engagement = EngagementService::new(store.clone());
        let outcome = engagement
            .toggle_like(&session("u2"), &LikeTarget::comment("123", "c1"))
            .await
            .expect("like comment");
        assert_eq!(outcome.like_count, 1);
    }

    #[tokio::test]
    async fn missing_target_is_not_found() {
        let engagement = EngagementService::new(MemoryStore::new());
        let err = engagement
            .toggle_like(&session("u1"), &LikeTarget::post("123", "nope"))
            .await
            .expect_err("missing");
        assert!(err.is_not_found());
    }
}
