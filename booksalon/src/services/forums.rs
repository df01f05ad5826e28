//! Forums, posts and comments, with the counters that depend on them.

use log::{debug, info};

use crate::{
    auth::Session,
    binding::{LiveDocument, LiveQuery},
    categorize::{BookCategory, calculate_popularity, categorize_book, tag_book},
    errors::{SalonError, ValidationError, Validator},
    id::generate_document_id,
    jobs::triggers::{TriggerEvent, Triggers},
    keys::{self, COMMENT_INDEX, FORUMS},
    models::{ActivityType, Author, Book, Comment, CommentLocator, Forum, NotificationType, Post},
    store::{DocumentStore, FieldOp, Filter, Query, SortOrder},
    timestamp::Timestamp,
    validators::{is_valid_document_key, is_valid_url, strip_whitespace},
};

use super::{
    activity::{ActivityService, NewActivity},
    ensure_owner, excerpt,
    notifications::{NewNotification, NotificationService},
    to_value, update_counter,
    users::{UserService, UserStat},
};

pub const TITLE_MAX_CHARS: usize = 100;
pub const POST_CONTENT_MAX_CHARS: usize = 10_000;
pub const COMMENT_MAX_CHARS: usize = 1_000;

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
}

impl NewPost {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PostUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
}

fn validate_comment(content: &str) -> Result<(), ValidationError> {
    Validator::new().text("content", content, 1, COMMENT_MAX_CHARS).finish()
}

#[derive(Clone)]
pub struct ForumService<S> {
    store: S,
}

impl<S: DocumentStore> ForumService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn users(&self) -> UserService<S> {
        UserService::new(self.store.clone())
    }

    fn activity(&self) -> ActivityService<S> {
        ActivityService::new(self.store.clone())
    }

    fn triggers(&self) -> Triggers<S> {
        Triggers::new(self.store.clone())
    }

    // ---- forums ----

    /// Creates the forum for a book. The isbn is the document id, so a second
    /// creator gets `AlreadyExists` from the store itself.
    pub async fn create_forum(&self, session: &Session, book: Book) -> Result<Forum, SalonError> {
        let identity = session.require()?;
        let isbn = strip_whitespace(&book.isbn);
        Validator::new()
            .check(
                is_valid_document_key(&isbn),
                "isbn",
                "validation.isbn",
                "isbn must be non-empty letters, digits, '-' or '_'",
            )
            .check(
                book.thumbnail.is_empty() || is_valid_url(&book.thumbnail),
                "thumbnail",
                "validation.url",
                "thumbnail must be an absolute url",
            )
            .text("title", &book.title, 1, 300)
            .finish()?;

        let book = Book { isbn: isbn.clone(), ..book };
        let now = Timestamp::now();
        let forum = Forum {
            id: isbn.clone(),
            isbn: isbn.clone(),
            category: categorize_book(&book).as_str().to_string(),
            tags: tag_book(&book).into_iter().map(|tag| tag.as_str().to_string()).collect(),
            book,
            post_count: 0,
            popularity: 0,
            average_rating: 0.0,
            total_ratings: 0,
            last_activity_at: Some(now),
            created_at: Some(now),
            created_by: Some(identity.uid.clone()),
        };
        match self.store.create(FORUMS, &isbn, to_value(&forum)?).await {
            Err(SalonError::AlreadyExists { .. }) => {
                return Err(SalonError::AlreadyExists { entity: "forum", id: isbn });
            }
            other => other?,
        }

        self.users().increment_stat(&identity.uid, UserStat::Forums, 1).await?;
        self.triggers().dispatch(&TriggerEvent::forum_created(&isbn)).await?;
        info!("forum {} created by {} ({})", isbn, identity.uid, forum.category);
        Ok(forum)
    }

    pub async fn forum(&self, isbn: &str) -> Result<Option<Forum>, SalonError> {
        self.store.fetch(FORUMS, isbn).await
    }

    pub async fn require_forum(&self, isbn: &str) -> Result<Forum, SalonError> {
        self.forum(isbn).await?.ok_or_else(|| SalonError::not_found("forum", isbn))
    }

    pub async fn forum_exists(&self, isbn: &str) -> Result<bool, SalonError> {
        self.store.exists(FORUMS, isbn).await
    }

    pub async fn recent_forums(&self, limit: usize) -> Result<Vec<Forum>, SalonError> {
        let query = Query::collection(FORUMS)
            .order_by("lastActivityAt", SortOrder::Desc)
            .limit(limit);
        self.store.fetch_all(&query).await
    }

    pub async fn forums_by_category(&self, category: BookCategory, limit: usize) -> Result<Vec<Forum>, SalonError> {
        let query = Query::collection(FORUMS)
            .filter(Filter::eq("category", category.as_str()))
            .order_by("lastActivityAt", SortOrder::Desc)
            .limit(limit);
        self.store.fetch_all(&query).await
    }

    /// Forums ranked by the activity/recency heuristic, computed at read time.
    pub async fn popular_forums(&self, limit: usize) -> Result<Vec<Forum>, SalonError> {
        let now = Timestamp::now();
        let mut forums: Vec<Forum> = self.store.fetch_all(&Query::collection(FORUMS)).await?;
        for forum in &mut forums {
            forum.popularity = calculate_popularity(forum.post_count, forum.activity_at(), now);
        }
        forums.sort_by(|a, b| b.popularity.cmp(&a.popularity).then_with(|| a.isbn.cmp(&b.isbn)));
        forums.truncate(limit);
        Ok(forums)
    }

    pub async fn refresh_popularity(&self, isbn: &str) -> Result<i64, SalonError> {
        let forum = self.require_forum(isbn).await?;
        let popularity = calculate_popularity(forum.post_count, forum.activity_at(), Timestamp::now());
        self.store
            .update(FORUMS, isbn, &[FieldOp::set("popularity", popularity)])
            .await?;
        Ok(popularity)
    }

    pub async fn watch_forum(&self, isbn: &str) -> Result<LiveDocument<Forum, S>, SalonError> {
        LiveDocument::mount(&self.store, FORUMS, isbn).await
    }

    // ---- posts ----

    pub async fn create_post(&self, session: &Session, isbn: &str, new_post: NewPost) -> Result<Post, SalonError> {
        let identity = session.require()?;
        Validator::new()
            .text("title", &new_post.title, 1, TITLE_MAX_CHARS)
            .text("content", &new_post.content, 1, POST_CONTENT_MAX_CHARS)
            .finish()?;
        if !self.forum_exists(isbn).await? {
            return Err(SalonError::not_found("forum", isbn));
        }

        let post = Post {
            id: generate_document_id(),
            title: new_post.title.trim().to_string(),
            content: new_post.content.trim().to_string(),
            author: Author {
                uid: identity.uid.clone(),
                email: identity.email.clone(),
            },
            created_at: Timestamp::now(),
            updated_at: None,
            last_comment_at: None,
            comment_count: 0,
            likes: Vec::new(),
            like_count: 0,
        };
        self.store.create(&keys::posts(isbn), &post.id, to_value(&post)?).await?;

        self.users().increment_stat(&identity.uid, UserStat::Posts, 1).await?;
        self.activity()
            .record(NewActivity::new(ActivityType::Post, identity.uid.as_str(), post.id.as_str(), post.title.as_str()).in_forum(isbn))
            .await?;
        self.triggers().dispatch(&TriggerEvent::post_created(isbn, &post.id)).await?;
        debug!("post {} created in {}", post.id, isbn);
        Ok(post)
    }

    pub async fn post(&self, isbn: &str, post_id: &str) -> Result<Option<Post>, SalonError> {
        self.store.fetch(&keys::posts(isbn), post_id).await
    }

    pub async fn require_post(&self, isbn: &str, post_id: &str) -> Result<Post, SalonError> {
        self.post(isbn, post_id).await?.ok_or_else(|| SalonError::not_found("post", post_id))
    }

    fn posts_query(isbn: &str) -> Query {
        Query::collection(keys::posts(isbn)).order_by("createdAt", SortOrder::Desc)
    }

    /// Newest posts first.
    pub async fn posts(&self, isbn: &str, limit: usize) -> Result<Vec<Post>, SalonError> {
        self.store.fetch_all(&Self::posts_query(isbn).limit(limit)).await
    }

    pub async fn update_post(&self, session: &Session, isbn: &str, post_id: &str, update: PostUpdate) -> Result<Post, SalonError> {
        let identity = session.require()?;
        let post = self.require_post(isbn, post_id).await?;
        ensure_owner(&post.author.uid, identity, "post", post_id)?;

        let mut validator = Validator::new();
        if let Some(title) = &update.title {
            validator.text("title", title, 1, TITLE_MAX_CHARS);
        }
        if let Some(content) = &update.content {
            validator.text("content", content, 1, POST_CONTENT_MAX_CHARS);
        }
        validator.finish()?;

        let mut ops = vec![FieldOp::set("updatedAt", Timestamp::now().to_value())];
        if let Some(title) = update.title {
            ops.push(FieldOp::set("title", title.trim()));
        }
        if let Some(content) = update.content {
            ops.push(FieldOp::set("content", content.trim()));
        }
        self.store.update(&keys::posts(isbn), post_id, &ops).await?;
        self.require_post(isbn, post_id).await
    }

    pub async fn delete_post(&self, session: &Session, isbn: &str, post_id: &str) -> Result<(), SalonError> {
        let identity = session.require()?;
        let post = self.require_post(isbn, post_id).await?;
        ensure_owner(&post.author.uid, identity, "post", post_id)?;
        self.purge_post(isbn, &post).await
    }

    /// Removes a post with its comments and index entries, then fixes the counters.
    pub(crate) async fn purge_post(&self, isbn: &str, post: &Post) -> Result<(), SalonError> {
        let comments_path = keys::comments(isbn, &post.id);
        let comments = self.store.query(&Query::collection(comments_path.as_str())).await?;
        for comment in &comments {
            self.store.delete(&comments_path, &comment.id).await?;
            self.store.delete(COMMENT_INDEX, &comment.id).await?;
            if let Some(author) = comment.field("author.uid").and_then(|uid| uid.as_str()) {
                self.users().increment_stat(author, UserStat::Comments, -1).await?;
            }
        }
        self.store.delete(&keys::posts(isbn), &post.id).await?;

        update_counter(&self.store, FORUMS, isbn, &[FieldOp::increment("postCount", -1)]).await?;
        self.users().increment_stat(&post.author.uid, UserStat::Posts, -1).await?;
        info!("post {} removed from {} with {} comments", post.id, isbn, comments.len());
        Ok(())
    }

    pub async fn watch_posts(&self, isbn: &str) -> Result<LiveQuery<Post, S>, SalonError> {
        LiveQuery::mount(&self.store, Self::posts_query(isbn)).await
    }

    // ---- comments ----

    pub async fn create_comment(&self, session: &Session, isbn: &str, post_id: &str, content: &str) -> Result<Comment, SalonError> {
        let identity = session.require()?;
        validate_comment(content)?;
        let post = self.require_post(isbn, post_id).await?;

        let comment = Comment {
            id: generate_document_id(),
            post_id: post_id.to_string(),
            content: content.trim().to_string(),
            author: Author {
                uid: identity.uid.clone(),
                email: identity.email.clone(),
            },
            created_at: Timestamp::now(),
            updated_at: None,
            likes: Vec::new(),
            like_count: 0,
        };
        self.store
            .create(&keys::comments(isbn, post_id), &comment.id, to_value(&comment)?)
            .await?;
        let locator = CommentLocator {
            isbn: isbn.to_string(),
            post_id: post_id.to_string(),
        };
        self.store.put(COMMENT_INDEX, &comment.id, &locator).await?;

        self.users().increment_stat(&identity.uid, UserStat::Comments, 1).await?;
        self.activity()
            .record(
                NewActivity::new(ActivityType::Comment, identity.uid.as_str(), comment.id.as_str(), post.title.as_str())
                    .in_forum(isbn)
                    .with("postId", post_id),
            )
            .await?;
        if post.author.uid != identity.uid {
            NotificationService::new(self.store.clone())
                .notify(
                    NewNotification::new(
                        post.author.uid.as_str(),
                        NotificationType::Comment,
                        "새 댓글",
                        format!("{}님이 '{}'에 댓글을 남겼습니다: {}", identity.email, post.title, excerpt(&comment.content, 40)),
                    )
                    .with("isbn", isbn)
                    .with("postId", post_id)
                    .with("commentId", comment.id.as_str()),
                )
                .await?;
        }
        self.triggers()
            .dispatch(&TriggerEvent::comment_created(isbn, post_id, &comment.id))
            .await?;
        Ok(comment)
    }

    fn comments_query(isbn: &str, post_id: &str) -> Query {
        Query::collection(keys::comments(isbn, post_id)).order_by("createdAt", SortOrder::Asc)
    }

    /// Oldest comments first.
    pub async fn comments(&self, isbn: &str, post_id: &str) -> Result<Vec<Comment>, SalonError> {
        self.store.fetch_all(&Self::comments_query(isbn, post_id)).await
    }

    async fn require_comment(&self, isbn: &str, post_id: &str, comment_id: &str) -> Result<Comment, SalonError> {
        self.store
            .fetch(&keys::comments(isbn, post_id), comment_id)
            .await?
            .ok_or_else(|| SalonError::not_found("comment", comment_id))
    }

    pub async fn update_comment(
        &self,
        session: &Session,
        isbn: &str,
        post_id: &str,
        comment_id: &str,
        content: &str,
    ) -> Result<Comment, SalonError> {
        let identity = session.require()?;
        let comment = self.require_comment(isbn, post_id, comment_id).await?;
        ensure_owner(&comment.author.uid, identity, "comment", comment_id)?;
        validate_comment(content)?;
        self.store
            .update(
                &keys::comments(isbn, post_id),
                comment_id,
                &[
                    FieldOp::set("content", content.trim()),
                    FieldOp::set("updatedAt", Timestamp::now().to_value()),
                ],
            )
            .await?;
        self.require_comment(isbn, post_id, comment_id).await
    }

    pub async fn delete_comment(&self, session: &Session, isbn: &str, post_id: &str, comment_id: &str) -> Result<(), SalonError> {
        let identity = session.require()?;
        let comment = self.require_comment(isbn, post_id, comment_id).await?;
        ensure_owner(&comment.author.uid, identity, "comment", comment_id)?;

        self.store.delete(&keys::comments(isbn, post_id), comment_id).await?;
        self.store.delete(COMMENT_INDEX, comment_id).await?;
        update_counter(&self.store, &keys::posts(isbn), post_id, &[FieldOp::increment("commentCount", -1)]).await?;
        self.users().increment_stat(&comment.author.uid, UserStat::Comments, -1).await
    }

    pub async fn watch_comments(&self, isbn: &str, post_id: &str) -> Result<LiveQuery<Comment, S>, SalonError> {
        LiveQuery::mount(&self.store, Self::comments_query(isbn, post_id)).await
    }
}
