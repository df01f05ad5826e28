//! Book lookup passthrough and in-app community search.
//!
//! Community search is a bounded client-side scan: the store offers no text
//! index, so only the most active forums and their newest posts are examined.

use futures_util::future::try_join_all;
use serde::Serialize;

use crate::{
    books::{BookLookup, SearchTarget},
    errors::SalonError,
    keys::{self, FORUMS, USERS},
    models::{Book, Comment, Forum, Post, UserProfile},
    store::{DocumentStore, Query, SortOrder},
};

const FORUMS_SCANNED: usize = 10;
const POSTS_PER_FORUM: usize = 30;
const COMMENTS_PER_POST: usize = 10;
const MAX_RESULTS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct PostHit {
    pub isbn: String,
    pub forum_title: String,
    #[cfg_attr(feature = "utoipa", schema(value_type = Object))]
    pub post: Post,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CommentHit {
    pub isbn: String,
    pub post_id: String,
    pub post_title: String,
    #[cfg_attr(feature = "utoipa", schema(value_type = Object))]
    pub comment: Comment,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    #[cfg_attr(feature = "utoipa", schema(value_type = Vec<Object>))]
    pub forums: Vec<Forum>,
    pub posts: Vec<PostHit>,
    pub comments: Vec<CommentHit>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.forums.is_empty() && self.posts.is_empty() && self.comments.is_empty()
    }
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn forum_matches(forum: &Forum, needle: &str) -> bool {
    let book = &forum.book;
    contains(&book.title, needle)
        || contains(&book.publisher, needle)
        || book.authors.iter().any(|author| contains(author, needle))
        || forum.tags.iter().any(|tag| contains(tag, needle))
        || contains(&forum.category, needle)
}

fn post_matches(post: &Post, needle: &str) -> bool {
    contains(&post.title, needle) || contains(&post.content, needle) || contains(&post.author.email, needle)
}

fn comment_matches(comment: &Comment, needle: &str) -> bool {
    contains(&comment.content, needle) || contains(&comment.author.email, needle)
}

#[derive(Clone)]
pub struct SearchService<S> {
    store: S,
}

impl<S: DocumentStore> SearchService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn search_books<L: BookLookup>(
        &self,
        lookup: &L,
        query: &str,
        target: SearchTarget,
    ) -> Result<Vec<Book>, SalonError> {
        lookup.search(query, target).await
    }

    pub async fn community_search(&self, term: &str) -> Result<SearchResults, SalonError> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(SearchResults::default());
        }

        let forums: Vec<Forum> = self
            .store
            .fetch_all(
                &Query::collection(FORUMS)
                    .order_by("lastActivityAt", SortOrder::Desc)
                    .limit(FORUMS_SCANNED),
            )
            .await?;

        let mut results = SearchResults::default();
        for forum in &forums {
            if forum_matches(forum, &needle) && results.forums.len() < MAX_RESULTS {
                results.forums.push(forum.clone());
            }

            let posts: Vec<Post> = self
                .store
                .fetch_all(
                    &Query::collection(keys::posts(&forum.isbn))
                        .order_by("createdAt", SortOrder::Desc)
                        .limit(POSTS_PER_FORUM),
                )
                .await?;
            let comment_queries: Vec<Query> = posts
                .iter()
                .map(|post| {
                    Query::collection(keys::comments(&forum.isbn, &post.id))
                        .order_by("createdAt", SortOrder::Desc)
                        .limit(COMMENTS_PER_POST)
                })
                .collect();
            let comments =
                try_join_all(comment_queries.iter().map(|query| self.store.fetch_all::<Comment>(query))).await?;

            for (post, comments) in posts.into_iter().zip(comments) {
                for comment in comments {
                    if results.comments.len() < MAX_RESULTS && comment_matches(&comment, &needle) {
                        results.comments.push(CommentHit {
                            isbn: forum.isbn.clone(),
                            post_id: post.id.clone(),
                            post_title: post.title.clone(),
                            comment,
                        });
                    }
                }
                if results.posts.len() < MAX_RESULTS && post_matches(&post, &needle) {
                    results.posts.push(PostHit {
                        isbn: forum.isbn.clone(),
                        forum_title: forum.book.title.clone(),
                        post,
                    });
                }
            }
        }
        Ok(results)
    }

    pub async fn search_users(&self, term: &str, limit: usize) -> Result<Vec<UserProfile>, SalonError> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let users: Vec<UserProfile> = self.store.fetch_all(&Query::collection(USERS)).await?;
        Ok(users
            .into_iter()
            .filter(|user| contains(&user.nickname, &needle) || contains(&user.email, &needle))
            .take(limit)
            .collect())
    }
}
