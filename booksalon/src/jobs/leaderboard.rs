//! Hourly leaderboards written to `aggregates/popularForums` and `aggregates/popularPosts`.

use futures_util::future::try_join_all;
use log::info;

use crate::{
    errors::SalonError,
    keys::{self, AGGREGATES, FORUMS, POPULAR_FORUMS_DOC, POPULAR_POSTS_DOC},
    models::{Forum, Leaderboard, PopularForum, PopularPost, Post},
    store::{DocumentStore, Query},
    timestamp::Timestamp,
};

pub const LEADERBOARD_SIZE: usize = 10;
const POSTS_PER_FORUM: usize = 5;

async fn forums_with_posts<S: DocumentStore>(store: &S) -> Result<Vec<(Forum, Vec<Post>)>, SalonError> {
    let forums: Vec<Forum> = store.fetch_all(&Query::collection(FORUMS)).await?;
    let queries: Vec<Query> = forums.iter().map(|forum| Query::collection(keys::posts(&forum.isbn))).collect();
    let posts = try_join_all(queries.iter().map(|query| store.fetch_all::<Post>(query))).await?;
    Ok(forums.into_iter().zip(posts).collect())
}

fn forum_entry(forum: &Forum, posts: &[Post]) -> PopularForum {
    let post_count = posts.len() as i64;
    let comment_count: i64 = posts.iter().map(|post| post.comment_count).sum();
    let like_count: i64 = posts.iter().map(|post| post.like_count).sum();
    PopularForum {
        isbn: forum.isbn.clone(),
        title: forum.book.title.clone(),
        score: post_count * 2 + comment_count + like_count,
        post_count,
        comment_count,
        like_count,
    }
}

/// Ranks forums by `posts * 2 + comments + likes` and keeps the top ten.
pub async fn run_popular_forums<S: DocumentStore>(store: &S, now: Timestamp) -> Result<Leaderboard<PopularForum>, SalonError> {
    let mut entries: Vec<PopularForum> = forums_with_posts(store)
        .await?
        .iter()
        .map(|(forum, posts)| forum_entry(forum, posts))
        .collect();
    entries.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.isbn.cmp(&b.isbn)));
    entries.truncate(LEADERBOARD_SIZE);

    let board = Leaderboard { entries, updated_at: now };
    store.put(AGGREGATES, POPULAR_FORUMS_DOC, &board).await?;
    info!("popular forums refreshed ({} entries)", board.entries.len());
    Ok(board)
}

/// Takes each forum's five most liked posts, scores them `likes * 2 + comments`
/// and keeps the top ten overall.
pub async fn run_popular_posts<S: DocumentStore>(store: &S, now: Timestamp) -> Result<Leaderboard<PopularPost>, SalonError> {
    let mut entries = Vec::new();
    for (forum, mut posts) in forums_with_posts(store).await? {
        posts.sort_by(|a, b| b.like_count.cmp(&a.like_count).then_with(|| a.id.cmp(&b.id)));
        entries.extend(posts.into_iter().take(POSTS_PER_FORUM).map(|post| PopularPost {
            isbn: forum.isbn.clone(),
            score: post.like_count * 2 + post.comment_count,
            post_id: post.id,
            title: post.title,
            like_count: post.like_count,
            comment_count: post.comment_count,
        }));
    }
    entries.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.post_id.cmp(&b.post_id)));
    entries.truncate(LEADERBOARD_SIZE);

    let board = Leaderboard { entries, updated_at: now };
    store.put(AGGREGATES, POPULAR_POSTS_DOC, &board).await?;
    info!("popular posts refreshed ({} entries)", board.entries.len());
    Ok(board)
}
