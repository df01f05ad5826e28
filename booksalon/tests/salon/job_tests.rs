use super::support::*;
use booksalon::{
    config::JobSettings,
    jobs::{TriggerEvent, TriggerOutcome, run_daily_metrics, run_popular_forums, run_popular_posts, run_scheduler},
    keys::{AGGREGATES, DAILY_METRICS, POPULAR_FORUMS_DOC},
    models::{DailyMetrics, Leaderboard, PopularForum},
    services::engagement::LikeTarget,
};
use chrono::{Duration, FixedOffset};

const BUSY: &str = "9788937460449";
const QUIET: &str = "9788932917245";

fn seoul() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).expect("offset")
}

/// BUSY: two posts, one comment, one like. QUIET: one post.
async fn seed_activity(salon: &Salon<MemoryStore>) {
    let writer = member(salon, "writer").await;
    let reader = member(salon, "reader").await;
    seed_forum(salon, &writer, BUSY, "데미안").await;
    seed_forum(salon, &writer, QUIET, "코스모스").await;

    let first = seed_post(salon, &writer, BUSY, "첫 글").await;
    seed_post(salon, &writer, BUSY, "둘째 글").await;
    seed_post(salon, &writer, QUIET, "조용한 글").await;
    salon
        .forums()
        .create_comment(&reader, BUSY, &first.id, "좋네요")
        .await
        .expect("comment");
    salon
        .engagement()
        .toggle_like(&reader, &LikeTarget::post(BUSY, first.id.as_str()))
        .await
        .expect("like");
}

#[tokio::test]
async fn replayed_trigger_does_not_double_count() {
    let salon = memory_salon();
    let writer = member(&salon, "writer").await;
    seed_forum(&salon, &writer, BUSY, "데미안").await;

    let event = TriggerEvent::post_created(BUSY, "external-post");
    assert_eq!(salon.triggers().dispatch(&event).await.expect("apply"), TriggerOutcome::Applied);
    assert_eq!(salon.triggers().dispatch(&event).await.expect("replay"), TriggerOutcome::Replayed);

    let forum = salon.forums().require_forum(BUSY).await.expect("forum");
    assert_eq!(forum.post_count, 1);
    let totals: Totals = salon.store().fetch(STATS, TOTALS_DOC).await.expect("fetch").expect("totals");
    assert_eq!(totals.total_posts, 1);
}

#[tokio::test]
async fn forum_leaderboard_scores_posts_comments_and_likes() {
    let salon = memory_salon();
    seed_activity(&salon).await;

    let board = run_popular_forums(salon.store(), Timestamp::now()).await.expect("job");
    assert_eq!(board.entries.len(), 2);
    let top = &board.entries[0];
    assert_eq!(top.isbn, BUSY);
    assert_eq!((top.post_count, top.comment_count, top.like_count), (2, 1, 1));
    assert_eq!(top.score, 2 * 2 + 1 + 1);
    assert_eq!(board.entries[1].score, 2);

    let stored: Leaderboard<PopularForum> = salon
        .store()
        .fetch(AGGREGATES, POPULAR_FORUMS_DOC)
        .await
        .expect("fetch")
        .expect("leaderboard");
    assert_eq!(stored.entries, board.entries);
}

#[tokio::test]
async fn post_leaderboard_ranks_liked_posts_first() {
    let salon = memory_salon();
    seed_activity(&salon).await;

    let board = run_popular_posts(salon.store(), Timestamp::now()).await.expect("job");
    assert_eq!(board.entries.len(), 3);
    assert_eq!(board.entries[0].title, "첫 글");
    assert_eq!(board.entries[0].score, 2 + 1);
}

#[tokio::test]
async fn daily_metrics_count_the_previous_local_day() {
    let salon = memory_salon();
    seed_activity(&salon).await;

    // Run as if it were tomorrow so today's writes fall in "yesterday".
    let tomorrow = Timestamp::now().plus(Duration::days(1));
    let metrics = run_daily_metrics(salon.store(), tomorrow, seoul()).await.expect("job");
    assert_eq!(metrics.new_users, 2);
    assert_eq!(metrics.new_forums, 2);
    assert_eq!(metrics.new_posts, 3);
    assert_eq!(metrics.new_comments, 1);
    assert_eq!(metrics.total_forums, 2);

    let stored: DailyMetrics = salon
        .store()
        .fetch(DAILY_METRICS, &metrics.date)
        .await
        .expect("fetch")
        .expect("metrics");
    assert_eq!((stored.new_posts, stored.new_comments), (3, 1));

    // Nothing happened the day before.
    let today = run_daily_metrics(salon.store(), Timestamp::now(), seoul()).await.expect("job");
    assert_eq!(today.new_posts, 0);
}

#[tokio::test]
async fn scheduler_stops_on_shutdown() {
    let salon = memory_salon();
    run_scheduler(salon.store(), &JobSettings::default(), async {})
        .await
        .expect("scheduler");
}
