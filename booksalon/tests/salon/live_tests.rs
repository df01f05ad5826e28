use super::support::*;
use std::time::Duration;
use tokio::time::timeout;

const ISBN: &str = "9788937460449";
const WAIT: Duration = Duration::from_secs(2);

#[tokio::test]
async fn live_posts_follow_writes_and_stop_after_unmount() {
    let salon = memory_salon();
    let writer = member(&salon, "writer").await;
    seed_forum(&salon, &writer, ISBN, "데미안").await;

    let mut live = salon.forums().watch_posts(ISBN).await.expect("mount");
    assert!(live.items().is_empty());
    assert_eq!(live.snapshots(), 1);

    seed_post(&salon, &writer, ISBN, "첫 글").await;
    assert!(timeout(WAIT, live.refresh()).await.expect("pushed").expect("refresh"));
    assert_eq!(live.items().len(), 1);

    // A local edit lasts only until the next snapshot.
    live.apply_optimistic(|posts| posts.clear());
    assert!(live.items().is_empty());
    seed_post(&salon, &writer, ISBN, "둘째 글").await;
    assert!(timeout(WAIT, live.refresh()).await.expect("pushed").expect("refresh"));
    assert_eq!(live.items().len(), 2);

    live.unmount();
    assert!(!live.is_mounted());
    assert!(!live.refresh().await.expect("unmounted refresh"));
}

#[tokio::test]
async fn live_forum_sees_post_count_change() {
    let salon = memory_salon();
    let writer = member(&salon, "writer").await;
    seed_forum(&salon, &writer, ISBN, "데미안").await;

    let mut forum = salon.forums().watch_forum(ISBN).await.expect("mount");
    assert_eq!(forum.value().map(|forum| forum.post_count), Some(0));

    seed_post(&salon, &writer, ISBN, "첫 글").await;
    assert!(timeout(WAIT, forum.refresh()).await.expect("pushed").expect("refresh"));
    assert_eq!(forum.value().map(|forum| forum.post_count), Some(1));
}

#[tokio::test]
async fn unread_notifications_stream_to_the_recipient() {
    let salon = memory_salon();
    let alice = member(&salon, "alice").await;
    member(&salon, "bob").await;

    let mut inbox = salon.notifications().watch("bob").await.expect("mount");
    assert!(inbox.items().is_empty());

    salon.social().toggle_follow(&alice, "bob").await.expect("follow");
    assert!(timeout(WAIT, inbox.refresh()).await.expect("pushed").expect("refresh"));
    assert_eq!(inbox.items().len(), 1);
    assert_eq!(inbox.items()[0].user_id, "bob");
}
