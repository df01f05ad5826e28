use super::support::*;
use booksalon::{
    jobs::{TriggerEvent, TriggerOutcome},
    keys::FORUMS,
    models::MessageType,
};
use serde_json::json;

#[tokio::test]
async fn failed_follow_rolls_back_the_callers_side() {
    let store = FlakyStore::new();
    let salon = Salon::new(store.clone());
    let alice = member(&salon, "alice").await;
    member(&salon, "bob").await;
    store.fail_updates_to(USERS, "bob");

    let err = salon.social().toggle_follow(&alice, "bob").await.expect_err("bob's side fails");
    assert!(matches!(err, SalonError::Remote { .. }));

    let alice = salon.users().require_profile("alice").await.expect("alice");
    assert!(alice.following.is_empty());
    let bob = salon.users().require_profile("bob").await.expect("bob");
    assert!(bob.followers.is_empty());
}

#[tokio::test]
async fn failed_room_update_removes_the_message() {
    let store = FlakyStore::new();
    let salon = Salon::new(store.clone());
    let alice = member(&salon, "alice").await;
    member(&salon, "bob").await;
    let room = salon.messaging().get_or_create_chat_room(&alice, "bob").await.expect("room");
    store.fail_updates_to(CHAT_ROOMS, &room.id);

    salon
        .messaging()
        .send_message(&alice, "bob", "안녕", MessageType::Text)
        .await
        .expect_err("room summary fails");

    assert!(salon.messaging().messages(&alice, &room.id, 10).await.expect("messages").is_empty());
    assert_eq!(salon.messaging().total_unread("bob").await.expect("unread"), 0);
    assert_eq!(salon.notifications().unread_count("bob").await.expect("notifications"), 0);
}

#[tokio::test]
async fn delivered_messages_update_the_room_summary() {
    let salon = memory_salon();
    let alice = member(&salon, "alice").await;
    let bob = member(&salon, "bob").await;

    salon
        .messaging()
        .send_message(&alice, "bob", "안녕", MessageType::Text)
        .await
        .expect("first");
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    salon
        .messaging()
        .send_message(&alice, "bob", "책 읽었어?", MessageType::Text)
        .await
        .expect("second");

    let rooms = salon.messaging().chat_rooms("bob").await.expect("rooms");
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].last_message, "책 읽었어?");
    assert_eq!(rooms[0].unread_for("bob"), 2);
    assert_eq!(rooms[0].unread_for("alice"), 0);

    let history = salon.messaging().messages(&bob, &rooms[0].id, 10).await.expect("history");
    let contents: Vec<&str> = history.iter().map(|message| message.content.as_str()).collect();
    assert_eq!(contents, ["안녕", "책 읽었어?"]);

    salon.messaging().mark_room_read(&bob, &rooms[0].id).await.expect("read");
    assert_eq!(salon.messaging().total_unread("bob").await.expect("unread"), 0);
}

#[tokio::test]
async fn redispatch_after_partial_trigger_failure_counts_once() {
    let store = FlakyStore::new();
    let salon = Salon::new(store.clone());
    store
        .create(FORUMS, "123", json!({"isbn": "123", "postCount": 0}))
        .await
        .expect("seed forum");
    store.fail_updates_to(STATS, TOTALS_DOC);

    let event = TriggerEvent::post_created("123", "p1");
    let err = salon.triggers().dispatch(&event).await.expect_err("totals fail");
    assert!(matches!(err, SalonError::Remote { .. }));
    let forum = salon.store().get(FORUMS, "123").await.expect("get").expect("forum");
    assert_eq!(forum.data["postCount"], json!(1));

    store.recover_updates_to(STATS, TOTALS_DOC);
    assert_eq!(salon.triggers().dispatch(&event).await.expect("resume"), TriggerOutcome::Applied);
    assert_eq!(salon.triggers().dispatch(&event).await.expect("replay"), TriggerOutcome::Replayed);

    let forum = salon.store().get(FORUMS, "123").await.expect("get").expect("forum");
    assert_eq!(forum.data["postCount"], json!(1));
    let totals: Totals = salon.store().fetch(STATS, TOTALS_DOC).await.expect("fetch").expect("totals");
    assert_eq!(totals.total_posts, 1);
}
