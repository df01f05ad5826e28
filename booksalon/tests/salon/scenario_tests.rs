use super::support::*;
use booksalon::services::engagement::LikeTarget;

const ISBN: &str = "9788937460449";
/// Forum ids are store keys, not checked ISBNs.
const FIRST_FORUM: &str = "123";

#[tokio::test]
async fn forum_post_comment_walkthrough() {
    let salon = memory_salon();
    let u1 = member(&salon, "u1").await;
    let u2 = member(&salon, "u2").await;

    seed_forum(&salon, &u1, FIRST_FORUM, "데미안").await;
    let post = seed_post(&salon, &u1, FIRST_FORUM, "Hello").await;
    salon
        .forums()
        .create_comment(&u2, FIRST_FORUM, &post.id, "Nice")
        .await
        .expect("comment");

    let forum = salon.forums().require_forum(FIRST_FORUM).await.expect("forum");
    assert_eq!(forum.post_count, 1);
    let listed = salon.forums().posts(FIRST_FORUM, 10).await.expect("posts");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].comment_count, 1);

    // Reads need no session.
    let read = salon.forums().require_post(FIRST_FORUM, &post.id).await.expect("post");
    assert_eq!(read.title, "Hello");
    assert_eq!(read.comment_count, 1);
    assert!(read.last_comment_at.is_some());

    let comments = salon.forums().comments(FIRST_FORUM, &post.id).await.expect("comments");
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].author.uid, "u2");

    // The post author hears about the comment, the commenter does not.
    assert_eq!(salon.notifications().unread_count("u1").await.expect("u1"), 1);
    assert_eq!(salon.notifications().unread_count("u2").await.expect("u2"), 0);

    let totals: Totals = salon.store().fetch(STATS, TOTALS_DOC).await.expect("fetch").expect("totals");
    assert_eq!(
        totals,
        Totals {
            total_forums: 1,
            total_posts: 1,
            total_comments: 1,
        }
    );
}

#[tokio::test]
async fn anonymous_visitors_cannot_write() {
    let salon = memory_salon();
    let u1 = member(&salon, "u1").await;
    seed_forum(&salon, &u1, ISBN, "데미안").await;

    let err = salon
        .forums()
        .create_post(&Session::anonymous(), ISBN, NewPost::new("제목", "내용"))
        .await
        .expect_err("anonymous post");
    assert!(matches!(err, SalonError::AuthRequired));
}

#[tokio::test]
async fn post_count_tracks_creates_minus_deletes() {
    let salon = memory_salon();
    let author = member(&salon, "author").await;
    seed_forum(&salon, &author, ISBN, "데미안").await;

    let mut posts = Vec::new();
    for index in 0..5 {
        posts.push(seed_post(&salon, &author, ISBN, &format!("글 {index}")).await);
    }
    for post in posts.iter().take(2) {
        salon
            .forums()
            .delete_post(&author, ISBN, &post.id)
            .await
            .expect("delete");
    }

    let forum = salon.forums().require_forum(ISBN).await.expect("forum");
    assert_eq!(forum.post_count, 3);
    assert_eq!(salon.forums().posts(ISBN, 50).await.expect("posts").len(), 3);
    let profile = salon.users().require_profile("author").await.expect("profile");
    assert_eq!(profile.post_count, 3);
}

#[tokio::test]
async fn only_the_author_deletes_a_post() {
    let salon = memory_salon();
    let author = member(&salon, "author").await;
    let other = member(&salon, "other").await;
    seed_forum(&salon, &author, ISBN, "데미안").await;
    let post = seed_post(&salon, &author, ISBN, "내 글").await;

    let err = salon
        .forums()
        .delete_post(&other, ISBN, &post.id)
        .await
        .expect_err("not the author");
    assert!(matches!(err, SalonError::OwnershipViolation { .. }));
    assert!(salon.forums().post(ISBN, &post.id).await.expect("read").is_some());
}

#[tokio::test]
async fn like_count_matches_likers() {
    let salon = memory_salon();
    let author = member(&salon, "author").await;
    seed_forum(&salon, &author, ISBN, "데미안").await;
    let post = seed_post(&salon, &author, ISBN, "좋아요 받을 글").await;
    let target = LikeTarget::post(ISBN, post.id.as_str());

    let mut fans = Vec::new();
    for uid in ["a", "b", "c"] {
        fans.push(member(&salon, uid).await);
    }
    for fan in &fans {
        let outcome = salon.engagement().toggle_like(fan, &target).await.expect("like");
        assert!(outcome.liked);
    }
    let outcome = salon.engagement().toggle_like(&fans[1], &target).await.expect("unlike");
    assert!(!outcome.liked);
    assert_eq!(outcome.like_count, 2);

    let post = salon.forums().require_post(ISBN, &post.id).await.expect("post");
    assert_eq!(post.like_count, post.likes.len() as i64);
    assert_eq!(post.likes, vec!["a".to_string(), "c".to_string()]);
    assert!(salon.engagement().has_liked("c", &target).await.expect("has liked"));
}

#[tokio::test]
async fn comment_likes_resolve_through_the_index() {
    let salon = memory_salon();
    let author = member(&salon, "author").await;
    let fan = member(&salon, "fan").await;
    seed_forum(&salon, &author, ISBN, "데미안").await;
    let post = seed_post(&salon, &author, ISBN, "글").await;
    let comment = salon
        .forums()
        .create_comment(&author, ISBN, &post.id, "첫 댓글")
        .await
        .expect("comment");

    let outcome = salon
        .engagement()
        .toggle_like(&fan, &LikeTarget::comment(ISBN, comment.id.as_str()))
        .await
        .expect("like comment");
    assert!(outcome.liked);
    assert_eq!(outcome.like_count, 1);
}

#[tokio::test]
async fn following_twice_unfollows() {
    let salon = memory_salon();
    let alice = member(&salon, "alice").await;
    member(&salon, "bob").await;

    assert!(salon.social().toggle_follow(&alice, "bob").await.expect("follow"));
    assert!(salon.social().is_following("alice", "bob").await.expect("check"));
    let counts = salon.social().follow_counts("bob").await.expect("counts");
    assert_eq!((counts.followers, counts.following), (1, 0));

    assert!(!salon.social().toggle_follow(&alice, "bob").await.expect("unfollow"));
    assert!(!salon.social().is_following("alice", "bob").await.expect("check"));
    assert!(salon.social().followers("bob").await.expect("followers").is_empty());
}

#[tokio::test]
async fn chat_room_is_reused_for_the_same_pair() {
    let salon = memory_salon();
    let alice = member(&salon, "alice").await;
    let bob = member(&salon, "bob").await;

    let first = salon.messaging().get_or_create_chat_room(&alice, "bob").await.expect("first");
    let second = salon.messaging().get_or_create_chat_room(&alice, "bob").await.expect("second");
    let from_bob = salon.messaging().get_or_create_chat_room(&bob, "alice").await.expect("reverse");
    assert_eq!(first.id, second.id);
    assert_eq!(first.id, from_bob.id);
    assert_eq!(salon.messaging().chat_rooms("alice").await.expect("rooms").len(), 1);
}

#[tokio::test]
async fn ratings_average_rounds_to_one_decimal() {
    let salon = memory_salon();
    let owner = member(&salon, "owner").await;
    seed_forum(&salon, &owner, ISBN, "데미안").await;

    let mut summary = None;
    for (uid, rating) in [("r1", 3), ("r2", 4), ("r3", 5)] {
        let reader = member(&salon, uid).await;
        summary = Some(salon.ratings().rate_book(&reader, ISBN, rating).await.expect("rate"));
    }
    let summary = summary.expect("rated");
    assert_eq!(summary.average, 4.0);
    assert_eq!(summary.total, 3);

    let reader = member(&salon, "r4").await;
    let summary = salon.ratings().rate_book(&reader, ISBN, 2).await.expect("rate");
    assert_eq!(summary.average, 3.5);
    assert_eq!(summary.total, 4);
    assert_eq!(summary.distribution, [0, 1, 1, 1, 1]);

    let forum = salon.forums().require_forum(ISBN).await.expect("forum");
    assert_eq!(forum.average_rating, 3.5);
    assert_eq!(forum.total_ratings, 4);

    // Re-rating replaces the earlier score.
    let summary = salon.ratings().rate_book(&reader, ISBN, 4).await.expect("re-rate");
    assert_eq!(summary.total, 4);
    assert_eq!(salon.ratings().user_rating("r4", ISBN).await.expect("mine"), Some(4));
}
