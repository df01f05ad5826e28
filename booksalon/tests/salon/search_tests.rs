use super::support::*;
use booksalon::{BookLookup, SearchTarget};

const ISBN: &str = "9788937460449";

struct ShelfLookup(Vec<Book>);

impl BookLookup for ShelfLookup {
    async fn search(&self, query: &str, target: SearchTarget) -> Result<Vec<Book>, SalonError> {
        Ok(self
            .0
            .iter()
            .filter(|book| match target {
                SearchTarget::Isbn => book.isbn == query,
                SearchTarget::Title => book.title.contains(query),
            })
            .cloned()
            .collect())
    }
}

async fn seeded() -> Salon<MemoryStore> {
    let salon = memory_salon();
    let writer = member(&salon, "writer").await;
    let reader = member(&salon, "reader").await;
    seed_forum(&salon, &writer, ISBN, "데미안").await;
    let post = salon
        .forums()
        .create_post(&writer, ISBN, NewPost::new("싱클레어의 성장", "알을 깨고 나오는 이야기"))
        .await
        .expect("post");
    salon
        .forums()
        .create_comment(&reader, ISBN, &post.id, "데미안은 다시 읽어도 좋아요")
        .await
        .expect("comment");
    salon
}

#[tokio::test]
async fn community_search_spans_forums_posts_and_comments() {
    let salon = seeded().await;

    let results = salon.search().community_search("데미안").await.expect("search");
    assert_eq!(results.forums.len(), 1);
    assert!(results.posts.is_empty());
    assert_eq!(results.comments.len(), 1);
    assert_eq!(results.comments[0].post_title, "싱클레어의 성장");

    let results = salon.search().community_search("  알을 깨고 ").await.expect("search");
    assert_eq!(results.posts.len(), 1);
    assert_eq!(results.posts[0].forum_title, "데미안");

    assert!(salon.search().community_search("   ").await.expect("blank").is_empty());
}

#[tokio::test]
async fn user_search_matches_email() {
    let salon = seeded().await;
    let users = salon.search().search_users("READER@", 10).await.expect("users");
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].uid, "reader");
}

#[tokio::test]
async fn book_search_delegates_to_the_lookup() {
    let salon = memory_salon();
    let shelf = ShelfLookup(vec![book(ISBN, "데미안"), book("9788932917245", "코스모스")]);

    let found = salon
        .search()
        .search_books(&shelf, "코스", SearchTarget::Title)
        .await
        .expect("search");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].isbn, "9788932917245");
}
