//! Key and collection-path construction shared by the stores and services.

/// Redis key helpers for one key prefix.
#[derive(Debug, Clone)]
pub struct KeyContext<'a> {
    pub prefix: &'a str,
}

impl<'a> KeyContext<'a> {
    pub fn new(prefix: &'a str) -> Self {
        Self { prefix }
    }

    pub fn document(&self, collection: &str, id: &str) -> String {
        format!("{}:doc:{}:{}", self.prefix, collection, id)
    }

    /// Set holding every document id of a collection.
    pub fn collection_index(&self, collection: &str) -> String {
        format!("{}:idx:{}", self.prefix, collection)
    }

    /// Pub/sub channel carrying change notifications between processes.
    pub fn changes_channel(&self) -> String {
        format!("{}:changes", self.prefix)
    }

    /// Glob matching every key under the prefix (test cleanup).
    pub fn prefix_pattern(&self) -> String {
        format!("{}:*", self.prefix)
    }
}

pub const FORUMS: &str = "forums";
pub const USERS: &str = "users";
pub const CHAT_ROOMS: &str = "chatRooms";
pub const NOTIFICATIONS: &str = "notifications";
pub const ACTIVITIES: &str = "activities";
pub const REPORTS: &str = "reports";
pub const BOOK_RATINGS: &str = "bookRatings";
pub const COMMENT_INDEX: &str = "commentIndex";
pub const TRIGGER_RECEIPTS: &str = "triggerReceipts";
pub const DAILY_METRICS: &str = "dailyMetrics";
pub const AGGREGATES: &str = "aggregates";
pub const STATS: &str = "stats";

pub const POPULAR_FORUMS_DOC: &str = "popularForums";
pub const POPULAR_POSTS_DOC: &str = "popularPosts";
pub const TOTALS_DOC: &str = "totals";

pub fn posts(isbn: &str) -> String {
    format!("{FORUMS}/{isbn}/posts")
}

pub fn comments(isbn: &str, post_id: &str) -> String {
    format!("{FORUMS}/{isbn}/posts/{post_id}/comments")
}

pub fn messages(room_id: &str) -> String {
    format!("{CHAT_ROOMS}/{room_id}/messages")
}

pub fn rating_id(isbn: &str, uid: &str) -> String {
    format!("{isbn}_{uid}")
}
