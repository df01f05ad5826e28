use futures_util::future::try_join_all;
use serde_json::{Map, Value};

use crate::{
    errors::SalonError,
    id::generate_document_id,
    keys::ACTIVITIES,
    models::{Activity, ActivityType},
    store::{DocumentStore, Filter, Query, SortOrder},
    timestamp::Timestamp,
};

use super::{require_profile, to_value};

/// Largest value list an `In` filter accepts.
const IN_FILTER_LIMIT: usize = 10;

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub kind: ActivityType,
    pub user_id: String,
    pub target_id: String,
    pub target_title: String,
    pub forum_isbn: Option<String>,
    pub metadata: Map<String, Value>,
}

impl NewActivity {
    pub fn new(kind: ActivityType, user_id: impl Into<String>, target_id: impl Into<String>, target_title: impl Into<String>) -> Self {
        Self {
            kind,
            user_id: user_id.into(),
            target_id: target_id.into(),
            target_title: target_title.into(),
            forum_isbn: None,
            metadata: Map::new(),
        }
    }

    pub fn in_forum(mut self, isbn: impl Into<String>) -> Self {
        self.forum_isbn = Some(isbn.into());
        self
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Clone)]
pub struct ActivityService<S> {
    store: S,
}

impl<S: DocumentStore> ActivityService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn record(&self, activity: NewActivity) -> Result<String, SalonError> {
        let id = generate_document_id();
        let record = Activity {
            id: id.clone(),
            kind: activity.kind,
            user_id: activity.user_id,
            target_id: activity.target_id,
            target_title: activity.target_title,
            forum_isbn: activity.forum_isbn,
            created_at: Timestamp::now(),
            metadata: activity.metadata,
        };
        self.store.create(ACTIVITIES, &id, to_value(&record)?).await?;
        Ok(id)
    }

    pub async fn user_activities(&self, uid: &str, limit: usize) -> Result<Vec<Activity>, SalonError> {
        let query = Query::collection(ACTIVITIES)
            .filter(Filter::eq("userId", uid))
            .order_by("createdAt", SortOrder::Desc)
            .limit(limit);
        self.store.fetch_all(&query).await
    }

    /// Newest activities of everyone `uid` follows.
    pub async fn following_feed(&self, uid: &str, limit: usize) -> Result<Vec<Activity>, SalonError> {
        let profile = require_profile(&self.store, uid).await?;
        if profile.following.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let queries: Vec<Query> = profile
            .following
            .chunks(IN_FILTER_LIMIT)
            .map(|chunk| {
                Query::collection(ACTIVITIES)
                    .filter(Filter::is_in("userId", chunk.iter().map(String::as_str)))
                    .order_by("createdAt", SortOrder::Desc)
                    .limit(limit)
            })
            .collect();
        let batches = try_join_all(queries.iter().map(|query| self.store.fetch_all::<Activity>(query))).await?;

        let mut feed: Vec<Activity> = batches.into_iter().flatten().collect();
        feed.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        feed.truncate(limit);
        Ok(feed)
    }
}
