//! Daily activity metrics for the previous calendar day.

use chrono::{FixedOffset, NaiveDate};
use futures_util::future::try_join_all;
use log::info;

use crate::{
    errors::SalonError,
    keys::{self, DAILY_METRICS, FORUMS, REPORTS, USERS},
    models::DailyMetrics,
    store::{Document, DocumentStore, Query},
    timestamp::Timestamp,
};

/// Half-open `[start, end)` window of one local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub date: NaiveDate,
    pub start: Timestamp,
    pub end: Timestamp,
}

impl DayWindow {
    /// The local day before the one containing `now`.
    pub fn yesterday(now: Timestamp, offset: FixedOffset) -> Result<Self, SalonError> {
        let today = now.as_datetime().with_timezone(&offset).date_naive();
        let date = today.pred_opt().ok_or_else(|| SalonError::Other {
            message: format!("no day before {today}").into(),
        })?;
        let bound = |day: NaiveDate| {
            Timestamp::start_of_day(day, offset).ok_or_else(|| SalonError::Other {
                message: format!("no local midnight for {day}").into(),
            })
        };
        Ok(Self {
            date,
            start: bound(date)?,
            end: bound(today)?,
        })
    }

    pub fn contains(&self, at: Timestamp) -> bool {
        self.start <= at && at < self.end
    }

    /// Whether `createdAt` of the document falls inside the window. Every
    /// stored timestamp encoding is accepted; undecodable values are skipped.
    fn created_in(&self, document: &Document) -> bool {
        document
            .field("createdAt")
            .and_then(Timestamp::from_value)
            .is_some_and(|at| self.contains(at))
    }

    fn count(&self, documents: &[Document]) -> u64 {
        documents.iter().filter(|document| self.created_in(document)).count() as u64
    }
}

/// Counts posts and comments of one forum created in `window`.
async fn count_forum<S: DocumentStore>(store: &S, isbn: &str, window: &DayWindow) -> Result<(u64, u64), SalonError> {
    let posts = store.query(&Query::collection(keys::posts(isbn))).await?;
    let comment_queries: Vec<Query> = posts
        .iter()
        .map(|post| Query::collection(keys::comments(isbn, &post.id)))
        .collect();
    let comments = try_join_all(comment_queries.iter().map(|query| store.query(query))).await?;
    let new_comments = comments.iter().map(|batch| window.count(batch)).sum();
    Ok((window.count(&posts), new_comments))
}

/// Computes and stores `dailyMetrics/{date}` for the day before `now`.
pub async fn run_daily_metrics<S: DocumentStore>(
    store: &S,
    now: Timestamp,
    offset: FixedOffset,
) -> Result<DailyMetrics, SalonError> {
    let window = DayWindow::yesterday(now, offset)?;

    let users = store.query(&Query::collection(USERS)).await?;
    let forums = store.query(&Query::collection(FORUMS)).await?;
    let reports = store.query(&Query::collection(REPORTS)).await?;
    let per_forum = try_join_all(forums.iter().map(|forum| count_forum(store, &forum.id, &window))).await?;

    let metrics = DailyMetrics {
        date: window.date.format("%Y-%m-%d").to_string(),
        new_users: window.count(&users),
        new_forums: window.count(&forums),
        new_posts: per_forum.iter().map(|(posts, _)| posts).sum(),
        new_comments: per_forum.iter().map(|(_, comments)| comments).sum(),
        new_reports: window.count(&reports),
        total_users: users.len() as u64,
        total_forums: forums.len() as u64,
        generated_at: now,
    };
    store.put(DAILY_METRICS, &metrics.date, &metrics).await?;
    info!(
        "daily metrics {}: {} users, {} forums, {} posts, {} comments, {} reports",
        metrics.date, metrics.new_users, metrics.new_forums, metrics.new_posts, metrics.new_comments, metrics.new_reports
    );
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::store::MemoryStore;

    fn kst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).expect("offset")
    }

    #[test]
    fn window_uses_the_local_calendar() {
        // 2026-03-02 01:00 KST is still 2026-03-01 in UTC.
        let now = Timestamp::from_datetime(Utc.with_ymd_and_hms(2026, 3, 1, 16, 0, 0).single().expect("time"));
        let window = DayWindow::yesterday(now, kst()).expect("window");
        assert_eq!(window.date.to_string(), "2026-03-01");
        assert_eq!(window.start.as_datetime(), Utc.with_ymd_and_hms(2026, 2, 28, 15, 0, 0).single().expect("time"));
        assert_eq!(window.end.as_datetime(), Utc.with_ymd_and_hms(2026, 3, 1, 15, 0, 0).single().expect("time"));
    }

    #[tokio::test]
    async fn counts_nested_documents_in_every_encoding() {
        let store = MemoryStore::new();
        let now = Timestamp::from_datetime(Utc.with_ymd_and_hms(2026, 3, 2, 3, 0, 0).single().expect("time"));
        let window = DayWindow::yesterday(now, kst()).expect("window");
        let inside = window.start.plus(chrono::Duration::hours(2));
        let outside = window.start.plus(chrono::Duration::hours(-2));

        store
            .create(USERS, "u1", json!({"uid": "u1", "createdAt": inside.millis()}))
            .await
            .expect("user");
        store
            .create(USERS, "u2", json!({"uid": "u2", "createdAt": outside.millis()}))
            .await
            .expect("user");
        store
            .create(FORUMS, "111", json!({"isbn": "111", "createdAt": inside.as_datetime().to_rfc3339()}))
            .await
            .expect("forum");
        store
            .create(
                &keys::posts("111"),
                "p1",
                json!({"createdAt": {"seconds": inside.millis() / 1000, "nanoseconds": 0}}),
            )
            .await
            .expect("post");
        for id in ["c1", "c2"] {
            store
                .create(&keys::comments("111", "p1"), id, json!({"createdAt": inside.millis()}))
                .await
                .expect("comment");
        }

        let metrics = run_daily_metrics(&store, now, kst()).await.expect("metrics");
        assert_eq!(metrics.new_users, 1);
        assert_eq!(metrics.new_forums, 1);
        assert_eq!(metrics.new_posts, 1);
        assert_eq!(metrics.new_comments, 2);
        assert_eq!(metrics.total_users, 2);

        let stored: DailyMetrics = store.fetch(DAILY_METRICS, &metrics.date).await.expect("fetch").expect("stored");
        assert_eq!(stored, metrics);
    }
}
