use log::debug;
use serde::Serialize;

use crate::{
    auth::Session,
    errors::{SalonError, ValidationError},
    keys::{BOOK_RATINGS, FORUMS, rating_id},
    models::BookRating,
    store::{DocumentStore, FieldOp, Filter, Query},
    timestamp::Timestamp,
};

use super::update_counter;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub average: f64,
    pub total: u64,
    /// Counts for ratings 1 through 5.
    pub distribution: [u64; 5],
}

/// Average rounded to one decimal, halves rounding up.
fn round_average(sum: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let average = sum as f64 / total as f64;
    (average * 10.0 + 0.5).floor() / 10.0
}

fn summarize(ratings: &[BookRating]) -> RatingSummary {
    let mut distribution = [0u64; 5];
    let mut sum = 0u64;
    for rating in ratings {
        if (1..=5).contains(&rating.rating) {
            distribution[usize::from(rating.rating - 1)] += 1;
            sum += u64::from(rating.rating);
        }
    }
    let total = distribution.iter().sum();
    RatingSummary {
        average: round_average(sum, total),
        total,
        distribution,
    }
}

#[derive(Clone)]
pub struct RatingService<S> {
    store: S,
}

impl<S: DocumentStore> RatingService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    async fn ratings_for(&self, isbn: &str) -> Result<Vec<BookRating>, SalonError> {
        self.store
            .fetch_all(&Query::collection(BOOK_RATINGS).filter(Filter::eq("isbn", isbn)))
            .await
    }

    /// Stores the caller's rating (replacing an earlier one) and refreshes the
    /// forum's aggregate.
    pub async fn rate_book(&self, session: &Session, isbn: &str, rating: i64) -> Result<RatingSummary, SalonError> {
        let identity = session.require()?;
        let Some(rating) = u8::try_from(rating).ok().filter(|value| (1..=5).contains(value)) else {
            return Err(ValidationError::single("rating", "validation.range", "rating must be between 1 and 5").into());
        };
        if !self.store.exists(FORUMS, isbn).await? {
            return Err(SalonError::not_found("forum", isbn));
        }

        let id = rating_id(isbn, &identity.uid);
        let now = Timestamp::now();
        let created_at = self
            .store
            .fetch::<BookRating>(BOOK_RATINGS, &id)
            .await?
            .map(|existing| existing.created_at)
            .unwrap_or(now);
        let record = BookRating {
            isbn: isbn.to_string(),
            user_id: identity.uid.clone(),
            rating,
            created_at,
            updated_at: now,
        };
        self.store.put(BOOK_RATINGS, &id, &record).await?;
        self.recompute(isbn).await
    }

    /// Recounts every rating of the book; O(number of ratings).
    pub async fn recompute(&self, isbn: &str) -> Result<RatingSummary, SalonError> {
        let summary = summarize(&self.ratings_for(isbn).await?);
        update_counter(
            &self.store,
            FORUMS,
            isbn,
            &[
                FieldOp::set("averageRating", summary.average),
                FieldOp::set("totalRatings", summary.total),
            ],
        )
        .await?;
        debug!("forum {isbn} rating {} over {}", summary.average, summary.total);
        Ok(summary)
    }

    pub async fn user_rating(&self, uid: &str, isbn: &str) -> Result<Option<u8>, SalonError> {
        Ok(self
            .store
            .fetch::<BookRating>(BOOK_RATINGS, &rating_id(isbn, uid))
            .await?
            .map(|rating| rating.rating))
    }

    pub async fn rating_summary(&self, isbn: &str) -> Result<RatingSummary, SalonError> {
        Ok(summarize(&self.ratings_for(isbn).await?))
    }

    pub async fn remove_rating(&self, session: &Session, isbn: &str) -> Result<RatingSummary, SalonError> {
        let identity = session.require()?;
        self.store.delete(BOOK_RATINGS, &rating_id(isbn, &identity.uid)).await?;
        self.recompute(isbn).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{auth::Identity, models::Forum, store::MemoryStore};

    fn session(uid: &str) -> Session {
        Session::signed_in(Identity {
            uid: uid.into(),
            email: format!("{uid}@example.com"),
        })
    }

    #[test]
    fn averages_round_half_up() {
        assert_eq!(round_average(7, 2), 3.5);
        assert_eq!(round_average(10, 3), 3.3);
        assert_eq!(round_average(11, 3), 3.7);
        assert_eq!(round_average(0, 0), 0.0);
    }

    #[tokio::test]
    async fn rerating_replaces_the_previous_value() {
        let store = MemoryStore::new();
        store
            .create(FORUMS, "123", json!({"isbn": "123", "book": {"isbn": "123"}}))
            .await
            .expect("forum");
        let ratings = RatingService::new(store.clone());

        ratings.rate_book(&session("u1"), "123", 4).await.expect("rate");
        let summary = ratings.rate_book(&session("u2"), "123", 3).await.expect("rate");
        assert_eq!(summary.average, 3.5);
        assert_eq!(summary.distribution, [0, 0, 1, 1, 0]);

        let summary = ratings.rate_book(&session("u1"), "123", 5).await.expect("re-rate");
        assert_eq!(summary.total, 2);
        assert_eq!(summary.average, 4.0);
        let forum: Forum = store.fetch(FORUMS, "123").await.expect("fetch").expect("forum");
        assert_eq!(forum.total_ratings, 2);
        assert_eq!(forum.average_rating, 4.0);

        let summary = ratings.remove_rating(&session("u2"), "123").await.expect("remove");
        assert_eq!(summary.average, 5.0);
        assert_eq!(ratings.user_rating("u2", "123").await.expect("lookup"), None);
    }

    #[tokio::test]
    async fn out_of_range_ratings_are_rejected() {
        let ratings = RatingService::new(MemoryStore::new());
        for value in [0, 6, -1] {
            let err = ratings.rate_book(&session("u1"), "123", value).await.expect_err("range");
            assert!(matches!(err, SalonError::Validation(_)));
        }
    }
}
