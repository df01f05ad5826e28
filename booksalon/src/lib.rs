//! Book Salon core library.
//!
//! Per-book discussion forums over a document store: profiles, posts and
//! comments, likes, follows, direct messages, ratings, moderation, live views
//! and the scheduled aggregation jobs that keep leaderboards and metrics fresh.

pub mod auth;
pub mod binding;
pub mod blob;
pub mod books;
pub mod categorize;
pub mod config;
pub mod errors;
pub mod id;
pub mod jobs;
pub mod keys;
pub mod models;
pub mod salon;
pub mod services;
pub mod store;
pub mod timestamp;
pub mod validators;

pub use auth::{AuthProvider, Identity, MemoryAuthProvider, Session};
pub use binding::{DocumentSubscription, LiveDocument, LiveQuery, QuerySubscription};
pub use blob::{BlobStore, LocalBlobStore};
pub use books::{BookLookup, KakaoBookClient, SearchTarget};
pub use categorize::{BookCategory, BookTag, calculate_popularity, categorize_book, tag_book};
pub use config::SalonConfig;
pub use errors::*;
pub use salon::Salon;
pub use store::{AnyStore, Document, DocumentStore, FieldOp, Filter, MemoryStore, Query, RedisStore, Saga, SortOrder};
pub use timestamp::Timestamp;

// Re-export redis so callers don't need to depend on a specific version
pub use redis;
