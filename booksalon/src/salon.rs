//! Entry point tying the services to one store.
//!
//! # Example
//! ```ignore
//! let salon = Salon::new(MemoryStore::new());
//! let profile = salon.users().sync_profile(&identity).await?;
//! let forum = salon.forums().create_forum(&session, book).await?;
//! ```

use log::{info, warn};

use crate::{
    config::{SalonConfig, StoreBackend},
    errors::SalonError,
    jobs::Triggers,
    services::{
        activity::ActivityService, admin::AdminService, bookmarks::BookmarkService, engagement::EngagementService,
        forums::ForumService, messaging::MessagingService, notifications::NotificationService, ratings::RatingService,
        search::SearchService, social::SocialService, users::UserService,
    },
    store::{AnyStore, DocumentStore, MemoryStore, RedisStore},
};

/// Cheap to clone; every accessor hands out a service over a store clone.
#[derive(Clone)]
pub struct Salon<S> {
    store: S,
}

impl<S: DocumentStore> Salon<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn users(&self) -> UserService<S> {
        UserService::new(self.store.clone())
    }

    pub fn forums(&self) -> ForumService<S> {
        ForumService::new(self.store.clone())
    }

    pub fn engagement(&self) -> EngagementService<S> {
        EngagementService::new(self.store.clone())
    }

    pub fn social(&self) -> SocialService<S> {
        SocialService::new(self.store.clone())
    }

    pub fn bookmarks(&self) -> BookmarkService<S> {
        BookmarkService::new(self.store.clone())
    }

    pub fn messaging(&self) -> MessagingService<S> {
        MessagingService::new(self.store.clone())
    }

    pub fn notifications(&self) -> NotificationService<S> {
        NotificationService::new(self.store.clone())
    }

    pub fn activity(&self) -> ActivityService<S> {
        ActivityService::new(self.store.clone())
    }

    pub fn ratings(&self) -> RatingService<S> {
        RatingService::new(self.store.clone())
    }

    pub fn search(&self) -> SearchService<S> {
        SearchService::new(self.store.clone())
    }

    pub fn admin(&self) -> AdminService<S> {
        AdminService::new(self.store.clone())
    }

    pub fn triggers(&self) -> Triggers<S> {
        Triggers::new(self.store.clone())
    }
}

impl Salon<AnyStore> {
    /// Opens the configured backend. For Redis, changes published by other
    /// processes are forwarded into local subscriptions by a background task.
    pub async fn from_config(config: &SalonConfig) -> Result<Self, SalonError> {
        let store = match config.store.backend {
            StoreBackend::Memory => AnyStore::from(MemoryStore::new()),
            StoreBackend::Redis => {
                let redis = RedisStore::connect(&config.store.redis_url, config.store.prefix.as_str()).await?;
                let listener = redis.clone();
                tokio::spawn(async move {
                    if let Err(err) = listener.listen_for_remote_changes().await {
                        warn!("remote change listener stopped: {err}");
                    }
                });
                AnyStore::from(redis)
            }
        };
        info!("using {} document store", store.backend());
        Ok(Self::new(store))
    }
}
