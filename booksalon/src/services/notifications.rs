use futures_util::future::try_join_all;
use log::debug;
use serde_json::{Map, Value};

use crate::{
    auth::Session,
    binding::LiveQuery,
    errors::SalonError,
    id::generate_document_id,
    keys::{NOTIFICATIONS, USERS},
    models::{Notification, NotificationType, UserProfile},
    store::{DocumentStore, FieldOp, Filter, Query, SortOrder},
    timestamp::Timestamp,
};

use super::{ensure_owner, to_value};

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: String,
    pub kind: NotificationType,
    pub title: String,
    pub content: String,
    pub metadata: Map<String, Value>,
}

impl NewNotification {
    pub fn new(user_id: impl Into<String>, kind: NotificationType, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            kind,
            title: title.into(),
            content: content.into(),
            metadata: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Clone)]
pub struct NotificationService<S> {
    store: S,
}

impl<S: DocumentStore> NotificationService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn inbox(uid: &str) -> Query {
        Query::collection(NOTIFICATIONS)
            .filter(Filter::eq("userId", uid))
            .order_by("createdAt", SortOrder::Desc)
    }

    /// Stores a notification unless the recipient is unknown or has muted this kind.
    pub async fn notify(&self, notification: NewNotification) -> Result<Option<String>, SalonError> {
        let Some(recipient) = self.store.fetch::<UserProfile>(USERS, &notification.user_id).await? else {
            debug!("no profile for {}; notification dropped", notification.user_id);
            return Ok(None);
        };
        if !recipient.notification_settings.allows(notification.kind) {
            debug!("{} muted {:?} notifications", recipient.uid, notification.kind);
            return Ok(None);
        }
        let id = generate_document_id();
        let record = Notification {
            id: id.clone(),
            user_id: notification.user_id,
            kind: notification.kind,
            title: notification.title,
            content: notification.content,
            is_read: false,
            created_at: Timestamp::now(),
            metadata: notification.metadata,
        };
        self.store.create(NOTIFICATIONS, &id, to_value(&record)?).await?;
        Ok(Some(id))
    }

    pub async fn notifications(&self, uid: &str, limit: usize) -> Result<Vec<Notification>, SalonError> {
        self.store.fetch_all(&Self::inbox(uid).limit(limit)).await
    }

    pub async fn unread_count(&self, uid: &str) -> Result<usize, SalonError> {
        let query = Query::collection(NOTIFICATIONS)
            .filter(Filter::eq("userId", uid))
            .filter(Filter::eq("isRead", false));
        Ok(self.store.query(&query).await?.len())
    }

    async fn owned(&self, session: &Session, id: &str) -> Result<Notification, SalonError> {
        let identity = session.require()?;
        let notification: Notification = self
            .store
            .fetch(NOTIFICATIONS, id)
            .await?
            .ok_or_else(|| SalonError::not_found("notification", id))?;
        ensure_owner(&notification.user_id, identity, "notification", id)?;
        Ok(notification)
    }

    pub async fn mark_read(&self, session: &Session, id: &str) -> Result<(), SalonError> {
        self.owned(session, id).await?;
        self.store.update(NOTIFICATIONS, id, &[FieldOp::set("isRead", true)]).await
    }

    /// Marks every unread notification of the caller; returns how many changed.
    pub async fn mark_all_read(&self, session: &Session) -> Result<usize, SalonError> {
        let identity = session.require()?;
        let query = Query::collection(NOTIFICATIONS)
            .filter(Filter::eq("userId", identity.uid.as_str()))
            .filter(Filter::eq("isRead", false));
        let unread = self.store.query(&query).await?;
        let ops = [FieldOp::set("isRead", true)];
        try_join_all(unread.iter().map(|document| self.store.update(NOTIFICATIONS, &document.id, &ops))).await?;
        Ok(unread.len())
    }

    pub async fn delete(&self, session: &Session, id: &str) -> Result<(), SalonError> {
        self.owned(session, id).await?;
        self.store.delete(NOTIFICATIONS, id).await
    }

    pub async fn watch(&self, uid: &str) -> Result<LiveQuery<Notification, S>, SalonError> {
        LiveQuery::mount(&self.store, Self::inbox(uid)).await
    }
}
