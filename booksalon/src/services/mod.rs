//! Domain services, one per bounded context.
//!
//! Services are cheap handles over a store clone. Every mutation takes the
//! caller's [`Session`] explicitly; reads that any viewer may perform do not.

pub mod activity;
pub mod admin;
pub mod bookmarks;
pub mod engagement;
pub mod forums;
pub mod messaging;
pub mod notifications;
pub mod ratings;
pub mod search;
pub mod social;
pub mod users;

use log::warn;
use serde::Serialize;
use serde_json::Value;

use crate::{
    auth::{Identity, Session},
    errors::SalonError,
    keys::USERS,
    models::UserProfile,
    store::{DocumentStore, FieldOp},
};

pub(crate) fn to_value<T: Serialize>(value: &T) -> Result<Value, SalonError> {
    Ok(serde_json::to_value(value)?)
}

pub(crate) async fn require_profile<S: DocumentStore>(store: &S, uid: &str) -> Result<UserProfile, SalonError> {
    store
        .fetch::<UserProfile>(USERS, uid)
        .await?
        .ok_or_else(|| SalonError::not_found("user", uid))
}

/// Signed-in identity whose profile carries the admin role.
pub(crate) async fn require_admin<'a, S: DocumentStore>(
    store: &S,
    session: &'a Session,
) -> Result<&'a Identity, SalonError> {
    let identity = session.require()?;
    let profile = require_profile(store, &identity.uid).await?;
    if !profile.is_admin() {
        return Err(SalonError::AdminRequired);
    }
    Ok(identity)
}

pub(crate) fn ensure_owner(owner_uid: &str, identity: &Identity, entity: &'static str, id: &str) -> Result<(), SalonError> {
    if owner_uid != identity.uid {
        return Err(SalonError::OwnershipViolation {
            entity,
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Applies a counter update whose parent may already be gone (deleted forum or
/// post); a missing parent is logged instead of failing the caller.
pub(crate) async fn update_counter<S: DocumentStore>(
    store: &S,
    collection: &str,
    id: &str,
    ops: &[FieldOp],
) -> Result<(), SalonError> {
    match store.update(collection, id, ops).await {
        Err(err) if err.is_not_found() => {
            warn!("skipping counter update on missing {collection}/{id}");
            Ok(())
        }
        other => other,
    }
}

/// First `max` characters of `text`, used for titles of feed entries.
pub(crate) fn excerpt(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max) {
        Some((index, _)) => format!("{}…", &trimmed[..index]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_counts_characters() {
        assert_eq!(excerpt("  짧은 글  ", 10), "짧은 글");
        assert_eq!(excerpt("가나다라마", 2), "가나…");
    }

    #[test]
    fn ownership_compares_uids() {
        let identity = Identity {
            uid: "u1".into(),
            email: "a@example.com".into(),
        };
        assert!(ensure_owner("u1", &identity, "post", "p1").is_ok());
        assert!(matches!(
            ensure_owner("u2", &identity, "post", "p1"),
            Err(SalonError::OwnershipViolation { .. })
        ));
    }
}
