use futures_util::future::join_all;
use log::info;
use serde::Serialize;

use crate::{
    auth::Session,
    errors::{SalonError, ValidationError},
    keys::USERS,
    models::{ActivityType, NotificationType, UserProfile},
    store::{DocumentStore, FieldOp, Saga},
};

use super::{
    activity::{ActivityService, NewActivity},
    notifications::{NewNotification, NotificationService},
    require_profile,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowCounts {
    pub followers: usize,
    pub following: usize,
}

#[derive(Clone)]
pub struct SocialService<S> {
    store: S,
}

impl<S: DocumentStore> SocialService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Follows or unfollows `target_uid`; returns whether the caller now follows.
    ///
    /// Both sides of the relationship are written as one saga, so a failure on
    /// the target's `followers` rolls back the caller's `following`.
    pub async fn toggle_follow(&self, session: &Session, target_uid: &str) -> Result<bool, SalonError> {
        let identity = session.require()?;
        if identity.uid == target_uid {
            return Err(ValidationError::single("targetUid", "validation.self_follow", "cannot follow yourself").into());
        }
        let me = require_profile(&self.store, &identity.uid).await?;
        let target = require_profile(&self.store, target_uid).await?;
        let following = me.following.iter().any(|uid| uid == target_uid);

        let (mine, theirs, mine_undo, theirs_undo) = if following {
            (
                FieldOp::remove("following", target_uid),
                FieldOp::remove("followers", identity.uid.as_str()),
                FieldOp::union("following", target_uid),
                FieldOp::union("followers", identity.uid.as_str()),
            )
        } else {
            (
                FieldOp::union("following", target_uid),
                FieldOp::union("followers", identity.uid.as_str()),
                FieldOp::remove("following", target_uid),
                FieldOp::remove("followers", identity.uid.as_str()),
            )
        };
        Saga::new(&self.store, "toggle_follow")
            .update(USERS, identity.uid.as_str(), vec![mine], vec![mine_undo])
            .update(USERS, target_uid, vec![theirs], vec![theirs_undo])
            .run()
            .await?;

        if following {
            info!("{} unfollowed {}", identity.uid, target_uid);
            return Ok(false);
        }

        info!("{} followed {}", identity.uid, target_uid);
        ActivityService::new(self.store.clone())
            .record(NewActivity::new(ActivityType::Follow, identity.uid.as_str(), target_uid, target.nickname.as_str()))
            .await?;
        NotificationService::new(self.store.clone())
            .notify(
                NewNotification::new(
                    target_uid,
                    NotificationType::Follow,
                    "새 팔로워",
                    format!("{}님이 회원님을 팔로우하기 시작했습니다", me.nickname),
                )
                .with("followerId", identity.uid.as_str()),
            )
            .await?;
        Ok(true)
    }

    pub async fn is_following(&self, uid: &str, target_uid: &str) -> Result<bool, SalonError> {
        let profile = require_profile(&self.store, uid).await?;
        Ok(profile.following.iter().any(|followed| followed == target_uid))
    }

    async fn profiles(&self, uids: &[String]) -> Result<Vec<UserProfile>, SalonError> {
        let fetched = join_all(uids.iter().map(|uid| self.store.fetch::<UserProfile>(USERS, uid))).await;
        let mut profiles = Vec::with_capacity(fetched.len());
        for profile in fetched {
            if let Some(profile) = profile? {
                profiles.push(profile);
            }
        }
        Ok(profiles)
    }

    /// Profiles following `uid`; accounts deleted since are skipped.
    pub async fn followers(&self, uid: &str) -> Result<Vec<UserProfile>, SalonError> {
        let profile = require_profile(&self.store, uid).await?;
        self.profiles(&profile.followers).await
    }

    pub async fn following(&self, uid: &str) -> Result<Vec<UserProfile>, SalonError> {
        let profile = require_profile(&self.store, uid).await?;
        self.profiles(&profile.following).await
    }

    pub async fn follow_counts(&self, uid: &str) -> Result<FollowCounts, SalonError> {
        let profile = require_profile(&self.store, uid).await?;
        Ok(FollowCounts {
            followers: profile.followers.len(),
            following: profile.following.len(),
        })
    }
}
