use log::{info, warn};
use serde_json::json;

use crate::{
    auth::{AuthProvider, Identity, Session},
    blob::BlobStore,
    errors::{RemoteService, SalonError, ValidationError, Validator},
    id::generate_document_id,
    keys::USERS,
    models::{NotificationSettings, UserProfile, UserRole},
    store::{DocumentStore, FieldOp},
    timestamp::Timestamp,
    validators::is_valid_url,
};

use super::{require_profile, to_value, update_counter};

pub const MAX_PROFILE_IMAGE_BYTES: usize = 5 * 1024 * 1024;
const MAX_FAVORITE_GENRES: usize = 10;
const MAX_READING_GOAL: u32 = 1000;

/// Denormalized per-user counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStat {
    Posts,
    Comments,
    Forums,
}

impl UserStat {
    fn field(self) -> &'static str {
        match self {
            Self::Posts => "postCount",
            Self::Comments => "commentCount",
            Self::Forums => "forumCount",
        }
    }
}

/// Partial profile edit; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub nickname: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub favorite_genres: Option<Vec<String>>,
    pub reading_goal: Option<u32>,
    pub notification_settings: Option<NotificationSettings>,
}

impl ProfileUpdate {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut validator = Validator::new();
        if let Some(nickname) = &self.nickname {
            validator.text("nickname", nickname, 2, 20);
        }
        if let Some(bio) = &self.bio {
            validator.text("bio", bio, 0, 200);
        }
        if let Some(genres) = &self.favorite_genres {
            validator.check(
                genres.len() <= MAX_FAVORITE_GENRES,
                "favoriteGenres",
                "validation.max_items",
                format!("at most {MAX_FAVORITE_GENRES} genres"),
            );
        }
        if let Some(goal) = self.reading_goal {
            validator.check(
                goal <= MAX_READING_GOAL,
                "readingGoal",
                "validation.range",
                format!("reading goal must be at most {MAX_READING_GOAL}"),
            );
        }
        validator.finish()
    }

    fn into_ops(self) -> Result<Vec<FieldOp>, SalonError> {
        let mut ops = Vec::new();
        if let Some(nickname) = self.nickname {
            ops.push(FieldOp::set("nickname", nickname.trim()));
        }
        if let Some(display_name) = self.display_name {
            ops.push(FieldOp::set("displayName", display_name.trim()));
        }
        if let Some(bio) = self.bio {
            ops.push(FieldOp::set("bio", bio.trim()));
        }
        if let Some(genres) = self.favorite_genres {
            ops.push(FieldOp::set("favoriteGenres", genres));
        }
        if let Some(goal) = self.reading_goal {
            ops.push(FieldOp::set("readingGoal", goal));
        }
        if let Some(settings) = self.notification_settings {
            ops.push(FieldOp::set("notificationSettings", to_value(&settings)?));
        }
        Ok(ops)
    }
}

fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

fn default_nickname(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

#[derive(Clone)]
pub struct UserService<S> {
    store: S,
}

impl<S: DocumentStore> UserService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates the profile on first sign-in, otherwise refreshes `email` and `lastLoginAt`.
    pub async fn sync_profile(&self, identity: &Identity) -> Result<UserProfile, SalonError> {
        let now = Timestamp::now();
        if self.store.exists(USERS, &identity.uid).await? {
            self.store
                .update(
                    USERS,
                    &identity.uid,
                    &[
                        FieldOp::set("email", identity.email.as_str()),
                        FieldOp::set("lastLoginAt", now.to_value()),
                    ],
                )
                .await?;
        } else {
            let profile = UserProfile {
                uid: identity.uid.clone(),
                email: identity.email.clone(),
                nickname: default_nickname(&identity.email),
                display_name: None,
                bio: String::new(),
                profile_image_url: None,
                post_count: 0,
                comment_count: 0,
                forum_count: 0,
                bookmarked_forums: Vec::new(),
                following: Vec::new(),
                followers: Vec::new(),
                favorite_genres: Vec::new(),
                reading_goal: 0,
                notification_settings: NotificationSettings::default(),
                role: UserRole::User,
                created_at: Some(now),
                last_login_at: Some(now),
            };
            match self.store.create(USERS, &identity.uid, to_value(&profile)?).await {
                Ok(()) => info!("created profile for {}", identity.uid),
                // Another session signed in first.
                Err(SalonError::AlreadyExists { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        self.require_profile(&identity.uid).await
    }

    pub async fn profile(&self, uid: &str) -> Result<Option<UserProfile>, SalonError> {
        self.store.fetch(USERS, uid).await
    }

    pub async fn require_profile(&self, uid: &str) -> Result<UserProfile, SalonError> {
        require_profile(&self.store, uid).await
    }

    pub async fn update_profile(&self, session: &Session, update: ProfileUpdate) -> Result<UserProfile, SalonError> {
        let identity = session.require()?;
        update.validate()?;
        let ops = update.into_ops()?;
        if !ops.is_empty() {
            self.store.update(USERS, &identity.uid, &ops).await.map_err(|err| {
                if err.is_not_found() {
                    SalonError::not_found("user", identity.uid.as_str())
                } else {
                    err
                }
            })?;
        }
        self.require_profile(&identity.uid).await
    }

    /// Uploads a new avatar, stores its URL and removes the previous image.
    pub async fn upload_profile_image<B: BlobStore>(
        &self,
        session: &Session,
        blobs: &B,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, SalonError> {
        let identity = session.require()?;
        let mut validator = Validator::new();
        let extension = image_extension(content_type);
        validator
            .check(
                extension.is_some(),
                "contentType",
                "validation.content_type",
                "only jpeg, png, gif or webp images are accepted",
            )
            .check(
                bytes.len() <= MAX_PROFILE_IMAGE_BYTES,
                "image",
                "validation.size",
                "image must be at most 5 MiB",
            )
            .check(!bytes.is_empty(), "image", "validation.size", "image must not be empty");
        validator.finish()?;

        let profile = self.require_profile(&identity.uid).await?;
        let path = format!(
            "profileImages/{}/{}.{}",
            identity.uid,
            generate_document_id(),
            extension.unwrap_or("bin")
        );
        let url = blobs.upload(&path, bytes, content_type).await?;
        if !is_valid_url(&url) {
            if let Err(err) = blobs.delete(&url).await {
                warn!("could not delete unusable upload {url}: {err}");
            }
            return Err(SalonError::remote(
                RemoteService::BlobStore,
                format!("upload returned an invalid url: {url}"),
            ));
        }
        self.store
            .update(USERS, &identity.uid, &[FieldOp::set("profileImageUrl", url.as_str())])
            .await?;

        if let Some(previous) = profile.profile_image_url.filter(|previous| *previous != url) {
            if let Err(err) = blobs.delete(&previous).await {
                warn!("could not delete previous profile image {previous}: {err}");
            }
        }
        Ok(url)
    }

    /// Adjusts a denormalized counter. A missing profile is logged and skipped.
    pub async fn increment_stat(&self, uid: &str, stat: UserStat, delta: i64) -> Result<(), SalonError> {
        update_counter(&self.store, USERS, uid, &[FieldOp::increment(stat.field(), delta)]).await
    }

    /// Deletes the caller's profile and then the auth identity behind it.
    pub async fn delete_account<A: AuthProvider>(&self, session: &Session, auth: &A) -> Result<(), SalonError> {
        let identity = session.require()?;
        if auth.current_session().uid() != Some(identity.uid.as_str()) {
            return Err(SalonError::AuthRequired);
        }
        self.store.delete(USERS, &identity.uid).await?;
        auth.delete_current_account().await?;
        info!("deleted account {}", identity.uid);
        Ok(())
    }

    /// Grants or revokes the admin role. Callers check authorization.
    pub(crate) async fn write_role(&self, uid: &str, role: UserRole) -> Result<(), SalonError> {
        self.store
            .update(USERS, uid, &[FieldOp::set("role", json!(role.as_str()))])
            .await
            .map_err(|err| if err.is_not_found() { SalonError::not_found("user", uid) } else { err })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{blob::LocalBlobStore, store::MemoryStore};

    fn identity(uid: &str) -> Identity {
        Identity {
            uid: uid.into(),
            email: format!("{uid}@example.com"),
        }
    }

    #[tokio::test]
    async fn first_sign_in_creates_defaults() {
        let users = UserService::new(MemoryStore::new());
        let profile = users.sync_profile(&identity("reader")).await.expect("sync");
        assert_eq!(profile.nickname, "reader");
        assert_eq!(profile.post_count, 0);
        assert!(profile.notification_settings.likes);

        let again = users.sync_profile(&identity("reader")).await.expect("sync again");
        assert_eq!(again.created_at, profile.created_at);
        assert!(again.last_login_at >= profile.last_login_at);
    }

    #[tokio::test]
    async fn profile_update_is_validated() {
        let users = UserService::new(MemoryStore::new());
        users.sync_profile(&identity("u1")).await.expect("sync");
        let session = Session::signed_in(identity("u1"));

        let err = users
            .update_profile(
                &session,
                ProfileUpdate {
                    nickname: Some("x".into()),
                    reading_goal: Some(5000),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .expect_err("too short and too large");
        let SalonError::Validation(validation) = err else {
            panic!("expected validation error");
        };
        assert!(validation.has_field("nickname"));
        assert!(validation.has_field("readingGoal"));

        let updated = users
            .update_profile(
                &session,
                ProfileUpdate {
                    nickname: Some("책벌레".into()),
                    bio: Some("매일 읽기".into()),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .expect("update");
        assert_eq!(updated.nickname, "책벌레");
        assert_eq!(updated.bio, "매일 읽기");
    }

    #[tokio::test]
    async fn stat_increments_skip_missing_profiles() {
        let store = MemoryStore::new();
        let users = UserService::new(store.clone());
        users.sync_profile(&identity("u1")).await.expect("sync");
        users.increment_stat("u1", UserStat::Posts, 2).await.expect("increment");
        users.increment_stat("ghost", UserStat::Posts, 1).await.expect("missing is skipped");
        assert_eq!(users.require_profile("u1").await.expect("profile").post_count, 2);
    }

    #[tokio::test]
    async fn profile_image_replaces_previous_upload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blobs = LocalBlobStore::new(dir.path(), "http://cdn.test");
        let users = UserService::new(MemoryStore::new());
        users.sync_profile(&identity("u1")).await.expect("sync");
        let session = Session::signed_in(identity("u1"));

        let first = users.upload_profile_image(&session, &blobs, b"one", "image/png").await.expect("upload");
        let second = users.upload_profile_image(&session, &blobs, b"two", "image/jpeg").await.expect("upload");
        assert!(second.ends_with(".jpg"));
        let first_path = dir.path().join(first.trim_start_matches("http://cdn.test/"));
        assert!(!first_path.exists());
        assert_eq!(users.require_profile("u1").await.expect("profile").profile_image_url, Some(second));

        assert!(matches!(
            users.upload_profile_image(&session, &blobs, b"x", "application/pdf").await,
            Err(SalonError::Validation(_))
        ));
    }

    struct RelativeUrlBlobs;

    impl BlobStore for RelativeUrlBlobs {
        async fn upload(&self, path: &str, _bytes: &[u8], _content_type: &str) -> Result<String, SalonError> {
            Ok(path.to_string())
        }

        async fn delete(&self, _url: &str) -> Result<(), SalonError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn profile_image_requires_an_absolute_url() {
        let users = UserService::new(MemoryStore::new());
        users.sync_profile(&identity("u1")).await.expect("sync");
        let session = Session::signed_in(identity("u1"));

        let err = users
            .upload_profile_image(&session, &RelativeUrlBlobs, b"img", "image/png")
            .await
            .expect_err("relative url");
        assert!(matches!(
            err,
            SalonError::Remote {
                service: RemoteService::BlobStore,
                ..
            }
        ));
        assert_eq!(users.require_profile("u1").await.expect("profile").profile_image_url, None);
    }
}
