//! Identity provider contract and the explicit session passed to mutations.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use log::info;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::{
    errors::{RemoteService, SalonError, ValidationError},
    id::generate_document_id,
    validators::is_valid_email,
};

const MIN_PASSWORD_LENGTH: usize = 6;

/// Authenticated identity as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub email: String,
}

/// Caller context for every mutating service call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    identity: Option<Identity>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// The signed-in identity, or `AuthRequired`.
    pub fn require(&self) -> Result<&Identity, SalonError> {
        self.identity.as_ref().ok_or(SalonError::AuthRequired)
    }

    pub fn uid(&self) -> Option<&str> {
        self.identity.as_ref().map(|identity| identity.uid.as_str())
    }
}

impl From<Option<Identity>> for Session {
    fn from(identity: Option<Identity>) -> Self {
        Self { identity }
    }
}

#[allow(async_fn_in_trait)]
pub trait AuthProvider {
    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, SalonError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, SalonError>;

    async fn sign_out(&self) -> Result<(), SalonError>;

    /// Deletes the identity that is currently signed in and signs out.
    async fn delete_current_account(&self) -> Result<(), SalonError>;

    /// Observable of the current identity; `None` while signed out.
    fn session_changes(&self) -> watch::Receiver<Option<Identity>>;

    fn current_session(&self) -> Session {
        Session::from(self.session_changes().borrow().clone())
    }
}

#[derive(Debug, Clone)]
struct Account {
    uid: String,
    email: String,
    password_hash: String,
}

/// Email/password provider kept in memory. Passwords are stored as argon2 PHC strings.
#[derive(Clone)]
pub struct MemoryAuthProvider {
    accounts: Arc<Mutex<HashMap<String, Account>>>,
    current: Arc<watch::Sender<Option<Identity>>>,
}

impl Default for MemoryAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAuthProvider {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            accounts: Arc::new(Mutex::new(HashMap::new())),
            current: Arc::new(current),
        }
    }

    fn accounts(&self) -> MutexGuard<'_, HashMap<String, Account>> {
        self.accounts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn auth_error(message: impl Into<String>) -> SalonError {
    SalonError::remote(RemoteService::Auth, message)
}

fn hash_password(password: &str) -> Result<String, SalonError> {
    let salt = SaltString::encode_b64(uuid::Uuid::new_v4().as_bytes())
        .map_err(|err| auth_error(format!("invalid salt: {err}")))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| auth_error(format!("password hashing failed: {err}")))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, stored: &str) -> Result<bool, SalonError> {
    let parsed = PasswordHash::new(stored).map_err(|err| auth_error(format!("invalid password hash: {err}")))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(err) => Err(auth_error(format!("password verification failed: {err}"))),
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AuthProvider for MemoryAuthProvider {
    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, SalonError> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(ValidationError::single("email", "validation.email", "invalid email address").into());
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ValidationError::single(
                "password",
                "validation.length",
                format!("password must be at least {MIN_PASSWORD_LENGTH} characters"),
            )
            .into());
        }
        let password_hash = hash_password(password)?;
        let identity = {
            let mut accounts = self.accounts();
            if accounts.contains_key(&email) {
                return Err(SalonError::AlreadyExists { entity: "account", id: email });
            }
            let account = Account {
                uid: generate_document_id(),
                email: email.clone(),
                password_hash,
            };
            let identity = Identity {
                uid: account.uid.clone(),
                email: account.email.clone(),
            };
            accounts.insert(email, account);
            identity
        };
        info!("created account {}", identity.uid);
        self.current.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, SalonError> {
        let email = normalize_email(email);
        let account = self.accounts().get(&email).cloned();
        let Some(account) = account else {
            return Err(auth_error("invalid email or password"));
        };
        if !verify_password(password, &account.password_hash)? {
            return Err(auth_error("invalid email or password"));
        }
        let identity = Identity {
            uid: account.uid,
            email: account.email,
        };
        self.current.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), SalonError> {
        self.current.send_replace(None);
        Ok(())
    }

    async fn delete_current_account(&self) -> Result<(), SalonError> {
        let current = self.current.borrow().clone();
        let identity = current.ok_or(SalonError::AuthRequired)?;
        self.accounts().remove(&identity.email);
        info!("deleted account {}", identity.uid);
        self.current.send_replace(None);
        Ok(())
    }

    fn session_changes(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_session_requires_sign_in() {
        let err = Session::anonymous().require().expect_err("anonymous");
        assert!(matches!(err, SalonError::AuthRequired));
    }

    #[tokio::test]
    async fn sign_in_checks_the_password() {
        let auth = MemoryAuthProvider::new();
        let created = auth.create_account("Reader@Example.com", "secret-pw").await.expect("create");
        auth.sign_out().await.expect("sign out");
        assert!(auth.current_session().identity().is_none());

        assert!(auth.sign_in("reader@example.com", "wrong-pw").await.is_err());
        let signed_in = auth.sign_in("reader@example.com", "secret-pw").await.expect("sign in");
        assert_eq!(signed_in.uid, created.uid);
        assert_eq!(auth.current_session().uid(), Some(created.uid.as_str()));
    }

    #[tokio::test]
    async fn session_changes_follow_sign_out_and_deletion() {
        let auth = MemoryAuthProvider::new();
        let mut changes = auth.session_changes();
        auth.create_account("a@example.com", "password").await.expect("create");
        changes.changed().await.expect("signed in");
        assert!(changes.borrow_and_update().is_some());

        auth.delete_current_account().await.expect("delete");
        changes.changed().await.expect("signed out");
        assert!(changes.borrow().is_none());
        assert!(auth.sign_in("a@example.com", "password").await.is_err());
    }

    #[tokio::test]
    async fn duplicate_and_invalid_accounts_are_rejected() {
        let auth = MemoryAuthProvider::new();
        auth.create_account("a@example.com", "password").await.expect("create");
        assert!(matches!(
            auth.create_account("a@example.com", "password").await,
            Err(SalonError::AlreadyExists { .. })
        ));
        assert!(matches!(
            auth.create_account("not-an-email", "password").await,
            Err(SalonError::Validation(_))
        ));
    }
}
