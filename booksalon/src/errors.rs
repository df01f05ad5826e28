use std::{borrow::Cow, fmt};

use thiserror::Error;

/// Top-level error type returned by Book Salon services and stores.
#[derive(Debug, Error)]
pub enum SalonError {
    /// Referenced document, user or like target is absent.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Validation failed for one or more fields.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A mutating action was attempted without a signed-in identity.
    #[error("sign-in required")]
    AuthRequired,

    /// Edit or delete attempted by someone other than the author or recipient.
    #[error("{entity} {id} is not owned by the caller")]
    OwnershipViolation { entity: &'static str, id: String },

    /// Admin-only action attempted by a regular user.
    #[error("admin role required")]
    AdminRequired,

    /// Create-if-absent found an existing document under the same id.
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    /// The document store, auth provider, blob store or book API failed.
    #[error("{service} failed: {message}")]
    Remote { service: RemoteService, message: String },

    /// A stored document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{message}")]
    Other { message: Cow<'static, str> },
}

impl SalonError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    pub fn remote(service: RemoteService, message: impl Into<String>) -> Self {
        Self::Remote {
            service,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// The external collaborator behind a [`SalonError::Remote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteService {
    DocumentStore,
    Auth,
    BlobStore,
    BookApi,
}

impl fmt::Display for RemoteService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DocumentStore => "document store",
            Self::Auth => "auth provider",
            Self::BlobStore => "blob store",
            Self::BookApi => "book lookup API",
        };
        f.write_str(name)
    }
}

impl From<redis::RedisError> for SalonError {
    fn from(err: redis::RedisError) -> Self {
        Self::remote(RemoteService::DocumentStore, err.to_string())
    }
}

impl From<reqwest::Error> for SalonError {
    fn from(err: reqwest::Error) -> Self {
        Self::remote(RemoteService::BookApi, err.to_string())
    }
}

/// Collection of validation issues encountered while preparing a mutation.
#[derive(Debug, Error)]
#[error("validation errors: {issues:?}")]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new<I>(issues: I) -> Self
    where
        I: IntoIterator<Item = ValidationIssue>,
    {
        Self {
            issues: issues.into_iter().collect(),
        }
    }

    /// Convenience helper for constructing a single-field validation error.
    pub fn single(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new([ValidationIssue::new(field, code, message)])
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.issues.iter().any(|issue| issue.field == field)
    }
}

/// Detailed validation failure for a single field or logical path.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Accumulates issues across several fields and converts into a result at the end.
#[derive(Debug, Default)]
pub struct Validator {
    issues: Vec<ValidationIssue>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks the trimmed character count of `value` against `min..=max`.
    pub fn text(&mut self, field: &str, value: &str, min: usize, max: usize) -> &mut Self {
        let len = value.trim().chars().count();
        if len < min {
            let message = if min == 1 {
                "value must not be empty".to_string()
            } else {
                format!("length must be at least {min}")
            };
            self.issues.push(ValidationIssue::new(field, "validation.length", message));
        } else if len > max {
            self.issues.push(ValidationIssue::new(
                field,
                "validation.length",
                format!("length must be at most {max}"),
            ));
        }
        self
    }

    pub fn check(&mut self, ok: bool, field: &str, code: &str, message: impl Into<String>) -> &mut Self {
        if !ok {
            self.issues.push(ValidationIssue::new(field, code, message));
        }
        self
    }

    pub fn finish(&mut self) -> ValidationResult<()> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(std::mem::take(&mut self.issues)))
        }
    }
}
