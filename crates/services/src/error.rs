//! Shared error types for the services crate.

use serde::Serialize;
use thiserror::Error;

use drill_core::model::{
    IdError, ProgressError, QuestionError, QuestionId, SettingsError, SubmissionError, UserId,
};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Caller-facing failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthorized,
    NotFound,
    InvalidInput,
    StoreUnavailable,
    Internal,
}

impl ErrorKind {
    /// Only transient store failures may be retried by the caller.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::StoreUnavailable)
    }
}

/// Structured `{kind, message}` error handed back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

/// Errors emitted by the session, progress, stats and settings services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServiceError {
    #[error("no authenticated user")]
    Unauthorized,

    #[error("question not found: {0}")]
    QuestionNotFound(QuestionId),

    #[error("session size must be at least 1")]
    InvalidSessionSize,

    #[error("invalid catalog file: {0}")]
    InvalidCatalog(String),

    #[error(transparent)]
    Id(#[from] IdError),

    #[error(transparent)]
    Question(#[from] QuestionError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Progress(#[from] ProgressError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ServiceError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Unauthorized => ErrorKind::Unauthorized,
            ServiceError::QuestionNotFound(_) | ServiceError::Storage(StorageError::NotFound) => {
                ErrorKind::NotFound
            }
            ServiceError::InvalidSessionSize
            | ServiceError::InvalidCatalog(_)
            | ServiceError::Id(_)
            | ServiceError::Question(_)
            | ServiceError::Submission(_)
            | ServiceError::Settings(_) => ErrorKind::InvalidInput,
            ServiceError::Storage(StorageError::Connection(_) | StorageError::Conflict) => {
                ErrorKind::StoreUnavailable
            }
            ServiceError::Progress(_) | ServiceError::Storage(_) => ErrorKind::Internal,
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    #[must_use]
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Resolve the caller's identity; a missing or blank id is `Unauthorized`.
///
/// # Errors
///
/// Returns `ServiceError::Unauthorized` when no usable id is attached.
pub fn authenticated(raw: Option<&str>) -> Result<UserId, ServiceError> {
    raw.and_then(|value| UserId::new(value).ok())
        .ok_or(ServiceError::Unauthorized)
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_failures_map_onto_taxonomy() {
        let unavailable = ServiceError::from(StorageError::Connection("pool timed out".into()));
        assert_eq!(unavailable.kind(), ErrorKind::StoreUnavailable);
        assert!(unavailable.is_retryable());

        assert_eq!(
            ServiceError::from(StorageError::Conflict).kind(),
            ErrorKind::StoreUnavailable
        );
        assert_eq!(
            ServiceError::from(StorageError::NotFound).kind(),
            ErrorKind::NotFound
        );

        let corrupt = ServiceError::from(StorageError::Serialization("bad json".into()));
        assert_eq!(corrupt.kind(), ErrorKind::Internal);
        assert!(!corrupt.is_retryable());
    }

    #[test]
    fn input_errors_are_terminal() {
        let err = ServiceError::from(SubmissionError::InvalidTimeSpent { provided: -1.0 });
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(!err.is_retryable());

        let report = ServiceError::QuestionNotFound(QuestionId::new("q9").unwrap()).report();
        assert_eq!(report.kind, ErrorKind::NotFound);
        assert_eq!(report.message, "question not found: q9");
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            serde_json::json!({"kind": "not_found", "message": "question not found: q9"})
        );
    }

    #[test]
    fn blank_identity_is_unauthorized() {
        assert!(matches!(authenticated(None), Err(ServiceError::Unauthorized)));
        assert!(matches!(
            authenticated(Some("  ")),
            Err(ServiceError::Unauthorized)
        ));
        assert_eq!(authenticated(Some("u1")).unwrap().as_str(), "u1");
    }
}
