//! Service-level error taxonomy.
//!
//! Services return [`ServiceError`]; the API layer maps each variant onto one
//! HTTP status. Lower-level errors (`sqlx`, storage, policy) convert into it.

use crate::auth::authorization::{AuthzError, RoleChangeDenial};
use crate::models::task::ParseStatusError;
use crate::storage::StorageError;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Bad or missing credentials
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    InvalidStatus(String),

    /// Lost a compare-and-set race or hit a uniqueness constraint
    #[error("{0}")]
    Conflict(String),

    /// A dependency (object store, identity provider) answered with an error
    #[error("{0}")]
    Upstream(String),

    /// A dependency did not answer in time; retryable
    #[error("{0}")]
    Timeout(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(what: &str) -> Self {
        ServiceError::NotFound(format!("{} not found", what))
    }
}

/// Unique-violation check for a specific index
pub fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.code().as_deref() == Some("23505") && db.constraint() == Some(constraint)
        }
        _ => false,
    }
}

impl From<AuthzError> for ServiceError {
    fn from(err: AuthzError) -> Self {
        ServiceError::Forbidden(err.to_string())
    }
}

impl From<RoleChangeDenial> for ServiceError {
    fn from(denial: RoleChangeDenial) -> Self {
        if denial.is_forbidden() {
            ServiceError::Forbidden(denial.to_string())
        } else {
            ServiceError::InvalidInput(denial.to_string())
        }
    }
}

impl From<ParseStatusError> for ServiceError {
    fn from(err: ParseStatusError) -> Self {
        ServiceError::InvalidStatus(err.to_string())
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Rejected(msg) => ServiceError::InvalidInput(msg),
            StorageError::Timeout(_) => ServiceError::Timeout(err.to_string()),
            StorageError::Upstream(msg) => ServiceError::Upstream(msg),
            StorageError::Io(e) => ServiceError::Internal(format!("storage I/O failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserRole;

    #[test]
    fn test_role_denials_split_by_cause() {
        assert!(matches!(
            ServiceError::from(RoleChangeDenial::AdminProtected),
            ServiceError::Forbidden(_)
        ));
        assert!(matches!(
            ServiceError::from(RoleChangeDenial::AlreadyHasRole(UserRole::Supporter)),
            ServiceError::InvalidInput(msg) if msg.contains("supporter")
        ));
    }

    #[test]
    fn test_storage_errors() {
        assert!(matches!(
            ServiceError::from(StorageError::Rejected("too big".into())),
            ServiceError::InvalidInput(_)
        ));
        assert!(matches!(
            ServiceError::from(StorageError::Timeout(30)),
            ServiceError::Timeout(_)
        ));
        assert!(matches!(
            ServiceError::from(StorageError::Upstream("503".into())),
            ServiceError::Upstream(_)
        ));
    }

    #[test]
    fn test_invalid_status() {
        let err: ServiceError = "done".parse::<crate::models::task::TaskStatus>().unwrap_err().into();
        assert!(matches!(err, ServiceError::InvalidStatus(_)));
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(ServiceError::not_found("Task").to_string(), "Task not found");
    }
}
