//! Storage error model.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | PostgreSQL Error Code | StoreError | Scenario |
//! |----------------------|------------|----------|
//! | `23505` | `Conflict` | unique violation (duplicate email, role or location name) |
//! | `23503` | `Invalid` | foreign key violation (unknown location, category or role) |
//! | `23514` | `Invalid` | check constraint violation (negative quantity) |
//! | other / pool / network | `Backend` | anything else |

use thiserror::Error;

use casahub_core::DomainError;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("conflict: {0}")]
    Conflict(String),

    /// The write referenced something that does not exist or broke a
    /// storage-level constraint.
    #[error("rejected: {0}")]
    Invalid(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Replace the message of a `Conflict`, leaving other variants alone.
    pub fn with_conflict_message(self, message: &str) -> Self {
        match self {
            StoreError::Conflict(_) => StoreError::Conflict(message.to_string()),
            other => other,
        }
    }
}

impl From<DomainError> for StoreError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound(what) => StoreError::NotFound(what),
            DomainError::Conflict(msg) => StoreError::Conflict(msg),
            other => StoreError::Invalid(other.to_string()),
        }
    }
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") | Some("23514") => StoreError::Invalid(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_can_be_rewritten() {
        let err = StoreError::Conflict("duplicate key value".into());
        assert_eq!(
            err.with_conflict_message("email already in use"),
            StoreError::Conflict("email already in use".into())
        );
        assert_eq!(
            StoreError::NotFound("user").with_conflict_message("email already in use"),
            StoreError::NotFound("user")
        );
    }

    #[test]
    fn pool_closed_is_a_backend_error() {
        assert!(matches!(
            map_sqlx_error("list_products", sqlx::Error::PoolClosed),
            StoreError::Backend(_)
        ));
    }
}
