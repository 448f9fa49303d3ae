//! Database error types.

use voicecap_core::error::{CoreError, ErrorCategory};

/// Database operation errors
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// SQL error from sqlx
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    /// Job not found
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// Conditional update lost the race: current status didn't match
    /// `expected_status` (spec §4.C `Update`).
    #[error("conditional update conflict on job {job_id}: expected status {expected}")]
    JobConflict { job_id: String, expected: String },

    /// Insert collided with an existing primary key (spec §4.C `Insert`).
    #[error("job already exists: {0}")]
    JobAlreadyExists(String),

    /// User has no preferences row.
    #[error("no preferences for user: {0}")]
    PrefsNotFound(String),

    /// User has no key provisioned (spec §4.A `GetKey`).
    #[error("no key provisioned for user: {0}")]
    KeyNotFound(String),

    /// `CreateKey` called for a user that already has one.
    #[error("key already exists for user: {0}")]
    KeyAlreadyExists(String),

    /// Summary not found for the given user/date or user/id.
    #[error("summary not found: {0}")]
    SummaryNotFound(String),

    /// Audio object not found.
    #[error("audio object not found: {0}")]
    AudioNotFound(String),

    /// Config/data directory not found
    #[error("config/data directory not found")]
    NoConfigDir,

    /// Migration error
    #[error("migration error: {0}")]
    Migration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Ownership check failed: the row's `user_id` doesn't match the
    /// caller's (spec §9 "Implicit ownership checks").
    #[error("resource does not belong to the requesting user")]
    Forbidden,
}

/// Result type alias for database operations
pub type DbResult<T> = Result<T, DbError>;

impl From<DbError> for CoreError {
    fn from(err: DbError) -> Self {
        let category = match &err {
            DbError::JobNotFound(_)
            | DbError::PrefsNotFound(_)
            | DbError::KeyNotFound(_)
            | DbError::SummaryNotFound(_)
            | DbError::AudioNotFound(_) => ErrorCategory::NotFound,
            DbError::JobConflict { .. } => ErrorCategory::Conflict,
            DbError::JobAlreadyExists(_) | DbError::KeyAlreadyExists(_) => ErrorCategory::Conflict,
            DbError::Forbidden => ErrorCategory::Forbidden,
            DbError::Sql(_) | DbError::Io(_) | DbError::Migration(_) | DbError::NoConfigDir => {
                ErrorCategory::Unavailable
            }
            DbError::Serialization(_) => ErrorCategory::InvalidInput,
        };
        CoreError::new(category, err.to_string())
    }
}
