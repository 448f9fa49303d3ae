//! The shared error taxonomy (spec §7).
//!
//! Every downstream crate defines its own `thiserror` enum for the errors
//! it can actually produce, then converts into `CoreError` at its public
//! boundary. The JobProcessor partitions by [`ErrorCategory`] to decide
//! permanent-fail vs. transient-retry; the HTTP layer maps the same
//! category to a status code. Neither layer should ever need to match on
//! a downstream-crate-specific variant.

use std::fmt;

/// The ten error categories from spec §7. Not a 1:1 mapping to any single
/// downstream type — it's the classification every downstream error
/// reduces to at the core boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    IntegrityFailure,
    InvalidInput,
    Unauthorized,
    Forbidden,
    InsufficientCredit,
    RateLimited,
    Unavailable,
    Timeout,
    UnsupportedFormat,
}

impl ErrorCategory {
    /// Whether the JobProcessor should retry (transient) or fail the job
    /// outright (permanent). See spec §4.L "Error policy".
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorCategory::RateLimited | ErrorCategory::Unavailable | ErrorCategory::Timeout
        )
    }

    /// HTTP status code per spec §7's propagation policy.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorCategory::NotFound => 404,
            ErrorCategory::Conflict => 409,
            ErrorCategory::IntegrityFailure => 422,
            ErrorCategory::InvalidInput => 400,
            ErrorCategory::Unauthorized => 401,
            ErrorCategory::Forbidden => 403,
            ErrorCategory::InsufficientCredit => 402,
            ErrorCategory::RateLimited => 429,
            ErrorCategory::Unavailable => 503,
            ErrorCategory::Timeout => 504,
            ErrorCategory::UnsupportedFormat => 422,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Conflict => "conflict",
            ErrorCategory::IntegrityFailure => "integrity_failure",
            ErrorCategory::InvalidInput => "invalid_input",
            ErrorCategory::Unauthorized => "unauthorized",
            ErrorCategory::Forbidden => "forbidden",
            ErrorCategory::InsufficientCredit => "insufficient_credit",
            ErrorCategory::RateLimited => "rate_limited",
            ErrorCategory::Unavailable => "unavailable",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::UnsupportedFormat => "unsupported_format",
        };
        write!(f, "{s}")
    }
}

/// The crate-agnostic error every voicecap component can be reduced to.
/// Carries a redacted message only — never a downstream payload, stack
/// trace, or credential (spec §7).
#[derive(Debug, thiserror::Error)]
#[error("{category}: {message}")]
pub struct CoreError {
    pub category: ErrorCategory,
    pub message: String,
}

impl CoreError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Conflict, message)
    }

    pub fn insufficient_credit(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::InsufficientCredit, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Unavailable, message)
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
