//! Domain enums shared across every crate (spec §3).

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two job kinds a `Job` row can be (spec §3 "Job").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Transcription,
    DailySummary,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Transcription => write!(f, "transcription"),
            JobKind::DailySummary => write!(f, "daily_summary"),
        }
    }
}

impl std::str::FromStr for JobKind {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transcription" => Ok(JobKind::Transcription),
            "daily_summary" => Ok(JobKind::DailySummary),
            other => Err(crate::error::CoreError::new(
                crate::error::ErrorCategory::InvalidInput,
                format!("invalid job kind: {other}"),
            )),
        }
    }
}

/// The job lifecycle state machine (spec §3, §4.L).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Completed and Failed are terminal: spec invariant 2.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(crate::error::CoreError::new(
                crate::error::ErrorCategory::InvalidInput,
                format!("invalid job status: {other}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[test]
    fn round_trips_through_string() {
        for kind in [JobKind::Transcription, JobKind::DailySummary] {
            let s = kind.to_string();
            assert_eq!(s.parse::<JobKind>().unwrap(), kind);
        }
    }
}
