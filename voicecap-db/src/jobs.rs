//! JobStore (spec §4.C): durable table of jobs with a status lifecycle.
//!
//! `update_conditional` is the sole primitive that protects against
//! concurrent workers touching the same job — every mutation after the
//! initial insert goes through it.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use voicecap_core::domain::{JobKind, JobStatus};

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct Job {
    pub job_id: String,
    pub user_id: String,
    pub kind: JobKind,
    pub audio_file_id: Option<String>,
    pub audio_blob_key: Option<String>,
    pub summary_date: Option<NaiveDate>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub attempts: i64,
    pub error_message: Option<String>,
}

impl Job {
    /// Build a new Transcription job for a freshly registered audio object
    /// (spec §4.N step 3). `created_at` MUST be the audio's `recorded_at`,
    /// not the current instant.
    pub fn new_transcription(
        user_id: &str,
        audio_file_id: &str,
        audio_blob_key: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id: format!("job_{}", Uuid::new_v4()),
            user_id: user_id.to_string(),
            kind: JobKind::Transcription,
            audio_file_id: Some(audio_file_id.to_string()),
            audio_blob_key: Some(audio_blob_key.to_string()),
            summary_date: None,
            status: JobStatus::Pending,
            created_at,
            last_attempt_at: None,
            completed_at: None,
            attempts: 0,
            error_message: None,
        }
    }

    /// Build a new DailySummary job (spec §4.M step 4).
    pub fn new_daily_summary(user_id: &str, summary_date: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            job_id: format!("job_{}", Uuid::new_v4()),
            user_id: user_id.to_string(),
            kind: JobKind::DailySummary,
            audio_file_id: None,
            audio_blob_key: None,
            summary_date: Some(summary_date),
            status: JobStatus::Pending,
            created_at: now,
            last_attempt_at: None,
            completed_at: None,
            attempts: 0,
            error_message: None,
        }
    }
}

/// Patch applied by a conditional update. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub attempts: Option<i64>,
    pub error_message: Option<Option<String>>,
}

impl JobPatch {
    /// The patch applied when a worker claims a Pending job (spec §4.L
    /// "Claiming"): bump status, attempts, and last_attempt_at together.
    pub fn claim(now: DateTime<Utc>, attempts: i64) -> Self {
        Self {
            status: Some(JobStatus::Processing),
            last_attempt_at: Some(now),
            attempts: Some(attempts),
            ..Default::default()
        }
    }

    pub fn to_failed(reason: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error_message: Some(Some(reason.into())),
            ..Default::default()
        }
    }

    pub fn to_completed(now: DateTime<Utc>) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            completed_at: Some(now),
            ..Default::default()
        }
    }

    /// Revert to Pending without touching `attempts` (transient failure or
    /// best-effort shutdown patch, spec §4.L "Error policy").
    pub fn to_pending() -> Self {
        Self {
            status: Some(JobStatus::Pending),
            ..Default::default()
        }
    }
}

pub struct JobRepository;

impl JobRepository {
    pub async fn insert(pool: &SqlitePool, job: &Job) -> DbResult<()> {
        let existing = sqlx::query_scalar::<_, i64>("SELECT 1 FROM jobs WHERE job_id = ?")
            .bind(&job.job_id)
            .fetch_optional(pool)
            .await?;
        if existing.is_some() {
            return Err(DbError::JobAlreadyExists(job.job_id.clone()));
        }

        sqlx::query(
            "INSERT INTO jobs (job_id, user_id, kind, audio_file_id, audio_blob_key, summary_date,
                                status, created_at, last_attempt_at, completed_at, attempts, error_message)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&job.job_id)
        .bind(&job.user_id)
        .bind(job.kind.to_string())
        .bind(&job.audio_file_id)
        .bind(&job.audio_blob_key)
        .bind(job.summary_date.map(|d| d.to_string()))
        .bind(job.status.to_string())
        .bind(job.created_at.to_rfc3339())
        .bind(job.last_attempt_at.map(|t| t.to_rfc3339()))
        .bind(job.completed_at.map(|t| t.to_rfc3339()))
        .bind(job.attempts)
        .bind(&job.error_message)
        .execute(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                DbError::JobAlreadyExists(job.job_id.clone())
            }
            other => DbError::Sql(other),
        })?;

        Ok(())
    }

    /// Conditional insert for the scheduler: inserts only if no non-Failed
    /// DailySummary job exists for `(user_id, summary_date)` yet. Returns
    /// `true` if a row was inserted. Relies on the partial unique index in
    /// the migration rather than a read-then-write race.
    pub async fn insert_daily_summary_if_absent(pool: &SqlitePool, job: &Job) -> DbResult<bool> {
        debug_assert_eq!(job.kind, JobKind::DailySummary);
        let result = sqlx::query(
            "INSERT INTO jobs (job_id, user_id, kind, audio_file_id, audio_blob_key, summary_date,
                                status, created_at, last_attempt_at, completed_at, attempts, error_message)
             SELECT ?, ?, ?, NULL, NULL, ?, ?, ?, NULL, NULL, 0, NULL
             WHERE NOT EXISTS (
                 SELECT 1 FROM jobs
                 WHERE kind = 'daily_summary' AND user_id = ? AND summary_date = ? AND status != 'failed'
             )",
        )
        .bind(&job.job_id)
        .bind(&job.user_id)
        .bind(job.kind.to_string())
        .bind(job.summary_date.map(|d| d.to_string()))
        .bind(job.status.to_string())
        .bind(job.created_at.to_rfc3339())
        .bind(&job.user_id)
        .bind(job.summary_date.map(|d| d.to_string()))
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn get_by_id(pool: &SqlitePool, job_id: &str) -> DbResult<Job> {
        let row = sqlx::query_as::<_, JobRow>(
            "SELECT job_id, user_id, kind, audio_file_id, audio_blob_key, summary_date, status,
                    created_at, last_attempt_at, completed_at, attempts, error_message
             FROM jobs WHERE job_id = ?",
        )
        .bind(job_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::JobNotFound(job_id.to_string()))?;

        Job::try_from(row)
    }

    /// Pending jobs ordered oldest-first, no locking (spec §4.C).
    pub async fn query_pending(pool: &SqlitePool, limit: i64) -> DbResult<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT job_id, user_id, kind, audio_file_id, audio_blob_key, summary_date, status,
                    created_at, last_attempt_at, completed_at, attempts, error_message
             FROM jobs WHERE status = 'pending' ORDER BY created_at ASC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(Job::try_from).collect()
    }

    /// Rows stuck in Processing past `processing_timeout` (spec §4.L
    /// "Reaper sweep").
    pub async fn query_stale_processing(
        pool: &SqlitePool,
        cutoff: DateTime<Utc>,
    ) -> DbResult<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT job_id, user_id, kind, audio_file_id, audio_blob_key, summary_date, status,
                    created_at, last_attempt_at, completed_at, attempts, error_message
             FROM jobs
             WHERE status = 'processing' AND last_attempt_at IS NOT NULL AND last_attempt_at < ?",
        )
        .bind(cutoff.to_rfc3339())
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(Job::try_from).collect()
    }

    /// Jobs for a user, excluding DailySummary (spec §4.C / §6: the read
    /// API must never surface DailySummary jobs through this path).
    pub async fn query_by_user(pool: &SqlitePool, user_id: &str) -> DbResult<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT job_id, user_id, kind, audio_file_id, audio_blob_key, summary_date, status,
                    created_at, last_attempt_at, completed_at, attempts, error_message
             FROM jobs WHERE user_id = ? AND kind = 'transcription' ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(Job::try_from).collect()
    }

    pub async fn query_daily_summary(
        pool: &SqlitePool,
        user_id: &str,
        date: NaiveDate,
    ) -> DbResult<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(
            "SELECT job_id, user_id, kind, audio_file_id, audio_blob_key, summary_date, status,
                    created_at, last_attempt_at, completed_at, attempts, error_message
             FROM jobs WHERE user_id = ? AND kind = 'daily_summary' AND summary_date = ?",
        )
        .bind(user_id)
        .bind(date.to_string())
        .fetch_optional(pool)
        .await?;

        row.map(Job::try_from).transpose()
    }

    /// Conditional update: fails with `JobConflict` if the row's current
    /// status is not `expected_status` (spec §4.C `Update`).
    pub async fn update_conditional(
        pool: &SqlitePool,
        job_id: &str,
        patch: &JobPatch,
        expected_status: JobStatus,
    ) -> DbResult<()> {
        let mut set_clauses = Vec::new();
        if patch.status.is_some() {
            set_clauses.push("status = ?");
        }
        if patch.last_attempt_at.is_some() {
            set_clauses.push("last_attempt_at = ?");
        }
        if patch.completed_at.is_some() {
            set_clauses.push("completed_at = ?");
        }
        if patch.attempts.is_some() {
            set_clauses.push("attempts = ?");
        }
        if patch.error_message.is_some() {
            set_clauses.push("error_message = ?");
        }

        if set_clauses.is_empty() {
            return Ok(());
        }

        let sql = format!(
            "UPDATE jobs SET {} WHERE job_id = ? AND status = ?",
            set_clauses.join(", ")
        );
        let mut query = sqlx::query(&sql);
        if let Some(status) = patch.status {
            query = query.bind(status.to_string());
        }
        if let Some(t) = patch.last_attempt_at {
            query = query.bind(t.to_rfc3339());
        }
        if let Some(t) = patch.completed_at {
            query = query.bind(t.to_rfc3339());
        }
        if let Some(a) = patch.attempts {
            query = query.bind(a);
        }
        if let Some(msg) = &patch.error_message {
            query = query.bind(msg.clone());
        }
        query = query.bind(job_id).bind(expected_status.to_string());

        let result = query.execute(pool).await?;
        if result.rows_affected() != 1 {
            return Err(DbError::JobConflict {
                job_id: job_id.to_string(),
                expected: expected_status.to_string(),
            });
        }
        Ok(())
    }

    /// Delete terminal jobs older than `retention`: the retention sweeper
    /// (SPEC_FULL §2 supplemented feature, spec §3 "Lifecycle").
    pub async fn delete_terminal_older_than(
        pool: &SqlitePool,
        cutoff: DateTime<Utc>,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            "DELETE FROM jobs WHERE status IN ('completed', 'failed') AND created_at < ?",
        )
        .bind(cutoff.to_rfc3339())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    job_id: String,
    user_id: String,
    kind: String,
    audio_file_id: Option<String>,
    audio_blob_key: Option<String>,
    summary_date: Option<String>,
    status: String,
    created_at: String,
    last_attempt_at: Option<String>,
    completed_at: Option<String>,
    attempts: i64,
    error_message: Option<String>,
}

impl TryFrom<JobRow> for Job {
    type Error = DbError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let parse_instant = |s: &str| {
            DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| DbError::Serialization(format!("bad timestamp {s}: {e}")))
        };

        Ok(Job {
            job_id: row.job_id,
            user_id: row.user_id,
            kind: row
                .kind
                .parse()
                .map_err(|e: voicecap_core::CoreError| DbError::Serialization(e.to_string()))?,
            audio_file_id: row.audio_file_id,
            audio_blob_key: row.audio_blob_key,
            summary_date: row
                .summary_date
                .map(|s| {
                    NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                        .map_err(|e| DbError::Serialization(e.to_string()))
                })
                .transpose()?,
            status: row
                .status
                .parse()
                .map_err(|e: voicecap_core::CoreError| DbError::Serialization(e.to_string()))?,
            created_at: parse_instant(&row.created_at)?,
            last_attempt_at: row.last_attempt_at.map(|s| parse_instant(&s)).transpose()?,
            completed_at: row.completed_at.map(|s| parse_instant(&s)).transpose()?,
            attempts: row.attempts,
            error_message: row.error_message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::create_test_pool;
    use chrono::Duration;

    #[tokio::test]
    async fn insert_and_get_by_id() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        let job = Job::new_transcription("user_1", "file_1", "audio/user_1/file_1.enc", Utc::now());
        JobRepository::insert(pool, &job).await.unwrap();

        let found = JobRepository::get_by_id(pool, &job.job_id).await.unwrap();
        assert_eq!(found.status, JobStatus::Pending);
        assert_eq!(found.attempts, 0);
    }

    #[tokio::test]
    async fn duplicate_insert_is_conflict() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        let job = Job::new_transcription("user_1", "file_1", "audio/user_1/file_1.enc", Utc::now());
        JobRepository::insert(pool, &job).await.unwrap();
        let err = JobRepository::insert(pool, &job).await.unwrap_err();
        assert!(matches!(err, DbError::JobAlreadyExists(_)));
    }

    #[tokio::test]
    async fn second_transcription_job_for_same_blob_key_is_rejected() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        let job_a = Job::new_transcription("user_1", "file_1", "audio/user_1/k.enc", Utc::now());
        let job_b = Job::new_transcription("user_1", "file_2", "audio/user_1/k.enc", Utc::now());
        JobRepository::insert(pool, &job_a).await.unwrap();
        let err = JobRepository::insert(pool, &job_b).await.unwrap_err();
        assert!(matches!(err, DbError::JobAlreadyExists(_)));
    }

    #[tokio::test]
    async fn conditional_update_loses_race_on_status_mismatch() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        let job = Job::new_transcription("user_1", "file_1", "audio/user_1/file_1.enc", Utc::now());
        JobRepository::insert(pool, &job).await.unwrap();

        let now = Utc::now();
        JobRepository::update_conditional(
            pool,
            &job.job_id,
            &JobPatch::claim(now, 1),
            JobStatus::Pending,
        )
        .await
        .unwrap();

        // A second claim attempt assuming the job is still Pending must fail.
        let err = JobRepository::update_conditional(
            pool,
            &job.job_id,
            &JobPatch::claim(now, 2),
            JobStatus::Pending,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DbError::JobConflict { .. }));
    }

    #[tokio::test]
    async fn query_pending_is_oldest_first() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        let now = Utc::now();
        let older = Job::new_transcription("u", "f1", "k1", now - Duration::minutes(10));
        let newer = Job::new_transcription("u", "f2", "k2", now);
        JobRepository::insert(pool, &newer).await.unwrap();
        JobRepository::insert(pool, &older).await.unwrap();

        let pending = JobRepository::query_pending(pool, 10).await.unwrap();
        assert_eq!(pending[0].job_id, older.job_id);
        assert_eq!(pending[1].job_id, newer.job_id);
    }

    #[tokio::test]
    async fn query_by_user_excludes_daily_summary() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        let now = Utc::now();
        let transcription = Job::new_transcription("u", "f1", "k1", now);
        let summary = Job::new_daily_summary("u", now.date_naive(), now);
        JobRepository::insert(pool, &transcription).await.unwrap();
        JobRepository::insert(pool, &summary).await.unwrap();

        let jobs = JobRepository::query_by_user(pool, "u").await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].kind, JobKind::Transcription);
    }

    #[tokio::test]
    async fn insert_daily_summary_if_absent_is_idempotent() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        let now = Utc::now();
        let date = now.date_naive();
        let a = Job::new_daily_summary("u", date, now);
        let b = Job::new_daily_summary("u", date, now);

        assert!(
            JobRepository::insert_daily_summary_if_absent(pool, &a)
                .await
                .unwrap()
        );
        assert!(
            !JobRepository::insert_daily_summary_if_absent(pool, &b)
                .await
                .unwrap()
        );
    }
}
