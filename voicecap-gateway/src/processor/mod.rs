//! JobProcessor (spec §4.L) — the core of the core. A single dispatcher
//! loop wakes every `POLL_INTERVAL`, sweeps stale `Processing` rows back to
//! `Pending` (the reaper), then claims and dispatches eligible `Pending`
//! jobs onto a bounded worker pool.

pub mod daily_summary;
pub mod transcription;

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use voicecap_db::{Job, JobPatch, JobRepository};

use crate::state::AppState;

/// How many candidate rows a single tick considers. A generous multiple of
/// `max_concurrent_jobs` so the eligibility filter (age/attempts/backoff)
/// has enough headroom to find dispatchable work even when the front of
/// the queue is backoff-throttled.
const CANDIDATE_FANOUT: i64 = 8;

pub struct JobProcessor {
    state: Arc<AppState>,
}

impl JobProcessor {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let tunables = self.state.tunables;
        let mut ticker = interval(std::time::Duration::from_secs(tunables.poll_interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("job processor shutting down");
                    return;
                }
                _ = ticker.tick() => {}
            }

            if let Err(err) = self.tick(&shutdown).await {
                warn!(error = %err, "job processor tick failed");
            }
        }
    }

    async fn tick(&self, shutdown: &CancellationToken) -> voicecap_db::DbResult<()> {
        self.reap_stale_processing().await?;

        let tunables = self.state.tunables;
        let limit = tunables.max_concurrent_jobs as i64 * CANDIDATE_FANOUT;
        let candidates = JobRepository::query_pending(self.state.db.pool(), limit).await?;

        let semaphore = Arc::new(Semaphore::new(tunables.max_concurrent_jobs));
        let mut set = JoinSet::new();

        for job in candidates {
            let Some(job) = self.apply_eligibility_filter(job).await? else {
                continue;
            };

            let Ok(job) = self.claim(job).await else {
                // Another worker won the race; skip silently (spec §4.L "Claiming").
                continue;
            };

            let state = Arc::clone(&self.state);
            let permit = Arc::clone(&semaphore);
            let shutdown = shutdown.clone();
            set.spawn(async move {
                let _permit = match permit.acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => return,
                };
                dispatch(state, job, shutdown).await;
            });
        }

        while set.join_next().await.is_some() {}
        Ok(())
    }

    /// Recovers jobs a crashed worker left in `Processing` past
    /// `PROCESSING_TIMEOUT` (spec §4.L "Reaper sweep").
    async fn reap_stale_processing(&self) -> voicecap_db::DbResult<()> {
        let cutoff =
            Utc::now() - chrono::Duration::seconds(self.state.tunables.processing_timeout_secs);
        let stale = JobRepository::query_stale_processing(self.state.db.pool(), cutoff).await?;

        for job in stale {
            match JobRepository::update_conditional(
                self.state.db.pool(),
                &job.job_id,
                &JobPatch::to_pending(),
                voicecap_core::domain::JobStatus::Processing,
            )
            .await
            {
                Ok(()) => info!(job_id = %job.job_id, "reaper recovered stale processing job"),
                Err(voicecap_db::DbError::JobConflict { .. }) => {}
                Err(err) => warn!(job_id = %job.job_id, error = %err, "reaper failed to recover job"),
            }
        }
        Ok(())
    }

    /// Applies spec §4.L's eligibility filter. Returns `None` if the job
    /// should be skipped this tick (still in backoff); permanently fails
    /// jobs that have exceeded retries or aged out rather than skipping
    /// them, per invariants 4 and 5.
    async fn apply_eligibility_filter(&self, job: Job) -> voicecap_db::DbResult<Option<Job>> {
        let tunables = self.state.tunables;
        let now = Utc::now();

        if job.attempts >= tunables.max_attempts as i64 {
            let _ = JobRepository::update_conditional(
                self.state.db.pool(),
                &job.job_id,
                &JobPatch::to_failed("exceeded max retries"),
                voicecap_core::domain::JobStatus::Pending,
            )
            .await;
            return Ok(None);
        }

        if (now - job.created_at) >= chrono::Duration::seconds(tunables.job_max_age_secs) {
            let _ = JobRepository::update_conditional(
                self.state.db.pool(),
                &job.job_id,
                &JobPatch::to_failed("job aged out"),
                voicecap_core::domain::JobStatus::Pending,
            )
            .await;
            return Ok(None);
        }

        if let Some(last_attempt) = job.last_attempt_at {
            if (now - last_attempt) < chrono::Duration::seconds(tunables.retry_backoff_secs) {
                return Ok(None);
            }
        }

        Ok(Some(job))
    }

    /// Conditional claim: `Pending` → `Processing`, bumping `attempts` and
    /// `last_attempt_at` together (spec §4.L "Claiming").
    async fn claim(&self, job: Job) -> voicecap_db::DbResult<Job> {
        let now = Utc::now();
        JobRepository::update_conditional(
            self.state.db.pool(),
            &job.job_id,
            &JobPatch::claim(now, job.attempts + 1),
            voicecap_core::domain::JobStatus::Pending,
        )
        .await?;

        Ok(Job {
            attempts: job.attempts + 1,
            last_attempt_at: Some(now),
            status: voicecap_core::domain::JobStatus::Processing,
            ..job
        })
    }
}

/// Dispatches a claimed job by kind (spec §4.L "Dispatch by kind") and
/// applies the resulting permanent/transient/shutdown error policy.
async fn dispatch(state: Arc<AppState>, job: Job, shutdown: CancellationToken) {
    let job_id = job.job_id.clone();
    let user_id = job.user_id.clone();
    let kind = job.kind;

    let outcome = tokio::select! {
        _ = shutdown.cancelled() => Outcome::Shutdown,
        result = run_job(&state, &job) => match result {
            Ok(()) => Outcome::Completed,
            Err(err) => classify(err),
        },
    };

    match outcome {
        Outcome::Completed => {
            let _ = JobRepository::update_conditional(
                state.db.pool(),
                &job_id,
                &JobPatch::to_completed(Utc::now()),
                voicecap_core::domain::JobStatus::Processing,
            )
            .await;
            info!(job_id = %job_id, user_id = %user_id, kind = %kind, to_status = "completed", "job completed");
        }
        Outcome::Permanent(reason) => {
            let _ = JobRepository::update_conditional(
                state.db.pool(),
                &job_id,
                &JobPatch::to_failed(reason.clone()),
                voicecap_core::domain::JobStatus::Processing,
            )
            .await;
            warn!(job_id = %job_id, user_id = %user_id, kind = %kind, to_status = "failed", reason = %reason, "job failed permanently");
        }
        Outcome::Transient(reason) => {
            let _ = JobRepository::update_conditional(
                state.db.pool(),
                &job_id,
                &JobPatch::to_pending(),
                voicecap_core::domain::JobStatus::Processing,
            )
            .await;
            warn!(job_id = %job_id, user_id = %user_id, kind = %kind, to_status = "pending", reason = %reason, "job failed transiently, will retry");
        }
        Outcome::Shutdown => {
            let _ = JobRepository::update_conditional(
                state.db.pool(),
                &job_id,
                &JobPatch::to_pending(),
                voicecap_core::domain::JobStatus::Processing,
            )
            .await;
            info!(job_id = %job_id, user_id = %user_id, kind = %kind, "job returned to pending on shutdown");
        }
    }
}

async fn run_job(state: &Arc<AppState>, job: &Job) -> Result<(), voicecap_core::error::CoreError> {
    use voicecap_core::domain::JobKind;
    match job.kind {
        JobKind::Transcription => transcription::process(state, job).await,
        JobKind::DailySummary => daily_summary::process(state, job).await,
    }
}

enum Outcome {
    Completed,
    Permanent(String),
    Transient(String),
    Shutdown,
}

fn classify(err: voicecap_core::error::CoreError) -> Outcome {
    if err.category().is_transient() {
        Outcome::Transient(err.message)
    } else {
        Outcome::Permanent(err.message)
    }
}
