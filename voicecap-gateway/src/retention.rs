//! Retention sweeper (SPEC_FULL §2 supplemented feature): prunes terminal
//! jobs past `job_retention_days`, and optionally reconciles orphaned
//! audio objects the ingest path left without a Transcription job (spec
//! §4.N step 3's "rare, harmless leak").

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use voicecap_db::{AudioRepository, Job, JobRepository};

use crate::state::AppState;

/// How long an audio object must sit without a job before it's considered
/// orphaned rather than mid-registration.
const ORPHAN_GRACE_PERIOD: Duration = Duration::minutes(10);

/// Retention and orphan reconciliation run far less often than the
/// processor/scheduler ticks — this is housekeeping, not latency-sensitive.
const SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(3600);

pub struct RetentionSweeper {
    state: Arc<AppState>,
}

impl RetentionSweeper {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("retention sweeper shutting down");
                    return;
                }
                _ = ticker.tick() => {}
            }

            if let Err(err) = self.sweep().await {
                warn!(error = %err, "retention sweep failed");
            }
        }
    }

    async fn sweep(&self) -> voicecap_db::DbResult<()> {
        let tunables = self.state.tunables;
        let cutoff = Utc::now() - Duration::days(tunables.job_retention_days);
        let deleted = JobRepository::delete_terminal_older_than(self.state.db.pool(), cutoff).await?;
        if deleted > 0 {
            info!(deleted, "retention sweep removed terminal jobs");
        }

        if tunables.reconcile_orphan_audio {
            self.reconcile_orphans().await?;
        }

        Ok(())
    }

    async fn reconcile_orphans(&self) -> voicecap_db::DbResult<()> {
        let older_than = Utc::now() - ORPHAN_GRACE_PERIOD;
        let orphans = AudioRepository::list_orphans(self.state.db.pool(), older_than).await?;

        for audio in &orphans {
            let job = Job::new_transcription(&audio.user_id, &audio.file_id, &audio.blob_key, audio.recorded_at);
            match JobRepository::insert(self.state.db.pool(), &job).await {
                Ok(()) => info!(file_id = %audio.file_id, "reconciled orphan audio into a transcription job"),
                Err(voicecap_db::DbError::JobAlreadyExists(_)) => {}
                Err(err) => warn!(file_id = %audio.file_id, error = %err, "failed to reconcile orphan audio"),
            }
        }

        Ok(())
    }
}
