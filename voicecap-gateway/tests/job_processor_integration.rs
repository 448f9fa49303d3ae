//! End-to-end exercise of the JobProcessor against a real (in-memory)
//! database, matching the teacher's DB-backed integration test style
//! (`t-koma-db/tests/ghost_repository_integration.rs`): construct real
//! rows, run the thing, assert on the rows it left behind.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use voicecap_clients::{BlobStore, Mailer, SpeechClient, SummaryClient, Transcoder};
use voicecap_core::config::Tunables;
use voicecap_core::domain::JobStatus;
use voicecap_db::{DbPool, Job, JobRepository};
use voicecap_gateway::processor::JobProcessor;
use voicecap_gateway::state::AppState;

fn fast_tunables() -> Tunables {
    let mut t = Tunables::default();
    t.poll_interval_secs = 1;
    t.max_concurrent_jobs = 2;
    t
}

async fn test_state(tunables: Tunables) -> Arc<AppState> {
    let db = DbPool::new_in_memory().await.unwrap();
    let blob_dir = tempfile::tempdir().unwrap();

    Arc::new(AppState::new(
        db,
        BlobStore::new(blob_dir.path(), b"test-secret"),
        Transcoder::new(),
        SpeechClient::new("test-key", "http://127.0.0.1:1"),
        SummaryClient::new("test-key", "http://127.0.0.1:1"),
        Mailer::new("test-key", "http://127.0.0.1:1", "noreply@example.com"),
        tunables,
        Decimal::new(500, 2),
        "Summarize the user's day from these transcripts.".to_string(),
        "internal-test-secret".to_string(),
    ))
}

/// A Transcription job whose audio object was never registered must
/// permanently fail on its first tick (spec §7 category 1, NotFound ⇒
/// permanent job failure), not loop forever in Processing.
#[tokio::test]
async fn transcription_job_with_missing_audio_fails_permanently() {
    let state = test_state(fast_tunables()).await;

    let job = Job::new_transcription("user_1", "aud_missing", "audio/user_1/aud_missing.enc", chrono::Utc::now());
    JobRepository::insert(state.db.pool(), &job).await.unwrap();

    let shutdown = CancellationToken::new();
    let processor = JobProcessor::new(Arc::clone(&state));
    let handle = tokio::spawn(processor.run(shutdown.clone()));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    shutdown.cancel();
    handle.await.unwrap();

    let found = JobRepository::get_by_id(state.db.pool(), &job.job_id).await.unwrap();
    assert_eq!(found.status, JobStatus::Failed);
    assert_eq!(found.attempts, 1);
}

/// A DailySummary job for a user with no preferences on file is a no-op
/// (defaults have `enable_daily_summary: false`) and must complete, not
/// fail or loop (spec §4.L DailySummary dispatch step 1).
#[tokio::test]
async fn daily_summary_job_for_user_without_prefs_completes_as_noop() {
    let state = test_state(fast_tunables()).await;

    let now = chrono::Utc::now();
    let job = Job::new_daily_summary("user_2", now.date_naive(), now);
    JobRepository::insert(state.db.pool(), &job).await.unwrap();

    let shutdown = CancellationToken::new();
    let processor = JobProcessor::new(Arc::clone(&state));
    let handle = tokio::spawn(processor.run(shutdown.clone()));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    shutdown.cancel();
    handle.await.unwrap();

    let found = JobRepository::get_by_id(state.db.pool(), &job.job_id).await.unwrap();
    assert_eq!(found.status, JobStatus::Completed);
}

/// The reaper must recover a job a crashed worker left stranded in
/// `Processing` once `processing_timeout_secs` has elapsed, putting it
/// back in front of the queue rather than leaving it stuck forever
/// (spec §4.L "Reaper sweep").
#[tokio::test]
async fn stale_processing_job_is_reaped_back_to_pending() {
    let mut tunables = fast_tunables();
    tunables.processing_timeout_secs = 0;
    let state = test_state(tunables).await;

    let now = chrono::Utc::now();
    let job = Job::new_transcription("user_3", "aud_x", "audio/user_3/aud_x.enc", now);
    JobRepository::insert(state.db.pool(), &job).await.unwrap();
    JobRepository::update_conditional(
        state.db.pool(),
        &job.job_id,
        &voicecap_db::JobPatch::claim(now - chrono::Duration::minutes(10), 1),
        JobStatus::Pending,
    )
    .await
    .unwrap();

    let shutdown = CancellationToken::new();
    let processor = JobProcessor::new(Arc::clone(&state));
    let handle = tokio::spawn(processor.run(shutdown.clone()));

    // Give the reaper a tick to recover the row, then one more to dispatch
    // and permanently fail it again (no audio object exists).
    tokio::time::sleep(Duration::from_millis(2500)).await;
    shutdown.cancel();
    handle.await.unwrap();

    let found = JobRepository::get_by_id(state.db.pool(), &job.job_id).await.unwrap();
    assert_eq!(found.status, JobStatus::Failed);
    assert_eq!(found.attempts, 2);
}
