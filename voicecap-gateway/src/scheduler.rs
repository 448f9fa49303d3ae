//! SummaryScheduler (spec §4.M): a second cooperative timer in the same
//! process, generating at most one DailySummary job per user per UTC day
//! at each user's preferred local time.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use voicecap_db::{DbError, DbResult, Job, JobRepository, PrefStore};

use crate::state::AppState;

pub struct SummaryScheduler {
    state: Arc<AppState>,
}

impl SummaryScheduler {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let tunables = self.state.tunables;
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(tunables.sched_tick_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut last_check: Option<DateTime<Utc>> = None;
        let mut scheduled_today: HashMap<String, NaiveDate> = HashMap::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("summary scheduler shutting down");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let now = Utc::now();
            let due = match last_check {
                Some(t) => now - t >= Duration::seconds(tunables.sched_check_interval_secs),
                None => true,
            };
            if !due {
                continue;
            }
            last_check = Some(now);

            if let Err(err) = self.check_and_schedule(now, &mut scheduled_today).await {
                warn!(error = %err, "summary scheduler check failed");
            }
        }
    }

    async fn check_and_schedule(
        &self,
        now: DateTime<Utc>,
        scheduled_today: &mut HashMap<String, NaiveDate>,
    ) -> DbResult<()> {
        let today = now.date_naive();
        // Reset on UTC date rollover: compare the stored date, not a timer.
        scheduled_today.retain(|_, date| *date == today);

        let users = PrefStore::list_with_daily_summary_enabled(self.state.db.pool()).await?;
        let current_hour = now.hour() as i32;
        let current_minute = now.minute() as i32;

        for user in users {
            if scheduled_today.get(&user.user_id) == Some(&today) {
                continue;
            }

            let (local_hour, local_minute) = parse_local_time(&user.summary_time_local)?;
            let pref_hour_utc = (local_hour - user.timezone_offset_hours).rem_euclid(24);
            let matches = current_hour == pref_hour_utc
                && local_minute <= current_minute
                && current_minute < local_minute + 5;
            if !matches {
                continue;
            }

            let job = Job::new_daily_summary(&user.user_id, today, now);
            let inserted = JobRepository::insert_daily_summary_if_absent(self.state.db.pool(), &job).await?;
            if inserted {
                info!(user_id = %user.user_id, date = %today, "scheduled daily summary job");
            }
            scheduled_today.insert(user.user_id.clone(), today);
        }

        Ok(())
    }
}

fn parse_local_time(s: &str) -> DbResult<(i32, i32)> {
    let t = NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|e| DbError::Serialization(format!("invalid summary_time_local {s}: {e}")))?;
    Ok((t.hour() as i32, t.minute() as i32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use voicecap_clients::{BlobStore, Mailer, SpeechClient, SummaryClient, Transcoder};
    use voicecap_db::{DbPool, Preferences};

    #[test]
    fn pref_hour_utc_wraps_negative_offset() {
        // local 09:00, offset -6 → UTC 15:00.
        let (local_hour, _) = parse_local_time("09:00").unwrap();
        assert_eq!((local_hour - (-6)).rem_euclid(24), 15);
    }

    #[test]
    fn pref_hour_utc_wraps_positive_offset() {
        // local 01:00, offset +9 → UTC 16:00 (previous day, same hour mod 24).
        let (local_hour, _) = parse_local_time("01:00").unwrap();
        assert_eq!((local_hour - 9).rem_euclid(24), 16);
    }

    async fn test_state() -> Arc<AppState> {
        let db = DbPool::new_in_memory().await.unwrap();
        let blob_dir = tempfile::tempdir().unwrap();
        Arc::new(AppState::new(
            db,
            BlobStore::new(blob_dir.path(), b"test-secret"),
            Transcoder::new(),
            SpeechClient::new("k", "http://127.0.0.1:1"),
            SummaryClient::new("k", "http://127.0.0.1:1"),
            Mailer::new("k", "http://127.0.0.1:1", "noreply@example.com"),
            voicecap_core::config::Tunables::default(),
            Decimal::new(500, 2),
            "prompt".to_string(),
            "internal-secret".to_string(),
        ))
    }

    /// Within the 5-minute match window a user is scheduled exactly once;
    /// a second check in the same minute must not insert a duplicate
    /// DailySummary job (spec §4.M step 5 "at most one per user per day").
    #[tokio::test]
    async fn check_and_schedule_is_idempotent_within_the_match_window() {
        let state = test_state().await;
        let mut prefs = Preferences::default_for("user_1");
        prefs.enable_daily_summary = true;
        prefs.summary_time_local = "09:00".to_string();
        prefs.timezone_offset_hours = -6;
        PrefStore::upsert(state.db.pool(), &prefs).await.unwrap();

        let now = Utc.with_ymd_and_hms(2026, 1, 15, 15, 2, 0).unwrap();
        let scheduler = SummaryScheduler::new(Arc::clone(&state));
        let mut scheduled_today = HashMap::new();

        scheduler.check_and_schedule(now, &mut scheduled_today).await.unwrap();
        scheduler.check_and_schedule(now, &mut scheduled_today).await.unwrap();

        let job = JobRepository::query_daily_summary(state.db.pool(), "user_1", now.date_naive())
            .await
            .unwrap();
        assert!(job.is_some());
        assert_eq!(scheduled_today.get("user_1"), Some(&now.date_naive()));
    }

    /// Outside the match window (wrong UTC hour), nothing is scheduled.
    #[tokio::test]
    async fn check_and_schedule_skips_users_outside_their_window() {
        let state = test_state().await;
        let mut prefs = Preferences::default_for("user_2");
        prefs.enable_daily_summary = true;
        prefs.summary_time_local = "09:00".to_string();
        prefs.timezone_offset_hours = -6;
        PrefStore::upsert(state.db.pool(), &prefs).await.unwrap();

        // UTC 16:02 is outside user_2's 15:00 UTC window.
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 16, 2, 0).unwrap();
        let scheduler = SummaryScheduler::new(Arc::clone(&state));
        let mut scheduled_today = HashMap::new();

        scheduler.check_and_schedule(now, &mut scheduled_today).await.unwrap();

        let job = JobRepository::query_daily_summary(state.db.pool(), "user_2", now.date_naive())
            .await
            .unwrap();
        assert!(job.is_none());
    }
}
