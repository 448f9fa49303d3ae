//! PrefStore (spec §4.E): per-user preferences.

use sqlx::SqlitePool;

use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct Preferences {
    pub user_id: String,
    pub notification_email: Option<String>,
    pub enable_daily_summary: bool,
    pub enable_transcription: bool,
    pub summary_time_local: String,
    pub timezone_offset_hours: i32,
    pub recording_max_duration_minutes: i32,
}

impl Preferences {
    pub fn default_for(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            notification_email: None,
            enable_daily_summary: false,
            enable_transcription: true,
            summary_time_local: "09:00".to_string(),
            timezone_offset_hours: 0,
            recording_max_duration_minutes: 60,
        }
    }
}

pub struct PrefStore;

impl PrefStore {
    pub async fn get(pool: &SqlitePool, user_id: &str) -> DbResult<Option<Preferences>> {
        let row = sqlx::query_as::<_, PrefRow>(
            "SELECT user_id, notification_email, enable_daily_summary, enable_transcription,
                    summary_time_local, timezone_offset_hours, recording_max_duration_minutes
             FROM preferences WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(Preferences::from))
    }

    pub async fn upsert(pool: &SqlitePool, prefs: &Preferences) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO preferences (user_id, notification_email, enable_daily_summary,
                                       enable_transcription, summary_time_local,
                                       timezone_offset_hours, recording_max_duration_minutes)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (user_id) DO UPDATE SET
                 notification_email = excluded.notification_email,
                 enable_daily_summary = excluded.enable_daily_summary,
                 enable_transcription = excluded.enable_transcription,
                 summary_time_local = excluded.summary_time_local,
                 timezone_offset_hours = excluded.timezone_offset_hours,
                 recording_max_duration_minutes = excluded.recording_max_duration_minutes",
        )
        .bind(&prefs.user_id)
        .bind(&prefs.notification_email)
        .bind(prefs.enable_daily_summary)
        .bind(prefs.enable_transcription)
        .bind(&prefs.summary_time_local)
        .bind(prefs.timezone_offset_hours)
        .bind(prefs.recording_max_duration_minutes)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Scanned by the scheduler (spec §4.M step 1). May be paged by callers
    /// with many users; returns the full set here since the processor is
    /// expected to run against a single-tenant-scale dataset.
    pub async fn list_with_daily_summary_enabled(pool: &SqlitePool) -> DbResult<Vec<Preferences>> {
        let rows = sqlx::query_as::<_, PrefRow>(
            "SELECT user_id, notification_email, enable_daily_summary, enable_transcription,
                    summary_time_local, timezone_offset_hours, recording_max_duration_minutes
             FROM preferences WHERE enable_daily_summary = 1",
        )
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(Preferences::from).collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PrefRow {
    user_id: String,
    notification_email: Option<String>,
    enable_daily_summary: bool,
    enable_transcription: bool,
    summary_time_local: String,
    timezone_offset_hours: i64,
    recording_max_duration_minutes: i64,
}

impl From<PrefRow> for Preferences {
    fn from(row: PrefRow) -> Self {
        Preferences {
            user_id: row.user_id,
            notification_email: row.notification_email,
            enable_daily_summary: row.enable_daily_summary,
            enable_transcription: row.enable_transcription,
            summary_time_local: row.summary_time_local,
            timezone_offset_hours: row.timezone_offset_hours as i32,
            recording_max_duration_minutes: row.recording_max_duration_minutes as i32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::create_test_pool;

    #[tokio::test]
    async fn get_returns_none_when_absent() {
        let db = create_test_pool().await.unwrap();
        assert!(PrefStore::get(db.pool(), "u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        let mut prefs = Preferences::default_for("u1");
        prefs.notification_email = Some("u1@example.com".to_string());
        prefs.enable_daily_summary = true;
        prefs.summary_time_local = "09:00".to_string();
        prefs.timezone_offset_hours = -6;

        PrefStore::upsert(pool, &prefs).await.unwrap();
        let found = PrefStore::get(pool, "u1").await.unwrap().unwrap();
        assert_eq!(found.notification_email.as_deref(), Some("u1@example.com"));
        assert!(found.enable_daily_summary);
        assert_eq!(found.timezone_offset_hours, -6);

        // Second upsert overwrites, does not duplicate.
        prefs.enable_daily_summary = false;
        PrefStore::upsert(pool, &prefs).await.unwrap();
        let found = PrefStore::get(pool, "u1").await.unwrap().unwrap();
        assert!(!found.enable_daily_summary);
    }

    #[tokio::test]
    async fn list_with_daily_summary_enabled_filters() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        let mut enabled = Preferences::default_for("enabled_user");
        enabled.enable_daily_summary = true;
        let disabled = Preferences::default_for("disabled_user");

        PrefStore::upsert(pool, &enabled).await.unwrap();
        PrefStore::upsert(pool, &disabled).await.unwrap();

        let matches = PrefStore::list_with_daily_summary_enabled(pool).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].user_id, "enabled_user");
    }
}
