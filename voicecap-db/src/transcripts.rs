//! TranscriptStore (spec §4.D): transcripts and encrypted daily summaries.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use voicecap_crypto::SymmetricKey;

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct Transcript {
    pub transcript_id: String,
    pub user_id: String,
    pub audio_file_id: String,
    pub text: String,
    pub duration_seconds: f64,
    pub blob_key: String,
    pub created_at: DateTime<Utc>,
}

impl Transcript {
    pub fn new(
        user_id: &str,
        audio_file_id: &str,
        text: &str,
        duration_seconds: f64,
        blob_key: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            transcript_id: format!("tx_{}", Uuid::new_v4()),
            user_id: user_id.to_string(),
            audio_file_id: audio_file_id.to_string(),
            text: text.to_string(),
            duration_seconds,
            blob_key: blob_key.to_string(),
            created_at,
        }
    }
}

/// The three categorized bullet lists (spec §3 `DailySummary`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryBody {
    pub family: Vec<String>,
    pub business: Vec<String>,
    pub misc: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DailySummary {
    pub summary_id: String,
    pub user_id: String,
    pub summary_date: NaiveDate,
    pub body: SummaryBody,
    pub created_at: DateTime<Utc>,
}

impl DailySummary {
    pub fn new(user_id: &str, summary_date: NaiveDate, body: SummaryBody, created_at: DateTime<Utc>) -> Self {
        Self {
            summary_id: format!("sum_{}", Uuid::new_v4()),
            user_id: user_id.to_string(),
            summary_date,
            body,
            created_at,
        }
    }
}

pub struct TranscriptRepository;

impl TranscriptRepository {
    pub async fn save_transcript(pool: &SqlitePool, transcript: &Transcript) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO transcripts (transcript_id, user_id, audio_file_id, text,
                                       duration_seconds, blob_key, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&transcript.transcript_id)
        .bind(&transcript.user_id)
        .bind(&transcript.audio_file_id)
        .bind(&transcript.text)
        .bind(transcript.duration_seconds.to_string())
        .bind(&transcript.blob_key)
        .bind(transcript.created_at.to_rfc3339())
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn list_transcripts(
        pool: &SqlitePool,
        user_id: &str,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> DbResult<Vec<Transcript>> {
        let rows = match range {
            Some((from, to)) => {
                sqlx::query_as::<_, TranscriptRow>(
                    "SELECT transcript_id, user_id, audio_file_id, text, duration_seconds,
                            blob_key, created_at
                     FROM transcripts
                     WHERE user_id = ? AND created_at >= ? AND created_at < ?
                     ORDER BY created_at DESC",
                )
                .bind(user_id)
                .bind(from.to_rfc3339())
                .bind(to.to_rfc3339())
                .fetch_all(pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, TranscriptRow>(
                    "SELECT transcript_id, user_id, audio_file_id, text, duration_seconds,
                            blob_key, created_at
                     FROM transcripts WHERE user_id = ? ORDER BY created_at DESC",
                )
                .bind(user_id)
                .fetch_all(pool)
                .await?
            }
        };

        rows.into_iter().map(Transcript::try_from).collect()
    }

    /// Encrypts `summary.body` under `key` before writing (spec §4.D).
    pub async fn save_summary(
        pool: &SqlitePool,
        summary: &DailySummary,
        key: &SymmetricKey,
    ) -> DbResult<()> {
        let plaintext = serde_json::to_vec(&summary.body)
            .map_err(|e| DbError::Serialization(e.to_string()))?;
        let body_encrypted = voicecap_crypto::encrypt(key, &plaintext)
            .map_err(|e| DbError::Serialization(e.to_string()))?;

        sqlx::query(
            "INSERT INTO daily_summaries (summary_id, user_id, summary_date, body_encrypted, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&summary.summary_id)
        .bind(&summary.user_id)
        .bind(summary.summary_date.to_string())
        .bind(&body_encrypted)
        .bind(summary.created_at.to_rfc3339())
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn get_summary(
        pool: &SqlitePool,
        user_id: &str,
        date: NaiveDate,
        key: &SymmetricKey,
    ) -> DbResult<DailySummary> {
        let row = sqlx::query_as::<_, SummaryRow>(
            "SELECT summary_id, user_id, summary_date, body_encrypted, created_at
             FROM daily_summaries WHERE user_id = ? AND summary_date = ?",
        )
        .bind(user_id)
        .bind(date.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::SummaryNotFound(format!("{user_id}/{date}")))?;

        decrypt_summary_row(row, key)
    }

    pub async fn list_summaries(
        pool: &SqlitePool,
        user_id: &str,
        limit: i64,
        key: &SymmetricKey,
    ) -> DbResult<Vec<DailySummary>> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            "SELECT summary_id, user_id, summary_date, body_encrypted, created_at
             FROM daily_summaries WHERE user_id = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(|row| decrypt_summary_row(row, key)).collect()
    }

    /// Ownership-checked delete (spec §4.D).
    pub async fn delete_summary(pool: &SqlitePool, user_id: &str, summary_id: &str) -> DbResult<()> {
        let owner = sqlx::query_scalar::<_, String>(
            "SELECT user_id FROM daily_summaries WHERE summary_id = ?",
        )
        .bind(summary_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::SummaryNotFound(summary_id.to_string()))?;

        if owner != user_id {
            return Err(DbError::Forbidden);
        }

        sqlx::query("DELETE FROM daily_summaries WHERE summary_id = ?")
            .bind(summary_id)
            .execute(pool)
            .await?;
        Ok(())
    }
}

fn decrypt_summary_row(row: SummaryRow, key: &SymmetricKey) -> DbResult<DailySummary> {
    let plaintext = voicecap_crypto::decrypt(key, &row.body_encrypted)
        .map_err(|e| DbError::Serialization(e.to_string()))?;
    let body: SummaryBody =
        serde_json::from_slice(&plaintext).map_err(|e| DbError::Serialization(e.to_string()))?;

    Ok(DailySummary {
        summary_id: row.summary_id,
        user_id: row.user_id,
        summary_date: NaiveDate::parse_from_str(&row.summary_date, "%Y-%m-%d")
            .map_err(|e| DbError::Serialization(e.to_string()))?,
        body,
        created_at: DateTime::parse_from_rfc3339(&row.created_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| DbError::Serialization(e.to_string()))?,
    })
}

#[derive(Debug, sqlx::FromRow)]
struct TranscriptRow {
    transcript_id: String,
    user_id: String,
    audio_file_id: String,
    text: String,
    duration_seconds: String,
    blob_key: String,
    created_at: String,
}

impl TryFrom<TranscriptRow> for Transcript {
    type Error = DbError;

    fn try_from(row: TranscriptRow) -> Result<Self, Self::Error> {
        Ok(Transcript {
            transcript_id: row.transcript_id,
            user_id: row.user_id,
            audio_file_id: row.audio_file_id,
            text: row.text,
            duration_seconds: row
                .duration_seconds
                .parse()
                .map_err(|_| DbError::Serialization("invalid duration_seconds".to_string()))?,
            blob_key: row.blob_key,
            created_at: DateTime::parse_from_rfc3339(&row.created_at)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| DbError::Serialization(e.to_string()))?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    summary_id: String,
    user_id: String,
    summary_date: String,
    body_encrypted: Vec<u8>,
    created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::create_test_pool;

    #[tokio::test]
    async fn save_and_list_transcripts() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        let t = Transcript::new("u1", "f1", "hello world", 15.2, "audio/u1/f1.enc", Utc::now());
        TranscriptRepository::save_transcript(pool, &t).await.unwrap();

        let found = TranscriptRepository::list_transcripts(pool, "u1", None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "hello world");
    }

    #[tokio::test]
    async fn summary_round_trips_encrypted() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();
        let key = SymmetricKey::generate();

        let body = SummaryBody {
            family: vec!["called mom".to_string()],
            business: vec![],
            misc: vec!["walked the dog".to_string()],
        };
        let date = Utc::now().date_naive();
        let summary = DailySummary::new("u1", date, body, Utc::now());

        TranscriptRepository::save_summary(pool, &summary, &key).await.unwrap();
        let found = TranscriptRepository::get_summary(pool, "u1", date, &key).await.unwrap();
        assert_eq!(found.body.family, vec!["called mom".to_string()]);
        assert_eq!(found.body.misc, vec!["walked the dog".to_string()]);
    }

    #[tokio::test]
    async fn get_summary_with_wrong_key_fails_integrity() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();
        let key = SymmetricKey::generate();
        let wrong_key = SymmetricKey::generate();

        let date = Utc::now().date_naive();
        let summary = DailySummary::new("u1", date, SummaryBody::default(), Utc::now());
        TranscriptRepository::save_summary(pool, &summary, &key).await.unwrap();

        let err = TranscriptRepository::get_summary(pool, "u1", date, &wrong_key)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Serialization(_)));
    }

    #[tokio::test]
    async fn delete_summary_rejects_non_owner() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();
        let key = SymmetricKey::generate();

        let summary = DailySummary::new("owner", Utc::now().date_naive(), SummaryBody::default(), Utc::now());
        TranscriptRepository::save_summary(pool, &summary, &key).await.unwrap();

        let err = TranscriptRepository::delete_summary(pool, "intruder", &summary.summary_id)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Forbidden));

        TranscriptRepository::delete_summary(pool, "owner", &summary.summary_id)
            .await
            .unwrap();
    }
}
