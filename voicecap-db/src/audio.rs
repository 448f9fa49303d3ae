//! AudioObject storage, backing IngestAPI (spec §4.N). Immutable after
//! creation except for a soft `deleted_at` marker (spec §6 `DELETE /audio/{id}`
//! — "metadata only").

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct AudioObject {
    pub file_id: String,
    pub user_id: String,
    pub blob_key: String,
    pub size_bytes: i64,
    pub recorded_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl AudioObject {
    pub fn new(user_id: &str, blob_key: &str, size_bytes: i64, recorded_at: DateTime<Utc>) -> Self {
        Self {
            file_id: format!("aud_{}", Uuid::new_v4()),
            user_id: user_id.to_string(),
            blob_key: blob_key.to_string(),
            size_bytes,
            recorded_at,
            received_at: Utc::now(),
            deleted_at: None,
        }
    }
}

pub struct AudioRepository;

impl AudioRepository {
    pub async fn insert(pool: &SqlitePool, audio: &AudioObject) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO audio_objects (file_id, user_id, blob_key, size_bytes, recorded_at, received_at, deleted_at)
             VALUES (?, ?, ?, ?, ?, ?, NULL)",
        )
        .bind(&audio.file_id)
        .bind(&audio.user_id)
        .bind(&audio.blob_key)
        .bind(audio.size_bytes)
        .bind(audio.recorded_at.to_rfc3339())
        .bind(audio.received_at.to_rfc3339())
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn get_by_id(pool: &SqlitePool, file_id: &str) -> DbResult<AudioObject> {
        let row = sqlx::query_as::<_, AudioRow>(
            "SELECT file_id, user_id, blob_key, size_bytes, recorded_at, received_at, deleted_at
             FROM audio_objects WHERE file_id = ?",
        )
        .bind(file_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::AudioNotFound(file_id.to_string()))?;

        AudioObject::try_from(row)
    }

    pub async fn list_by_user(pool: &SqlitePool, user_id: &str) -> DbResult<Vec<AudioObject>> {
        let rows = sqlx::query_as::<_, AudioRow>(
            "SELECT file_id, user_id, blob_key, size_bytes, recorded_at, received_at, deleted_at
             FROM audio_objects WHERE user_id = ? AND deleted_at IS NULL ORDER BY received_at DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(AudioObject::try_from).collect()
    }

    /// Ownership-checked soft delete (spec §6 `DELETE /audio/{file_id}`: 403
    /// if not owner).
    pub async fn delete(pool: &SqlitePool, user_id: &str, file_id: &str) -> DbResult<()> {
        let owner = sqlx::query_scalar::<_, String>(
            "SELECT user_id FROM audio_objects WHERE file_id = ?",
        )
        .bind(file_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::AudioNotFound(file_id.to_string()))?;

        if owner != user_id {
            return Err(DbError::Forbidden);
        }

        sqlx::query("UPDATE audio_objects SET deleted_at = ? WHERE file_id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(file_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Audio objects with no corresponding Transcription job — the rare,
    /// harmless leak spec §4.N step 3 calls out when `RegisterAudio` fails
    /// after persisting the AudioObject but before inserting the job.
    /// Backs the optional orphan-audio reconciliation sweep (SPEC_FULL §2).
    pub async fn list_orphans(pool: &SqlitePool, older_than: DateTime<Utc>) -> DbResult<Vec<AudioObject>> {
        let rows = sqlx::query_as::<_, AudioRow>(
            "SELECT a.file_id, a.user_id, a.blob_key, a.size_bytes, a.recorded_at, a.received_at, a.deleted_at
             FROM audio_objects a
             WHERE a.deleted_at IS NULL
               AND a.received_at < ?
               AND NOT EXISTS (SELECT 1 FROM jobs j WHERE j.audio_file_id = a.file_id)",
        )
        .bind(older_than.to_rfc3339())
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(AudioObject::try_from).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AudioRow {
    file_id: String,
    user_id: String,
    blob_key: String,
    size_bytes: i64,
    recorded_at: String,
    received_at: String,
    deleted_at: Option<String>,
}

impl TryFrom<AudioRow> for AudioObject {
    type Error = DbError;

    fn try_from(row: AudioRow) -> Result<Self, Self::Error> {
        let parse = |s: &str| {
            DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| DbError::Serialization(format!("bad timestamp {s}: {e}")))
        };
        Ok(AudioObject {
            file_id: row.file_id,
            user_id: row.user_id,
            blob_key: row.blob_key,
            size_bytes: row.size_bytes,
            recorded_at: parse(&row.recorded_at)?,
            received_at: parse(&row.received_at)?,
            deleted_at: row.deleted_at.map(|s| parse(&s)).transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::create_test_pool;

    #[tokio::test]
    async fn insert_and_get_by_id() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        let audio = AudioObject::new("u1", "audio/u1/f1.enc", 1024, Utc::now());
        AudioRepository::insert(pool, &audio).await.unwrap();

        let found = AudioRepository::get_by_id(pool, &audio.file_id).await.unwrap();
        assert_eq!(found.size_bytes, 1024);
    }

    #[tokio::test]
    async fn register_twice_with_same_blob_key_yields_two_objects() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        let a = AudioObject::new("u1", "audio/u1/k.enc", 100, Utc::now());
        let b = AudioObject::new("u1", "audio/u1/k.enc", 100, Utc::now());
        AudioRepository::insert(pool, &a).await.unwrap();
        AudioRepository::insert(pool, &b).await.unwrap();

        let found = AudioRepository::list_by_user(pool, "u1").await.unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn delete_rejects_non_owner() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        let audio = AudioObject::new("owner", "audio/owner/f1.enc", 10, Utc::now());
        AudioRepository::insert(pool, &audio).await.unwrap();

        let err = AudioRepository::delete(pool, "intruder", &audio.file_id).await.unwrap_err();
        assert!(matches!(err, DbError::Forbidden));

        AudioRepository::delete(pool, "owner", &audio.file_id).await.unwrap();
        let remaining = AudioRepository::list_by_user(pool, "owner").await.unwrap();
        assert!(remaining.is_empty());
    }
}
