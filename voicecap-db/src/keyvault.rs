//! KeyVault (spec §4.A): per-user 256-bit symmetric key storage.
//!
//! Keys are never logged and never cached beyond a single job's lifetime —
//! callers fetch fresh from here each time they need one.

use chrono::Utc;
use sqlx::SqlitePool;

use voicecap_crypto::SymmetricKey;

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct KeyRecord {
    pub user_id: String,
    pub created_at: chrono::DateTime<Utc>,
}

pub struct KeyVaultRepository;

impl KeyVaultRepository {
    pub async fn get_key(pool: &SqlitePool, user_id: &str) -> DbResult<SymmetricKey> {
        let bytes: Vec<u8> = sqlx::query_scalar("SELECT key_bytes FROM user_keys WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| DbError::KeyNotFound(user_id.to_string()))?;

        SymmetricKey::from_bytes(&bytes).map_err(|e| DbError::Serialization(e.to_string()))
    }

    /// Generates a fresh random key and stores it. Fails with
    /// `KeyAlreadyExists` if the user already has one (spec §4.A).
    pub async fn create_key(pool: &SqlitePool, user_id: &str) -> DbResult<()> {
        let existing = sqlx::query_scalar::<_, i64>("SELECT 1 FROM user_keys WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
        if existing.is_some() {
            return Err(DbError::KeyAlreadyExists(user_id.to_string()));
        }

        let key = SymmetricKey::generate();
        let result = sqlx::query(
            "INSERT INTO user_keys (user_id, key_bytes, created_at) VALUES (?, ?, ?)
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(key.as_bytes().as_slice())
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(())
        } else {
            Err(DbError::KeyAlreadyExists(user_id.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::create_test_pool;

    #[tokio::test]
    async fn get_key_before_creation_is_not_found() {
        let db = create_test_pool().await.unwrap();
        let err = KeyVaultRepository::get_key(db.pool(), "u1").await.unwrap_err();
        assert!(matches!(err, DbError::KeyNotFound(_)));
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        KeyVaultRepository::create_key(pool, "u1").await.unwrap();
        let key = KeyVaultRepository::get_key(pool, "u1").await.unwrap();
        assert_eq!(key.as_bytes().len(), 32);
    }

    #[tokio::test]
    async fn create_key_twice_is_already_exists() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        KeyVaultRepository::create_key(pool, "u1").await.unwrap();
        let err = KeyVaultRepository::create_key(pool, "u1").await.unwrap_err();
        assert!(matches!(err, DbError::KeyAlreadyExists(_)));
    }
}
