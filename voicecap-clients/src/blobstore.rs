//! BlobStore (spec §4.B): filesystem-backed opaque object storage.
//!
//! Keys use the layout `audio/{user_id}/{file_id}.enc` (spec §4.B). User
//! isolation is enforced by the caller verifying the key's embedded
//! `user_id` segment matches the authenticated principal before any call
//! here — this store itself trusts the key it is given.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;

use voicecap_core::error::{CoreError, ErrorCategory};

#[derive(Debug, thiserror::Error)]
pub enum BlobStoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("storage unavailable: {0}")]
    Unavailable(#[from] std::io::Error),
}

impl From<BlobStoreError> for CoreError {
    fn from(err: BlobStoreError) -> Self {
        let category = match &err {
            BlobStoreError::NotFound(_) => ErrorCategory::NotFound,
            BlobStoreError::Unavailable(_) => ErrorCategory::Unavailable,
        };
        CoreError::new(category, err.to_string())
    }
}

#[derive(Clone)]
pub struct BlobStore {
    root: PathBuf,
    upload_signing_secret: Vec<u8>,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>, upload_signing_secret: &[u8]) -> Self {
        Self {
            root: root.into(),
            upload_signing_secret: upload_signing_secret.to_vec(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>, BlobStoreError> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobStoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(BlobStoreError::Unavailable(e)),
        }
    }

    /// Idempotent by key: last write wins (spec §4.B).
    pub async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), BlobStoreError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }

    /// Emits a time-limited direct-upload URL: an HMAC-signed path with an
    /// expiry, in the style of a presigned object-storage URL.
    pub fn sign_for_upload(&self, key: &str, ttl_secs: u64) -> String {
        let expires_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock before epoch")
            .as_secs()
            + ttl_secs;

        let mut mac = Hmac::<Sha256>::new_from_slice(&self.upload_signing_secret)
            .expect("HMAC accepts any key length");
        mac.update(key.as_bytes());
        mac.update(expires_at.to_string().as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        format!("/presign/{key}?expires={expires_at}&sig={signature}")
    }

    pub fn key_for(user_id: &str, file_id: &str) -> String {
        format!("audio/{user_id}/{file_id}.enc")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path(), b"test-secret");
        let key = BlobStore::key_for("u1", "f1");

        store.put(&key, b"hello").await.unwrap();
        let bytes = store.get(&key).await.unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn get_missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path(), b"test-secret");
        let err = store.get("audio/u1/missing.enc").await.unwrap_err();
        assert!(matches!(err, BlobStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn put_twice_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path(), b"test-secret");
        let key = BlobStore::key_for("u1", "f1");

        store.put(&key, b"first").await.unwrap();
        store.put(&key, b"second").await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), b"second");
    }

    #[test]
    fn sign_for_upload_embeds_expiry_and_signature() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path(), b"test-secret");
        let url = store.sign_for_upload("audio/u1/f1.enc", 3600);
        assert!(url.starts_with("/presign/audio/u1/f1.enc?expires="));
        assert!(url.contains("&sig="));
    }
}
