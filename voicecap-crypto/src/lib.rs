//! CryptoCore (spec §4.K): authenticated symmetric decrypt/encrypt of a
//! buffer under a per-user 256-bit key.
//!
//! Wire format: `IV (16 bytes) || ciphertext || tag (16 bytes)`,
//! AES-256-GCM, 128-bit tag, empty AAD.
//!
//! The 16-byte nonce is the contract, not the RustCrypto `Aes256Gcm`
//! alias's default 12-byte nonce — spec §4.K calls out a historical bug
//! in the source system caused by exactly this mismatch, so we parameterize
//! the cipher explicitly over a 16-byte nonce rather than reach for the
//! convenience alias.

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::generic_array::typenum::U16;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{AesGcm, aes::Aes256};
use rand::RngCore;

type Cipher = AesGcm<Aes256, U16>;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 16;
pub const TAG_LEN: usize = 16;
const MIN_BLOB_LEN: usize = NONCE_LEN + TAG_LEN;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("key must be exactly {KEY_LEN} bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("ciphertext blob too short: got {0} bytes, need at least {MIN_BLOB_LEN}")]
    BlobTooShort(usize),
    #[error("integrity check failed: tag verification or decryption error")]
    IntegrityFailure,
}

/// A validated 256-bit symmetric key. Deliberately does not derive
/// `Debug` — a stray `{:?}` on key material would otherwise be a silent
/// leak path into logs.
#[derive(Clone)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != KEY_LEN {
            return Err(CryptoError::InvalidKeyLength(bytes.len()));
        }
        let mut arr = [0u8; KEY_LEN];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Generate a cryptographically random key (KeyVault.CreateKey).
    pub fn generate() -> Self {
        let mut arr = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut arr);
        Self(arr)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

/// Encrypt `plaintext` under `key`, returning `IV || ciphertext || tag`.
/// A fresh random 16-byte IV is generated per call.
pub fn encrypt(key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher =
        Cipher::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::IntegrityFailure)?;

    let mut iv = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut iv);
    let nonce = GenericArray::from_slice(&iv);

    let mut ciphertext_and_tag = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::IntegrityFailure)?;

    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext_and_tag.len());
    blob.extend_from_slice(&iv);
    blob.append(&mut ciphertext_and_tag);
    Ok(blob)
}

/// Decrypt a `IV || ciphertext || tag` blob under `key`. Any tag mismatch
/// or undersized blob surfaces as [`CryptoError::IntegrityFailure`] — the
/// JobProcessor treats this as permanent, non-retryable (spec §4.L step 7).
pub fn decrypt(key: &SymmetricKey, blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if blob.len() < MIN_BLOB_LEN {
        return Err(CryptoError::BlobTooShort(blob.len()));
    }

    let (iv, ciphertext_and_tag) = blob.split_at(NONCE_LEN);
    let cipher =
        Cipher::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::IntegrityFailure)?;
    let nonce = GenericArray::from_slice(iv);

    cipher
        .decrypt(nonce, ciphertext_and_tag)
        .map_err(|_| CryptoError::IntegrityFailure)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_up_to_five_megabytes() {
        let key = SymmetricKey::generate();
        for len in [0usize, 1, 4096, 5 * 1024 * 1024] {
            let plaintext = vec![0xab; len];
            let blob = encrypt(&key, &plaintext).unwrap();
            let recovered = decrypt(&key, &blob).unwrap();
            assert_eq!(recovered, plaintext);
        }
    }

    #[test]
    fn flipping_a_ciphertext_byte_fails_integrity() {
        let key = SymmetricKey::generate();
        let mut blob = encrypt(&key, b"hello world").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;
        assert!(matches!(
            decrypt(&key, &blob),
            Err(CryptoError::IntegrityFailure)
        ));
    }

    #[test]
    fn flipping_the_tag_fails_integrity() {
        let key = SymmetricKey::generate();
        let mut blob = encrypt(&key, b"hello world").unwrap();
        let tag_start = blob.len() - TAG_LEN;
        blob[tag_start] ^= 0x01;
        assert!(matches!(
            decrypt(&key, &blob),
            Err(CryptoError::IntegrityFailure)
        ));
    }

    #[test]
    fn blob_of_31_bytes_is_too_short_not_a_decryption_error() {
        let key = SymmetricKey::generate();
        let blob = vec![0u8; 31];
        assert!(matches!(
            decrypt(&key, &blob),
            Err(CryptoError::BlobTooShort(31))
        ));
    }

    #[test]
    fn blob_of_exactly_32_bytes_is_accepted_for_length_but_fails_tag() {
        let key = SymmetricKey::generate();
        let blob = vec![0u8; 32];
        // Length check passes; garbage ciphertext/tag still fails integrity.
        assert!(matches!(
            decrypt(&key, &blob),
            Err(CryptoError::IntegrityFailure)
        ));
    }

    #[test]
    fn wrong_key_fails_integrity() {
        let key = SymmetricKey::generate();
        let other = SymmetricKey::generate();
        let blob = encrypt(&key, b"secret payload").unwrap();
        assert!(matches!(
            decrypt(&other, &blob),
            Err(CryptoError::IntegrityFailure)
        ));
    }

    #[test]
    fn rejects_keys_that_are_not_32_bytes() {
        assert!(matches!(
            SymmetricKey::from_bytes(&[0u8; 16]),
            Err(CryptoError::InvalidKeyLength(16))
        ));
    }
}
