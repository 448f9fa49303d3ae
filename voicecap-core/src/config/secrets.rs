//! Secrets loaded exclusively from environment variables. Never written to
//! disk, never logged.

use std::env;

#[derive(Debug, Clone, Default)]
pub struct Secrets {
    /// SPEECH_API_KEY
    pub speech_api_key: Option<String>,
    /// SUMMARY_API_KEY
    pub summary_api_key: Option<String>,
    /// MAIL_SENDER
    pub mail_sender: Option<String>,
    /// MAIL_PROVIDER_API_KEY
    pub mail_provider_api_key: Option<String>,
    /// DATABASE_URL (falls back to a local sqlite file under the XDG data dir)
    pub database_url: Option<String>,
    /// BLOB_STORE_ROOT (local filesystem root for the BlobStore adapter)
    pub blob_store_root: Option<String>,
    /// Shared secret for the internal credit-grant endpoint (see SPEC_FULL §2.3)
    pub internal_grant_secret: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SecretsError {
    #[error("missing required secret: {0}")]
    MissingSecret(&'static str),
}

impl Secrets {
    pub fn from_env() -> Result<Self, SecretsError> {
        let _ = dotenvy::dotenv();
        Self::from_env_inner()
    }

    pub(crate) fn from_env_inner() -> Result<Self, SecretsError> {
        let secrets = Self {
            speech_api_key: env::var("SPEECH_API_KEY").ok(),
            summary_api_key: env::var("SUMMARY_API_KEY").ok(),
            mail_sender: env::var("MAIL_SENDER").ok(),
            mail_provider_api_key: env::var("MAIL_PROVIDER_API_KEY").ok(),
            database_url: env::var("DATABASE_URL").ok(),
            blob_store_root: env::var("BLOB_STORE_ROOT").ok(),
            internal_grant_secret: env::var("INTERNAL_GRANT_SECRET").ok(),
        };

        if secrets.speech_api_key.is_none() {
            return Err(SecretsError::MissingSecret("SPEECH_API_KEY"));
        }
        if secrets.summary_api_key.is_none() {
            return Err(SecretsError::MissingSecret("SUMMARY_API_KEY"));
        }
        if secrets.mail_sender.is_none() {
            return Err(SecretsError::MissingSecret("MAIL_SENDER"));
        }

        Ok(secrets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        unsafe {
            env::remove_var("SPEECH_API_KEY");
            env::remove_var("SUMMARY_API_KEY");
            env::remove_var("MAIL_SENDER");
        }
    }

    #[test]
    fn missing_required_secret_is_an_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        let result = Secrets::from_env_inner();
        assert!(matches!(result, Err(SecretsError::MissingSecret("SPEECH_API_KEY"))));
    }

    #[test]
    fn all_required_secrets_present_succeeds() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var("SPEECH_API_KEY", "sk-speech");
            env::set_var("SUMMARY_API_KEY", "sk-summary");
            env::set_var("MAIL_SENDER", "noreply@example.com");
        }
        let secrets = Secrets::from_env_inner().unwrap();
        assert_eq!(secrets.speech_api_key.as_deref(), Some("sk-speech"));
    }
}
