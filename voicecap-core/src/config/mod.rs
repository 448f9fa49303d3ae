//! Configuration: secrets (env-only) combined with settings (TOML file)
//! into one immutable record injected into each component at
//! construction. Read once at startup (spec §9 design note).

mod secrets;
mod settings;

pub use secrets::{Secrets, SecretsError};
pub use settings::{
    ExternalApiSettings, GatewaySettings, LoggingSettings, MailerSettings, Settings, SettingsError, Tunables,
};

use std::path::Path;

#[derive(Debug, Clone)]
pub struct Config {
    pub secrets: Secrets,
    pub settings: Settings,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("secrets error: {0}")]
    Secrets(#[from] SecretsError),
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("daily summary prompt file not found: {0}")]
    PromptMissing(String),
}

impl Config {
    /// Load configuration from all sources and fail fast if anything
    /// required is missing (spec §6 "Exit codes": non-zero on fatal init
    /// failure).
    pub fn load() -> Result<Self, ConfigError> {
        let secrets = Secrets::from_env()?;
        let settings = Settings::load()?;

        if !Path::new(&settings.daily_summary_prompt_path).is_file() {
            return Err(ConfigError::PromptMissing(
                settings.daily_summary_prompt_path.display().to_string(),
            ));
        }

        Ok(Self { secrets, settings })
    }

    pub fn bind_addr(&self) -> String {
        self.settings.bind_addr()
    }

    pub fn tunables(&self) -> Tunables {
        self.settings.tunables
    }
}

/// Load `.env` for local development convenience. Production deployments
/// should set real environment variables instead.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}
