//! Non-sensitive settings loaded from a TOML file
//! (`~/.config/voicecap/config.toml`), created with defaults on first run.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub gateway: GatewaySettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub mailer: MailerSettings,
    #[serde(default)]
    pub speech: ExternalApiSettings,
    #[serde(default)]
    pub summary: ExternalApiSettings,
    #[serde(default)]
    pub tunables: Tunables,
    /// File holding the daily-summary LLM prompt template
    /// (`DAILY_SUMMARY_PROMPT_PATH`). A missing file is a fatal bootstrap
    /// error (spec §6 "Exit codes").
    pub daily_summary_prompt_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewaySettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4600
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MailerSettings {
    /// `transactional_api` or `smtp` (spec §6 `MAIL_PROVIDER`).
    #[serde(default = "default_mail_provider")]
    pub provider: String,
    #[serde(default = "default_mail_base_url")]
    pub base_url: String,
}

impl Default for MailerSettings {
    fn default() -> Self {
        Self {
            provider: default_mail_provider(),
            base_url: default_mail_base_url(),
        }
    }
}

fn default_mail_provider() -> String {
    "transactional_api".to_string()
}

fn default_mail_base_url() -> String {
    "https://api.mail.example.com".to_string()
}

/// Base URL for an outbound HTTP API collaborator (speech-to-text or
/// summarization). Mirrors `MailerSettings`'s shape so every external
/// client is configured the same way.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExternalApiSettings {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
}

impl Default for ExternalApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.example.com".to_string()
}

/// Every timing/limit constant from spec §5, with the defaults from that
/// table. Overridable via the TOML file so operators can tune without a
/// rebuild.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct Tunables {
    #[serde(default = "d_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "d_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    #[serde(default = "d_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "d_retry_backoff_secs")]
    pub retry_backoff_secs: i64,
    #[serde(default = "d_processing_timeout_secs")]
    pub processing_timeout_secs: i64,
    #[serde(default = "d_job_max_age_secs")]
    pub job_max_age_secs: i64,
    #[serde(default = "d_max_file_size_bytes")]
    pub max_file_size_bytes: i64,
    #[serde(default = "d_min_duration_secs")]
    pub min_duration_secs: f64,
    #[serde(default = "d_max_duration_secs")]
    pub max_duration_secs: f64,
    #[serde(default = "d_sched_tick_secs")]
    pub sched_tick_secs: u64,
    #[serde(default = "d_sched_check_interval_secs")]
    pub sched_check_interval_secs: i64,
    #[serde(default = "d_sched_match_window_secs")]
    pub sched_match_window_secs: i64,
    #[serde(default = "d_rate_limit_transcribe_per_minute")]
    pub rate_limit_transcribe_per_minute: u32,
    #[serde(default = "d_job_retention_days")]
    pub job_retention_days: i64,
    #[serde(default)]
    pub reconcile_orphan_audio: bool,
    #[serde(default = "d_seed_grant_usd")]
    pub seed_grant_usd: f64,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            poll_interval_secs: d_poll_interval_secs(),
            max_concurrent_jobs: d_max_concurrent_jobs(),
            max_attempts: d_max_attempts(),
            retry_backoff_secs: d_retry_backoff_secs(),
            processing_timeout_secs: d_processing_timeout_secs(),
            job_max_age_secs: d_job_max_age_secs(),
            max_file_size_bytes: d_max_file_size_bytes(),
            min_duration_secs: d_min_duration_secs(),
            max_duration_secs: d_max_duration_secs(),
            sched_tick_secs: d_sched_tick_secs(),
            sched_check_interval_secs: d_sched_check_interval_secs(),
            sched_match_window_secs: d_sched_match_window_secs(),
            rate_limit_transcribe_per_minute: d_rate_limit_transcribe_per_minute(),
            job_retention_days: d_job_retention_days(),
            reconcile_orphan_audio: false,
            seed_grant_usd: d_seed_grant_usd(),
        }
    }
}

fn d_poll_interval_secs() -> u64 {
    30
}
fn d_max_concurrent_jobs() -> usize {
    4
}
fn d_max_attempts() -> u32 {
    3
}
fn d_retry_backoff_secs() -> i64 {
    600
}
fn d_processing_timeout_secs() -> i64 {
    300
}
fn d_job_max_age_secs() -> i64 {
    86_400
}
fn d_max_file_size_bytes() -> i64 {
    5 * 1024 * 1024
}
fn d_min_duration_secs() -> f64 {
    1.0
}
fn d_max_duration_secs() -> f64 {
    60.0
}
fn d_sched_tick_secs() -> u64 {
    30
}
fn d_sched_check_interval_secs() -> i64 {
    300
}
fn d_sched_match_window_secs() -> i64 {
    300
}
fn d_rate_limit_transcribe_per_minute() -> u32 {
    5
}
fn d_job_retention_days() -> i64 {
    30
}
fn d_seed_grant_usd() -> f64 {
    5.0
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize default settings: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write default settings file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config directory not found")]
    NoConfigDir,
}

impl Settings {
    pub fn config_path() -> Result<PathBuf, SettingsError> {
        let dir = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
        Ok(dir.join("voicecap").join("config.toml"))
    }

    /// Load settings from the TOML file, scaffolding one with every default
    /// except `daily_summary_prompt_path` (which has no safe default) on
    /// first run, then failing fast so the operator fills it in (spec §6
    /// "Exit codes").
    pub fn load() -> Result<Self, SettingsError> {
        let path = Self::config_path()?;

        if !path.exists() {
            Self::scaffold(&path)?;
            return Err(SettingsError::Read {
                path,
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no config.toml found; wrote a scaffold with daily_summary_prompt_path left blank",
                ),
            });
        }

        let raw = fs::read_to_string(&path).map_err(|source| SettingsError::Read {
            path: path.clone(),
            source,
        })?;

        let settings: Settings = toml::from_str(&raw)?;
        Ok(settings)
    }

    fn scaffold(path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }

        let defaults = Settings {
            gateway: GatewaySettings::default(),
            logging: LoggingSettings::default(),
            mailer: MailerSettings::default(),
            speech: ExternalApiSettings::default(),
            summary: ExternalApiSettings::default(),
            tunables: Tunables::default(),
            daily_summary_prompt_path: PathBuf::new(),
        };
        let raw = toml::to_string_pretty(&defaults)?;

        fs::write(path, raw).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.gateway.host, self.gateway.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tunables_defaults_match_spec_table() {
        let t = Tunables::default();
        assert_eq!(t.poll_interval_secs, 30);
        assert_eq!(t.max_concurrent_jobs, 4);
        assert_eq!(t.max_attempts, 3);
        assert_eq!(t.retry_backoff_secs, 600);
        assert_eq!(t.processing_timeout_secs, 300);
        assert_eq!(t.job_max_age_secs, 86_400);
        assert_eq!(t.max_file_size_bytes, 5 * 1024 * 1024);
        assert_eq!(t.sched_match_window_secs, 300);
        assert_eq!(t.rate_limit_transcribe_per_minute, 5);
    }

    #[test]
    fn parses_minimal_toml() {
        let toml_str = r#"
            daily_summary_prompt_path = "/tmp/prompt.txt"
        "#;
        let settings: Settings = toml::from_str(toml_str).unwrap();
        assert_eq!(settings.gateway.port, 4600);
        assert_eq!(settings.tunables.max_attempts, 3);
    }
}
