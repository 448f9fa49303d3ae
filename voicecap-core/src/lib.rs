//! voicecap-core: shared configuration, error taxonomy, domain types, and
//! time/money primitives used by every other voicecap crate.

pub mod config;
pub mod domain;
pub mod error;
pub mod money;
pub mod time;

pub use config::{Config, ConfigError, Secrets, SecretsError, Settings, SettingsError, Tunables};
pub use domain::{JobKind, JobStatus};
pub use error::{CoreError, CoreResult};
pub use money::{Rate, Service, Unit, round_half_even};
pub use time::normalize_utc;
