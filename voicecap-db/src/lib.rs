//! voicecap-db: SQLite-backed storage for jobs, preferences, transcripts,
//! summaries, the usage ledger, per-user encryption keys, and ingested
//! audio objects.
//!
//! Every repository takes `&SqlitePool` directly rather than wrapping it
//! in a higher-level connection object, following the one-struct-per-table
//! pattern: a thin static-method API, no shared mutable state beyond the
//! pool itself.

pub mod audio;
pub mod db;
pub mod error;
pub mod jobs;
pub mod keyvault;
pub mod ledger;
pub mod prefs;
pub mod transcripts;

pub use audio::{AudioObject, AudioRepository};
pub use db::DbPool;
pub use error::{DbError, DbResult};
pub use jobs::{Job, JobPatch, JobRepository};
pub use keyvault::{KeyRecord, KeyVaultRepository};
pub use ledger::{CreditAccount, LedgerRepository, UsageRecord};
pub use prefs::{PrefStore, Preferences};
pub use transcripts::{DailySummary, Transcript, TranscriptRepository};

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
