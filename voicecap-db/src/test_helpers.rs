//! Test helpers for the VOICECAP database layer.

use crate::{db::DbPool, error::DbResult};

/// Create an in-memory VOICECAP database for testing, migrations applied.
pub async fn create_test_pool() -> DbResult<DbPool> {
    DbPool::new_in_memory().await
}
