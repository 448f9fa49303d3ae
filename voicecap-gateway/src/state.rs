//! Shared application state: one long-lived value holding the database
//! pool, every external collaborator client, and the immutable tunables —
//! passed explicitly to the HTTP router, the JobProcessor, and the
//! SummaryScheduler rather than reached for through a global (spec §9
//! "Ad-hoc module-level state").

use rust_decimal::Decimal;
use voicecap_clients::{Mailer, SpeechClient, SummaryClient, Transcoder};
use voicecap_core::config::Tunables;
use voicecap_db::DbPool;

pub struct AppState {
    pub db: DbPool,
    pub blobstore: voicecap_clients::BlobStore,
    pub transcoder: Transcoder,
    pub speech: SpeechClient,
    pub summary: SummaryClient,
    pub mailer: Mailer,
    pub tunables: Tunables,
    pub seed_grant_usd: Decimal,
    pub daily_summary_prompt: String,
    /// Shared-secret header value gating `POST /internal/credit/grant`
    /// (SPEC_FULL §2 supplemented feature 3): the seam the out-of-scope
    /// payment webhook would call.
    pub internal_grant_secret: String,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: DbPool,
        blobstore: voicecap_clients::BlobStore,
        transcoder: Transcoder,
        speech: SpeechClient,
        summary: SummaryClient,
        mailer: Mailer,
        tunables: Tunables,
        seed_grant_usd: Decimal,
        daily_summary_prompt: String,
        internal_grant_secret: String,
    ) -> Self {
        Self {
            db,
            blobstore,
            transcoder,
            speech,
            summary,
            mailer,
            tunables,
            seed_grant_usd,
            daily_summary_prompt,
            internal_grant_secret,
        }
    }
}
