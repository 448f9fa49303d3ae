//! Transcription dispatch (spec §4.L "Dispatch by kind" — Transcription
//! job): B→K→G→H→D and a KeyVault + Speech charge against F.

use std::sync::Arc;

use rust_decimal::Decimal;

use voicecap_core::error::{CoreError, CoreResult, ErrorCategory};
use voicecap_core::money::{Service, Unit};
use voicecap_db::{AudioRepository, Job, KeyVaultRepository, LedgerRepository, PrefStore, Preferences, TranscriptRepository};
use voicecap_db::transcripts::Transcript;

use crate::state::AppState;

/// ffmpeg demuxer name for the container client apps upload in. Not
/// currently tracked per-`AudioObject`, so every upload is assumed to be
/// this container until the ingest path grows a stored format field.
const SOURCE_FORMAT_HINT: &str = "matroska";
const CANONICAL_CODEC_HINT: &str = "opus";

pub async fn process(state: &Arc<AppState>, job: &Job) -> CoreResult<()> {
    let pool = state.db.pool();
    let tunables = state.tunables;

    let audio_file_id = job.audio_file_id.as_deref().ok_or_else(|| {
        CoreError::new(
            ErrorCategory::IntegrityFailure,
            "transcription job missing audio_file_id",
        )
    })?;

    let audio = AudioRepository::get_by_id(pool, audio_file_id).await?;

    if audio.size_bytes > tunables.max_file_size_bytes {
        return Err(CoreError::new(ErrorCategory::IntegrityFailure, "audio too large"));
    }

    let prefs = PrefStore::get(pool, &job.user_id)
        .await?
        .unwrap_or_else(|| Preferences::default_for(&job.user_id));
    if !prefs.enable_transcription {
        return Ok(());
    }

    if !LedgerRepository::has_credit(pool, &job.user_id, state.seed_grant_usd).await? {
        return Err(CoreError::new(ErrorCategory::InsufficientCredit, "insufficient credit"));
    }

    let encrypted = state.blobstore.get(&audio.blob_key).await?;

    let key = KeyVaultRepository::get_key(pool, &job.user_id).await?;
    LedgerRepository::charge(
        pool,
        &job.user_id,
        Service::KeyVault,
        "retrieve",
        Decimal::ONE,
        Unit::Secret,
        state.seed_grant_usd,
    )
    .await?;

    let plaintext = voicecap_crypto::decrypt(&key, &encrypted).map_err(|_| {
        CoreError::new(ErrorCategory::IntegrityFailure, "decryption failed")
    })?;

    let normalized = state
        .transcoder
        .normalize(&plaintext, SOURCE_FORMAT_HINT)
        .await?;

    let duration_secs = state.transcoder.duration_seconds(&normalized, true).await?;

    let user_max_secs = prefs.recording_max_duration_minutes as f64 * 60.0;
    let effective_max_secs = tunables.max_duration_secs.min(user_max_secs);
    if duration_secs < tunables.min_duration_secs || duration_secs > effective_max_secs {
        return Ok(());
    }

    let text = state
        .speech
        .transcribe(&normalized, CANONICAL_CODEC_HINT)
        .await?;

    let duration_minutes = Decimal::try_from(duration_secs / 60.0)
        .map_err(|_| CoreError::new(ErrorCategory::InvalidInput, "invalid duration"))?;
    LedgerRepository::charge(
        pool,
        &job.user_id,
        Service::Speech,
        "transcribe",
        duration_minutes,
        Unit::Minute,
        state.seed_grant_usd,
    )
    .await?;

    let transcript = Transcript::new(
        &job.user_id,
        audio_file_id,
        &text,
        duration_secs,
        &audio.blob_key,
        chrono::Utc::now(),
    );
    TranscriptRepository::save_transcript(pool, &transcript).await?;

    Ok(())
}
