//! `/audio` — IngestAPI (spec §4.N) plus the read/delete paths from §6.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use std::sync::Arc;

use voicecap_core::error::CoreError;
use voicecap_core::money::{Service, Unit};
use voicecap_db::{AudioObject, AudioRepository, Job, JobRepository, LedgerRepository};

use crate::auth::Principal;
use crate::http::dto::{AudioResponse, RegisterAudioRequest};
use crate::http::error::ApiError;
use crate::state::AppState;

/// `POST /audio` — register a freshly uploaded object and enqueue a
/// Transcription job. Effects happen in the order spec §4.N lists: a
/// failure after persisting the AudioObject leaves a rare, harmless orphan
/// (reconciled by the optional sweep in `retention.rs`).
pub async fn register_audio(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(body): Json<RegisterAudioRequest>,
) -> Result<Json<AudioResponse>, ApiError> {
    let expected_prefix = format!("audio/{}/", principal.user_id);
    if !body.blob_key.starts_with(&expected_prefix) {
        return Err(ApiError(CoreError::new(
            voicecap_core::error::ErrorCategory::Forbidden,
            "blob_key does not belong to the caller",
        )));
    }

    let audio = AudioObject::new(
        &principal.user_id,
        &body.blob_key,
        body.size_bytes,
        body.recorded_at,
    );
    AudioRepository::insert(state.db.pool(), &audio).await?;

    let gb = Decimal::from(body.size_bytes.max(0)) / Decimal::from(1_000_000_000i64);
    LedgerRepository::charge(
        state.db.pool(),
        &principal.user_id,
        Service::ObjectStorage,
        "upload",
        gb,
        Unit::Gb,
        state.seed_grant_usd,
    )
    .await
    .map_err(CoreError::from)?;

    let job = Job::new_transcription(
        &principal.user_id,
        &audio.file_id,
        &audio.blob_key,
        audio.recorded_at,
    );
    JobRepository::insert(state.db.pool(), &job).await?;

    Ok(Json(audio.into()))
}

pub async fn list_audio(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<Vec<AudioResponse>>, ApiError> {
    let objects = AudioRepository::list_by_user(state.db.pool(), &principal.user_id).await?;
    Ok(Json(objects.into_iter().map(AudioResponse::from).collect()))
}

pub async fn get_audio(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(file_id): Path<String>,
) -> Result<Json<AudioResponse>, ApiError> {
    let audio = AudioRepository::get_by_id(state.db.pool(), &file_id).await?;
    if audio.user_id != principal.user_id {
        return Err(ApiError(CoreError::new(
            voicecap_core::error::ErrorCategory::Forbidden,
            "not the owner of this audio object",
        )));
    }
    Ok(Json(audio.into()))
}

pub async fn delete_audio(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(file_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    AudioRepository::delete(state.db.pool(), &principal.user_id, &file_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
