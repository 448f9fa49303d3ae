//! `GET /prefs`, `PUT /prefs` (spec §6, §3 `Preferences`).

use axum::Json;
use axum::extract::State;
use std::sync::Arc;

use voicecap_core::error::{CoreError, ErrorCategory};
use voicecap_db::{PrefStore, Preferences};

use crate::auth::Principal;
use crate::http::dto::{PreferencesResponse, PutPreferencesRequest};
use crate::http::error::ApiError;
use crate::state::AppState;

pub async fn get_prefs(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<PreferencesResponse>, ApiError> {
    let prefs = PrefStore::get(state.db.pool(), &principal.user_id)
        .await?
        .unwrap_or_else(|| Preferences::default_for(&principal.user_id));
    Ok(Json(prefs.into()))
}

pub async fn put_prefs(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(body): Json<PutPreferencesRequest>,
) -> Result<Json<PreferencesResponse>, ApiError> {
    validate_prefs(&body)?;

    let prefs = Preferences {
        user_id: principal.user_id.clone(),
        notification_email: body.notification_email,
        enable_daily_summary: body.enable_daily_summary,
        enable_transcription: body.enable_transcription,
        summary_time_local: body.summary_time_local,
        timezone_offset_hours: body.timezone_offset_hours,
        recording_max_duration_minutes: body.recording_max_duration_minutes,
    };
    PrefStore::upsert(state.db.pool(), &prefs).await?;
    Ok(Json(prefs.into()))
}

/// Spec §3 `Preferences`: `timezone_offset_hours` in −12..+14,
/// `recording_max_duration_minutes` in 15..180, `summary_time_local` is
/// `HH:MM` 24h.
fn validate_prefs(body: &PutPreferencesRequest) -> Result<(), ApiError> {
    if !(-12..=14).contains(&body.timezone_offset_hours) {
        return Err(invalid("timezone_offset_hours must be in -12..14"));
    }
    if !(15..=180).contains(&body.recording_max_duration_minutes) {
        return Err(invalid("recording_max_duration_minutes must be in 15..180"));
    }
    if chrono::NaiveTime::parse_from_str(&body.summary_time_local, "%H:%M").is_err() {
        return Err(invalid("summary_time_local must be HH:MM 24h"));
    }
    Ok(())
}

fn invalid(message: &str) -> ApiError {
    ApiError(CoreError::new(ErrorCategory::InvalidInput, message))
}
