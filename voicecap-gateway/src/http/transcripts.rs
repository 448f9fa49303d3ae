//! `GET /transcripts` (spec §6).

use axum::Json;
use axum::extract::State;
use std::sync::Arc;

use voicecap_db::TranscriptRepository;

use crate::auth::Principal;
use crate::http::dto::TranscriptResponse;
use crate::http::error::ApiError;
use crate::state::AppState;

pub async fn list_transcripts(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<Vec<TranscriptResponse>>, ApiError> {
    let transcripts =
        TranscriptRepository::list_transcripts(state.db.pool(), &principal.user_id, None).await?;
    Ok(Json(
        transcripts.into_iter().map(TranscriptResponse::from).collect(),
    ))
}
