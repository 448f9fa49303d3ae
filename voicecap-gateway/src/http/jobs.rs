//! `GET /jobs` (spec §6): caller's jobs, Transcription only — DailySummary
//! jobs are an implementation detail and must never surface here.

use axum::Json;
use axum::extract::State;
use std::sync::Arc;

use voicecap_db::JobRepository;

use crate::auth::Principal;
use crate::http::dto::JobResponse;
use crate::http::error::ApiError;
use crate::state::AppState;

pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<Vec<JobResponse>>, ApiError> {
    let jobs = JobRepository::query_by_user(state.db.pool(), &principal.user_id).await?;
    Ok(Json(jobs.into_iter().map(JobResponse::from).collect()))
}
