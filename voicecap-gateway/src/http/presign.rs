//! `GET /presign?key=K` (spec §6, §4.B `SignForUpload`).

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use std::sync::Arc;

use voicecap_core::error::{CoreError, ErrorCategory};

use crate::auth::Principal;
use crate::http::dto::PresignResponse;
use crate::http::error::ApiError;
use crate::state::AppState;

const UPLOAD_URL_TTL_SECS: u64 = 15 * 60;

#[derive(Debug, Deserialize)]
pub struct PresignQuery {
    pub key: String,
}

pub async fn presign(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Query(query): Query<PresignQuery>,
) -> Result<Json<PresignResponse>, ApiError> {
    let expected_prefix = format!("audio/{}/", principal.user_id);
    if !query.key.starts_with(&expected_prefix) {
        return Err(ApiError(CoreError::new(
            ErrorCategory::Forbidden,
            "key does not belong to the caller",
        )));
    }

    let url = state.blobstore.sign_for_upload(&query.key, UPLOAD_URL_TTL_SECS);
    Ok(Json(PresignResponse { url }))
}
