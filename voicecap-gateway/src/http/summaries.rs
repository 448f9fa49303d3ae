//! `/summaries*` (spec §6): decrypted reads, ownership-checked delete, and
//! the streaming export endpoint.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;

use voicecap_core::error::{CoreError, ErrorCategory};
use voicecap_db::{KeyVaultRepository, TranscriptRepository};

use crate::auth::Principal;
use crate::http::dto::SummaryResponse;
use crate::http::error::ApiError;
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: i64 = 30;

#[derive(Debug, Deserialize)]
pub struct ListSummariesQuery {
    pub limit: Option<i64>,
}

pub async fn list_summaries(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Query(query): Query<ListSummariesQuery>,
) -> Result<Json<Vec<SummaryResponse>>, ApiError> {
    let key = KeyVaultRepository::get_key(state.db.pool(), &principal.user_id).await?;
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 365);
    let summaries =
        TranscriptRepository::list_summaries(state.db.pool(), &principal.user_id, limit, &key)
            .await?;
    Ok(Json(summaries.into_iter().map(SummaryResponse::from).collect()))
}

pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(date): Path<NaiveDate>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let key = KeyVaultRepository::get_key(state.db.pool(), &principal.user_id).await?;
    let summary =
        TranscriptRepository::get_summary(state.db.pool(), &principal.user_id, date, &key).await?;
    Ok(Json(summary.into()))
}

pub async fn delete_summary(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(summary_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    TranscriptRepository::delete_summary(state.db.pool(), &principal.user_id, &summary_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub format: String,
    pub limit: Option<i64>,
}

/// `GET /summaries/export?format=json|csv&limit=N`. Builds the full export
/// in memory rather than chunked transfer — acceptable at the per-user
/// dataset scale this core is designed for (spec §4.E `PrefStore`
/// note on scan scale applies equally here).
pub async fn export_summaries(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let key = KeyVaultRepository::get_key(state.db.pool(), &principal.user_id).await?;
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 365);
    let summaries =
        TranscriptRepository::list_summaries(state.db.pool(), &principal.user_id, limit, &key)
            .await?;
    let rows: Vec<SummaryResponse> = summaries.into_iter().map(SummaryResponse::from).collect();

    match query.format.as_str() {
        "json" => Ok((
            [(header::CONTENT_TYPE, "application/json")],
            serde_json::to_vec(&rows).map_err(|e| {
                ApiError(CoreError::new(ErrorCategory::InvalidInput, e.to_string()))
            })?,
        )
            .into_response()),
        "csv" => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            for row in &rows {
                writer
                    .write_record([
                        row.summary_id.as_str(),
                        &row.summary_date.to_string(),
                        &row.family.join("; "),
                        &row.business.join("; "),
                        &row.misc.join("; "),
                        &row.created_at.to_rfc3339(),
                    ])
                    .map_err(|e| ApiError(CoreError::new(ErrorCategory::InvalidInput, e.to_string())))?;
            }
            let bytes = writer
                .into_inner()
                .map_err(|e| ApiError(CoreError::new(ErrorCategory::InvalidInput, e.to_string())))?;
            Ok(([(header::CONTENT_TYPE, "text/csv")], bytes).into_response())
        }
        other => Err(ApiError(CoreError::new(
            ErrorCategory::InvalidInput,
            format!("unsupported export format: {other}"),
        ))),
    }
}
