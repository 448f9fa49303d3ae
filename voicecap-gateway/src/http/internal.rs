//! `POST /internal/credit/grant` (SPEC_FULL §2 supplemented feature 3): the
//! seam an out-of-scope payment webhook calls. Gated by a shared secret
//! header, not a user bearer token — there is no user principal here.

use axum::extract::State;
use axum::http::{StatusCode, request::Parts};
use axum::Json;
use std::sync::Arc;

use voicecap_db::LedgerRepository;

use crate::auth::InternalSecret;
use crate::http::dto::GrantRequest;
use crate::http::error::ApiError;
use crate::state::AppState;

pub async fn grant_credit(
    State(state): State<Arc<AppState>>,
    parts_carrier: PartsOnly,
    Json(body): Json<GrantRequest>,
) -> Result<StatusCode, ApiError> {
    InternalSecret::verify(&parts_carrier.0, &state.internal_grant_secret)
        .map_err(|(status, msg)| {
            ApiError(voicecap_core::error::CoreError::new(
                status_to_category(status),
                msg,
            ))
        })?;

    LedgerRepository::grant(
        state.db.pool(),
        &body.user_id,
        body.amount_usd,
        state.seed_grant_usd,
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

fn status_to_category(status: StatusCode) -> voicecap_core::error::ErrorCategory {
    use voicecap_core::error::ErrorCategory;
    match status {
        StatusCode::UNAUTHORIZED => ErrorCategory::Unauthorized,
        _ => ErrorCategory::InvalidInput,
    }
}

/// Thin extractor that captures the request parts without consuming the
/// body, so [`InternalSecret::verify`] can inspect headers ahead of the
/// `Json` body extractor.
pub struct PartsOnly(pub Parts);

impl<S> axum::extract::FromRequestParts<S> for PartsOnly
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let cloned = parts.clone();
        Ok(PartsOnly(cloned))
    }
}
