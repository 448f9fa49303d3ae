//! Translates [`CoreError`] into an HTTP response (spec §7 "Propagation
//! policy"). Every handler returns `Result<_, ApiError>` so this is the one
//! place status-code mapping lives.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;

use voicecap_core::error::CoreError;

pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl From<voicecap_db::DbError> for ApiError {
    fn from(err: voicecap_db::DbError) -> Self {
        Self(CoreError::from(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.category().http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({ "error": self.0.message }))).into_response()
    }
}

/// Convenience wrapper so handlers can `Json(Envelope(value))` or just
/// return a bare serializable type; kept separate in case a handler needs
/// to return something that isn't naturally `Serialize`.
#[derive(Serialize)]
pub struct Envelope<T: Serialize>(pub T);

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        Json(self.0).into_response()
    }
}
