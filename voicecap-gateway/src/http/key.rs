//! `GET /key` (spec §6): the caller's 32-byte key, base64-encoded. Needed
//! only by clients that must encrypt before upload; charges a KeyVault
//! retrieve per spec §4.F's rate table.

use axum::Json;
use axum::extract::State;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::sync::Arc;

use rust_decimal::Decimal;
use voicecap_core::error::CoreError;
use voicecap_core::money::{Service, Unit};
use voicecap_db::{KeyVaultRepository, LedgerRepository};

use crate::auth::Principal;
use crate::http::dto::KeyResponse;
use crate::http::error::ApiError;
use crate::state::AppState;

pub async fn get_key(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<KeyResponse>, ApiError> {
    let key = KeyVaultRepository::get_key(state.db.pool(), &principal.user_id).await?;

    LedgerRepository::charge(
        state.db.pool(),
        &principal.user_id,
        Service::KeyVault,
        "retrieve",
        Decimal::ONE,
        Unit::Secret,
        state.seed_grant_usd,
    )
    .await
    .map_err(CoreError::from)?;

    Ok(Json(KeyResponse {
        key_base64: STANDARD.encode(key.as_bytes()),
    }))
}
