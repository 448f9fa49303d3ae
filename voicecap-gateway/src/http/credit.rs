//! `GET /credit`, `GET /costs` (spec §6, §4.F `Summary`).

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use std::sync::Arc;

use voicecap_db::LedgerRepository;

use crate::auth::Principal;
use crate::http::dto::{CostLine, CreditResponse};
use crate::http::error::ApiError;
use crate::state::AppState;

pub async fn get_credit(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<CreditResponse>, ApiError> {
    let account =
        LedgerRepository::ensure_account(state.db.pool(), &principal.user_id, state.seed_grant_usd)
            .await?;
    Ok(Json(account.into()))
}

#[derive(Debug, Deserialize)]
pub struct CostsQuery {
    pub month: Option<String>,
}

pub async fn get_costs(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Query(query): Query<CostsQuery>,
) -> Result<Json<Vec<CostLine>>, ApiError> {
    let totals =
        LedgerRepository::summary(state.db.pool(), &principal.user_id, query.month.as_deref())
            .await?;
    Ok(Json(
        totals
            .into_iter()
            .map(|(service, cost_usd)| CostLine { service, cost_usd })
            .collect(),
    ))
}
