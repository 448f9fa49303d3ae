//! The HTTP surface of the core (spec §6). Pure routing and translation —
//! every handler delegates straight to a `voicecap-db` repository or
//! `voicecap-clients` collaborator; there is no service layer in between.

pub mod audio;
pub mod credit;
pub mod dto;
pub mod error;
pub mod internal;
pub mod jobs;
pub mod key;
pub mod prefs;
pub mod presign;
pub mod summaries;
pub mod transcripts;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/audio", post(audio::register_audio).get(audio::list_audio))
        .route(
            "/audio/{file_id}",
            get(audio::get_audio).delete(audio::delete_audio),
        )
        .route("/jobs", get(jobs::list_jobs))
        .route("/transcripts", get(transcripts::list_transcripts))
        .route("/summaries", get(summaries::list_summaries))
        .route("/summaries/export", get(summaries::export_summaries))
        .route(
            "/summaries/{id_or_date}",
            get(summaries::get_summary).delete(summaries::delete_summary),
        )
        .route("/prefs", get(prefs::get_prefs).put(prefs::put_prefs))
        .route("/key", get(key::get_key))
        .route("/credit", get(credit::get_credit))
        .route("/costs", get(credit::get_costs))
        .route("/presign", get(presign::presign))
        .route("/internal/credit/grant", post(internal::grant_credit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Shutdown deadline the server waits for in-flight requests to drain
/// before axum forcibly closes them (mirrors `PROCESSING_TIMEOUT`'s role
/// for the worker pool: bounded, not unbounded).
pub const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);
