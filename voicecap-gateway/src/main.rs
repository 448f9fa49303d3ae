//! Process entry point: load configuration, wire up every collaborator,
//! and run the HTTP server alongside the JobProcessor, SummaryScheduler,
//! and RetentionSweeper as cooperating background tasks sharing one
//! `CancellationToken` (spec §6 "Exit codes").

use std::sync::Arc;

use rust_decimal::prelude::FromPrimitive;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use voicecap_clients::{BlobStore, Mailer, SpeechClient, SummaryClient, Transcoder};
use voicecap_core::config::Config;
use voicecap_db::DbPool;
use voicecap_gateway::http;
use voicecap_gateway::processor::JobProcessor;
use voicecap_gateway::retention::RetentionSweeper;
use voicecap_gateway::scheduler::SummaryScheduler;
use voicecap_gateway::state::AppState;

#[tokio::main]
async fn main() {
    voicecap_core::config::load_dotenv();

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("fatal: failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    init_tracing(&config.settings.logging.level);

    if let Err(err) = run(config).await {
        error!(error = %err, "fatal startup error");
        std::process::exit(1);
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let bind_addr = config.bind_addr();
    let tunables = config.tunables();

    let db = DbPool::new().await?;

    let daily_summary_prompt =
        tokio::fs::read_to_string(&config.settings.daily_summary_prompt_path).await?;

    let blob_store_root = config
        .secrets
        .blob_store_root
        .clone()
        .unwrap_or_else(|| {
            dirs::data_dir()
                .expect("platform data dir")
                .join("voicecap")
                .join("blobs")
                .display()
                .to_string()
        });
    let upload_signing_secret = config
        .secrets
        .internal_grant_secret
        .clone()
        .unwrap_or_else(generate_ephemeral_secret);
    let blobstore = BlobStore::new(blob_store_root, upload_signing_secret.as_bytes());

    let transcoder = Transcoder::new();

    let speech = SpeechClient::new(
        config.secrets.speech_api_key.clone().expect("validated by Config::load"),
        config.settings.speech.base_url.clone(),
    );
    let summary = SummaryClient::new(
        config.secrets.summary_api_key.clone().expect("validated by Config::load"),
        config.settings.summary.base_url.clone(),
    );
    let mailer = Mailer::new(
        config.secrets.mail_provider_api_key.clone().unwrap_or_default(),
        config.settings.mailer.base_url.clone(),
        config.secrets.mail_sender.clone().expect("validated by Config::load"),
    );

    let seed_grant_usd = rust_decimal::Decimal::from_f64(tunables.seed_grant_usd)
        .unwrap_or(rust_decimal::Decimal::ZERO);

    let internal_grant_secret = config
        .secrets
        .internal_grant_secret
        .clone()
        .unwrap_or_else(generate_ephemeral_secret);

    let state = Arc::new(AppState::new(
        db,
        blobstore,
        transcoder,
        speech,
        summary,
        mailer,
        tunables,
        seed_grant_usd,
        daily_summary_prompt,
        internal_grant_secret,
    ));

    let shutdown = CancellationToken::new();

    let processor = JobProcessor::new(Arc::clone(&state));
    let scheduler = SummaryScheduler::new(Arc::clone(&state));
    let retention = RetentionSweeper::new(Arc::clone(&state));

    let processor_handle = tokio::spawn(processor.run(shutdown.clone()));
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown.clone()));
    let retention_handle = tokio::spawn(retention.run(shutdown.clone()));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "voicecap-gateway listening");

    let app = http::router(Arc::clone(&state));
    let server_shutdown = shutdown.clone();
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                server_shutdown.cancelled().await;
            })
            .await
    });

    tokio::signal::ctrl_c().await.ok();
    info!("received shutdown signal");
    shutdown.cancel();

    match tokio::time::timeout(http::GRACEFUL_SHUTDOWN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(err))) => error!(error = %err, "HTTP server error"),
        Ok(Err(err)) => error!(error = %err, "HTTP server task panicked"),
        Err(_) => tracing::warn!("graceful shutdown timed out, forcing exit"),
    }

    let _ = tokio::join!(processor_handle, scheduler_handle, retention_handle);

    state.db.close().await;
    info!("voicecap-gateway shut down cleanly");
    Ok(())
}

/// A per-process secret used only when `INTERNAL_GRANT_SECRET` is unset, so
/// the internal credit-grant endpoint and presigned upload URLs still work
/// in local/dev runs without being reachable by anyone who doesn't also
/// have process memory access. Production deployments should always set
/// the real environment variable.
fn generate_ephemeral_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}
