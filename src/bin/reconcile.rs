use std::process::ExitCode;
use std::sync::Arc;

use channel_reports::catalog::VideoCatalog;
use channel_reports::config::Config;
use channel_reports::freshness::FreshnessCheck;
use channel_reports::gemini::GeminiClient;
use channel_reports::image_search::CustomSearchClient;
use channel_reports::pipeline::ReportPipeline;
use channel_reports::reconciler::Reconciler;
use channel_reports::store;
use channel_reports::telemetry::{self, TelemetrySettings};
use channel_reports::youtube::YouTubeClient;

/// Meant to be started by an external scheduler, e.g. every 20 minutes.
#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present (dotenvy)
    dotenvy::dotenv().ok();

    let guard = telemetry::init_telemetry("channel-reports-reconcile", TelemetrySettings::from_env());

    tracing::info!("Reconcile run started");
    let result = run().await;
    match &result {
        Ok(()) => tracing::info!("Reconcile run completed"),
        Err(e) => tracing::error!("Reconcile run failed: {}", e),
    }

    drop(guard);
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

async fn run() -> channel_reports::Result<()> {
    let config = Config::from_env()?;
    let db = store::connect(&config.database_url).await?;
    let http = channel_reports::http_client(&config)?;

    let catalog: Arc<dyn VideoCatalog> =
        Arc::new(YouTubeClient::new(http.clone(), config.youtube.clone()));
    let summarizer = Arc::new(GeminiClient::new(http.clone(), config.gemini.clone()));
    let images = Arc::new(CustomSearchClient::new(http, config.image_search.clone()));

    let pipeline = ReportPipeline::new(db.clone(), summarizer, images);
    let freshness = FreshnessCheck::new(db.clone(), catalog.clone(), config.freshness_window);

    let summary = Reconciler::new(db, catalog, pipeline, freshness)
        .max_retries(config.max_retries)
        .stale_claim_after(config.stale_claim_after)
        .run(&config.channel)
        .await?;

    tracing::info!(
        released = summary.released,
        requeued = summary.requeued,
        processed = ?summary.processed,
        inserted = ?summary.inserted,
        "Reconcile summary"
    );
    Ok(())
}
