use std::process::ExitCode;
use std::sync::Arc;

use channel_reports::catalog::{self, VideoCatalog};
use channel_reports::config::Config;
use channel_reports::seeder::CatalogSeeder;
use channel_reports::store;
use channel_reports::telemetry::{self, TelemetrySettings};
use channel_reports::youtube::YouTubeClient;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present (dotenvy)
    dotenvy::dotenv().ok();

    let guard = telemetry::init_telemetry("channel-reports-seed", TelemetrySettings::from_env());

    let result = run().await;
    if let Err(e) = &result {
        tracing::error!("Seeding failed: {}", e);
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
        Arc::new(YouTubeClient::new(http, config.youtube.clone()));
    let channel_id = catalog::resolve(catalog.as_ref(), &config.channel).await?;

    let summary = CatalogSeeder::new(db, catalog).run(&channel_id).await?;
    tracing::info!(
        inserted = summary.inserted,
        skipped = summary.skipped,
        failed = summary.failed,
        "Video fetch completed"
    );
    Ok(())
}
