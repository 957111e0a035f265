use std::sync::Arc;

use futures::TryStreamExt;
use sea_orm::DatabaseConnection;

use crate::catalog::{self, VideoCatalog};
use crate::error::Result;
use crate::store;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub inserted: usize,
    /// Already stored under the same external id.
    pub skipped: usize,
    pub failed: usize,
}

/// Stores every long-form video of a channel as `pending`.
pub struct CatalogSeeder {
    db: DatabaseConnection,
    catalog: Arc<dyn VideoCatalog>,
}

impl CatalogSeeder {
    pub fn new(db: DatabaseConnection, catalog: Arc<dyn VideoCatalog>) -> Self {
        Self { db, catalog }
    }

    /// Insert failures are counted and skipped; a listing failure ends the run.
    pub async fn run(&self, channel_id: &str) -> Result<SeedSummary> {
        tracing::info!(channel_id, "Seeding channel catalog");

        let mut summary = SeedSummary::default();
        let mut videos = catalog::list_videos(self.catalog.as_ref(), channel_id);

        while let Some(video) = videos.try_next().await? {
            match store::insert_pending(&self.db, &video).await {
                Ok(true) => {
                    summary.inserted += 1;
                    tracing::info!(video_url = %video.url, "Stored video");
                }
                Ok(false) => {
                    summary.skipped += 1;
                    tracing::debug!(video_url = %video.url, "Video already exists");
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!("Error storing video {}: {}", video.url, e);
                }
            }
        }

        tracing::info!(
            inserted = summary.inserted,
            skipped = summary.skipped,
            failed = summary.failed,
            "Finished seeding"
        );
        Ok(summary)
    }
}
