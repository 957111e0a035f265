use std::collections::HashSet;
use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::catalog::{CatalogVideo, VideoCatalog};
use crate::error::Result;
use crate::store;

/// Picks up videos published since the last run.
///
/// Only the newest `window` videos on each side are compared, so more than
/// `window` uploads between two runs would leave the older ones behind.
pub struct FreshnessCheck {
    db: DatabaseConnection,
    catalog: Arc<dyn VideoCatalog>,
    window: u64,
}

impl FreshnessCheck {
    pub fn new(db: DatabaseConnection, catalog: Arc<dyn VideoCatalog>, window: u64) -> Self {
        Self {
            db,
            catalog,
            window,
        }
    }

    /// Returns how many new `pending` rows were inserted.
    pub async fn run(&self, channel_id: &str) -> Result<usize> {
        let source = self
            .catalog
            .list_recent(channel_id, self.window as usize)
            .await?;
        let stored = store::latest_videos(&self.db, self.window).await?;

        let known: HashSet<&str> = stored.iter().map(|v| v.video_id.as_str()).collect();
        let fresh: Vec<&CatalogVideo> = source
            .iter()
            .filter(|v| !known.contains(v.external_id.as_str()))
            .collect();

        if fresh.is_empty() {
            tracing::info!("No new videos found");
            return Ok(0);
        }
        tracing::info!("Found {} new video(s)", fresh.len());

        let mut inserted = 0;
        for video in fresh {
            match store::insert_pending(&self.db, video).await {
                Ok(true) => {
                    inserted += 1;
                    tracing::info!(video_url = %video.url, "Added new video");
                }
                // Older than the stored window but already known.
                Ok(false) => {
                    tracing::debug!(video_url = %video.url, "Video already stored");
                }
                Err(e) => {
                    tracing::error!("Error adding video {}: {}", video.url, e);
                }
            }
        }

        Ok(inserted)
    }
}
