use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tracing::Instrument;
use uuid::Uuid;

use crate::entities::report::ImageStatus;
use crate::entities::video;
use crate::error::Result;
use crate::image_search::ImageLookup;
use crate::store;
use crate::summary::{Summarizer, Summary, REPORT_INSTRUCTIONS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// No pending video, or the candidate was claimed by another run.
    Idle,
    Completed {
        id: Uuid,
        image_status: ImageStatus,
    },
    /// The video ended up `failed`: summarization failed, or the claim was
    /// released before the report could be completed.
    Failed { id: Uuid, error: String },
}

/// Drives one pending video per call through summarization and image lookup.
pub struct ReportPipeline {
    db: DatabaseConnection,
    summarizer: Arc<dyn Summarizer>,
    images: Arc<dyn ImageLookup>,
    instructions: String,
}

impl ReportPipeline {
    pub fn new(
        db: DatabaseConnection,
        summarizer: Arc<dyn Summarizer>,
        images: Arc<dyn ImageLookup>,
    ) -> Self {
        Self {
            db,
            summarizer,
            images,
            instructions: REPORT_INSTRUCTIONS.to_string(),
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub async fn process_next(&self) -> Result<ProcessOutcome> {
        let Some(video) = store::oldest_pending(&self.db).await? else {
            tracing::info!("No pending videos to process");
            return Ok(ProcessOutcome::Idle);
        };

        if !store::claim(&self.db, video.id).await? {
            tracing::info!(video_id = %video.video_id, "Video already claimed by another run");
            return Ok(ProcessOutcome::Idle);
        }

        let span = tracing::info_span!(
            "process_video",
            id = %video.id,
            video_id = %video.video_id,
        );

        async {
            tracing::info!(video_url = %video.video_url, "Processing video");
            let start_time = std::time::Instant::now();

            match self.process_claimed(&video).await {
                Ok(outcome) => {
                    tracing::info!(
                        outcome = ?outcome,
                        elapsed_secs = start_time.elapsed().as_secs_f64(),
                        "Finished video"
                    );
                    Ok(outcome)
                }
                Err(e) => {
                    // Don't leave the claim behind when storage fails mid-way.
                    if let Err(mark_err) = store::mark_failed(&self.db, video.id, &e.to_string()).await {
                        tracing::error!("Failed to mark video as failed: {}", mark_err);
                    }
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn process_claimed(&self, video: &video::Model) -> Result<ProcessOutcome> {
        let summary = match self
            .summarizer
            .summarize(&video.video_url, &self.instructions)
            .instrument(tracing::info_span!("summarize"))
            .await
        {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!("Summarization failed: {}", e);
                let error = e.to_string();
                store::mark_failed(&self.db, video.id, &error).await?;
                // An unreachable or rejecting service fails the whole run.
                if e.is_service_outage() {
                    return Err(e);
                }
                return Ok(ProcessOutcome::Failed {
                    id: video.id,
                    error,
                });
            }
        };

        if summary.len() > 1 {
            tracing::warn!(
                reports = summary.len(),
                "Several products reported, keeping the first"
            );
        }

        store::save_report(&self.db, video, summary.primary()).await?;
        tracing::info!(product_id = summary.product_id(), "Stored report");

        let image_status = self
            .attach_image(video, &summary)
            .instrument(tracing::info_span!("find_image"))
            .await?;

        if !store::mark_completed(&self.db, video.id).await? {
            tracing::warn!("Claim released before completion, leaving video as is");
            return Ok(ProcessOutcome::Failed {
                id: video.id,
                error: "claim released before completion".to_string(),
            });
        }

        Ok(ProcessOutcome::Completed {
            id: video.id,
            image_status,
        })
    }

    /// Best-effort: every lookup problem ends as `ImageStatus::Failed`.
    async fn attach_image(&self, video: &video::Model, summary: &Summary) -> Result<ImageStatus> {
        let query = summary.product_name().or(video.title.as_deref());

        let image_url = match query {
            None => {
                tracing::warn!("No product name or title to search an image for");
                None
            }
            Some(query) => match self.images.find_image(query).await {
                Ok(Some(url)) => {
                    tracing::info!(query, image_url = %url, "Found product image");
                    Some(url)
                }
                Ok(None) => {
                    tracing::warn!(query, "No image results");
                    None
                }
                Err(e) => {
                    tracing::warn!(query, "Image lookup failed: {}", e);
                    None
                }
            },
        };

        store::set_report_image(&self.db, video.id, image_url.as_deref()).await
    }
}
