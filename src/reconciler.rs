use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sea_orm::DatabaseConnection;
use tracing::Instrument;

use crate::catalog::{self, VideoCatalog};
use crate::config::ChannelRef;
use crate::error::{Error, Result};
use crate::freshness::FreshnessCheck;
use crate::pipeline::{ProcessOutcome, ReportPipeline};
use crate::store;

pub const DEFAULT_MAX_RETRIES: i32 = 3;
pub const DEFAULT_STALE_CLAIM_AFTER: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Stale `updating` claims turned into failures.
    pub released: u64,
    /// Failed videos put back to `pending`.
    pub requeued: u64,
    pub processed: Option<ProcessOutcome>,
    pub inserted: Option<usize>,
}

/// One scheduled run: maintenance, one report, then the freshness check.
pub struct Reconciler {
    db: DatabaseConnection,
    catalog: Arc<dyn VideoCatalog>,
    pipeline: ReportPipeline,
    freshness: FreshnessCheck,
    max_retries: i32,
    stale_claim_after: Duration,
}

impl Reconciler {
    pub fn new(
        db: DatabaseConnection,
        catalog: Arc<dyn VideoCatalog>,
        pipeline: ReportPipeline,
        freshness: FreshnessCheck,
    ) -> Self {
        Self {
            db,
            catalog,
            pipeline,
            freshness,
            max_retries: DEFAULT_MAX_RETRIES,
            stale_claim_after: DEFAULT_STALE_CLAIM_AFTER,
        }
    }

    /// `0` leaves failed videos alone for good.
    pub fn max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn stale_claim_after(mut self, after: Duration) -> Self {
        self.stale_claim_after = after;
        self
    }

    /// Every step runs even when an earlier one failed; the first error is
    /// returned once all of them are done.
    pub async fn run(&self, channel: &ChannelRef) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let mut first_error: Option<Error> = None;
        let mut record = |step: &str, e: Error| {
            tracing::error!("Error in {}: {}", step, e);
            first_error.get_or_insert(e);
        };

        match self.maintain().await {
            Ok((released, requeued)) => {
                summary.released = released;
                summary.requeued = requeued;
            }
            Err(e) => record("maintenance", e),
        }

        match self
            .pipeline
            .process_next()
            .instrument(tracing::info_span!("report_pipeline"))
            .await
        {
            Ok(outcome) => summary.processed = Some(outcome),
            Err(e) => record("report pipeline", e),
        }

        match self
            .check_freshness(channel)
            .instrument(tracing::info_span!("freshness_check"))
            .await
        {
            Ok(inserted) => summary.inserted = Some(inserted),
            Err(e) => record("freshness check", e),
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }

    async fn maintain(&self) -> Result<(u64, u64)> {
        let stale_after = chrono::Duration::from_std(self.stale_claim_after)
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        let cutoff = (Utc::now() - stale_after).into();

        let released = store::release_stale_claims(&self.db, cutoff).await?;
        if released > 0 {
            tracing::warn!(released, "Released stale claims");
        }

        let requeued = store::requeue_failed(&self.db, self.max_retries).await?;
        if requeued > 0 {
            tracing::info!(requeued, max_retries = self.max_retries, "Requeued failed videos");
        }

        Ok((released, requeued))
    }

    async fn check_freshness(&self, channel: &ChannelRef) -> Result<usize> {
        let channel_id = catalog::resolve(self.catalog.as_ref(), channel).await?;
        self.freshness.run(&channel_id).await
    }
}
