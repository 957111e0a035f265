//! Queries over the `videos` and `reports` tables.
//!
//! Every status transition is a single conditional `UPDATE`, so overlapping
//! runs never see a half-applied change and at most one of them can claim a
//! given video.

use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, Database, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    Set,
};
use sea_orm_migration::MigratorTrait;
use serde_json::Value;
use uuid::Uuid;

use crate::catalog::CatalogVideo;
use crate::entities::report::{self, ImageStatus};
use crate::entities::video::{self, VideoStatus};
use crate::entities::{Report, Video};
use crate::error::Result;
use crate::migrator::Migrator;

type Timestamp = sea_orm::prelude::DateTimeWithTimeZone;

fn now() -> Timestamp {
    Utc::now().into()
}

/// Connects and brings the schema up to date.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection> {
    let db = Database::connect(database_url).await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Inserts a `pending` row unless the external id is already stored.
///
/// Returns whether a row was written.
pub async fn insert_pending(db: &DatabaseConnection, source: &CatalogVideo) -> Result<bool> {
    let now = now();
    let model = video::ActiveModel {
        id: Set(Uuid::new_v4()),
        video_id: Set(source.external_id.clone()),
        channel_id: Set(source.channel_id.clone()),
        video_url: Set(source.url.clone()),
        title: Set(source.title.clone()),
        published_at: Set(source.published_at.into()),
        status: Set(VideoStatus::Pending),
        retry_count: Set(0),
        last_attempt_at: Set(None),
        last_error: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let rows = Video::insert(model)
        .on_conflict(
            OnConflict::column(video::Column::VideoId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    Ok(rows > 0)
}

pub async fn oldest_pending(db: &DatabaseConnection) -> Result<Option<video::Model>> {
    Ok(Video::find()
        .filter(video::Column::Status.eq(VideoStatus::Pending))
        .order_by_asc(video::Column::PublishedAt)
        .order_by_asc(video::Column::CreatedAt)
        .order_by_asc(video::Column::Id)
        .one(db)
        .await?)
}

/// `pending` → `updating`. Returns `false` if another run got there first.
pub async fn claim(db: &DatabaseConnection, id: Uuid) -> Result<bool> {
    let now = now();
    let result = Video::update_many()
        .set(video::ActiveModel {
            status: Set(VideoStatus::Updating),
            last_attempt_at: Set(Some(now)),
            updated_at: Set(now),
            ..Default::default()
        })
        .filter(video::Column::Id.eq(id))
        .filter(video::Column::Status.eq(VideoStatus::Pending))
        .exec(db)
        .await?;

    Ok(result.rows_affected == 1)
}

/// `updating` → `failed`, counting the attempt and keeping the error.
pub async fn mark_failed(db: &DatabaseConnection, id: Uuid, error: &str) -> Result<()> {
    Video::update_many()
        .set(video::ActiveModel {
            status: Set(VideoStatus::Failed),
            last_error: Set(Some(error.to_string())),
            updated_at: Set(now()),
            ..Default::default()
        })
        .col_expr(
            video::Column::RetryCount,
            Expr::col(video::Column::RetryCount).add(1),
        )
        .filter(video::Column::Id.eq(id))
        .filter(video::Column::Status.eq(VideoStatus::Updating))
        .exec(db)
        .await?;
    Ok(())
}

/// `updating` → `completed`. Returns `false` if the claim was lost meanwhile.
pub async fn mark_completed(db: &DatabaseConnection, id: Uuid) -> Result<bool> {
    let result = Video::update_many()
        .set(video::ActiveModel {
            status: Set(VideoStatus::Completed),
            last_error: Set(None),
            updated_at: Set(now()),
            ..Default::default()
        })
        .filter(video::Column::Id.eq(id))
        .filter(video::Column::Status.eq(VideoStatus::Updating))
        .exec(db)
        .await?;

    Ok(result.rows_affected == 1)
}

/// Writes the report of a video, replacing the results of an earlier
/// attempt if one exists.
pub async fn save_report(db: &DatabaseConnection, video: &video::Model, results: &Value) -> Result<()> {
    let now = now();
    let model = report::ActiveModel {
        id: Set(video.id),
        video_url: Set(video.video_url.clone()),
        results: Set(results.clone()),
        image_url: Set(None),
        image_status: Set(ImageStatus::Pending),
        created_at: Set(now),
        updated_at: Set(now),
    };

    Report::insert(model)
        .on_conflict(
            OnConflict::column(report::Column::Id)
                .update_columns([
                    report::Column::Results,
                    report::Column::ImageUrl,
                    report::Column::ImageStatus,
                    report::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(())
}

/// Records the image outcome: a URL completes the report, `None` fails it.
pub async fn set_report_image(
    db: &DatabaseConnection,
    id: Uuid,
    image_url: Option<&str>,
) -> Result<ImageStatus> {
    let status = match image_url {
        Some(_) => ImageStatus::Completed,
        None => ImageStatus::Failed,
    };

    Report::update_many()
        .set(report::ActiveModel {
            image_url: Set(image_url.map(str::to_string)),
            image_status: Set(status),
            updated_at: Set(now()),
            ..Default::default()
        })
        .filter(report::Column::Id.eq(id))
        .exec(db)
        .await?;

    Ok(status)
}

/// The `n` stored videos with the latest publish time, newest first.
pub async fn latest_videos(db: &DatabaseConnection, n: u64) -> Result<Vec<video::Model>> {
    Ok(Video::find()
        .order_by_desc(video::Column::PublishedAt)
        .order_by_desc(video::Column::CreatedAt)
        .limit(n)
        .all(db)
        .await?)
}

/// Fails claims left in `updating` since before `cutoff` by a run that died.
pub async fn release_stale_claims(db: &DatabaseConnection, cutoff: Timestamp) -> Result<u64> {
    let result = Video::update_many()
        .set(video::ActiveModel {
            status: Set(VideoStatus::Failed),
            last_error: Set(Some("claim expired".to_string())),
            updated_at: Set(now()),
            ..Default::default()
        })
        .col_expr(
            video::Column::RetryCount,
            Expr::col(video::Column::RetryCount).add(1),
        )
        .filter(video::Column::Status.eq(VideoStatus::Updating))
        .filter(video::Column::LastAttemptAt.lt(cutoff))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

/// Puts failed videos with `retry_count < max_retries` back to `pending`.
pub async fn requeue_failed(db: &DatabaseConnection, max_retries: i32) -> Result<u64> {
    if max_retries <= 0 {
        return Ok(0);
    }

    let result = Video::update_many()
        .set(video::ActiveModel {
            status: Set(VideoStatus::Pending),
            updated_at: Set(now()),
            ..Default::default()
        })
        .filter(video::Column::Status.eq(VideoStatus::Failed))
        .filter(video::Column::RetryCount.lt(max_retries))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}
