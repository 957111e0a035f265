#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use channel_reports::catalog::{CatalogPage, CatalogVideo, VideoCatalog};
use channel_reports::entities::{report, video, Report, Video};
use channel_reports::error::{Error, Result};
use channel_reports::image_search::ImageLookup;
use channel_reports::migrator::Migrator;
use channel_reports::summary::{Summarizer, Summary};
use chrono::{TimeZone, Utc};
use sea_orm::{
    ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait, QueryFilter,
};
use sea_orm_migration::MigratorTrait;
use serde_json::{json, Value};

pub const CHANNEL: &str = "UC_test_channel";

pub async fn setup_db() -> DatabaseConnection {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    // Every pooled connection would get its own in-memory database.
    opt.max_connections(1).min_connections(1).sqlx_logging(false);

    let db = Database::connect(opt).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

/// A source video published `t` hours after a fixed epoch.
pub fn source_video(id: &str, t: i64) -> CatalogVideo {
    CatalogVideo {
        external_id: id.to_string(),
        channel_id: CHANNEL.to_string(),
        url: format!("https://www.youtube.com/watch?v={}", id),
        title: Some(format!("Review of product {}", id)),
        published_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
            + chrono::Duration::hours(t),
    }
}

pub fn report_json(product_name: &str) -> Value {
    json!({
        "product_id": product_name.to_uppercase().replace(' ', ""),
        "product_info": {
            "product_name": product_name,
            "product_category": "Whey Isolate",
            "serving_size": "1 Scoop (30g)",
            "verdict": "Pass"
        },
        "basic_tests": { "result": "Pass" },
        "contaminant_tests": { "result": "Pass" },
        "review": { "result": "Pass" }
    })
}

pub async fn find_video(db: &DatabaseConnection, external_id: &str) -> video::Model {
    Video::find()
        .filter(video::Column::VideoId.eq(external_id))
        .one(db)
        .await
        .unwrap()
        .expect("video row")
}

pub async fn all_videos(db: &DatabaseConnection) -> Vec<video::Model> {
    Video::find().all(db).await.unwrap()
}

pub async fn all_reports(db: &DatabaseConnection) -> Vec<report::Model> {
    Report::find().all(db).await.unwrap()
}

fn unreachable(service: &'static str) -> Error {
    Error::malformed(service, "connection refused")
}

/// Catalog backed by in-memory pages keyed by page token.
#[derive(Default)]
pub struct FakeCatalog {
    pages: Mutex<HashMap<Option<String>, Result<CatalogPage>>>,
    recent: Mutex<Vec<CatalogVideo>>,
    fail_recent: Mutex<bool>,
    pub page_calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits `videos` into pages of `page_size`, chained by tokens.
    pub fn with_listing(self, videos: Vec<CatalogVideo>, page_size: usize) -> Self {
        {
            let mut pages = self.pages.lock().unwrap();
            let chunks: Vec<Vec<CatalogVideo>> =
                videos.chunks(page_size).map(|c| c.to_vec()).collect();
            let count = chunks.len();
            for (i, chunk) in chunks.into_iter().enumerate() {
                let token = if i == 0 { None } else { Some(format!("page-{}", i)) };
                let next = if i + 1 < count {
                    Some(format!("page-{}", i + 1))
                } else {
                    None
                };
                pages.insert(
                    token,
                    Ok(CatalogPage {
                        videos: chunk,
                        next_page_token: next,
                    }),
                );
            }
        }
        self
    }

    pub fn fail_page(self, token: &str) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(Some(token.to_string()), Err(unreachable("YouTube")));
        self
    }

    pub fn set_recent(&self, videos: Vec<CatalogVideo>) {
        *self.recent.lock().unwrap() = videos;
    }

    pub fn fail_recent(&self) {
        *self.fail_recent.lock().unwrap() = true;
    }
}

#[async_trait]
impl VideoCatalog for FakeCatalog {
    async fn resolve_channel(&self, handle: &str) -> Result<String> {
        Ok(format!("UC_{}", handle.trim_start_matches('@')))
    }

    async fn list_page(&self, _channel_id: &str, page_token: Option<&str>) -> Result<CatalogPage> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        let pages = self.pages.lock().unwrap();
        match pages.get(&page_token.map(str::to_string)) {
            Some(Ok(page)) => Ok(page.clone()),
            Some(Err(_)) => Err(unreachable("YouTube")),
            None => Ok(CatalogPage::default()),
        }
    }

    async fn list_recent(&self, _channel_id: &str, n: usize) -> Result<Vec<CatalogVideo>> {
        if *self.fail_recent.lock().unwrap() {
            return Err(unreachable("YouTube"));
        }
        let mut videos = self.recent.lock().unwrap().clone();
        videos.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        videos.truncate(n);
        Ok(videos)
    }
}

enum Reply {
    Report(Value),
    Unusable,
    Rejected(reqwest::StatusCode),
}

/// Summarizer answering with a fixed payload, or failing.
pub struct FakeSummarizer {
    reply: Reply,
    pub calls: AtomicUsize,
}

impl FakeSummarizer {
    fn new(reply: Reply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn returning(response: Value) -> Self {
        Self::new(Reply::Report(response))
    }

    /// Fails for this video only.
    pub fn failing() -> Self {
        Self::new(Reply::Unusable)
    }

    /// Fails the way a service refusing our API key does.
    pub fn rejecting(status: reqwest::StatusCode) -> Self {
        Self::new(Reply::Rejected(status))
    }
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize(&self, _video_url: &str, _instructions: &str) -> Result<Summary> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Give a concurrent caller the chance to interleave.
        tokio::task::yield_now().await;
        match &self.reply {
            Reply::Report(value) => Summary::from_value(value.clone()),
            Reply::Unusable => Err(unreachable("Gemini")),
            Reply::Rejected(status) => Err(Error::Api {
                service: "Gemini",
                status: *status,
                body: "API key not valid".to_string(),
            }),
        }
    }
}

pub enum ImageBehavior {
    Found(String),
    NoResults,
    Fail,
}

pub struct FakeImages {
    behavior: ImageBehavior,
    pub queries: Mutex<Vec<String>>,
}

impl FakeImages {
    pub fn new(behavior: ImageBehavior) -> Self {
        Self {
            behavior,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn found(url: &str) -> Self {
        Self::new(ImageBehavior::Found(url.to_string()))
    }
}

#[async_trait]
impl ImageLookup for FakeImages {
    async fn find_image(&self, query: &str) -> Result<Option<String>> {
        self.queries.lock().unwrap().push(query.to_string());
        match &self.behavior {
            ImageBehavior::Found(url) => Ok(Some(url.clone())),
            ImageBehavior::NoResults => Ok(None),
            ImageBehavior::Fail => Err(unreachable("Custom Search")),
        }
    }
}
