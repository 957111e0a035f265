use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::catalog::{CatalogPage, CatalogVideo, VideoCatalog};
use crate::config::YouTubeConfig;
use crate::error::{Error, Result};

const SERVICE: &str = "YouTube";
/// Hard limit of the search and videos endpoints.
const MAX_PAGE_SIZE: u32 = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    channel_id: Option<String>,
    title: Option<String>,
    published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    content_details: ContentDetails,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: String,
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Seconds in an ISO-8601 `PT#H#M#S` duration; anything unparseable is 0.
pub fn parse_duration_secs(duration: &str) -> u64 {
    let Some(rest) = duration.strip_prefix("PT") else {
        return 0;
    };

    let mut total = 0u64;
    let mut digits = String::new();
    for c in rest.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit = match c {
            'H' => 3600,
            'M' => 60,
            'S' => 1,
            _ => return 0,
        };
        let Some(next) = digits
            .parse::<u64>()
            .ok()
            .and_then(|value| value.checked_mul(unit))
            .and_then(|secs| total.checked_add(secs))
        else {
            return 0;
        };
        total = next;
        digits.clear();
    }

    if digits.is_empty() {
        total
    } else {
        0
    }
}

/// YouTube Data API v3 client.
pub struct YouTubeClient {
    client: Client,
    config: YouTubeConfig,
}

impl YouTubeClient {
    pub fn new(client: Client, config: YouTubeConfig) -> Self {
        Self { client, config }
    }

    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint);

        let res = self
            .client
            .get(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .query(params)
            .send()
            .await
            .map_err(|e| Error::http(SERVICE, e))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(Error::Api {
                service: SERVICE,
                status,
                body,
            });
        }

        res.json()
            .await
            .map_err(|e| Error::malformed(SERVICE, e.to_string()))
    }

    async fn search_videos(
        &self,
        channel_id: &str,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<SearchResponse> {
        let mut params = vec![
            ("part", "snippet".to_string()),
            ("channelId", channel_id.to_string()),
            ("maxResults", max_results.min(MAX_PAGE_SIZE).to_string()),
            ("order", "date".to_string()),
            ("type", "video".to_string()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        self.get("search", &params).await
    }

    async fn durations(&self, ids: &[&str]) -> Result<HashMap<String, u64>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let ids = &ids[..ids.len().min(MAX_PAGE_SIZE as usize)];
        let response: VideosResponse = self
            .get(
                "videos",
                &[
                    ("part", "contentDetails".to_string()),
                    ("id", ids.join(",")),
                ],
            )
            .await?;

        Ok(response
            .items
            .into_iter()
            .map(|item| (item.id, parse_duration_secs(&item.content_details.duration)))
            .collect())
    }

    /// Search results with shorts removed, order preserved.
    async fn long_form(&self, channel_id: &str, items: Vec<SearchItem>) -> Result<Vec<CatalogVideo>> {
        let ids: Vec<&str> = items
            .iter()
            .filter_map(|item| item.id.video_id.as_deref())
            .collect();
        let durations = self.durations(&ids).await?;

        let mut videos = Vec::with_capacity(items.len());
        for item in items {
            let Some(video_id) = item.id.video_id else {
                continue;
            };
            let duration = durations.get(&video_id).copied().unwrap_or(0);
            if duration <= self.config.min_duration_secs {
                tracing::debug!(%video_id, duration, "Skipping short");
                continue;
            }
            let Some(published_at) = item.snippet.published_at else {
                tracing::warn!(%video_id, "Search result without publishedAt, skipping");
                continue;
            };

            videos.push(CatalogVideo {
                url: watch_url(&video_id),
                external_id: video_id,
                channel_id: item
                    .snippet
                    .channel_id
                    .unwrap_or_else(|| channel_id.to_string()),
                title: item.snippet.title,
                published_at,
            });
        }

        Ok(videos)
    }
}

#[async_trait]
impl VideoCatalog for YouTubeClient {
    async fn resolve_channel(&self, handle: &str) -> Result<String> {
        let handle = handle.trim_start_matches('@');
        let response: SearchResponse = self
            .get(
                "search",
                &[
                    ("part", "snippet".to_string()),
                    ("q", handle.to_string()),
                    ("type", "channel".to_string()),
                    ("maxResults", "1".to_string()),
                ],
            )
            .await?;

        let channel_id = response
            .items
            .into_iter()
            .next()
            .and_then(|item| item.snippet.channel_id)
            .ok_or_else(|| Error::ChannelNotFound(handle.to_string()))?;

        tracing::info!(handle, %channel_id, "Resolved channel handle");
        Ok(channel_id)
    }

    async fn list_page(&self, channel_id: &str, page_token: Option<&str>) -> Result<CatalogPage> {
        let response = self
            .search_videos(channel_id, MAX_PAGE_SIZE, page_token)
            .await?;

        Ok(CatalogPage {
            videos: self.long_form(channel_id, response.items).await?,
            next_page_token: response.next_page_token,
        })
    }

    async fn list_recent(&self, channel_id: &str, n: usize) -> Result<Vec<CatalogVideo>> {
        // Over-fetch so that dropping shorts still leaves n long-form videos.
        let response = self
            .search_videos(channel_id, self.config.recent_fetch_size, None)
            .await?;

        let mut videos = self.long_form(channel_id, response.items).await?;
        videos.truncate(n);
        Ok(videos)
    }
}
