//! Image lookup capability and its Google Custom Search implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::ImageSearchConfig;
use crate::error::{Error, Result};

const SERVICE: &str = "Custom Search";

#[async_trait]
pub trait ImageLookup: Send + Sync {
    /// URL of the best matching image, or `None` when the search has no hits.
    async fn find_image(&self, query: &str) -> Result<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    link: String,
}

pub struct CustomSearchClient {
    client: Client,
    config: ImageSearchConfig,
}

impl CustomSearchClient {
    pub fn new(client: Client, config: ImageSearchConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl ImageLookup for CustomSearchClient {
    async fn find_image(&self, query: &str) -> Result<Option<String>> {
        let res = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("key", self.config.api_key.as_str()),
                ("cx", self.config.engine_id.as_str()),
                ("q", query),
                ("searchType", "image"),
                ("num", "1"),
            ])
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

        let response: SearchResponse = res
            .json()
            .await
            .map_err(|e| Error::malformed(SERVICE, e.to_string()))?;

        Ok(response.items.into_iter().next().map(|item| item.link))
    }
}
