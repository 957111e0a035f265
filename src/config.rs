//! Runtime configuration, read once from the environment.

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_CHANNEL_HANDLE: &str = "@Trustified-Certification";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const CUSTOM_SEARCH_API_BASE: &str = "https://www.googleapis.com/customsearch/v1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Which channel to track. An explicit id skips the handle lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef {
    Id(String),
    Handle(String),
}

#[derive(Debug, Clone)]
pub struct YouTubeConfig {
    pub api_key: String,
    pub base_url: String,
    /// Videos at or below this length are shorts and never catalogued.
    pub min_duration_secs: u64,
    /// Search results requested by `list_recent` before shorts are dropped.
    pub recent_fetch_size: u32,
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub struct ImageSearchConfig {
    pub api_key: String,
    pub engine_id: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub channel: ChannelRef,
    pub youtube: YouTubeConfig,
    pub gemini: GeminiConfig,
    pub image_search: ImageSearchConfig,
    /// Freshness window: how many of the newest videos are compared per run.
    pub freshness_window: u64,
    /// Failed videos are requeued while their retry count stays below this.
    pub max_retries: i32,
    pub stale_claim_after: Duration,
    pub http_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let youtube_key = required("YOUTUBE_API_KEY")?;

        let channel = match optional("CHANNEL_ID") {
            Some(id) => ChannelRef::Id(id),
            None => ChannelRef::Handle(
                optional("CHANNEL_HANDLE").unwrap_or_else(|| DEFAULT_CHANNEL_HANDLE.to_string()),
            ),
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            channel,
            youtube: YouTubeConfig {
                api_key: youtube_key.clone(),
                base_url: optional("YOUTUBE_API_BASE")
                    .unwrap_or_else(|| YOUTUBE_API_BASE.to_string()),
                min_duration_secs: parsed("MIN_DURATION_SECS", 60)?,
                recent_fetch_size: parsed("RECENT_FETCH_SIZE", 10)?,
            },
            gemini: GeminiConfig {
                api_key: required("GEMINI_API_KEY")?,
                model: optional("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
                base_url: optional("GEMINI_API_BASE")
                    .unwrap_or_else(|| GEMINI_API_BASE.to_string()),
                temperature: 0.1,
            },
            image_search: ImageSearchConfig {
                // The same Google key usually covers both APIs.
                api_key: optional("CUSTOM_SEARCH_API_KEY").unwrap_or(youtube_key),
                engine_id: required("CUSTOM_SEARCH_ENGINE_ID")?,
                base_url: optional("CUSTOM_SEARCH_API_BASE")
                    .unwrap_or_else(|| CUSTOM_SEARCH_API_BASE.to_string()),
            },
            freshness_window: parsed("FRESHNESS_WINDOW", 3)?,
            max_retries: parsed("MAX_RETRIES", 3)?,
            stale_claim_after: Duration::from_secs(60 * parsed::<u64>("STALE_CLAIM_MINUTES", 60)?),
            http_timeout: Duration::from_secs(parsed("HTTP_TIMEOUT_SECS", 120)?),
        })
    }
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
