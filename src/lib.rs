pub mod catalog;
pub mod config;
pub mod entities;
pub mod error;
pub mod freshness;
pub mod gemini;
pub mod image_search;
pub mod migrator;
pub mod pipeline;
pub mod reconciler;
pub mod seeder;
pub mod store;
pub mod summary;
pub mod telemetry;
pub mod youtube;

pub use error::{Error, Result};
pub use sea_orm;

/// Shared HTTP client for all external APIs.
pub fn http_client(config: &config::Config) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .map_err(|e| Error::http("HTTP client", e))
}
