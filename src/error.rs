//! Crate error types.

use sea_orm::DbErr;
use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("{service} request failed: {source}")]
    Http {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned {status}: {body}")]
    Api {
        service: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("{service} response malformed: {message}")]
    Malformed {
        service: &'static str,
        message: String,
    },

    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    #[error("Summarization returned no reports")]
    NoReports,
}

impl Error {
    pub fn http(service: &'static str, source: reqwest::Error) -> Self {
        Self::Http { service, source }
    }

    pub fn malformed(service: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed {
            service,
            message: message.into(),
        }
    }

    /// The service could not be reached or refused our credentials, so every
    /// request to it would fail the same way.
    pub fn is_service_outage(&self) -> bool {
        match self {
            Self::Http { .. } => true,
            Self::Api { status, .. } => matches!(
                *status,
                reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN
            ),
            _ => false,
        }
    }
}
