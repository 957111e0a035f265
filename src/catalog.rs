//! Video catalog capability and the paginated channel listing built on it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

use crate::config::ChannelRef;
use crate::error::{Error, Result};

/// One long-form video as listed by the source platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogVideo {
    pub external_id: String,
    pub channel_id: String,
    pub url: String,
    pub title: Option<String>,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct CatalogPage {
    pub videos: Vec<CatalogVideo>,
    pub next_page_token: Option<String>,
}

#[async_trait]
pub trait VideoCatalog: Send + Sync {
    /// Turn a channel handle such as `@name` into the platform channel id.
    async fn resolve_channel(&self, handle: &str) -> Result<String>;

    /// One page of the channel listing, newest first.
    async fn list_page(&self, channel_id: &str, page_token: Option<&str>) -> Result<CatalogPage>;

    /// The `n` most recently published videos, newest first.
    async fn list_recent(&self, channel_id: &str, n: usize) -> Result<Vec<CatalogVideo>>;
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

async fn next_page(
    catalog: &dyn VideoCatalog,
    channel_id: &str,
    cursor: Cursor,
) -> Result<Option<(Vec<CatalogVideo>, Cursor)>> {
    let token = match cursor {
        Cursor::Start => None,
        Cursor::Next(token) => Some(token),
        Cursor::Done => return Ok(None),
    };

    let page = catalog.list_page(channel_id, token.as_deref()).await?;
    let next = match page.next_page_token {
        Some(token) if !token.is_empty() => Cursor::Next(token),
        _ => Cursor::Done,
    };
    tracing::debug!(videos = page.videos.len(), "Fetched catalog page");

    Ok(Some((page.videos, next)))
}

/// Every video of a channel, fetched page by page as the stream is polled.
///
/// The stream ends after the last page or right after the first error. Calling
/// this again starts a fresh enumeration.
pub fn list_videos<'a>(
    catalog: &'a dyn VideoCatalog,
    channel_id: &'a str,
) -> BoxStream<'a, Result<CatalogVideo>> {
    stream::try_unfold(Cursor::Start, move |cursor| {
        next_page(catalog, channel_id, cursor)
    })
    .map_ok(|videos| stream::iter(videos.into_iter().map(Ok::<CatalogVideo, Error>)))
    .try_flatten()
    .boxed()
}

/// Channel id for a configured channel, looking the handle up if needed.
pub async fn resolve(catalog: &dyn VideoCatalog, channel: &ChannelRef) -> Result<String> {
    match channel {
        ChannelRef::Id(id) => Ok(id.clone()),
        ChannelRef::Handle(handle) => catalog.resolve_channel(handle).await,
    }
}
