use std::time::Duration;

use channel_reports::catalog::VideoCatalog;
use channel_reports::config::{GeminiConfig, ImageSearchConfig, YouTubeConfig};
use channel_reports::error::Error;
use channel_reports::gemini::GeminiClient;
use channel_reports::image_search::{CustomSearchClient, ImageLookup};
use channel_reports::summary::{Summarizer, REPORT_INSTRUCTIONS};
use channel_reports::youtube::YouTubeClient;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn http() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

fn youtube(server: &MockServer) -> YouTubeClient {
    YouTubeClient::new(
        http(),
        YouTubeConfig {
            api_key: "yt-key".to_string(),
            base_url: server.uri(),
            min_duration_secs: 60,
            recent_fetch_size: 10,
        },
    )
}

fn search_item(id: &str, published_at: &str) -> serde_json::Value {
    json!({
        "id": { "kind": "youtube#video", "videoId": id },
        "snippet": {
            "channelId": "UC123",
            "title": format!("Video {}", id),
            "publishedAt": published_at
        }
    })
}

async fn mount_durations(server: &MockServer, durations: &[(&str, &str)]) {
    let items: Vec<_> = durations
        .iter()
        .map(|(id, d)| json!({ "id": id, "contentDetails": { "duration": d } }))
        .collect();
    Mock::given(method("GET"))
        .and(path("/videos"))
        .and(query_param("part", "contentDetails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": items })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn youtube_page_drops_shorts_and_keeps_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("key", "yt-key"))
        .and(query_param("channelId", "UC123"))
        .and(query_param("pageToken", "tok1"))
        .and(query_param("maxResults", "50"))
        .and(query_param("order", "date"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                search_item("long1", "2025-03-02T10:00:00Z"),
                search_item("short1", "2025-03-01T10:00:00Z"),
                search_item("long2", "2025-02-28T10:00:00Z")
            ],
            "nextPageToken": "tok2"
        })))
        .mount(&server)
        .await;
    mount_durations(&server, &[("long1", "PT12M3S"), ("short1", "PT59S"), ("long2", "PT1H")]).await;

    let page = youtube(&server).list_page("UC123", Some("tok1")).await.unwrap();

    let ids: Vec<&str> = page.videos.iter().map(|v| v.external_id.as_str()).collect();
    assert_eq!(ids, vec!["long1", "long2"]);
    assert_eq!(page.next_page_token.as_deref(), Some("tok2"));
    assert_eq!(page.videos[0].url, "https://www.youtube.com/watch?v=long1");
    assert_eq!(page.videos[0].title.as_deref(), Some("Video long1"));
    assert_eq!(page.videos[0].published_at.to_rfc3339(), "2025-03-02T10:00:00+00:00");
}

#[tokio::test]
async fn youtube_recent_keeps_newest_long_form_videos() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("maxResults", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                search_item("s1", "2025-03-05T10:00:00Z"),
                search_item("v4", "2025-03-04T10:00:00Z"),
                search_item("v3", "2025-03-03T10:00:00Z"),
                search_item("v2", "2025-03-02T10:00:00Z"),
                search_item("v1", "2025-03-01T10:00:00Z")
            ]
        })))
        .mount(&server)
        .await;
    mount_durations(
        &server,
        &[
            ("s1", "PT30S"),
            ("v4", "PT5M"),
            ("v3", "PT5M"),
            ("v2", "PT5M"),
            ("v1", "PT5M"),
        ],
    )
    .await;

    let videos = youtube(&server).list_recent("UC123", 3).await.unwrap();

    let ids: Vec<&str> = videos.iter().map(|v| v.external_id.as_str()).collect();
    assert_eq!(ids, vec!["v4", "v3", "v2"]);
}

#[tokio::test]
async fn youtube_missing_duration_counts_as_short() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [search_item("gone", "2025-03-01T10:00:00Z")]
        })))
        .mount(&server)
        .await;
    mount_durations(&server, &[]).await;

    let page = youtube(&server).list_page("UC123", None).await.unwrap();
    assert!(page.videos.is_empty());
    assert_eq!(page.next_page_token, None);
}

#[tokio::test]
async fn youtube_resolves_handle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "Trustified-Certification"))
        .and(query_param("type", "channel"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{
                "id": { "kind": "youtube#channel", "channelId": "UCabc" },
                "snippet": { "channelId": "UCabc", "title": "Trustified" }
            }]
        })))
        .mount(&server)
        .await;

    let id = youtube(&server)
        .resolve_channel("@Trustified-Certification")
        .await
        .unwrap();
    assert_eq!(id, "UCabc");
}

#[tokio::test]
async fn youtube_unknown_handle_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .mount(&server)
        .await;

    let err = youtube(&server).resolve_channel("@nobody").await.unwrap_err();
    assert!(matches!(err, Error::ChannelNotFound(handle) if handle == "nobody"));
}

#[tokio::test]
async fn youtube_api_error_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(403).set_body_string("quotaExceeded"))
        .mount(&server)
        .await;

    let err = youtube(&server).list_page("UC123", None).await.unwrap_err();
    match err {
        Error::Api { status, body, .. } => {
            assert_eq!(status.as_u16(), 403);
            assert_eq!(body, "quotaExceeded");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

fn gemini(server: &MockServer) -> GeminiClient {
    GeminiClient::new(
        http(),
        GeminiConfig {
            api_key: "gm-key".to_string(),
            model: "gemini-2.5-flash".to_string(),
            base_url: server.uri(),
            temperature: 0.1,
        },
    )
}

#[tokio::test]
async fn gemini_parses_fenced_report() {
    let server = MockServer::start().await;
    let text = "```json\n{\"product_id\":\"ACMEWHEY\",\"product_info\":{\"product_name\":\"Acme Whey\"}}\n```";
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.5-flash:generateContent"))
        .and(query_param("key", "gm-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 900, "candidatesTokenCount": 300 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let summary = gemini(&server)
        .summarize("https://www.youtube.com/watch?v=abc", REPORT_INSTRUCTIONS)
        .await
        .unwrap();

    assert_eq!(summary.product_id(), Some("ACMEWHEY"));
    assert_eq!(summary.product_name(), Some("Acme Whey"));

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("https://www.youtube.com/watch?v=abc"));
    assert!(body["tools"][0].get("google_search").is_some());
}

#[tokio::test]
async fn gemini_without_text_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        })))
        .mount(&server)
        .await;

    let err = gemini(&server)
        .summarize("https://www.youtube.com/watch?v=abc", REPORT_INSTRUCTIONS)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Malformed { .. }));
}

#[tokio::test]
async fn gemini_http_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;

    let err = gemini(&server)
        .summarize("https://www.youtube.com/watch?v=abc", REPORT_INSTRUCTIONS)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Api { .. }));
}

fn custom_search(server: &MockServer) -> CustomSearchClient {
    CustomSearchClient::new(
        http(),
        ImageSearchConfig {
            api_key: "cs-key".to_string(),
            engine_id: "engine".to_string(),
            base_url: format!("{}/customsearch/v1", server.uri()),
        },
    )
}

#[tokio::test]
async fn custom_search_returns_first_link() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customsearch/v1"))
        .and(query_param("key", "cs-key"))
        .and(query_param("cx", "engine"))
        .and(query_param("q", "Acme Whey"))
        .and(query_param("searchType", "image"))
        .and(query_param("num", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                { "link": "https://img.example.com/1.jpg" },
                { "link": "https://img.example.com/2.jpg" }
            ]
        })))
        .mount(&server)
        .await;

    let url = custom_search(&server).find_image("Acme Whey").await.unwrap();
    assert_eq!(url.as_deref(), Some("https://img.example.com/1.jpg"));
}

#[tokio::test]
async fn custom_search_without_items_finds_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "searchInformation": { "totalResults": "0" }
        })))
        .mount(&server)
        .await;

    let url = custom_search(&server).find_image("Nothing").await.unwrap();
    assert_eq!(url, None);
}
