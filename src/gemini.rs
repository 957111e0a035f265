use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::GeminiConfig;
use crate::error::{Error, Result};
use crate::summary::{render_prompt, Summarizer, Summary};

const SERVICE: &str = "Gemini";

pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(client: Client, config: GeminiConfig) -> Self {
        Self { client, config }
    }

    async fn generate_content(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );

        // Grounding with Google Search lets the model read the video's
        // public metadata. It rules out a JSON response mime type, so the
        // reply is parsed from plain text.
        let body = json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }],
            "tools": [{ "google_search": {} }],
            "generationConfig": {
                "temperature": self.config.temperature
            }
        });

        let res = self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
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

        let json: Value = res
            .json()
            .await
            .map_err(|e| Error::malformed(SERVICE, e.to_string()))?;

        if let Some(usage) = json.get("usageMetadata") {
            tracing::debug!(
                input_tokens = usage["promptTokenCount"].as_i64(),
                output_tokens = usage["candidatesTokenCount"].as_i64(),
                "Gemini token usage"
            );
        }

        // candidates[0].content.parts may hold several text chunks when
        // grounding is on.
        let text: String = json["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|part| part["text"].as_str())
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            let reason = json["candidates"][0]["finishReason"]
                .as_str()
                .unwrap_or("no candidates");
            return Err(Error::malformed(
                SERVICE,
                format!("no text in response ({})", reason),
            ));
        }

        Ok(text)
    }
}

/// Removes a surrounding markdown code fence, if any.
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

pub fn parse_reports(text: &str) -> Result<Summary> {
    let clean = strip_code_fence(text);
    let value: Value = serde_json::from_str(clean).map_err(|e| {
        let preview: String = clean.chars().take(500).collect();
        Error::malformed(SERVICE, format!("invalid JSON: {} - text: {}", e, preview))
    })?;
    Summary::from_value(value)
}

#[async_trait]
impl Summarizer for GeminiClient {
    async fn summarize(&self, video_url: &str, instructions: &str) -> Result<Summary> {
        let prompt = render_prompt(instructions, video_url);
        tracing::info!(model = %self.config.model, video_url, "Requesting report from Gemini");

        let text = self.generate_content(&prompt).await?;
        let summary = parse_reports(&text)?;

        tracing::info!(
            video_url,
            reports = summary.len(),
            product_id = summary.product_id(),
            "Gemini returned report"
        );
        Ok(summary)
    }
}
