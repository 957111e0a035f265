//! Summarization capability: turns a video URL into structured product reports.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, Result};

/// Placeholder replaced by the video URL in [`REPORT_INSTRUCTIONS`].
pub const VIDEO_URL_PLACEHOLDER: &str = "{video_url}";

/// Fixed instructions sent with every video.
pub const REPORT_INSTRUCTIONS: &str = r#"You are a JSON generator for laboratory analysis reports. Always output valid JSON only, no conversational text or markdown.

Task: Analyze the YouTube video at: {video_url} and generate a laboratory analysis report.
If several products are tested, return a JSON list with one report per product.

The JSON keys MUST appear in this exact order:
1. debug_info: {can_access_url, url_access_method, video_info_found: {title, description}, product_identification_method, confidence_level, reasoning}
2. product_id: (COMPANY + NAME + FLAVOR) in ALL CAPS, no spaces
3. product_info: {product_name, product_category, serving_size, verdict}
4. basic_tests: {result, ...sub-tests}
5. contaminant_tests: {result, ...sub-tests}
6. review: {result, ...details}

Strict logic rules:
- Categories: only use Whey Concentrate, Whey Isolate, Whey Blend, Plant protein, Creatine, Food, Omega 3, Others.
- If the video only gives percentages for protein or creatine, calculate the per_serving value from serving_size.
- Use single values only. If a range is given, use the average.
- Every nutrient or test MUST contain "result" (Pass/Fail), "claimed" and "tested".

Example:
{
  "debug_info": {
    "can_access_url": false,
    "url_access_method": "web_search",
    "video_info_found": {"title": "Video title", "description": "Video description"},
    "product_identification_method": "metadata_inference",
    "confidence_level": "low",
    "reasoning": "Inferred from title and description only"
  },
  "product_id": "BRANDNAMEPRODUCTNAMEFLAVOR",
  "product_info": {
    "product_name": "Example Protein",
    "product_category": "Whey Concentrate",
    "serving_size": "1 Scoop (30g)",
    "verdict": "Pass"
  },
  "basic_tests": {
    "result": "Pass",
    "protein": {"result": "Pass", "claimed": "24g", "tested": "24.5g"}
  },
  "contaminant_tests": {
    "result": "Pass",
    "heavy_metals": {"result": "Pass", "status": "Below LOQ"}
  },
  "review": {
    "result": "Pass",
    "taste": {"result": "Pass", "description": "Good"}
  }
}"#;

pub fn render_prompt(instructions: &str, video_url: &str) -> String {
    instructions.replace(VIDEO_URL_PLACEHOLDER, video_url)
}

/// One or more product reports produced for a single video.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    reports: Vec<Value>,
}

impl Summary {
    /// Accepts a single report object or a non-empty list of them.
    pub fn from_value(value: Value) -> Result<Self> {
        let reports = match value {
            Value::Object(_) => vec![value],
            Value::Array(items) => items,
            other => {
                return Err(Error::malformed(
                    "Summarizer",
                    format!("expected a report object or list, got {}", other),
                ))
            }
        };

        if reports.is_empty() {
            return Err(Error::NoReports);
        }
        if let Some(bad) = reports.iter().find(|r| !r.is_object()) {
            return Err(Error::malformed(
                "Summarizer",
                format!("report is not an object: {}", bad),
            ));
        }

        Ok(Self { reports })
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// The report that gets persisted.
    pub fn primary(&self) -> &Value {
        &self.reports[0]
    }

    pub fn product_id(&self) -> Option<&str> {
        self.primary()["product_id"].as_str()
    }

    /// Image search terms taken from the primary report.
    pub fn product_name(&self) -> Option<&str> {
        self.primary()["product_info"]["product_name"]
            .as_str()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, video_url: &str, instructions: &str) -> Result<Summary>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_object_becomes_one_report() {
        let summary = Summary::from_value(json!({
            "product_id": "ACMEWHEYCHOCOLATE",
            "product_info": { "product_name": "  Acme Whey  " }
        }))
        .unwrap();

        assert_eq!(summary.len(), 1);
        assert_eq!(summary.product_id(), Some("ACMEWHEYCHOCOLATE"));
        assert_eq!(summary.product_name(), Some("Acme Whey"));
    }

    #[test]
    fn list_keeps_first_as_primary() {
        let summary = Summary::from_value(json!([
            { "product_id": "FIRST" },
            { "product_id": "SECOND" }
        ]))
        .unwrap();

        assert_eq!(summary.len(), 2);
        assert_eq!(summary.product_id(), Some("FIRST"));
        assert_eq!(summary.product_name(), None);
    }

    #[test]
    fn rejects_empty_and_scalar_payloads() {
        assert!(matches!(Summary::from_value(json!([])), Err(Error::NoReports)));
        assert!(matches!(
            Summary::from_value(json!("text")),
            Err(Error::Malformed { .. })
        ));
        assert!(matches!(
            Summary::from_value(json!([{ "a": 1 }, 2])),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn prompt_embeds_video_url() {
        let prompt = render_prompt(REPORT_INSTRUCTIONS, "https://www.youtube.com/watch?v=x");
        assert!(prompt.contains("video at: https://www.youtube.com/watch?v=x"));
        assert!(!prompt.contains(VIDEO_URL_PLACEHOLDER));
    }
}
