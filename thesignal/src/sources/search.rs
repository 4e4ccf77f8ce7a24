use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use super::SearchSource;
use crate::error::UpstreamError;
use crate::llm::{extract_json_from_text, LlmProvider, LlmRequest};
use crate::model::CandidateItem;
use crate::normalize::{normalize, RawCandidate};

// The five-story cap and the 24h window are requests to the model, not checked here
const SEARCH_PROMPT: &str = r#"You are a news extraction assistant. Given a search query about AI news,
return a JSON array of the most relevant, distinct news stories from the last 24 hours.
Each item must have: title, url, sourceDomain, rawContent (2-3 sentence summary), publishedAt (ISO string if known).
Return ONLY the JSON array, no other text. Maximum 5 stories per query."#;

/// Search source backed by a web-grounded chat model (Perplexity style).
pub struct SearchClient {
    provider: Arc<dyn LlmProvider>,
    max_tokens: usize,
}

impl SearchClient {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            max_tokens: 2000,
        }
    }
}

/// One story as the search model describes it. Every field may be missing or null.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchHit {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    source_domain: Option<String>,
    #[serde(default)]
    raw_content: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
}

impl From<SearchHit> for RawCandidate {
    fn from(hit: SearchHit) -> Self {
        RawCandidate {
            title: hit.title.unwrap_or_default(),
            url: hit.url.unwrap_or_default(),
            source_domain: hit.source_domain,
            raw_content: hit.raw_content.unwrap_or_default(),
            published_at: hit.published_at,
            author_handle: None,
            image_url: hit.image_url,
        }
    }
}

/// Parse the model's text answer into candidate items.
///
/// Only a non-array answer is malformed; a single odd hit is skipped.
pub fn parse_search_response(content: &str) -> Result<Vec<CandidateItem>, UpstreamError> {
    let cleaned = extract_json_from_text(content);
    let hits: Vec<Value> = serde_json::from_str(&cleaned)?;
    let total = hits.len();

    let items: Vec<CandidateItem> = hits
        .into_iter()
        .filter_map(|v| serde_json::from_value::<SearchHit>(v).ok())
        .filter_map(|hit| normalize(hit.into()))
        .collect();

    if items.len() < total {
        debug!(skipped = total - items.len(), "search hits without usable fields dropped");
    }
    Ok(items)
}

#[async_trait::async_trait]
impl SearchSource for SearchClient {
    async fn search(&self, query: &str) -> Result<Vec<CandidateItem>, UpstreamError> {
        let request = LlmRequest {
            max_tokens: Some(self.max_tokens),
            temperature: Some(0.2),
            ..LlmRequest::new(format!("Find the latest AI news stories for: {}", query))
        }
        .with_system(SEARCH_PROMPT);

        let response = self.provider.generate(request).await?;
        debug!(query, chars = response.content.len(), "search response received");

        let items = parse_search_response(&response.content)?;
        info!(query, items = items.len(), "search query returned items");
        Ok(items)
    }
}
