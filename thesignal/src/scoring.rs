//! Importance scoring, categorization and bullet summaries via the scoring model.
//!
//! A response that does not parse never fails the call: every item gets the
//! default verdict (score 5, `Other`, first 120 chars of content). An item the
//! model skipped gets the same defaults individually.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::UpstreamError;
use crate::llm::{extract_json_from_text, LlmProvider, LlmRequest};
use crate::model::{CandidateItem, Category, ScoredItem, MAX_BULLETS, MAX_SCORE, MIN_SCORE};

const SCORING_GUIDE: &str = r#"Scoring guide:
- 9-10: Major model releases, significant safety findings, landmark policy
- 7-8: New research papers with clear impact, company pivots, notable funding
- 5-6: Minor releases, incremental research, general industry news
- 1-4: Opinion pieces, minor updates, duplicates of already-known news

Return ONLY the JSON array, no other text."#;

pub struct Scorer {
    provider: Arc<dyn LlmProvider>,
    max_tokens: usize,
    timeout_seconds: Option<u64>,
}

impl Scorer {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            max_tokens: 4096,
            timeout_seconds: None,
        }
    }

    pub fn with_limits(mut self, max_tokens: usize, timeout_seconds: Option<u64>) -> Self {
        self.max_tokens = max_tokens;
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Score a batch in a single upstream call.
    ///
    /// Empty input returns immediately. Transport, auth and credential errors
    /// are returned to the caller; malformed content is not an error.
    pub async fn score(&self, items: &[CandidateItem]) -> Result<Vec<ScoredItem>, UpstreamError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let request = LlmRequest {
            max_tokens: Some(self.max_tokens),
            temperature: Some(0.2),
            timeout_seconds: self.timeout_seconds,
            ..LlmRequest::new(build_scoring_prompt(items)?)
        };

        let response = self.provider.generate(request).await?;
        info!(
            items = items.len(),
            model = %response.model,
            total_tokens = response.usage.total_tokens,
            "scoring response received"
        );

        Ok(apply_scores(items, &response.content))
    }
}

/// Default verdict for every item.
pub fn default_scores(items: &[CandidateItem]) -> Vec<ScoredItem> {
    items.iter().cloned().map(ScoredItem::with_defaults).collect()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScoringInput<'a> {
    title: &'a str,
    url: &'a str,
    source_domain: &'a str,
    raw_content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    published_at: Option<DateTime<Utc>>,
}

pub fn build_scoring_prompt(items: &[CandidateItem]) -> Result<String, UpstreamError> {
    let inputs: Vec<ScoringInput<'_>> = items
        .iter()
        .map(|s| ScoringInput {
            title: &s.title,
            url: &s.url,
            source_domain: &s.source_domain,
            raw_content: &s.raw_content,
            published_at: s.published_at,
        })
        .collect();
    let stories_json = serde_json::to_string(&inputs)?;

    let categories = Category::ALL
        .iter()
        .map(Category::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!(
        "You are an AI news editor. Score each story for importance to the AI/ML community.\n\n\
         Return a JSON array where each item has:\n\
         - url: (same as input)\n\
         - score: number 1-10 (10 = groundbreaking, 7 = notable, 4 = routine, 1 = trivial/noise)\n\
         - bullets: array of up to {max_bullets} short bullet points explaining what happened and why it matters\n\
         - category: one of: {categories}\n\n\
         {guide}\n\n\
         Stories to score:\n{stories_json}",
        max_bullets = MAX_BULLETS,
        categories = categories,
        guide = SCORING_GUIDE,
        stories_json = stories_json,
    ))
}

/// One verdict as returned by the model. Fields are kept loose so a single
/// odd entry does not spoil the batch.
#[derive(Debug, Deserialize)]
struct ScoreEntry {
    url: String,
    #[serde(default)]
    score: Option<Value>,
    #[serde(default)]
    bullets: Option<Value>,
    #[serde(default)]
    category: Option<String>,
}

impl ScoreEntry {
    fn score(&self) -> Option<f64> {
        let raw = match self.score.as_ref()? {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };
        raw.is_finite().then(|| raw.clamp(MIN_SCORE, MAX_SCORE))
    }

    /// An array of strings, or one bare string taken as a single bullet.
    fn bullets(&self) -> Vec<String> {
        let raw: Vec<&Value> = match &self.bullets {
            Some(Value::Array(values)) => values.iter().collect(),
            Some(single @ Value::String(_)) => vec![single],
            _ => Vec::new(),
        };
        raw.into_iter()
            .filter_map(|b| b.as_str())
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .take(MAX_BULLETS)
            .map(str::to_string)
            .collect()
    }

    fn verdict(&self, item: CandidateItem) -> ScoredItem {
        let mut scored = ScoredItem::with_defaults(item);
        if let Some(score) = self.score() {
            scored.score = score;
        }
        let bullets = self.bullets();
        if !bullets.is_empty() {
            scored.summary_bullets = bullets;
        }
        if let Some(label) = self.category.as_deref() {
            scored.category = Category::from_label(label);
        }
        scored
    }
}

/// Merge the model's answer with the input batch, one `ScoredItem` per input in input order.
pub fn apply_scores(items: &[CandidateItem], content: &str) -> Vec<ScoredItem> {
    let cleaned = extract_json_from_text(content);
    let raw_entries: Vec<Value> = match serde_json::from_str(&cleaned) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, items = items.len(), "scoring response is not a JSON array, using defaults");
            return default_scores(items);
        }
    };

    let entries: Vec<ScoreEntry> = raw_entries
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect();

    let mut missing = 0usize;
    let scored = items
        .iter()
        .map(|item| match entries.iter().find(|e| e.url == item.url) {
            Some(entry) => entry.verdict(item.clone()),
            None => {
                missing += 1;
                ScoredItem::with_defaults(item.clone())
            }
        })
        .collect();

    if missing > 0 {
        warn!(missing, items = items.len(), "scoring response skipped some items, defaults applied");
    }
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DEFAULT_SCORE;

    fn item(url: &str, raw: &str) -> CandidateItem {
        CandidateItem {
            title: format!("title for {url}"),
            url: url.into(),
            source_domain: "example.com".into(),
            raw_content: raw.into(),
            published_at: None,
            author_handle: None,
            image_url: None,
        }
    }

    #[test]
    fn invalid_json_gives_defaults_for_every_item() {
        let items = vec![item("https://a", &"A".repeat(300)), item("https://b", "short")];
        let scored = apply_scores(&items, "Sorry, I can't do that.");
        assert_eq!(scored.len(), 2);
        for (s, i) in scored.iter().zip(&items) {
            assert_eq!(s.score, DEFAULT_SCORE);
            assert_eq!(s.category, Category::Other);
            assert_eq!(s.summary_bullets, vec![i.raw_content.chars().take(120).collect::<String>()]);
        }
    }

    #[test]
    fn missing_entry_defaults_only_that_item() {
        let items = vec![item("https://a", "alpha content"), item("https://b", "beta content")];
        let response = r#"```json
[{"url":"https://a","score":9.2,"bullets":["one","two","three","four"],"category":"Model Releases"}]
```"#;
        let scored = apply_scores(&items, response);

        assert_eq!(scored[0].score, 9.2);
        assert_eq!(scored[0].category, Category::ModelReleases);
        assert_eq!(scored[0].summary_bullets, vec!["one", "two", "three"]);

        assert_eq!(scored[1].score, DEFAULT_SCORE);
        assert_eq!(scored[1].category, Category::Other);
        assert_eq!(scored[1].summary_bullets, vec!["beta content"]);
    }

    #[test]
    fn loose_fields_are_tolerated() {
        let items = vec![item("https://a", "alpha"), item("https://b", "beta")];
        let response = r#"[
            {"url":"https://a","score":"14","bullets":[1, "kept", null],"category":"Crypto"},
            {"score": 3},
            {"url":"https://b","score":0,"bullets":[]}
        ]"#;
        let scored = apply_scores(&items, response);

        assert_eq!(scored[0].score, 10.0);
        assert_eq!(scored[0].summary_bullets, vec!["kept"]);
        assert_eq!(scored[0].category, Category::Other);

        assert_eq!(scored[1].score, 1.0);
        assert_eq!(scored[1].summary_bullets, vec!["beta"]);
    }

    #[test]
    fn single_string_bullets_keep_the_entry() {
        let items = vec![item("https://a", "alpha")];
        let response =
            r#"[{"url":"https://a","score":9,"bullets":"one bullet","category":"Research"}]"#;
        let scored = apply_scores(&items, response);

        assert_eq!(scored[0].score, 9.0);
        assert_eq!(scored[0].category, Category::Research);
        assert_eq!(scored[0].summary_bullets, vec!["one bullet"]);
    }

    #[test]
    fn backticks_inside_bare_json_are_not_fences() {
        let items = vec![item("https://a", "alpha")];
        let response = r#"[{"url":"https://a","score":9,"bullets":["Ships a ```pip install``` one-liner"],"category":"Research"}]"#;
        let scored = apply_scores(&items, response);

        assert_eq!(scored[0].score, 9.0);
        assert_eq!(scored[0].category, Category::Research);
        assert_eq!(scored[0].summary_bullets, vec!["Ships a ```pip install``` one-liner"]);
    }

    #[test]
    fn prompt_lists_categories_and_items() {
        let prompt = build_scoring_prompt(&[item("https://a", "alpha")]).unwrap();
        assert!(prompt.contains("Model Releases, Research, AI Policy, Industry, AI Safety, AI Agents, Other"));
        assert!(prompt.contains("\"url\":\"https://a\""));
        assert!(prompt.contains("\"sourceDomain\":\"example.com\""));
        assert!(!prompt.contains("publishedAt"));
    }
}
