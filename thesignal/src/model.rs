use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::normalize::truncate_chars;

/// Score given to an item the scoring model said nothing about.
pub const DEFAULT_SCORE: f64 = 5.0;
pub const MIN_SCORE: f64 = 1.0;
pub const MAX_SCORE: f64 = 10.0;
pub const MAX_BULLETS: usize = 3;
/// Length of the raw-content excerpt used as the fallback summary bullet.
pub const FALLBACK_SUMMARY_CHARS: usize = 120;

/// A normalized, not-yet-scored news item. The URL is its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateItem {
    pub title: String,
    pub url: String,
    pub source_domain: String,
    pub raw_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl CandidateItem {
    /// Returns the item with a preview image attached. Items that already carry one keep it.
    pub fn with_image_url(mut self, image_url: String) -> Self {
        if self.image_url.is_none() && !image_url.trim().is_empty() {
            self.image_url = Some(image_url);
        }
        self
    }

    /// First 120 characters of the raw content.
    pub fn content_excerpt(&self) -> String {
        truncate_chars(&self.raw_content, FALLBACK_SUMMARY_CHARS)
    }
}

/// Fixed set of topics an item can be filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Model Releases")]
    ModelReleases,
    #[serde(rename = "Research")]
    Research,
    #[serde(rename = "AI Policy")]
    AiPolicy,
    #[serde(rename = "Industry")]
    Industry,
    #[serde(rename = "AI Safety")]
    AiSafety,
    #[serde(rename = "AI Agents")]
    AiAgents,
    #[serde(rename = "Other")]
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::ModelReleases,
        Category::Research,
        Category::AiPolicy,
        Category::Industry,
        Category::AiSafety,
        Category::AiAgents,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::ModelReleases => "Model Releases",
            Category::Research => "Research",
            Category::AiPolicy => "AI Policy",
            Category::Industry => "Industry",
            Category::AiSafety => "AI Safety",
            Category::AiAgents => "AI Agents",
            Category::Other => "Other",
        }
    }

    /// Lenient mapping used on model output: unknown labels land in `Other`.
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or(Category::Other)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown category: {}", wanted))
    }
}

/// A candidate item plus the scoring model's verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredItem {
    #[serde(flatten)]
    pub item: CandidateItem,
    pub score: f64,
    pub summary_bullets: Vec<String>,
    pub category: Category,
}

impl ScoredItem {
    /// Score 5, category Other, and a single bullet holding the first 120 characters of content.
    pub fn with_defaults(item: CandidateItem) -> Self {
        let bullets = vec![item.content_excerpt()];
        Self {
            item,
            score: DEFAULT_SCORE,
            summary_bullets: bullets,
            category: Category::Other,
        }
    }

    pub fn url(&self) -> &str {
        &self.item.url
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    /// Only written by the digest job; the fetch pipeline never produces it.
    Skipped,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Skipped => "skipped",
            RunStatus::Error => "error",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(RunStatus::Success),
            "skipped" => Ok(RunStatus::Skipped),
            "error" => Ok(RunStatus::Error),
            other => Err(format!("unknown run status: {}", other)),
        }
    }
}

/// Result of one fetch run, written to the run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub items_stored: usize,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl RunOutcome {
    pub fn success(items_stored: usize) -> Self {
        Self {
            items_stored,
            status: RunStatus::Success,
            error_detail: None,
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            items_stored: 0,
            status: RunStatus::Error,
            error_detail: Some(detail.into()),
        }
    }
}
