use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::model::{Category, RunOutcome, RunStatus, ScoredItem, DEFAULT_SCORE};

/// Keyed story storage as seen by the fetch pipeline.
#[async_trait::async_trait]
pub trait StoryStore: Send + Sync {
    /// Every story URL currently stored.
    async fn list_existing_urls(&self) -> Result<HashSet<String>>;

    /// Insert the batch, silently skipping URLs that already exist.
    /// Returns how many rows were actually inserted.
    async fn insert_scored_items(&self, items: &[ScoredItem]) -> Result<usize>;
}

/// Durable audit trail of fetch runs.
#[async_trait::async_trait]
pub trait RunLogRecorder: Send + Sync {
    async fn append_run_log(&self, outcome: &RunOutcome) -> Result<()>;
}

/// A story as read back for status displays.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredStory {
    pub title: String,
    pub url: String,
    pub source_domain: String,
    pub summary_bullets: Vec<String>,
    pub score: f64,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunLogEntry {
    pub ran_at: DateTime<Utc>,
    pub stories_found: i64,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Decode a stored summary.
///
/// Current rows hold a JSON array of strings; older rows hold one plain-text
/// summary, which becomes a single bullet. Non-string array members are dropped.
pub fn parse_bullets(summary: Option<&str>) -> Vec<String> {
    let Some(summary) = summary.filter(|s| !s.is_empty()) else {
        return Vec::new();
    };
    match serde_json::from_str::<serde_json::Value>(summary) {
        Ok(serde_json::Value::Array(values)) => values
            .into_iter()
            .filter_map(|v| match v {
                serde_json::Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => vec![summary.to_string()],
    }
}

/// SQLite-backed store for stories and fetch logs.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS stories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                source_domain TEXT NOT NULL,
                raw_content TEXT NOT NULL,
                summary TEXT,
                score REAL,
                category TEXT,
                author_handle TEXT,
                image_url TEXT,
                published_at DATETIME,
                fetched_at DATETIME NOT NULL,
                included_in_digest BOOLEAN NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create stories table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_stories_score ON stories (score DESC)")
            .execute(&self.pool)
            .await
            .context("failed to create stories score index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fetch_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ran_at DATETIME NOT NULL,
                stories_found INTEGER NOT NULL,
                status TEXT NOT NULL,
                error TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create fetch_logs table")?;

        debug!("schema ensured");
        Ok(())
    }

    /// Most recent fetch-log entry, if any run was recorded.
    pub async fn latest_run_log(&self) -> Result<Option<RunLogEntry>> {
        let row = sqlx::query(
            "SELECT ran_at, stories_found, status, error FROM fetch_logs ORDER BY ran_at DESC, id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch latest run log")?;

        row.map(|row| {
            let status: String = row.get("status");
            Ok(RunLogEntry {
                ran_at: row.get("ran_at"),
                stories_found: row.get("stories_found"),
                status: status.parse().map_err(anyhow::Error::msg)?,
                error: row.get("error"),
            })
        })
        .transpose()
    }

    pub async fn count_stories(&self) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM stories")
            .fetch_one(&self.pool)
            .await
            .context("failed to count stories")
    }

    /// Top-scored stories from the last `window`.
    ///
    /// A story counts as recent by `published_at`, or by `fetched_at` when it
    /// has no publication time.
    pub async fn recent_stories(
        &self,
        category: Option<Category>,
        limit: i64,
        window: Duration,
    ) -> Result<Vec<StoredStory>> {
        let since = Utc::now() - window;
        let category = category.map(|c| c.as_str().to_string());

        let rows = sqlx::query(
            r#"
            SELECT title, url, source_domain, summary, score, category,
                   author_handle, image_url, published_at, fetched_at
            FROM stories
            WHERE (published_at >= ? OR (published_at IS NULL AND fetched_at >= ?))
              AND (? IS NULL OR category = ?)
            ORDER BY score DESC, fetched_at DESC
            LIMIT ?
            "#,
        )
        .bind(since)
        .bind(since)
        .bind(&category)
        .bind(&category)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch recent stories")?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let summary: Option<String> = row.get("summary");
                let category: Option<String> = row.get("category");
                let score: Option<f64> = row.get("score");
                StoredStory {
                    title: row.get("title"),
                    url: row.get("url"),
                    source_domain: row.get("source_domain"),
                    summary_bullets: parse_bullets(summary.as_deref()),
                    score: score.unwrap_or(DEFAULT_SCORE),
                    category: category
                        .as_deref()
                        .map(Category::from_label)
                        .unwrap_or(Category::Other),
                    author_handle: row.get("author_handle"),
                    image_url: row.get("image_url"),
                    published_at: row.get("published_at"),
                    fetched_at: row.get("fetched_at"),
                }
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl StoryStore for SqliteStore {
    async fn list_existing_urls(&self) -> Result<HashSet<String>> {
        let urls = sqlx::query_scalar::<_, String>("SELECT url FROM stories")
            .fetch_all(&self.pool)
            .await
            .context("failed to list existing story URLs")?;
        Ok(urls.into_iter().collect())
    }

    async fn insert_scored_items(&self, items: &[ScoredItem]) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }

        let fetched_at = Utc::now();
        let mut tx = self.pool.begin().await.context("failed to open transaction")?;
        let mut inserted = 0usize;

        for scored in items {
            let item = &scored.item;
            let summary = serde_json::to_string(&scored.summary_bullets)
                .context("failed to serialize summary bullets")?;

            // The UNIQUE(url) constraint makes concurrent runs race-safe
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO stories
                    (url, title, source_domain, raw_content, summary, score, category,
                     author_handle, image_url, published_at, fetched_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&item.url)
            .bind(&item.title)
            .bind(&item.source_domain)
            .bind(&item.raw_content)
            .bind(&summary)
            .bind(scored.score)
            .bind(scored.category.as_str())
            .bind(&item.author_handle)
            .bind(&item.image_url)
            .bind(item.published_at)
            .bind(fetched_at)
            .execute(&mut tx)
            .await
            .with_context(|| format!("failed to insert story {}", item.url))?;

            inserted += result.rows_affected() as usize;
        }

        tx.commit().await.context("failed to commit stories")?;
        info!(inserted, skipped = items.len() - inserted, "stories stored");
        Ok(inserted)
    }
}

#[async_trait::async_trait]
impl RunLogRecorder for SqliteStore {
    async fn append_run_log(&self, outcome: &RunOutcome) -> Result<()> {
        sqlx::query(
            "INSERT INTO fetch_logs (ran_at, stories_found, status, error) VALUES (?, ?, ?, ?)",
        )
        .bind(Utc::now())
        .bind(outcome.items_stored as i64)
        .bind(outcome.status.as_str())
        .bind(&outcome.error_detail)
        .execute(&self.pool)
        .await
        .context("failed to insert fetch log")?;
        Ok(())
    }
}
