/*!
common/src/lib.rs

Shared configuration types and DB helper functions for The Signal.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader merging a default config file with an optional override
- A helper to initialize the SQLite connection pool
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// Database configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the sqlite database file (e.g. "data/thesignal.db")
    pub path: String,
}

/// Scheduler configuration for the recurring fetch job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Minutes between two fetch runs in worker mode
    #[serde(default = "default_fetch_interval")]
    pub fetch_interval_minutes: u64,
    /// Run once immediately when the worker starts
    #[serde(default = "default_true")]
    pub run_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            fetch_interval_minutes: default_fetch_interval(),
            run_on_start: true,
        }
    }
}

/// Search-style news source (OpenAI-compatible chat endpoint with web search)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    /// One upstream request is issued per query on every run
    #[serde(default)]
    pub queries: Vec<String>,
}

/// A monitored social account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub username: String,
    /// Topic bucket used for display grouping; does not affect fetching
    pub category: Option<String>,
}

/// Account-timeline source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

impl SocialConfig {
    pub fn usernames(&self) -> Vec<String> {
        self.accounts.iter().map(|a| a.username.clone()).collect()
    }
}

/// Remote LLM config used for scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_tokens: Option<usize>,
}

/// Preview image enrichment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailConfig {
    #[serde(default)]
    pub enabled: bool,
    pub timeout_seconds: Option<u64>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    pub search: Option<SearchConfig>,
    pub social: Option<SocialConfig>,
    pub llm: Option<RemoteLlmConfig>,
    pub thumbnails: Option<ThumbnailConfig>,
}

fn default_fetch_interval() -> u64 {
    180
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for path in [default_path, override_path].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse configuration: {}", path.display()))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        Ok(cfg)
    }

    pub fn search_queries(&self) -> Vec<String> {
        self.search.as_ref().map(|s| s.queries.clone()).unwrap_or_default()
    }

    pub fn account_usernames(&self) -> Vec<String> {
        self.social.as_ref().map(SocialConfig::usernames).unwrap_or_default()
    }
}

/// Tables merge key by key; any other value in `b` replaces the one in `a`.
/// Arrays are replaced wholesale, so an override `queries = [...]` fully
/// swaps the default list.
fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

/// Initialize an SQLite connection pool.
///
/// Creates the parent directory if necessary and the DB file if it is missing.
/// Defaults are conservative: 5 connections, WAL journal.
///
/// Example:
///   let pool = init_db_pool("data/thesignal.db").await?;
pub async fn init_db_pool(path: &str) -> Result<SqlitePool> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create DB parent directory: {}", parent.display())
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to connect to sqlite database at path: {}", path))?;

    Ok(pool)
}
