//! The fetch run: fan out to every source, merge, dedupe, score, store, log.
//!
//! `FetchJob::run` never fails. Whatever happens is folded into the
//! returned `RunOutcome`, which is also appended to the run log.

use anyhow::Context;
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::dedup::dedupe;
use crate::error::UpstreamError;
use crate::model::{CandidateItem, RunOutcome, RunStatus};
use crate::scoring::{default_scores, Scorer};
use crate::sources::{SearchSource, TimelineSource};
use crate::storage::{RunLogRecorder, StoryStore};
use crate::thumbnails::PreviewImageFetcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunPhase {
    Snapshot,
    Fetching,
    Deduplicating,
    Scoring,
    Persisting,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunPhase::Snapshot => "snapshot",
            RunPhase::Fetching => "fetching",
            RunPhase::Deduplicating => "deduplicating",
            RunPhase::Scoring => "scoring",
            RunPhase::Persisting => "persisting",
        })
    }
}

/// What the fan-out produced: every item that arrived plus the queries that did not answer.
#[derive(Debug, Default)]
struct Gathered {
    items: Vec<CandidateItem>,
    failed_queries: Vec<(String, UpstreamError)>,
}

pub struct FetchJob {
    stories: Arc<dyn StoryStore>,
    run_log: Arc<dyn RunLogRecorder>,
    search: Arc<dyn SearchSource>,
    timeline: Arc<dyn TimelineSource>,
    scorer: Scorer,
    queries: Vec<String>,
    accounts: Vec<String>,
    thumbnails: Option<PreviewImageFetcher>,
}

impl FetchJob {
    pub fn new(
        stories: Arc<dyn StoryStore>,
        run_log: Arc<dyn RunLogRecorder>,
        search: Arc<dyn SearchSource>,
        timeline: Arc<dyn TimelineSource>,
        scorer: Scorer,
    ) -> Self {
        Self {
            stories,
            run_log,
            search,
            timeline,
            scorer,
            queries: Vec::new(),
            accounts: Vec::new(),
            thumbnails: None,
        }
    }

    pub fn with_queries(mut self, queries: Vec<String>) -> Self {
        self.queries = queries;
        self
    }

    pub fn with_accounts(mut self, accounts: Vec<String>) -> Self {
        self.accounts = accounts;
        self
    }

    pub fn with_thumbnails(mut self, fetcher: Option<PreviewImageFetcher>) -> Self {
        self.thumbnails = fetcher;
        self
    }

    /// Run the pipeline once and record the outcome.
    pub async fn run(&self) -> RunOutcome {
        info!(
            queries = self.queries.len(),
            accounts = self.accounts.len(),
            "fetch run starting"
        );

        let outcome = match self.execute().await {
            Ok(outcome) => outcome,
            Err(e) => {
                let detail = format!("{:#}", e);
                error!(error = %detail, "fetch run aborted");
                RunOutcome::error(detail)
            }
        };

        if let Err(e) = self.run_log.append_run_log(&outcome).await {
            error!(%e, "failed to record run outcome");
        }

        match outcome.status {
            RunStatus::Error => warn!(
                stored = outcome.items_stored,
                detail = outcome.error_detail.as_deref().unwrap_or(""),
                "fetch run finished with error"
            ),
            _ => info!(stored = outcome.items_stored, "fetch run finished"),
        }
        outcome
    }

    async fn execute(&self) -> anyhow::Result<RunOutcome> {
        let existing = self
            .stories
            .list_existing_urls()
            .await
            .with_context(|| format!("{} failed", RunPhase::Snapshot))?;

        let gathered = self.gather().await;
        info!(
            phase = %RunPhase::Fetching,
            items = gathered.items.len(),
            failed_queries = gathered.failed_queries.len(),
            "sources gathered"
        );

        let fresh = dedupe(gathered.items, &existing);
        info!(phase = %RunPhase::Deduplicating, fresh = fresh.len(), known = existing.len(), "deduplicated");

        let stored = if fresh.is_empty() {
            0
        } else {
            let fresh = match &self.thumbnails {
                Some(fetcher) => fetcher.enrich(fresh).await,
                None => fresh,
            };

            let scored = match self.scorer.score(&fresh).await {
                Ok(scored) => scored,
                Err(e) => {
                    warn!(phase = %RunPhase::Scoring, error = %e, items = fresh.len(), "scorer failed, applying default scores");
                    default_scores(&fresh)
                }
            };

            self.stories
                .insert_scored_items(&scored)
                .await
                .with_context(|| format!("{} failed", RunPhase::Persisting))?
        };

        Ok(decide_outcome(self.queries.len(), &gathered.failed_queries, stored))
    }

    /// Fan out to every query and the account group, then wait for all of them.
    async fn gather(&self) -> Gathered {
        let searches = join_all(self.queries.iter().map(|query| async move {
            (query, self.search.search(query).await)
        }));
        let timelines = self.timeline.fetch_accounts(&self.accounts);

        let (search_results, timeline_result) = tokio::join!(searches, timelines);

        let mut gathered = Gathered::default();
        for (query, result) in search_results {
            match result {
                Ok(items) => gathered.items.extend(items),
                Err(e) => {
                    warn!(query = %query, error = %e, "search query failed");
                    gathered.failed_queries.push((query.clone(), e));
                }
            }
        }

        match timeline_result {
            Ok(batch) => gathered.items.extend(batch.items),
            Err(e) => warn!(error = %e, "account timelines unavailable, continuing without them"),
        }

        gathered
    }
}

/// `error` only when there were queries, every one of them failed, and nothing got stored.
fn decide_outcome(
    total_queries: usize,
    failed_queries: &[(String, UpstreamError)],
    stored: usize,
) -> RunOutcome {
    let all_failed = total_queries > 0 && failed_queries.len() == total_queries;
    if all_failed && stored == 0 {
        let first = failed_queries
            .first()
            .map(|(_, e)| e.to_string())
            .unwrap_or_default();
        return RunOutcome::error(format!(
            "all {} search queries failed: {}",
            total_queries, first
        ));
    }
    RunOutcome::success(stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failures(n: usize) -> Vec<(String, UpstreamError)> {
        (0..n)
            .map(|i| (format!("q{i}"), UpstreamError::Unavailable("connection refused".into())))
            .collect()
    }

    #[test]
    fn all_queries_failed_and_nothing_stored_is_error() {
        let outcome = decide_outcome(2, &failures(2), 0);
        assert_eq!(outcome.status, RunStatus::Error);
        assert_eq!(outcome.items_stored, 0);
        let detail = outcome.error_detail.unwrap();
        assert!(detail.starts_with("all 2 search queries failed"));
        assert!(detail.contains("connection refused"));
    }

    #[test]
    fn all_queries_failed_but_timeline_items_stored_is_success() {
        let outcome = decide_outcome(2, &failures(2), 3);
        assert_eq!(outcome, RunOutcome::success(3));
    }

    #[test]
    fn partial_query_failure_is_success() {
        assert_eq!(decide_outcome(3, &failures(1), 0), RunOutcome::success(0));
    }

    #[test]
    fn no_queries_configured_is_never_error() {
        assert_eq!(decide_outcome(0, &[], 0), RunOutcome::success(0));
    }
}
