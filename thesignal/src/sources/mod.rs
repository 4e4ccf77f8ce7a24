//! Upstream news sources.
//!
//! Every adapter call is independent: a failure is returned to the caller
//! and never cancels sibling calls.

use futures::future::join_all;
use tracing::{info, warn};

use crate::error::UpstreamError;
use crate::model::CandidateItem;

pub mod search;
pub mod social;

/// Search-style source: one request per topic query.
#[async_trait::async_trait]
pub trait SearchSource: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<CandidateItem>, UpstreamError>;
}

/// Per-account failure kept for logging.
#[derive(Debug)]
pub struct AccountFailure {
    pub handle: String,
    pub error: UpstreamError,
}

/// Items fetched from the accounts that answered, plus the ones that did not.
#[derive(Debug, Default)]
pub struct AccountBatch {
    pub items: Vec<CandidateItem>,
    pub failures: Vec<AccountFailure>,
}

/// Account-timeline source: one request per monitored identity.
#[async_trait::async_trait]
pub trait TimelineSource: Send + Sync {
    async fn fetch_account(&self, handle: &str) -> Result<Vec<CandidateItem>, UpstreamError>;

    /// Fetch every account concurrently. Individual failures end up in
    /// `AccountBatch::failures`; an `Err` means the whole source is unusable.
    async fn fetch_accounts(&self, handles: &[String]) -> Result<AccountBatch, UpstreamError> {
        let results = join_all(handles.iter().map(|handle| async move {
            (handle, self.fetch_account(handle).await)
        }))
        .await;

        let mut batch = AccountBatch::default();
        for (handle, result) in results {
            match result {
                Ok(items) => batch.items.extend(items),
                Err(error) => {
                    warn!(handle = %handle, %error, "account fetch failed");
                    batch.failures.push(AccountFailure {
                        handle: handle.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            accounts = handles.len(),
            failed = batch.failures.len(),
            items = batch.items.len(),
            "account timelines fetched"
        );
        Ok(batch)
    }
}
