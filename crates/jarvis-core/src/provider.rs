use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::raw::{RawActivityEvent, RawPullRequest, RawWorkflowRun};

/// Failure talking to the source-control provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

/// Read-only access to a repository's pull requests, workflow runs and
/// activity feed.
///
/// Implementations bound their own network calls. Callers treat any error
/// as an empty result for that repository and category.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn list_open_pull_requests(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<RawPullRequest>, ProviderError>;

    /// Recent runs, restricted to `branch` when given, across all branches
    /// otherwise.
    async fn list_workflow_runs(
        &self,
        owner: &str,
        repo: &str,
        branch: Option<&str>,
    ) -> Result<Vec<RawWorkflowRun>, ProviderError>;

    async fn list_recent_activity(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<RawActivityEvent>, ProviderError>;

    /// Completion time of the newest successful run of `workflow` (a
    /// workflow file name or id) in `owner/repo`.
    async fn last_successful_run(
        &self,
        owner: &str,
        repo: &str,
        workflow: &str,
    ) -> Result<Option<DateTime<Utc>>, ProviderError>;
}
