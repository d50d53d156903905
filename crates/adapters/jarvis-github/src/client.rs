use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;

use jarvis_core::provider::{ProviderClient, ProviderError};
use jarvis_core::raw::{RawActivityEvent, RawPullRequest, RawWorkflowRun, WorkflowRunsResponse};

use crate::config::GitHubClientConfig;

const API_VERSION: &str = "2022-11-28";

/// [`ProviderClient`] backed by the GitHub REST API.
pub struct GitHubClient {
    config: GitHubClientConfig,
    client: reqwest::Client,
}

impl GitHubClient {
    pub fn new(config: GitHubClientConfig) -> Result<Self, ProviderError> {
        let build_error = |message: String| ProviderError::Transport {
            url: config.api_base.clone(),
            message,
        };

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));
        if let Some(token) = config.token.as_deref().filter(|t| !t.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| build_error(format!("invalid token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        } else {
            tracing::warn!("No GitHub token configured, using unauthenticated rate limits");
        }

        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| build_error(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn repo_url(&self, owner: &str, repo: &str, path: &str) -> String {
        format!(
            "{}/repos/{owner}/{repo}/{path}",
            self.config.api_base.trim_end_matches('/')
        )
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let transport = |e: reqwest::Error| ProviderError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };

        let resp = self.client.get(url).query(query).send().await.map_err(transport)?;
        if !resp.status().is_success() {
            return Err(ProviderError::Status {
                url: url.to_string(),
                status: resp.status().as_u16(),
            });
        }
        let body = resp.bytes().await.map_err(transport)?;
        serde_json::from_slice(&body).map_err(|e| ProviderError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl ProviderClient for GitHubClient {
    async fn list_open_pull_requests(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<RawPullRequest>, ProviderError> {
        let url = self.repo_url(owner, repo, "pulls");
        self.get_json(&url, &[("state", "open".to_string())]).await
    }

    async fn list_workflow_runs(
        &self,
        owner: &str,
        repo: &str,
        branch: Option<&str>,
    ) -> Result<Vec<RawWorkflowRun>, ProviderError> {
        let url = self.repo_url(owner, repo, "actions/runs");
        let mut query = vec![("per_page", self.config.workflow_runs_per_page.to_string())];
        if let Some(branch) = branch {
            query.push(("branch", branch.to_string()));
        }
        let resp: WorkflowRunsResponse = self.get_json(&url, &query).await?;
        Ok(resp.workflow_runs)
    }

    async fn list_recent_activity(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<RawActivityEvent>, ProviderError> {
        let url = self.repo_url(owner, repo, "events");
        self.get_json(&url, &[("per_page", self.config.activity_per_page.to_string())])
            .await
    }

    async fn last_successful_run(
        &self,
        owner: &str,
        repo: &str,
        workflow: &str,
    ) -> Result<Option<DateTime<Utc>>, ProviderError> {
        let url = self.repo_url(owner, repo, &format!("actions/workflows/{workflow}/runs"));
        let resp: WorkflowRunsResponse = self
            .get_json(
                &url,
                &[("status", "success".to_string()), ("per_page", "1".to_string())],
            )
            .await?;
        Ok(resp.workflow_runs.first().map(|run| run.updated_at))
    }
}
