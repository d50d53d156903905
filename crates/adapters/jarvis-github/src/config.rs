use serde::{Deserialize, Serialize};

/// Connection settings for the GitHub REST API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubClientConfig {
    /// Personal access token. Usually supplied through `GITHUB_TOKEN`.
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub api_base: String,
    /// Page size of workflow-run listings.
    pub workflow_runs_per_page: u32,
    /// Page size of the repository activity feed.
    pub activity_per_page: u32,
    /// Bound on every request, connect through body.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for GitHubClientConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: "https://api.github.com".to_string(),
            workflow_runs_per_page: 5,
            activity_per_page: 30,
            timeout_secs: 10,
            user_agent: format!("jarvis/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl GitHubClientConfig {
    pub fn has_token(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }
}
