//! Provider records as returned by the GitHub REST API.
//!
//! Only the fields the window detector and normalizer read are modelled;
//! everything else in the response is ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub login: String,
}

fn login_or_unknown(actor: Option<&Actor>) -> &str {
    actor.map(|a| a.login.as_str()).unwrap_or("unknown")
}

/// An open pull request from `GET /repos/{owner}/{repo}/pulls`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPullRequest {
    #[serde(default)]
    pub number: u64,
    pub title: String,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user: Option<Actor>,
}

impl RawPullRequest {
    pub fn author(&self) -> &str {
        login_or_unknown(self.user.as_ref())
    }
}

/// Envelope of `GET /repos/{owner}/{repo}/actions/runs`.
#[derive(Debug, Deserialize)]
pub struct WorkflowRunsResponse {
    #[serde(default)]
    pub workflow_runs: Vec<RawWorkflowRun>,
}

/// One GitHub Actions workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawWorkflowRun {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// `None` while the run is queued or in progress.
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub head_branch: Option<String>,
    pub html_url: String,
    pub updated_at: DateTime<Utc>,
}

impl RawWorkflowRun {
    /// A run is terminal once it carries a conclusion.
    pub fn is_terminal(&self) -> bool {
        self.conclusion.as_deref().is_some_and(|c| !c.is_empty())
    }

    pub fn succeeded(&self) -> bool {
        self.conclusion.as_deref() == Some("success")
    }

    pub fn workflow_name(&self) -> &str {
        self.name.as_deref().unwrap_or("workflow")
    }

    pub fn branch(&self) -> &str {
        self.head_branch.as_deref().unwrap_or("unknown")
    }
}

/// Discriminator of a repository activity event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityKind {
    Push,
    Create,
    Delete,
    Other(String),
}

impl From<String> for ActivityKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "PushEvent" => Self::Push,
            "CreateEvent" => Self::Create,
            "DeleteEvent" => Self::Delete,
            _ => Self::Other(kind),
        }
    }
}

impl From<ActivityKind> for String {
    fn from(kind: ActivityKind) -> Self {
        match kind {
            ActivityKind::Push => "PushEvent".to_string(),
            ActivityKind::Create => "CreateEvent".to_string(),
            ActivityKind::Delete => "DeleteEvent".to_string(),
            ActivityKind::Other(other) => other,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCommit {
    #[serde(default)]
    pub message: String,
}

/// The type-specific part of an activity event. Push events carry `ref`
/// (`refs/heads/<branch>`) and `commits`; create/delete events carry the bare
/// ref name and `ref_type`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityPayload {
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    pub ref_type: Option<String>,
    pub commits: Vec<RawCommit>,
}

/// One entry of `GET /repos/{owner}/{repo}/events`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawActivityEvent {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    #[serde(default)]
    pub actor: Option<Actor>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub payload: ActivityPayload,
}

impl RawActivityEvent {
    pub fn author(&self) -> &str {
        login_or_unknown(self.actor.as_ref())
    }

    /// Branch name with any `refs/heads/` prefix removed.
    pub fn branch(&self) -> Option<&str> {
        self.payload.git_ref.as_deref().map(strip_heads)
    }

    pub fn targets_branch(&self) -> bool {
        self.payload.ref_type.as_deref() == Some("branch")
    }
}

pub(crate) fn strip_heads(git_ref: &str) -> &str {
    git_ref.strip_prefix("refs/heads/").unwrap_or(git_ref)
}
