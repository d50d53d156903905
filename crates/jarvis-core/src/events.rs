use serde::{Deserialize, Serialize};

/// The canonical, provider-agnostic description of one notifiable happening.
///
/// Every variant carries everything [`render`] needs, so a chat message can be
/// produced without further lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationEvent {
    PullRequestOpened {
        repo: String,
        title: String,
        url: Option<String>,
        author: String,
    },
    PullRequestClosed {
        repo: String,
        title: String,
        url: Option<String>,
        author: String,
        merged: bool,
    },
    Push {
        repo: String,
        branch: String,
        author: String,
        commit_summary: Option<String>,
    },
    BranchCreated {
        repo: String,
        branch: String,
        author: String,
    },
    BranchDeleted {
        repo: String,
        branch: String,
        author: String,
    },
    BuildCompleted {
        repo: String,
        branch: String,
        workflow_name: String,
        succeeded: bool,
        url: Option<String>,
    },
}

impl NotificationEvent {
    pub fn repo(&self) -> &str {
        match self {
            Self::PullRequestOpened { repo, .. }
            | Self::PullRequestClosed { repo, .. }
            | Self::Push { repo, .. }
            | Self::BranchCreated { repo, .. }
            | Self::BranchDeleted { repo, .. }
            | Self::BuildCompleted { repo, .. } => repo,
        }
    }

    /// Short machine name, used in logs and HTTP responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PullRequestOpened { .. } => "pull_request_opened",
            Self::PullRequestClosed { .. } => "pull_request_closed",
            Self::Push { .. } => "push",
            Self::BranchCreated { .. } => "branch_created",
            Self::BranchDeleted { .. } => "branch_deleted",
            Self::BuildCompleted { .. } => "build_completed",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::PullRequestOpened { .. } => "🚨",
            Self::PullRequestClosed { merged: true, .. } => "🟣",
            Self::PullRequestClosed { merged: false, .. } => "⚪",
            Self::Push { .. } => "🔨",
            Self::BranchCreated { .. } => "🌱",
            Self::BranchDeleted { .. } => "🗑️",
            Self::BuildCompleted { succeeded: true, .. } => "✅",
            Self::BuildCompleted { succeeded: false, .. } => "❌",
        }
    }
}

/// Slack-style `<url|text>` link, or the bare text when there is no URL.
fn link(url: Option<&str>, text: &str) -> String {
    match url {
        Some(url) if !url.is_empty() => format!("<{url}|{text}>"),
        _ => text.to_string(),
    }
}

/// Render an event as one chat message (Slack mrkdwn).
pub fn render(event: &NotificationEvent) -> String {
    let emoji = event.emoji();
    match event {
        NotificationEvent::PullRequestOpened {
            repo,
            title,
            url,
            author,
        } => format!(
            "{emoji} *New Pull Request* in {}\n*{title}* by {author}",
            link(url.as_deref(), repo)
        ),
        NotificationEvent::PullRequestClosed {
            repo,
            title,
            url,
            author,
            merged,
        } => {
            let headline = if *merged {
                "Pull Request Merged"
            } else {
                "Pull Request Closed"
            };
            format!(
                "{emoji} *{headline}* in {}\n*{title}* by {author}",
                link(url.as_deref(), repo)
            )
        },
        NotificationEvent::Push {
            repo,
            branch,
            author,
            commit_summary,
        } => match commit_summary.as_deref() {
            Some(summary) if !summary.is_empty() => {
                format!("{emoji} *Push* to `{branch}` in {repo} by {author}\n> {summary}")
            },
            _ => format!("{emoji} {author} pushed to `{branch}` in {repo}"),
        },
        NotificationEvent::BranchCreated {
            repo,
            branch,
            author,
        } => format!("{emoji} *Branch created* `{branch}` in {repo} by {author}"),
        NotificationEvent::BranchDeleted {
            repo,
            branch,
            author,
        } => format!("{emoji} *Branch deleted* `{branch}` in {repo} by {author}"),
        NotificationEvent::BuildCompleted {
            repo,
            branch,
            workflow_name,
            succeeded,
            url,
        } => {
            let outcome = if *succeeded { "succeeded" } else { "failed" };
            let mut text =
                format!("{emoji} *Build {outcome}*: {workflow_name} on `{branch}` in {repo}");
            if let Some(url) = url.as_deref().filter(|u| !u.is_empty()) {
                text.push_str(&format!("\n<{url}|View Workflow>"));
            }
            text
        },
    }
}
