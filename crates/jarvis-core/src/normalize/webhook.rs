//! Native GitHub webhook deliveries, keyed by the `X-GitHub-Event` header.

use serde_json::Value;

use crate::events::NotificationEvent;
use crate::normalize::commit_summary;
use crate::raw::strip_heads;

/// Transform one GitHub webhook delivery into a canonical event.
///
/// Deliveries that are not notified (unknown event names, pull request
/// actions other than opened/closed, in-progress workflow runs, tag refs)
/// yield `None`.
pub fn from_webhook(github_event: &str, payload: &Value) -> Option<NotificationEvent> {
    let sender = payload
        .get("sender")
        .and_then(|s| s.get("login"))
        .and_then(|l| l.as_str())
        .unwrap_or("unknown");
    let repo = payload
        .get("repository")
        .and_then(|r| r.get("full_name"))
        .and_then(|n| n.as_str())
        .unwrap_or("unknown");

    match github_event {
        "workflow_run" => transform_workflow_run(payload, repo),
        "pull_request" => transform_pull_request(payload, sender, repo),
        "push" => transform_push(payload, sender, repo),
        "create" | "delete" => transform_ref(github_event, payload, sender, repo),
        other => {
            tracing::debug!(github_event = other, "Webhook event not notified");
            None
        },
    }
}

fn transform_workflow_run(payload: &Value, repo: &str) -> Option<NotificationEvent> {
    if payload["action"].as_str() != Some("completed") {
        return None;
    }
    let run = &payload["workflow_run"];
    let conclusion = run["conclusion"].as_str().filter(|c| !c.is_empty())?;

    Some(NotificationEvent::BuildCompleted {
        repo: repo.to_string(),
        branch: run["head_branch"].as_str().unwrap_or("unknown").to_string(),
        workflow_name: run["name"].as_str().unwrap_or("workflow").to_string(),
        succeeded: conclusion == "success",
        url: run["html_url"].as_str().map(String::from),
    })
}

fn transform_pull_request(payload: &Value, sender: &str, repo: &str) -> Option<NotificationEvent> {
    let pr = &payload["pull_request"];
    let title = pr["title"].as_str().unwrap_or("Pull request").to_string();
    let url = pr["html_url"].as_str().map(String::from);
    let author = pr["user"]["login"].as_str().unwrap_or(sender).to_string();
    let repo = repo.to_string();

    match payload["action"].as_str().unwrap_or("") {
        "opened" => Some(NotificationEvent::PullRequestOpened {
            repo,
            title,
            url,
            author,
        }),
        "closed" => Some(NotificationEvent::PullRequestClosed {
            repo,
            title,
            url,
            author,
            merged: pr["merged"].as_bool().unwrap_or(false),
        }),
        _ => None,
    }
}

fn transform_push(payload: &Value, sender: &str, repo: &str) -> Option<NotificationEvent> {
    // A deleted branch also arrives as a `delete` delivery.
    if payload["deleted"].as_bool().unwrap_or(false) {
        return None;
    }
    let git_ref = payload["ref"].as_str()?;
    if !git_ref.starts_with("refs/heads/") {
        return None;
    }
    let author = payload["pusher"]["name"].as_str().unwrap_or(sender);
    let message = payload["commits"]
        .as_array()
        .and_then(|c| c.first())
        .and_then(|c| c["message"].as_str())
        .or_else(|| payload["head_commit"]["message"].as_str());

    Some(NotificationEvent::Push {
        repo: repo.to_string(),
        branch: strip_heads(git_ref).to_string(),
        author: author.to_string(),
        commit_summary: message.and_then(commit_summary),
    })
}

fn transform_ref(
    github_event: &str,
    payload: &Value,
    sender: &str,
    repo: &str,
) -> Option<NotificationEvent> {
    if payload["ref_type"].as_str() != Some("branch") {
        return None;
    }
    let branch = payload["ref"].as_str()?.to_string();
    let repo = repo.to_string();
    let author = sender.to_string();

    Some(if github_event == "create" {
        NotificationEvent::BranchCreated {
            repo,
            branch,
            author,
        }
    } else {
        NotificationEvent::BranchDeleted {
            repo,
            branch,
            author,
        }
    })
}
