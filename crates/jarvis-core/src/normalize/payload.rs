//! Dispatch payloads: flat (or two-level) JSON objects with an `event_type`
//! discriminator, as produced by upstream transformers such as a
//! `repository_dispatch` step.

use serde_json::{Map, Value};

use crate::events::NotificationEvent;
use crate::normalize::commit_summary;
use crate::raw::strip_heads;

/// Sub-objects hoisted into the top level, in precedence order. Delivery
/// channels with a cap on top-level field count nest overflow fields here.
pub const NESTED_SECTIONS: [&str; 2] = ["repo_info", "details"];

/// A payload after [`flatten`]: a single-level field namespace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatPayload(Map<String, Value>);

impl FlatPayload {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The first of `keys` holding a non-empty string.
    pub fn text(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|k| self.0.get(*k).and_then(Value::as_str))
            .find(|s| !s.is_empty())
    }

    /// A boolean field; accepts `true`/`false`, `"true"`/`"false"` and 1/0,
    /// since some transformers stringify every value.
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.0.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" | "" => Some(false),
                _ => None,
            },
            Value::Number(n) => n.as_i64().map(|n| n != 0),
            _ => None,
        }
    }
}

/// Merge the [`NESTED_SECTIONS`] sub-objects into the top-level namespace.
///
/// Top-level fields win on collision, then `repo_info`, then `details`. The
/// section containers themselves are removed once merged. Returns `None` when
/// the payload is not a JSON object.
pub fn flatten(payload: &Value) -> Option<FlatPayload> {
    let top = payload.as_object()?;
    let mut flat = Map::new();
    for (key, value) in top {
        let is_section = NESTED_SECTIONS.contains(&key.as_str()) && value.is_object();
        if !is_section {
            flat.insert(key.clone(), value.clone());
        }
    }
    for section in NESTED_SECTIONS {
        let Some(nested) = top.get(section).and_then(Value::as_object) else {
            continue;
        };
        for (key, value) in nested {
            if !flat.contains_key(key) {
                flat.insert(key.clone(), value.clone());
            }
        }
    }
    Some(FlatPayload(flat))
}

/// Parse and normalize a raw dispatch payload. Malformed JSON yields `None`.
pub fn from_payload_str(raw: &str) -> Option<NotificationEvent> {
    match serde_json::from_str::<Value>(raw) {
        Ok(payload) => from_payload(&payload),
        Err(e) => {
            tracing::warn!(error = %e, "Dispatch payload is not valid JSON, ignoring");
            None
        },
    }
}

/// Normalize a dispatch payload. Unknown or missing `event_type`, unfinished
/// builds, and pull request actions other than `opened`/`closed` yield `None`.
pub fn from_payload(payload: &Value) -> Option<NotificationEvent> {
    let Some(flat) = flatten(payload) else {
        tracing::warn!("Dispatch payload is not a JSON object, ignoring");
        return None;
    };
    let Some(event_type) = flat.text(&["event_type"]) else {
        tracing::warn!("Dispatch payload has no event_type, ignoring");
        return None;
    };

    let repo = flat
        .text(&["repo", "repository", "repo_name"])
        .unwrap_or("unknown")
        .to_string();
    let author = flat
        .text(&["author", "actor", "sender", "user"])
        .unwrap_or("unknown")
        .to_string();
    let branch = || {
        flat.text(&["branch", "ref", "head_branch"])
            .map(strip_heads)
            .unwrap_or("unknown")
            .to_string()
    };
    let url = flat.text(&["url", "html_url"]).map(String::from);

    match event_type {
        "build_status" => {
            let Some(succeeded) = build_outcome(&flat) else {
                tracing::debug!(status = ?flat.text(&["status"]), "Build not finished, ignoring");
                return None;
            };
            Some(NotificationEvent::BuildCompleted {
                repo,
                branch: branch(),
                workflow_name: flat
                    .text(&["workflow", "workflow_name", "name"])
                    .unwrap_or("workflow")
                    .to_string(),
                succeeded,
                url,
            })
        },
        "push" => Some(NotificationEvent::Push {
            repo,
            branch: branch(),
            author,
            commit_summary: push_summary(&flat),
        }),
        "create" | "delete" => {
            if flat.text(&["ref_type"]).is_some_and(|t| t != "branch") {
                tracing::debug!(event_type, "Ignoring non-branch ref event");
                return None;
            }
            let branch = branch();
            Some(if event_type == "create" {
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
        },
        "pull_request" => {
            let title = flat.text(&["title", "pr_title"]).unwrap_or("Pull request").to_string();
            match flat.text(&["action"]) {
                Some("opened") => Some(NotificationEvent::PullRequestOpened {
                    repo,
                    title,
                    url,
                    author,
                }),
                Some("closed") => Some(NotificationEvent::PullRequestClosed {
                    repo,
                    title,
                    url,
                    author,
                    merged: flat.flag("merged").unwrap_or(false),
                }),
                action => {
                    tracing::debug!(action = ?action, "Pull request action not notified");
                    None
                },
            }
        },
        other => {
            tracing::info!(event_type = other, "Unrecognized dispatch event_type, ignoring");
            None
        },
    }
}

/// Run states that carry no outcome yet.
const PENDING_STATUSES: [&str; 6] = [
    "queued",
    "in_progress",
    "requested",
    "waiting",
    "pending",
    "completed",
];

/// Whether a build succeeded, or `None` while it is still running.
///
/// `conclusion` decides when present. Otherwise `status` doubles as the
/// outcome, except for lifecycle states like `in_progress`, and a bare
/// `completed` that names no result.
fn build_outcome(flat: &FlatPayload) -> Option<bool> {
    if let Some(conclusion) = flat.text(&["conclusion"]) {
        return Some(conclusion == "success");
    }
    match flat.text(&["status"]) {
        Some(status) if PENDING_STATUSES.contains(&status) => None,
        status => Some(status == Some("success")),
    }
}

/// `commit_message` (or `message`), else the first entry of a `commits` array.
fn push_summary(flat: &FlatPayload) -> Option<String> {
    if let Some(message) = flat.text(&["commit_message", "message", "head_commit_message"]) {
        return commit_summary(message);
    }
    let first = flat.get("commits")?.as_array()?.first()?;
    let message = match first {
        Value::String(s) => s.as_str(),
        other => other.get("message")?.as_str()?,
    };
    commit_summary(message)
}
