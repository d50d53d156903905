use crate::config::RepositoryConfig;
use crate::events::NotificationEvent;
use crate::normalize::commit_summary;
use crate::raw::{ActivityKind, RawActivityEvent, RawPullRequest, RawWorkflowRun};

/// A window-filtered record from one of the three polled endpoints.
#[derive(Debug, Clone, Copy)]
pub enum PollItem<'a> {
    PullRequest(&'a RawPullRequest),
    Activity(&'a RawActivityEvent),
    WorkflowRun(&'a RawWorkflowRun),
}

/// Map a polled record to its canonical event.
///
/// Polling only sees open pull requests, so every pull request becomes
/// `PullRequestOpened`. Activity events other than branch pushes and branch
/// creation/deletion yield `None`.
pub fn from_poll(item: PollItem<'_>, repo: &RepositoryConfig) -> Option<NotificationEvent> {
    let repo_name = repo.full_name();
    match item {
        PollItem::PullRequest(pr) => Some(NotificationEvent::PullRequestOpened {
            repo: repo_name,
            title: pr.title.clone(),
            url: Some(pr.html_url.clone()),
            author: pr.author().to_string(),
        }),
        PollItem::Activity(event) => from_activity(event, repo_name),
        PollItem::WorkflowRun(run) => Some(NotificationEvent::BuildCompleted {
            repo: repo_name,
            branch: run.branch().to_string(),
            workflow_name: run.workflow_name().to_string(),
            succeeded: run.succeeded(),
            url: Some(run.html_url.clone()),
        }),
    }
}

fn from_activity(event: &RawActivityEvent, repo: String) -> Option<NotificationEvent> {
    let author = event.author().to_string();
    match event.kind {
        ActivityKind::Push => {
            if event
                .payload
                .git_ref
                .as_deref()
                .is_some_and(|r| !r.starts_with("refs/heads/"))
            {
                tracing::debug!(git_ref = ?event.payload.git_ref, "Ignoring non-branch push");
                return None;
            }
            let branch = event.branch().unwrap_or("unknown").to_string();
            let summary = event
                .payload
                .commits
                .first()
                .and_then(|c| commit_summary(&c.message));
            Some(NotificationEvent::Push {
                repo,
                branch,
                author,
                commit_summary: summary,
            })
        },
        ActivityKind::Create if event.targets_branch() => Some(NotificationEvent::BranchCreated {
            repo,
            branch: event.branch()?.to_string(),
            author,
        }),
        ActivityKind::Delete if event.targets_branch() => Some(NotificationEvent::BranchDeleted {
            repo,
            branch: event.branch()?.to_string(),
            author,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::{ActivityPayload, Actor, RawCommit};
    use chrono::{TimeZone, Utc};

    fn repo() -> RepositoryConfig {
        RepositoryConfig::new("acme", "api")
    }

    fn activity(kind: ActivityKind, payload: ActivityPayload) -> RawActivityEvent {
        RawActivityEvent {
            id: "1".to_string(),
            kind,
            actor: Some(Actor {
                login: "bob".to_string(),
            }),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
            payload,
        }
    }

    #[test]
    fn pull_request_becomes_opened() {
        let pr = RawPullRequest {
            number: 3,
            title: "Add caching".to_string(),
            html_url: "https://github.com/acme/api/pull/3".to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
            updated_at: None,
            user: Some(Actor {
                login: "alice".to_string(),
            }),
        };
        let event = from_poll(PollItem::PullRequest(&pr), &repo()).unwrap();
        assert_eq!(
            event,
            NotificationEvent::PullRequestOpened {
                repo: "acme/api".to_string(),
                title: "Add caching".to_string(),
                url: Some("https://github.com/acme/api/pull/3".to_string()),
                author: "alice".to_string(),
            }
        );
    }

    #[test]
    fn push_uses_first_commit_first_line() {
        let event = activity(
            ActivityKind::Push,
            ActivityPayload {
                git_ref: Some("refs/heads/main".to_string()),
                ref_type: None,
                commits: vec![
                    RawCommit {
                        message: "fix bug\n\nlonger body".to_string(),
                    },
                    RawCommit {
                        message: "second".to_string(),
                    },
                ],
            },
        );
        match from_poll(PollItem::Activity(&event), &repo()).unwrap() {
            NotificationEvent::Push {
                branch,
                commit_summary,
                ..
            } => {
                assert_eq!(branch, "main");
                assert_eq!(commit_summary.as_deref(), Some("fix bug"));
            },
            other => panic!("expected push, got {other:?}"),
        }
    }

    #[test]
    fn push_without_commits_has_no_summary() {
        let event = activity(
            ActivityKind::Push,
            ActivityPayload {
                git_ref: Some("refs/heads/main".to_string()),
                ..ActivityPayload::default()
            },
        );
        let normalized = from_poll(PollItem::Activity(&event), &repo()).unwrap();
        assert!(matches!(
            normalized,
            NotificationEvent::Push {
                commit_summary: None,
                ..
            }
        ));
    }

    #[test]
    fn branch_create_and_delete() {
        let branch_payload = ActivityPayload {
            git_ref: Some("feature/x".to_string()),
            ref_type: Some("branch".to_string()),
            commits: Vec::new(),
        };
        let created = activity(ActivityKind::Create, branch_payload.clone());
        let deleted = activity(ActivityKind::Delete, branch_payload);
        assert_eq!(
            from_poll(PollItem::Activity(&created), &repo()),
            Some(NotificationEvent::BranchCreated {
                repo: "acme/api".to_string(),
                branch: "feature/x".to_string(),
                author: "bob".to_string(),
            })
        );
        assert!(matches!(
            from_poll(PollItem::Activity(&deleted), &repo()),
            Some(NotificationEvent::BranchDeleted { .. })
        ));
    }

    #[test]
    fn tag_creation_and_other_kinds_are_ignored() {
        let tag = activity(
            ActivityKind::Create,
            ActivityPayload {
                git_ref: Some("v1.0.0".to_string()),
                ref_type: Some("tag".to_string()),
                commits: Vec::new(),
            },
        );
        let star = activity(
            ActivityKind::Other("WatchEvent".to_string()),
            ActivityPayload::default(),
        );
        let tag_push = activity(
            ActivityKind::Push,
            ActivityPayload {
                git_ref: Some("refs/tags/v1".to_string()),
                ref_type: None,
                commits: vec![RawCommit {
                    message: "release".to_string(),
                }],
            },
        );
        assert!(from_poll(PollItem::Activity(&tag), &repo()).is_none());
        assert!(from_poll(PollItem::Activity(&star), &repo()).is_none());
        assert!(from_poll(PollItem::Activity(&tag_push), &repo()).is_none());
    }

    #[test]
    fn workflow_run_success_flag() {
        let run = RawWorkflowRun {
            id: 9,
            name: Some("CI".to_string()),
            status: Some("completed".to_string()),
            conclusion: Some("cancelled".to_string()),
            head_branch: Some("main".to_string()),
            html_url: "https://github.com/acme/api/actions/runs/9".to_string(),
            updated_at: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
        };
        let event = from_poll(PollItem::WorkflowRun(&run), &repo()).unwrap();
        assert!(matches!(
            event,
            NotificationEvent::BuildCompleted {
                succeeded: false,
                ..
            }
        ));
    }
}
