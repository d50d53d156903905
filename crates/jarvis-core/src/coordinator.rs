use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::Value;
use uuid::Uuid;

use crate::config::{RepositoryConfig, WatchConfig};
use crate::events::{NotificationEvent, render};
use crate::normalize::{PollItem, from_payload, from_payload_str, from_poll, from_webhook};
use crate::provider::{ProviderClient, ProviderError};
use crate::sink::NotificationSink;
use crate::window::{TimeWindow, WindowSpec, filter_workflows, select_completed_runs, select_new};

/// The three things fetched for every repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    PullRequests,
    Activity,
    WorkflowRuns,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PullRequests => "pull_requests",
            Self::Activity => "activity",
            Self::WorkflowRuns => "workflow_runs",
        })
    }
}

/// Counters from one polling run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub repositories: usize,
    /// Provider calls that failed and were treated as empty.
    pub fetch_failures: usize,
    pub notified: usize,
    pub delivery_failures: usize,
}

#[derive(Debug, Default)]
struct Collected {
    events: Vec<NotificationEvent>,
    failures: usize,
}

impl Collected {
    fn merge(&mut self, other: Collected) {
        self.events.extend(other.events);
        self.failures += other.failures;
    }
}

/// Drives provider fetches through the window detector and normalizer into
/// the notification sink.
pub struct Coordinator {
    provider: Arc<dyn ProviderClient>,
    sink: Arc<dyn NotificationSink>,
}

impl Coordinator {
    pub fn new(provider: Arc<dyn ProviderClient>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { provider, sink }
    }

    /// Turn a [`WindowSpec`] into a concrete boundary relative to `now`.
    pub async fn resolve_window(&self, spec: &WindowSpec, now: DateTime<Utc>) -> TimeWindow {
        match spec {
            WindowSpec::Lookback(secs) => TimeWindow::lookback(now, *secs),
            WindowSpec::Since(since) => TimeWindow::since(*since),
            WindowSpec::LastSuccessfulRun {
                owner,
                repo,
                workflow,
                fallback_secs,
            } => match self.provider.last_successful_run(owner, repo, workflow).await {
                Ok(Some(completed)) => {
                    tracing::info!(
                        workflow,
                        completed = %completed.to_rfc3339(),
                        "Window starts at previous successful run"
                    );
                    TimeWindow::since(completed)
                },
                Ok(None) => {
                    tracing::info!(
                        workflow,
                        fallback_secs,
                        "No previous successful run, using fallback lookback"
                    );
                    TimeWindow::lookback(now, *fallback_secs)
                },
                Err(e) => {
                    tracing::warn!(
                        workflow,
                        fallback_secs,
                        error = %e,
                        "Failed to look up previous run, using fallback lookback"
                    );
                    TimeWindow::lookback(now, *fallback_secs)
                },
            },
        }
    }

    /// Polling run: resolve the window, then check every repository.
    pub async fn run(&self, config: &WatchConfig, spec: &WindowSpec) -> RunReport {
        let window = self.resolve_window(spec, Utc::now()).await;
        self.run_window(config, &window).await
    }

    /// Polling run against an already resolved window.
    ///
    /// Repositories and categories are fetched concurrently; notifications are
    /// then sent one at a time, grouped by repository in config order.
    pub async fn run_window(&self, config: &WatchConfig, window: &TimeWindow) -> RunReport {
        let run_id = Uuid::new_v4();
        tracing::info!(
            %run_id,
            since = %window.start().to_rfc3339(),
            repositories = config.repositories.len(),
            "Checking for events"
        );

        let collected = join_all(
            config
                .repositories
                .iter()
                .map(|repo| self.collect_repo(repo, window)),
        )
        .await;

        let mut report = RunReport {
            repositories: config.repositories.len(),
            ..RunReport::default()
        };
        for repo in collected {
            report.fetch_failures += repo.failures;
            for event in &repo.events {
                if self.deliver(event).await {
                    report.notified += 1;
                } else {
                    report.delivery_failures += 1;
                }
            }
        }

        tracing::info!(
            %run_id,
            notified = report.notified,
            fetch_failures = report.fetch_failures,
            delivery_failures = report.delivery_failures,
            "Check completed"
        );
        report
    }

    /// Payload-driven run for a dispatch payload. Sends at most one
    /// notification and returns the event it was rendered from.
    ///
    /// No deduplication: the same payload twice notifies twice.
    pub async fn handle_payload(&self, payload: &Value) -> Option<NotificationEvent> {
        let event = from_payload(payload)?;
        self.deliver(&event).await;
        Some(event)
    }

    /// [`Self::handle_payload`] for an unparsed body.
    pub async fn handle_payload_str(&self, raw: &str) -> Option<NotificationEvent> {
        let event = from_payload_str(raw)?;
        self.deliver(&event).await;
        Some(event)
    }

    /// Payload-driven run for a native GitHub webhook delivery.
    pub async fn handle_webhook(
        &self,
        github_event: &str,
        payload: &Value,
    ) -> Option<NotificationEvent> {
        let event = from_webhook(github_event, payload)?;
        self.deliver(&event).await;
        Some(event)
    }

    async fn collect_repo(&self, repo: &RepositoryConfig, window: &TimeWindow) -> Collected {
        let (mut collected, activity, runs) = futures::join!(
            self.pull_request_events(repo, window),
            self.activity_events(repo, window),
            self.workflow_run_events(repo, window),
        );
        collected.merge(activity);
        collected.merge(runs);
        collected
    }

    async fn pull_request_events(&self, repo: &RepositoryConfig, window: &TimeWindow) -> Collected {
        match self.provider.list_open_pull_requests(&repo.owner, &repo.repo).await {
            Ok(prs) => {
                let fresh = select_new(prs, window, |pr| pr.created_at, |_| true);
                Collected {
                    events: fresh
                        .iter()
                        .filter_map(|pr| from_poll(PollItem::PullRequest(pr), repo))
                        .collect(),
                    failures: 0,
                }
            },
            Err(e) => fetch_failed(repo, Category::PullRequests, None, &e),
        }
    }

    async fn activity_events(&self, repo: &RepositoryConfig, window: &TimeWindow) -> Collected {
        match self.provider.list_recent_activity(&repo.owner, &repo.repo).await {
            Ok(events) => {
                let fresh = select_new(events, window, |e| e.created_at, |_| true);
                Collected {
                    events: fresh
                        .iter()
                        .filter_map(|e| from_poll(PollItem::Activity(e), repo))
                        .collect(),
                    failures: 0,
                }
            },
            Err(e) => fetch_failed(repo, Category::Activity, None, &e),
        }
    }

    /// One query per configured branch (or a single unfiltered one for the
    /// wildcard). A failing branch query does not drop the others.
    async fn workflow_run_events(&self, repo: &RepositoryConfig, window: &TimeWindow) -> Collected {
        let queries = repo.branches.run_queries();
        let results = join_all(
            queries
                .iter()
                .map(|branch| self.provider.list_workflow_runs(&repo.owner, &repo.repo, *branch)),
        )
        .await;

        let mut collected = Collected::default();
        for (branch, result) in queries.iter().zip(results) {
            match result {
                Ok(runs) => {
                    let fresh = filter_workflows(select_completed_runs(runs, window), repo);
                    collected.events.extend(
                        fresh
                            .iter()
                            .filter_map(|run| from_poll(PollItem::WorkflowRun(run), repo)),
                    );
                },
                Err(e) => collected.merge(fetch_failed(repo, Category::WorkflowRuns, *branch, &e)),
            }
        }
        collected
    }

    async fn deliver(&self, event: &NotificationEvent) -> bool {
        let text = render(event);
        match self.sink.send(&text).await {
            Ok(delivery) => {
                tracing::debug!(
                    kind = event.kind(),
                    repo = event.repo(),
                    ?delivery,
                    "Notification delivered"
                );
                true
            },
            Err(e) => {
                tracing::warn!(
                    kind = event.kind(),
                    repo = event.repo(),
                    error = %e,
                    "Failed to deliver notification"
                );
                false
            },
        }
    }
}

fn fetch_failed(
    repo: &RepositoryConfig,
    category: Category,
    branch: Option<&str>,
    error: &ProviderError,
) -> Collected {
    tracing::warn!(
        repo = %repo.full_name(),
        %category,
        branch = branch.unwrap_or("*"),
        error = %error,
        "Fetch failed, treating as empty"
    );
    Collected {
        events: Vec::new(),
        failures: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::ActivityKind;
    use crate::test_helpers::{
        FakeProvider, RecordingSink, at, branch_event, pull_request, push_event, workflow_run,
    };
    use serde_json::json;

    fn coordinator(provider: FakeProvider, sink: &Arc<RecordingSink>) -> Coordinator {
        Coordinator::new(Arc::new(provider), Arc::clone(sink) as Arc<dyn NotificationSink>)
    }

    fn watch(repos: Vec<RepositoryConfig>) -> WatchConfig {
        WatchConfig {
            repositories: repos,
            ..WatchConfig::default()
        }
    }

    #[tokio::test]
    async fn notifies_only_items_after_since() {
        let provider = FakeProvider::default()
            .with_pull_request("acme/api", pull_request("Old", at(1_000)))
            .with_pull_request("acme/api", pull_request("Boundary", at(2_000)))
            .with_pull_request("acme/api", pull_request("Fresh", at(2_001)))
            .with_activity("acme/api", push_event("main", "fix bug\n\nbody", at(2_500)))
            .with_activity("acme/api", push_event("main", "stale", at(1_500)))
            .with_workflow_run("acme/api", workflow_run("CI", "main", Some("success"), at(3_000)));
        let sink = Arc::new(RecordingSink::default());
        let coordinator = coordinator(provider, &sink);

        let report = coordinator
            .run_window(
                &watch(vec![RepositoryConfig::new("acme", "api")]),
                &TimeWindow::since(at(2_000)),
            )
            .await;

        let messages = sink.messages();
        assert_eq!(report.notified, 3);
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().any(|m| m.contains("*Fresh*")));
        assert!(!messages.iter().any(|m| m.contains("Boundary")));
        assert!(messages.iter().any(|m| m.contains("> fix bug") && !m.contains("body")));
        assert!(messages.iter().any(|m| m.starts_with("✅")));
    }

    #[tokio::test]
    async fn in_progress_runs_are_not_reported() {
        let provider = FakeProvider::default()
            .with_workflow_run("acme/api", workflow_run("CI", "main", None, at(5_000)));
        let sink = Arc::new(RecordingSink::default());

        let report = coordinator(provider, &sink)
            .run_window(
                &watch(vec![RepositoryConfig::new("acme", "api")]),
                &TimeWindow::since(at(0)),
            )
            .await;

        assert_eq!(report.notified, 0);
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn workflow_name_filter_keeps_listed_runs() {
        let provider = FakeProvider::default()
            .with_workflow_run("acme/api", workflow_run("CI", "main", Some("success"), at(100)))
            .with_workflow_run("acme/api", workflow_run("Deploy", "main", Some("success"), at(101)));
        let sink = Arc::new(RecordingSink::default());
        let repo = RepositoryConfig::new("acme", "api").with_workflows(["CI"]);

        coordinator(provider, &sink)
            .run_window(&watch(vec![repo]), &TimeWindow::since(at(0)))
            .await;

        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("CI on `main`"));
    }

    #[tokio::test]
    async fn queries_once_per_branch_or_once_for_wildcard() {
        let provider = Arc::new(
            FakeProvider::default()
                .with_workflow_run("acme/api", workflow_run("CI", "main", Some("success"), at(100)))
                .with_workflow_run(
                    "acme/api",
                    workflow_run("CI", "release", Some("failure"), at(100)),
                )
                .with_workflow_run("acme/api", workflow_run("CI", "feature", Some("success"), at(100))),
        );
        let sink = Arc::new(RecordingSink::default());
        let coordinator = Coordinator::new(
            Arc::clone(&provider) as Arc<dyn ProviderClient>,
            Arc::clone(&sink) as Arc<dyn NotificationSink>,
        );

        let listed = RepositoryConfig::new("acme", "api").with_branches(["main", "release"]);
        coordinator
            .run_window(&watch(vec![listed]), &TimeWindow::since(at(0)))
            .await;
        assert_eq!(
            provider.run_queries(),
            vec![
                ("acme/api".to_string(), Some("main".to_string())),
                ("acme/api".to_string(), Some("release".to_string())),
            ]
        );
        assert_eq!(sink.messages().len(), 2);

        let wildcard = RepositoryConfig::new("acme", "api").with_branches(["*"]);
        coordinator
            .run_window(&watch(vec![wildcard]), &TimeWindow::since(at(0)))
            .await;
        assert_eq!(provider.run_queries().last(), Some(&("acme/api".to_string(), None)));
        assert_eq!(sink.messages().len(), 5);
    }

    #[tokio::test]
    async fn failing_repository_does_not_stop_others() {
        let provider = FakeProvider::default()
            .with_pull_request("acme/a", pull_request("A pr", at(100)))
            .failing("acme/a", Category::WorkflowRuns)
            .with_pull_request("acme/b", pull_request("B pr", at(100)))
            .with_activity("acme/b", push_event("main", "ship it", at(100)));
        let sink = Arc::new(RecordingSink::default());

        let report = coordinator(provider, &sink)
            .run_window(
                &watch(vec![
                    RepositoryConfig::new("acme", "a"),
                    RepositoryConfig::new("acme", "b"),
                ]),
                &TimeWindow::since(at(0)),
            )
            .await;

        assert_eq!(report.fetch_failures, 1);
        assert_eq!(report.notified, 3);
        let messages = sink.messages();
        assert!(messages.iter().any(|m| m.contains("*A pr*")));
        assert!(messages.iter().any(|m| m.contains("*B pr*")));
        assert!(messages.iter().any(|m| m.contains("> ship it")));
    }

    #[tokio::test]
    async fn every_category_failing_still_completes() {
        let provider = FakeProvider::default()
            .failing("acme/a", Category::PullRequests)
            .failing("acme/a", Category::Activity)
            .failing("acme/a", Category::WorkflowRuns);
        let sink = Arc::new(RecordingSink::default());

        let report = coordinator(provider, &sink)
            .run_window(
                &watch(vec![RepositoryConfig::new("acme", "a")]),
                &TimeWindow::since(at(0)),
            )
            .await;

        assert_eq!(report.fetch_failures, 3);
        assert_eq!(report.notified, 0);
    }

    #[tokio::test]
    async fn branch_activity_is_notified() {
        let provider = FakeProvider::default()
            .with_activity("acme/api", branch_event(ActivityKind::Create, "feature/x", at(100)))
            .with_activity("acme/api", branch_event(ActivityKind::Delete, "old", at(101)));
        let sink = Arc::new(RecordingSink::default());

        coordinator(provider, &sink)
            .run_window(
                &watch(vec![RepositoryConfig::new("acme", "api")]),
                &TimeWindow::since(at(0)),
            )
            .await;

        let messages = sink.messages();
        assert!(messages[0].starts_with("🌱"));
        assert!(messages[1].starts_with("🗑️"));
    }

    #[tokio::test]
    async fn delivery_failure_is_counted_not_retried() {
        let provider = FakeProvider::default()
            .with_pull_request("acme/api", pull_request("One", at(100)))
            .with_pull_request("acme/api", pull_request("Two", at(101)));
        let sink = Arc::new(RecordingSink::failing());

        let report = coordinator(provider, &sink)
            .run_window(
                &watch(vec![RepositoryConfig::new("acme", "api")]),
                &TimeWindow::since(at(0)),
            )
            .await;

        assert_eq!(report.notified, 0);
        assert_eq!(report.delivery_failures, 2);
        assert_eq!(sink.messages().len(), 2);
    }

    #[tokio::test]
    async fn identical_payloads_notify_twice() {
        let sink = Arc::new(RecordingSink::default());
        let coordinator = coordinator(FakeProvider::default(), &sink);
        let payload = json!({
            "event_type": "build_status",
            "status": "failure",
            "repo_info": {"status": "success", "repo": "acme/api", "branch": "main"},
        });

        let first = coordinator.handle_payload(&payload).await;
        let second = coordinator.handle_payload(&payload).await;

        assert_eq!(first, second);
        let messages = sink.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], messages[1]);
        assert!(messages[0].starts_with("❌"));
    }

    #[tokio::test]
    async fn unproductive_payloads_send_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let coordinator = coordinator(FakeProvider::default(), &sink);

        assert!(
            coordinator
                .handle_payload(&json!({"event_type": "pull_request", "action": "synchronize"}))
                .await
                .is_none()
        );
        assert!(coordinator.handle_payload(&json!({"event_type": "release"})).await.is_none());
        assert!(coordinator.handle_payload_str("not json").await.is_none());
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn webhook_delivery_notifies() {
        let sink = Arc::new(RecordingSink::default());
        let coordinator = coordinator(FakeProvider::default(), &sink);
        let payload = json!({
            "ref": "feature/x",
            "ref_type": "branch",
            "sender": {"login": "bob"},
            "repository": {"full_name": "acme/api"}
        });

        let event = coordinator.handle_webhook("create", &payload).await;

        assert!(matches!(event, Some(NotificationEvent::BranchCreated { .. })));
        assert_eq!(sink.messages(), vec!["🌱 *Branch created* `feature/x` in acme/api by bob"]);
    }

    #[tokio::test]
    async fn window_from_previous_successful_run() {
        let spec = WindowSpec::LastSuccessfulRun {
            owner: "acme".to_string(),
            repo: "jarvis".to_string(),
            workflow: "check.yml".to_string(),
            fallback_secs: 600,
        };
        let sink = Arc::new(RecordingSink::default());
        let now = at(100_000);

        let found = FakeProvider::default().with_last_success(at(99_700));
        let window = coordinator(found, &sink).resolve_window(&spec, now).await;
        assert_eq!(window.start(), at(99_700));

        let none = coordinator(FakeProvider::default(), &sink)
            .resolve_window(&spec, now)
            .await;
        assert_eq!(none.start(), at(99_400));

        let broken = FakeProvider::default().failing("acme/jarvis", Category::WorkflowRuns);
        let fallback = coordinator(broken, &sink).resolve_window(&spec, now).await;
        assert_eq!(fallback.start(), at(99_400));
    }

    #[tokio::test]
    async fn fixed_specs_resolve_without_provider() {
        let sink = Arc::new(RecordingSink::default());
        let coordinator = coordinator(FakeProvider::default(), &sink);
        let now = at(10_000);

        assert_eq!(
            coordinator.resolve_window(&WindowSpec::Lookback(70), now).await.start(),
            at(9_930)
        );
        assert_eq!(
            coordinator.resolve_window(&WindowSpec::Since(at(42)), now).await.start(),
            at(42)
        );
    }
}
