pub mod config;
pub mod coordinator;
pub mod events;
pub mod normalize;
pub mod provider;
pub mod raw;
pub mod sink;
pub mod window;

pub use coordinator::{Category, Coordinator, RunReport};
pub use events::{NotificationEvent, render};

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};

    use crate::coordinator::Category;
    use crate::provider::{ProviderClient, ProviderError};
    use crate::raw::{
        ActivityKind, ActivityPayload, Actor, RawActivityEvent, RawCommit, RawPullRequest,
        RawWorkflowRun,
    };
    use crate::sink::{Delivery, NotificationSink, SinkError};

    /// Unix seconds as a UTC timestamp.
    pub fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    pub fn pull_request(title: &str, created_at: DateTime<Utc>) -> RawPullRequest {
        RawPullRequest {
            number: created_at.timestamp() as u64,
            title: title.to_string(),
            html_url: format!("https://github.com/acme/api/pull/{}", created_at.timestamp()),
            created_at,
            updated_at: None,
            user: None,
        }
    }

    pub fn workflow_run(
        name: &str,
        branch: &str,
        conclusion: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> RawWorkflowRun {
        RawWorkflowRun {
            id: updated_at.timestamp() as u64,
            name: Some(name.to_string()),
            status: Some(if conclusion.is_some() { "completed" } else { "in_progress" }.to_string()),
            conclusion: conclusion.map(String::from),
            head_branch: Some(branch.to_string()),
            html_url: format!(
                "https://github.com/acme/api/actions/runs/{}",
                updated_at.timestamp()
            ),
            updated_at,
        }
    }

    pub fn push_event(branch: &str, message: &str, created_at: DateTime<Utc>) -> RawActivityEvent {
        RawActivityEvent {
            id: created_at.timestamp().to_string(),
            kind: ActivityKind::Push,
            actor: Some(Actor {
                login: "bob".to_string(),
            }),
            created_at,
            payload: ActivityPayload {
                git_ref: Some(format!("refs/heads/{branch}")),
                ref_type: None,
                commits: vec![RawCommit {
                    message: message.to_string(),
                }],
            },
        }
    }

    /// A create/delete activity event targeting a branch.
    pub fn branch_event(
        kind: ActivityKind,
        branch: &str,
        created_at: DateTime<Utc>,
    ) -> RawActivityEvent {
        RawActivityEvent {
            id: created_at.timestamp().to_string(),
            kind,
            actor: Some(Actor {
                login: "bob".to_string(),
            }),
            created_at,
            payload: ActivityPayload {
                git_ref: Some(branch.to_string()),
                ref_type: Some("branch".to_string()),
                commits: Vec::new(),
            },
        }
    }

    /// In-memory provider keyed by `owner/repo`.
    #[derive(Default)]
    pub struct FakeProvider {
        pub pull_requests: HashMap<String, Vec<RawPullRequest>>,
        pub workflow_runs: HashMap<String, Vec<RawWorkflowRun>>,
        pub activity: HashMap<String, Vec<RawActivityEvent>>,
        pub failing: HashSet<(String, Category)>,
        pub last_success: Option<DateTime<Utc>>,
        queries: Mutex<Vec<(String, Option<String>)>>,
    }

    impl FakeProvider {
        pub fn with_pull_request(mut self, full_name: &str, pr: RawPullRequest) -> Self {
            self.pull_requests.entry(full_name.to_string()).or_default().push(pr);
            self
        }

        pub fn with_workflow_run(mut self, full_name: &str, run: RawWorkflowRun) -> Self {
            self.workflow_runs.entry(full_name.to_string()).or_default().push(run);
            self
        }

        pub fn with_activity(mut self, full_name: &str, event: RawActivityEvent) -> Self {
            self.activity.entry(full_name.to_string()).or_default().push(event);
            self
        }

        pub fn with_last_success(mut self, completed: DateTime<Utc>) -> Self {
            self.last_success = Some(completed);
            self
        }

        /// Make every call for `category` on `full_name` fail.
        pub fn failing(mut self, full_name: &str, category: Category) -> Self {
            self.failing.insert((full_name.to_string(), category));
            self
        }

        /// Workflow-run queries issued so far, as `(owner/repo, branch)`.
        pub fn run_queries(&self) -> Vec<(String, Option<String>)> {
            self.queries.lock().unwrap().clone()
        }

        fn check(&self, full_name: &str, category: Category) -> Result<(), ProviderError> {
            if self.failing.contains(&(full_name.to_string(), category)) {
                return Err(ProviderError::Status {
                    url: format!("fake://{full_name}/{category}"),
                    status: 502,
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ProviderClient for FakeProvider {
        async fn list_open_pull_requests(
            &self,
            owner: &str,
            repo: &str,
        ) -> Result<Vec<RawPullRequest>, ProviderError> {
            let key = format!("{owner}/{repo}");
            self.check(&key, Category::PullRequests)?;
            Ok(self.pull_requests.get(&key).cloned().unwrap_or_default())
        }

        async fn list_workflow_runs(
            &self,
            owner: &str,
            repo: &str,
            branch: Option<&str>,
        ) -> Result<Vec<RawWorkflowRun>, ProviderError> {
            let key = format!("{owner}/{repo}");
            self.queries
                .lock()
                .unwrap()
                .push((key.clone(), branch.map(String::from)));
            self.check(&key, Category::WorkflowRuns)?;
            let runs = self.workflow_runs.get(&key).cloned().unwrap_or_default();
            Ok(runs
                .into_iter()
                .filter(|run| branch.is_none_or(|b| run.head_branch.as_deref() == Some(b)))
                .collect())
        }

        async fn list_recent_activity(
            &self,
            owner: &str,
            repo: &str,
        ) -> Result<Vec<RawActivityEvent>, ProviderError> {
            let key = format!("{owner}/{repo}");
            self.check(&key, Category::Activity)?;
            Ok(self.activity.get(&key).cloned().unwrap_or_default())
        }

        async fn last_successful_run(
            &self,
            owner: &str,
            repo: &str,
            _workflow: &str,
        ) -> Result<Option<DateTime<Utc>>, ProviderError> {
            self.check(&format!("{owner}/{repo}"), Category::WorkflowRuns)?;
            Ok(self.last_success)
        }
    }

    /// Sink that records every message it is asked to send.
    #[derive(Default)]
    pub struct RecordingSink {
        messages: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingSink {
        /// A sink whose sends are recorded but always report failure.
        pub fn failing() -> Self {
            Self {
                messages: Mutex::default(),
                fail: true,
            }
        }

        pub fn messages(&self) -> Vec<String> {
            self.messages.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(&self, text: &str) -> Result<Delivery, SinkError> {
            self.messages.lock().unwrap().push(text.to_string());
            if self.fail {
                Err(SinkError::Status(500))
            } else {
                Ok(Delivery::Sent)
            }
        }
    }
}
