use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Branch list entry meaning "every branch".
pub const WILDCARD_BRANCH: &str = "*";

/// Default polling interval in seconds when the config omits one.
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60;

/// Which branches of a repository are watched for workflow runs.
///
/// Deserialized from a plain list of branch names. A list containing `"*"`
/// watches all branches; an empty list watches none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub enum BranchFilter {
    #[default]
    All,
    Only(Vec<String>),
}

impl From<Vec<String>> for BranchFilter {
    fn from(branches: Vec<String>) -> Self {
        if branches.iter().any(|b| b == WILDCARD_BRANCH) {
            return Self::All;
        }
        let mut seen = BTreeSet::new();
        let ordered = branches
            .into_iter()
            .filter(|b| seen.insert(b.clone()))
            .collect();
        Self::Only(ordered)
    }
}

impl From<BranchFilter> for Vec<String> {
    fn from(filter: BranchFilter) -> Self {
        match filter {
            BranchFilter::All => vec![WILDCARD_BRANCH.to_string()],
            BranchFilter::Only(branches) => branches,
        }
    }
}

impl BranchFilter {
    pub fn matches(&self, branch: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(branches) => branches.iter().any(|b| b == branch),
        }
    }

    /// The workflow-run queries to issue: one unfiltered query (`None`) for
    /// the wildcard, otherwise one query per listed branch, in order.
    pub fn run_queries(&self) -> Vec<Option<&str>> {
        match self {
            Self::All => vec![None],
            Self::Only(branches) => branches.iter().map(|b| Some(b.as_str())).collect(),
        }
    }
}

/// One watched repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub owner: String,
    pub repo: String,
    #[serde(default)]
    pub branches: BranchFilter,
    /// Workflow names to report. `None` (or an empty set) reports all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflows: Option<BTreeSet<String>>,
}

impl RepositoryConfig {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branches: BranchFilter::All,
            workflows: None,
        }
    }

    pub fn with_branches<I, S>(mut self, branches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.branches = BranchFilter::from(branches.into_iter().map(Into::into).collect::<Vec<_>>());
        self
    }

    pub fn with_workflows<I, S>(mut self, workflows: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.workflows = Some(workflows.into_iter().map(Into::into).collect());
        self
    }

    /// `owner/repo`, the name used in rendered notifications.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    pub fn wants_workflow(&self, name: &str) -> bool {
        match &self.workflows {
            Some(names) if !names.is_empty() => names.contains(name),
            _ => true,
        }
    }
}

/// The watch list: repositories plus the recurring-trigger cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    #[serde(alias = "checkInterval")]
    pub check_interval_secs: u64,
    pub repositories: Vec<RepositoryConfig>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            repositories: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_anywhere_means_all() {
        let filter = BranchFilter::from(vec!["main".to_string(), "*".to_string()]);
        assert_eq!(filter, BranchFilter::All);
        assert!(filter.matches("anything"));
        assert_eq!(filter.run_queries(), vec![None]);
    }

    #[test]
    fn explicit_branches_keep_order_and_drop_duplicates() {
        let filter = BranchFilter::from(vec![
            "main".to_string(),
            "develop".to_string(),
            "main".to_string(),
        ]);
        assert_eq!(filter.run_queries(), vec![Some("main"), Some("develop")]);
        assert!(filter.matches("develop"));
        assert!(!filter.matches("feature/x"));
    }

    #[test]
    fn empty_branch_list_issues_no_queries() {
        let filter = BranchFilter::from(Vec::<String>::new());
        assert!(filter.run_queries().is_empty());
    }

    #[test]
    fn workflow_filter_absent_or_empty_accepts_all() {
        let repo = RepositoryConfig::new("acme", "api");
        assert!(repo.wants_workflow("Deploy"));

        let empty = RepositoryConfig::new("acme", "api").with_workflows(Vec::<String>::new());
        assert!(empty.wants_workflow("Deploy"));

        let only_ci = RepositoryConfig::new("acme", "api").with_workflows(["CI"]);
        assert!(only_ci.wants_workflow("CI"));
        assert!(!only_ci.wants_workflow("Deploy"));
    }

    #[test]
    fn parse_camel_case_json_shape() {
        let json = r#"{
            "checkInterval": 300,
            "repositories": [
                { "owner": "acme", "repo": "api", "branches": ["main", "release"] },
                { "owner": "acme", "repo": "web", "branches": ["*"], "workflows": ["CI"] }
            ]
        }"#;
        let cfg: WatchConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.check_interval_secs, 300);
        assert_eq!(cfg.repositories.len(), 2);
        assert_eq!(
            cfg.repositories[0].branches,
            BranchFilter::Only(vec!["main".to_string(), "release".to_string()])
        );
        assert_eq!(cfg.repositories[1].branches, BranchFilter::All);
        assert!(!cfg.repositories[1].wants_workflow("Deploy"));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let cfg: WatchConfig = serde_json::from_str(r#"{"repositories": [{"owner": "a", "repo": "b"}]}"#).unwrap();
        assert_eq!(cfg.check_interval_secs, DEFAULT_CHECK_INTERVAL_SECS);
        assert_eq!(cfg.repositories[0].branches, BranchFilter::All);
        assert!(cfg.repositories[0].workflows.is_none());
        assert_eq!(cfg.repositories[0].full_name(), "a/b");
    }

    #[test]
    fn branch_filter_serializes_back_to_list() {
        let json = serde_json::to_string(&BranchFilter::All).unwrap();
        assert_eq!(json, r#"["*"]"#);
    }
}
