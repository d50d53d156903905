use std::path::{Path, PathBuf};

use serde::Deserialize;

use jarvis_core::config::WatchConfig;
use jarvis_core::window::{SCHEDULED_LOOKBACK_SECS, WindowSpec};
use jarvis_github::GitHubClientConfig;
use jarvis_slack::SlackConfig;

/// Files tried in order when no config path is given.
pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["jarvis.toml", "config.json"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("unsupported config format for {0} (expected .toml or .json)")]
    UnsupportedFormat(PathBuf),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("no GitHub token configured (set GITHUB_TOKEN)")]
    MissingToken,
}

/// Top-level configuration, loaded from `jarvis.toml` or `config.json`.
///
/// The watch list (`check_interval_secs`, `repositories`) sits at the top
/// level so existing `config.json` files load unchanged.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub listen_addr: String,
    #[serde(flatten)]
    pub watch: WatchConfig,
    pub auth: AuthFileConfig,
    pub github: GitHubClientConfig,
    pub slack: SlackConfig,
    /// Derive one-shot check windows from the bot's own previous run.
    pub self_check: Option<SelfCheckConfig>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            watch: WatchConfig::default(),
            auth: AuthFileConfig::default(),
            github: GitHubClientConfig::default(),
            slack: SlackConfig::default(),
            self_check: None,
        }
    }
}

/// Auth section of the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthFileConfig {
    pub bearer_token: Option<String>,
    pub github_webhook_secret: Option<String>,
    /// When true, reject GitHub webhooks if no secret is configured.
    pub require_webhook_signature: bool,
}

impl Default for AuthFileConfig {
    fn default() -> Self {
        Self {
            bearer_token: None,
            github_webhook_secret: None,
            require_webhook_signature: true,
        }
    }
}

/// The workflow this bot itself runs as, used for self-healing windows.
#[derive(Debug, Clone, Deserialize)]
pub struct SelfCheckConfig {
    /// `owner/repo`; filled from `GITHUB_REPOSITORY` when omitted.
    #[serde(default)]
    pub repository: Option<String>,
    /// Workflow file name or id, e.g. `check.yml`.
    pub workflow: String,
    #[serde(default = "default_fallback_secs")]
    pub fallback_secs: u64,
}

fn default_fallback_secs() -> u64 {
    SCHEDULED_LOOKBACK_SECS
}

impl SelfCheckConfig {
    pub fn window_spec(&self) -> Result<WindowSpec, ConfigError> {
        let repository = self.repository.as_deref().ok_or_else(|| {
            ConfigError::Invalid(
                "self_check.repository is not set and GITHUB_REPOSITORY is empty".to_string(),
            )
        })?;
        let (owner, repo) = split_full_name(repository)?;
        Ok(WindowSpec::LastSuccessfulRun {
            owner: owner.to_string(),
            repo: repo.to_string(),
            workflow: self.workflow.clone(),
            fallback_secs: self.fallback_secs,
        })
    }
}

/// Split `owner/repo`.
pub fn split_full_name(full_name: &str) -> Result<(&str, &str), ConfigError> {
    match full_name.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Ok((owner, repo))
        },
        _ => Err(ConfigError::Invalid(format!(
            "expected owner/repo, got {full_name:?}"
        ))),
    }
}

impl BotConfig {
    /// Load from `path`, or from the first of [`DEFAULT_CONFIG_FILES`] that
    /// exists, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match DEFAULT_CONFIG_FILES.into_iter().map(Path::new).find(|p| p.exists()) {
                Some(found) => Self::from_file(found)?,
                None => {
                    tracing::info!("No jarvis.toml or config.json found, using defaults");
                    Self::default()
                },
            },
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a config file, choosing the format by extension.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(path, &content)?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        let parse_error = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(content).map_err(|e| parse_error(e.to_string())),
            Some("json") => serde_json::from_str(content).map_err(|e| parse_error(e.to_string())),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Environment variables win over file values. Empty values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(token) = var("GITHUB_TOKEN") {
            self.github.token = Some(token);
        }
        if let Some(url) = var("SLACK_WEBHOOK_URL") {
            self.slack.webhook_url = Some(url);
        }
        if let Some(addr) = var("JARVIS_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Some(token) = var("JARVIS_API_TOKEN") {
            self.auth.bearer_token = Some(token);
        }
        if let Some(secret) = var("JARVIS_GITHUB_SECRET") {
            self.auth.github_webhook_secret = Some(secret);
        }
        if let Some(self_check) = self.self_check.as_mut()
            && self_check.repository.is_none()
        {
            self_check.repository = var("GITHUB_REPOSITORY");
        }
    }

    /// Reject configurations no run can succeed with. `polls` is true for
    /// entry points that call the provider.
    pub fn validate(&self, polls: bool) -> Result<(), ConfigError> {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "listen_addr {:?} is not a valid socket address",
                self.listen_addr
            )));
        }
        if self.watch.check_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "check_interval_secs must be > 0".to_string(),
            ));
        }
        for repo in &self.watch.repositories {
            if repo.owner.is_empty() || repo.repo.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "repository entry {:?} needs both owner and repo",
                    repo.full_name()
                )));
            }
        }

        if polls {
            if !self.github.has_token() {
                return Err(ConfigError::MissingToken);
            }
            if self.watch.repositories.is_empty() {
                tracing::warn!("No repositories configured, polling runs will do nothing");
            }
        }

        if !self.auth.require_webhook_signature && self.auth.github_webhook_secret.is_none() {
            tracing::warn!(
                "Webhook signature verification is disabled and no secret is configured"
            );
        }
        if self.slack.webhook_url.is_none() {
            tracing::warn!("SLACK_WEBHOOK_URL is not set, notifications will only be logged");
        }
        Ok(())
    }
}
