use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jarvis_bot::build_app;
use jarvis_bot::config::{BotConfig, SelfCheckConfig};
use jarvis_bot::watch::run_watch;
use jarvis_core::Coordinator;
use jarvis_core::window::{CRON_LOOKBACK_SECS, SCHEDULED_LOOKBACK_SECS, WindowSpec};
use jarvis_github::GitHubClient;
use jarvis_slack::SlackSink;

#[derive(Parser)]
#[command(name = "jarvis", version, about = "Repository activity notifier")]
struct Cli {
    /// Config file (.toml or .json). Defaults to ./jarvis.toml, then ./config.json.
    #[arg(long, short, env = "JARVIS_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll every configured interval until interrupted.
    Watch {
        /// Look back this many seconds on every tick instead of chaining windows.
        #[arg(long)]
        lookback: Option<u64>,
    },
    /// Run one polling pass and exit.
    Check {
        /// Window of `now - SECONDS`.
        #[arg(long, conflicts_with_all = ["since", "self_workflow"])]
        lookback: Option<u64>,
        /// Absolute RFC 3339 window start.
        #[arg(long, conflicts_with = "self_workflow")]
        since: Option<DateTime<Utc>>,
        /// Repository running this bot, as owner/repo.
        #[arg(long, env = "GITHUB_REPOSITORY")]
        self_repo: Option<String>,
        /// Start the window at this workflow's last successful run.
        #[arg(long)]
        self_workflow: Option<String>,
        /// Lookback used when no previous successful run is found.
        #[arg(long, default_value_t = SCHEDULED_LOOKBACK_SECS)]
        fallback: u64,
    },
    /// Handle one dispatch payload and exit.
    Dispatch {
        /// Payload file, or `-` for stdin.
        #[arg(conflicts_with = "payload")]
        input: Option<PathBuf>,
        /// Inline JSON payload.
        #[arg(long)]
        payload: Option<String>,
    },
    /// Serve the webhook and dispatch HTTP API.
    Serve {
        /// Also run the polling watcher in the background.
        #[arg(long)]
        poll: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = BotConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Command::Watch { lookback } => {
            config.validate(true)?;
            let coordinator = coordinator(&config)?;
            run_watch(&coordinator, &config.watch, lookback, shutdown_signal()).await;
        },
        Command::Check {
            lookback,
            since,
            self_repo,
            self_workflow,
            fallback,
        } => {
            config.validate(true)?;
            let spec = check_window(&config, lookback, since, self_repo, self_workflow, fallback)?;
            let coordinator = coordinator(&config)?;
            let report = coordinator.run(&config.watch, &spec).await;
            tracing::info!(?report, "Check finished");
        },
        Command::Dispatch { input, payload } => {
            config.validate(false)?;
            let raw = match (payload, input) {
                (Some(inline), _) => inline,
                (None, Some(path)) if path.as_os_str() == "-" => read_stdin()?,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                (None, None) => bail!("dispatch needs a payload file, `-` or --payload"),
            };
            let coordinator = coordinator(&config)?;
            match coordinator.handle_payload_str(&raw).await {
                Some(event) => tracing::info!(kind = event.kind(), repo = event.repo(), "Dispatched"),
                None => tracing::info!("Payload produced no notification"),
            }
        },
        Command::Serve { poll } => {
            config.validate(poll)?;
            serve(config, poll).await?;
        },
    }

    Ok(())
}

fn coordinator(config: &BotConfig) -> anyhow::Result<Coordinator> {
    let provider = GitHubClient::new(config.github.clone()).context("failed to build GitHub client")?;
    let sink = SlackSink::new(config.slack.clone()).context("failed to build Slack sink")?;
    Ok(Coordinator::new(Arc::new(provider), Arc::new(sink)))
}

/// `--lookback` > `--since` > `--self-workflow` > `[self_check]` > cron lookback.
fn check_window(
    config: &BotConfig,
    lookback: Option<u64>,
    since: Option<DateTime<Utc>>,
    self_repo: Option<String>,
    self_workflow: Option<String>,
    fallback: u64,
) -> anyhow::Result<WindowSpec> {
    if let Some(secs) = lookback {
        return Ok(WindowSpec::Lookback(secs));
    }
    if let Some(since) = since {
        return Ok(WindowSpec::Since(since));
    }
    if let Some(workflow) = self_workflow {
        let self_check = SelfCheckConfig {
            repository: self_repo,
            workflow,
            fallback_secs: fallback,
        };
        return Ok(self_check.window_spec()?);
    }
    if let Some(self_check) = &config.self_check {
        return Ok(self_check.window_spec()?);
    }
    Ok(WindowSpec::Lookback(CRON_LOOKBACK_SECS))
}

fn read_stdin() -> anyhow::Result<String> {
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("failed to read payload from stdin")?;
    Ok(raw)
}

async fn serve(config: BotConfig, poll: bool) -> anyhow::Result<()> {
    let coordinator = Arc::new(coordinator(&config)?);
    let (app, _state) = build_app(&config, Arc::clone(&coordinator));

    if poll {
        let watch = config.watch.clone();
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            run_watch(&coordinator, &watch, None, shutdown_signal()).await;
        });
    }

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, poll, "Jarvis server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
