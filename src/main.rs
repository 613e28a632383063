//! Repo Chat - CLI
//!
//! Command-line front end to the orchestrator: runs tool calls, waits for
//! imports, relays feedback and manages the repository list.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use repo_chat::feedback::FeedbackEvent;
use repo_chat::gateway::{ImportRequest, RepoId, Sentiment};
use repo_chat::readiness::ReadinessHandle;
use repo_chat::tools::{self, definitions::CHART_TOOL, definitions::TEXT_TOOL};
use repo_chat::{registry, AppState, Config};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "repo-chat")]
#[command(about = "Chat with a GitHub repository's analytics")]
struct Cli {
    /// Path to a YAML config file (defaults to ./config.yaml)
    #[arg(long, env = "REPO_CHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Log line format on stderr
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the tool definitions and system prompt for a repository
    Tools {
        /// Repository as owner/name
        #[arg(short, long)]
        repo: RepoId,
    },

    /// Run the chart tool
    Chart {
        #[arg(short, long)]
        repo: RepoId,

        /// Natural language question
        query: String,
    },

    /// Run the text tool
    Text {
        #[arg(short, long)]
        repo: RepoId,

        /// Natural language question
        query: String,
    },

    /// Wait until the repository's import has concluded
    Wait {
        #[arg(short, long)]
        repo: RepoId,

        /// Give up after this many wait windows
        #[arg(long)]
        max_attempts: Option<u32>,
    },

    /// Ask the gateway to import a repository
    Import {
        #[arg(short, long)]
        repo: RepoId,

        /// GitHub access token
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// Send feedback on an answer
    Feedback {
        #[arg(short, long)]
        repo: RepoId,

        /// up / down
        #[arg(short, long)]
        sentiment: Sentiment,

        /// Result id of the answer, omitted when it had none
        #[arg(long)]
        result_id: Option<String>,

        /// What was wrong (or right)
        #[arg(short, long, default_value = "")]
        message: String,
    },

    /// Repository list operations
    Repos {
        #[command(subcommand)]
        action: ReposAction,
    },
}

#[derive(Subcommand)]
enum ReposAction {
    /// List default and user-added repositories
    List,

    /// Add a repository to the user list
    Add {
        /// Repository as owner/name
        repo: RepoId,
    },

    /// Remove a repository from the user list
    Remove {
        /// Repository as owner/name
        repo: RepoId,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = Config::from_yaml_and_env(cli.config.as_deref())?;
    let state = AppState::new(config)?;
    if registry::install_global(state.registry()).is_err() {
        tracing::warn!("Registry already initialized, keeping the existing one");
    }

    match cli.command {
        Commands::Tools { repo } => {
            let router = state.router(repo);
            let specs: Vec<_> = tools::all_tools()
                .iter()
                .map(|tool| tool.to_function_spec())
                .collect();
            print_json(&json!({
                "system_prompt": router.system_prompt(),
                "tools": specs,
            }))
        }
        Commands::Chart { repo, query } => run_tool(&state, repo, CHART_TOOL, &query).await,
        Commands::Text { repo, query } => run_tool(&state, repo, TEXT_TOOL, &query).await,
        Commands::Wait { repo, max_attempts } => run_wait(&state, repo, max_attempts).await,
        Commands::Import { repo, token } => {
            let ack = state
                .gateway
                .trigger_import(&ImportRequest::full(&repo, token))
                .await
                .with_context(|| format!("Failed to start import of {}", repo))?;
            tracing::info!("Import of {} requested", repo);
            print_json(&ack)
        }
        Commands::Feedback {
            repo,
            sentiment,
            result_id,
            message,
        } => {
            let relay = state.feedback_relay(repo);
            let outcome = relay
                .submit(FeedbackEvent {
                    result_id,
                    sentiment,
                    message,
                })
                .await;
            print_json(&json!({
                "pr_url": outcome.pr_url,
                "remediation": relay.state(),
            }))
        }
        Commands::Repos { action } => run_repos(action),
    }
}

/// Logs go to stderr, stdout carries the JSON output
fn init_tracing(format: LogFormat) {
    let registry = tracing_subscriber::registry().with(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "info,repo_chat=debug".into()),
    );
    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

async fn run_tool(state: &AppState, repo: RepoId, tool: &str, query: &str) -> Result<()> {
    let router = state.router(repo);
    let outcome = router.call(tool, Some(json!({ "query": query }))).await;
    print_json(&outcome.value)?;
    if outcome.is_error {
        anyhow::bail!("{} tool failed", tool);
    }
    Ok(())
}

async fn run_wait(state: &AppState, repo: RepoId, max_attempts: Option<u32>) -> Result<()> {
    tracing::info!("Waiting for import of {}", repo);

    let poller = Arc::new(state.poller());
    let handle = ReadinessHandle::spawn(poller, repo.clone(), max_attempts);
    let info = tokio::select! {
        res = handle.wait() => res.with_context(|| format!("{} is not ready", repo))?,
        _ = tokio::signal::ctrl_c() => anyhow::bail!("Interrupted"),
    };

    registry::global()
        .add(repo.clone())
        .context("Failed to record repository")?;

    print_json(&json!({
        "repo": repo,
        "health": info.health(),
        "last_import": info.last_import_summary(chrono::Utc::now()),
        "info": info,
    }))
}

fn run_repos(action: ReposAction) -> Result<()> {
    let registry = registry::global();
    match action {
        ReposAction::List => {
            let user = registry.list()?;
            print_json(&json!({
                "defaults": registry.defaults(),
                "user": user,
            }))
        }
        ReposAction::Add { repo } => {
            let added = registry.add(repo.clone())?;
            print_json(&json!({ "repo": repo, "added": added }))
        }
        ReposAction::Remove { repo } => {
            let removed = registry.remove(&repo.owner, &repo.name)?;
            print_json(&json!({ "repo": repo, "removed": removed }))
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_defaults_to_text() {
        let cli = Cli::try_parse_from(["repo-chat", "repos", "list"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Text);
    }

    #[test]
    fn test_log_format_json_flag() {
        let cli = Cli::try_parse_from(["repo-chat", "--log-format", "json", "repos", "list"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(Cli::try_parse_from(["repo-chat", "--log-format", "xml", "repos", "list"]).is_err());
    }
}
