//! Upstream monitor entry point
//!
//! One invocation runs one monitor pass and exits; scheduling belongs to
//! the external trigger (cron, CI workflow).

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use upstream_monitor::config::{split_recipients, MonitorConfig, NotifyConfig, RetryPolicy};
use upstream_monitor::probe::{CommitProbe, PageProbe, Probe};
use upstream_monitor::runner::RunController;

const DEFAULT_SEND_URL: &str = "https://api.mailjet.com/v3.1/send";

#[derive(Parser)]
#[command(name = "upstream-monitor")]
#[command(about = "Upstream change monitor - change detection with notification delivery")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the newest commit touching a repository path
    Commits {
        /// Repository owner
        #[arg(long)]
        owner: String,

        /// Repository name
        #[arg(long)]
        repo: String,

        /// Path filter within the repository
        #[arg(long)]
        path: String,

        /// Bearer token for authenticated API fetches
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Snapshot document path
        #[arg(long, default_value = ".monitor/commits_state.json")]
        state_file: PathBuf,

        /// Days of silence before a healthcheck notification; 0 disables
        #[arg(long, env = "HEALTHCHECK_DAYS", default_value_t = 7)]
        healthcheck_days: i64,

        /// Message label; defaults to owner/repo
        #[arg(long)]
        label: Option<String>,

        #[command(flatten)]
        notify: NotifyArgs,
    },

    /// Watch version tokens on a set of rendered pages
    Pages {
        /// Page URL to watch (repeatable)
        #[arg(long = "url", required = true)]
        urls: Vec<String>,

        /// Snapshot document path
        #[arg(long, default_value = ".monitor/pages_state.json")]
        state_file: PathBuf,

        /// Days of silence before a healthcheck notification; 0 disables
        #[arg(long, env = "HEALTHCHECK_DAYS", default_value_t = 0)]
        healthcheck_days: i64,

        /// Message label
        #[arg(long, default_value = "page-monitor")]
        label: String,

        #[command(flatten)]
        notify: NotifyArgs,
    },
}

#[derive(Args)]
struct NotifyArgs {
    /// Comma-separated recipient addresses; empty skips notifications
    #[arg(long, env = "EMAIL_TO", default_value = "")]
    email_to: String,

    /// Sender, optionally in "Display Name <address>" form
    #[arg(long, env = "EMAIL_FROM")]
    email_from: Option<String>,

    /// Primary channel API key
    #[arg(long, env = "MAILJET_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Primary channel secret key
    #[arg(long, env = "MAILJET_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// Fallback webhook URL
    #[arg(long, env = "SLACK_WEBHOOK", hide_env_values = true)]
    webhook: Option<String>,

    /// Primary channel send endpoint
    #[arg(long, default_value = DEFAULT_SEND_URL)]
    send_url: String,
}

impl NotifyArgs {
    fn into_config(self) -> NotifyConfig {
        NotifyConfig {
            recipients: split_recipients(&self.email_to),
            sender: self.email_from,
            api_key: self.api_key,
            secret_key: self.secret_key,
            send_url: self.send_url,
            webhook_url: self.webhook,
            retry: RetryPolicy::default(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let cli = Cli::parse();

    let (config, probes): (MonitorConfig, Vec<Box<dyn Probe>>) = match cli.command {
        Commands::Commits {
            owner,
            repo,
            path,
            token,
            state_file,
            healthcheck_days,
            label,
            notify,
        } => {
            let label = label.unwrap_or_else(|| format!("{}/{} monitor", owner, repo));
            let probe = CommitProbe::new(&owner, &repo, &path, token.as_deref())?;
            (
                MonitorConfig {
                    label,
                    state_path: state_file,
                    healthcheck_interval: MonitorConfig::healthcheck_from_days(healthcheck_days),
                    notify: notify.into_config(),
                },
                vec![Box::new(probe) as Box<dyn Probe>],
            )
        }

        Commands::Pages {
            urls,
            state_file,
            healthcheck_days,
            label,
            notify,
        } => {
            let probe = PageProbe::new(urls)?;
            (
                MonitorConfig {
                    label,
                    state_path: state_file,
                    healthcheck_interval: MonitorConfig::healthcheck_from_days(healthcheck_days),
                    notify: notify.into_config(),
                },
                vec![Box::new(probe) as Box<dyn Probe>],
            )
        }
    };

    let controller = RunController::new(config, probes)?;

    match controller.execute().await {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(err) => {
            tracing::error!(error = %err, "run failed");
            std::process::exit(1);
        }
    }
}
