//! critique - scatter-gather pull-request reviews from the command line.
//!
//! ## Commands
//!
//! - `review`: review a pull request and print per-file comments
//! - `runs`: list registered review runs
//! - `clear`: wipe review history

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;

use critique_core::{
    init_tracing, EventKind, EventLog, EventRecord, GithubDiffSource, HttpToolBroker,
    MemoryEventLog, OpenAiClient, ReviewConfig, ReviewOrchestrator, RunKey,
};

/// How long one blocking read waits before the tailer prints a keep-alive.
const TAIL_WAIT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "critique")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "AI-assisted pull request review", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Review a pull request and print one comment per file plus the summary
    Review {
        /// Repository URL, e.g. https://github.com/acme/widgets
        repo_url: String,

        /// Pull request number
        pr_number: u64,

        /// OpenAI-compatible API base URL
        #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
        api_base: String,

        /// API key for the model endpoint
        #[arg(long, env = "OPENAI_API_KEY")]
        api_key: String,

        /// Tool server base URL
        #[arg(long, env = "TOOL_SERVER_URL", default_value = "http://127.0.0.1:7860/mcp")]
        tool_server: String,

        /// GitHub token for private repositories
        #[arg(long, env = "GITHUB_TOKEN")]
        github_token: Option<String>,

        /// Tail the event stream alongside the comments
        #[arg(long)]
        events: bool,
    },

    /// List registered review runs, newest first
    Runs {
        /// Restrict to one repository URL
        repo_url: Option<String>,

        /// Restrict to one pull request (requires a repository URL)
        pr_number: Option<u64>,
    },

    /// Wipe all review streams and registry entries
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    // The in-memory log scopes history to this invocation; a durable backend
    // would be wired here instead.
    let log = Arc::new(MemoryEventLog::new());

    match cli.command {
        Commands::Review {
            repo_url,
            pr_number,
            api_base,
            api_key,
            tool_server,
            github_token,
            events,
        } => {
            cmd_review(
                log,
                &repo_url,
                pr_number,
                &api_base,
                &api_key,
                &tool_server,
                github_token,
                events,
            )
            .await
        }
        Commands::Runs { repo_url, pr_number } => cmd_runs(log, repo_url.as_deref(), pr_number).await,
        Commands::Clear => cmd_clear(log).await,
    }
}

#[allow(clippy::too_many_arguments)]
async fn cmd_review(
    log: Arc<MemoryEventLog>,
    repo_url: &str,
    pr_number: u64,
    api_base: &str,
    api_key: &str,
    tool_server: &str,
    github_token: Option<String>,
    events: bool,
) -> Result<()> {
    let orchestrator = ReviewOrchestrator::new(
        Arc::new(OpenAiClient::new(api_base, api_key)),
        Arc::new(HttpToolBroker::new(tool_server)),
        Arc::new(GithubDiffSource::new(github_token)),
        log.clone(),
        ReviewConfig::from_env(),
    );

    let mut receiver = orchestrator
        .review(repo_url, pr_number, None)
        .await
        .context("failed to start review")?;

    let tailer = if events {
        let repo = critique_core::repo_name_from_url(repo_url);
        let run_id = log
            .list_runs(&repo, pr_number)
            .await
            .map_err(|e| anyhow::anyhow!("run registry unavailable: {e}"))?
            .into_iter()
            .next()
            .context("run was not registered")?;
        let run = RunKey::new(&repo, pr_number, run_id);
        Some(tokio::spawn(tail_events(log.clone(), run)))
    } else {
        None
    };

    while let Some(comment) = receiver.recv().await {
        println!("=== {} ===", comment.file_path);
        println!("{}", comment.comment);
    }

    if let Some(tailer) = tailer {
        tailer.await.context("event tailer aborted")??;
    }
    Ok(())
}

/// Tail one run's stream until its terminal event, printing each record and a
/// keep-alive line on every read timeout.
async fn tail_events(log: Arc<MemoryEventLog>, run: RunKey) -> Result<()> {
    let mut last_seen = None;
    loop {
        let records = log
            .read_after(&run, last_seen, TAIL_WAIT)
            .await
            .map_err(|e| anyhow::anyhow!("event read failed: {e}"))?;

        if records.is_empty() {
            println!("[{run}] {}", EventKind::KeepAlive);
            continue;
        }

        let mut terminal = false;
        for record in &records {
            print_record(&run, record);
            last_seen = Some(record.sequence);
            terminal = terminal || record.event.is_terminal();
        }
        if terminal {
            return Ok(());
        }
    }
}

fn print_record(run: &RunKey, record: &EventRecord) {
    let event = &record.event;
    let subject = match (&event.file_path, &event.step_name) {
        (file, Some(step)) if !file.is_empty() => format!("{file}/{step}"),
        (file, None) if !file.is_empty() => file.clone(),
        _ => run.to_string(),
    };
    println!(
        "[{}] #{} {} {} {}",
        record.recorded_at.format("%H:%M:%S"),
        record.sequence,
        event.kind,
        subject,
        event.payload
    );
}

async fn cmd_runs(
    log: Arc<MemoryEventLog>,
    repo_url: Option<&str>,
    pr_number: Option<u64>,
) -> Result<()> {
    match (repo_url, pr_number) {
        (Some(repo_url), Some(pr_number)) => {
            let repo = critique_core::repo_name_from_url(repo_url);
            let runs = log
                .list_runs(&repo, pr_number)
                .await
                .map_err(|e| anyhow::anyhow!("run registry unavailable: {e}"))?;
            for run_id in runs {
                println!("{repo}#{pr_number}@{run_id}");
            }
        }
        (None, None) => {
            let runs = log
                .list_all_runs()
                .await
                .map_err(|e| anyhow::anyhow!("run registry unavailable: {e}"))?;
            for run in runs {
                println!("{run}");
            }
        }
        _ => anyhow::bail!("provide both a repository URL and a PR number, or neither"),
    }
    Ok(())
}

async fn cmd_clear(log: Arc<MemoryEventLog>) -> Result<()> {
    let removed = log
        .clear()
        .await
        .map_err(|e| anyhow::anyhow!("run registry unavailable: {e}"))?;
    println!("Cleared {removed} keys.");
    Ok(())
}
