//! `conductor`: dispatch tasks to agent sessions and inspect their records.

mod config;

use clap::{Parser, Subcommand};
use conductor_orchestrator::{
    AgentRegistry, DispatchContext, JsonTaskStore, RalphLoop, StatusReporter, TaskStore,
    TaskView, Ultrawork,
};
use conductor_session::{CliSessionGateway, SessionGateway, SessionHandle, SessionMonitor};
use config::ConductorConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "conductor", about = "Conductor: task dispatch for agent sessions")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "conductor.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch a task
    Dispatch {
        #[command(subcommand)]
        mode: DispatchMode,
    },
    /// Show one task, or every task when no id is given
    Status {
        task_id: Option<String>,
    },
    /// List registered agents
    Agents,
    /// Print the recent transcript of a session
    History {
        session: String,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum DispatchMode {
    /// Run the task on several agents at once
    Fanout {
        description: String,
        /// Comma-separated agent keys (default: every agent)
        agents: Option<String>,
        /// Wait for each agent before starting the next
        #[arg(long, conflicts_with = "concurrent")]
        sequential: bool,
        /// Start every agent first, then wait on all of them together
        #[arg(long)]
        concurrent: bool,
    },
    /// Run the task on one agent until it succeeds
    Retry {
        description: String,
        /// Agent key (default from config)
        agent: Option<String>,
        #[arg(long)]
        max_retries: Option<u32>,
        /// Per-attempt timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

/// Wait mode for a fan-out: an explicit flag wins over the configured default.
fn fanout_concurrency(sequential: bool, concurrent: bool, configured: bool) -> bool {
    if sequential {
        false
    } else if concurrent {
        true
    } else {
        configured
    }
}

/// Split a comma-separated agent list, dropping blanks.
fn parse_agent_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // stdout carries the reports; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConductorConfig::load(&cli.config).await?;

    let registry = Arc::new(config.registry()?);
    let gateway: Arc<dyn SessionGateway> =
        Arc::new(CliSessionGateway::new(config.gateway.clone()));
    let store: Arc<dyn TaskStore> = Arc::new(JsonTaskStore::new(config.snapshot_path()));

    match cli.command {
        Commands::Dispatch { mode } => {
            let monitor = SessionMonitor::from_config(gateway, &config.monitor);
            let ctx = DispatchContext::new(registry.clone(), monitor, store.clone());
            let reporter = StatusReporter::new(store, registry);

            let record = match mode {
                DispatchMode::Fanout {
                    description,
                    agents,
                    sequential,
                    concurrent,
                } => {
                    let agents = agents.as_deref().map(parse_agent_list);
                    let concurrent =
                        fanout_concurrency(sequential, concurrent, config.ultrawork.concurrent);
                    Ultrawork::new(ctx, config.ultrawork.clone())
                        .run(&description, agents.as_deref(), concurrent)
                        .await?
                }
                DispatchMode::Retry {
                    description,
                    agent,
                    max_retries,
                    timeout,
                } => {
                    let ralph = RalphLoop::new(ctx, config.ralph.clone());
                    let agent = agent.unwrap_or_else(|| ralph.config().default_agent.clone());
                    let max_retries = max_retries.unwrap_or(ralph.config().max_retries);
                    let timeout = Duration::from_secs(
                        timeout.unwrap_or(ralph.config().timeout_per_attempt_secs),
                    );
                    ralph
                        .run_with(&description, &agent, max_retries, timeout)
                        .await?
                }
            };

            info!(task_id = %record.task_id, status = %record.status, "Dispatch finished");
            println!("{}", reporter.render_detail(&TaskView::Found(record)));
        }
        Commands::Status { task_id } => {
            let reporter = StatusReporter::new(store, registry);
            match task_id {
                Some(task_id) => {
                    let view = reporter.detail(&task_id).await?;
                    println!("{}", reporter.render_detail(&view));
                }
                None => {
                    let summaries = reporter.summary().await?;
                    println!("{}", StatusReporter::render_summary(&summaries));
                }
            }
        }
        Commands::Agents => print_agents(&registry),
        Commands::History { session, limit } => {
            let handle = SessionHandle::new(session);
            match gateway.history(&handle, limit).await {
                Some(transcript) => println!("{transcript}"),
                None => println!("No history available for session {handle}."),
            }
        }
    }

    Ok(())
}

fn print_agents(registry: &AgentRegistry) {
    println!("Registered agents ({}):", registry.len());
    for profile in registry.iter() {
        println!(
            "  {:<12} {:<12} {} ({})  model={} priority={}",
            profile.key, profile.id, profile.name, profile.role, profile.model, profile.priority
        );
    }
}
