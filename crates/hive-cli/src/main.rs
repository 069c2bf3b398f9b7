//! `hive` binary: parses flags, assembles the monitor configuration, and
//! runs the issue monitor loop.

mod bootstrap_helpers;
mod cli_args;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use hive_github::label_policy::LabelPolicy;
use hive_monitor::{run_issue_monitor, IssueMonitorConfig};
use hive_swarm::{load_roster_table, ProcessSwarmBackend};

use crate::bootstrap_helpers::init_tracing;
use crate::cli_args::Cli;

fn build_label_policy(cli: &Cli) -> LabelPolicy {
    let defaults = LabelPolicy::default();
    let ignore = if cli.ignore_label.is_empty() {
        defaults.ignore
    } else {
        cli.ignore_label
            .iter()
            .map(|label| label.trim().to_string())
            .collect()
    };
    LabelPolicy {
        in_progress: cli.label_in_progress.trim().to_string(),
        processed: cli.label_processed.trim().to_string(),
        error: cli.label_error.trim().to_string(),
        auto_close: cli.label_auto_close.trim().to_string(),
        keep_open: cli.label_keep_open.trim().to_string(),
        ignore,
        phase_prefix: cli.label_phase_prefix.trim().to_string(),
    }
}

fn resolve_spool_dir(cli: &Cli) -> PathBuf {
    cli.swarm_spool_dir
        .clone()
        .unwrap_or_else(|| cli.state_dir.join("swarm-runs"))
}

fn build_monitor_config(cli: &Cli) -> Result<IssueMonitorConfig> {
    let roster = load_roster_table(&cli.roster_file)
        .with_context(|| format!("failed to load roster file {}", cli.roster_file.display()))?;
    let backend = Arc::new(ProcessSwarmBackend::new(
        cli.swarm_command.trim().to_string(),
        cli.swarm_arg.clone(),
        resolve_spool_dir(cli),
    ));
    Ok(IssueMonitorConfig {
        backend,
        repo_slug: cli.repo.trim().to_string(),
        api_base: cli.api_base.trim().trim_end_matches('/').to_string(),
        token: cli.github_token.clone(),
        bot_login: cli.bot_login.clone(),
        state_dir: cli.state_dir.clone(),
        poll_interval: Duration::from_secs(cli.poll_interval_seconds.max(1)),
        poll_once: cli.poll_once,
        error_cooldown: Duration::from_secs(cli.error_cooldown_seconds.max(1)),
        max_inflight_dispatches: cli.max_inflight_dispatches.max(1),
        dispatch_timeout: Duration::from_secs(cli.dispatch_timeout_seconds.max(1)),
        auto_close_grace: Duration::from_secs(cli.auto_close_grace_seconds.max(1)),
        processed_version_cap: cli.processed_version_cap.max(1),
        label_policy: build_label_policy(cli),
        roster,
        request_timeout_ms: cli.request_timeout_ms.max(1),
        retry_max_attempts: cli.retry_max_attempts.max(1),
        retry_base_delay_ms: cli.retry_base_delay_ms.max(1),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = build_monitor_config(&cli)?;
    run_issue_monitor(config).await
}
