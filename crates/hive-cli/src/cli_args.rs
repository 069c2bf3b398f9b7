use std::path::PathBuf;

use clap::{ArgAction, Parser};

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "hive",
    about = "GitHub issue monitor that dispatches swarm analysis runs per workflow phase",
    version
)]
pub struct Cli {
    #[arg(
        long,
        env = "HIVE_REPO",
        help = "GitHub repository to monitor, in owner/repo format"
    )]
    pub repo: String,

    #[arg(
        long = "github-token",
        env = "GITHUB_TOKEN",
        hide_env_values = true,
        help = "GitHub token used for API access"
    )]
    pub github_token: String,

    #[arg(
        long = "api-base",
        env = "HIVE_API_BASE",
        default_value = "https://api.github.com",
        help = "GitHub API base URL"
    )]
    pub api_base: String,

    #[arg(
        long = "bot-login",
        env = "HIVE_BOT_LOGIN",
        help = "Login the monitor posts under; resolved via the API when unset"
    )]
    pub bot_login: Option<String>,

    #[arg(
        long = "state-dir",
        env = "HIVE_STATE_DIR",
        default_value = ".hive/issue-monitor",
        help = "Directory for monitor state and activity logs"
    )]
    pub state_dir: PathBuf,

    #[arg(
        long = "poll-interval-seconds",
        env = "HIVE_POLL_INTERVAL_SECONDS",
        default_value_t = 30,
        value_parser = parse_positive_u64,
        help = "Polling interval in seconds between issue list checks"
    )]
    pub poll_interval_seconds: u64,

    #[arg(
        long = "poll-once",
        env = "HIVE_POLL_ONCE",
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Run one poll cycle, wait out spawned dispatches, and exit"
    )]
    pub poll_once: bool,

    #[arg(
        long = "error-cooldown-seconds",
        env = "HIVE_ERROR_COOLDOWN_SECONDS",
        default_value_t = 60,
        value_parser = parse_positive_u64,
        help = "Sleep in seconds after a failed poll cycle, replacing the regular interval"
    )]
    pub error_cooldown_seconds: u64,

    #[arg(
        long = "max-inflight-dispatches",
        env = "HIVE_MAX_INFLIGHT_DISPATCHES",
        default_value_t = 3,
        value_parser = parse_positive_usize,
        help = "Maximum swarm analysis runs executing concurrently"
    )]
    pub max_inflight_dispatches: usize,

    #[arg(
        long = "dispatch-timeout-seconds",
        env = "HIVE_DISPATCH_TIMEOUT_SECONDS",
        default_value_t = 900,
        value_parser = parse_positive_u64,
        help = "Hard wall-clock bound in seconds on one swarm analysis run"
    )]
    pub dispatch_timeout_seconds: u64,

    #[arg(
        long = "auto-close-grace-seconds",
        env = "HIVE_AUTO_CLOSE_GRACE_SECONDS",
        default_value_t = 60,
        value_parser = parse_positive_u64,
        help = "Window in seconds between the auto-close warning and the closing re-check"
    )]
    pub auto_close_grace_seconds: u64,

    #[arg(
        long = "processed-version-cap",
        env = "HIVE_PROCESSED_VERSION_CAP",
        default_value_t = 1024,
        value_parser = parse_positive_usize,
        help = "Maximum processed issue-version records to retain for duplicate protection"
    )]
    pub processed_version_cap: usize,

    #[arg(
        long = "roster-file",
        env = "HIVE_ROSTER_FILE",
        default_value = ".hive/roster.json",
        help = "Role roster file mapping workflow phases to swarm roles; built-in roster when missing"
    )]
    pub roster_file: PathBuf,

    #[arg(
        long = "swarm-command",
        env = "HIVE_SWARM_COMMAND",
        help = "Executable spawned for each dispatched swarm analysis run"
    )]
    pub swarm_command: String,

    #[arg(
        long = "swarm-arg",
        env = "HIVE_SWARM_ARGS",
        value_delimiter = ',',
        allow_hyphen_values = true,
        help = "Extra argument passed to the swarm command before the run arguments (repeatable)"
    )]
    pub swarm_arg: Vec<String>,

    #[arg(
        long = "swarm-spool-dir",
        env = "HIVE_SWARM_SPOOL_DIR",
        help = "Directory for per-run task files and captured output; defaults to <state-dir>/swarm-runs"
    )]
    pub swarm_spool_dir: Option<PathBuf>,

    #[arg(
        long = "request-timeout-ms",
        env = "HIVE_REQUEST_TIMEOUT_MS",
        default_value_t = 30_000,
        value_parser = parse_positive_u64,
        help = "Per-request timeout in milliseconds for GitHub API calls"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "retry-max-attempts",
        env = "HIVE_RETRY_MAX_ATTEMPTS",
        default_value_t = 4,
        value_parser = parse_positive_usize,
        help = "Maximum attempts for retryable GitHub API failures (429/5xx/transport)"
    )]
    pub retry_max_attempts: usize,

    #[arg(
        long = "retry-base-delay-ms",
        env = "HIVE_RETRY_BASE_DELAY_MS",
        default_value_t = 500,
        value_parser = parse_positive_u64,
        help = "Base backoff delay in milliseconds for GitHub API retries"
    )]
    pub retry_base_delay_ms: u64,

    #[arg(
        long = "label-in-progress",
        env = "HIVE_LABEL_IN_PROGRESS",
        default_value = "in-progress",
        help = "Label marking issues with an active swarm analysis run"
    )]
    pub label_in_progress: String,

    #[arg(
        long = "label-processed",
        env = "HIVE_LABEL_PROCESSED",
        default_value = "processed",
        help = "Label marking issues whose analysis completed"
    )]
    pub label_processed: String,

    #[arg(
        long = "label-error",
        env = "HIVE_LABEL_ERROR",
        default_value = "error",
        help = "Label marking issues whose analysis failed"
    )]
    pub label_error: String,

    #[arg(
        long = "label-auto-close",
        env = "HIVE_LABEL_AUTO_CLOSE",
        default_value = "auto-close-on-complete",
        help = "Label requesting auto-closure after completed terminal-phase analysis"
    )]
    pub label_auto_close: String,

    #[arg(
        long = "label-keep-open",
        env = "HIVE_LABEL_KEEP_OPEN",
        default_value = "keep-open",
        help = "Label cancelling a scheduled auto-closure"
    )]
    pub label_keep_open: String,

    #[arg(
        long = "ignore-label",
        env = "HIVE_IGNORE_LABELS",
        value_delimiter = ',',
        help = "Labels excluding an issue from automation entirely (repeatable); defaults to automation:ignore,wip,no-automation"
    )]
    pub ignore_label: Vec<String>,

    #[arg(
        long = "label-phase-prefix",
        env = "HIVE_LABEL_PHASE_PREFIX",
        default_value = "phase:",
        help = "Prefix of labels that pin an issue to an explicit workflow phase"
    )]
    pub label_phase_prefix: String,
}
