//! Issue monitor runtime and poll-dispatch orchestration.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use serde_json::json;
use tokio::task::JoinHandle;

use hive_core::{current_unix_timestamp_ms, JsonlLog};
use hive_github::issue_comment::{
    extract_footer_version_keys, render_auto_close_notice, render_auto_close_warning,
    render_completion_comment, render_dispatch_comment, render_error_comment,
};
use hive_github::issue_snapshot::{version_key, GithubIssue};
use hive_github::label_policy::LabelPolicy;
use hive_github::phase_classifier::{classify_workflow_phase, PhaseDecision, WorkflowPhase};
use hive_github::transport_helpers::short_key_hash;
use hive_swarm::{build_task_description, RosterTable, SwarmBackend, SwarmTask};

mod auto_close;
mod change_detector;
mod dispatch;
mod state_store;
mod tracker_client;

use auto_close::{spawn_auto_close, AutoCloseOutcome, AutoCloseRequest};
use change_detector::detect_changed_issues;
use dispatch::{
    spawn_dispatch, ActiveDispatch, DispatchResult, DispatchStatus, PendingDispatch,
};
use state_store::{MonitorHealthSnapshot, MonitorStateStore, ProcessedOutcome};
use tracker_client::{GithubApiClient, IssueListPage};

/// Runtime configuration for the issue monitor loop.
#[derive(Clone)]
pub struct IssueMonitorConfig {
    /// Analysis backend every dispatched task runs on.
    pub backend: Arc<dyn SwarmBackend>,
    /// Target repository as `owner/repo`.
    pub repo_slug: String,
    pub api_base: String,
    pub token: String,
    /// Login the monitor posts under. Resolved via the API when unset.
    pub bot_login: Option<String>,
    pub state_dir: PathBuf,
    pub poll_interval: Duration,
    /// Run a single cycle, wait out queued and active dispatches, then exit.
    pub poll_once: bool,
    /// Sleep after a failed cycle, replacing the regular interval.
    pub error_cooldown: Duration,
    pub max_inflight_dispatches: usize,
    /// Hard wall-clock bound on one dispatch.
    pub dispatch_timeout: Duration,
    /// Window between the auto-close warning and the closing re-check.
    pub auto_close_grace: Duration,
    pub processed_version_cap: usize,
    pub label_policy: LabelPolicy,
    pub roster: RosterTable,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RepoRef {
    owner: String,
    name: String,
}

impl RepoRef {
    fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let (owner, name) = trimmed
            .split_once('/')
            .ok_or_else(|| anyhow!("invalid --repo '{raw}', expected owner/repo"))?;
        let owner = owner.trim();
        let name = name.trim();
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            bail!("invalid --repo '{raw}', expected owner/repo");
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    fn as_slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

fn sanitize_for_path(raw: &str) -> String {
    raw.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

fn now_rfc3339() -> String {
    chrono::Utc::now()
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

#[derive(Debug, Default)]
struct PollCycleReport {
    discovered_issues: usize,
    dispatched_issues: usize,
    completed_dispatches: usize,
    failed_dispatches: usize,
    cached_skips: usize,
    ignored_skips: usize,
    deferred_issues: usize,
}

/// Runs the monitor until interrupted (or for one cycle in one-shot mode).
pub async fn run_issue_monitor(config: IssueMonitorConfig) -> Result<()> {
    let mut runtime = IssueMonitorRuntime::new(config).await?;
    runtime.run().await
}

struct IssueMonitorRuntime {
    config: IssueMonitorConfig,
    repo: RepoRef,
    client: GithubApiClient,
    bot_login: String,
    state_store: MonitorStateStore,
    observed_log: JsonlLog,
    action_log: JsonlLog,
    pending: VecDeque<PendingDispatch>,
    active: HashMap<u64, ActiveDispatch>,
    closures: Vec<JoinHandle<(u64, AutoCloseOutcome)>>,
}

impl IssueMonitorRuntime {
    async fn new(config: IssueMonitorConfig) -> Result<Self> {
        let repo = RepoRef::parse(&config.repo_slug)?;
        let client = GithubApiClient::new(
            config.api_base.clone(),
            config.token.clone(),
            repo.clone(),
            config.request_timeout_ms,
            config.retry_max_attempts,
            config.retry_base_delay_ms,
        )?;
        let bot_login = match config.bot_login.clone() {
            Some(login) if !login.trim().is_empty() => login.trim().to_string(),
            _ => client
                .resolve_bot_login()
                .await
                .context("failed to resolve bot login")?,
        };
        let repository_state_dir = config.state_dir.join(sanitize_for_path(&format!(
            "{}__{}",
            repo.owner, repo.name
        )));
        std::fs::create_dir_all(&repository_state_dir)
            .with_context(|| format!("failed to create {}", repository_state_dir.display()))?;

        let state_store = MonitorStateStore::load(
            repository_state_dir.join("state.json"),
            config.processed_version_cap,
        )?;
        let observed_log = JsonlLog::open(repository_state_dir.join("observed-events.jsonl"))?;
        let action_log = JsonlLog::open(repository_state_dir.join("actions.jsonl"))?;
        Ok(Self {
            config,
            repo,
            client,
            bot_login,
            state_store,
            observed_log,
            action_log,
            pending: VecDeque::new(),
            active: HashMap::new(),
            closures: Vec::new(),
        })
    }

    async fn run(&mut self) -> Result<()> {
        let mut failure_streak = 0_usize;
        loop {
            match self.poll_once().await {
                Ok(report) => {
                    failure_streak = 0;
                    println!(
                        "issue monitor poll: repo={} discovered={} dispatched={} completed={} failed={} cached_skips={} ignored_skips={} deferred={} active={} queued={}",
                        self.repo.as_slug(),
                        report.discovered_issues,
                        report.dispatched_issues,
                        report.completed_dispatches,
                        report.failed_dispatches,
                        report.cached_skips,
                        report.ignored_skips,
                        report.deferred_issues,
                        self.active.len(),
                        self.pending.len()
                    );
                    if self.config.poll_once {
                        return self.finish_one_shot().await;
                    }
                }
                Err(error) => {
                    failure_streak = failure_streak.saturating_add(1);
                    eprintln!(
                        "issue monitor poll error: repo={} streak={} error={error}",
                        self.repo.as_slug(),
                        failure_streak
                    );
                    if self.config.poll_once {
                        return Err(error);
                    }
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {
                            println!("issue monitor shutdown requested");
                            self.abandon_in_flight_work();
                            return Ok(());
                        }
                        _ = tokio::time::sleep(self.config.error_cooldown) => {}
                    }
                    continue;
                }
            }

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    println!("issue monitor shutdown requested");
                    self.abandon_in_flight_work();
                    return Ok(());
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    /// One poll cycle: settle finished work, fetch conditionally, walk every
    /// changed issue through the skip/dispatch decision, then persist once.
    /// Any error leaves the state file exactly as the last successful cycle
    /// wrote it.
    async fn poll_once(&mut self) -> Result<PollCycleReport> {
        let cycle_started = Instant::now();
        let mut report = PollCycleReport::default();
        let mut state_dirty = false;
        tokio::task::yield_now().await;
        self.drain_finished_closures(false).await;
        self.drain_finished_dispatches(&mut report, &mut state_dirty, false)
            .await;
        self.pump_pending_dispatches();

        let page = self
            .client
            .list_open_issues(self.state_store.list_etag())
            .await?;
        match page {
            IssueListPage::NotModified => {
                self.log_observed(json!({ "event": "list_not_modified" }));
                // a 304 is still a successful check; only the stamp moves
                if self
                    .state_store
                    .update_last_checked_at(Some(now_rfc3339()))
                {
                    state_dirty = true;
                }
            }
            IssueListPage::Updated { issues, etag } => {
                let candidates = detect_changed_issues(&issues, &self.state_store);
                report.discovered_issues = candidates.len();
                self.log_observed(json!({
                    "event": "issues_discovered",
                    "open_rows": issues.len(),
                    "changed": candidates.len(),
                }));
                for issue in candidates {
                    self.process_candidate_issue(issue, &mut report, &mut state_dirty)
                        .await?;
                }
                // the validator token advances only once every changed row
                // was handled; a failed cycle re-fetches the same list
                if self.state_store.update_list_etag(etag) {
                    state_dirty = true;
                }
                if self
                    .state_store
                    .update_last_checked_at(Some(now_rfc3339()))
                {
                    state_dirty = true;
                }
                let snapshot = self
                    .build_health_snapshot(&report, cycle_started.elapsed().as_millis() as u64);
                if self.state_store.update_health(snapshot) {
                    state_dirty = true;
                }
            }
        }
        self.pump_pending_dispatches();
        self.drain_finished_dispatches(&mut report, &mut state_dirty, false)
            .await;

        if state_dirty {
            self.save_state();
        }
        Ok(report)
    }

    /// Decides what one changed issue version means. The ignore set wins
    /// over everything; then the three dedup guards run cheapest first:
    /// recorded version key, completion-marker label (tracker labels are
    /// ground truth), durable comment footers (recovers from state loss).
    /// Only an issue that clears all four enters `in-progress`.
    async fn process_candidate_issue(
        &mut self,
        issue: &GithubIssue,
        report: &mut PollCycleReport,
        state_dirty: &mut bool,
    ) -> Result<()> {
        let key = version_key(issue);
        if let Some(ignore_label) = self.config.label_policy.find_ignore_label(issue) {
            report.ignored_skips = report.ignored_skips.saturating_add(1);
            self.log_observed(json!({
                "event": "issue_skipped",
                "reason": "ignore_label",
                "issue_number": issue.number,
                "version_key": key,
                "label": ignore_label,
            }));
            return Ok(());
        }
        if self.active.contains_key(&issue.number)
            || self
                .pending
                .iter()
                .any(|pending| pending.task.issue_number == issue.number)
        {
            // one dispatch per issue in flight; the new version stays
            // undetected and is revisited once the current run drains
            report.deferred_issues = report.deferred_issues.saturating_add(1);
            self.log_observed(json!({
                "event": "issue_skipped",
                "reason": "dispatch_in_flight",
                "issue_number": issue.number,
                "version_key": key,
            }));
            return Ok(());
        }
        if self.state_store.contains_key(&key) {
            report.cached_skips = report.cached_skips.saturating_add(1);
            let recorded = self
                .state_store
                .outcome_for(&key)
                .map(|outcome| outcome.as_str());
            self.log_observed(json!({
                "event": "issue_skipped",
                "reason": "cached_state_key",
                "issue_number": issue.number,
                "version_key": key,
                "recorded_outcome": recorded,
            }));
            return Ok(());
        }

        let decision = classify_workflow_phase(issue, &self.config.label_policy);
        if self.config.label_policy.has_processed(issue) {
            if self.state_store.record_version(
                issue.number,
                &issue.updated_at,
                decision.phase,
                ProcessedOutcome::Cached,
            ) {
                *state_dirty = true;
            }
            report.cached_skips = report.cached_skips.saturating_add(1);
            self.log_observed(json!({
                "event": "issue_skipped",
                "reason": "completion_marker_label",
                "issue_number": issue.number,
                "version_key": key,
            }));
            return Ok(());
        }

        let comments = self.client.list_issue_comments(issue.number).await?;
        let footer_keys = comments
            .iter()
            .filter(|comment| comment.user.login.eq_ignore_ascii_case(&self.bot_login))
            .flat_map(|comment| {
                extract_footer_version_keys(comment.body.as_deref().unwrap_or_default())
            })
            .collect::<HashSet<_>>();
        if footer_keys.contains(&key) {
            if self.state_store.record_version(
                issue.number,
                &issue.updated_at,
                decision.phase,
                ProcessedOutcome::Cached,
            ) {
                *state_dirty = true;
            }
            report.cached_skips = report.cached_skips.saturating_add(1);
            self.log_observed(json!({
                "event": "issue_skipped",
                "reason": "bot_comment_footer",
                "issue_number": issue.number,
                "version_key": key,
            }));
            return Ok(());
        }

        self.enter_in_progress(issue, decision, key, report, state_dirty)
            .await;
        Ok(())
    }

    /// The idle-to-in-progress transition: marker labels, initiating comment
    /// with the durable footer, the `dispatched` record, then the queue.
    /// Tracker writes are best-effort; the record is what prevents a
    /// duplicate dispatch.
    async fn enter_in_progress(
        &mut self,
        issue: &GithubIssue,
        decision: PhaseDecision,
        key: String,
        report: &mut PollCycleReport,
        state_dirty: &mut bool,
    ) {
        let run_id = format!(
            "hive-{}-{}-{}",
            issue.number,
            current_unix_timestamp_ms(),
            short_key_hash(&key)
        );
        let roles = self.config.roster.roles_for(decision.phase).to_vec();

        let in_progress = self.config.label_policy.in_progress.clone();
        self.add_label_best_effort(issue.number, &in_progress).await;
        if self.config.label_policy.has_error(issue) {
            let error_label = self.config.label_policy.error.clone();
            self.remove_label_best_effort(issue.number, &error_label)
                .await;
        }
        let body = render_dispatch_comment(decision.phase.as_str(), &roles, &run_id, &key);
        self.post_comment_best_effort(issue.number, &body, "dispatch")
            .await;

        if self.state_store.record_version(
            issue.number,
            &issue.updated_at,
            decision.phase,
            ProcessedOutcome::Dispatched,
        ) {
            *state_dirty = true;
        }

        let description = build_task_description(
            issue.number,
            &issue.title,
            decision.phase,
            &roles,
            issue.body.as_deref(),
        );
        let auto_close_requested =
            decision.phase.is_terminal() && self.config.label_policy.has_auto_close(issue);
        self.log_action(json!({
            "action": "dispatch_enqueued",
            "issue_number": issue.number,
            "version_key": key,
            "run_id": run_id,
            "phase": decision.phase.as_str(),
            "phase_source": decision.source.as_str(),
            "roles": roles,
            "auto_close_requested": auto_close_requested,
        }));
        self.pending.push_back(PendingDispatch {
            task: SwarmTask {
                run_id,
                issue_number: issue.number,
                issue_title: issue.title.clone(),
                phase: decision.phase,
                roles,
                description,
            },
            version_key: key,
            auto_close_requested,
        });
        report.dispatched_issues = report.dispatched_issues.saturating_add(1);
    }

    /// Starts queued work until the in-flight limit is reached.
    fn pump_pending_dispatches(&mut self) {
        let limit = self.config.max_inflight_dispatches.max(1);
        while self.active.len() < limit {
            let Some(pending) = self.pending.pop_front() else {
                break;
            };
            let issue_number = pending.task.issue_number;
            let active = spawn_dispatch(
                Arc::clone(&self.config.backend),
                pending,
                self.config.dispatch_timeout,
            );
            self.log_action(json!({
                "action": "dispatch_started",
                "issue_number": issue_number,
                "run_id": active.run_id,
                "version_key": active.version_key,
                "phase": active.phase.as_str(),
            }));
            self.active.insert(issue_number, active);
        }
    }

    /// Joins finished dispatches (all of them when `include_pending`) and
    /// applies their exit transitions.
    async fn drain_finished_dispatches(
        &mut self,
        report: &mut PollCycleReport,
        state_dirty: &mut bool,
        include_pending: bool,
    ) {
        let finished_issues = self
            .active
            .iter()
            .filter_map(|(issue_number, active)| {
                if include_pending || active.handle.is_finished() {
                    Some(*issue_number)
                } else {
                    None
                }
            })
            .collect::<Vec<_>>();

        for issue_number in finished_issues {
            let Some(active) = self.active.remove(&issue_number) else {
                continue;
            };
            let ActiveDispatch {
                run_id,
                version_key,
                phase,
                auto_close_requested,
                started_unix_ms,
                cancel_tx: _,
                handle,
            } = active;
            let result = match handle.await {
                Ok(result) => result,
                Err(error) => DispatchResult {
                    status: DispatchStatus::Failed,
                    detail: Some(format!("dispatch task join failed: {error}")),
                    duration_ms: current_unix_timestamp_ms().saturating_sub(started_unix_ms),
                },
            };
            self.apply_dispatch_exit(
                issue_number,
                &run_id,
                &version_key,
                phase,
                auto_close_requested,
                result,
                report,
                state_dirty,
            )
            .await;
        }
    }

    /// The in-progress-to-terminal transition for one drained dispatch:
    /// swap marker labels, post the outcome comment, resolve the record.
    #[allow(clippy::too_many_arguments)]
    async fn apply_dispatch_exit(
        &mut self,
        issue_number: u64,
        run_id: &str,
        key: &str,
        phase: WorkflowPhase,
        auto_close_requested: bool,
        result: DispatchResult,
        report: &mut PollCycleReport,
        state_dirty: &mut bool,
    ) {
        let in_progress = self.config.label_policy.in_progress.clone();
        self.remove_label_best_effort(issue_number, &in_progress)
            .await;
        match result.status {
            DispatchStatus::Completed => {
                let processed = self.config.label_policy.processed.clone();
                self.add_label_best_effort(issue_number, &processed).await;
                let body = render_completion_comment(
                    phase.as_str(),
                    run_id,
                    result.detail.as_deref(),
                    key,
                );
                self.post_comment_best_effort(issue_number, &body, "completion")
                    .await;
                if self
                    .state_store
                    .resolve_outcome(key, ProcessedOutcome::Processed)
                {
                    *state_dirty = true;
                }
                report.completed_dispatches = report.completed_dispatches.saturating_add(1);
            }
            DispatchStatus::Failed | DispatchStatus::TimedOut | DispatchStatus::Cancelled => {
                let error_label = self.config.label_policy.error.clone();
                self.add_label_best_effort(issue_number, &error_label).await;
                let body = render_error_comment(
                    phase.as_str(),
                    run_id,
                    result.status.reason_code(),
                    result.detail.as_deref(),
                    key,
                );
                self.post_comment_best_effort(issue_number, &body, "error")
                    .await;
                if self.state_store.resolve_outcome(key, ProcessedOutcome::Error) {
                    *state_dirty = true;
                }
                report.failed_dispatches = report.failed_dispatches.saturating_add(1);
            }
        }
        self.log_action(json!({
            "action": "dispatch_finished",
            "issue_number": issue_number,
            "run_id": run_id,
            "version_key": key,
            "phase": phase.as_str(),
            "status": result.status.as_str(),
            "duration_ms": result.duration_ms,
            "detail": result.detail,
        }));
        if result.status == DispatchStatus::Completed && auto_close_requested {
            self.schedule_auto_close(issue_number);
        }
    }

    fn schedule_auto_close(&mut self, issue_number: u64) {
        let grace = self.config.auto_close_grace;
        let keep_open_label = self.config.label_policy.keep_open.clone();
        let request = AutoCloseRequest {
            issue_number,
            grace,
            keep_open_label: keep_open_label.clone(),
            warning_body: render_auto_close_warning(grace.as_secs(), &keep_open_label),
            notice_body: render_auto_close_notice(),
        };
        self.log_action(json!({
            "action": "auto_close_scheduled",
            "issue_number": issue_number,
            "grace_ms": grace.as_millis() as u64,
        }));
        self.closures
            .push(spawn_auto_close(self.client.clone(), request));
    }

    /// Joins finished auto-closure tasks (all of them when
    /// `include_pending`) and records how each resolved.
    async fn drain_finished_closures(&mut self, include_pending: bool) {
        let drained = self.closures.drain(..).collect::<Vec<_>>();
        for handle in drained {
            if !include_pending && !handle.is_finished() {
                self.closures.push(handle);
                continue;
            }
            match handle.await {
                Ok((issue_number, outcome)) => {
                    self.log_action(json!({
                        "action": "auto_close_resolved",
                        "issue_number": issue_number,
                        "outcome": outcome.reason_code(),
                        "detail": outcome.detail(),
                    }));
                    if let Some(detail) = outcome.detail() {
                        eprintln!(
                            "issue monitor auto-close aborted: repo={} issue=#{} reason={} error={detail}",
                            self.repo.as_slug(),
                            issue_number,
                            outcome.reason_code()
                        );
                    }
                }
                Err(error) => {
                    eprintln!(
                        "issue monitor auto-close join failed: repo={} error={error}",
                        self.repo.as_slug()
                    );
                }
            }
        }
    }

    /// One-shot epilogue: let every queued and active dispatch finish,
    /// resolve scheduled closures, persist, and report.
    async fn finish_one_shot(&mut self) -> Result<()> {
        let mut report = PollCycleReport::default();
        let mut state_dirty = false;
        while !self.pending.is_empty() || !self.active.is_empty() {
            self.pump_pending_dispatches();
            self.drain_finished_dispatches(&mut report, &mut state_dirty, true)
                .await;
        }
        self.drain_finished_closures(true).await;
        if state_dirty {
            self.save_state();
        }
        println!(
            "issue monitor one-shot complete: repo={} completed={} failed={}",
            self.repo.as_slug(),
            report.completed_dispatches,
            report.failed_dispatches
        );
        Ok(())
    }

    /// Flips every in-flight cancel watch on shutdown. Nothing is persisted
    /// here: dispatched records stay `dispatched` and their versions are
    /// never retried, which the error comment taxonomy treats as abandoned.
    fn abandon_in_flight_work(&mut self) {
        if !self.active.is_empty() {
            for (issue_number, active) in &self.active {
                let _ = active.cancel_tx.send(true);
                self.log_action(json!({
                    "action": "dispatch_abandoned",
                    "issue_number": issue_number,
                    "run_id": active.run_id,
                    "version_key": active.version_key,
                }));
            }
            eprintln!(
                "issue monitor shutdown: abandoning {} in-flight dispatches",
                self.active.len()
            );
        }
        if !self.closures.is_empty() {
            eprintln!(
                "issue monitor shutdown: abandoning {} scheduled closures",
                self.closures.len()
            );
        }
    }

    async fn add_label_best_effort(&self, issue_number: u64, label: &str) {
        let labels = [label.to_string()];
        match self.client.add_issue_labels(issue_number, &labels).await {
            Ok(()) => {
                self.log_action(json!({
                    "action": "label_added",
                    "issue_number": issue_number,
                    "label": label,
                }));
            }
            Err(error) => {
                tracing::warn!(
                    issue = issue_number,
                    label,
                    error = %error,
                    "label add failed"
                );
                self.log_action(json!({
                    "action": "label_add_failed",
                    "issue_number": issue_number,
                    "label": label,
                    "error": error.to_string(),
                }));
            }
        }
    }

    async fn remove_label_best_effort(&self, issue_number: u64, label: &str) {
        match self.client.remove_issue_label(issue_number, label).await {
            Ok(removed) => {
                self.log_action(json!({
                    "action": if removed { "label_removed" } else { "label_already_absent" },
                    "issue_number": issue_number,
                    "label": label,
                }));
            }
            Err(error) => {
                tracing::warn!(
                    issue = issue_number,
                    label,
                    error = %error,
                    "label remove failed"
                );
                self.log_action(json!({
                    "action": "label_remove_failed",
                    "issue_number": issue_number,
                    "label": label,
                    "error": error.to_string(),
                }));
            }
        }
    }

    async fn post_comment_best_effort(
        &self,
        issue_number: u64,
        body: &str,
        kind: &str,
    ) -> Option<u64> {
        match self.client.create_issue_comment(issue_number, body).await {
            Ok(response) => {
                self.log_action(json!({
                    "action": "comment_posted",
                    "kind": kind,
                    "issue_number": issue_number,
                    "comment_id": response.id,
                }));
                Some(response.id)
            }
            Err(error) => {
                tracing::warn!(
                    issue = issue_number,
                    kind,
                    error = %error,
                    "comment post failed"
                );
                self.log_action(json!({
                    "action": "comment_post_failed",
                    "kind": kind,
                    "issue_number": issue_number,
                    "error": error.to_string(),
                }));
                None
            }
        }
    }

    fn build_health_snapshot(
        &self,
        report: &PollCycleReport,
        cycle_duration_ms: u64,
    ) -> MonitorHealthSnapshot {
        MonitorHealthSnapshot {
            updated_unix_ms: current_unix_timestamp_ms(),
            cycle_duration_ms,
            active_dispatches: self.active.len(),
            queued_dispatches: self.pending.len(),
            last_cycle_discovered: report.discovered_issues,
            last_cycle_dispatched: report.dispatched_issues,
            last_cycle_completed: report.completed_dispatches,
            last_cycle_failed: report.failed_dispatches,
            last_cycle_cached_skips: report.cached_skips,
            last_cycle_ignored_skips: report.ignored_skips,
        }
    }

    fn save_state(&self) {
        if let Err(error) = self.state_store.save() {
            eprintln!(
                "issue monitor state save failed: repo={} error={error:#}",
                self.repo.as_slug()
            );
        }
    }

    // every log event carries the emit time and repo slug
    fn log_observed(&self, event: serde_json::Value) {
        self.append_log(&self.observed_log, event);
    }

    fn log_action(&self, event: serde_json::Value) {
        self.append_log(&self.action_log, event);
    }

    fn append_log(&self, log: &JsonlLog, mut event: serde_json::Value) {
        if let Some(map) = event.as_object_mut() {
            map.insert(
                "timestamp_unix_ms".to_string(),
                json!(current_unix_timestamp_ms()),
            );
            map.insert("repo".to_string(), json!(self.repo.as_slug()));
        }
        if let Err(error) = log.append(&event) {
            tracing::warn!(
                path = %log.path().display(),
                error = %error,
                "activity log append failed"
            );
        }
    }
}
