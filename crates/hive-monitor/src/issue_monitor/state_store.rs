//! State-file persistence for monitor checkpoints and processed-version
//! records.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use hive_core::{current_unix_timestamp_ms, write_text_atomic};
use hive_github::issue_snapshot::version_key_for;
use hive_github::phase_classifier::WorkflowPhase;

pub(super) const MONITOR_STATE_SCHEMA_VERSION: u32 = 1;

/// Where a recorded version currently stands. `Dispatched` is the only
/// non-final value; it advances exactly once, to `Processed` or `Error`.
/// `Cached` marks versions that were skipped because the tracker already
/// carried evidence of completed work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(super) enum ProcessedOutcome {
    Dispatched,
    Processed,
    Error,
    Cached,
}

impl ProcessedOutcome {
    pub(super) fn as_str(&self) -> &'static str {
        match self {
            Self::Dispatched => "dispatched",
            Self::Processed => "processed",
            Self::Error => "error",
            Self::Cached => "cached",
        }
    }
}

/// One handled issue version. The key `issue_number:issue_updated_at` is
/// append-only: a record is never removed for reprocessing, only pruned by
/// the retention cap once the set grows past it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct ProcessedVersionRecord {
    pub(super) issue_number: u64,
    pub(super) issue_updated_at: String,
    pub(super) phase: WorkflowPhase,
    pub(super) outcome: ProcessedOutcome,
    pub(super) processed_unix_ms: u64,
}

impl ProcessedVersionRecord {
    pub(super) fn key(&self) -> String {
        version_key_for(self.issue_number, &self.issue_updated_at)
    }
}

/// Last-cycle counters persisted for operator inspection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(super) struct MonitorHealthSnapshot {
    #[serde(default)]
    pub(super) updated_unix_ms: u64,
    #[serde(default)]
    pub(super) cycle_duration_ms: u64,
    #[serde(default)]
    pub(super) active_dispatches: usize,
    #[serde(default)]
    pub(super) queued_dispatches: usize,
    #[serde(default)]
    pub(super) last_cycle_discovered: usize,
    #[serde(default)]
    pub(super) last_cycle_dispatched: usize,
    #[serde(default)]
    pub(super) last_cycle_completed: usize,
    #[serde(default)]
    pub(super) last_cycle_failed: usize,
    #[serde(default)]
    pub(super) last_cycle_cached_skips: usize,
    #[serde(default)]
    pub(super) last_cycle_ignored_skips: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MonitorState {
    schema_version: u32,
    #[serde(default)]
    last_checked_at: Option<String>,
    #[serde(default)]
    list_etag: Option<String>,
    #[serde(default)]
    processed_versions: Vec<ProcessedVersionRecord>,
    #[serde(default)]
    health: MonitorHealthSnapshot,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self {
            schema_version: MONITOR_STATE_SCHEMA_VERSION,
            last_checked_at: None,
            list_etag: None,
            processed_versions: Vec::new(),
            health: MonitorHealthSnapshot::default(),
        }
    }
}

pub(super) struct MonitorStateStore {
    path: PathBuf,
    cap: usize,
    state: MonitorState,
    key_index: HashSet<String>,
}

impl MonitorStateStore {
    /// Loads persisted monitor state and rebuilds the in-memory version-key
    /// index. An unreadable or schema-incompatible file starts fresh rather
    /// than aborting: the tracker labels and comment footers carry enough
    /// evidence to avoid duplicate work.
    pub(super) fn load(path: PathBuf, cap: usize) -> Result<Self> {
        let mut state = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read state file {}", path.display()))?;
            match serde_json::from_str::<MonitorState>(&raw) {
                Ok(state) => state,
                Err(error) => {
                    eprintln!(
                        "failed to parse monitor state file {}: {} (starting fresh)",
                        path.display(),
                        error
                    );
                    MonitorState::default()
                }
            }
        } else {
            MonitorState::default()
        };

        if state.schema_version != MONITOR_STATE_SCHEMA_VERSION {
            eprintln!(
                "unsupported monitor state schema: expected {}, found {} (starting fresh)",
                MONITOR_STATE_SCHEMA_VERSION, state.schema_version
            );
            state = MonitorState::default();
        }

        let cap = cap.max(1);
        if state.processed_versions.len() > cap {
            let keep_from = state.processed_versions.len() - cap;
            state.processed_versions = state.processed_versions[keep_from..].to_vec();
        }
        let key_index = state
            .processed_versions
            .iter()
            .map(ProcessedVersionRecord::key)
            .collect::<HashSet<_>>();
        Ok(Self {
            path,
            cap,
            state,
            key_index,
        })
    }

    pub(super) fn contains_key(&self, key: &str) -> bool {
        self.key_index.contains(key)
    }

    pub(super) fn outcome_for(&self, key: &str) -> Option<ProcessedOutcome> {
        self.state
            .processed_versions
            .iter()
            .rev()
            .find(|record| record.key() == key)
            .map(|record| record.outcome)
    }

    /// Appends a record for a newly observed version. Returns false without
    /// touching the set when the key is already present.
    pub(super) fn record_version(
        &mut self,
        issue_number: u64,
        issue_updated_at: &str,
        phase: WorkflowPhase,
        outcome: ProcessedOutcome,
    ) -> bool {
        let key = version_key_for(issue_number, issue_updated_at);
        if self.key_index.contains(&key) {
            return false;
        }
        self.state.processed_versions.push(ProcessedVersionRecord {
            issue_number,
            issue_updated_at: issue_updated_at.to_string(),
            phase,
            outcome,
            processed_unix_ms: current_unix_timestamp_ms(),
        });
        self.key_index.insert(key);
        while self.state.processed_versions.len() > self.cap {
            let removed = self.state.processed_versions.remove(0);
            self.key_index.remove(&removed.key());
        }
        true
    }

    /// Advances a `dispatched` record to its final outcome. Records already
    /// resolved stay as they are.
    pub(super) fn resolve_outcome(&mut self, key: &str, outcome: ProcessedOutcome) -> bool {
        let Some(record) = self
            .state
            .processed_versions
            .iter_mut()
            .rev()
            .find(|record| record.key() == key)
        else {
            return false;
        };
        if record.outcome != ProcessedOutcome::Dispatched
            || outcome == ProcessedOutcome::Dispatched
        {
            return false;
        }
        record.outcome = outcome;
        record.processed_unix_ms = current_unix_timestamp_ms();
        true
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub(super) fn record_count(&self) -> usize {
        self.state.processed_versions.len()
    }

    pub(super) fn list_etag(&self) -> Option<&str> {
        self.state.list_etag.as_deref()
    }

    pub(super) fn update_list_etag(&mut self, value: Option<String>) -> bool {
        if self.state.list_etag == value {
            return false;
        }
        self.state.list_etag = value;
        true
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub(super) fn last_checked_at(&self) -> Option<&str> {
        self.state.last_checked_at.as_deref()
    }

    pub(super) fn update_last_checked_at(&mut self, value: Option<String>) -> bool {
        if self.state.last_checked_at == value {
            return false;
        }
        self.state.last_checked_at = value;
        true
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub(super) fn health(&self) -> &MonitorHealthSnapshot {
        &self.state.health
    }

    pub(super) fn update_health(&mut self, value: MonitorHealthSnapshot) -> bool {
        if self.state.health == value {
            return false;
        }
        self.state.health = value;
        true
    }

    pub(super) fn save(&self) -> Result<()> {
        let mut payload =
            serde_json::to_string_pretty(&self.state).context("failed to serialize state")?;
        payload.push('\n');
        write_text_atomic(&self.path, &payload)
            .with_context(|| format!("failed to write state file {}", self.path.display()))?;
        Ok(())
    }
}
