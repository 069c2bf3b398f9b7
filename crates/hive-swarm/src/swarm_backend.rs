use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::watch;

use crate::swarm_task::SwarmTask;

const CHILD_POLL_INTERVAL_MS: u64 = 100;
const STDERR_TAIL_MAX_CHARS: usize = 600;

/// Terminal status of one backend run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwarmRunStatus {
    Completed,
    Failed,
    Cancelled,
}

impl SwarmRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwarmRunStatus::Completed => "completed",
            SwarmRunStatus::Failed => "failed",
            SwarmRunStatus::Cancelled => "cancelled",
        }
    }
}

/// What a run produced: terminal status plus an optional detail line that
/// ends up in tracker comments.
#[derive(Debug, Clone)]
pub struct SwarmOutcome {
    pub status: SwarmRunStatus,
    pub detail: Option<String>,
}

/// Seam between the monitor runtime and the analysis subsystem.
///
/// The watch receiver flips to `true` when the dispatcher abandons the run;
/// implementations are expected to stop promptly and report `Cancelled`.
/// Expected failures (non-zero exit, unreachable tool) come back as a
/// `Failed` outcome; `Err` is reserved for faults in the backend itself.
#[async_trait]
pub trait SwarmBackend: Send + Sync {
    async fn run(&self, task: SwarmTask, cancel: watch::Receiver<bool>) -> Result<SwarmOutcome>;
}

/// Default backend: one external process per task, stdio spooled under
/// `<spool_dir>/<run_id>/`.
///
/// The child is invoked as
/// `<command> <base_args..> --issue N --phase P --roles a,b --task-file PATH`
/// and owns its own tracker updates beyond the lifecycle transitions the
/// monitor performs.
pub struct ProcessSwarmBackend {
    command: String,
    base_args: Vec<String>,
    spool_dir: PathBuf,
}

impl ProcessSwarmBackend {
    pub fn new(command: String, base_args: Vec<String>, spool_dir: PathBuf) -> Self {
        Self {
            command,
            base_args,
            spool_dir,
        }
    }
}

#[async_trait]
impl SwarmBackend for ProcessSwarmBackend {
    async fn run(&self, task: SwarmTask, cancel: watch::Receiver<bool>) -> Result<SwarmOutcome> {
        if *cancel.borrow() {
            return Ok(SwarmOutcome {
                status: SwarmRunStatus::Cancelled,
                detail: None,
            });
        }

        let run_dir = self.spool_dir.join(&task.run_id);
        std::fs::create_dir_all(&run_dir)
            .with_context(|| format!("failed to create {}", run_dir.display()))?;
        let task_file = run_dir.join("task.md");
        std::fs::write(&task_file, &task.description)
            .with_context(|| format!("failed to write {}", task_file.display()))?;
        let stdout_path = run_dir.join("stdout.log");
        let stderr_path = run_dir.join("stderr.log");
        let stdout_file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&stdout_path)
            .with_context(|| format!("failed to open {}", stdout_path.display()))?;
        let stderr_file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&stderr_path)
            .with_context(|| format!("failed to open {}", stderr_path.display()))?;

        let mut command = Command::new(self.command.as_str());
        command.args(&self.base_args);
        command.arg("--issue").arg(task.issue_number.to_string());
        command.arg("--phase").arg(task.phase.as_str());
        command.arg("--roles").arg(task.roles.join(","));
        command.arg("--task-file").arg(&task_file);
        command.kill_on_drop(true);
        command.stdout(Stdio::from(stdout_file));
        command.stderr(Stdio::from(stderr_file));

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(error) => {
                return Ok(SwarmOutcome {
                    status: SwarmRunStatus::Failed,
                    detail: Some(format!("failed to spawn {}: {error}", self.command)),
                });
            }
        };
        tracing::debug!(
            run_id = %task.run_id,
            issue = task.issue_number,
            command = %self.command,
            "swarm process started"
        );

        let poll_interval = Duration::from_millis(CHILD_POLL_INTERVAL_MS);
        loop {
            if *cancel.borrow() {
                let _ = child.kill().await;
                return Ok(SwarmOutcome {
                    status: SwarmRunStatus::Cancelled,
                    detail: None,
                });
            }
            match child.try_wait() {
                Ok(Some(status)) => {
                    if status.success() {
                        return Ok(SwarmOutcome {
                            status: SwarmRunStatus::Completed,
                            detail: None,
                        });
                    }
                    let exit_code = status.code().unwrap_or(-1);
                    let detail = match stderr_tail(&stderr_path, STDERR_TAIL_MAX_CHARS) {
                        Some(tail) => format!("exit status {exit_code}: {tail}"),
                        None => format!("exit status {exit_code}"),
                    };
                    return Ok(SwarmOutcome {
                        status: SwarmRunStatus::Failed,
                        detail: Some(detail),
                    });
                }
                Ok(None) => {}
                Err(error) => {
                    let _ = child.kill().await;
                    return Err(error).context("failed to poll swarm process");
                }
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

fn stderr_tail(path: &Path, max_chars: usize) -> Option<String> {
    let raw = std::fs::read_to_string(path).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() <= max_chars {
        return Some(trimmed.to_string());
    }
    let tail: String = chars[chars.len() - max_chars..].iter().collect();
    Some(format!("[truncated] {tail}"))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use hive_github::phase_classifier::WorkflowPhase;
    use tempfile::tempdir;
    use tokio::sync::watch;

    use super::{stderr_tail, ProcessSwarmBackend, SwarmBackend, SwarmRunStatus};
    use crate::swarm_task::SwarmTask;

    fn test_task(run_id: &str) -> SwarmTask {
        SwarmTask {
            run_id: run_id.to_string(),
            issue_number: 7,
            issue_title: "Improve cache reuse".to_string(),
            phase: WorkflowPhase::Implementation,
            roles: vec!["implementer".to_string(), "reviewer".to_string()],
            description: "# Swarm analysis request\n\n- issue: #7 Improve cache reuse\n"
                .to_string(),
        }
    }

    #[cfg(unix)]
    fn write_executable_script(path: &Path, body: &str) {
        std::fs::write(path, body).expect("write script");
        let status = std::process::Command::new("chmod")
            .arg("+x")
            .arg(path)
            .status()
            .expect("chmod script");
        assert!(status.success());
    }

    #[test]
    fn unit_stderr_tail_keeps_last_chars_and_flags_truncation() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("stderr.log");
        std::fs::write(&path, "x".repeat(40) + "tail-end").expect("write stderr");
        let tail = stderr_tail(&path, 8).expect("tail");
        assert!(tail.starts_with("[truncated] "));
        assert!(tail.ends_with("tail-end"));

        std::fs::write(&path, "  \n").expect("write blank stderr");
        assert!(stderr_tail(&path, 8).is_none());
    }

    #[tokio::test]
    async fn unit_spawn_failure_yields_failed_outcome() {
        let dir = tempdir().expect("tempdir");
        let backend = ProcessSwarmBackend::new(
            dir.path()
                .join("missing-swarm-binary")
                .to_string_lossy()
                .into_owned(),
            Vec::new(),
            dir.path().join("spool"),
        );
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let outcome = backend
            .run(test_task("run-spawn-failure"), cancel_rx)
            .await
            .expect("run");
        assert_eq!(outcome.status, SwarmRunStatus::Failed);
        assert!(outcome.detail.expect("detail").contains("failed to spawn"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn functional_process_backend_reports_success_and_writes_task_file() {
        let dir = tempdir().expect("tempdir");
        let script = dir.path().join("swarm.sh");
        write_executable_script(&script, "#!/bin/sh\nexit 0\n");
        let spool = dir.path().join("spool");
        let backend = ProcessSwarmBackend::new(
            script.to_string_lossy().into_owned(),
            Vec::new(),
            spool.clone(),
        );
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let outcome = backend
            .run(test_task("run-success"), cancel_rx)
            .await
            .expect("run");
        assert_eq!(outcome.status, SwarmRunStatus::Completed);
        let task_file = spool.join("run-success").join("task.md");
        let written = std::fs::read_to_string(task_file).expect("task file");
        assert!(written.contains("issue: #7"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn functional_process_backend_passes_task_arguments() {
        let dir = tempdir().expect("tempdir");
        let script = dir.path().join("swarm.sh");
        // The task-file path is the final argument; the spool run dir is its
        // parent.
        write_executable_script(
            &script,
            "#!/bin/sh\nfor arg; do last=$arg; done\nprintf '%s ' \"$@\" > \"$(dirname \"$last\")/args.txt\"\nexit 0\n",
        );
        let spool = dir.path().join("spool");
        let backend = ProcessSwarmBackend::new(
            script.to_string_lossy().into_owned(),
            vec!["--mode".to_string(), "swarm".to_string()],
            spool.clone(),
        );
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let outcome = backend
            .run(test_task("run-args"), cancel_rx)
            .await
            .expect("run");
        assert_eq!(outcome.status, SwarmRunStatus::Completed);
        let args = std::fs::read_to_string(spool.join("run-args").join("args.txt"))
            .expect("args file");
        assert!(args.contains("--mode swarm"));
        assert!(args.contains("--issue 7"));
        assert!(args.contains("--phase implementation"));
        assert!(args.contains("--roles implementer,reviewer"));
        assert!(args.contains("--task-file"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn functional_process_backend_captures_stderr_tail_on_failure() {
        let dir = tempdir().expect("tempdir");
        let script = dir.path().join("swarm.sh");
        write_executable_script(&script, "#!/bin/sh\necho 'roster exploded' >&2\nexit 3\n");
        let backend = ProcessSwarmBackend::new(
            script.to_string_lossy().into_owned(),
            Vec::new(),
            dir.path().join("spool"),
        );
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let outcome = backend
            .run(test_task("run-failure"), cancel_rx)
            .await
            .expect("run");
        assert_eq!(outcome.status, SwarmRunStatus::Failed);
        let detail = outcome.detail.expect("detail");
        assert!(detail.contains("exit status 3"));
        assert!(detail.contains("roster exploded"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn functional_process_backend_kills_child_on_cancellation() {
        let dir = tempdir().expect("tempdir");
        let script = dir.path().join("swarm.sh");
        write_executable_script(&script, "#!/bin/sh\nsleep 30\n");
        let backend = ProcessSwarmBackend::new(
            script.to_string_lossy().into_owned(),
            Vec::new(),
            dir.path().join("spool"),
        );
        let (cancel_tx, cancel_rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(150)).await;
            let _ = cancel_tx.send(true);
        });
        let started = std::time::Instant::now();
        let outcome = backend
            .run(test_task("run-cancel"), cancel_rx)
            .await
            .expect("run");
        assert_eq!(outcome.status, SwarmRunStatus::Cancelled);
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }

    #[tokio::test]
    async fn unit_pre_flipped_cancel_skips_spawn() {
        let dir = tempdir().expect("tempdir");
        let spool = dir.path().join("spool");
        let backend = ProcessSwarmBackend::new(
            "unused-command".to_string(),
            Vec::new(),
            spool.clone(),
        );
        let (cancel_tx, cancel_rx) = watch::channel(false);
        cancel_tx.send(true).expect("flip cancel");
        let outcome = backend
            .run(test_task("run-pre-cancelled"), cancel_rx)
            .await
            .expect("run");
        assert_eq!(outcome.status, SwarmRunStatus::Cancelled);
        assert!(!spool.join("run-pre-cancelled").exists());
    }
}
