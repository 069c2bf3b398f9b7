//! Deferred auto-closure of issues whose terminal-phase analysis completed.

use std::time::Duration;

use tokio::task::JoinHandle;

use hive_github::label_policy::labels_contain;

use super::tracker_client::GithubApiClient;

#[derive(Debug, Clone)]
pub(super) struct AutoCloseRequest {
    pub(super) issue_number: u64,
    pub(super) grace: Duration,
    pub(super) keep_open_label: String,
    pub(super) warning_body: String,
    pub(super) notice_body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum AutoCloseOutcome {
    Closed,
    CancelledByLabel,
    AlreadyClosed,
    WarningFailed { error: String },
    RecheckFailed { error: String },
    CloseFailed { error: String },
}

impl AutoCloseOutcome {
    pub(super) fn reason_code(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::CancelledByLabel => "cancelled_by_keep_open_label",
            Self::AlreadyClosed => "already_closed",
            Self::WarningFailed { .. } => "warning_comment_failed",
            Self::RecheckFailed { .. } => "recheck_failed",
            Self::CloseFailed { .. } => "close_failed",
        }
    }

    pub(super) fn detail(&self) -> Option<&str> {
        match self {
            Self::WarningFailed { error }
            | Self::RecheckFailed { error }
            | Self::CloseFailed { error } => Some(error.as_str()),
            _ => None,
        }
    }
}

/// Warns, waits out the grace period, then re-reads the issue before
/// closing. Label state computed earlier never carries into the final
/// decision: only the fresh read counts, so a keep-open label added during
/// the window reliably cancels the closure. Any failure before the close
/// aborts it; an issue is never closed on stale or missing data.
pub(super) fn spawn_auto_close(
    client: GithubApiClient,
    request: AutoCloseRequest,
) -> JoinHandle<(u64, AutoCloseOutcome)> {
    tokio::spawn(async move {
        let issue_number = request.issue_number;
        if let Err(error) = client
            .create_issue_comment(issue_number, &request.warning_body)
            .await
        {
            return (
                issue_number,
                AutoCloseOutcome::WarningFailed {
                    error: error.to_string(),
                },
            );
        }

        tokio::time::sleep(request.grace).await;

        let issue = match client.get_issue(issue_number).await {
            Ok(issue) => issue,
            Err(error) => {
                return (
                    issue_number,
                    AutoCloseOutcome::RecheckFailed {
                        error: error.to_string(),
                    },
                );
            }
        };
        if issue.is_closed() {
            return (issue_number, AutoCloseOutcome::AlreadyClosed);
        }
        if labels_contain(issue.label_names(), &request.keep_open_label) {
            return (issue_number, AutoCloseOutcome::CancelledByLabel);
        }

        if let Err(error) = client.close_issue(issue_number).await {
            return (
                issue_number,
                AutoCloseOutcome::CloseFailed {
                    error: error.to_string(),
                },
            );
        }
        if let Err(error) = client
            .create_issue_comment(issue_number, &request.notice_body)
            .await
        {
            tracing::warn!(
                issue = issue_number,
                error = %error,
                "auto-close notice comment failed"
            );
        }
        (issue_number, AutoCloseOutcome::Closed)
    })
}
