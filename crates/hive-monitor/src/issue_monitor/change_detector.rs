//! Pure detection step: which fetched issue rows are new work.

use hive_github::issue_snapshot::{version_key, GithubIssue};

use super::state_store::MonitorStateStore;

/// Filters a fetched snapshot down to rows worth processing. Pull requests
/// wearing the issue shape are dropped, and so is every row whose version
/// key is already recorded. Detection never mutates anything; the caller
/// decides what the surviving rows mean.
pub(super) fn detect_changed_issues<'a>(
    issues: &'a [GithubIssue],
    store: &MonitorStateStore,
) -> Vec<&'a GithubIssue> {
    issues
        .iter()
        .filter(|issue| issue.pull_request.is_none())
        .filter(|issue| !store.contains_key(&version_key(issue)))
        .collect()
}
