use crate::issue_snapshot::GithubIssue;

/// Normalize a tracker label for case-insensitive comparison.
pub fn normalize_label(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Returns true when `labels` contains `name` after normalization.
pub fn labels_contain<'a>(labels: impl IntoIterator<Item = &'a str>, name: &str) -> bool {
    let wanted = normalize_label(name);
    if wanted.is_empty() {
        return false;
    }
    labels
        .into_iter()
        .map(normalize_label)
        .any(|label| label == wanted)
}

/// The configured label vocabulary: processing markers written by the
/// monitor, control flags honored by it, and the ignore set that excludes an
/// issue from automation entirely. Tracker labels are authoritative; local
/// state never overrides what these names say on the issue itself.
#[derive(Debug, Clone)]
pub struct LabelPolicy {
    pub in_progress: String,
    pub processed: String,
    pub error: String,
    pub auto_close: String,
    pub keep_open: String,
    pub ignore: Vec<String>,
    pub phase_prefix: String,
}

impl Default for LabelPolicy {
    fn default() -> Self {
        Self {
            in_progress: "in-progress".to_string(),
            processed: "processed".to_string(),
            error: "error".to_string(),
            auto_close: "auto-close-on-complete".to_string(),
            keep_open: "keep-open".to_string(),
            ignore: vec![
                "automation:ignore".to_string(),
                "wip".to_string(),
                "no-automation".to_string(),
            ],
            phase_prefix: "phase:".to_string(),
        }
    }
}

impl LabelPolicy {
    /// Returns the first ignore-set label the issue carries, if any. The
    /// ignore check runs before classification and before any marker logic.
    pub fn find_ignore_label(&self, issue: &GithubIssue) -> Option<String> {
        let ignore: Vec<String> = self
            .ignore
            .iter()
            .map(|label| normalize_label(label))
            .filter(|label| !label.is_empty())
            .collect();
        issue
            .label_names()
            .map(normalize_label)
            .find(|label| ignore.contains(label))
    }

    pub fn has_in_progress(&self, issue: &GithubIssue) -> bool {
        labels_contain(issue.label_names(), &self.in_progress)
    }

    pub fn has_processed(&self, issue: &GithubIssue) -> bool {
        labels_contain(issue.label_names(), &self.processed)
    }

    pub fn has_error(&self, issue: &GithubIssue) -> bool {
        labels_contain(issue.label_names(), &self.error)
    }

    pub fn has_auto_close(&self, issue: &GithubIssue) -> bool {
        labels_contain(issue.label_names(), &self.auto_close)
    }

    pub fn has_keep_open(&self, issue: &GithubIssue) -> bool {
        labels_contain(issue.label_names(), &self.keep_open)
    }

    /// Strips the phase prefix from a label and returns the remainder, e.g.
    /// `phase:planning` yields `planning`. Comparison is case-insensitive.
    pub fn phase_label_value(&self, label: &str) -> Option<String> {
        let normalized = normalize_label(label);
        let prefix = normalize_label(&self.phase_prefix);
        if prefix.is_empty() {
            return None;
        }
        normalized
            .strip_prefix(&prefix)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}
