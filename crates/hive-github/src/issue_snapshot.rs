use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubUser {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubIssueLabel {
    pub name: String,
}

/// Read-only snapshot of a tracker issue as returned by the list/get
/// endpoints. `pull_request` is present exactly when the row is a pull
/// request wearing the issue shape; those rows are never processed.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubIssue {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    #[serde(default)]
    pub state: String,
    pub created_at: String,
    pub updated_at: String,
    pub user: GithubUser,
    #[serde(default)]
    pub labels: Vec<GithubIssueLabel>,
    #[serde(default)]
    pub pull_request: Option<Value>,
}

impl GithubIssue {
    pub fn is_closed(&self) -> bool {
        self.state.eq_ignore_ascii_case("closed")
    }

    pub fn label_names(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(|label| label.name.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubIssueComment {
    pub id: u64,
    pub body: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub user: GithubUser,
}

/// One observed issue version is identified by `number:updated_at`. The pair
/// is the unit of at-most-once processing: editing an issue bumps
/// `updated_at` and yields a fresh key.
pub fn version_key(issue: &GithubIssue) -> String {
    version_key_for(issue.number, &issue.updated_at)
}

pub fn version_key_for(issue_number: u64, updated_at: &str) -> String {
    format!("{issue_number}:{}", updated_at.trim())
}
