use serde::{Deserialize, Serialize};

use crate::issue_snapshot::GithubIssue;
use crate::label_policy::LabelPolicy;

/// Workflow phases an issue can be classified into, in keyword-scan priority
/// order. `implementation` is the terminal phase that makes an issue
/// eligible for auto-closure after a successful run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowPhase {
    Idea,
    Research,
    Planning,
    Implementation,
}

impl WorkflowPhase {
    pub const ALL: [WorkflowPhase; 4] = [
        WorkflowPhase::Idea,
        WorkflowPhase::Research,
        WorkflowPhase::Planning,
        WorkflowPhase::Implementation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idea => "idea",
            Self::Research => "research",
            Self::Planning => "planning",
            Self::Implementation => "implementation",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "idea" => Some(Self::Idea),
            "research" => Some(Self::Research),
            "planning" => Some(Self::Planning),
            "implementation" => Some(Self::Implementation),
            _ => None,
        }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Idea => &["idea", "proposal", "concept"],
            Self::Research => &["research", "investigate", "analysis"],
            Self::Planning => &["plan", "design", "architecture"],
            Self::Implementation => &["implement", "build", "code"],
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Implementation)
    }
}

impl std::fmt::Display for WorkflowPhase {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseSource {
    ExplicitLabel,
    Keyword,
    Default,
}

impl PhaseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExplicitLabel => "label",
            Self::Keyword => "keyword",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseDecision {
    pub phase: WorkflowPhase,
    pub source: PhaseSource,
}

/// Classifies an issue into a workflow phase.
///
/// An explicit `phase:<name>` label always wins (first parseable one in
/// label order). Otherwise the title and body are scanned for phase keywords
/// in fixed priority order, and the first phase with a hit wins. Issues that
/// match nothing default to `research`.
pub fn classify_workflow_phase(issue: &GithubIssue, policy: &LabelPolicy) -> PhaseDecision {
    for label in issue.label_names() {
        let Some(value) = policy.phase_label_value(label) else {
            continue;
        };
        if let Some(phase) = WorkflowPhase::parse(&value) {
            return PhaseDecision {
                phase,
                source: PhaseSource::ExplicitLabel,
            };
        }
    }

    let haystack = format!(
        "{}\n{}",
        issue.title,
        issue.body.as_deref().unwrap_or_default()
    )
    .to_ascii_lowercase();
    for phase in WorkflowPhase::ALL {
        if phase
            .keywords()
            .iter()
            .any(|keyword| haystack.contains(keyword))
        {
            return PhaseDecision {
                phase,
                source: PhaseSource::Keyword,
            };
        }
    }

    PhaseDecision {
        phase: WorkflowPhase::Research,
        source: PhaseSource::Default,
    }
}

#[cfg(test)]
mod tests {
    use super::{classify_workflow_phase, PhaseSource, WorkflowPhase};
    use crate::issue_snapshot::{GithubIssue, GithubIssueLabel, GithubUser};
    use crate::label_policy::LabelPolicy;

    fn issue(title: &str, body: Option<&str>, labels: &[&str]) -> GithubIssue {
        GithubIssue {
            id: 10,
            number: 3,
            title: title.to_string(),
            body: body.map(str::to_string),
            state: "open".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:05Z".to_string(),
            user: GithubUser {
                login: "reporter".to_string(),
            },
            labels: labels
                .iter()
                .map(|name| GithubIssueLabel {
                    name: name.to_string(),
                })
                .collect(),
            pull_request: None,
        }
    }

    #[test]
    fn unit_workflow_phase_parse_and_display_round_trip() {
        for phase in WorkflowPhase::ALL {
            assert_eq!(WorkflowPhase::parse(phase.as_str()), Some(phase));
        }
        assert_eq!(WorkflowPhase::parse(" Planning "), Some(WorkflowPhase::Planning));
        assert_eq!(WorkflowPhase::parse("triage"), None);
        assert!(WorkflowPhase::Implementation.is_terminal());
        assert!(!WorkflowPhase::Planning.is_terminal());
    }

    #[test]
    fn regression_explicit_phase_label_beats_keyword_scan() {
        let policy = LabelPolicy::default();
        let issue = issue(
            "Implement the cache layer",
            Some("We should implement and build this soon."),
            &["phase:planning"],
        );
        let decision = classify_workflow_phase(&issue, &policy);
        assert_eq!(decision.phase, WorkflowPhase::Planning);
        assert_eq!(decision.source, PhaseSource::ExplicitLabel);
    }

    #[test]
    fn functional_keyword_scan_follows_priority_order() {
        let policy = LabelPolicy::default();
        let both = issue("research the design", None, &[]);
        assert_eq!(
            classify_workflow_phase(&both, &policy).phase,
            WorkflowPhase::Research
        );

        let planning = issue("architecture sketch", Some("initial design"), &[]);
        let decision = classify_workflow_phase(&planning, &policy);
        assert_eq!(decision.phase, WorkflowPhase::Planning);
        assert_eq!(decision.source, PhaseSource::Keyword);

        let implementation = issue("build the exporter", None, &[]);
        assert_eq!(
            classify_workflow_phase(&implementation, &policy).phase,
            WorkflowPhase::Implementation
        );
    }

    #[test]
    fn functional_unmatched_issue_defaults_to_research() {
        let policy = LabelPolicy::default();
        let bland = issue("Weekly sync notes", Some("nothing to see"), &[]);
        let decision = classify_workflow_phase(&bland, &policy);
        assert_eq!(decision.phase, WorkflowPhase::Research);
        assert_eq!(decision.source, PhaseSource::Default);
    }

    #[test]
    fn regression_unparseable_phase_label_falls_back_to_keywords() {
        let policy = LabelPolicy::default();
        let issue = issue("build the exporter", None, &["phase:someday", "bug"]);
        let decision = classify_workflow_phase(&issue, &policy);
        assert_eq!(decision.phase, WorkflowPhase::Implementation);
        assert_eq!(decision.source, PhaseSource::Keyword);
    }

    #[test]
    fn unit_phase_serde_uses_lowercase_names() {
        let encoded = serde_json::to_string(&WorkflowPhase::Implementation).expect("encode");
        assert_eq!(encoded, "\"implementation\"");
        let decoded: WorkflowPhase = serde_json::from_str("\"idea\"").expect("decode");
        assert_eq!(decoded, WorkflowPhase::Idea);
    }
}
