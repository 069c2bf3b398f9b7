use hive_github::phase_classifier::WorkflowPhase;

/// Issue bodies are quoted into task descriptions up to this many
/// characters; the remainder is elided.
pub const TASK_BODY_MAX_CHARS: usize = 4_000;

/// One unit of dispatched analysis work: an observed issue version plus the
/// roster the backend should run for its phase.
#[derive(Debug, Clone)]
pub struct SwarmTask {
    pub run_id: String,
    pub issue_number: u64,
    pub issue_title: String,
    pub phase: WorkflowPhase,
    pub roles: Vec<String>,
    pub description: String,
}

/// Renders the Markdown task description handed to the analysis backend.
pub fn build_task_description(
    issue_number: u64,
    issue_title: &str,
    phase: WorkflowPhase,
    roles: &[String],
    body: Option<&str>,
) -> String {
    let roles_line = if roles.is_empty() {
        "none".to_string()
    } else {
        roles.join(", ")
    };
    let body_section = match body.map(str::trim).filter(|text| !text.is_empty()) {
        Some(text) => truncate_task_body(text, TASK_BODY_MAX_CHARS),
        None => "_no issue body_".to_string(),
    };
    format!(
        "# Swarm analysis request\n\n- issue: #{issue_number} {issue_title}\n- phase: {phase}\n- roles: {roles_line}\n\n## Issue body\n\n{body_section}\n"
    )
}

fn truncate_task_body(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str("\n\n_[body truncated]_");
    truncated
}
