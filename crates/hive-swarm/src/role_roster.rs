use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use hive_github::phase_classifier::WorkflowPhase;
use serde::{Deserialize, Serialize};

pub const ROSTER_SCHEMA_VERSION: u32 = 1;

/// Maps each workflow phase to the ordered list of analysis roles dispatched
/// for it. Loaded from JSON; a missing file yields the built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterTable {
    pub schema_version: u32,
    #[serde(default)]
    pub phases: BTreeMap<WorkflowPhase, Vec<String>>,
}

impl Default for RosterTable {
    fn default() -> Self {
        let mut phases = BTreeMap::new();
        phases.insert(
            WorkflowPhase::Idea,
            vec!["scout".to_string(), "critic".to_string()],
        );
        phases.insert(
            WorkflowPhase::Research,
            vec![
                "researcher".to_string(),
                "librarian".to_string(),
                "critic".to_string(),
            ],
        );
        phases.insert(
            WorkflowPhase::Planning,
            vec![
                "architect".to_string(),
                "planner".to_string(),
                "estimator".to_string(),
            ],
        );
        phases.insert(
            WorkflowPhase::Implementation,
            vec![
                "implementer".to_string(),
                "reviewer".to_string(),
                "tester".to_string(),
            ],
        );
        Self {
            schema_version: ROSTER_SCHEMA_VERSION,
            phases,
        }
    }
}

impl RosterTable {
    /// Ordered roles for `phase`. Validated tables always have an entry; the
    /// empty slice only appears for tables that skipped validation.
    pub fn roles_for(&self, phase: WorkflowPhase) -> &[String] {
        self.phases
            .get(&phase)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Loads a roster table from `path`, or the defaults when the file does not
/// exist. Parse and validation failures are startup errors.
pub fn load_roster_table(path: &Path) -> Result<RosterTable> {
    if !path.exists() {
        return Ok(RosterTable::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read roster table {}", path.display()))?;
    parse_roster_table_with_source(&raw, &path.display().to_string())
}

pub fn parse_roster_table(raw: &str) -> Result<RosterTable> {
    parse_roster_table_with_source(raw, "<inline-roster>")
}

fn parse_roster_table_with_source(raw: &str, source_label: &str) -> Result<RosterTable> {
    let mut table = serde_json::from_str::<RosterTable>(raw)
        .with_context(|| format!("failed to parse roster table {source_label}"))?;
    normalize_and_validate_roster(source_label, &mut table)?;
    Ok(table)
}

fn normalize_and_validate_roster(source_label: &str, table: &mut RosterTable) -> Result<()> {
    if table.schema_version != ROSTER_SCHEMA_VERSION {
        bail!(
            "unsupported roster table schema_version {} in {} (expected {})",
            table.schema_version,
            source_label,
            ROSTER_SCHEMA_VERSION
        );
    }

    for phase in WorkflowPhase::ALL {
        let Some(roles) = table.phases.get_mut(&phase) else {
            bail!("roster table {} has no roles for phase '{}'", source_label, phase);
        };
        let mut normalized = Vec::with_capacity(roles.len());
        for raw_role in roles.iter() {
            let role = raw_role.trim().to_ascii_lowercase();
            if role.is_empty() {
                bail!(
                    "roster table {} has a blank role for phase '{}'",
                    source_label,
                    phase
                );
            }
            if normalized.contains(&role) {
                bail!(
                    "duplicate role '{}' for phase '{}' in {}",
                    role,
                    phase,
                    source_label
                );
            }
            normalized.push(role);
        }
        if normalized.is_empty() {
            bail!(
                "roster table {} has an empty role list for phase '{}'",
                source_label,
                phase
            );
        }
        *roles = normalized;
    }
    Ok(())
}
