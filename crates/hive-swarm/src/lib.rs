//! Analysis-dispatch building blocks for the hive monitor.
//!
//! Defines the task payload handed to an analysis run, the phase-to-roster
//! configuration table, and the [`SwarmBackend`] seam with its default
//! process-spawning implementation.

pub mod role_roster;
pub mod swarm_backend;
pub mod swarm_task;

pub use role_roster::{load_roster_table, parse_roster_table, RosterTable};
pub use swarm_backend::{ProcessSwarmBackend, SwarmBackend, SwarmOutcome, SwarmRunStatus};
pub use swarm_task::{build_task_description, SwarmTask};
