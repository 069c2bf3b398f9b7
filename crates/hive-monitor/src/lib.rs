//! The hive issue monitor: polls a GitHub repository for changed open
//! issues, classifies each new issue version into a workflow phase, and
//! dispatches bounded-concurrency swarm analysis runs while mirroring
//! lifecycle state back onto the tracker as labels and comments.

pub mod issue_monitor;

pub use issue_monitor::{run_issue_monitor, IssueMonitorConfig};
