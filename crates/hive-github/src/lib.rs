//! Shared GitHub-tracker helpers for the hive monitor runtime.
//! Wire-shape snapshots, the label vocabulary, workflow-phase
//! classification, comment rendering with durable version-key footers, and
//! transport retry/error helpers.

pub mod issue_comment;
pub mod issue_snapshot;
pub mod label_policy;
pub mod phase_classifier;
pub mod transport_helpers;
