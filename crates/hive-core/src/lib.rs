//! Foundational utilities shared across hive crates.
//!
//! Provides atomic file writes for persisted state, Unix-time helpers, and
//! the append-only JSONL activity log used by the monitor runtime.

pub mod atomic_io;
pub mod jsonl_log;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use jsonl_log::JsonlLog;
pub use time_utils::{current_unix_timestamp, current_unix_timestamp_ms};

#[cfg(test)]
mod tests {
    use std::fs::read_to_string;

    use super::*;

    #[test]
    fn unit_time_utils_clock_consistency() {
        let now_s = current_unix_timestamp();
        let now_ms = current_unix_timestamp_ms();
        let now_ms_as_s = now_ms / 1_000;
        assert!(now_ms_as_s >= now_s);
        assert!(now_ms_as_s <= now_s.saturating_add(1));
    }

    #[test]
    fn unit_write_text_atomic_replaces_existing_content() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("state.json");
        write_text_atomic(&path, "first").expect("first write");
        write_text_atomic(&path, "second").expect("second write");
        assert_eq!(read_to_string(&path).expect("read"), "second");
    }

    #[test]
    fn unit_write_text_atomic_rejects_directory_destination() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let error = write_text_atomic(tempdir.path(), "nope").expect_err("must fail");
        assert!(error.to_string().contains("is a directory"));
    }

    #[test]
    fn unit_write_text_atomic_creates_missing_parents() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("nested/dir/state.json");
        write_text_atomic(&path, "{}").expect("write");
        assert_eq!(read_to_string(&path).expect("read"), "{}");
    }

    #[test]
    fn unit_jsonl_log_appends_one_line_per_event() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("logs/actions.jsonl");
        let log = JsonlLog::open(path.clone()).expect("open");
        log.append(&serde_json::json!({"action": "comment", "issue": 7}))
            .expect("append");
        log.append(&serde_json::json!({"action": "close", "issue": 7}))
            .expect("append");

        let contents = read_to_string(&path).expect("read");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).expect("parse");
        assert_eq!(first["action"], "comment");
    }
}
