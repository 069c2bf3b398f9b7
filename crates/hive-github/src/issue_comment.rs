/// Durable marker embedded in every comment the monitor posts about a
/// processed issue version. Survives state-file loss: scanning bot comments
/// for these markers rebuilds the set of versions already handled.
pub const VERSION_KEY_MARKER_PREFIX: &str = "<!-- hive-version-key:";
pub const VERSION_KEY_MARKER_SUFFIX: &str = " -->";

fn footer_line(version_key: &str) -> String {
    format!("{VERSION_KEY_MARKER_PREFIX}{version_key}{VERSION_KEY_MARKER_SUFFIX}")
}

fn join_roles(roles: &[String]) -> String {
    if roles.is_empty() {
        "none".to_string()
    } else {
        roles.join(",")
    }
}

/// Comment posted when a dispatch enters `in-progress`.
pub fn render_dispatch_comment(
    phase: &str,
    roles: &[String],
    run_id: &str,
    version_key: &str,
) -> String {
    format!(
        "Swarm analysis started for this issue version.\n\n---\n{}\n_Hive run `{run_id}` | phase `{phase}` | roles `{}`_",
        footer_line(version_key),
        join_roles(roles)
    )
}

/// Comment posted on the success transition.
pub fn render_completion_comment(
    phase: &str,
    run_id: &str,
    detail: Option<&str>,
    version_key: &str,
) -> String {
    let summary = match detail.map(str::trim).filter(|text| !text.is_empty()) {
        Some(text) => format!("Swarm analysis completed.\n\n{text}"),
        None => "Swarm analysis completed.".to_string(),
    };
    format!(
        "{summary}\n\n---\n{}\n_Hive run `{run_id}` | phase `{phase}` | status `processed`_",
        footer_line(version_key)
    )
}

/// Comment posted on the error transition, covering backend failures,
/// timeouts, and dispatch exceptions.
pub fn render_error_comment(
    phase: &str,
    run_id: &str,
    reason_code: &str,
    detail: Option<&str>,
    version_key: &str,
) -> String {
    let summary = match detail.map(str::trim).filter(|text| !text.is_empty()) {
        Some(text) => format!("Swarm analysis failed.\n\n```\n{text}\n```"),
        None => "Swarm analysis failed.".to_string(),
    };
    let reason_code = if reason_code.trim().is_empty() {
        "dispatch_failed"
    } else {
        reason_code.trim()
    };
    format!(
        "{summary}\n\nThe issue keeps its current version cached; edit it to request another run.\n\n---\n{}\n_Hive run `{run_id}` | phase `{phase}` | status `error` | reason_code `{reason_code}`_",
        footer_line(version_key)
    )
}

/// Warning posted before a scheduled auto-closure. Humans cancel by adding
/// the named keep-open label before the grace period lapses.
pub fn render_auto_close_warning(grace_secs: u64, keep_open_label: &str) -> String {
    format!(
        "All analysis for this issue is complete. It will be closed automatically in {grace_secs}s.\n\nAdd the `{keep_open_label}` label to keep it open."
    )
}

/// Note posted after the monitor closes an issue.
pub fn render_auto_close_notice() -> String {
    "Closed automatically after completed analysis.".to_string()
}

/// Extracts every version key embedded in `text` via the footer marker.
/// Unterminated markers are ignored.
pub fn extract_footer_version_keys(text: &str) -> Vec<String> {
    let mut keys = Vec::new();
    let mut cursor = text;
    while let Some(start) = cursor.find(VERSION_KEY_MARKER_PREFIX) {
        let after_start = &cursor[start + VERSION_KEY_MARKER_PREFIX.len()..];
        let Some(end) = after_start.find(VERSION_KEY_MARKER_SUFFIX) else {
            break;
        };
        let key = after_start[..end].trim();
        if !key.is_empty() {
            keys.push(key.to_string());
        }
        cursor = &after_start[end + VERSION_KEY_MARKER_SUFFIX.len()..];
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::{
        extract_footer_version_keys, render_auto_close_warning, render_completion_comment,
        render_dispatch_comment, render_error_comment, VERSION_KEY_MARKER_PREFIX,
        VERSION_KEY_MARKER_SUFFIX,
    };

    #[test]
    fn unit_render_dispatch_comment_embeds_marker_and_roster() {
        let roles = vec!["architect".to_string(), "planner".to_string()];
        let rendered = render_dispatch_comment("planning", &roles, "run-1", "42:2026-01-01T00:00:10Z");
        assert!(rendered.contains("Swarm analysis started"));
        assert!(rendered.contains("<!-- hive-version-key:42:2026-01-01T00:00:10Z -->"));
        assert!(rendered.contains("phase `planning`"));
        assert!(rendered.contains("roles `architect,planner`"));
    }

    #[test]
    fn unit_render_completion_comment_includes_optional_detail() {
        let with_detail =
            render_completion_comment("idea", "run-2", Some("3 findings"), "7:t1");
        assert!(with_detail.contains("3 findings"));
        assert!(with_detail.contains("status `processed`"));

        let bare = render_completion_comment("idea", "run-2", Some("  "), "7:t1");
        assert!(bare.contains("Swarm analysis completed."));
        assert!(!bare.contains("```"));
    }

    #[test]
    fn functional_render_error_comment_defaults_blank_reason_code() {
        let rendered = render_error_comment("research", "run-3", "  ", Some("boom"), "7:t1");
        assert!(rendered.contains("reason_code `dispatch_failed`"));
        assert!(rendered.contains("```\nboom\n```"));
        assert!(rendered.contains("status `error`"));
    }

    #[test]
    fn functional_render_auto_close_warning_names_grace_and_label() {
        let rendered = render_auto_close_warning(60, "keep-open");
        assert!(rendered.contains("closed automatically in 60s"));
        assert!(rendered.contains("`keep-open`"));
    }

    #[test]
    fn integration_extract_footer_version_keys_reads_multiple_markers() {
        let body = format!(
            "done\n{VERSION_KEY_MARKER_PREFIX}42:t1{VERSION_KEY_MARKER_SUFFIX}\nmore\n{VERSION_KEY_MARKER_PREFIX} 42:t2 {VERSION_KEY_MARKER_SUFFIX}"
        );
        assert_eq!(
            extract_footer_version_keys(&body),
            vec!["42:t1".to_string(), "42:t2".to_string()]
        );
    }

    #[test]
    fn regression_extract_footer_version_keys_skips_unterminated_marker() {
        let body = format!(
            "ok {VERSION_KEY_MARKER_PREFIX}42:t1{VERSION_KEY_MARKER_SUFFIX} tail {VERSION_KEY_MARKER_PREFIX}42:t2"
        );
        assert_eq!(extract_footer_version_keys(&body), vec!["42:t1".to_string()]);
    }
}
