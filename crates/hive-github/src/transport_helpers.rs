use std::time::Duration;

use reqwest::header::HeaderMap;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors surfaced by tracker API calls after in-client retries are
/// exhausted. Every variant is cycle-fatal for the poll loop (cooldown, then
/// resume) and never process-fatal.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("tracker api rate limited")]
    RateLimited { retry_after: Option<Duration> },
    #[error("tracker api transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("tracker api {operation} failed with status {status}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },
    #[error("failed to decode tracker api {operation} response: {source}")]
    Decode {
        operation: String,
        source: reqwest::Error,
    },
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Transport(error) => is_retryable_transport_error(error),
            Self::Status { status, .. } => is_retryable_status(*status),
            Self::Decode { .. } => false,
        }
    }
}

pub fn is_retryable_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..=599).contains(&status)
}

pub fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

/// True for responses that signal rate limiting: HTTP 429, or the tracker's
/// 403-with-exhausted-quota convention.
pub fn is_rate_limited_response(status: u16, headers: &HeaderMap) -> bool {
    if status == 429 {
        return true;
    }
    status == 403
        && headers
            .get("x-ratelimit-remaining")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            == Some("0")
}

/// Reads a numeric `retry-after` header. HTTP-date values are ignored.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

const RETRY_DELAY_CAP_MS: u64 = 30_000;

/// Exponential backoff delay for retry `attempt` (1-based), honoring a
/// server-provided `retry-after` when it asks for longer.
pub fn retry_delay(base_delay_ms: u64, attempt: usize, retry_after: Option<Duration>) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16) as u32;
    let backoff_ms = base_delay_ms
        .max(1)
        .saturating_mul(1_u64 << exponent)
        .min(RETRY_DELAY_CAP_MS);
    let backoff = Duration::from_millis(backoff_ms);
    match retry_after {
        Some(requested) if requested > backoff => requested,
        _ => backoff,
    }
}

/// Bounds response bodies quoted inside error messages.
pub fn truncate_for_error(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut truncated: String = trimmed.chars().take(max_chars).collect();
    truncated.push('…');
    truncated
}

/// Percent-encodes one URL path segment. Operator-configured label names can
/// carry `/`, `#`, or `?`, which would otherwise split or truncate the path.
pub fn percent_encode_path_segment(value: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut encoded = String::with_capacity(value.len());
    for byte in value.as_bytes() {
        let is_unreserved = matches!(
            byte,
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~'
        );
        if is_unreserved {
            encoded.push(*byte as char);
        } else {
            encoded.push('%');
            encoded.push(HEX[(byte >> 4) as usize] as char);
            encoded.push(HEX[(byte & 0x0F) as usize] as char);
        }
    }
    encoded
}

/// Short stable hash used to make run identifiers unique per version key.
pub fn short_key_hash(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let hex = format!("{digest:x}");
    hex.chars().take(8).collect()
}
