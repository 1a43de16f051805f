//! Retry schedule and transient-failure classification for planning calls.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::core::types::RetryClass;

/// Retries allowed after the first attempt. Hard cap.
pub const MAX_RETRIES: u32 = 3;

/// HTTP statuses that signal an overloaded reasoning service.
pub const TRANSIENT_STATUSES: [u16; 2] = [429, 503];

static TRANSIENT_STATUS_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:429|503)\b").expect("status pattern should be valid"));

/// Delay before retrying after `attempt` failed (attempt counted from 1).
///
/// `2^attempt` seconds: 2s, 4s, 8s.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(16))
}

/// Classify a reasoner failure from its HTTP status, when known, or from a
/// whole `429`/`503` token in its message text.
pub fn classify(status: Option<u16>, message: &str) -> RetryClass {
    let transient = match status {
        Some(code) => TRANSIENT_STATUSES.contains(&code),
        None => TRANSIENT_STATUS_TEXT.is_match(message),
    };
    if transient {
        RetryClass::Transient
    } else {
        RetryClass::Permanent
    }
}

/// Whether another attempt is allowed after `attempt` failed with `class`.
pub fn should_retry(class: RetryClass, attempt: u32) -> bool {
    class == RetryClass::Transient && attempt <= MAX_RETRIES
}
