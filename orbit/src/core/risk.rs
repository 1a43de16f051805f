//! Risk classification for shell commands.
//!
//! Catastrophic patterns are checked before sensitive keywords so a command
//! that matches both is never downgraded to a warning.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::{RiskAssessment, RiskLevel};

struct DangerRule {
    pattern: Regex,
    reason: &'static str,
}

static DANGER_RULES: LazyLock<Vec<DangerRule>> = LazyLock::new(|| {
    [
        (r"rm\s+-(?:rf|fr)\s+/", "recursive delete of a root path"),
        (
            r":\(\)\s*\{.*:\|:\s*&\s*\}\s*;\s*:",
            "fork bomb would exhaust system processes",
        ),
        (r"mkfs\.", "formats a filesystem"),
        (r">\s*/dev/sd[a-z]", "writes directly to a raw block device"),
        (r"dd\s+if=/dev/zero", "zero-fills a disk"),
        (
            r"chmod\s+-R\s+777\s+/",
            "makes the filesystem root world-writable",
        ),
        (r"mv\s+.*\s+/dev/null", "moves data into the null device"),
    ]
    .into_iter()
    .map(|(pattern, reason)| DangerRule {
        pattern: Regex::new(&format!("(?i){pattern}")).expect("danger pattern should be valid"),
        reason,
    })
    .collect()
});

const SENSITIVE_KEYWORDS: &[&str] = &[
    "rm", "sudo", "shutdown", "reboot", "kill", "iptables", "del", "format",
];

/// Classify `command`. Pure and total; keyword matching is exact-token and
/// case-insensitive.
pub fn assess(command: &str) -> RiskAssessment {
    if let Some(rule) = DANGER_RULES
        .iter()
        .find(|rule| rule.pattern.is_match(command))
    {
        return RiskAssessment::dangerous(format!("catastrophic command: {}", rule.reason));
    }

    for word in command.split_whitespace() {
        let word = word.to_lowercase();
        if let Some(keyword) = SENSITIVE_KEYWORDS.iter().find(|kw| **kw == word) {
            return RiskAssessment::warning(format!("sensitive keyword: [{keyword}]"));
        }
    }

    RiskAssessment::safe()
}

/// Assess every variant of a command and keep the most severe result.
///
/// Used when a command is rewritten for the host shell, so a rewrite can never
/// hide a pattern that only matches the original text.
pub fn assess_worst<'a>(variants: impl IntoIterator<Item = &'a str>) -> RiskAssessment {
    variants
        .into_iter()
        .map(assess)
        .max_by_key(|assessment| assessment.level)
        .unwrap_or_else(RiskAssessment::safe)
}

/// True when `level` should be surfaced to the user before running.
pub fn needs_attention(level: RiskLevel) -> bool {
    level != RiskLevel::Safe
}
