//! Diagnostic tracing for orbit.
//!
//! orbit writes to the terminal through three channels:
//!
//! - **Session output (`session::Console`, stdout)**: plan previews, the
//!   confirmation prompts and per-step status lines; the `plan` JSON and the
//!   `assess` verdict. Always shown.
//! - **Step processes**: shell steps inherit stdio, so their output streams
//!   live between the status lines.
//! - **Tracing (this module, stderr)**: retry decisions, risk gating, spawned
//!   commands. Filtered by `RUST_LOG`, quiet (`warn`) by default so it never
//!   repeats what the session already printed.

use std::io::IsTerminal;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset or unparseable.
pub const DEFAULT_DIRECTIVE: &str = "warn";

/// Build the filter for a raw `RUST_LOG` value.
///
/// A malformed value falls back to [`DEFAULT_DIRECTIVE`] rather than aborting
/// startup over a logging typo.
pub fn env_filter(raw: Option<&str>) -> EnvFilter {
    raw.map(str::trim)
        .filter(|directive| !directive.is_empty())
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the stderr subscriber. A second call is a no-op.
///
/// ```bash
/// RUST_LOG=orbit=debug orbit run "scaffold a flask app"
/// ```
pub fn init() {
    let raw = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .compact();

    // Err only when a subscriber is already installed.
    let _ = tracing_subscriber::registry()
        .with(env_filter(raw.as_deref()))
        .with(layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_or_blank_uses_default() {
        assert_eq!(env_filter(None).to_string(), DEFAULT_DIRECTIVE);
        assert_eq!(env_filter(Some("  ")).to_string(), DEFAULT_DIRECTIVE);
    }

    #[test]
    fn valid_directive_is_kept() {
        assert_eq!(env_filter(Some("orbit=debug")).to_string(), "orbit=debug");
    }

    #[test]
    fn malformed_directive_falls_back_to_default() {
        assert_eq!(
            env_filter(Some("orbit=loudest")).to_string(),
            DEFAULT_DIRECTIVE
        );
    }
}
