//! Shared deterministic types for plans, risk and step results.
//!
//! These types define the contract between the planner and the execution
//! engine. They carry no I/O and serialize to the action wire format.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A single operation proposed by the reasoning service.
///
/// Wire format: `{"type":"shell","command":...}` or
/// `{"type":"write","path":...,"content":...}`. Extra fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    /// Run a command line in the host shell.
    Shell { command: String },
    /// Create or overwrite a file; `path` may be relative to the working directory.
    Write { path: String, content: String },
    /// Element with an unknown `type` or missing fields. Never deserialized
    /// directly; produced by the plan parser and skipped by the engine.
    #[serde(skip_deserializing)]
    Unrecognized { kind: Option<String> },
}

impl Action {
    pub fn shell(command: impl Into<String>) -> Self {
        Self::Shell {
            command: command.into(),
        }
    }

    pub fn write(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Write {
            path: path.into(),
            content: content.into(),
        }
    }

    /// One-line description for previews and logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Shell { command } => format!("shell: {command}"),
            Self::Write { path, content } => format!("write: {path} ({} bytes)", content.len()),
            Self::Unrecognized { kind: Some(kind) } => format!("unrecognized: {kind}"),
            Self::Unrecognized { kind: None } => "unrecognized".to_string(),
        }
    }
}

/// Ordered list of actions; order is execution order.
pub type Plan = Vec<Action>;

/// Risk classification of a command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Safe,
    Warning,
    Dangerous,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Safe => "SAFE",
            Self::Warning => "WARNING",
            Self::Dangerous => "DANGEROUS",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying a command. Derived fresh per command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub reason: Option<String>,
}

impl RiskAssessment {
    pub fn safe() -> Self {
        Self {
            level: RiskLevel::Safe,
            reason: None,
        }
    }

    pub fn warning(reason: impl Into<String>) -> Self {
        Self {
            level: RiskLevel::Warning,
            reason: Some(reason.into()),
        }
    }

    pub fn dangerous(reason: impl Into<String>) -> Self {
        Self {
            level: RiskLevel::Dangerous,
            reason: Some(reason.into()),
        }
    }
}

/// Whether a failed planning attempt may be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Overload or rate limiting; worth another attempt after a delay.
    Transient,
    /// Anything else; retrying would fail the same way.
    Permanent,
}

/// What happened to one plan step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// File written at the resolved absolute path.
    Written { path: PathBuf },
    /// Working directory moved to `path` (any trailing command also succeeded).
    ChangedDir { path: PathBuf },
    /// Subprocess exited successfully.
    Ran,
    /// I/O error, spawn error, non-zero exit or timeout.
    Failed { error: String },
    /// Risk policy refused to run the command.
    Blocked { reason: String },
    /// Unrecognized action; neither success nor failure.
    Ignored,
}

impl StepStatus {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Written { .. } | Self::ChangedDir { .. } | Self::Ran
        )
    }
}

/// Per-step entry in the execution log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    /// 1-based position in the plan.
    pub index: usize,
    pub action: Action,
    pub status: StepStatus,
}

/// Counts derived from a report log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub blocked: usize,
    pub ignored: usize,
}

impl ExecutionSummary {
    pub fn from_reports(reports: &[StepReport]) -> Self {
        let mut summary = Self::default();
        for report in reports {
            match report.status {
                StepStatus::Failed { .. } => summary.failed += 1,
                StepStatus::Blocked { .. } => summary.blocked += 1,
                StepStatus::Ignored => summary.ignored += 1,
                _ => summary.succeeded += 1,
            }
        }
        summary
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.blocked == 0
    }
}
