//! Plan execution against a working-directory context.
//!
//! Steps run strictly in order and one at a time. A failing step is recorded
//! and execution moves on to the next one; nothing short of process
//! termination stops a confirmed plan.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::path::resolve;
use crate::core::risk::assess_worst;
use crate::core::shell::{ShellDialect, split_dir_change};
use crate::core::types::{Action, RiskAssessment, RiskLevel, StepReport, StepStatus};
use crate::io::config::{OrbitConfig, RiskPolicy};
use crate::io::shell::{ShellRequest, ShellRunner};

/// The working-directory cursor shared by all steps of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    cwd: PathBuf,
    attached: bool,
}

impl ExecutionContext {
    /// Context that starts at the process's current directory and moves the
    /// process along with every `cd`.
    pub fn attached() -> Result<Self> {
        let cwd = std::env::current_dir().context("read current directory")?;
        Ok(Self {
            cwd,
            attached: true,
        })
    }

    /// Context that only tracks its own cursor.
    pub fn detached(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            attached: false,
        }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    fn move_to(&mut self, dir: PathBuf) -> Result<()> {
        if self.attached {
            std::env::set_current_dir(&dir)
                .with_context(|| format!("enter {}", dir.display()))?;
        }
        self.cwd = dir;
        Ok(())
    }
}

/// Engine settings derived from config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub dialect: ShellDialect,
    pub risk_policy: RiskPolicy,
    pub step_timeout: Option<Duration>,
}

impl EngineOptions {
    pub fn from_config(config: &OrbitConfig) -> Self {
        Self {
            dialect: config.shell.dialect(),
            risk_policy: config.risk_policy,
            step_timeout: config.step_timeout(),
        }
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            dialect: ShellDialect::host(),
            risk_policy: RiskPolicy::default(),
            step_timeout: None,
        }
    }
}

/// Observation and approval points around each step.
///
/// All methods have defaults, so callers only implement what they display.
pub trait StepHooks {
    /// Called before a step runs. `assessment` is present for shell steps.
    fn on_step_start(
        &mut self,
        _index: usize,
        _action: &Action,
        _assessment: Option<&RiskAssessment>,
    ) {
    }

    /// Second confirmation for a `DANGEROUS` command under the `confirm`
    /// policy. Refuses by default.
    fn approve_dangerous(&mut self, _command: &str, _assessment: &RiskAssessment) -> bool {
        false
    }

    fn on_step_finished(&mut self, _report: &StepReport) {}
}

/// Hooks that observe nothing and refuse dangerous commands.
pub struct NoHooks;

impl StepHooks for NoHooks {}

/// Walks plans one action at a time.
pub struct Engine<S> {
    context: ExecutionContext,
    shell: S,
    options: EngineOptions,
}

impl<S: ShellRunner> Engine<S> {
    pub fn new(context: ExecutionContext, shell: S, options: EngineOptions) -> Self {
        Self {
            context,
            shell,
            options,
        }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Execute every action in order and return one report per action.
    #[instrument(skip_all, fields(steps = plan.len()))]
    pub fn execute<H: StepHooks>(&mut self, plan: &[Action], hooks: &mut H) -> Vec<StepReport> {
        let mut reports = Vec::with_capacity(plan.len());
        for (offset, action) in plan.iter().enumerate() {
            let index = offset + 1;
            let status = match action {
                Action::Shell { command } => self.run_shell(index, action, command, hooks),
                Action::Write { path, content } => {
                    hooks.on_step_start(index, action, None);
                    match self.write_file(path, content) {
                        Ok(resolved) => StepStatus::Written { path: resolved },
                        Err(err) => failed(index, &err),
                    }
                }
                Action::Unrecognized { kind } => {
                    hooks.on_step_start(index, action, None);
                    debug!(index, ?kind, "skipping unrecognized action");
                    StepStatus::Ignored
                }
            };

            let report = StepReport {
                index,
                action: action.clone(),
                status,
            };
            hooks.on_step_finished(&report);
            reports.push(report);
        }
        reports
    }

    fn write_file(&self, path: &str, content: &str) -> Result<PathBuf> {
        let resolved = resolve(self.context.cwd(), path);
        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(&resolved, content).with_context(|| format!("write {}", resolved.display()))?;
        info!(path = %resolved.display(), bytes = content.len(), "file written");
        Ok(resolved)
    }

    fn run_shell<H: StepHooks>(
        &mut self,
        index: usize,
        action: &Action,
        command: &str,
        hooks: &mut H,
    ) -> StepStatus {
        let normalized = self.options.dialect.normalize(command);
        let assessment = assess_worst([command, normalized.as_str()]);
        hooks.on_step_start(index, action, Some(&assessment));

        if let Some(reason) = self.gate(&normalized, &assessment, hooks) {
            info!(index, command = %normalized, %reason, "command blocked");
            return StepStatus::Blocked { reason };
        }
        if assessment.level == RiskLevel::Warning {
            info!(index, reason = ?assessment.reason, "running sensitive command");
        }

        if let Some(change) = split_dir_change(&normalized) {
            let dir = match self.change_dir(change.target) {
                Ok(dir) => dir,
                Err(err) => return failed(index, &err),
            };
            if let Some(fallback) = change.fallback {
                debug!(index, fallback, "directory entered, skipping `||` fallback");
            }
            if let Some(rest) = change.rest
                && let Err(err) = self.spawn(rest)
            {
                return failed(index, &err.context(format!("after entering {}", dir.display())));
            }
            return StepStatus::ChangedDir { path: dir };
        }

        match self.spawn(&normalized) {
            Ok(()) => StepStatus::Ran,
            Err(err) => failed(index, &err),
        }
    }

    /// Apply the risk policy; `Some(reason)` means the command must not run.
    fn gate<H: StepHooks>(
        &self,
        command: &str,
        assessment: &RiskAssessment,
        hooks: &mut H,
    ) -> Option<String> {
        if assessment.level != RiskLevel::Dangerous {
            return None;
        }
        let reason = assessment
            .reason
            .clone()
            .unwrap_or_else(|| "dangerous command".to_string());
        match self.options.risk_policy {
            RiskPolicy::Allow => {
                warn!(command, %reason, "running dangerous command (policy allows)");
                None
            }
            RiskPolicy::Confirm => {
                if hooks.approve_dangerous(command, assessment) {
                    None
                } else {
                    Some(format!("{reason} (not confirmed)"))
                }
            }
            RiskPolicy::Block => Some(format!("{reason} (blocked by policy)")),
        }
    }

    /// Resolve, create if missing, and move the context into `target`.
    fn change_dir(&mut self, target: &str) -> Result<PathBuf> {
        let dir = resolve(self.context.cwd(), target);
        if dir.exists() && !dir.is_dir() {
            return Err(anyhow!("{} is not a directory", dir.display()));
        }
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("create directory {}", dir.display()))?;
            debug!(dir = %dir.display(), "created missing directory for cd");
        }
        self.context.move_to(dir.clone())?;
        info!(dir = %dir.display(), "changed working directory");
        Ok(dir)
    }

    fn spawn(&self, command: &str) -> Result<()> {
        let request = ShellRequest {
            command: command.to_string(),
            dialect: self.options.dialect,
            workdir: self.context.cwd().to_path_buf(),
            timeout: self.options.step_timeout,
        };
        self.shell
            .run(&request)
            .with_context(|| format!("run `{command}`"))
    }
}

fn failed(index: usize, err: &anyhow::Error) -> StepStatus {
    let error = format!("{err:#}");
    info!(index, %error, "step failed");
    StepStatus::Failed { error }
}
