//! Test-only scripted collaborators for the planner, engine and session.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::core::types::{Action, RiskAssessment, RiskLevel, StepReport};
use crate::engine::StepHooks;
use crate::io::clock::Sleeper;
use crate::io::reasoner::{Reasoner, ServiceError};
use crate::io::shell::{ShellRequest, ShellRunner};

/// Serialize `actions` the way the reasoning service returns them.
pub fn plan_json(actions: &[Action]) -> String {
    serde_json::to_string(actions).unwrap_or_else(|_| "[]".to_string())
}

/// Overload error as the HTTP backend reports it.
pub fn overloaded(status: u16) -> anyhow::Error {
    ServiceError::new(Some(status), "The model is overloaded. Please try again later.").into()
}

/// Reasoner that replays a queue of responses and records every prompt.
pub struct ScriptedReasoner {
    responses: RefCell<VecDeque<Result<String>>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedReasoner {
    pub fn new(responses: Vec<Result<String>>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.borrow().len()
    }
}

impl Reasoner for ScriptedReasoner {
    fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("scripted reasoner exhausted")))
    }
}

/// Sleeper that records requested delays instead of waiting.
#[derive(Default)]
pub struct RecordingSleeper {
    delays: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.delays.borrow_mut().push(duration);
    }
}

/// Shell runner that replays scripted outcomes and records requests.
///
/// Once the script is exhausted every further command succeeds.
pub struct ScriptedShell {
    outcomes: RefCell<VecDeque<Result<()>>>,
    requests: RefCell<Vec<ShellRequest>>,
}

impl ScriptedShell {
    pub fn new(outcomes: Vec<Result<()>>) -> Self {
        Self {
            outcomes: RefCell::new(outcomes.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(Vec::new())
    }

    pub fn requests(&self) -> Vec<ShellRequest> {
        self.requests.borrow().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.requests
            .borrow()
            .iter()
            .map(|request| request.command.clone())
            .collect()
    }
}

impl ShellRunner for ScriptedShell {
    fn run(&self, request: &ShellRequest) -> Result<()> {
        self.requests.borrow_mut().push(request.clone());
        self.outcomes.borrow_mut().pop_front().unwrap_or(Ok(()))
    }
}

/// Hooks that record what the engine reported and answer approvals with a
/// fixed decision.
pub struct RecordingHooks {
    approve: bool,
    pub started: Vec<(usize, Option<RiskLevel>)>,
    pub approvals_requested: Vec<String>,
    pub finished: Vec<StepReport>,
}

impl RecordingHooks {
    pub fn approving() -> Self {
        Self::with_decision(true)
    }

    pub fn refusing() -> Self {
        Self::with_decision(false)
    }

    fn with_decision(approve: bool) -> Self {
        Self {
            approve,
            started: Vec::new(),
            approvals_requested: Vec::new(),
            finished: Vec::new(),
        }
    }
}

impl StepHooks for RecordingHooks {
    fn on_step_start(
        &mut self,
        index: usize,
        _action: &Action,
        assessment: Option<&RiskAssessment>,
    ) {
        self.started
            .push((index, assessment.map(|assessment| assessment.level)));
    }

    fn approve_dangerous(&mut self, command: &str, _assessment: &RiskAssessment) -> bool {
        self.approvals_requested.push(command.to_string());
        self.approve
    }

    fn on_step_finished(&mut self, report: &StepReport) {
        self.finished.push(report.clone());
    }
}

/// Scratch directory that plans execute in.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp workspace")?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn read(&self, relative: impl AsRef<Path>) -> Result<String> {
        let path = self.join(relative);
        std::fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }
}
