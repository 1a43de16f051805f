//! Interactive goal loop: read goal → acquire plan → confirm → execute.
//!
//! The session owns no state beyond its console; the working directory lives
//! in the engine's context, so consecutive goals continue where the previous
//! plan left off.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::core::risk::{assess_worst, needs_attention};
use crate::core::types::{Action, ExecutionSummary, RiskAssessment, StepReport, StepStatus};
use crate::engine::{Engine, StepHooks};
use crate::io::clock::Sleeper;
use crate::io::reasoner::Reasoner;
use crate::io::shell::ShellRunner;
use crate::planner::{PlanAcquirer, RetryNotice};

const PROMPT: &str = "\norbit > ";

/// Outcome of one acquire → confirm → execute cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Planning produced nothing to run; `error` is set when planning failed.
    NoPlan { error: Option<String> },
    /// The user did not confirm; nothing ran.
    Declined { steps: usize },
    /// The plan ran; one report per step.
    Executed { reports: Vec<StepReport> },
}

/// Summary of an interactive loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopOutcome {
    /// Goals submitted (blank lines and `exit` excluded).
    pub goals: u32,
    /// Goals whose plan ran with every step clean.
    pub clean_runs: u32,
}

/// True for the affirmative answer to a yes/no question.
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

/// Line-oriented terminal: reads answers, writes status lines.
pub struct Console<'a> {
    input: Box<dyn BufRead + 'a>,
    output: Box<dyn Write + 'a>,
    /// Skip the plan confirmation. Dangerous steps are then refused rather
    /// than asked about.
    non_interactive: bool,
}

impl<'a> Console<'a> {
    pub fn new(input: impl BufRead + 'a, output: impl Write + 'a, non_interactive: bool) -> Self {
        Self {
            input: Box::new(input),
            output: Box::new(output),
            non_interactive,
        }
    }

    /// Write `question` and read one line. `None` on end of input.
    fn ask(&mut self, question: &str) -> Result<Option<String>> {
        write!(self.output, "{question}").context("write prompt")?;
        self.output.flush().context("flush prompt")?;
        let mut line = String::new();
        let read = self.input.read_line(&mut line).context("read input")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn say(&mut self, line: impl AsRef<str>) -> Result<()> {
        writeln!(self.output, "{}", line.as_ref()).context("write output")
    }

    /// Status line from inside engine hooks, which cannot propagate errors.
    fn note(&mut self, line: impl AsRef<str>) {
        if let Err(err) = self.say(line) {
            debug!(err = %err, "failed to write status line");
        }
    }
}

impl StepHooks for Console<'_> {
    fn on_step_start(
        &mut self,
        index: usize,
        action: &Action,
        assessment: Option<&RiskAssessment>,
    ) {
        match action {
            Action::Shell { command } => {
                self.note(format!("  [EXEC {index}] > {command}"));
                if let Some(assessment) = assessment
                    && needs_attention(assessment.level)
                {
                    let reason = assessment.reason.as_deref().unwrap_or("");
                    self.note(format!("    [{}] {reason}", assessment.level));
                }
            }
            Action::Write { path, .. } => self.note(format!("  [FILE {index}] {path}")),
            Action::Unrecognized { .. } => {}
        }
    }

    fn approve_dangerous(&mut self, command: &str, assessment: &RiskAssessment) -> bool {
        let reason = assessment.reason.as_deref().unwrap_or("dangerous command");
        if self.non_interactive {
            self.note(format!(
                "    [DANGER] {reason}; refusing without interactive confirmation"
            ));
            return false;
        }
        match self.ask(&format!("    [DANGER] {reason}\n    Run `{command}` anyway? (y/n): ")) {
            Ok(Some(answer)) => is_affirmative(&answer),
            Ok(None) => false,
            Err(err) => {
                debug!(err = %err, "failed to read dangerous-step confirmation");
                false
            }
        }
    }

    fn on_step_finished(&mut self, report: &StepReport) {
        let index = report.index;
        match &report.status {
            StepStatus::Written { path } => self.note(format!("    written: {}", path.display())),
            StepStatus::ChangedDir { path } => self.note(format!("    now in: {}", path.display())),
            StepStatus::Ran => {}
            StepStatus::Failed { error } => {
                self.note(format!("  [!] Step {index} failed: {error}"));
            }
            StepStatus::Blocked { reason } => {
                self.note(format!("  [BLOCKED] Step {index}: {reason}"));
            }
            StepStatus::Ignored => self.note(format!(
                "  [SKIP] Step {index}: {}",
                report.action.describe()
            )),
        }
    }
}

/// One user at one terminal driving the planner and the engine.
pub struct Session<'a, R, S, Sh> {
    planner: &'a PlanAcquirer<R, S>,
    engine: &'a mut Engine<Sh>,
    console: Console<'a>,
}

impl<'a, R: Reasoner, S: Sleeper, Sh: ShellRunner> Session<'a, R, S, Sh> {
    pub fn new(
        planner: &'a PlanAcquirer<R, S>,
        engine: &'a mut Engine<Sh>,
        console: Console<'a>,
    ) -> Self {
        Self {
            planner,
            engine,
            console,
        }
    }

    /// Read goals until `exit` or end of input.
    pub fn run_loop(&mut self) -> Result<LoopOutcome> {
        let mut outcome = LoopOutcome::default();
        loop {
            let Some(line) = self.console.ask(PROMPT)? else {
                debug!("input closed");
                break;
            };
            let goal = line.trim();
            if goal.eq_ignore_ascii_case("exit") {
                break;
            }
            if goal.is_empty() {
                continue;
            }

            outcome.goals += 1;
            if let CycleOutcome::Executed { reports } = self.run_goal(goal)?
                && ExecutionSummary::from_reports(&reports).is_clean()
            {
                outcome.clean_runs += 1;
            }
        }
        Ok(outcome)
    }

    /// Run one acquire → confirm → execute cycle for `goal`.
    #[instrument(skip_all)]
    pub fn run_goal(&mut self, goal: &str) -> Result<CycleOutcome> {
        let console = &mut self.console;
        let acquisition = self.planner.acquire_with(goal, |notice| {
            console.note(retry_line(notice));
        });

        if let Some(error) = acquisition.error {
            self.console.say(format!("\n[!] Planning failed: {error}"))?;
            return Ok(CycleOutcome::NoPlan { error: Some(error) });
        }
        let plan = acquisition.plan;
        if plan.is_empty() {
            self.console.say("\nNothing to do.")?;
            return Ok(CycleOutcome::NoPlan { error: None });
        }

        self.preview(&plan)?;
        if !self.confirm()? {
            info!(steps = plan.len(), "plan declined");
            self.console.say("Plan discarded.")?;
            return Ok(CycleOutcome::Declined { steps: plan.len() });
        }

        let reports = self.engine.execute(&plan, &mut self.console);
        let summary = ExecutionSummary::from_reports(&reports);
        self.console.say(format!(
            "\nDone: {} succeeded, {} failed, {} blocked, {} skipped.",
            summary.succeeded, summary.failed, summary.blocked, summary.ignored
        ))?;
        Ok(CycleOutcome::Executed { reports })
    }

    fn preview(&mut self, plan: &[Action]) -> Result<()> {
        let dialect = self.engine.options().dialect;
        self.console
            .say(format!("\nPlan ready: {} steps.", plan.len()))?;
        for (offset, action) in plan.iter().enumerate() {
            let mut line = format!("  {}. {}", offset + 1, action.describe());
            if let Action::Shell { command } = action {
                let normalized = dialect.normalize(command);
                let assessment = assess_worst([command.as_str(), normalized.as_str()]);
                if needs_attention(assessment.level) {
                    line.push_str(&format!("  [{}]", assessment.level));
                }
            }
            self.console.say(line)?;
        }
        Ok(())
    }

    fn confirm(&mut self) -> Result<bool> {
        if self.console.non_interactive {
            return Ok(true);
        }
        let answer = self.console.ask("Deploy plan? (y/n): ")?;
        Ok(answer.as_deref().is_some_and(is_affirmative))
    }
}

fn retry_line(notice: &RetryNotice) -> String {
    format!(
        "\n[!] Reasoning service overloaded. Retrying in {}s... (attempt {}/{})",
        notice.delay.as_secs(),
        notice.attempt,
        notice.max_retries
    )
}
