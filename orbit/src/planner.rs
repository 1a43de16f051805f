//! Plan acquisition: instruction → reasoning service → parsed plan.
//!
//! Acquisition fails open. Any error that survives the retry schedule yields
//! an empty plan together with the error text, so a failed planning phase
//! never takes down the interactive loop.

use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, instrument};

use crate::core::plan::parse_plan;
use crate::core::retry::{MAX_RETRIES, backoff_delay, classify, should_retry};
use crate::core::shell::ShellDialect;
use crate::core::types::{Plan, RetryClass};
use crate::io::clock::Sleeper;
use crate::io::prompt::PromptEngine;
use crate::io::reasoner::{Reasoner, ServiceError};

/// Result of one acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acquisition {
    /// Parsed plan; empty when nothing to do or when planning failed.
    pub plan: Plan,
    /// Reasoner calls made, including the successful one.
    pub attempts: u32,
    /// Display text of the final error, if planning failed.
    pub error: Option<String>,
}

impl Acquisition {
    fn failed(attempts: u32, error: &anyhow::Error) -> Self {
        Self {
            plan: Vec::new(),
            attempts,
            error: Some(format!("{error:#}")),
        }
    }
}

/// Emitted before sleeping ahead of a retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryNotice {
    /// The attempt that just failed (1-based).
    pub attempt: u32,
    pub max_retries: u32,
    pub delay: Duration,
    pub error: String,
}

/// Turns goals into plans using a [`Reasoner`].
pub struct PlanAcquirer<R, S> {
    reasoner: R,
    sleeper: S,
    prompts: PromptEngine,
    dialect: ShellDialect,
}

impl<R: Reasoner, S: Sleeper> PlanAcquirer<R, S> {
    pub fn new(reasoner: R, sleeper: S, dialect: ShellDialect) -> Result<Self> {
        Ok(Self {
            reasoner,
            sleeper,
            prompts: PromptEngine::new()?,
            dialect,
        })
    }

    pub fn acquire(&self, goal: &str) -> Acquisition {
        self.acquire_with(goal, |_| {})
    }

    /// Acquire a plan, calling `on_retry` before each backoff sleep.
    ///
    /// At most [`MAX_RETRIES`] retries follow the first attempt, and only for
    /// transient (overload / rate-limit) failures.
    #[instrument(skip_all, fields(goal_bytes = goal.len()))]
    pub fn acquire_with<F: FnMut(&RetryNotice)>(&self, goal: &str, mut on_retry: F) -> Acquisition {
        let prompt = match self.prompts.render_planner(goal, self.dialect) {
            Ok(prompt) => prompt,
            Err(err) => return Acquisition::failed(0, &err),
        };

        let mut attempt = 1u32;
        let raw = loop {
            match self.reasoner.generate(&prompt) {
                Ok(raw) => break raw,
                Err(err) => {
                    let class = classify_error(&err);
                    if !should_retry(class, attempt) {
                        info!(attempt, ?class, err = %format!("{err:#}"), "planning failed");
                        return Acquisition::failed(attempt, &err);
                    }

                    let delay = backoff_delay(attempt);
                    info!(
                        attempt,
                        delay_secs = delay.as_secs(),
                        "reasoning service overloaded, retrying"
                    );
                    on_retry(&RetryNotice {
                        attempt,
                        max_retries: MAX_RETRIES,
                        delay,
                        error: format!("{err:#}"),
                    });
                    self.sleeper.sleep(delay);
                    attempt += 1;
                }
            }
        };

        // A reply that does not parse is never retried.
        debug!(response_bytes = raw.len(), "received reasoning response");
        match parse_plan(&raw) {
            Ok(plan) => {
                info!(attempt, steps = plan.len(), "plan acquired");
                Acquisition {
                    plan,
                    attempts: attempt,
                    error: None,
                }
            }
            Err(err) => {
                info!(attempt, err = %format!("{err:#}"), "plan rejected");
                Acquisition::failed(attempt, &err)
            }
        }
    }
}

/// Classify a reasoner failure. Prefer the HTTP status of a [`ServiceError`]
/// anywhere in the chain; fall back to the rendered message.
fn classify_error(err: &anyhow::Error) -> RetryClass {
    let status = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<ServiceError>())
        .and_then(|service| service.status);
    classify(status, &format!("{err:#}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Action;
    use crate::test_support::{RecordingSleeper, ScriptedReasoner, overloaded, plan_json};
    use anyhow::anyhow;

    fn acquirer(
        reasoner: ScriptedReasoner,
    ) -> PlanAcquirer<ScriptedReasoner, RecordingSleeper> {
        PlanAcquirer::new(reasoner, RecordingSleeper::default(), ShellDialect::Posix)
            .expect("acquirer")
    }

    #[test]
    fn success_on_first_attempt_does_not_sleep() {
        let planner = acquirer(ScriptedReasoner::new(vec![Ok(plan_json(&[Action::shell(
            "ls",
        )]))]));
        let got = planner.acquire("list files");
        assert_eq!(got.plan, vec![Action::shell("ls")]);
        assert_eq!(got.attempts, 1);
        assert_eq!(got.error, None);
        assert!(planner.sleeper.delays().is_empty());
    }

    #[test]
    fn prompt_carries_goal() {
        let planner = acquirer(ScriptedReasoner::new(vec![Ok("[]".to_string())]));
        planner.acquire("make a flask app");
        let prompts = planner.reasoner.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("\"make a flask app\""));
    }

    #[test]
    fn overload_then_success_retries_once_after_two_seconds() {
        let planner = acquirer(ScriptedReasoner::new(vec![
            Err(overloaded(503)),
            Ok(plan_json(&[Action::write("a.txt", "hi")])),
        ]));
        let mut notices = Vec::new();
        let got = planner.acquire_with("goal", |notice| notices.push(notice.clone()));

        assert_eq!(got.plan, vec![Action::write("a.txt", "hi")]);
        assert_eq!(got.attempts, 2);
        assert_eq!(planner.sleeper.delays(), vec![Duration::from_secs(2)]);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].attempt, 1);
        assert!(notices[0].error.contains("503"));
    }

    #[test]
    fn persistent_rate_limit_gives_up_after_three_retries() {
        let planner = acquirer(ScriptedReasoner::new(vec![
            Err(overloaded(429)),
            Err(overloaded(429)),
            Err(overloaded(429)),
            Err(overloaded(429)),
            Ok("[]".to_string()),
        ]));
        let got = planner.acquire("goal");

        assert!(got.plan.is_empty());
        assert_eq!(got.attempts, 4);
        assert_eq!(planner.reasoner.calls(), 4);
        assert_eq!(
            planner.sleeper.delays(),
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8)
            ]
        );
        assert!(got.error.expect("error").contains("429"));
    }

    #[test]
    fn status_in_message_text_is_transient() {
        let planner = acquirer(ScriptedReasoner::new(vec![
            Err(anyhow!("GoogleGenerativeAI Error: [503 Service Unavailable]")),
            Ok("[]".to_string()),
        ]));
        let got = planner.acquire("goal");
        assert_eq!(got.attempts, 2);
        assert_eq!(got.error, None);
    }

    #[test]
    fn permanent_error_fails_immediately() {
        let planner = acquirer(ScriptedReasoner::new(vec![Err(
            ServiceError::new(Some(400), "API key not valid").into(),
        )]));
        let got = planner.acquire("goal");
        assert!(got.plan.is_empty());
        assert_eq!(got.attempts, 1);
        assert!(planner.sleeper.delays().is_empty());
        assert!(got.error.expect("error").contains("API key not valid"));
    }

    #[test]
    fn unparseable_response_fails_open() {
        let planner = acquirer(ScriptedReasoner::new(vec![Ok(
            "Sorry, I can't do that.".to_string()
        )]));
        let got = planner.acquire("goal");
        assert!(got.plan.is_empty());
        assert_eq!(got.attempts, 1);
        assert!(got.error.expect("error").contains("no JSON plan detected"));
    }

    #[test]
    fn malformed_plan_is_not_retried_even_when_error_mentions_a_status() {
        // serde_json reports this one at "line 1 column 503".
        let reply = format!("[{}x]", " ".repeat(501));
        let planner = acquirer(ScriptedReasoner::new(vec![
            Ok(reply.clone()),
            Ok(reply.clone()),
            Ok(reply.clone()),
            Ok(reply),
        ]));
        let got = planner.acquire("goal");

        assert!(got.plan.is_empty());
        assert_eq!(got.attempts, 1);
        assert_eq!(planner.reasoner.calls(), 1);
        assert!(planner.sleeper.delays().is_empty());
        assert!(got.error.expect("error").contains("column 503"));
    }

    #[test]
    fn fenced_response_is_accepted() {
        let planner = acquirer(ScriptedReasoner::new(vec![Ok(
            "```json\n[{\"type\":\"shell\",\"command\":\"git init\"}]\n```".to_string(),
        )]));
        let got = planner.acquire("goal");
        assert_eq!(got.plan, vec![Action::shell("git init")]);
    }
}
