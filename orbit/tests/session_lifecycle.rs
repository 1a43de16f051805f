//! End-to-end cycle tests: scripted reasoning service → planner → session →
//! engine, executing inside a scratch workspace.
//!
//! Shell steps run through the host shell, so these tests are unix-only.
#![cfg(unix)]

use std::io::Cursor;
use std::time::Duration;

use orbit::core::shell::ShellDialect;
use orbit::core::types::{Action, ExecutionSummary, StepStatus};
use orbit::engine::{Engine, EngineOptions, ExecutionContext};
use orbit::io::config::RiskPolicy;
use orbit::io::shell::HostShell;
use orbit::planner::PlanAcquirer;
use orbit::session::{Console, CycleOutcome, Session};
use orbit::test_support::{RecordingSleeper, ScriptedReasoner, TestWorkspace, overloaded, plan_json};

fn host_engine(workspace: &TestWorkspace) -> Engine<HostShell> {
    Engine::new(
        ExecutionContext::detached(workspace.path()),
        HostShell,
        EngineOptions {
            dialect: ShellDialect::Posix,
            risk_policy: RiskPolicy::Confirm,
            step_timeout: Some(Duration::from_secs(30)),
        },
    )
}

fn run_goal(
    reasoner: ScriptedReasoner,
    engine: &mut Engine<HostShell>,
    answers: &str,
) -> (CycleOutcome, String) {
    let planner = PlanAcquirer::new(reasoner, RecordingSleeper::default(), ShellDialect::Posix)
        .expect("planner");
    let mut output = Vec::new();
    let outcome = {
        let console = Console::new(Cursor::new(answers.as_bytes()), &mut output, false);
        Session::new(&planner, engine, console)
            .run_goal("goal")
            .expect("cycle")
    };
    (outcome, String::from_utf8(output).expect("utf8"))
}

fn reports(outcome: CycleOutcome) -> Vec<orbit::core::types::StepReport> {
    match outcome {
        CycleOutcome::Executed { reports } => reports,
        other => panic!("expected execution, got {other:?}"),
    }
}

#[test]
fn nested_write_from_raw_model_reply() {
    let workspace = TestWorkspace::new().expect("workspace");
    let mut engine = host_engine(&workspace);
    let reasoner = ScriptedReasoner::new(vec![Ok(
        r#"Sure! [{"type":"write","path":"a/b.txt","content":"hi"}]"#.to_string(),
    )]);

    let (outcome, output) = run_goal(reasoner, &mut engine, "y\n");

    let reports = reports(outcome);
    assert_eq!(reports.len(), 1);
    assert_eq!(workspace.read("a/b.txt").expect("read"), "hi");
    assert!(output.contains("Plan ready: 1 steps."));
}

/// Plan sequence:
/// 1. `cd app` into a directory that does not exist yet
/// 2. write `main.py` relative to the new directory
/// 3. `pwd > where.txt` proving later shell steps inherit the cursor
#[test]
fn cd_then_relative_steps_land_in_new_directory() {
    let workspace = TestWorkspace::new().expect("workspace");
    let mut engine = host_engine(&workspace);
    let reasoner = ScriptedReasoner::new(vec![Ok(plan_json(&[
        Action::shell("cd app"),
        Action::write("main.py", "print('hi')"),
        Action::shell("pwd > where.txt"),
    ]))]);

    let (outcome, _) = run_goal(reasoner, &mut engine, "y\n");

    let reports = reports(outcome);
    assert!(reports.iter().all(|report| report.status.is_success()));
    let app = workspace.join("app");
    assert_eq!(engine.context().cwd(), app.as_path());
    assert!(app.join("main.py").is_file());
    let recorded = workspace.read("app/where.txt").expect("read");
    let recorded = std::fs::canonicalize(recorded.trim()).expect("canonical pwd");
    assert_eq!(recorded, std::fs::canonicalize(&app).expect("canonical app"));
}

#[test]
fn failing_step_is_reported_and_plan_continues() {
    let workspace = TestWorkspace::new().expect("workspace");
    let mut engine = host_engine(&workspace);
    let reasoner = ScriptedReasoner::new(vec![Ok(plan_json(&[
        Action::write("one.txt", "1"),
        Action::shell("exit 7"),
        Action::write("three.txt", "3"),
    ]))]);

    let (outcome, output) = run_goal(reasoner, &mut engine, "y\n");

    let reports = reports(outcome);
    match &reports[1].status {
        StepStatus::Failed { error } => assert!(error.contains("status 7"), "{error}"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(workspace.join("three.txt").is_file());
    let summary = ExecutionSummary::from_reports(&reports);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert!(!summary.is_clean());
    assert!(output.contains("[!] Step 2 failed"));
    assert!(output.contains("Done: 2 succeeded, 1 failed, 0 blocked, 0 skipped."));
}

#[test]
fn overloaded_service_recovers_and_plan_runs() {
    let workspace = TestWorkspace::new().expect("workspace");
    let mut engine = host_engine(&workspace);
    let reasoner = ScriptedReasoner::new(vec![
        Err(overloaded(503)),
        Err(overloaded(429)),
        Ok(plan_json(&[Action::write("ok.txt", "ok")])),
    ]);

    let (outcome, output) = run_goal(reasoner, &mut engine, "y\n");

    assert_eq!(reports(outcome).len(), 1);
    assert!(output.contains("Retrying in 2s... (attempt 1/3)"));
    assert!(output.contains("Retrying in 4s... (attempt 2/3)"));
    assert!(workspace.join("ok.txt").is_file());
}

#[test]
fn declined_dangerous_step_never_reaches_the_shell() {
    let workspace = TestWorkspace::new().expect("workspace");
    let mut engine = host_engine(&workspace);
    let reasoner = ScriptedReasoner::new(vec![Ok(plan_json(&[
        Action::shell("rm -rf /tmp/orbit-never-exists && touch ran.txt"),
        Action::write("after.txt", "x"),
    ]))]);

    let (outcome, output) = run_goal(reasoner, &mut engine, "y\nn\n");

    let reports = reports(outcome);
    assert!(matches!(reports[0].status, StepStatus::Blocked { .. }));
    assert!(!workspace.join("ran.txt").exists());
    assert!(workspace.join("after.txt").is_file());
    assert!(output.contains("[DANGER]"));
}
