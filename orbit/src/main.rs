//! Orbit: turn a natural-language goal into shell and file steps, confirm,
//! then run them in the current directory.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use orbit::core::risk::assess;
use orbit::core::types::ExecutionSummary;
use orbit::engine::{Engine, EngineOptions, ExecutionContext};
use orbit::exit_codes;
use orbit::io::clock::ThreadSleeper;
use orbit::io::config::{DEFAULT_CONFIG_FILE, OrbitConfig, load_config};
use orbit::io::reasoner::GeminiReasoner;
use orbit::io::shell::HostShell;
use orbit::logging;
use orbit::planner::PlanAcquirer;
use orbit::session::{Console, CycleOutcome, Session};
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "orbit",
    version,
    about = "Turn a goal into shell and file steps and run them after confirmation"
)]
struct Cli {
    /// Config file (defaults to `orbit.toml` in the current directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Skip the plan confirmation. Dangerous steps are refused instead of asked about.
    #[arg(short, long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Read goals interactively until `exit` (the default).
    Repl,
    /// Plan and run a single goal.
    Run {
        /// Natural-language goal.
        goal: String,
    },
    /// Print the plan for a goal as JSON without running it.
    Plan {
        /// Natural-language goal.
        goal: String,
    },
    /// Print the risk level of a command line.
    Assess {
        /// Command line to classify.
        command: String,
    },
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("[!] FATAL: {:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    logging::init();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = load_config(&config_path)?;
    debug!(path = %config_path.display(), "config loaded");

    match cli.command.unwrap_or(Command::Repl) {
        Command::Assess { command } => Ok(cmd_assess(&command)),
        Command::Plan { goal } => cmd_plan(&config, &goal),
        Command::Run { goal } => cmd_run(&config, &goal, cli.yes),
        Command::Repl => cmd_repl(&config, cli.yes),
    }
}

fn cmd_assess(command: &str) -> i32 {
    let assessment = assess(command);
    match assessment.reason {
        Some(reason) => println!("{}: {reason}", assessment.level),
        None => println!("{}", assessment.level),
    }
    exit_codes::OK
}

fn cmd_plan(config: &OrbitConfig, goal: &str) -> Result<i32> {
    let planner = build_planner(config)?;
    let acquisition = planner.acquire_with(goal, |notice| {
        eprintln!(
            "[!] Reasoning service overloaded. Retrying in {}s... (attempt {}/{})",
            notice.delay.as_secs(),
            notice.attempt,
            notice.max_retries
        );
    });
    if let Some(error) = acquisition.error {
        eprintln!("[!] Planning failed: {error}");
        return Ok(exit_codes::PLAN_FAILED);
    }
    let json = serde_json::to_string_pretty(&acquisition.plan).context("serialize plan")?;
    println!("{json}");
    Ok(exit_codes::OK)
}

fn cmd_run(config: &OrbitConfig, goal: &str, yes: bool) -> Result<i32> {
    let planner = build_planner(config)?;
    let mut engine = build_engine(config)?;
    let stdin = io::stdin();
    let console = Console::new(stdin.lock(), io::stdout(), yes);
    let outcome = Session::new(&planner, &mut engine, console).run_goal(goal)?;

    Ok(match outcome {
        CycleOutcome::NoPlan { error: Some(_) } => exit_codes::PLAN_FAILED,
        CycleOutcome::NoPlan { error: None } | CycleOutcome::Declined { .. } => exit_codes::OK,
        CycleOutcome::Executed { reports } => {
            if ExecutionSummary::from_reports(&reports).is_clean() {
                exit_codes::OK
            } else {
                exit_codes::STEPS_FAILED
            }
        }
    })
}

fn cmd_repl(config: &OrbitConfig, yes: bool) -> Result<i32> {
    let planner = build_planner(config)?;
    let mut engine = build_engine(config)?;

    let mut stdout = io::stdout();
    writeln!(stdout, "=== ORBIT ===").context("write banner")?;
    writeln!(
        stdout,
        "Working in {} ({}). Type a goal, or `exit` to quit.",
        engine.context().cwd().display(),
        engine.options().dialect
    )
    .context("write banner")?;

    let stdin = io::stdin();
    let console = Console::new(stdin.lock(), stdout, yes);
    let outcome = Session::new(&planner, &mut engine, console).run_loop()?;
    debug!(goals = outcome.goals, clean = outcome.clean_runs, "session ended");
    Ok(exit_codes::OK)
}

/// Credential lookup happens here, before any interaction starts.
fn build_planner(config: &OrbitConfig) -> Result<PlanAcquirer<GeminiReasoner, ThreadSleeper>> {
    let reasoner = GeminiReasoner::from_config(config).context("configure reasoning service")?;
    PlanAcquirer::new(reasoner, ThreadSleeper, config.shell.dialect())
}

fn build_engine(config: &OrbitConfig) -> Result<Engine<HostShell>> {
    let context = ExecutionContext::attached()?;
    Ok(Engine::new(context, HostShell, EngineOptions::from_config(config)))
}
