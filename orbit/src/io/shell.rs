//! Running plan commands in the host shell.

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::shell::ShellDialect;

/// Parameters for one shell invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellRequest {
    /// Command line, already normalized for `dialect`.
    pub command: String,
    pub dialect: ShellDialect,
    /// Working directory for the child.
    pub workdir: PathBuf,
    /// Kill the child after this long. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

/// Abstraction over command execution so the engine can run without
/// spawning processes in tests.
pub trait ShellRunner {
    /// Run to completion. Errors on spawn failure, non-zero exit or timeout.
    fn run(&self, request: &ShellRequest) -> Result<()>;
}

/// Runs commands through the dialect's shell with inherited stdio, so output
/// streams to the terminal live.
pub struct HostShell;

impl ShellRunner for HostShell {
    #[instrument(skip_all, fields(workdir = %request.workdir.display()))]
    fn run(&self, request: &ShellRequest) -> Result<()> {
        let mut cmd = shell_command(request.dialect, &request.command, &request.workdir);
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        debug!(command = %request.command, "spawning shell");
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(err = %e, "failed to spawn shell");
                return Err(e).context(format!("spawn {}", request.dialect.program().0));
            }
        };

        let status = match request.timeout {
            None => child.wait().context("wait for command")?,
            Some(timeout) => match child.wait_timeout(timeout).context("wait for command")? {
                Some(status) => status,
                None => {
                    warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
                    child.kill().context("kill command")?;
                    child.wait().context("wait command after kill")?;
                    return Err(anyhow!("timed out after {}s", timeout.as_secs()));
                }
            },
        };

        check_status(status)
    }
}

/// Build the `Command` that runs `command` through the dialect's shell.
pub fn shell_command(dialect: ShellDialect, command: &str, workdir: &Path) -> Command {
    let (program, args) = dialect.program();
    let mut cmd = Command::new(program);
    cmd.args(args).arg(command).current_dir(workdir);
    cmd
}

fn check_status(status: ExitStatus) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    debug!(exit_code = ?status.code(), "command failed");
    match status.code() {
        Some(code) => Err(anyhow!("exited with status {code}")),
        None => Err(anyhow!("terminated by signal")),
    }
}
