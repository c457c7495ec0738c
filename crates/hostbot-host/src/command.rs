//! External command execution.
//!
//! Every host action is a single CLI invocation. Building the argument list is
//! kept apart from running it so adapters can be exercised with a recording
//! runner instead of a real shell.

use std::{fmt, process::Stdio};

use async_trait::async_trait;
use hostbot_core::{Error, Result};
use tokio::process::Command;
use tracing::debug;

/// Fully-resolved command line, before any `sudo` prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Needs root: gets `sudo` when the runner is configured for it.
    pub privileged: bool,
}

impl Invocation {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            privileged: false,
        }
    }

    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for a in &self.args {
            write!(f, " {a}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion. `Err` only when the process could not be spawned.
    async fn run(&self, inv: &Invocation) -> Result<CommandOutput>;
}

/// Runs invocations as child processes.
#[derive(Clone, Debug)]
pub struct ProcessRunner {
    use_sudo: bool,
}

impl ProcessRunner {
    pub fn new(use_sudo: bool) -> Self {
        Self { use_sudo }
    }

    fn build(&self, inv: &Invocation) -> Command {
        let mut cmd = if inv.privileged && self.use_sudo {
            let mut c = Command::new("sudo");
            // Never wait on a password prompt.
            c.arg("-n").arg(&inv.program);
            c
        } else {
            Command::new(&inv.program)
        };
        cmd.args(&inv.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, inv: &Invocation) -> Result<CommandOutput> {
        debug!(command = %inv, sudo = inv.privileged && self.use_sudo, "running");
        let out = self
            .build(inv)
            .output()
            .await
            .map_err(|e| Error::command(inv.program.clone(), format!("failed to start: {e}")))?;
        Ok(CommandOutput {
            code: out.status.code(),
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        })
    }
}

/// Run and require a zero exit status. Returns stdout.
pub async fn run_checked(runner: &dyn CommandRunner, inv: &Invocation) -> Result<String> {
    let out = runner.run(inv).await?;
    if out.success() {
        return Ok(out.stdout);
    }
    Err(failure(inv, &out))
}

/// Error describing a non-zero exit: stderr when there is any, else the status.
pub fn failure(inv: &Invocation, out: &CommandOutput) -> Error {
    let stderr = out.stderr.trim();
    let detail = match (stderr.is_empty(), out.code) {
        (false, _) => stderr.to_string(),
        (true, Some(code)) => format!("exited with status {code}"),
        (true, None) => "terminated by signal".to_string(),
    };
    Error::command(inv.program.clone(), detail)
}
