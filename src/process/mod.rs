//! External process execution
//!
//! Every probe and remediation step in the warden shells out to a CLI
//! (the container runtime, the resolver service manager, `curl`, the
//! dependent application's management commands). This module is the one
//! place that touches `tokio::process`; everything else goes through the
//! [`ProcessRunner`] trait so tests can substitute a scripted runner.

mod catalog;

pub use catalog::{CommandCatalog, HostOs, Operation, PullVariant};

use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// A single external command: program, arguments and extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Prefix with non-interactive `sudo`.
    pub fn privileged(self) -> Self {
        let mut args = Vec::with_capacity(self.args.len() + 2);
        args.push("-n".to_string());
        args.push(self.program);
        args.extend(self.args);
        Self {
            program: "sudo".to_string(),
            args,
            env: self.env,
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in &self.env {
            write!(f, "{k}={v} ")?;
        }
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// A successful exit with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A non-zero exit with the given stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

impl From<std::process::Output> for CommandOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            code: output.status.code(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}

/// Process execution errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to spawn `{command}`: {message}")]
    Spawn { command: String, message: String },
    #[error("`{command}` timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },
    #[error("`{command}` exited with status {}: {}", describe_code(.code), .stderr.trim())]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("no command available for {0} on this host")]
    Unsupported(String),
}

fn describe_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

impl ProcessError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Executes external commands with a timeout.
///
/// Implementations report a non-zero exit as `Ok` with `success == false`;
/// `Err` is reserved for spawn failures and timeouts.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec, timeout: Duration) -> Result<CommandOutput, ProcessError>;
}

/// Real runner backed by `tokio::process`.
///
/// The child is killed when the timeout elapses.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessRunner;

impl SystemProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(&self, spec: &CommandSpec, timeout: Duration) -> Result<CommandOutput, ProcessError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (k, v) in &spec.env {
            cmd.env(k, v);
        }

        let child = cmd.spawn().map_err(|e| ProcessError::Spawn {
            command: spec.to_string(),
            message: e.to_string(),
        })?;

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let output = CommandOutput::from(output);
                debug!(command = %spec, code = ?output.code, "Command finished");
                Ok(output)
            }
            Ok(Err(e)) => Err(ProcessError::Spawn {
                command: spec.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(ProcessError::Timeout {
                command: spec.to_string(),
                timeout,
            }),
        }
    }
}

/// Run a command and turn a non-zero exit into [`ProcessError::Failed`].
pub async fn run_checked(
    runner: &dyn ProcessRunner,
    spec: &CommandSpec,
    timeout: Duration,
) -> Result<CommandOutput, ProcessError> {
    let output = runner.run(spec, timeout).await?;
    if output.success {
        Ok(output)
    } else {
        Err(ProcessError::Failed {
            command: spec.to_string(),
            code: output.code,
            stderr: if output.stderr.trim().is_empty() {
                output.stdout
            } else {
                output.stderr
            },
        })
    }
}

/// Try each command in order and return the first that succeeds.
///
/// Yields the index of the winning command with its output, or the last
/// error when every command failed.
pub async fn run_first_success(
    runner: &dyn ProcessRunner,
    chain: &[CommandSpec],
    timeout: Duration,
) -> Result<(usize, CommandOutput), ProcessError> {
    let mut last_error = None;
    for (index, spec) in chain.iter().enumerate() {
        match run_checked(runner, spec, timeout).await {
            Ok(output) => return Ok((index, output)),
            Err(e) => {
                debug!(command = %spec, error = %e, "Fallback command failed");
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| ProcessError::Unsupported("empty command chain".to_string())))
}
