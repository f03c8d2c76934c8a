//! Command execution for rendered plans.
//!
//! Plans are computed purely; this is the only place that touches the operating system's packet
//! scheduler, and only through an [`Executor`].

use std::fmt;
use std::{io, process};

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("empty command provided")]
    Empty,
    #[error("io error running `{command}`")]
    Io {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("`{command}` exited with {status}: {stderr}")]
    NonZero {
        command: String,
        status: process::ExitStatus,
        stderr: String,
    },
}

/// A program and its arguments, held as separate tokens.
///
/// Nothing is re-split at run time, so a program path or argument may contain spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    program: String,
    args: Vec<String>,
}

impl ShellCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Split a command line on whitespace. Only for lines whose tokens never contain any.
    pub fn parse(line: &str) -> Self {
        let mut tokens = line.split_ascii_whitespace().map(str::to_string);
        Self {
            program: tokens.next().unwrap_or_default(),
            args: tokens.collect(),
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

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn is_empty(&self) -> bool {
        self.program.is_empty()
    }
}

/// Single-quote tokens that would not survive a whitespace split.
fn write_token(f: &mut fmt::Formatter<'_>, token: &str) -> fmt::Result {
    if token.is_empty() || token.contains(|c: char| c.is_whitespace() || c == '\'') {
        write!(f, "'{}'", token.replace('\'', r"'\''"))
    } else {
        f.write_str(token)
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_token(f, &self.program)?;
        for arg in &self.args {
            f.write_str(" ")?;
            write_token(f, arg)?;
        }
        Ok(())
    }
}

pub trait Executor {
    fn run(&mut self, cmd: &ShellCommand) -> Result<(), ExecError>;
}

/// Logs and records commands without running them.
#[derive(Debug, Default)]
pub struct DryRun {
    issued: Vec<ShellCommand>,
}

impl DryRun {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issued(&self) -> &[ShellCommand] {
        &self.issued
    }
}

impl Executor for DryRun {
    fn run(&mut self, cmd: &ShellCommand) -> Result<(), ExecError> {
        if cmd.is_empty() {
            return Err(ExecError::Empty);
        }
        tracing::info!("{}", cmd);
        self.issued.push(cmd.clone());
        Ok(())
    }
}

/// Spawns each command and waits for it, optionally through `sudo`.
#[derive(Debug, Default)]
pub struct Shell {
    sudo: bool,
}

impl Shell {
    pub fn new(sudo: bool) -> Self {
        Self { sudo }
    }
}

impl Executor for Shell {
    fn run(&mut self, cmd: &ShellCommand) -> Result<(), ExecError> {
        if cmd.is_empty() {
            return Err(ExecError::Empty);
        }
        let program = cmd.program();
        let mut command = if self.sudo {
            let mut c = process::Command::new("sudo");
            c.arg(program);
            c
        } else {
            process::Command::new(program)
        };
        command
            .args(cmd.arguments())
            .stdout(process::Stdio::piped())
            .stderr(process::Stdio::piped());

        tracing::debug!(command = %cmd, sudo = self.sudo, "running command");

        let output = command
            .spawn()
            .and_then(|child| child.wait_with_output())
            .map_err(|source| ExecError::Io {
                command: cmd.to_string(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            tracing::info!(command = %cmd, "{}", line);
        }

        if !output.status.success() {
            return Err(ExecError::NonZero {
                command: cmd.to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Run `cmds` in order, stopping at the first failure. Returns how many ran.
pub fn run_all(exec: &mut dyn Executor, cmds: &[ShellCommand]) -> Result<usize, ExecError> {
    for (idx, cmd) in cmds.iter().enumerate() {
        exec.run(cmd).inspect_err(|err| {
            tracing::error!(%err, applied = idx, remaining = cmds.len() - idx, "plan application stopped");
        })?;
    }
    Ok(cmds.len())
}

/// Run `cmds` in order, logging and skipping failures. Returns how many succeeded.
pub fn run_ignoring_failures(exec: &mut dyn Executor, cmds: &[ShellCommand]) -> usize {
    cmds.iter()
        .filter(|cmd| match exec.run(cmd) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(%err, "ignoring failed command");
                false
            }
        })
        .count()
}
