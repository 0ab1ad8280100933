//! Native tool invocation.
//!
//! Every call into systemctl, launchctl, sc.exe, sudo and friends goes through
//! [`CommandRunner`], so drivers can be exercised against a fake runner.

use std::fmt;
use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::thread;

use crate::error::{Result, ServiceError};

/// Program, arguments and optional stdin of one native invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBuilder {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<Vec<u8>>,
}

impl CommandBuilder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
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

    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Same invocation run through `wrapper` (e.g. `sudo`)
    pub fn wrapped_in(self, wrapper: &str) -> Self {
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(self.program);
        args.extend(self.args);
        Self {
            program: wrapper.to_string(),
            args,
            stdin: self.stdin,
        }
    }
}

impl fmt::Display for CommandBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Exit status plus stdout and stderr merged into one string
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal
    pub status: Option<i32>,
    pub combined: String,
}

impl CommandOutput {
    pub fn new(status: Option<i32>, combined: impl Into<String>) -> Self {
        Self {
            status,
            combined: combined.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    pub fn trimmed(&self) -> &str {
        self.combined.trim()
    }

    /// Describe this (failed) invocation of `cmd` as a `NativeCommand` error
    pub fn failure(&self, cmd: &CommandBuilder) -> ServiceError {
        ServiceError::NativeCommand {
            command: cmd.to_string(),
            status: self.status,
            output: self.trimmed().to_string(),
        }
    }

    /// Turn a non-zero exit into a `NativeCommand` error
    pub fn into_result(self, cmd: &CommandBuilder) -> Result<CommandOutput> {
        if self.success() {
            Ok(self)
        } else {
            Err(self.failure(cmd))
        }
    }
}

/// Capability to run one native command to completion
pub trait CommandRunner: Send + Sync {
    /// Spawn `cmd` and wait. A non-zero exit is *not* an error here; only a
    /// failure to spawn or wait is.
    fn run(&self, cmd: &CommandBuilder) -> Result<CommandOutput>;

    /// Run and require a zero exit status
    fn run_checked(&self, cmd: &CommandBuilder) -> Result<CommandOutput> {
        self.run(cmd)?.into_result(cmd)
    }
}

/// Spawns real processes with `std::process::Command`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &CommandBuilder) -> Result<CommandOutput> {
        log::debug!("exec: {cmd}");
        let spawn_err = |source| ServiceError::Spawn {
            command: cmd.to_string(),
            source,
        };

        let mut child = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(if cmd.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;

        // stdin is fed while output drains; `tee` echoes everything it reads
        let stdin = child.stdin.take();
        let output = thread::scope(|scope| -> io::Result<_> {
            let feeder = match (cmd.stdin.as_deref(), stdin) {
                (Some(input), Some(mut pipe)) => Some(scope.spawn(move || {
                    // dropping `pipe` closes it so the child sees EOF
                    pipe.write_all(input).and_then(|()| pipe.flush())
                })),
                _ => None,
            };
            let output = child.wait_with_output()?;
            match feeder.map(|handle| handle.join()) {
                Some(Ok(Err(e))) if e.kind() != io::ErrorKind::BrokenPipe => Err(e),
                Some(Err(_)) => Err(io::Error::other("stdin writer panicked")),
                _ => Ok(output),
            }
        })
        .map_err(spawn_err)?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        let result = CommandOutput::new(output.status.code(), combined);
        if !result.success() {
            log::debug!("exec failed ({:?}): {cmd}: {}", result.status, result.trimmed());
        }
        Ok(result)
    }
}
