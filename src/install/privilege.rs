//! Privilege escalation for system-scope operations.
//!
//! When the process is already elevated, commands and file operations run
//! directly. Otherwise each one is relayed through `sudo`, which prompts on
//! the controlling terminal if it needs a password.

use std::path::{Path, PathBuf};

use crate::error::{Result, ServiceError};
use crate::install::file_ops;
use crate::process::{CommandBuilder, CommandOutput, CommandRunner};

const SUDO: &str = "sudo";

/// Elevation facts about the current process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Privilege {
    elevated: bool,
    uid: u32,
    /// Program used to elevate, `None` if none is available
    escalation: Option<String>,
}

impl Privilege {
    /// Inspect the running process
    pub fn detect() -> Self {
        #[cfg(unix)]
        let (elevated, uid, escalation) = (
            nix::unistd::geteuid().is_root(),
            nix::unistd::getuid().as_raw(),
            which::which(SUDO).ok().map(|_| SUDO.to_string()),
        );
        #[cfg(not(unix))]
        let (elevated, uid, escalation) = (false, 0, None);

        Self {
            elevated,
            uid,
            escalation,
        }
    }

    /// Fixed facts, escalating through `sudo`
    pub fn new(elevated: bool, uid: u32) -> Self {
        Self {
            elevated,
            uid,
            escalation: Some(SUDO.to_string()),
        }
    }

    pub fn without_escalation(mut self) -> Self {
        self.escalation = None;
        self
    }

    pub fn is_elevated(&self) -> bool {
        self.elevated
    }

    /// Real user id, used for the launchd `gui/<uid>` domain
    pub fn uid(&self) -> u32 {
        self.uid
    }

    /// Run `cmd` with elevated privilege, requiring success
    pub fn run(&self, runner: &dyn CommandRunner, cmd: CommandBuilder) -> Result<CommandOutput> {
        if self.elevated {
            return runner.run_checked(&cmd);
        }

        let wrapper = self.escalation.as_deref().ok_or_else(|| {
            ServiceError::Permission(format!(
                "`{cmd}` requires administrator privileges and no elevation program was found"
            ))
        })?;

        let wrapped = cmd.wrapped_in(wrapper);
        let output = runner.run(&wrapped)?;
        if !output.success() && is_elevation_refusal(&output.combined) {
            return Err(ServiceError::Permission(format!(
                "{wrapped}: {}",
                output.trimmed()
            )));
        }
        output.into_result(&wrapped)
    }

    /// Write `content` to a protected `path` with `mode`
    pub fn write_file(
        &self,
        runner: &dyn CommandRunner,
        path: &Path,
        content: &[u8],
        mode: u32,
    ) -> Result<()> {
        if self.elevated {
            file_ops::ensure_parent(path)?;
            return file_ops::write_file_atomic(path, content, mode);
        }

        let target = path_arg(path);
        self.run(
            runner,
            CommandBuilder::new("tee").arg(&target).stdin(content.to_vec()),
        )?;
        self.run(
            runner,
            CommandBuilder::new("chmod").args([format!("{mode:o}"), target]),
        )?;
        Ok(())
    }

    /// Copy an executable into a protected location
    pub fn copy_executable(&self, runner: &dyn CommandRunner, src: &Path, dst: &Path) -> Result<()> {
        if self.elevated {
            file_ops::ensure_parent(dst)?;
            return file_ops::copy_executable(src, dst);
        }

        let dst_arg = path_arg(dst);
        if let Some(parent) = dst.parent() {
            self.create_dir_all(runner, parent)?;
        }
        self.run(runner, CommandBuilder::new("rm").args(["-f", dst_arg.as_str()]))?;
        self.run(runner, CommandBuilder::new("cp").args([path_arg(src), dst_arg.clone()]))?;
        self.run(runner, CommandBuilder::new("chmod").args(["755", dst_arg.as_str()]))?;
        Ok(())
    }

    /// Remove a protected file; a missing file is not an error
    pub fn remove_file(&self, runner: &dyn CommandRunner, path: &Path) -> Result<()> {
        if self.elevated {
            return crate::error::remove_if_exists(path).map(|_| ());
        }
        self.run(runner, CommandBuilder::new("rm").args(["-f".to_string(), path_arg(path)]))
            .map(|_| ())
    }

    pub fn create_dir_all(&self, runner: &dyn CommandRunner, dir: &Path) -> Result<()> {
        if self.elevated {
            return file_ops::create_dir_all(dir);
        }
        self.run(runner, CommandBuilder::new("mkdir").args(["-p".to_string(), path_arg(dir)]))
            .map(|_| ())
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

/// Did sudo refuse to elevate (as opposed to the wrapped command failing)?
fn is_elevation_refusal(output: &str) -> bool {
    let lower = output.to_lowercase();
    [
        "a password is required",
        "incorrect password",
        "not in the sudoers",
        "is not allowed to run sudo",
        "a terminal is required",
        "no tty present",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}

/// The non-root account a system service should run as.
///
/// Under sudo this is the invoking user, otherwise the login user.
pub fn owning_user() -> Result<String> {
    owning_user_from(|key| std::env::var(key).ok())
}

pub(crate) fn owning_user_from(lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
    ["SUDO_USER", "USER", "LOGNAME"]
        .into_iter()
        .filter_map(|key| lookup(key))
        .find(|user| !user.trim().is_empty())
        .ok_or_else(|| ServiceError::Resolution("failed to determine current user".to_string()))
}

/// Home directory of `user` by Linux convention
pub fn conventional_home(user: &str) -> PathBuf {
    if user == "root" {
        PathBuf::from("/root")
    } else {
        Path::new("/home").join(user)
    }
}
