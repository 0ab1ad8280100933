//! Shared fixtures: a scripted command runner and a sandboxed home/system tree.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use taskrunner::config::ServiceIdentity;
use taskrunner::control::DriverContext;
use taskrunner::install::{ExecutableSource, Privilege};
use taskrunner::paths::{ServicePaths, SystemRoots};
use taskrunner::process::{CommandBuilder, CommandOutput, CommandRunner};
use tempfile::TempDir;

pub const OWNER: &str = "ada";
pub const UID: u32 = 501;
pub const FAKE_BINARY: &[u8] = b"\x7fELF fake taskrunner binary";

/// Records every invocation and answers from scripted rules.
///
/// A rule matches when the rendered command line starts with its prefix; the
/// most recently added matching rule wins. Unmatched commands succeed silently.
#[derive(Default)]
pub struct FakeRunner {
    calls: Mutex<Vec<CommandBuilder>>,
    rules: Mutex<Vec<(String, CommandOutput)>>,
}

impl FakeRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, prefix: &str, status: i32, output: &str) {
        self.rules
            .lock()
            .unwrap()
            .push((prefix.to_string(), CommandOutput::new(Some(status), output)));
    }

    pub fn invocations(&self) -> Vec<CommandBuilder> {
        self.calls.lock().unwrap().clone()
    }

    /// Rendered command lines, in order
    pub fn calls(&self) -> Vec<String> {
        self.invocations().iter().map(ToString::to_string).collect()
    }

    pub fn called(&self, line: &str) -> bool {
        self.calls().iter().any(|c| c == line)
    }

    pub fn called_prefix(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, cmd: &CommandBuilder) -> taskrunner::Result<CommandOutput> {
        self.calls.lock().unwrap().push(cmd.clone());
        let line = cmd.to_string();
        let rules = self.rules.lock().unwrap();
        Ok(rules
            .iter()
            .rev()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| CommandOutput::new(Some(0), "")))
    }
}

/// Temporary home directory, system roots and a fake executable
pub struct Sandbox {
    dir: TempDir,
    pub runner: Arc<FakeRunner>,
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("home")).unwrap();
        std::fs::create_dir_all(dir.path().join("build")).unwrap();
        std::fs::write(dir.path().join("build/taskrunner-bin"), FAKE_BINARY).unwrap();
        Self {
            dir,
            runner: FakeRunner::new(),
        }
    }

    pub fn home(&self) -> PathBuf {
        self.dir.path().join("home")
    }

    /// Stand-in for `/`
    pub fn root(&self) -> PathBuf {
        self.dir.path().join("root")
    }

    pub fn exe(&self) -> PathBuf {
        self.dir.path().join("build/taskrunner-bin")
    }

    /// What the drivers see after following symlinks
    pub fn resolved_exe(&self) -> PathBuf {
        std::fs::canonicalize(self.exe()).unwrap()
    }

    pub fn paths(&self) -> ServicePaths {
        ServicePaths::new(
            ServiceIdentity::default(),
            Some(self.home()),
            SystemRoots::under(&self.root()),
        )
    }

    pub fn context(&self, privilege: Privilege) -> DriverContext {
        DriverContext::new(self.paths(), self.runner.clone(), privilege)
            .with_executable(ExecutableSource::Path(self.exe()))
            .with_owning_user(OWNER)
    }

    /// Running as root: system-scope files land directly in the sandbox
    pub fn elevated(&self) -> DriverContext {
        self.context(Privilege::new(true, UID))
    }

    /// Ordinary user: system-scope work is relayed through sudo
    pub fn unprivileged(&self) -> DriverContext {
        self.context(Privilege::new(false, UID))
    }
}

pub fn files_in(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}
