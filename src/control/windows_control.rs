//! Windows service control using the Service Control Manager (sc.exe)
//!
//! SCM services are machine-wide, so there is no user/system distinction and
//! no descriptor file: the SCM query is the only way to learn whether the
//! service exists.

use log::{debug, info};

use super::{DriverContext, ServiceControl, ServiceStatus};
use crate::error::{BestEffort, Result, ServiceError};
use crate::process::{CommandBuilder, CommandOutput};

/// ERROR_ACCESS_DENIED
const ACCESS_DENIED: u32 = 5;
/// ERROR_SERVICE_ALREADY_RUNNING
const ALREADY_RUNNING: u32 = 1056;
/// ERROR_SERVICE_DOES_NOT_EXIST
const DOES_NOT_EXIST: u32 = 1060;
/// ERROR_SERVICE_NOT_ACTIVE
const NOT_ACTIVE: u32 = 1062;
/// ERROR_SERVICE_EXISTS
const ALREADY_EXISTS: u32 = 1073;

pub struct WindowsControl {
    ctx: DriverContext,
}

impl WindowsControl {
    pub fn new(ctx: DriverContext) -> Self {
        Self { ctx }
    }

    fn name(&self) -> &str {
        &self.ctx.identity().name
    }

    fn sc(args: &[&str]) -> CommandBuilder {
        CommandBuilder::new("sc.exe").args(args.iter().copied())
    }

    /// Run sc.exe without judging the exit status
    fn run_sc(&self, args: &[&str]) -> Result<(CommandBuilder, CommandOutput)> {
        let cmd = Self::sc(args);
        let output = self.ctx.runner().run(&cmd)?;
        Ok((cmd, output))
    }

    fn create_or_update(&self, verb: &str, bin_path: &str) -> Result<(CommandBuilder, CommandOutput)> {
        let identity = self.ctx.identity();
        self.run_sc(&[
            verb,
            self.name(),
            "binPath=",
            bin_path,
            "start=",
            "auto",
            "DisplayName=",
            &identity.display_name,
        ])
    }
}

impl ServiceControl for WindowsControl {
    fn install(&self) -> Result<()> {
        let exe = self.ctx.executable.resolve()?;
        let bin_path = format!("\"{}\" run", exe.display());

        let (cmd, output) = self.create_or_update("create", &bin_path)?;
        if !output.success() {
            if !reports(&output, ALREADY_EXISTS) {
                return Err(classify(&cmd, &output));
            }
            debug!("service {} already exists, reconfiguring", self.name());
            let (cmd, output) = self.create_or_update("config", &bin_path)?;
            if !output.success() {
                return Err(classify(&cmd, &output));
            }
        }

        let description = &self.ctx.identity().description;
        BestEffort::attempt(
            "set service description",
            self.ctx
                .runner()
                .run_checked(&Self::sc(&["description", self.name(), description])),
        )
        .ignore();

        info!("Registered Windows service {} -> {bin_path}", self.name());
        Ok(())
    }

    fn install_system(&self) -> Result<()> {
        self.install()
    }

    fn uninstall(&self) -> Result<()> {
        BestEffort::attempt("stop service", self.stop()).ignore();

        let (cmd, output) = self.run_sc(&["delete", self.name()])?;
        if output.success() || reports(&output, DOES_NOT_EXIST) {
            info!("Deleted Windows service {}", self.name());
            return Ok(());
        }
        Err(classify(&cmd, &output))
    }

    fn start(&self) -> Result<()> {
        let (cmd, output) = self.run_sc(&["start", self.name()])?;
        if output.success() || reports(&output, ALREADY_RUNNING) {
            return Ok(());
        }
        Err(classify(&cmd, &output))
    }

    fn stop(&self) -> Result<()> {
        let (cmd, output) = self.run_sc(&["stop", self.name()])?;
        if output.success() || reports(&output, NOT_ACTIVE) {
            return Ok(());
        }
        Err(classify(&cmd, &output))
    }

    fn status(&self) -> Result<ServiceStatus> {
        let (cmd, output) = self.run_sc(&["query", self.name()])?;
        if !output.success() {
            if reports(&output, DOES_NOT_EXIST) {
                return Ok(ServiceStatus::NotInstalled);
            }
            return Err(classify(&cmd, &output));
        }
        Ok(parse_query(&output.combined))
    }
}

/// Did sc.exe fail with Win32 error `code`? sc.exe exits with the code and
/// also prints it as `FAILED <code>:`.
fn reports(output: &CommandOutput, code: u32) -> bool {
    output.status == i32::try_from(code).ok() || output.combined.contains(&format!("FAILED {code}:"))
}

fn classify(cmd: &CommandBuilder, output: &CommandOutput) -> ServiceError {
    if reports(output, DOES_NOT_EXIST) {
        ServiceError::NotInstalled
    } else if reports(output, ACCESS_DENIED) {
        ServiceError::Permission(format!("{cmd}: {}", output.trimmed()))
    } else {
        output.failure(cmd)
    }
}

fn parse_query(output: &str) -> ServiceStatus {
    if output.contains("RUNNING") {
        ServiceStatus::Running(None)
    } else if output.contains("STOPPED") {
        ServiceStatus::Stopped(None)
    } else {
        ServiceStatus::Unknown
    }
}
