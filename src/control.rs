//! Service lifecycle control - delegates to OS-native service managers
//!
//! Provides a unified interface for managing the service across operating systems:
//! - macOS: launchd (launchctl)
//! - Linux: systemd (systemctl)
//! - Windows: Service Control Manager (sc.exe)
//!
//! Every driver is compiled on every target so it can be exercised against a
//! fake [`CommandRunner`]; only the selection in [`ServiceManager::for_current_os`]
//! depends on the host.

pub mod linux_control;
pub mod macos_control;
pub mod windows_control;

use std::fmt;
use std::sync::Arc;

use log::info;
use serde::Serialize;

use crate::config::ServiceIdentity;
use crate::error::{Result, ServiceError};
use crate::install::{ExecutableSource, Privilege, privilege};
use crate::paths::{Scope, ServicePaths};
use crate::process::{CommandRunner, SystemRunner};

pub use linux_control::LinuxControl;
pub use macos_control::MacosControl;
pub use windows_control::WindowsControl;

/// Lifecycle contract every native driver implements
pub trait ServiceControl: Send + Sync {
    /// Register the service for the invoking user. Never starts it.
    fn install(&self) -> Result<()>;

    /// Register the service machine-wide, running as the invoking user
    fn install_system(&self) -> Result<()>;

    /// Remove every installed scope, reporting each one's outcome
    fn uninstall(&self) -> Result<()>;

    fn start(&self) -> Result<()>;

    /// Stopping an already stopped service succeeds
    fn stop(&self) -> Result<()>;

    fn status(&self) -> Result<ServiceStatus>;
}

/// Observed state of the service, as reported to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    NotInstalled,
    /// Descriptor present but the supervisor has not loaded it
    NotLoaded(Scope),
    /// Scope is `None` where the manager has no scopes (Windows)
    Running(Option<Scope>),
    Stopped(Option<Scope>),
    Unknown,
    Unsupported,
}

impl ServiceStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ServiceStatus::Running(_))
    }

    pub fn scope(&self) -> Option<Scope> {
        match self {
            ServiceStatus::NotLoaded(scope) => Some(*scope),
            ServiceStatus::Running(scope) | ServiceStatus::Stopped(scope) => *scope,
            _ => None,
        }
    }

    fn state(&self) -> &'static str {
        match self {
            ServiceStatus::NotInstalled => "not_installed",
            ServiceStatus::NotLoaded(_) => "not_loaded",
            ServiceStatus::Running(_) => "running",
            ServiceStatus::Stopped(_) => "stopped",
            ServiceStatus::Unknown => "unknown",
            ServiceStatus::Unsupported => "unsupported",
        }
    }

    /// Machine-readable form for `status --json`
    pub fn report(&self) -> StatusReport {
        StatusReport {
            state: self.state(),
            scope: self.scope(),
            message: self.to_string(),
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceStatus::NotInstalled => f.write_str("Not installed"),
            ServiceStatus::NotLoaded(_) => f.write_str("Installed (not loaded)"),
            ServiceStatus::Running(Some(scope)) => write!(f, "Running ({scope})"),
            ServiceStatus::Running(None) => f.write_str("Running"),
            ServiceStatus::Stopped(Some(scope)) => write!(f, "Stopped ({scope})"),
            ServiceStatus::Stopped(None) => f.write_str("Stopped"),
            ServiceStatus::Unknown => f.write_str("Unknown"),
            ServiceStatus::Unsupported => f.write_str("Unsupported OS"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub state: &'static str,
    pub scope: Option<Scope>,
    pub message: String,
}

/// Everything a driver needs from its environment
#[derive(Clone)]
pub struct DriverContext {
    pub paths: ServicePaths,
    pub runner: Arc<dyn CommandRunner>,
    pub privilege: Privilege,
    pub executable: ExecutableSource,
    owning_user: Option<String>,
}

impl DriverContext {
    /// Real paths, real processes, facts about the running process
    pub fn detect(identity: ServiceIdentity) -> Self {
        Self::new(
            ServicePaths::detect(identity),
            Arc::new(SystemRunner),
            Privilege::detect(),
        )
    }

    pub fn new(paths: ServicePaths, runner: Arc<dyn CommandRunner>, privilege: Privilege) -> Self {
        Self {
            paths,
            runner,
            privilege,
            executable: ExecutableSource::Current,
            owning_user: None,
        }
    }

    pub fn with_executable(mut self, executable: ExecutableSource) -> Self {
        self.executable = executable;
        self
    }

    /// Fix the account system-scope installs run as instead of reading the environment
    pub fn with_owning_user(mut self, user: impl Into<String>) -> Self {
        self.owning_user = Some(user.into());
        self
    }

    pub fn identity(&self) -> &ServiceIdentity {
        self.paths.identity()
    }

    pub(crate) fn owning_user(&self) -> Result<String> {
        match &self.owning_user {
            Some(user) => Ok(user.clone()),
            None => privilege::owning_user(),
        }
    }

    pub(crate) fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }
}

/// Driver for hosts without a supported service manager
#[derive(Debug, Default, Clone, Copy)]
pub struct Unsupported;

impl ServiceControl for Unsupported {
    fn install(&self) -> Result<()> {
        Ok(())
    }

    fn install_system(&self) -> Result<()> {
        Ok(())
    }

    fn uninstall(&self) -> Result<()> {
        Ok(())
    }

    fn start(&self) -> Result<()> {
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        Ok(())
    }

    fn status(&self) -> Result<ServiceStatus> {
        Ok(ServiceStatus::Unsupported)
    }
}

// Platform-specific driver selection
cfg_if::cfg_if! {
    if #[cfg(target_os = "macos")] {
        fn native_driver(ctx: DriverContext) -> Box<dyn ServiceControl> {
            Box::new(MacosControl::new(ctx))
        }
    } else if #[cfg(target_os = "linux")] {
        fn native_driver(ctx: DriverContext) -> Box<dyn ServiceControl> {
            Box::new(LinuxControl::new(ctx))
        }
    } else if #[cfg(target_os = "windows")] {
        fn native_driver(ctx: DriverContext) -> Box<dyn ServiceControl> {
            Box::new(WindowsControl::new(ctx))
        }
    } else {
        fn native_driver(_ctx: DriverContext) -> Box<dyn ServiceControl> {
            Box::new(Unsupported)
        }
    }
}

/// Facade over the driver for this host
pub struct ServiceManager {
    driver: Box<dyn ServiceControl>,
}

impl ServiceManager {
    pub fn for_current_os(identity: ServiceIdentity) -> Self {
        Self::with_driver(native_driver(DriverContext::detect(identity)))
    }

    pub fn with_driver(driver: Box<dyn ServiceControl>) -> Self {
        Self { driver }
    }

    pub fn install(&self) -> Result<()> {
        self.driver.install()?;
        info!("service installed");
        Ok(())
    }

    pub fn install_system(&self) -> Result<()> {
        self.driver.install_system()?;
        info!("system service installed");
        Ok(())
    }

    pub fn uninstall(&self) -> Result<()> {
        self.driver.uninstall()?;
        info!("service uninstalled");
        Ok(())
    }

    pub fn start(&self) -> Result<()> {
        self.driver.start()?;
        info!("service started");
        Ok(())
    }

    pub fn stop(&self) -> Result<()> {
        self.driver.stop()?;
        info!("service stopped");
        Ok(())
    }

    pub fn status(&self) -> Result<ServiceStatus> {
        self.driver.status()
    }
}

/// Installed scope of a descriptor-file based driver, or `NotInstalled`
pub(crate) fn require_scope(scope: Option<Scope>) -> Result<Scope> {
    scope.ok_or(ServiceError::NotInstalled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings() {
        let cases = [
            (ServiceStatus::NotInstalled, "Not installed"),
            (ServiceStatus::NotLoaded(Scope::User), "Installed (not loaded)"),
            (ServiceStatus::Running(Some(Scope::User)), "Running (user)"),
            (ServiceStatus::Running(Some(Scope::System)), "Running (system)"),
            (ServiceStatus::Stopped(Some(Scope::User)), "Stopped (user)"),
            (ServiceStatus::Stopped(Some(Scope::System)), "Stopped (system)"),
            (ServiceStatus::Running(None), "Running"),
            (ServiceStatus::Stopped(None), "Stopped"),
            (ServiceStatus::Unknown, "Unknown"),
            (ServiceStatus::Unsupported, "Unsupported OS"),
        ];
        for (status, expected) in cases {
            assert_eq!(status.to_string(), expected);
        }
    }

    #[test]
    fn json_report() {
        let json = serde_json::to_value(ServiceStatus::Running(Some(Scope::System)).report()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "state": "running",
                "scope": "system",
                "message": "Running (system)",
            })
        );

        let json = serde_json::to_value(ServiceStatus::NotInstalled.report()).unwrap();
        assert_eq!(json["scope"], serde_json::Value::Null);
        assert_eq!(json["message"], "Not installed");
    }

    #[test]
    fn unsupported_os_is_a_no_op() {
        let manager = ServiceManager::with_driver(Box::new(Unsupported));
        manager.install().unwrap();
        manager.start().unwrap();
        manager.stop().unwrap();
        manager.uninstall().unwrap();
        assert_eq!(manager.status().unwrap(), ServiceStatus::Unsupported);
    }
}
