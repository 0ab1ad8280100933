//! Linux service control using systemd (systemctl)

use log::{info, warn};

use super::{DriverContext, ServiceControl, ServiceStatus, require_scope};
use crate::error::{BestEffort, Result, ScopeOutcome, aggregate, remove_if_exists};
use crate::install::{file_ops, privilege, unit};
use crate::paths::{Scope, preferred_scope};
use crate::process::{CommandBuilder, CommandOutput};

pub struct LinuxControl {
    ctx: DriverContext,
}

impl LinuxControl {
    pub fn new(ctx: DriverContext) -> Self {
        Self { ctx }
    }

    fn user_unit_exists(&self) -> bool {
        self.ctx
            .paths
            .linux_user_unit()
            .map(|path| path.exists())
            .unwrap_or(false)
    }

    fn system_unit_exists(&self) -> bool {
        self.ctx.paths.linux_system_unit().exists()
    }

    /// Scope whose unit file is on disk, user first
    pub fn installed_scope(&self) -> Option<Scope> {
        preferred_scope(self.user_unit_exists(), self.system_unit_exists())
    }

    fn unit_name(&self) -> String {
        self.ctx.identity().unit_name()
    }

    fn systemctl(scope: Scope, args: &[&str]) -> CommandBuilder {
        let cmd = CommandBuilder::new("systemctl");
        let cmd = match scope {
            Scope::User => cmd.arg("--user"),
            Scope::System => cmd,
        };
        cmd.args(args.iter().copied())
    }

    /// Run systemctl in `scope`, requiring success. System scope is elevated.
    fn systemctl_checked(&self, scope: Scope, args: &[&str]) -> Result<CommandOutput> {
        let cmd = Self::systemctl(scope, args);
        match scope {
            Scope::User => self.ctx.runner().run_checked(&cmd),
            Scope::System => self.ctx.privilege.run(self.ctx.runner(), cmd),
        }
    }

    fn install_user_unit(&self) -> Result<()> {
        let exe = self.ctx.executable.resolve()?;
        let unit_path = self.ctx.paths.linux_user_unit()?;
        let content = unit::render_unit(self.ctx.identity(), &exe, None);

        file_ops::ensure_parent(&unit_path)?;
        file_ops::write_file_atomic(&unit_path, content.as_bytes(), 0o644)?;
        info!("Wrote systemd user unit: {}", unit_path.display());

        let unit_name = self.unit_name();
        self.systemctl_checked(Scope::User, &["daemon-reload"])?;
        self.systemctl_checked(Scope::User, &["enable", &unit_name])?;
        Ok(())
    }

    fn install_system_unit(&self) -> Result<()> {
        let exe = self.ctx.executable.resolve()?;
        let user = self.ctx.owning_user()?;
        let home = privilege::conventional_home(&user);
        let run_as = unit::RunAs {
            user: &user,
            home: &home,
        };
        let content = unit::render_unit(self.ctx.identity(), &exe, Some(&run_as));

        let unit_path = self.ctx.paths.linux_system_unit();
        self.ctx
            .privilege
            .write_file(self.ctx.runner(), &unit_path, content.as_bytes(), 0o644)?;
        info!("Wrote systemd system unit: {} (User={user})", unit_path.display());

        let unit_name = self.unit_name();
        self.systemctl_checked(Scope::System, &["daemon-reload"])?;
        self.systemctl_checked(Scope::System, &["enable", &unit_name])?;
        Ok(())
    }

    fn uninstall_scope(&self, scope: Scope) -> Result<()> {
        let unit_name = self.unit_name();
        BestEffort::attempt(
            format!("stop {scope} unit"),
            self.systemctl_checked(scope, &["stop", &unit_name]),
        )
        .ignore();
        BestEffort::attempt(
            format!("disable {scope} unit"),
            self.systemctl_checked(scope, &["disable", &unit_name]),
        )
        .ignore();

        match scope {
            Scope::User => {
                remove_if_exists(&self.ctx.paths.linux_user_unit()?)?;
            }
            Scope::System => {
                self.ctx
                    .privilege
                    .remove_file(self.ctx.runner(), &self.ctx.paths.linux_system_unit())?;
            }
        }

        self.systemctl_checked(scope, &["daemon-reload"])?;
        info!("Removed {scope} unit {unit_name}");
        Ok(())
    }

    /// `systemctl is-active` in `scope`; never elevated
    fn status_in(&self, scope: Scope) -> Result<ServiceStatus> {
        let cmd = Self::systemctl(scope, &["is-active", &self.unit_name()]);
        let output = self.ctx.runner().run(&cmd)?;
        let state = output.trimmed();

        if output.success() {
            return Ok(if state == "active" {
                ServiceStatus::Running(Some(scope))
            } else {
                ServiceStatus::Stopped(Some(scope))
            });
        }

        // is-active exits non-zero for every inactive state but always prints
        // the state; silence means systemctl itself failed
        if state.is_empty() {
            return Err(output.failure(&cmd));
        }
        Ok(ServiceStatus::Stopped(Some(scope)))
    }
}

impl ServiceControl for LinuxControl {
    fn install(&self) -> Result<()> {
        self.install_user_unit()
    }

    fn install_system(&self) -> Result<()> {
        self.install_system_unit()
    }

    fn uninstall(&self) -> Result<()> {
        let mut outcomes = Vec::new();
        if self.user_unit_exists() {
            outcomes.push(ScopeOutcome {
                scope: Scope::User,
                result: self.uninstall_scope(Scope::User),
            });
        }
        if self.system_unit_exists() {
            outcomes.push(ScopeOutcome {
                scope: Scope::System,
                result: self.uninstall_scope(Scope::System),
            });
        }
        aggregate(outcomes)
    }

    fn start(&self) -> Result<()> {
        let scope = require_scope(self.installed_scope())?;
        self.systemctl_checked(scope, &["start", &self.unit_name()])?;
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let scope = require_scope(self.installed_scope())?;
        let Err(err) = self.systemctl_checked(scope, &["stop", &self.unit_name()]) else {
            return Ok(());
        };

        match self.status_in(scope) {
            Ok(status) if !status.is_running() => {
                warn!("systemctl stop failed but the unit is not active: {err}");
                Ok(())
            }
            _ => Err(err),
        }
    }

    fn status(&self) -> Result<ServiceStatus> {
        match self.installed_scope() {
            Some(scope) => self.status_in(scope),
            None => Ok(ServiceStatus::NotInstalled),
        }
    }
}
