//! macOS service control using launchd (launchctl)
//!
//! User installs are LaunchAgents in the `gui/<uid>` domain, system installs
//! are LaunchDaemons in the `system` domain. Both run a copy of the executable
//! at a stable path so rebuilding or moving the original does not break the job.

use std::path::{Path, PathBuf};

use log::{debug, info};

use super::{DriverContext, ServiceControl, ServiceStatus, require_scope};
use crate::error::{BestEffort, Result, ScopeOutcome, ServiceError, aggregate, remove_if_exists};
use crate::install::file_ops;
use crate::install::plist::{LaunchdJob, generate_plist};
use crate::paths::{Scope, preferred_scope};
use crate::process::{CommandBuilder, CommandOutput};

pub struct MacosControl {
    ctx: DriverContext,
}

impl MacosControl {
    pub fn new(ctx: DriverContext) -> Self {
        Self { ctx }
    }

    fn label(&self) -> &str {
        &self.ctx.identity().name
    }

    fn domain(&self, scope: Scope) -> String {
        match scope {
            Scope::User => format!("gui/{}", self.ctx.privilege.uid()),
            Scope::System => "system".to_string(),
        }
    }

    /// `<domain>/<label>` service target
    fn target(&self, scope: Scope) -> String {
        format!("{}/{}", self.domain(scope), self.label())
    }

    fn plist_path(&self, scope: Scope) -> Result<PathBuf> {
        match scope {
            Scope::User => self.ctx.paths.macos_user_plist(),
            Scope::System => Ok(self.ctx.paths.macos_system_plist()),
        }
    }

    fn plist_exists(&self, scope: Scope) -> bool {
        self.plist_path(scope).map(|p| p.exists()).unwrap_or(false)
    }

    /// Scope whose plist is on disk, user first
    pub fn installed_scope(&self) -> Option<Scope> {
        preferred_scope(self.plist_exists(Scope::User), self.plist_exists(Scope::System))
    }

    /// Run launchctl in `scope`, requiring success. System scope is elevated.
    fn launchctl(&self, scope: Scope, args: &[&str]) -> Result<CommandOutput> {
        let cmd = CommandBuilder::new("launchctl").args(args.iter().copied());
        match scope {
            Scope::User => self.ctx.runner().run_checked(&cmd),
            Scope::System => self.ctx.privilege.run(self.ctx.runner(), cmd),
        }
    }

    /// `launchctl print <target>`: `None` when launchd does not know the job
    fn probe(&self, scope: Scope) -> Result<Option<String>> {
        let cmd = CommandBuilder::new("launchctl").args(["print".to_string(), self.target(scope)]);
        let output = self.ctx.runner().run(&cmd)?;
        if output.success() {
            return Ok(Some(output.combined));
        }
        if is_not_loaded(&output.combined) {
            return Ok(None);
        }
        Err(output.failure(&cmd))
    }

    /// `bootstrap`, falling back to the legacy `load -w`
    fn register(&self, scope: Scope, plist: &Path) -> Result<()> {
        let plist = plist.display().to_string();
        let domain = self.domain(scope);

        let Err(primary) = self.launchctl(scope, &["bootstrap", &domain, &plist]) else {
            return Ok(());
        };
        debug!("bootstrap failed, trying legacy load: {primary}");

        match self.launchctl(scope, &["load", "-w", &plist]) {
            Ok(_) => {
                info!("Registered {plist} with legacy launchctl load");
                Ok(())
            }
            Err(fallback) => Err(ServiceError::Fallback {
                primary: Box::new(primary),
                fallback: Box::new(fallback),
            }),
        }
    }

    /// Best-effort removal of any registration, loaded by either API
    fn unregister(&self, scope: Scope, plist: &Path) {
        let plist = plist.display().to_string();
        let bootout = match scope {
            Scope::User => self.launchctl(scope, &["bootout", &self.target(scope)]),
            Scope::System => self.launchctl(scope, &["bootout", "system", &plist]),
        };
        BestEffort::attempt(format!("bootout {scope} job"), bootout).ignore();
        BestEffort::attempt(
            format!("unload {scope} job"),
            self.launchctl(scope, &["unload", "-w", &plist]),
        )
        .ignore();
    }

    fn stop_scope(&self, scope: Scope) {
        let target = self.target(scope);
        BestEffort::attempt("disable job", self.launchctl(scope, &["disable", &target])).ignore();
        BestEffort::attempt(
            "send SIGTERM",
            self.launchctl(scope, &["kill", "SIGTERM", &target]),
        )
        .ignore();
        BestEffort::attempt("legacy stop", self.launchctl(scope, &["stop", self.label()])).ignore();
    }

    fn install_agent(&self) -> Result<()> {
        let source = self.ctx.executable.resolve()?;
        let binary = self.ctx.paths.macos_user_binary()?;
        if !same_file(&source, &binary) {
            file_ops::ensure_parent(&binary)?;
            file_ops::copy_executable(&source, &binary)?;
            info!("Copied {} to {}", source.display(), binary.display());
        }

        BestEffort::attempt(
            "create log directory",
            self.ctx
                .paths
                .data_dir()
                .and_then(|dir| file_ops::create_dir_all(&dir)),
        )
        .ignore();

        let stdout = self.ctx.paths.macos_user_stdout()?;
        let stderr = self.ctx.paths.macos_user_stderr()?;
        let content = generate_plist(
            self.ctx.identity(),
            &LaunchdJob {
                program: &binary,
                stdout: &stdout,
                stderr: &stderr,
                user_name: None,
            },
        )?;

        let plist = self.ctx.paths.macos_user_plist()?;
        file_ops::ensure_parent(&plist)?;
        file_ops::write_file_atomic(&plist, &content, 0o644)?;
        info!("Wrote LaunchAgent: {}", plist.display());

        self.unregister(Scope::User, &plist);
        self.register(Scope::User, &plist)?;
        BestEffort::attempt(
            "enable job",
            self.launchctl(Scope::User, &["enable", &self.target(Scope::User)]),
        )
        .ignore();
        Ok(())
    }

    fn install_daemon(&self) -> Result<()> {
        let source = self.ctx.executable.resolve()?;
        let user = self.ctx.owning_user()?;
        let privilege = &self.ctx.privilege;
        let runner = self.ctx.runner();

        privilege.create_dir_all(runner, &self.ctx.paths.macos_system_log_dir())?;

        let binary = self.ctx.paths.macos_system_binary();
        if !same_file(&source, &binary) {
            privilege.copy_executable(runner, &source, &binary)?;
            info!("Copied {} to {}", source.display(), binary.display());
        }

        let stdout = self.ctx.paths.macos_system_stdout();
        let stderr = self.ctx.paths.macos_system_stderr();
        let content = generate_plist(
            self.ctx.identity(),
            &LaunchdJob {
                program: &binary,
                stdout: &stdout,
                stderr: &stderr,
                user_name: Some(&user),
            },
        )?;

        let plist = self.ctx.paths.macos_system_plist();
        privilege.write_file(runner, &plist, &content, 0o644)?;
        info!("Wrote LaunchDaemon: {} (UserName={user})", plist.display());

        self.unregister(Scope::System, &plist);
        self.register(Scope::System, &plist)?;
        BestEffort::attempt(
            "enable job",
            self.launchctl(Scope::System, &["enable", &self.target(Scope::System)]),
        )
        .ignore();
        Ok(())
    }

    fn start_agent(&self) -> Result<()> {
        let target = self.target(Scope::User);
        if self.probe(Scope::User)?.is_none() {
            self.register(Scope::User, &self.ctx.paths.macos_user_plist()?)?;
        }
        self.launchctl(Scope::User, &["enable", &target])?;
        self.launchctl(Scope::User, &["kickstart", "-k", &target])?;
        Ok(())
    }

    fn start_daemon(&self) -> Result<()> {
        let target = self.target(Scope::System);
        BestEffort::attempt(
            "enable job",
            self.launchctl(Scope::System, &["enable", &target]),
        )
        .ignore();

        let Err(first) = self.launchctl(Scope::System, &["kickstart", "-k", &target]) else {
            return Ok(());
        };
        debug!("kickstart failed, trying legacy start: {first}");

        if self.launchctl(Scope::System, &["start", self.label()]).is_ok() {
            return Ok(());
        }
        let plist = self.ctx.paths.macos_system_plist().display().to_string();
        if self.launchctl(Scope::System, &["load", "-w", &plist]).is_ok() {
            return Ok(());
        }
        Err(first)
    }

    fn uninstall_scope(&self, scope: Scope) -> Result<()> {
        let plist = self.plist_path(scope)?;
        self.stop_scope(scope);
        self.unregister(scope, &plist);

        match scope {
            Scope::User => {
                remove_if_exists(&plist)?;
                remove_if_exists(&self.ctx.paths.macos_user_binary()?)?;
            }
            Scope::System => {
                let runner = self.ctx.runner();
                self.ctx.privilege.remove_file(runner, &plist)?;
                self.ctx
                    .privilege
                    .remove_file(runner, &self.ctx.paths.macos_system_binary())?;
            }
        }
        info!("Removed {scope} job {}", self.label());
        Ok(())
    }
}

impl ServiceControl for MacosControl {
    fn install(&self) -> Result<()> {
        self.install_agent()
    }

    fn install_system(&self) -> Result<()> {
        self.install_daemon()
    }

    fn uninstall(&self) -> Result<()> {
        let outcomes = [Scope::User, Scope::System]
            .into_iter()
            .filter(|scope| self.plist_exists(*scope))
            .map(|scope| ScopeOutcome {
                scope,
                result: self.uninstall_scope(scope),
            })
            .collect();
        aggregate(outcomes)
    }

    fn start(&self) -> Result<()> {
        match require_scope(self.installed_scope())? {
            Scope::User => self.start_agent(),
            Scope::System => self.start_daemon(),
        }
    }

    fn stop(&self) -> Result<()> {
        let scope = require_scope(self.installed_scope())?;
        self.stop_scope(scope);
        Ok(())
    }

    fn status(&self) -> Result<ServiceStatus> {
        let Some(scope) = self.installed_scope() else {
            return Ok(ServiceStatus::NotInstalled);
        };
        Ok(match self.probe(scope)? {
            None => ServiceStatus::NotLoaded(scope),
            Some(printed) => parse_print(&printed, scope),
        })
    }
}

fn is_not_loaded(output: &str) -> bool {
    let lower = output.to_lowercase();
    ["could not find service", "not found", "unknown service"]
        .iter()
        .any(|phrase| lower.contains(phrase))
}

fn parse_print(printed: &str, scope: Scope) -> ServiceStatus {
    if printed.contains("state = running") || printed.contains("pid =") {
        ServiceStatus::Running(Some(scope))
    } else {
        ServiceStatus::Stopped(Some(scope))
    }
}

/// Reinstalling from the installed copy itself must not delete the source
fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
