mod common;

use std::path::{Path, PathBuf};

use common::{FAKE_BINARY, Sandbox, files_in};
use plist::Value;
use taskrunner::control::{MacosControl, ServiceControl, ServiceStatus};
use taskrunner::error::ServiceError;
use taskrunner::install::ExecutableSource;
use taskrunner::paths::Scope;

const USER_TARGET: &str = "gui/501/taskrunner";
const NOT_FOUND: &str = "Bad request.\nCould not find service \"taskrunner\" in domain for port";

fn agent_plist(sandbox: &Sandbox) -> PathBuf {
    sandbox.home().join("Library/LaunchAgents/taskrunner.plist")
}

fn agent_binary(sandbox: &Sandbox) -> PathBuf {
    sandbox.home().join(".local/bin/taskrunner")
}

fn daemon_plist(sandbox: &Sandbox) -> PathBuf {
    sandbox.root().join("Library/LaunchDaemons/taskrunner.plist")
}

fn daemon_binary(sandbox: &Sandbox) -> PathBuf {
    sandbox.root().join("usr/local/bin/taskrunner")
}

fn program_arguments(plist: &Path) -> Vec<String> {
    Value::from_file(plist)
        .unwrap()
        .into_dictionary()
        .unwrap()
        .get("ProgramArguments")
        .and_then(Value::as_array)
        .unwrap()
        .iter()
        .filter_map(Value::as_string)
        .map(str::to_string)
        .collect()
}

#[test]
fn status_without_plist_invokes_nothing() {
    let sandbox = Sandbox::new();
    let driver = MacosControl::new(sandbox.elevated());

    assert_eq!(driver.status().unwrap(), ServiceStatus::NotInstalled);
    assert!(sandbox.runner.calls().is_empty());
}

#[test]
fn agent_install_copies_binary_and_registers() {
    let sandbox = Sandbox::new();
    let driver = MacosControl::new(sandbox.elevated());

    driver.install().unwrap();

    let copy = agent_binary(&sandbox);
    assert_eq!(std::fs::read(&copy).unwrap(), FAKE_BINARY);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&copy).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    let plist = agent_plist(&sandbox);
    assert_eq!(
        program_arguments(&plist),
        [copy.display().to_string(), "run".to_string()]
    );
    assert!(sandbox.home().join(".taskrunner").is_dir());

    let plist_arg = plist.display().to_string();
    assert!(sandbox.runner.called(&format!("launchctl bootstrap gui/501 {plist_arg}")));
    assert!(sandbox.runner.called(&format!("launchctl enable {USER_TARGET}")));
    assert!(!sandbox.runner.called_prefix("launchctl kickstart"));
}

#[test]
fn installing_twice_keeps_one_plist_and_one_copy() {
    let sandbox = Sandbox::new();
    let driver = MacosControl::new(sandbox.elevated());

    driver.install().unwrap();
    driver.install().unwrap();

    assert_eq!(
        files_in(&sandbox.home().join("Library/LaunchAgents")),
        [agent_plist(&sandbox)]
    );
    assert_eq!(
        files_in(&sandbox.home().join(".local/bin")),
        [agent_binary(&sandbox)]
    );
}

#[test]
fn reinstalling_from_the_installed_copy_keeps_it() {
    let sandbox = Sandbox::new();
    MacosControl::new(sandbox.elevated()).install().unwrap();

    let ctx = sandbox
        .elevated()
        .with_executable(ExecutableSource::Path(agent_binary(&sandbox)));
    MacosControl::new(ctx).install().unwrap();

    assert_eq!(std::fs::read(agent_binary(&sandbox)).unwrap(), FAKE_BINARY);
}

#[test]
fn bootstrap_failure_falls_back_to_legacy_load() {
    let sandbox = Sandbox::new();
    sandbox
        .runner
        .respond("launchctl bootstrap", 5, "Bootstrap failed: 5: Input/output error");
    let driver = MacosControl::new(sandbox.elevated());

    driver.install().unwrap();
    let plist_arg = agent_plist(&sandbox).display().to_string();
    assert!(sandbox.runner.called(&format!("launchctl load -w {plist_arg}")));
}

#[test]
fn both_registration_paths_failing_names_both() {
    let sandbox = Sandbox::new();
    sandbox
        .runner
        .respond("launchctl bootstrap", 5, "Bootstrap failed: 5: Input/output error");
    sandbox.runner.respond("launchctl load", 1, "Load failed: 37");

    let err = MacosControl::new(sandbox.elevated()).install().unwrap_err();
    assert!(matches!(err, ServiceError::Fallback { .. }));
    let msg = err.to_string();
    assert!(msg.contains("Bootstrap failed"), "{msg}");
    assert!(msg.contains("Load failed"), "{msg}");
}

#[test]
fn status_follows_launchctl_print() {
    let sandbox = Sandbox::new();
    let driver = MacosControl::new(sandbox.elevated());
    driver.install().unwrap();

    sandbox.runner.respond("launchctl print", 113, NOT_FOUND);
    assert_eq!(driver.status().unwrap(), ServiceStatus::NotLoaded(Scope::User));
    assert_eq!(driver.status().unwrap().to_string(), "Installed (not loaded)");

    sandbox.runner.respond(
        "launchctl print",
        0,
        "gui/501/taskrunner = {\n\tstate = running\n\tpid = 4242\n}",
    );
    assert_eq!(driver.status().unwrap().to_string(), "Running (user)");

    sandbox.runner.respond(
        "launchctl print",
        0,
        "gui/501/taskrunner = {\n\tstate = not running\n}",
    );
    assert_eq!(driver.status().unwrap().to_string(), "Stopped (user)");

    sandbox
        .runner
        .respond("launchctl print", 1, "Operation not permitted");
    assert!(matches!(
        driver.status(),
        Err(ServiceError::NativeCommand { .. })
    ));
}

#[test]
fn start_bootstraps_an_unloaded_agent_first() {
    let sandbox = Sandbox::new();
    let driver = MacosControl::new(sandbox.elevated());
    driver.install().unwrap();
    sandbox.runner.clear();

    sandbox.runner.respond("launchctl print", 113, NOT_FOUND);
    driver.start().unwrap();

    let plist_arg = agent_plist(&sandbox).display().to_string();
    assert_eq!(
        sandbox.runner.calls(),
        [
            format!("launchctl print {USER_TARGET}"),
            format!("launchctl bootstrap gui/501 {plist_arg}"),
            format!("launchctl enable {USER_TARGET}"),
            format!("launchctl kickstart -k {USER_TARGET}"),
        ]
    );
}

#[test]
fn start_of_loaded_agent_kickstarts_directly() {
    let sandbox = Sandbox::new();
    let driver = MacosControl::new(sandbox.elevated());
    driver.install().unwrap();
    sandbox.runner.clear();

    sandbox
        .runner
        .respond("launchctl print", 0, "gui/501/taskrunner = {\n\tstate = waiting\n}");
    driver.start().unwrap();

    assert!(!sandbox.runner.called_prefix("launchctl bootstrap"));
    assert!(sandbox.runner.called(&format!("launchctl kickstart -k {USER_TARGET}")));
}

#[test]
fn failed_kickstart_fails_start() {
    let sandbox = Sandbox::new();
    let driver = MacosControl::new(sandbox.elevated());
    driver.install().unwrap();

    sandbox.runner.respond("launchctl kickstart", 1, "Could not kickstart");
    assert!(driver.start().is_err());
}

#[test]
fn stop_never_fails_once_installed() {
    let sandbox = Sandbox::new();
    let driver = MacosControl::new(sandbox.elevated());
    driver.install().unwrap();
    sandbox.runner.clear();

    sandbox.runner.respond("launchctl", 3, "No such process");
    driver.stop().unwrap();

    assert_eq!(
        sandbox.runner.calls(),
        [
            format!("launchctl disable {USER_TARGET}"),
            format!("launchctl kill SIGTERM {USER_TARGET}"),
            "launchctl stop taskrunner".to_string(),
        ]
    );
}

#[test]
fn uninstall_removes_plist_and_copy() {
    let sandbox = Sandbox::new();
    let driver = MacosControl::new(sandbox.elevated());
    driver.install().unwrap();
    driver.install_system().unwrap();

    driver.uninstall().unwrap();

    assert!(!agent_plist(&sandbox).exists());
    assert!(!agent_binary(&sandbox).exists());
    assert!(!daemon_plist(&sandbox).exists());
    assert!(!daemon_binary(&sandbox).exists());
    assert!(sandbox.exe().exists());
    assert_eq!(driver.status().unwrap(), ServiceStatus::NotInstalled);
}

#[test]
fn uninstall_reports_every_scope_and_keeps_partial_progress() {
    let sandbox = Sandbox::new();
    let elevated = MacosControl::new(sandbox.elevated());
    elevated.install().unwrap();
    elevated.install_system().unwrap();

    sandbox
        .runner
        .respond("sudo rm -f", 1, "rm: cannot remove: Operation not permitted");
    let err = MacosControl::new(sandbox.unprivileged())
        .uninstall()
        .unwrap_err();

    match &err {
        ServiceError::Uninstall(outcomes) => {
            assert_eq!(outcomes.len(), 2);
            assert_eq!(outcomes[0].scope, Scope::User);
            assert!(outcomes[0].result.is_ok());
            assert_eq!(outcomes[1].scope, Scope::System);
            assert!(outcomes[1].result.is_err());
        }
        other => panic!("unexpected error: {other}"),
    }
    let msg = err.to_string();
    assert!(msg.contains("user service uninstall: removed"), "{msg}");
    assert!(msg.contains("system service uninstall: command failed"), "{msg}");

    assert!(!agent_plist(&sandbox).exists());
    assert!(!agent_binary(&sandbox).exists());
    assert!(daemon_plist(&sandbox).exists());
}

#[test]
fn daemon_install_runs_as_owning_user() {
    let sandbox = Sandbox::new();
    let driver = MacosControl::new(sandbox.elevated());

    driver.install_system().unwrap();

    assert_eq!(std::fs::read(daemon_binary(&sandbox)).unwrap(), FAKE_BINARY);
    assert!(sandbox.root().join("var/log/taskrunner").is_dir());

    let plist = daemon_plist(&sandbox);
    let dict = Value::from_file(&plist).unwrap().into_dictionary().unwrap();
    assert_eq!(dict.get("UserName").and_then(Value::as_string), Some("ada"));
    assert_eq!(
        dict.get("StandardOutPath").and_then(Value::as_string),
        Some(
            sandbox
                .root()
                .join("var/log/taskrunner/stdout.log")
                .display()
                .to_string()
                .as_str()
        )
    );
    assert_eq!(
        program_arguments(&plist)[0],
        daemon_binary(&sandbox).display().to_string()
    );

    let plist_arg = plist.display().to_string();
    assert!(sandbox.runner.called(&format!("launchctl bootout system {plist_arg}")));
    assert!(sandbox.runner.called(&format!("launchctl bootstrap system {plist_arg}")));
    assert!(sandbox.runner.called("launchctl enable system/taskrunner"));
}

#[test]
fn daemon_install_without_root_goes_through_sudo() {
    let sandbox = Sandbox::new();
    let driver = MacosControl::new(sandbox.unprivileged());

    driver.install_system().unwrap();

    let bin = daemon_binary(&sandbox).display().to_string();
    let plist = daemon_plist(&sandbox).display().to_string();
    for line in [
        format!("sudo cp {} {bin}", sandbox.resolved_exe().display()),
        format!("sudo chmod 755 {bin}"),
        format!("sudo tee {plist}"),
        format!("sudo launchctl bootstrap system {plist}"),
    ] {
        assert!(sandbox.runner.called(&line), "missing {line}");
    }
}

#[test]
fn daemon_start_falls_back_through_legacy_commands() {
    let sandbox = Sandbox::new();
    let driver = MacosControl::new(sandbox.elevated());
    driver.install_system().unwrap();

    sandbox
        .runner
        .respond("launchctl kickstart", 1, "kickstart refused");
    driver.start().unwrap();
    assert!(sandbox.runner.called("launchctl start taskrunner"));

    sandbox.runner.respond("launchctl start", 1, "start refused");
    sandbox.runner.respond("launchctl load", 1, "load refused");
    let err = driver.start().unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("kickstart refused"), "{msg}");
    assert!(!msg.contains("load refused"), "{msg}");
}

#[test]
fn daemon_status_reports_system_scope() {
    let sandbox = Sandbox::new();
    let driver = MacosControl::new(sandbox.elevated());
    driver.install_system().unwrap();

    sandbox
        .runner
        .respond("launchctl print system/taskrunner", 0, "state = running");
    assert_eq!(driver.status().unwrap(), ServiceStatus::Running(Some(Scope::System)));
}

#[test]
fn user_scope_wins_when_both_are_installed() {
    let sandbox = Sandbox::new();
    let driver = MacosControl::new(sandbox.elevated());
    driver.install().unwrap();
    driver.install_system().unwrap();
    sandbox.runner.clear();

    driver.stop().unwrap();
    driver.status().unwrap();
    assert!(
        sandbox.runner.calls().iter().all(|c| !c.contains("system")),
        "{:?}",
        sandbox.runner.calls()
    );
}
