//! Filesystem and service-manager locations, per OS and scope.
//!
//! Everything here is pure derivation from the user's home directory, the
//! service identity and a set of system roots. Nothing touches the disk.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::ServiceIdentity;
use crate::error::{Result, ServiceError};

/// Which installation record an operation acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    User,
    System,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scope::User => "user",
            Scope::System => "system",
        })
    }
}

/// Pick the scope to act on. User scope always wins when both exist.
pub fn preferred_scope(user_present: bool, system_present: bool) -> Option<Scope> {
    if user_present {
        Some(Scope::User)
    } else if system_present {
        Some(Scope::System)
    } else {
        None
    }
}

/// Protected system directories used by system-scope installs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemRoots {
    pub systemd_system_dir: PathBuf,
    pub launch_daemons_dir: PathBuf,
    pub bin_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for SystemRoots {
    fn default() -> Self {
        Self {
            systemd_system_dir: PathBuf::from("/etc/systemd/system"),
            launch_daemons_dir: PathBuf::from("/Library/LaunchDaemons"),
            bin_dir: PathBuf::from("/usr/local/bin"),
            log_dir: PathBuf::from("/var/log"),
        }
    }
}

impl SystemRoots {
    /// Every root nested under `base`; used to sandbox system-scope installs
    pub fn under(base: &Path) -> Self {
        Self {
            systemd_system_dir: base.join("etc/systemd/system"),
            launch_daemons_dir: base.join("Library/LaunchDaemons"),
            bin_dir: base.join("usr/local/bin"),
            log_dir: base.join("var/log"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServicePaths {
    identity: ServiceIdentity,
    home: Option<PathBuf>,
    roots: SystemRoots,
}

impl ServicePaths {
    /// Real locations for the invoking user
    pub fn detect(identity: ServiceIdentity) -> Self {
        Self::new(identity, dirs::home_dir(), SystemRoots::default())
    }

    pub fn new(identity: ServiceIdentity, home: Option<PathBuf>, roots: SystemRoots) -> Self {
        Self {
            identity,
            home,
            roots,
        }
    }

    pub fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    pub fn home(&self) -> Result<&Path> {
        self.home.as_deref().ok_or_else(|| {
            ServiceError::Resolution("failed to get home directory".to_string())
        })
    }

    // Linux (systemd)

    pub fn linux_user_unit(&self) -> Result<PathBuf> {
        Ok(self
            .home()?
            .join(".config/systemd/user")
            .join(self.identity.unit_name()))
    }

    pub fn linux_system_unit(&self) -> PathBuf {
        self.roots.systemd_system_dir.join(self.identity.unit_name())
    }

    // macOS (launchd)

    pub fn macos_user_plist(&self) -> Result<PathBuf> {
        Ok(self
            .home()?
            .join("Library/LaunchAgents")
            .join(self.plist_file_name()))
    }

    pub fn macos_system_plist(&self) -> PathBuf {
        self.roots.launch_daemons_dir.join(self.plist_file_name())
    }

    pub fn macos_user_binary(&self) -> Result<PathBuf> {
        Ok(self.home()?.join(".local/bin").join(&self.identity.binary_name))
    }

    pub fn macos_system_binary(&self) -> PathBuf {
        self.roots.bin_dir.join(&self.identity.binary_name)
    }

    pub fn macos_user_stdout(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("launchd.out.log"))
    }

    pub fn macos_user_stderr(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("launchd.err.log"))
    }

    pub fn macos_system_log_dir(&self) -> PathBuf {
        self.roots.log_dir.join(&self.identity.name)
    }

    pub fn macos_system_stdout(&self) -> PathBuf {
        self.macos_system_log_dir().join("stdout.log")
    }

    pub fn macos_system_stderr(&self) -> PathBuf {
        self.macos_system_log_dir().join("stderr.log")
    }

    // Runner

    /// `~/.<name>`: the runner's own log directory, also used for launchd capture on macOS
    pub fn data_dir(&self) -> Result<PathBuf> {
        Ok(self.home()?.join(self.identity.data_dir_name()))
    }

    pub fn runner_log(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join(format!("{}.log", self.identity.name)))
    }

    fn plist_file_name(&self) -> String {
        format!("{}.plist", self.identity.name)
    }
}
