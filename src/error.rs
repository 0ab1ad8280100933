//! Error taxonomy for service lifecycle operations.
//!
//! Must-succeed steps return `Result<_, ServiceError>` and propagate their
//! first failure. Cleanup steps whose failure must never block the primary
//! operation are wrapped in [`BestEffort`], which records and logs the failure
//! but never surfaces it.

use std::fmt;
use std::io;

use crate::paths::Scope;

pub type Result<T, E = ServiceError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// A required filesystem location, executable or user could not be determined
    #[error("{0}")]
    Resolution(String),

    /// The native tool ran and reported failure
    #[error("command failed: {command}: {}: {output}", exit_label(.status))]
    NativeCommand {
        command: String,
        status: Option<i32>,
        output: String,
    },

    /// The native tool could not be spawned at all
    #[error("failed to execute {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// A modern command and its legacy fallback both failed
    #[error("{primary} (legacy fallback also failed: {fallback})")]
    Fallback {
        primary: Box<ServiceError>,
        fallback: Box<ServiceError>,
    },

    #[error("service not installed")]
    NotInstalled,

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("{}", UninstallReport(.0))]
    Uninstall(Vec<ScopeOutcome>),
}

impl ServiceError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn io_at(action: &str, path: &std::path::Path, source: io::Error) -> Self {
        Self::io(format!("failed to {action} {}", path.display()), source)
    }

    /// Combined output of a failed native command, if any
    pub fn native_output(&self) -> Option<&str> {
        match self {
            Self::NativeCommand { output, .. } => Some(output),
            _ => None,
        }
    }
}

fn exit_label(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}

/// Outcome of removing one scope's artifacts during uninstall
#[derive(Debug)]
pub struct ScopeOutcome {
    pub scope: Scope,
    pub result: Result<()>,
}

impl ScopeOutcome {
    pub fn failed(&self) -> bool {
        self.result.is_err()
    }
}

/// Collect per-scope outcomes; fails only if at least one scope failed,
/// and then reports every attempted scope.
pub(crate) fn aggregate(outcomes: Vec<ScopeOutcome>) -> Result<()> {
    if outcomes.iter().any(ScopeOutcome::failed) {
        Err(ServiceError::Uninstall(outcomes))
    } else {
        Ok(())
    }
}

struct UninstallReport<'a>(&'a [ScopeOutcome]);

impl fmt::Display for UninstallReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, outcome) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            match &outcome.result {
                Ok(()) => write!(f, "{} service uninstall: removed", outcome.scope)?,
                Err(e) => write!(f, "{} service uninstall: {e}", outcome.scope)?,
            }
        }
        Ok(())
    }
}

/// A cleanup step that is attempted but never allowed to fail the caller.
#[derive(Debug)]
#[must_use = "best-effort steps should be logged or inspected, not silently dropped"]
pub struct BestEffort {
    step: String,
    failure: Option<ServiceError>,
}

impl BestEffort {
    pub fn attempt<T>(step: impl Into<String>, result: Result<T>) -> Self {
        let step = step.into();
        let failure = result.err();
        if let Some(e) = &failure {
            log::debug!("best-effort step '{step}' failed (ignored): {e}");
        }
        Self { step, failure }
    }

    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    pub fn failure(&self) -> Option<&ServiceError> {
        self.failure.as_ref()
    }

    pub fn step(&self) -> &str {
        &self.step
    }

    /// Explicitly discard the outcome
    pub fn ignore(self) {}
}

/// Path-carrying helper for "file missing is fine" removals
pub(crate) fn remove_if_exists(path: &std::path::Path) -> Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ServiceError::io_at("remove", path, e)),
    }
}
