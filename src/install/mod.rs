//! Descriptor generation, durable file operations and privilege escalation
//! shared by the native service drivers.

pub(crate) mod file_ops;
pub(crate) mod plist;
pub mod privilege;
pub(crate) mod unit;

use std::path::{Path, PathBuf};

use crate::error::{Result, ServiceError};

pub use privilege::Privilege;

/// Where the binary being installed comes from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExecutableSource {
    /// The running executable, with symlinks resolved
    #[default]
    Current,
    /// A fixed path, used as-is after resolution
    Path(PathBuf),
}

impl ExecutableSource {
    /// Real path of the executable.
    ///
    /// The invoking path may be a symlink or shim, so it is canonicalised.
    pub fn resolve(&self) -> Result<PathBuf> {
        let path = match self {
            ExecutableSource::Current => std::env::current_exe().map_err(|e| {
                ServiceError::Resolution(format!("failed to get executable path: {e}"))
            })?,
            ExecutableSource::Path(path) => path.clone(),
        };
        canonical(&path)
    }
}

fn canonical(path: &Path) -> Result<PathBuf> {
    let resolved = std::fs::canonicalize(path).map_err(|e| {
        ServiceError::Resolution(format!(
            "failed to resolve symlinks for {}: {e}",
            path.display()
        ))
    })?;
    Ok(strip_verbatim_prefix(resolved))
}

/// `canonicalize` yields `\\?\C:\...` on Windows, which sc.exe does not accept
fn strip_verbatim_prefix(path: PathBuf) -> PathBuf {
    match path.to_str().and_then(|s| s.strip_prefix(r"\\?\")) {
        Some(stripped) if !stripped.starts_with("UNC") => PathBuf::from(stripped),
        _ => path,
    }
}
