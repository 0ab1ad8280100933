//! The runner's size-rotated log file and the tail reader behind `logs`.
//!
//! Rotation itself is `file_rotate`: once the active file holds
//! `max_size_bytes`, it is renamed to `<name>.<UTC timestamp>` (a counter is
//! appended when two rotations share a timestamp), gzipped when the policy
//! asks for it, and only the newest `max_backups` are kept. Backups older than
//! `max_age` are swept when the log is opened.

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::time::{Duration, SystemTime};

use file_rotate::compression::Compression;
use file_rotate::suffix::{AppendTimestamp, FileLimit};
use file_rotate::{ContentLimit, FileRotate};
use log::{debug, warn};

use crate::config::RotationPolicy;
use crate::error::{Result, ServiceError};

/// Rotating `Write` sink handed to the heartbeat loop
pub type RollingLog = FileRotate<AppendTimestamp>;

/// Open `path` for appending under `policy`, creating its directory if needed
pub fn open_rolling(path: &Path, policy: RotationPolicy) -> Result<RollingLog> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ServiceError::io_at("create", parent, e))?;
    }
    prune_expired(path, policy.max_age)?;

    let compression = if policy.compress {
        Compression::OnRotate(0)
    } else {
        Compression::None
    };
    let max_bytes = usize::try_from(policy.max_size_bytes).unwrap_or(usize::MAX);

    Ok(FileRotate::new(
        path,
        AppendTimestamp::default(FileLimit::MaxFiles(policy.max_backups)),
        ContentLimit::Bytes(max_bytes),
        compression,
        #[cfg(unix)]
        None,
    ))
}

/// Remove backups of `path` last modified more than `max_age` ago
fn prune_expired(path: &Path, max_age: Duration) -> Result<()> {
    let (Some(dir), Some(name)) = (path.parent(), path.file_name()) else {
        return Ok(());
    };
    let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
        return Ok(());
    };
    let prefix = format!("{}.", name.to_string_lossy());

    let entries = fs::read_dir(dir).map_err(|e| ServiceError::io_at("read", dir, e))?;
    for entry in entries.flatten() {
        if !entry.file_name().to_string_lossy().starts_with(&prefix) {
            continue;
        }
        let expired = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .is_ok_and(|at| at < cutoff);
        if expired {
            let backup = entry.path();
            match fs::remove_file(&backup) {
                Ok(()) => debug!("removed expired log backup {}", backup.display()),
                Err(e) => warn!("failed to remove expired log backup {}: {e}", backup.display()),
            }
        }
    }
    Ok(())
}

/// Last `max_bytes` of the file at `path`, never splitting a UTF-8 character
pub fn tail_log(path: &Path, max_bytes: u64) -> Result<String> {
    let read_err = |e| ServiceError::io_at("read", path, e);

    let mut file = File::open(path).map_err(read_err)?;
    let len = file.metadata().map_err(read_err)?.len();
    file.seek(SeekFrom::Start(len.saturating_sub(max_bytes)))
        .map_err(read_err)?;

    let mut buf = Vec::new();
    file.read_to_end(&mut buf).map_err(read_err)?;

    let start = buf
        .iter()
        .position(|b| (b & 0b1100_0000) != 0b1000_0000)
        .unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[start..]).into_owned())
}
