//! Durable file operations for descriptors and binary copies.
//!
//! Service managers may read a descriptor the instant it appears, so every
//! write is flushed to disk before it becomes visible under its final name.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{Result, ServiceError};

/// Write `content` to a temp sibling, fsync, set `mode`, then rename over `path`
pub(crate) fn write_file_atomic(path: &Path, content: &[u8], mode: u32) -> Result<()> {
    let temp_path = path.with_extension("tmp");

    {
        let mut file =
            fs::File::create(&temp_path).map_err(|e| ServiceError::io_at("create", &temp_path, e))?;

        file.write_all(content)
            .map_err(|e| ServiceError::io_at("write", &temp_path, e))?;

        file.sync_all()
            .map_err(|e| ServiceError::io_at("sync", &temp_path, e))?;
    }

    set_mode(&temp_path, mode)?;

    fs::rename(&temp_path, path).map_err(|e| ServiceError::io_at("rename into", path, e))?;

    Ok(())
}

/// Replace `dst` with a byte-for-byte, executable, fsync'd copy of `src`
pub(crate) fn copy_executable(src: &Path, dst: &Path) -> Result<()> {
    // a running binary cannot always be truncated in place; unlink first
    crate::error::remove_if_exists(dst)?;

    let mut source = fs::File::open(src).map_err(|e| ServiceError::io_at("open", src, e))?;
    let mut target = fs::File::create(dst).map_err(|e| ServiceError::io_at("create", dst, e))?;

    std::io::copy(&mut source, &mut target)
        .map_err(|e| ServiceError::io_at("copy executable to", dst, e))?;
    target
        .sync_all()
        .map_err(|e| ServiceError::io_at("sync", dst, e))?;

    set_mode(dst, 0o755)
}

pub(crate) fn create_dir_all(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| ServiceError::io_at("create directory", dir, e))
}

/// Create the parent directory of `path`, if any
pub(crate) fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => create_dir_all(parent),
        _ => Ok(()),
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| ServiceError::io_at("set permissions on", path, e))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
