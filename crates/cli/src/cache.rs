// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owner-only JSON cache files under `<basedir>/lash/`.
//!
//! Reads refuse any file whose mode is not exactly 0600; nothing is repaired
//! automatically. A missing file is reported as `None`, not an error.

use std::fs::{DirBuilder, OpenOptions, Permissions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::SystemTime;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// The only mode a cache file may carry.
pub const CACHE_MODE: u32 = 0o600;

/// Mode for directories created to hold cache files.
pub const CACHE_DIR_MODE: u32 = 0o700;

/// A cache file exists but is readable or writable by someone other than
/// its owner.
#[derive(Debug)]
pub struct InsecureCacheFile {
    pub path: PathBuf,
    pub mode: u32,
}

impl std::fmt::Display for InsecureCacheFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cache file {} must have perms of {:04o} (found {:04o})",
            self.path.display(),
            CACHE_MODE,
            self.mode
        )
    }
}

impl std::error::Error for InsecureCacheFile {}

/// Raw contents of a cache file plus its last-write time.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub modified: SystemTime,
    pub bytes: Vec<u8>,
}

/// Read a cache file, enforcing the permission policy before any content is
/// touched.
pub fn read(path: &Path) -> anyhow::Result<Option<CacheEntry>> {
    let meta = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no cache file");
            return Ok(None);
        }
        Err(e) => return Err(e).with_context(|| format!("cannot stat {}", path.display())),
    };

    let mode = meta.permissions().mode() & 0o777;
    if mode != CACHE_MODE {
        return Err(InsecureCacheFile { path: path.to_path_buf(), mode }.into());
    }

    let modified =
        meta.modified().with_context(|| format!("cannot read mtime of {}", path.display()))?;
    let bytes =
        std::fs::read(path).with_context(|| format!("cannot read cache file {}", path.display()))?;
    Ok(Some(CacheEntry { modified, bytes }))
}

/// Read and decode a JSON cache file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Option<(SystemTime, T)>> {
    let Some(entry) = read(path)? else {
        return Ok(None);
    };
    let value = serde_json::from_slice(&entry.bytes)
        .with_context(|| format!("cannot unmarshal cache file {}", path.display()))?;
    Ok(Some((entry.modified, value)))
}

/// Replace a cache file atomically (unique tmp file + rename) with mode 0600.
///
/// The tmp name carries the PID and a counter so concurrent writers never
/// share a tmp file; the last rename wins.
pub fn write(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    if let Some(parent) = path.parent() {
        DirBuilder::new()
            .recursive(true)
            .mode(CACHE_DIR_MODE)
            .create(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }

    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);

    let result = (|| -> anyhow::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(CACHE_MODE)
            .open(&tmp_path)
            .with_context(|| format!("cannot create {}", tmp_path.display()))?;
        // The open mode is filtered through the umask.
        file.set_permissions(Permissions::from_mode(CACHE_MODE))?;
        file.write_all(bytes)?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("cannot write cache file {}", path.display()))
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    result
}

/// Encode `value` as JSON and replace the cache file with it.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_vec(value)
        .with_context(|| format!("cannot marshal cache file {}", path.display()))?;
    write(path, &json)?;
    debug!(path = %path.display(), bytes = json.len(), "cache written");
    Ok(())
}

/// Delete a cache file. Absent files are fine.
pub fn purge(path: &Path) -> anyhow::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "cache purged");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("cannot remove {}", path.display())),
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
