//! User data directory management for persistent-mode contexts
//!
//! UUID-based naming avoids SingletonLock collisions between concurrently
//! launched processes; stale-lock detection lets a startup sweep reclaim
//! directories left behind by crashed processes.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

const PROFILE_PREFIX: &str = "renderpool_profile_";

/// RAII wrapper for a user data directory.
///
/// Removes the directory on drop unless ownership is transferred out with
/// [`ProfileDir::into_path`], so a failed launch never strands a directory.
#[derive(Debug)]
pub struct ProfileDir {
    path: PathBuf,
    cleanup_on_drop: bool,
}

impl ProfileDir {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            cleanup_on_drop: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Consume the wrapper and return the path, disabling auto-cleanup.
    ///
    /// Use this when another cleanup mechanism (the user data dir registry)
    /// takes over ownership.
    pub fn into_path(mut self) -> PathBuf {
        self.cleanup_on_drop = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for ProfileDir {
    fn drop(&mut self) {
        if self.cleanup_on_drop && self.path.exists() {
            info!("Removing orphaned profile directory: {}", self.path.display());
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!(
                    "Failed to remove profile directory {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}

/// Create a unique user data directory under `root`.
///
/// The root is created on demand. Directory creation itself uses
/// `create_dir` so a UUID collision fails loudly instead of silently
/// sharing a profile.
pub fn create_profile_dir(root: &Path) -> Result<ProfileDir> {
    std::fs::create_dir_all(root)
        .with_context(|| format!("Failed to create profile root: {}", root.display()))?;

    let path = root.join(format!("{}{}", PROFILE_PREFIX, Uuid::new_v4()));
    debug!("Creating user data directory: {}", path.display());

    std::fs::create_dir(&path)
        .with_context(|| format!("Failed to create profile directory: {}", path.display()))?;

    Ok(ProfileDir::new(path))
}

/// Check whether a profile's SingletonLock is stale.
///
/// SingletonLock is a symlink whose target is `{hostname}-{PID}`; the lock
/// is stale when that PID no longer exists.
#[cfg(unix)]
pub fn is_singleton_lock_stale(profile_dir: &Path) -> bool {
    let lock_path = profile_dir.join("SingletonLock");

    if !lock_path.exists() && !lock_path.is_symlink() {
        return true;
    }

    match std::fs::read_link(&lock_path) {
        Ok(target) => {
            let target_str = target.to_string_lossy();
            if let Some(pid_str) = target_str.rsplit('-').next()
                && let Ok(pid) = pid_str.parse::<i32>()
            {
                // kill(pid, 0) probes existence without signalling
                let exists = unsafe { libc::kill(pid, 0) == 0 };
                if !exists {
                    debug!("SingletonLock is stale: PID {} no longer exists", pid);
                    return true;
                }
                return false;
            }
            warn!("Could not parse PID from SingletonLock target: {}", target_str);
            false
        }
        Err(_) => {
            // A plain file where a symlink should be means a corrupted lock
            lock_path.is_file()
        }
    }
}

/// Non-Unix fallback: UUID naming already prevents conflicts, so assume
/// stale.
#[cfg(not(unix))]
pub fn is_singleton_lock_stale(_profile_dir: &Path) -> bool {
    true
}

/// Remove profile directories under `root` whose owning process is gone.
///
/// Intended as startup maintenance after a crash; returns the number of
/// directories removed.
pub fn cleanup_stale_profiles(root: &Path) -> Result<usize> {
    let mut cleaned = 0;

    let entries = std::fs::read_dir(root)
        .with_context(|| format!("Failed to read profile root: {}", root.display()))?;

    for entry in entries.flatten() {
        let path = entry.path();
        if let Some(name) = path.file_name().and_then(|n| n.to_str())
            && name.starts_with(PROFILE_PREFIX)
            && path.is_dir()
            && is_singleton_lock_stale(&path)
        {
            info!("Cleaning stale profile: {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!("Failed to remove stale profile {}: {}", path.display(), e);
            } else {
                cleaned += 1;
            }
        }
    }

    if cleaned > 0 {
        info!("Cleaned {} stale profile directories", cleaned);
    }
    Ok(cleaned)
}
