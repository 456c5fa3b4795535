//! Configuration types for the browser pools
//!
//! These are immutable snapshots consumed at pool construction; nothing here
//! is re-read after a pool starts.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How browser processes are launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserMode {
    /// Ephemeral profile; nothing persisted on disk.
    Incognito,
    /// Process bound to an on-disk user data directory that lives until the
    /// context is destroyed.
    Persistent,
}

/// Options applied when launching a browser process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchSettings {
    /// Run the browser headless (default: true)
    pub headless: bool,
    /// Explicit browser executable; when unset the engine discovers or
    /// downloads one.
    pub executable: Option<PathBuf>,
    /// Initial window width in pixels
    pub window_width: u32,
    /// Initial window height in pixels
    pub window_height: u32,
    /// Timeout for individual devtools requests
    pub request_timeout: Duration,
    /// Extra command-line arguments appended after the built-in set
    pub extra_args: Vec<String>,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            window_width: 1920,
            window_height: 1080,
            request_timeout: Duration::from_secs(30),
            extra_args: Vec::new(),
        }
    }
}

/// Sizing, wait, validation, and eviction knobs for one pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolTuning {
    /// Hard ceiling on resources alive at once (idle + borrowed)
    pub max_total: usize,
    /// Maximum entries kept idle; returns beyond this are destroyed
    pub max_idle: usize,
    /// Idle floor the evictor replenishes to and the soft eviction
    /// threshold respects
    pub min_idle: usize,
    /// Wait for capacity instead of failing immediately (default: true)
    pub block_when_exhausted: bool,
    /// How long `borrow` waits for capacity before failing
    pub max_wait: Duration,
    /// Reuse the most recently returned entry first; `false` cycles
    /// entries oldest-first
    pub lifo: bool,
    /// Wake capacity waiters in arrival order. Waiting is always
    /// first-in-first-out in this implementation; the flag is accepted for
    /// configuration compatibility.
    pub fairness: bool,
    /// Validate resources right after creation
    pub test_on_create: bool,
    /// Validate entries before handing them to a borrower (default: true)
    pub test_on_borrow: bool,
    /// Validate entries after passivation before re-idling them
    pub test_on_return: bool,
    /// Validate sampled idle entries during eviction runs
    pub test_while_idle: bool,
    /// Interval between background eviction runs; `None` disables the
    /// evictor entirely
    pub time_between_eviction_runs: Option<Duration>,
    /// Idle entries older than this are destroyed regardless of `min_idle`
    pub min_evictable_idle: Duration,
    /// Idle entries older than this are destroyed only while the idle count
    /// stays above `min_idle`
    pub soft_min_evictable_idle: Option<Duration>,
    /// Idle entries examined per eviction run
    pub num_tests_per_eviction_run: usize,
    /// Reclaim the slot of a borrower that has held a resource longer than
    /// this; the resource is destroyed when it finally comes back. `None`
    /// disables the sweep.
    pub remove_abandoned_after: Option<Duration>,
}

impl Default for PoolTuning {
    fn default() -> Self {
        Self {
            max_total: 8,
            max_idle: 8,
            min_idle: 0,
            block_when_exhausted: true,
            max_wait: Duration::from_secs(30),
            lifo: true,
            fairness: true,
            test_on_create: false,
            test_on_borrow: true,
            test_on_return: false,
            test_while_idle: false,
            time_between_eviction_runs: Some(Duration::from_secs(60)),
            min_evictable_idle: Duration::from_secs(300),
            soft_min_evictable_idle: None,
            num_tests_per_eviction_run: 3,
            remove_abandoned_after: None,
        }
    }
}

/// Top-level settings for a [`crate::BrowserPools`] instance.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PoolSettings {
    /// Browser launch mode shared by every pooled context
    pub browser_mode: BrowserMode,
    /// Process launch options
    pub launch: LaunchSettings,
    /// Root directory for persistent-mode user data directories; falls back
    /// to the OS temp directory when unset
    pub user_data_root: Option<PathBuf>,
    /// Tuning for the context pool
    pub context_pool: PoolTuning,
    /// Tuning for the page pool
    pub page_pool: PoolTuning,
}

impl Default for BrowserMode {
    fn default() -> Self {
        BrowserMode::Incognito
    }
}

impl PoolSettings {
    pub fn builder() -> super::builder::PoolSettingsBuilder {
        super::builder::PoolSettingsBuilder::default()
    }

    /// Root directory used for persistent profiles, with the OS temp
    /// directory as fallback.
    pub fn effective_user_data_root(&self) -> PathBuf {
        self.user_data_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}
