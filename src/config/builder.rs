//! Builder for [`PoolSettings`]

use std::path::PathBuf;
use std::time::Duration;

use super::types::{BrowserMode, LaunchSettings, PoolSettings, PoolTuning};

/// Chainable builder for [`PoolSettings`].
///
/// ```
/// use renderpool::{BrowserMode, PoolSettings};
/// use std::time::Duration;
///
/// let settings = PoolSettings::builder()
///     .browser_mode(BrowserMode::Persistent)
///     .headless(true)
///     .max_contexts(4)
///     .max_pages(16)
///     .max_wait(Duration::from_secs(10))
///     .build();
/// assert_eq!(settings.context_pool.max_total, 4);
/// ```
#[derive(Debug, Default, Clone)]
pub struct PoolSettingsBuilder {
    settings: PoolSettings,
}

impl PoolSettingsBuilder {
    pub fn browser_mode(mut self, mode: BrowserMode) -> Self {
        self.settings.browser_mode = mode;
        self
    }

    pub fn launch(mut self, launch: LaunchSettings) -> Self {
        self.settings.launch = launch;
        self
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.settings.launch.headless = headless;
        self
    }

    pub fn executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.launch.executable = Some(path.into());
        self
    }

    pub fn extra_arg(mut self, arg: impl Into<String>) -> Self {
        self.settings.launch.extra_args.push(arg.into());
        self
    }

    pub fn user_data_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.settings.user_data_root = Some(root.into());
        self
    }

    pub fn context_pool(mut self, tuning: PoolTuning) -> Self {
        self.settings.context_pool = tuning;
        self
    }

    pub fn page_pool(mut self, tuning: PoolTuning) -> Self {
        self.settings.page_pool = tuning;
        self
    }

    /// Cap on live browser processes.
    pub fn max_contexts(mut self, max: usize) -> Self {
        self.settings.context_pool.max_total = max;
        self.settings.context_pool.max_idle = self.settings.context_pool.max_idle.min(max);
        self
    }

    /// Cap on live pooled pages.
    pub fn max_pages(mut self, max: usize) -> Self {
        self.settings.page_pool.max_total = max;
        self.settings.page_pool.max_idle = self.settings.page_pool.max_idle.min(max);
        self
    }

    /// Borrow wait budget applied to both pools.
    pub fn max_wait(mut self, wait: Duration) -> Self {
        self.settings.context_pool.max_wait = wait;
        self.settings.page_pool.max_wait = wait;
        self
    }

    /// Eviction cadence applied to both pools; `None` disables eviction.
    pub fn eviction_interval(mut self, interval: Option<Duration>) -> Self {
        self.settings.context_pool.time_between_eviction_runs = interval;
        self.settings.page_pool.time_between_eviction_runs = interval;
        self
    }

    pub fn build(self) -> PoolSettings {
        self.settings
    }
}
