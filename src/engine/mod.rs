//! Browser engine boundary
//!
//! The pools never talk to chromiumoxide directly. Everything they need from
//! a browser (launching a process, opening pages, clearing session state,
//! asking whether the process is still alive) goes through the trait seam
//! defined here, so the pooling machinery can be exercised against a fake
//! engine in tests while production code uses [`ChromiumEngine`].

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::LaunchSettings;

pub mod chromium;
pub mod errors;

pub use chromium::ChromiumEngine;
pub use errors::{EngineError, EngineResult};

/// Capability to launch browser processes.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Launch a browser process with an ephemeral profile.
    async fn launch(&self, launch: &LaunchSettings) -> EngineResult<Arc<dyn ProcessHandle>>;

    /// Launch a browser process bound to an on-disk user data directory.
    ///
    /// The directory must already exist. The engine does not delete it; the
    /// caller owns the directory's lifecycle.
    async fn launch_persistent(
        &self,
        launch: &LaunchSettings,
        user_data_dir: &Path,
    ) -> EngineResult<Arc<dyn ProcessHandle>>;
}

/// Handle to one live browser process.
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    /// Whether the process is still reachable over the devtools connection.
    async fn is_connected(&self) -> bool;

    /// Open a new blank page.
    async fn open_page(&self) -> EngineResult<Arc<dyn PageHandle>>;

    /// Enumerate the pages currently open on this process.
    async fn open_pages(&self) -> EngineResult<Vec<Arc<dyn PageHandle>>>;

    /// Clear all cookies held by the process.
    async fn clear_cookies(&self) -> EngineResult<()>;

    /// Reset any permission grants (geolocation, notifications, ...).
    async fn clear_permissions(&self) -> EngineResult<()>;

    /// Terminate the process. Safe to call more than once.
    async fn close(&self) -> EngineResult<()>;
}

/// Handle to one page on a browser process.
#[async_trait]
pub trait PageHandle: Send + Sync {
    /// Stable devtools target id for this page.
    fn target_id(&self) -> &str;

    /// Whether the page has been closed through this handle.
    fn is_closed(&self) -> bool;

    /// Navigate the page to a URL and wait for the navigation to commit.
    async fn navigate(&self, url: &str) -> EngineResult<()>;

    /// Clear client-side storage (localStorage, sessionStorage).
    async fn clear_storage(&self) -> EngineResult<()>;

    /// Capture a full-page PNG screenshot.
    async fn screenshot(&self) -> EngineResult<Vec<u8>>;

    /// Render the page to PDF.
    async fn pdf(&self) -> EngineResult<Vec<u8>>;

    /// Close the page. Safe to call more than once.
    async fn close(&self) -> EngineResult<()>;
}
