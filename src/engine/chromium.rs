//! Chromium-backed engine implementation
//!
//! Wraps chromiumoxide behind the [`BrowserEngine`] traits. Each launched
//! process gets its own CDP handler task; `browser.version()` doubles as the
//! connectivity probe since it round-trips the devtools socket.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::cdp::browser_protocol::browser::ResetPermissionsParams;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams, PrintToPdfParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OnceCell};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::config::LaunchSettings;
use crate::engine::errors::{EngineError, EngineResult};
use crate::engine::{BrowserEngine, PageHandle, ProcessHandle};

impl From<CdpError> for EngineError {
    fn from(err: CdpError) -> Self {
        EngineError::Protocol(err.to_string())
    }
}

/// Arguments applied to every launched process. Keeps pooled instances quiet
/// and headless-friendly; callers add workload-specific flags via
/// [`LaunchSettings::extra_args`].
const DEFAULT_ARGS: &[&str] = &[
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-breakpad",
    "--disable-hang-monitor",
    "--disable-ipc-flooding-protection",
    "--disable-prompt-on-repost",
    "--metrics-recording-only",
    "--password-store=basic",
    "--use-mock-keychain",
    "--hide-scrollbars",
    "--mute-audio",
];

/// Find a Chrome/Chromium executable with platform-specific search paths.
///
/// `CHROMIUM_PATH` overrides all other discovery methods.
pub async fn find_browser_executable() -> anyhow::Result<PathBuf> {
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!("Using browser from CHROMIUM_PATH: {}", path.display());
            return Ok(path);
        }
        warn!(
            "CHROMIUM_PATH points to non-existent file: {}",
            path.display()
        );
    }

    let paths = if cfg!(target_os = "windows") {
        vec![
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
            r"C:\Program Files (x86)\Chromium\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        vec![
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "~/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "~/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        // Linux
        vec![
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/usr/local/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    };

    for path_str in paths {
        let path = if path_str.starts_with('~') {
            if let Some(home) = dirs::home_dir() {
                home.join(&path_str[2..])
            } else {
                continue;
            }
        } else {
            PathBuf::from(path_str)
        };
        if path.exists() {
            info!("Found browser at: {}", path.display());
            return Ok(path);
        }
    }

    if !cfg!(target_os = "windows") {
        for cmd in &["chromium", "chromium-browser", "google-chrome", "chrome"] {
            let output = Command::new("which").arg(cmd).output();
            if let Ok(output) = output
                && output.status.success()
            {
                let path_str = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path_str.is_empty() {
                    let path = PathBuf::from(path_str);
                    info!("Found browser using 'which': {}", path.display());
                    return Ok(path);
                }
            }
        }
    }

    Err(anyhow::anyhow!("Chrome/Chromium executable not found"))
}

/// Download a managed Chromium build into the user cache directory and
/// return the path to its executable.
pub async fn download_managed_browser() -> anyhow::Result<PathBuf> {
    info!("Downloading managed Chromium browser...");

    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("renderpool")
        .join("chromium");
    std::fs::create_dir_all(&cache_dir).context("Failed to create browser cache directory")?;

    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .context("Failed to build fetcher options")?,
    );
    let revision_info = fetcher.fetch().await.context("Failed to fetch browser")?;

    info!(
        "Downloaded Chromium to: {}",
        revision_info.folder_path.display()
    );
    Ok(revision_info.executable_path)
}

/// Production [`BrowserEngine`] backed by chromiumoxide.
///
/// The executable path is resolved once and cached for the lifetime of the
/// engine; an explicit path in [`LaunchSettings`] skips discovery entirely.
#[derive(Debug, Default)]
pub struct ChromiumEngine {
    executable: OnceCell<PathBuf>,
}

impl ChromiumEngine {
    pub fn new() -> Self {
        Self::default()
    }

    async fn resolve_executable(&self, launch: &LaunchSettings) -> EngineResult<PathBuf> {
        if let Some(path) = &launch.executable {
            return Ok(path.clone());
        }
        let path = self
            .executable
            .get_or_try_init(|| async {
                match find_browser_executable().await {
                    Ok(path) => Ok(path),
                    Err(_) => download_managed_browser().await,
                }
            })
            .await
            .map_err(EngineError::Other)?;
        Ok(path.clone())
    }

    async fn launch_with(
        &self,
        launch: &LaunchSettings,
        user_data_dir: Option<&Path>,
    ) -> EngineResult<Arc<dyn ProcessHandle>> {
        let executable = self.resolve_executable(launch).await?;

        let mut builder = BrowserConfigBuilder::default()
            .request_timeout(launch.request_timeout)
            .window_size(launch.window_width, launch.window_height)
            .chrome_executable(executable);

        if let Some(dir) = user_data_dir {
            builder = builder.user_data_dir(dir);
        }
        if launch.headless {
            builder = builder.headless_mode(HeadlessMode::default());
        } else {
            builder = builder.with_head();
        }
        for arg in DEFAULT_ARGS {
            builder = builder.arg(*arg);
        }
        for arg in &launch.extra_args {
            builder = builder.arg(arg);
        }

        let config = builder.build().map_err(EngineError::Launch)?;

        debug!("Launching browser with config: {:?}", config);
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| EngineError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if let Err(e) = h {
                    let error_msg = e.to_string();
                    // Chrome emits CDP events chromiumoxide does not recognize;
                    // those deserialization failures are not fatal.
                    // See mattsse/chromiumoxide#167 and #229.
                    let is_benign = error_msg
                        .contains("data did not match any variant of untagged enum Message")
                        || error_msg.contains("Failed to deserialize WS response");
                    if !is_benign {
                        error!("Browser handler error: {:?}", e);
                    } else {
                        trace!("Suppressed benign CDP serialization error: {}", error_msg);
                    }
                }
            }
            debug!("Browser handler task completed");
        });

        Ok(Arc::new(ChromiumProcess {
            browser: AsyncMutex::new(browser),
            handler: Mutex::new(Some(handler_task)),
            closed: AtomicBool::new(false),
        }))
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn launch(&self, launch: &LaunchSettings) -> EngineResult<Arc<dyn ProcessHandle>> {
        self.launch_with(launch, None).await
    }

    async fn launch_persistent(
        &self,
        launch: &LaunchSettings,
        user_data_dir: &Path,
    ) -> EngineResult<Arc<dyn ProcessHandle>> {
        self.launch_with(launch, Some(user_data_dir)).await
    }
}

/// One live Chromium process plus its CDP handler task.
pub struct ChromiumProcess {
    browser: AsyncMutex<Browser>,
    handler: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

#[async_trait]
impl ProcessHandle for ChromiumProcess {
    async fn is_connected(&self) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        self.browser.lock().await.version().await.is_ok()
    }

    async fn open_page(&self) -> EngineResult<Arc<dyn PageHandle>> {
        let page = self.browser.lock().await.new_page("about:blank").await?;
        Ok(Arc::new(ChromiumPage::new(page)))
    }

    async fn open_pages(&self) -> EngineResult<Vec<Arc<dyn PageHandle>>> {
        let pages = self.browser.lock().await.pages().await?;
        Ok(pages
            .into_iter()
            .map(|page| Arc::new(ChromiumPage::new(page)) as Arc<dyn PageHandle>)
            .collect())
    }

    async fn clear_cookies(&self) -> EngineResult<()> {
        self.browser.lock().await.clear_cookies().await?;
        Ok(())
    }

    async fn clear_permissions(&self) -> EngineResult<()> {
        self.browser
            .lock()
            .await
            .execute(ResetPermissionsParams {
                browser_context_id: None,
            })
            .await?;
        Ok(())
    }

    async fn close(&self) -> EngineResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            warn!("Failed to close browser: {e}");
        }
        // Wait for the process to fully exit so the profile directory is
        // released before anyone deletes it.
        if let Err(e) = browser.wait().await {
            warn!("Failed to wait for browser exit: {e}");
        }
        if let Some(handle) = self.handler.lock().take() {
            handle.abort();
        }
        Ok(())
    }
}

impl Drop for ChromiumProcess {
    fn drop(&mut self) {
        if let Some(handle) = self.handler.lock().take() {
            handle.abort();
        }
    }
}

/// One page on a Chromium process.
pub struct ChromiumPage {
    page: chromiumoxide::Page,
    target: String,
    closed: AtomicBool,
}

impl ChromiumPage {
    fn new(page: chromiumoxide::Page) -> Self {
        let target = page.target_id().inner().clone();
        Self {
            page,
            target,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl PageHandle for ChromiumPage {
    fn target_id(&self) -> &str {
        &self.target
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn navigate(&self, url: &str) -> EngineResult<()> {
        if self.is_closed() {
            return Err(EngineError::PageClosed);
        }
        self.page.goto(url).await?;
        Ok(())
    }

    async fn clear_storage(&self) -> EngineResult<()> {
        if self.is_closed() {
            return Err(EngineError::PageClosed);
        }
        self.page
            .evaluate(
                "try { window.localStorage.clear(); window.sessionStorage.clear(); } catch (e) {}",
            )
            .await?;
        Ok(())
    }

    async fn screenshot(&self) -> EngineResult<Vec<u8>> {
        if self.is_closed() {
            return Err(EngineError::PageClosed);
        }
        let params = CaptureScreenshotParams {
            format: Some(CaptureScreenshotFormat::Png),
            capture_beyond_viewport: Some(true),
            ..Default::default()
        };
        Ok(self.page.screenshot(params).await?)
    }

    async fn pdf(&self) -> EngineResult<Vec<u8>> {
        if self.is_closed() {
            return Err(EngineError::PageClosed);
        }
        Ok(self.page.pdf(PrintToPdfParams::default()).await?)
    }

    async fn close(&self) -> EngineResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.page.clone().close().await?;
        Ok(())
    }
}
