//! Pooled browser contexts
//!
//! Each context owns a dedicated browser process. The factory keeps
//! id-keyed registries of live processes and of persistent user data
//! directories so teardown can run exactly once per context no matter how
//! many paths (return, invalidation, eviction, shutdown) race to trigger
//! it.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{BrowserMode, PoolSettings};
use crate::engine::{BrowserEngine, EngineError, PageHandle, ProcessHandle};
use crate::profile;

use super::errors::{PoolError, PoolResult};

/// Stable identifier of a pooled context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(Uuid);

impl ContextId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Shared set of pool-vended page target ids on one context.
///
/// Pooled pages outlive the page's borrow of the context, so the tracker is
/// shared between the context and its pages; context passivation closes
/// only pages absent from it.
#[derive(Clone, Default)]
pub(crate) struct PageTracker(Arc<Mutex<HashSet<String>>>);

impl PageTracker {
    pub(crate) fn track(&self, target_id: &str) {
        self.0.lock().insert(target_id.to_string());
    }

    pub(crate) fn untrack(&self, target_id: &str) {
        self.0.lock().remove(target_id);
    }

    fn contains(&self, target_id: &str) -> bool {
        self.0.lock().contains(target_id)
    }

    fn len(&self) -> usize {
        self.0.lock().len()
    }
}

/// A browser execution context backed by a dedicated process.
pub struct Context {
    id: ContextId,
    process: Arc<dyn ProcessHandle>,
    pages: PageTracker,
}

impl Context {
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Whether the underlying process is still reachable.
    pub async fn is_connected(&self) -> bool {
        self.process.is_connected().await
    }

    /// Open a new blank page on this context's process.
    pub async fn open_page(&self) -> Result<Arc<dyn PageHandle>, EngineError> {
        self.process.open_page().await
    }

    pub(crate) fn process_handle(&self) -> Arc<dyn ProcessHandle> {
        Arc::clone(&self.process)
    }

    pub(crate) fn page_tracker(&self) -> PageTracker {
        self.pages.clone()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("tracked_pages", &self.pages.len())
            .finish()
    }
}

/// Creates and tears down [`Context`]s for a [`super::GenericPool`].
pub struct ContextFactory {
    engine: Arc<dyn BrowserEngine>,
    settings: PoolSettings,
    processes: DashMap<ContextId, Arc<dyn ProcessHandle>>,
    user_data_dirs: DashMap<ContextId, PathBuf>,
}

impl ContextFactory {
    pub fn new(engine: Arc<dyn BrowserEngine>, settings: PoolSettings) -> Self {
        Self {
            engine,
            settings,
            processes: DashMap::new(),
            user_data_dirs: DashMap::new(),
        }
    }

    /// Number of live processes tracked by this factory.
    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    /// Close a context's process and remove its user data directory.
    ///
    /// Registry removal is the run-once guard: whichever caller removes the
    /// entry performs the close, every other caller is a no-op.
    async fn teardown(&self, id: ContextId) {
        if let Some((_, process)) = self.processes.remove(&id) {
            info!(context = %id, "closing browser process");
            if let Err(e) = process.close().await {
                warn!(context = %id, error = %e, "failed to close browser process");
            }
        }
        if let Some((_, dir)) = self.user_data_dirs.remove(&id) {
            debug!(context = %id, dir = %dir.display(), "removing user data directory");
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                warn!(
                    context = %id,
                    dir = %dir.display(),
                    error = %e,
                    "failed to remove user data directory"
                );
            }
        }
    }

    /// Tear down every process and directory still registered.
    ///
    /// Covers resources whose owners never returned them: the registries,
    /// not the pool queues, are the authority on what is alive.
    pub async fn close_all(&self) {
        let ids: Vec<ContextId> = self.processes.iter().map(|e| *e.key()).collect();
        if !ids.is_empty() {
            info!(count = ids.len(), "tearing down remaining browser processes");
        }
        for id in ids {
            self.teardown(id).await;
        }
        let dirs: Vec<ContextId> = self.user_data_dirs.iter().map(|e| *e.key()).collect();
        for id in dirs {
            self.teardown(id).await;
        }
    }
}

#[async_trait]
impl super::ResourceFactory for ContextFactory {
    type Resource = Context;

    async fn make(&self) -> PoolResult<Context> {
        let id = ContextId::new();
        let process = match self.settings.browser_mode {
            BrowserMode::Incognito => self.engine.launch(&self.settings.launch).await?,
            BrowserMode::Persistent => {
                let root = self.settings.effective_user_data_root();
                let dir = profile::create_profile_dir(&root)
                    .map_err(|e| PoolError::CreationFailed(EngineError::Other(e)))?;
                let process = self
                    .engine
                    .launch_persistent(&self.settings.launch, dir.path())
                    .await?;
                // Launch succeeded; the registry owns the directory now.
                self.user_data_dirs.insert(id, dir.into_path());
                process
            }
        };
        self.processes.insert(id, Arc::clone(&process));
        info!(context = %id, mode = ?self.settings.browser_mode, "launched browser context");
        Ok(Context {
            id,
            process,
            pages: PageTracker::default(),
        })
    }

    /// Hand-out preparation: start the borrower from a clean cookie jar.
    async fn activate(&self, context: &mut Context) -> PoolResult<()> {
        context
            .process
            .clear_cookies()
            .await
            .map_err(PoolError::ResetFailed)
    }

    /// Reset session state on return: close pages the borrower left open
    /// (pool-vended pages excepted), then clear cookies.
    async fn passivate(&self, context: &mut Context) -> PoolResult<()> {
        let pages = context
            .process
            .open_pages()
            .await
            .map_err(PoolError::ResetFailed)?;
        for page in pages {
            if context.pages.contains(page.target_id()) {
                continue;
            }
            debug!(context = %context.id, target = page.target_id(), "closing stray page");
            if let Err(e) = page.close().await {
                warn!(context = %context.id, error = %e, "failed to close stray page");
            }
        }
        context
            .process
            .clear_cookies()
            .await
            .map_err(PoolError::ResetFailed)?;
        Ok(())
    }

    async fn validate(&self, context: &Context) -> bool {
        context.process.is_connected().await
    }

    async fn destroy(&self, context: Context) -> PoolResult<()> {
        // Session cleanup before the kill, tolerating a process that is
        // already gone.
        if context.process.is_connected().await {
            if let Err(e) = context.process.clear_cookies().await {
                debug!(context = %context.id, error = %e, "cookie clear on destroy failed");
            }
            if let Err(e) = context.process.clear_permissions().await {
                debug!(context = %context.id, error = %e, "permission clear on destroy failed");
            }
        }
        self.teardown(context.id).await;
        Ok(())
    }
}
