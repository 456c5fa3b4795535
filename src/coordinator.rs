//! Top-level owner of the context and page pools
//!
//! [`BrowserPools`] wires the two tiers together, starts their evictors, and
//! enforces shutdown ordering: pages drain before contexts so no page ever
//! outlives the process backing it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::config::{BrowserMode, PoolSettings};
use crate::engine::{BrowserEngine, ChromiumEngine};
use crate::pool::{
    BrowserPage, Context, ContextFactory, ContextPool, GenericPool, PageFactory, PagePool, Pooled,
    PoolResult,
};
use crate::profile;

/// The two-tier browser pool.
pub struct BrowserPools {
    contexts: Arc<ContextPool>,
    pages: Arc<PagePool>,
    closed: AtomicBool,
}

impl BrowserPools {
    /// Build pools over an arbitrary engine.
    pub fn new(engine: Arc<dyn BrowserEngine>, settings: PoolSettings) -> Arc<Self> {
        if settings.browser_mode == BrowserMode::Persistent {
            let root = settings.effective_user_data_root();
            match profile::cleanup_stale_profiles(&root) {
                Ok(0) => {}
                Ok(n) => info!(cleaned = n, "removed stale profile directories at startup"),
                Err(e) => warn!(error = %e, "stale profile sweep failed"),
            }
        }

        let context_tuning = settings.context_pool.clone();
        let page_tuning = settings.page_pool.clone();
        let contexts = GenericPool::new(ContextFactory::new(engine, settings), context_tuning);
        let pages = GenericPool::new(PageFactory::new(Arc::clone(&contexts)), page_tuning);
        contexts.start_evictor();
        pages.start_evictor();

        Arc::new(Self {
            contexts,
            pages,
            closed: AtomicBool::new(false),
        })
    }

    /// Build pools over the bundled Chromium engine.
    pub fn with_chromium(settings: PoolSettings) -> Arc<Self> {
        Self::new(Arc::new(ChromiumEngine::new()), settings)
    }

    /// Borrow a context directly, bypassing the page pool.
    pub async fn borrow_context(&self) -> PoolResult<Pooled<Context>> {
        self.contexts.borrow().await
    }

    pub async fn return_context(&self, context: Pooled<Context>) {
        self.contexts.return_resource(context).await;
    }

    /// Destroy a borrowed context instead of returning it.
    pub async fn invalidate_context(&self, context: Pooled<Context>) {
        self.contexts.invalidate(context).await;
    }

    /// Borrow a page. Transparently borrows a context when no pooled page
    /// is idle.
    pub async fn borrow_page(&self) -> PoolResult<Pooled<BrowserPage>> {
        self.pages.borrow().await
    }

    pub async fn return_page(&self, page: Pooled<BrowserPage>) {
        self.pages.return_resource(page).await;
    }

    /// Destroy a borrowed page instead of returning it.
    pub async fn invalidate_page(&self, page: Pooled<BrowserPage>) {
        self.pages.invalidate(page).await;
    }

    pub fn context_pool(&self) -> &Arc<ContextPool> {
        &self.contexts
    }

    pub fn page_pool(&self) -> &Arc<PagePool> {
        &self.pages
    }

    /// Shut everything down: page pool first, then context pool, then a
    /// registry sweep that kills any process whose borrower never came back.
    /// Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("shutting down browser pools");
        self.pages.close().await;
        self.contexts.close().await;
        self.contexts.factory().close_all().await;
        info!("browser pools shut down");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
