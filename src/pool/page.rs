//! Pooled pages
//!
//! The page pool sits on top of the context pool: creating a page borrows a
//! context and opens the page on it, so total process count bounds page
//! creation. The context borrow is handed back when the page is returned
//! (passivation) and the page then rides on the process unborrowed; its
//! target id stays registered with the context so context passivation never
//! reaps a pool-vended page.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::engine::{EngineError, PageHandle, ProcessHandle};

use super::context::{Context, ContextFactory, ContextId, PageTracker};
use super::entry::Pooled;
use super::errors::{PoolError, PoolResult};
use super::generic::GenericPool;

/// Pool of browser contexts.
pub type ContextPool = GenericPool<ContextFactory>;
/// Pool of pages borrowed through the context pool.
pub type PagePool = GenericPool<PageFactory>;

/// A pooled page plus what it needs from its context after the context
/// borrow has been released: the process handle for connectivity checks
/// and the tracker registration keeping the page alive across context
/// passivation.
pub struct BrowserPage {
    page: Arc<dyn PageHandle>,
    process: Arc<dyn ProcessHandle>,
    tracker: PageTracker,
    context_id: ContextId,
    /// Held from creation until the first return hands it back.
    context: Option<Pooled<Context>>,
}

impl BrowserPage {
    pub fn page(&self) -> &dyn PageHandle {
        self.page.as_ref()
    }

    /// Id of the context this page was opened on.
    pub fn context_id(&self) -> ContextId {
        self.context_id
    }

    pub async fn navigate(&self, url: &str) -> Result<(), EngineError> {
        self.page.navigate(url).await
    }

    pub async fn screenshot(&self) -> Result<Vec<u8>, EngineError> {
        self.page.screenshot().await
    }

    pub async fn pdf(&self) -> Result<Vec<u8>, EngineError> {
        self.page.pdf().await
    }

    pub fn target_id(&self) -> &str {
        self.page.target_id()
    }
}

impl std::fmt::Debug for BrowserPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserPage")
            .field("target_id", &self.page.target_id())
            .field("context", &self.context_id)
            .finish()
    }
}

/// Creates pages by borrowing contexts from the context pool.
pub struct PageFactory {
    context_pool: Arc<ContextPool>,
}

impl PageFactory {
    pub fn new(context_pool: Arc<ContextPool>) -> Self {
        Self { context_pool }
    }

    /// Hand a page's context back to the context pool.
    ///
    /// A still-connected context is returned for reuse; a dead one is
    /// invalidated so the context pool reclaims the slot and tears the
    /// process down. Disconnection is the only invalidation trigger.
    async fn release_context(&self, context: Pooled<Context>) {
        if context.is_connected().await {
            self.context_pool.return_resource(context).await;
        } else {
            warn!(context = %Context::id(&context), "context disconnected, invalidating");
            self.context_pool.invalidate(context).await;
        }
    }
}

#[async_trait]
impl super::ResourceFactory for PageFactory {
    type Resource = BrowserPage;

    async fn make(&self) -> PoolResult<BrowserPage> {
        // Context exhaustion surfaces to the page borrower unchanged.
        let context = self.context_pool.borrow().await?;
        let page = match context.open_page().await {
            Ok(page) => page,
            Err(e) => {
                // Never strand the context borrow on a failed page open.
                self.release_context(context).await;
                return Err(PoolError::CreationFailed(e));
            }
        };
        // `Pooled::id` shadows the context's own id through Deref.
        let context_id = Context::id(&context);
        let tracker = context.page_tracker();
        tracker.track(page.target_id());
        info!(context = %context_id, target = page.target_id(), "opened pooled page");
        Ok(BrowserPage {
            process: context.process_handle(),
            tracker,
            context_id,
            context: Some(context),
            page,
        })
    }

    async fn activate(&self, _page: &mut BrowserPage) -> PoolResult<()> {
        Ok(())
    }

    /// Reset the page for the next borrower: wipe client-side storage,
    /// park it on a blank location, then hand the context borrow back.
    async fn passivate(&self, page: &mut BrowserPage) -> PoolResult<()> {
        page.page
            .clear_storage()
            .await
            .map_err(PoolError::ResetFailed)?;
        page.page
            .navigate("about:blank")
            .await
            .map_err(PoolError::ResetFailed)?;
        if let Some(context) = page.context.take() {
            self.release_context(context).await;
        }
        Ok(())
    }

    async fn validate(&self, page: &BrowserPage) -> bool {
        !page.page.is_closed() && page.process.is_connected().await
    }

    async fn destroy(&self, page: BrowserPage) -> PoolResult<()> {
        let BrowserPage {
            page,
            tracker,
            context,
            context_id,
            ..
        } = page;
        tracker.untrack(page.target_id());
        debug!(context = %context_id, target = page.target_id(), "closing pooled page");
        if let Err(e) = page.close().await {
            warn!(target = page.target_id(), error = %e, "failed to close pooled page");
        }
        // A context still attached means the page never made it back to the
        // idle queue; hand the borrow back instead of leaking the slot.
        if let Some(context) = context {
            self.release_context(context).await;
        }
        Ok(())
    }
}
