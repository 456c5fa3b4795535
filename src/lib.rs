//! renderpool
//!
//! A two-tier pool for browser automation: a pool of browser contexts, each
//! backed by its own browser process, and a pool of pages layered on top of
//! it. Borrowers get reset, validated resources; capacity, reuse, eviction,
//! and teardown are handled behind the pool boundary.
//!
//! ```no_run
//! use renderpool::{BrowserPools, PoolSettings};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let pools = BrowserPools::with_chromium(PoolSettings::default());
//! let page = pools.borrow_page().await?;
//! page.navigate("https://example.com").await?;
//! let png = page.screenshot().await?;
//! pools.return_page(page).await;
//! pools.close().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod pool;
pub mod profile;

pub use config::{BrowserMode, LaunchSettings, PoolSettings, PoolTuning};
pub use coordinator::BrowserPools;
pub use engine::{BrowserEngine, ChromiumEngine, EngineError, PageHandle, ProcessHandle};
pub use pool::{
    BrowserPage, Context, ContextId, GenericPool, PoolError, PoolResult, Pooled, ResourceFactory,
};
