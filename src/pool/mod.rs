//! Two-tier resource pooling
//!
//! [`GenericPool`] is the capacity and lifecycle engine; it is specialized
//! twice, once over [`ContextFactory`] for browser contexts and once over
//! [`PageFactory`] for pages. The page factory borrows from the context pool,
//! which is what couples the two tiers.

pub mod context;
pub mod entry;
pub mod errors;
pub mod factory;
pub mod generic;
pub mod page;

pub use context::{Context, ContextFactory, ContextId};
pub use entry::{EntryState, Pooled};
pub use errors::{PoolError, PoolResult};
pub use factory::ResourceFactory;
pub use generic::GenericPool;
pub use page::{BrowserPage, ContextPool, PageFactory, PagePool};
