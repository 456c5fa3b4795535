//! Pool entry bookkeeping

use std::ops::{Deref, DerefMut};
use std::time::Instant;

/// Lifecycle state of a pool entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Sitting in the idle queue, available for borrow
    Idle,
    /// Held by a borrower
    Allocated,
    /// Torn down; terminal
    Evicted,
}

/// A resource wrapped with pool bookkeeping while it sits idle.
#[derive(Debug)]
pub struct PooledEntry<R> {
    pub(crate) id: u64,
    pub(crate) resource: R,
    pub(crate) state: EntryState,
    pub(crate) created_at: Instant,
    pub(crate) last_borrowed: Option<Instant>,
    pub(crate) last_returned: Option<Instant>,
}

impl<R> PooledEntry<R> {
    pub(crate) fn new(id: u64, resource: R) -> Self {
        Self {
            id,
            resource,
            state: EntryState::Idle,
            created_at: Instant::now(),
            last_borrowed: None,
            last_returned: None,
        }
    }

    /// Instant this entry last became idle.
    pub(crate) fn idle_since(&self) -> Instant {
        self.last_returned.unwrap_or(self.created_at)
    }
}

/// A borrowed resource.
///
/// Holds the entry's stable id so the pool can reconcile the entry on
/// return or invalidation. Derefs to the resource.
#[derive(Debug)]
pub struct Pooled<R> {
    pub(crate) id: u64,
    pub(crate) resource: R,
}

impl<R> Pooled<R> {
    /// Stable pool-assigned id of the underlying entry.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<R> Deref for Pooled<R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.resource
    }
}

impl<R> DerefMut for Pooled<R> {
    fn deref_mut(&mut self) -> &mut R {
        &mut self.resource
    }
}
