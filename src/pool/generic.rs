//! Bounded async object pool with background eviction
//!
//! Capacity is enforced with a semaphore: every live borrow holds one
//! forgotten permit, so the allocated count can never exceed `max_total`
//! even under concurrent borrows, and waiters queue first-in-first-out.
//! Idle entries hold no permit; a return releases its borrower's permit
//! only after the entry is back in the idle queue, which keeps
//! `idle + allocated <= max_total` at every instant.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{Semaphore, TryAcquireError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::PoolTuning;

use super::entry::{EntryState, Pooled, PooledEntry};
use super::errors::{PoolError, PoolResult};
use super::factory::ResourceFactory;

#[derive(Debug, Clone, Copy)]
struct AllocatedMeta {
    created_at: Instant,
    borrowed_at: Instant,
}

struct PoolState<R> {
    idle: VecDeque<PooledEntry<R>>,
    allocated: HashMap<u64, AllocatedMeta>,
    /// Ids whose slot was reclaimed by the abandoned sweep; a late return
    /// of one of these destroys the resource without touching capacity.
    abandoned: HashSet<u64>,
    next_id: u64,
}

impl<R> PoolState<R> {
    fn new() -> Self {
        Self {
            idle: VecDeque::new(),
            allocated: HashMap::new(),
            abandoned: HashSet::new(),
            next_id: 0,
        }
    }
}

/// Bounded concurrent pool parameterized over a [`ResourceFactory`].
pub struct GenericPool<F: ResourceFactory> {
    factory: Arc<F>,
    tuning: PoolTuning,
    permits: Arc<Semaphore>,
    state: Mutex<PoolState<F::Resource>>,
    evictor: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl<F: ResourceFactory> GenericPool<F> {
    /// Create a pool. Background eviction does not run until
    /// [`GenericPool::start_evictor`] is called.
    pub fn new(factory: F, tuning: PoolTuning) -> Arc<Self> {
        Arc::new(Self {
            factory: Arc::new(factory),
            permits: Arc::new(Semaphore::new(tuning.max_total)),
            tuning,
            state: Mutex::new(PoolState::new()),
            evictor: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    pub fn factory(&self) -> &Arc<F> {
        &self.factory
    }

    pub fn tuning(&self) -> &PoolTuning {
        &self.tuning
    }

    /// Entries currently available for borrow.
    pub fn idle_count(&self) -> usize {
        self.state.lock().idle.len()
    }

    /// Entries currently held by borrowers.
    pub fn active_count(&self) -> usize {
        self.state.lock().allocated.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Borrow a resource, waiting up to `max_wait` for capacity.
    ///
    /// Idle entries are revalidated (when `test_on_borrow`) before being
    /// handed out; invalid ones are destroyed and another is tried. With no
    /// idle entry available a fresh resource is created under the capacity
    /// ceiling.
    pub async fn borrow(&self) -> PoolResult<Pooled<F::Resource>> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }

        let waited = self.tuning.max_wait;
        let permit = if self.tuning.block_when_exhausted {
            match tokio::time::timeout(waited, Arc::clone(&self.permits).acquire_owned()).await {
                Err(_) => return Err(PoolError::Exhausted { waited }),
                Ok(Err(_)) => return Err(PoolError::Closed),
                Ok(Ok(permit)) => permit,
            }
        } else {
            match Arc::clone(&self.permits).try_acquire_owned() {
                Ok(permit) => permit,
                Err(TryAcquireError::Closed) => return Err(PoolError::Closed),
                Err(TryAcquireError::NoPermits) => {
                    return Err(PoolError::Exhausted {
                        waited: Duration::ZERO,
                    });
                }
            }
        };
        // The slot travels with this borrow from here on; every failure exit
        // must hand it back via add_permits.
        permit.forget();

        loop {
            let entry = {
                let mut state = self.state.lock();
                if self.tuning.lifo {
                    state.idle.pop_back()
                } else {
                    state.idle.pop_front()
                }
            };

            let Some(mut entry) = entry else {
                return match self.create_resource().await {
                    Ok(pooled) => Ok(pooled),
                    Err(err) => {
                        self.permits.add_permits(1);
                        Err(err)
                    }
                };
            };

            if self.tuning.test_on_borrow && !self.factory.validate(&entry.resource).await {
                debug!(id = entry.id, "idle entry failed validation on borrow, destroying");
                self.factory_destroy_logged(entry.id, entry.resource).await;
                continue;
            }
            if let Err(err) = self.factory.activate(&mut entry.resource).await {
                warn!(id = entry.id, error = %err, "failed to activate idle entry, destroying");
                self.factory_destroy_logged(entry.id, entry.resource).await;
                continue;
            }

            entry.state = EntryState::Allocated;
            let now = Instant::now();
            entry.last_borrowed = Some(now);
            let mut state = self.state.lock();
            state.allocated.insert(
                entry.id,
                AllocatedMeta {
                    created_at: entry.created_at,
                    borrowed_at: now,
                },
            );
            debug!(id = entry.id, "borrowed idle entry");
            return Ok(Pooled {
                id: entry.id,
                resource: entry.resource,
            });
        }
    }

    async fn create_resource(&self) -> PoolResult<Pooled<F::Resource>> {
        let mut resource = self.factory.make().await?;

        if self.tuning.test_on_create && !self.factory.validate(&resource).await {
            if let Err(err) = self.factory.destroy(resource).await {
                warn!(error = %err, "failed to destroy unvalidated resource");
            }
            return Err(PoolError::CreationFailed(
                anyhow::anyhow!("newly created resource failed validation").into(),
            ));
        }
        if let Err(err) = self.factory.activate(&mut resource).await {
            if let Err(e) = self.factory.destroy(resource).await {
                warn!(error = %e, "failed to destroy unactivated resource");
            }
            return Err(err);
        }

        let now = Instant::now();
        let id = {
            let mut state = self.state.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.allocated.insert(
                id,
                AllocatedMeta {
                    created_at: now,
                    borrowed_at: now,
                },
            );
            id
        };
        info!(id, "created pooled resource");
        Ok(Pooled { id, resource })
    }

    /// Return a borrowed resource.
    ///
    /// The resource is passivated and re-idled while idle capacity remains;
    /// otherwise it is destroyed. Returns after `close()` always destroy.
    pub async fn return_resource(&self, pooled: Pooled<F::Resource>) {
        let Pooled { id, mut resource } = pooled;

        let meta = {
            let mut state = self.state.lock();
            if state.abandoned.remove(&id) {
                debug!(id, "abandoned resource finally returned, destroying");
                None
            } else {
                state.allocated.remove(&id)
            }
        };
        let Some(meta) = meta else {
            // Slot already reclaimed; tear down without touching capacity.
            self.factory_destroy_logged(id, resource).await;
            return;
        };

        let mut reusable = !self.is_closed();
        if reusable && let Err(err) = self.factory.passivate(&mut resource).await {
            warn!(id, error = %err, "failed to passivate returned resource, destroying");
            reusable = false;
        }
        if reusable && self.tuning.test_on_return && !self.factory.validate(&resource).await {
            debug!(id, "returned resource failed validation, destroying");
            reusable = false;
        }

        if reusable {
            let now = Instant::now();
            let mut state = self.state.lock();
            if state.idle.len() < self.tuning.max_idle && !self.is_closed() {
                state.idle.push_back(PooledEntry {
                    id,
                    resource,
                    state: EntryState::Idle,
                    created_at: meta.created_at,
                    last_borrowed: Some(meta.borrowed_at),
                    last_returned: Some(now),
                });
                drop(state);
                self.permits.add_permits(1);
                debug!(id, "returned entry to idle queue");
                return;
            }
            debug!(id, "idle queue full, destroying returned resource");
        }

        self.factory_destroy_logged(id, resource).await;
        self.permits.add_permits(1);
    }

    /// Forcibly destroy a borrowed resource, bypassing passivation.
    pub async fn invalidate(&self, pooled: Pooled<F::Resource>) {
        let Pooled { id, resource } = pooled;
        let tracked = {
            let mut state = self.state.lock();
            let reclaimed = state.abandoned.remove(&id);
            state.allocated.remove(&id).is_some() && !reclaimed
        };
        info!(id, "invalidating pooled resource");
        self.factory_destroy_logged(id, resource).await;
        if tracked {
            self.permits.add_permits(1);
        }
    }

    /// Shut the pool down: refuse new borrows, stop the evictor, and
    /// destroy every idle entry. Each entry gets a destroy attempt even if
    /// earlier ones fail. Outstanding borrowed resources are destroyed
    /// when they come back.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.permits.close();
        if let Some(handle) = self.evictor.lock().take() {
            handle.abort();
        }

        let (idle, outstanding) = {
            let mut state = self.state.lock();
            let idle: Vec<_> = state.idle.drain(..).collect();
            (idle, state.allocated.len())
        };
        info!(
            idle = idle.len(),
            outstanding, "closing pool, destroying idle entries"
        );
        for entry in idle {
            self.factory_destroy_logged(entry.id, entry.resource).await;
        }
        if outstanding > 0 {
            warn!(
                outstanding,
                "pool closed with borrowed resources outstanding; they will be destroyed on return"
            );
        }
    }

    /// Spawn the periodic eviction task. No-op when the eviction interval
    /// is unset.
    pub fn start_evictor(self: &Arc<Self>) {
        let Some(interval) = self.tuning.time_between_eviction_runs else {
            return;
        };
        // Weak reference so the ticking task never keeps a dropped pool
        // alive; it exits on the first tick after the last handle goes.
        let pool = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(pool) = pool.upgrade() else {
                    break;
                };
                if pool.is_closed() {
                    break;
                }
                pool.run_eviction().await;
            }
            debug!("evictor task exiting");
        });
        *self.evictor.lock() = Some(handle);
    }

    /// One eviction pass: destroy over-age idle entries, validate sampled
    /// idle entries, reclaim abandoned slots, and replenish to `min_idle`.
    pub async fn run_eviction(&self) {
        let now = Instant::now();
        let mut victims = Vec::new();
        {
            let mut state = self.state.lock();
            let idle_len = state.idle.len();
            let sample = self.tuning.num_tests_per_eviction_run.min(idle_len);
            let mut remaining = idle_len;
            let mut examined = 0;
            let mut kept = VecDeque::with_capacity(idle_len);
            // Oldest entries sit at the front of the queue.
            while let Some(entry) = state.idle.pop_front() {
                if examined >= sample {
                    kept.push_back(entry);
                    continue;
                }
                examined += 1;
                let idle_for = now.duration_since(entry.idle_since());
                let hard = idle_for >= self.tuning.min_evictable_idle;
                let soft = self
                    .tuning
                    .soft_min_evictable_idle
                    .map(|d| idle_for >= d && remaining > self.tuning.min_idle)
                    .unwrap_or(false);
                if hard || soft {
                    remaining -= 1;
                    victims.push(entry);
                } else {
                    kept.push_back(entry);
                }
            }
            state.idle = kept;
        }
        for entry in victims {
            debug!(
                id = entry.id,
                idle_for = ?now.duration_since(entry.idle_since()),
                "evicting idle entry"
            );
            self.factory_destroy_logged(entry.id, entry.resource).await;
        }

        if self.tuning.test_while_idle {
            self.validate_idle_entries().await;
        }
        if let Some(timeout) = self.tuning.remove_abandoned_after {
            self.sweep_abandoned(now, timeout);
        }
        self.ensure_min_idle().await;
    }

    /// Validate up to `num_tests_per_eviction_run` idle entries, oldest
    /// first, and destroy the ones that fail.
    async fn validate_idle_entries(&self) {
        let entries: Vec<_> = {
            let mut state = self.state.lock();
            let sample = self.tuning.num_tests_per_eviction_run.min(state.idle.len());
            state.idle.drain(..sample).collect()
        };
        let mut healthy = VecDeque::with_capacity(entries.len());
        let mut dead = Vec::new();
        for entry in entries {
            if self.factory.validate(&entry.resource).await {
                healthy.push_back(entry);
            } else {
                dead.push(entry);
            }
        }
        {
            let mut state = self.state.lock();
            // Entries idled while we validated stay; ours go back in front
            // to preserve age ordering.
            while let Some(entry) = healthy.pop_back() {
                state.idle.push_front(entry);
            }
        }
        for entry in dead {
            warn!(id = entry.id, "idle entry failed validation, destroying");
            self.factory_destroy_logged(entry.id, entry.resource).await;
        }
    }

    /// Release the slots of borrowers that exceeded the abandon timeout.
    /// The resources themselves are destroyed when they come back.
    fn sweep_abandoned(&self, now: Instant, timeout: Duration) {
        let reclaimed = {
            let mut state = self.state.lock();
            let stale: Vec<u64> = state
                .allocated
                .iter()
                .filter(|(_, meta)| now.duration_since(meta.borrowed_at) >= timeout)
                .map(|(id, _)| *id)
                .collect();
            for id in &stale {
                state.allocated.remove(id);
                state.abandoned.insert(*id);
            }
            stale.len()
        };
        if reclaimed > 0 {
            warn!(reclaimed, "reclaimed slots from abandoned borrowers");
            self.permits.add_permits(reclaimed);
        }
    }

    /// Create idle entries up to `min_idle` while capacity allows.
    ///
    /// `max_total` caps idle plus allocated, so replenishment stops as soon
    /// as the pool is full of live resources even when the idle floor is
    /// not reached.
    async fn ensure_min_idle(&self) {
        loop {
            if self.is_closed() {
                break;
            }
            {
                let state = self.state.lock();
                if state.idle.len() >= self.tuning.min_idle
                    || state.idle.len() + state.allocated.len() >= self.tuning.max_total
                {
                    break;
                }
            }
            let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
                break;
            };
            permit.forget();
            match self.factory.make().await {
                Ok(resource) => {
                    let mut state = self.state.lock();
                    let id = state.next_id;
                    state.next_id += 1;
                    state.idle.push_back(PooledEntry::new(id, resource));
                    drop(state);
                    // Idle entries hold no slot.
                    self.permits.add_permits(1);
                    debug!(id, "replenished idle entry");
                }
                Err(err) => {
                    self.permits.add_permits(1);
                    warn!(error = %err, "failed to replenish idle entry");
                    break;
                }
            }
        }
    }

    async fn factory_destroy_logged(&self, id: u64, resource: F::Resource) {
        if let Err(err) = self.factory.destroy(resource).await {
            warn!(id, error = %err, "failed to destroy pooled resource");
        }
    }
}

impl<F: ResourceFactory> Drop for GenericPool<F> {
    fn drop(&mut self) {
        if let Some(handle) = self.evictor.lock().take() {
            handle.abort();
        }
    }
}
