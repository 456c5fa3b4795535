//! Shared test doubles: an in-memory browser engine and a counting
//! resource factory, so pool behavior can be exercised without launching
//! real browser processes.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use renderpool::config::PoolTuning;
use renderpool::engine::{
    BrowserEngine, EngineError, EngineResult, PageHandle, ProcessHandle,
};
use renderpool::pool::{PoolError, PoolResult, ResourceFactory};
use renderpool::LaunchSettings;

pub struct MockPage {
    target: String,
    closed: AtomicBool,
    navigations: Mutex<Vec<String>>,
    storage_clears: AtomicUsize,
}

impl MockPage {
    fn new(target: String) -> Self {
        Self {
            target,
            closed: AtomicBool::new(false),
            navigations: Mutex::new(Vec::new()),
            storage_clears: AtomicUsize::new(0),
        }
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().clone()
    }

    pub fn storage_clears(&self) -> usize {
        self.storage_clears.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageHandle for MockPage {
    fn target_id(&self) -> &str {
        &self.target
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn navigate(&self, url: &str) -> EngineResult<()> {
        self.navigations.lock().push(url.to_string());
        Ok(())
    }

    async fn clear_storage(&self) -> EngineResult<()> {
        self.storage_clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn screenshot(&self) -> EngineResult<Vec<u8>> {
        Ok(b"\x89PNG".to_vec())
    }

    async fn pdf(&self) -> EngineResult<Vec<u8>> {
        Ok(b"%PDF-".to_vec())
    }

    async fn close(&self) -> EngineResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockProcess {
    pub serial: usize,
    connected: AtomicBool,
    closed: AtomicBool,
    fail_close: AtomicBool,
    close_calls: AtomicUsize,
    pages: Mutex<Vec<Arc<MockPage>>>,
    next_target: AtomicUsize,
    cookie_clears: AtomicUsize,
    permission_clears: AtomicUsize,
}

impl MockProcess {
    fn new(serial: usize) -> Self {
        Self {
            serial,
            connected: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            fail_close: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            pages: Mutex::new(Vec::new()),
            next_target: AtomicUsize::new(0),
            cookie_clears: AtomicUsize::new(0),
            permission_clears: AtomicUsize::new(0),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn fail_next_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }

    /// Times `close` has been invoked, successful or not.
    pub fn close_count(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn cookie_clears(&self) -> usize {
        self.cookie_clears.load(Ordering::SeqCst)
    }

    pub fn permission_clears(&self) -> usize {
        self.permission_clears.load(Ordering::SeqCst)
    }

    /// Pages opened on this process that have not been closed.
    pub fn live_pages(&self) -> Vec<Arc<MockPage>> {
        self.pages
            .lock()
            .iter()
            .filter(|p| !p.is_closed())
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ProcessHandle for MockProcess {
    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.closed.load(Ordering::SeqCst)
    }

    async fn open_page(&self) -> EngineResult<Arc<dyn PageHandle>> {
        if !self.is_connected().await {
            return Err(EngineError::Protocol("process disconnected".into()));
        }
        let target = format!(
            "target-{}-{}",
            self.serial,
            self.next_target.fetch_add(1, Ordering::SeqCst)
        );
        let page = Arc::new(MockPage::new(target));
        self.pages.lock().push(Arc::clone(&page));
        Ok(page)
    }

    async fn open_pages(&self) -> EngineResult<Vec<Arc<dyn PageHandle>>> {
        Ok(self
            .live_pages()
            .into_iter()
            .map(|p| p as Arc<dyn PageHandle>)
            .collect())
    }

    async fn clear_cookies(&self) -> EngineResult<()> {
        self.cookie_clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear_permissions(&self) -> EngineResult<()> {
        self.permission_clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> EngineResult<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_close.swap(false, Ordering::SeqCst) {
            return Err(EngineError::Protocol("close refused".into()));
        }
        self.closed.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory engine; every launch records the process so tests can reach
/// in and flip its connectivity or inspect its pages.
#[derive(Default)]
pub struct MockEngine {
    processes: Mutex<Vec<Arc<MockProcess>>>,
    persistent_dirs: Mutex<Vec<PathBuf>>,
    fail_next_launch: AtomicBool,
    next_serial: AtomicUsize,
}

/// Install a test-writer subscriber once; RUST_LOG controls verbosity.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        init_tracing();
        Arc::new(Self::default())
    }

    pub fn fail_next_launch(&self) {
        self.fail_next_launch.store(true, Ordering::SeqCst);
    }

    pub fn launch_count(&self) -> usize {
        self.processes.lock().len()
    }

    pub fn processes(&self) -> Vec<Arc<MockProcess>> {
        self.processes.lock().clone()
    }

    pub fn process(&self, index: usize) -> Arc<MockProcess> {
        self.processes.lock()[index].clone()
    }

    pub fn persistent_dirs(&self) -> Vec<PathBuf> {
        self.persistent_dirs.lock().clone()
    }

    fn spawn(&self) -> EngineResult<Arc<dyn ProcessHandle>> {
        if self.fail_next_launch.swap(false, Ordering::SeqCst) {
            return Err(EngineError::Launch("injected launch failure".into()));
        }
        let serial = self.next_serial.fetch_add(1, Ordering::SeqCst);
        let process = Arc::new(MockProcess::new(serial));
        self.processes.lock().push(Arc::clone(&process));
        Ok(process)
    }
}

#[async_trait]
impl BrowserEngine for MockEngine {
    async fn launch(&self, _launch: &LaunchSettings) -> EngineResult<Arc<dyn ProcessHandle>> {
        self.spawn()
    }

    async fn launch_persistent(
        &self,
        _launch: &LaunchSettings,
        user_data_dir: &Path,
    ) -> EngineResult<Arc<dyn ProcessHandle>> {
        let process = self.spawn()?;
        self.persistent_dirs.lock().push(user_data_dir.to_path_buf());
        Ok(process)
    }
}

#[derive(Debug)]
pub struct TestResource {
    pub serial: usize,
}

/// Counting factory for exercising the generic pool on its own.
#[derive(Default)]
pub struct TestFactory {
    made: AtomicUsize,
    destroyed: AtomicUsize,
    activations: AtomicUsize,
    passivations: AtomicUsize,
    fail_make: AtomicBool,
    fail_validate: AtomicBool,
    fail_passivate: AtomicBool,
}

impl TestFactory {
    pub fn made(&self) -> usize {
        self.made.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    pub fn passivations(&self) -> usize {
        self.passivations.load(Ordering::SeqCst)
    }

    pub fn fail_next_make(&self) {
        self.fail_make.store(true, Ordering::SeqCst);
    }

    pub fn set_fail_validate(&self, fail: bool) {
        self.fail_validate.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_passivate(&self, fail: bool) {
        self.fail_passivate.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ResourceFactory for TestFactory {
    type Resource = TestResource;

    async fn make(&self) -> PoolResult<TestResource> {
        if self.fail_make.swap(false, Ordering::SeqCst) {
            return Err(PoolError::CreationFailed(EngineError::Launch(
                "injected make failure".into(),
            )));
        }
        let serial = self.made.fetch_add(1, Ordering::SeqCst);
        Ok(TestResource { serial })
    }

    async fn activate(&self, _resource: &mut TestResource) -> PoolResult<()> {
        self.activations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn passivate(&self, _resource: &mut TestResource) -> PoolResult<()> {
        self.passivations.fetch_add(1, Ordering::SeqCst);
        if self.fail_passivate.load(Ordering::SeqCst) {
            return Err(PoolError::ResetFailed(EngineError::Protocol(
                "injected passivate failure".into(),
            )));
        }
        Ok(())
    }

    async fn validate(&self, _resource: &TestResource) -> bool {
        !self.fail_validate.load(Ordering::SeqCst)
    }

    async fn destroy(&self, _resource: TestResource) -> PoolResult<()> {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Tuning with short waits and the background evictor disabled, so tests
/// drive eviction explicitly.
pub fn fast_tuning(max_total: usize) -> PoolTuning {
    PoolTuning {
        max_total,
        max_idle: max_total,
        max_wait: Duration::from_millis(200),
        time_between_eviction_runs: None,
        ..PoolTuning::default()
    }
}
