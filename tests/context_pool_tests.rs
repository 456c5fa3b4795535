//! Context pool behavior against the mock engine: process lifecycle,
//! session reset on return, persistent profile directories, and registry
//! teardown.

mod common;

use std::sync::Arc;

use renderpool::pool::{ContextFactory, GenericPool};
use renderpool::{BrowserEngine, BrowserMode, PoolSettings};

use common::{MockEngine, fast_tuning};

fn context_pool(
    engine: &Arc<MockEngine>,
    settings: PoolSettings,
    max_total: usize,
) -> Arc<GenericPool<ContextFactory>> {
    let factory = ContextFactory::new(Arc::clone(engine) as Arc<dyn BrowserEngine>, settings);
    GenericPool::new(factory, fast_tuning(max_total))
}

#[tokio::test]
async fn borrow_launches_one_process_and_reuses_it() {
    let engine = MockEngine::new();
    let pool = context_pool(&engine, PoolSettings::default(), 2);

    let ctx = pool.borrow().await.expect("borrow");
    assert_eq!(engine.launch_count(), 1);
    let id = ctx.id();
    pool.return_resource(ctx).await;

    let again = pool.borrow().await.expect("borrow again");
    assert_eq!(again.id(), id);
    assert_eq!(engine.launch_count(), 1, "healthy context must be reused");
    pool.return_resource(again).await;
}

#[tokio::test]
async fn invalidate_closes_the_backing_process() {
    let engine = MockEngine::new();
    let pool = context_pool(&engine, PoolSettings::default(), 2);

    let ctx = pool.borrow().await.expect("borrow");
    pool.invalidate(ctx).await;

    assert!(engine.process(0).is_closed());
    assert_eq!(pool.factory().process_count(), 0);
    assert!(
        engine.process(0).permission_clears() >= 1,
        "destroy clears permission grants while the process is reachable"
    );
}

#[tokio::test]
async fn disconnected_idle_context_is_replaced_on_borrow() {
    let engine = MockEngine::new();
    let pool = context_pool(&engine, PoolSettings::default(), 2);

    let ctx = pool.borrow().await.expect("borrow");
    pool.return_resource(ctx).await;
    engine.process(0).set_connected(false);

    let fresh = pool.borrow().await.expect("borrow");
    assert_eq!(engine.launch_count(), 2, "dead context must be replaced");
    assert!(engine.process(0).is_closed(), "dead process must be torn down");
    pool.return_resource(fresh).await;
}

#[tokio::test]
async fn return_closes_stray_pages_and_clears_session_state() {
    let engine = MockEngine::new();
    let pool = context_pool(&engine, PoolSettings::default(), 2);

    let ctx = pool.borrow().await.expect("borrow");
    ctx.open_page().await.expect("open page");
    ctx.open_page().await.expect("open page");
    let process = engine.process(0);
    assert_eq!(process.live_pages().len(), 2);

    pool.return_resource(ctx).await;

    assert!(process.live_pages().is_empty(), "stray pages must be closed on return");
    // One clear from borrow-time activation, one from the return.
    assert_eq!(process.cookie_clears(), 2);
}

#[tokio::test]
async fn persistent_mode_provisions_and_removes_profile_dir() {
    let engine = MockEngine::new();
    let root = tempfile::tempdir().expect("tempdir");
    let settings = PoolSettings::builder()
        .browser_mode(BrowserMode::Persistent)
        .user_data_root(root.path())
        .build();
    let pool = context_pool(&engine, settings, 2);

    let ctx = pool.borrow().await.expect("borrow");
    let dirs = engine.persistent_dirs();
    assert_eq!(dirs.len(), 1);
    assert!(dirs[0].starts_with(root.path()));
    assert!(dirs[0].is_dir());

    pool.invalidate(ctx).await;
    assert!(!dirs[0].exists(), "profile dir must be removed with its context");
}

#[tokio::test]
async fn second_destroy_of_a_context_is_a_noop() {
    let engine = MockEngine::new();
    let root = tempfile::tempdir().expect("tempdir");
    let settings = PoolSettings::builder()
        .browser_mode(BrowserMode::Persistent)
        .user_data_root(root.path())
        .build();
    let pool = context_pool(&engine, settings, 2);

    let ctx = pool.borrow().await.expect("borrow");
    pool.invalidate(ctx).await;
    assert!(engine.process(0).is_closed());
    assert_eq!(engine.process(0).close_count(), 1);

    // The registry entry is gone, so a later sweep must not close the
    // process (or touch its directory) again.
    pool.factory().close_all().await;
    assert_eq!(engine.process(0).close_count(), 1);
    assert_eq!(pool.factory().process_count(), 0);
    assert!(!engine.persistent_dirs()[0].exists());
}

#[tokio::test]
async fn close_all_tears_down_unreturned_contexts() {
    let engine = MockEngine::new();
    let pool = context_pool(&engine, PoolSettings::default(), 2);

    let held = pool.borrow().await.expect("borrow held");
    let idle = pool.borrow().await.expect("borrow idle");
    pool.return_resource(idle).await;

    // One context is idle, one never comes back. Simulate shutdown.
    pool.close().await;
    pool.factory().close_all().await;

    for process in engine.processes() {
        assert!(process.is_closed(), "every process must be closed at shutdown");
    }
    assert_eq!(pool.factory().process_count(), 0);
    drop(held);
}

#[tokio::test]
async fn close_all_keeps_going_past_a_failing_close() {
    let engine = MockEngine::new();
    let pool = context_pool(&engine, PoolSettings::default(), 2);

    let a = pool.borrow().await.expect("borrow a");
    let b = pool.borrow().await.expect("borrow b");
    engine.process(0).fail_next_close();

    pool.factory().close_all().await;

    assert!(
        engine.process(1).is_closed(),
        "a failed close must not stop the teardown sweep"
    );
    assert_eq!(pool.factory().process_count(), 0);
    drop((a, b));
}
