//! Settings defaults and builder behavior.

use std::time::Duration;

use renderpool::{BrowserMode, PoolSettings};

#[test]
fn defaults_are_incognito_with_validation_on_borrow() {
    let settings = PoolSettings::default();
    assert_eq!(settings.browser_mode, BrowserMode::Incognito);
    assert!(settings.launch.headless);
    assert!(settings.context_pool.test_on_borrow);
    assert!(settings.context_pool.block_when_exhausted);
    assert_eq!(settings.context_pool.max_total, 8);
    assert_eq!(settings.page_pool.max_total, 8);
}

#[test]
fn builder_caps_clamp_max_idle() {
    let settings = PoolSettings::builder()
        .max_contexts(2)
        .max_pages(4)
        .max_wait(Duration::from_secs(5))
        .build();
    assert_eq!(settings.context_pool.max_total, 2);
    assert!(settings.context_pool.max_idle <= 2);
    assert_eq!(settings.page_pool.max_total, 4);
    assert_eq!(settings.page_pool.max_wait, Duration::from_secs(5));
}

#[test]
fn browser_mode_deserializes_lowercase() {
    let mode: BrowserMode = serde_json::from_str("\"persistent\"").expect("parse");
    assert_eq!(mode, BrowserMode::Persistent);
}

#[test]
fn effective_user_data_root_falls_back_to_temp() {
    let settings = PoolSettings::default();
    assert_eq!(settings.effective_user_data_root(), std::env::temp_dir());

    let settings = PoolSettings::builder().user_data_root("/srv/profiles").build();
    assert_eq!(
        settings.effective_user_data_root(),
        std::path::PathBuf::from("/srv/profiles")
    );
}
