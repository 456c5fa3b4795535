//! Pool configuration
//!
//! Split into core types and a chainable builder. Settings are captured once
//! at construction; pools never observe later mutation.

pub mod builder;
pub mod types;

pub use builder::PoolSettingsBuilder;
pub use types::{BrowserMode, LaunchSettings, PoolSettings, PoolTuning};
