//! Reference-image lock with rate limiting and a hold window.

mod config;
mod engine;

pub use config::{LockConfig, MIN_ANALYSIS_HEIGHT, MIN_ANALYSIS_WIDTH, MIN_POLL_INTERVAL_MS};
pub use engine::{LockEngine, LockError, ReferenceModel};
