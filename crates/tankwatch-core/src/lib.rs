//! tankwatch-core — shared vocabulary for the tankwatch workspace.
//!
//! Holds the persisted domain types (`Reading`, `Prediction`), the
//! immutable `EngineConfig` consumed by the prediction engine, the
//! `tankwatch.toml` file format, and the clock/timezone helpers every
//! other crate uses to stamp and compare instants.

pub mod clock;
pub mod config;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock, TimeError};
pub use config::{ConfigError, EngineConfig, TankwatchConfig};
pub use types::*;
