//! tankwatch-state — durable storage for readings and forecasts.
//!
//! Backed by [redb](https://docs.rs/redb). Two logical stores share one
//! database file:
//!
//! - the **reading store**, an append-only log of sensor readings keyed by
//!   `{container_id}:{sequence}`;
//! - the **forecast store**, exactly one `Prediction` per container keyed by
//!   `{container_id}`.
//!
//! Both are exposed as traits ([`ReadingStore`], [`ForecastStore`]) so the
//! prediction pipeline can run against test doubles. [`StateStore`] is the
//! redb implementation; it is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Database>`) and can be shared across tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod traits;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use traits::{ForecastStore, ReadingStore, UpsertOutcome};
