//! tankwatch-predict — depletion forecasting for water containers.
//!
//! Turns a container's reading history into a consumption rate and a
//! predicted empty time, and keeps the forecast store in step with the
//! reading store.
//!
//! # Forecast Algorithm
//!
//! ```text
//! positive = readings with value > 0
//! window   = positive readings newer than now - recent_window_hours
//!            (all positive readings if fewer than two are that recent)
//!
//! elapsed  = max(min_elapsed_hours, last(window) - first(window))
//! rate     = max(min_rate, sum(window) / elapsed)
//! total    = sum(positive)
//! remain   = max(0, capacity - total)
//!
//! if remain == 0:  empty at last(window), 0 hours left
//! else:            empty at now + remain / rate
//! ```
//!
//! The rate follows recent behaviour while the remaining volume accounts
//! for every reading since the container was full.
//!
//! # Pipeline
//!
//! ```text
//! IngestCoordinator::record_and_predict
//!   ├── ReadingStore::append          (durable, never rolled back)
//!   ├── PredictionEngine::predict     (pure)
//!   └── reconcile → ForecastStore::upsert   (Success only)
//! ```

pub mod coordinator;
pub mod engine;
pub mod error;
pub mod reconcile;

pub use coordinator::{IngestCoordinator, RebuildSummary};
pub use engine::PredictionEngine;
pub use error::{PredictError, PredictResult};
pub use reconcile::{Reconciliation, reconcile};
