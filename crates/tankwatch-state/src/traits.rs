//! Store interfaces consumed by the prediction pipeline.

use tankwatch_core::{Prediction, Reading};

use crate::error::StateResult;

/// Append-only log of sensor readings.
pub trait ReadingStore: Send + Sync {
    /// Persist one reading. The reading is durable once this returns `Ok`.
    fn append(&self, reading: &Reading) -> StateResult<()>;

    /// All readings for one container, oldest first. Readings sharing a
    /// timestamp keep their append order.
    fn list_ascending_by_time(&self, container_id: &str) -> StateResult<Vec<Reading>>;

    /// Every container that has at least one stored reading.
    fn list_container_ids(&self) -> StateResult<Vec<String>>;
}

/// Result of writing a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No forecast existed for the container.
    Inserted,
    /// The existing forecast was replaced.
    Updated,
}

/// One current forecast per container.
pub trait ForecastStore: Send + Sync {
    fn exists(&self, container_id: &str) -> StateResult<bool>;

    fn get_prediction(&self, container_id: &str) -> StateResult<Option<Prediction>>;

    /// Insert the forecast, or replace the stored one in full.
    ///
    /// The existence check and the write must be atomic per container. The
    /// last write wins; callers order writes for a container themselves.
    fn upsert(&self, prediction: &Prediction) -> StateResult<UpsertOutcome>;

    /// All forecasts, most recently computed first.
    fn list_all(&self) -> StateResult<Vec<Prediction>>;
}
