//! IngestCoordinator — store a reading, recompute, reconcile.
//!
//! The reading is the durable source of truth; the forecast is a derived
//! cache that can always be rebuilt from the reading store. Ingests for
//! the same container are serialized, so each forecast write sees every
//! reading appended before it. Different containers never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use tankwatch_core::clock::normalize;
use tankwatch_core::{Clock, Prediction, Reading, Timestamp};
use tankwatch_state::{ForecastStore, ReadingStore, StateResult, UpsertOutcome};

use crate::engine::PredictionEngine;
use crate::error::{PredictError, PredictResult};
use crate::reconcile::{Reconciliation, reconcile};

/// Counts from a full forecast rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildSummary {
    pub containers: usize,
    pub inserted: usize,
    pub updated: usize,
    /// No positive readings, nothing to store.
    pub skipped: usize,
}

impl RebuildSummary {
    fn record(&mut self, reconciliation: Reconciliation) {
        self.containers += 1;
        match reconciliation {
            Reconciliation::Stored(UpsertOutcome::Inserted) => self.inserted += 1,
            Reconciliation::Stored(UpsertOutcome::Updated) => self.updated += 1,
            Reconciliation::Skipped(_) => self.skipped += 1,
        }
    }
}

/// Drives the ingest pipeline and the query operations over a store.
pub struct IngestCoordinator<S> {
    store: S,
    engine: PredictionEngine,
    clock: Arc<dyn Clock>,
    /// Per-container ingest locks: container_id → lock. An entry lives only
    /// while some caller holds or waits on it.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S> IngestCoordinator<S>
where
    S: ReadingStore + ForecastStore,
{
    pub fn new(store: S, engine: PredictionEngine, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            engine,
            clock,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn engine(&self) -> &PredictionEngine {
        &self.engine
    }

    /// Current instant from the coordinator's clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Store a reading stamped `now`, then refresh the container's forecast.
    pub fn record_and_predict(
        &self,
        container_id: &str,
        value: f64,
        now: Timestamp,
    ) -> PredictResult<Prediction> {
        let timestamp = normalize(now, self.engine.config().timezone);
        self.ingest(Reading::new(container_id, value, timestamp), now)
    }

    /// [`record_and_predict`](Self::record_and_predict) at the clock's current instant.
    pub fn record(&self, container_id: &str, value: f64) -> PredictResult<Prediction> {
        self.record_and_predict(container_id, value, self.clock.now())
    }

    /// Store a reading taken at an earlier `timestamp` (a sensor flushing its
    /// buffer), then refresh the forecast as of now.
    pub fn record_at(
        &self,
        container_id: &str,
        value: f64,
        timestamp: Timestamp,
    ) -> PredictResult<Prediction> {
        let timestamp = normalize(timestamp, self.engine.config().timezone);
        self.ingest(Reading::new(container_id, value, timestamp), self.clock.now())
    }

    /// Recompute a container's forecast without touching the store.
    pub fn current_prediction(&self, container_id: &str, now: Timestamp) -> PredictResult<Prediction> {
        let readings = self.store.list_ascending_by_time(container_id)?;
        Ok(self.engine.predict(container_id, &readings, now))
    }

    /// The stored forecast table, most recently computed first.
    pub fn forecasts(&self) -> PredictResult<Vec<Prediction>> {
        Ok(self.store.list_all()?)
    }

    /// Recompute and reconcile every container with stored readings.
    pub fn rebuild_forecasts(&self, now: Timestamp) -> PredictResult<RebuildSummary> {
        let mut summary = RebuildSummary::default();
        for container_id in self.store.list_container_ids()? {
            let (_, reconciliation) =
                self.with_container_lock(&container_id, || self.refresh(&container_id, now))?;
            summary.record(reconciliation);
        }
        info!(
            containers = summary.containers,
            inserted = summary.inserted,
            updated = summary.updated,
            skipped = summary.skipped,
            "forecasts rebuilt"
        );
        Ok(summary)
    }

    fn ingest(&self, reading: Reading, now: Timestamp) -> PredictResult<Prediction> {
        let container_id = reading.container_id.clone();
        self.with_container_lock(&container_id, || self.ingest_locked(reading, now))
    }

    fn ingest_locked(&self, reading: Reading, now: Timestamp) -> PredictResult<Prediction> {
        self.store.append(&reading)?;

        match self.refresh(&reading.container_id, now) {
            Ok((prediction, reconciliation)) => {
                debug!(
                    container = %reading.container_id,
                    value = reading.value,
                    ?reconciliation,
                    "reading ingested"
                );
                if prediction.is_empty() {
                    info!(container = %reading.container_id, "container reported empty");
                }
                Ok(prediction)
            }
            Err(source) => {
                warn!(
                    container = %reading.container_id,
                    error = %source,
                    "reading stored but forecast refresh failed"
                );
                Err(PredictError::Forecast {
                    container_id: reading.container_id,
                    source,
                })
            }
        }
    }

    fn refresh(&self, container_id: &str, now: Timestamp) -> StateResult<(Prediction, Reconciliation)> {
        let readings = self.store.list_ascending_by_time(container_id)?;
        let prediction = self.engine.predict(container_id, &readings, now);
        let reconciliation = reconcile(&self.store, &prediction)?;
        Ok((prediction, reconciliation))
    }

    /// Run `f` while holding the container's ingest lock.
    fn with_container_lock<T>(&self, container_id: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.container_lock(container_id);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        self.release_lock(container_id, lock);
        result
    }

    fn container_lock(&self, container_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(container_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the caller's handle and forget the lock once nobody else holds it.
    /// Handles are only cloned under the map lock, so the count is exact.
    fn release_lock(&self, container_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        drop(lock);
        if locks
            .get(container_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(container_id);
        }
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
