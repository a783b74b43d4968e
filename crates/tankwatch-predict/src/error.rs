//! Prediction pipeline error types.

use tankwatch_state::StateError;
use thiserror::Error;

/// Errors surfaced by the ingest and query operations.
#[derive(Debug, Error)]
pub enum PredictError {
    /// The store failed before anything was written.
    #[error("state store error: {0}")]
    State(#[from] StateError),

    /// The reading was stored, but recomputing its forecast failed.
    #[error("reading for {container_id} stored, forecast not updated: {source}")]
    Forecast {
        container_id: String,
        #[source]
        source: StateError,
    },
}

impl PredictError {
    /// Whether the triggering reading made it into the reading store.
    pub fn reading_stored(&self) -> bool {
        matches!(self, PredictError::Forecast { .. })
    }
}

pub type PredictResult<T> = Result<T, PredictError>;
