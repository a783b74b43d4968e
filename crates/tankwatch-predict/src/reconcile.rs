//! Forecast store reconciliation.

use tracing::debug;

use tankwatch_core::{Prediction, PredictionStatus};
use tankwatch_state::{ForecastStore, StateResult, UpsertOutcome};

/// What happened to a freshly computed prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The prediction was handed to the store.
    Stored(UpsertOutcome),
    /// The prediction carried no forecast and the store was left alone.
    Skipped(PredictionStatus),
}

/// Persist `prediction` if it is a successful forecast.
///
/// Sentinel predictions never replace a previously stored forecast.
pub fn reconcile<F>(store: &F, prediction: &Prediction) -> StateResult<Reconciliation>
where
    F: ForecastStore + ?Sized,
{
    if !prediction.status.is_success() {
        debug!(
            container = %prediction.container_id,
            status = ?prediction.status,
            "forecast not stored"
        );
        return Ok(Reconciliation::Skipped(prediction.status));
    }
    let outcome = store.upsert(prediction)?;
    Ok(Reconciliation::Stored(outcome))
}
