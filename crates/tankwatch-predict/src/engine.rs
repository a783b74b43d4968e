//! PredictionEngine — pure forecast computation.
//!
//! Given every stored reading of one container and the current instant,
//! produce a [`Prediction`]. Missing or unusable data yields a sentinel
//! prediction with a non-success status rather than an error.

use chrono::TimeDelta;
use tracing::debug;

use tankwatch_core::clock::normalize;
use tankwatch_core::{ConfigError, EngineConfig, Prediction, PredictionStatus, Reading, Timestamp};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Stateless forecaster configured once at construction.
#[derive(Debug, Clone)]
pub struct PredictionEngine {
    config: EngineConfig,
}

impl PredictionEngine {
    /// Create an engine, rejecting unusable settings.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Forecast depletion of `container_id` from its reading history.
    ///
    /// `readings` need not be sorted. All returned instants are expressed
    /// in the configured reference timezone.
    pub fn predict(&self, container_id: &str, readings: &[Reading], now: Timestamp) -> Prediction {
        let tz = self.config.timezone;
        let capacity = self.config.capacity;
        let now = normalize(now, tz);

        if readings.is_empty() {
            return Prediction::unavailable(container_id, capacity, PredictionStatus::NoData, now);
        }

        let mut positive: Vec<(Timestamp, f64)> = readings
            .iter()
            .filter(|r| r.is_positive())
            .map(|r| (normalize(r.timestamp, tz), r.value))
            .collect();

        if positive.is_empty() {
            return Prediction::unavailable(
                container_id,
                capacity,
                PredictionStatus::NoPositiveData,
                now,
            );
        }

        positive.sort_by_key(|(ts, _)| *ts);

        // `positive` is sorted, so the recent window is a suffix of it.
        let start = match hours_to_delta(self.config.recent_window_hours)
            .and_then(|window| now.checked_sub_signed(window))
        {
            Some(cutoff) => positive.partition_point(|(ts, _)| *ts < cutoff),
            None => 0,
        };
        let window = if positive.len() - start >= 2 {
            &positive[start..]
        } else {
            &positive[..]
        };

        let first = window[0].0;
        let last = window[window.len() - 1].0;

        let span_hours = (last - first).num_milliseconds() as f64 / MILLIS_PER_HOUR;
        let elapsed_hours = span_hours.max(self.config.min_elapsed_hours);

        let window_sum: f64 = window.iter().map(|(_, v)| v).sum();
        let rate = (window_sum / elapsed_hours).max(self.config.min_rate);

        let total: f64 = positive.iter().map(|(_, v)| v).sum();
        let remaining = (capacity - total).max(0.0);

        let (hours_to_empty, predicted_empty_instant) = if remaining == 0.0 {
            (0.0, Some(last))
        } else {
            let hours = remaining / rate;
            let instant = hours_to_delta(hours).and_then(|d| now.checked_add_signed(d));
            (hours, instant)
        };

        debug!(
            container = %container_id,
            window = window.len(),
            positive = positive.len(),
            rate,
            remaining,
            hours_to_empty,
            "forecast computed"
        );

        Prediction {
            container_id: container_id.to_string(),
            capacity,
            cumulative_consumption: total,
            consumption_rate_per_hour: rate,
            remaining_volume: remaining,
            hours_to_empty,
            predicted_empty_instant,
            last_reading_instant: Some(last),
            computed_at: now,
            status: PredictionStatus::Success,
        }
    }
}

/// Convert fractional hours into a `TimeDelta`, `None` if out of range.
fn hours_to_delta(hours: f64) -> Option<TimeDelta> {
    let millis = (hours * MILLIS_PER_HOUR).round();
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return None;
    }
    TimeDelta::try_milliseconds(millis as i64)
}
