//! Domain types shared by the store, the prediction engine and the API.
//!
//! Timestamps are always timezone-aware (`DateTime<FixedOffset>`) and are
//! serialized as RFC 3339 strings so the offset survives a round trip.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Identifier of a monitored container (the `galon` field on the wire).
pub type ContainerId = String;

/// A timezone-aware instant.
pub type Timestamp = DateTime<FixedOffset>;

// ── Reading ───────────────────────────────────────────────────────

/// One usage sample reported by a sensor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reading {
    pub container_id: ContainerId,
    /// Volume drawn since the previous reading. Non-positive values are
    /// sensor resets and are ignored by the engine.
    pub value: f64,
    pub timestamp: Timestamp,
}

impl Reading {
    pub fn new(container_id: impl Into<ContainerId>, value: f64, timestamp: Timestamp) -> Self {
        Self {
            container_id: container_id.into(),
            value,
            timestamp,
        }
    }

    /// Whether this reading counts towards consumption.
    pub fn is_positive(&self) -> bool {
        self.value.is_finite() && self.value > 0.0
    }
}

// ── Prediction ────────────────────────────────────────────────────

/// Outcome tag of a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStatus {
    Success,
    /// The container has no readings at all.
    NoData,
    /// The container only has zero or negative readings.
    NoPositiveData,
}

impl PredictionStatus {
    pub fn is_success(self) -> bool {
        matches!(self, PredictionStatus::Success)
    }
}

/// Depletion forecast for a single container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    pub container_id: ContainerId,
    pub capacity: f64,
    /// Sum of every positive reading ever recorded.
    pub cumulative_consumption: f64,
    pub consumption_rate_per_hour: f64,
    pub remaining_volume: f64,
    /// `+inf` when no rate is known; written as `null` in JSON.
    #[serde(with = "finite_or_null")]
    pub hours_to_empty: f64,
    pub predicted_empty_instant: Option<Timestamp>,
    pub last_reading_instant: Option<Timestamp>,
    pub computed_at: Timestamp,
    pub status: PredictionStatus,
}

impl Prediction {
    /// Sentinel prediction for a container without usable readings.
    pub fn unavailable(
        container_id: impl Into<ContainerId>,
        capacity: f64,
        status: PredictionStatus,
        computed_at: Timestamp,
    ) -> Self {
        Self {
            container_id: container_id.into(),
            capacity,
            cumulative_consumption: 0.0,
            consumption_rate_per_hour: 0.0,
            remaining_volume: capacity,
            hours_to_empty: f64::INFINITY,
            predicted_empty_instant: None,
            last_reading_instant: None,
            computed_at,
            status,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_success() && self.remaining_volume == 0.0
    }
}

/// Serde adapter mapping non-finite floats to `null` and back to `+inf`.
mod finite_or_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}
