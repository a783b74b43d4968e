//! REST API handlers.
//!
//! Each handler calls into the `IngestCoordinator` and returns JSON
//! responses. Store calls are short redb transactions and run inline.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::Value;
use tracing::{debug, warn};

use tankwatch_core::Timestamp;
use tankwatch_core::clock::parse_timestamp;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

// ── Ingestion ──────────────────────────────────────────────────

/// A validated sensor payload.
#[derive(Debug, PartialEq)]
pub struct SensorSample {
    pub galon: String,
    pub value: f64,
    /// Present when the sensor replays a buffered reading.
    pub timestamp: Option<Timestamp>,
}

/// Why a sensor payload was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    /// `galon` or `value` is missing or null.
    Format,
    /// `galon` is not a non-empty string or `value` is not a number.
    Types,
    /// `timestamp` is present but unreadable.
    Timestamp,
}

impl PayloadError {
    fn message(self) -> &'static str {
        match self {
            PayloadError::Format => "invalid data format",
            PayloadError::Types => "invalid data types",
            PayloadError::Timestamp => "invalid timestamp",
        }
    }
}

/// Validate a raw `/data` body.
pub fn parse_sample(body: &Value, timezone: chrono_tz::Tz) -> Result<SensorSample, PayloadError> {
    let field = |name: &str| body.get(name).filter(|v| !v.is_null());

    let (Some(galon), Some(value)) = (field("galon"), field("value")) else {
        return Err(PayloadError::Format);
    };
    let (Some(galon), Some(value)) = (galon.as_str(), value.as_f64()) else {
        return Err(PayloadError::Types);
    };
    if galon.is_empty() {
        return Err(PayloadError::Types);
    }

    let timestamp = match field("timestamp") {
        Some(raw) => {
            let raw = raw.as_str().ok_or(PayloadError::Timestamp)?;
            Some(parse_timestamp(raw, timezone).map_err(|_| PayloadError::Timestamp)?)
        }
        None => None,
    };

    Ok(SensorSample {
        galon: galon.to_string(),
        value,
        timestamp,
    })
}

/// POST /data
pub async fn receive_data(
    State(state): State<ApiState>,
    body: Result<Json<Value>, JsonRejection>,
) -> impl IntoResponse {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            debug!(error = %rejection, "unreadable sensor payload");
            return error_response(PayloadError::Format.message(), StatusCode::BAD_REQUEST)
                .into_response();
        }
    };

    let coordinator = &state.coordinator;
    let sample = match parse_sample(&body, coordinator.engine().config().timezone) {
        Ok(sample) => sample,
        Err(e) => return error_response(e.message(), StatusCode::BAD_REQUEST).into_response(),
    };

    let result = match sample.timestamp {
        Some(ts) => coordinator.record_at(&sample.galon, sample.value, ts),
        None => coordinator.record(&sample.galon, sample.value),
    };

    match result {
        Ok(prediction) => ApiResponse::ok(prediction).into_response(),
        Err(e) => {
            warn!(container = %sample.galon, reading_stored = e.reading_stored(), error = %e, "ingest failed");
            error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}

// ── Forecasts ──────────────────────────────────────────────────

/// GET /api/v1/containers/:id/prediction
pub async fn get_prediction(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let coordinator = &state.coordinator;
    match coordinator.current_prediction(&id, coordinator.now()) {
        Ok(prediction) => ApiResponse::ok(prediction).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/v1/predictions
pub async fn list_predictions(State(state): State<ApiState>) -> impl IntoResponse {
    match state.coordinator.forecasts() {
        Ok(predictions) => ApiResponse::ok(predictions).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /healthz
pub async fn healthz() -> &'static str {
    "ok"
}
