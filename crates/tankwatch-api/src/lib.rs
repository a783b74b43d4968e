//! tankwatch-api — REST API for tankwatch.
//!
//! Thin axum layer over [`IngestCoordinator`]. Validates sensor payloads
//! before they reach the core and maps core results onto JSON responses.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/data` | Record a sensor reading (`{"galon": "...", "value": 1.5}`) |
//! | GET | `/api/v1/containers/:id/prediction` | Live forecast for one container |
//! | GET | `/api/v1/predictions` | Stored forecasts, newest first |
//! | GET | `/healthz` | Liveness probe |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tankwatch_predict::IngestCoordinator;
use tankwatch_state::StateStore;

/// Coordinator over the redb store, as served by the daemon.
pub type Coordinator = IngestCoordinator<StateStore>;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub coordinator: Arc<Coordinator>,
}

/// Build the complete API router.
pub fn build_router(coordinator: Arc<Coordinator>) -> Router {
    let api_state = ApiState { coordinator };

    let api_routes = Router::new()
        .route("/containers/{id}/prediction", get(handlers::get_prediction))
        .route("/predictions", get(handlers::list_predictions))
        .with_state(api_state.clone());

    Router::new()
        .route("/data", post(handlers::receive_data).with_state(api_state))
        .route("/healthz", get(handlers::healthz))
        .nest("/api/v1", api_routes)
}
