//! Intake API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Layer stack (outermost → innermost):
//! 1. CORS → 2. Access log

use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::interview::InterviewEngine;

/// Build the intake API router.
pub fn intake_api_router(engine: Arc<InterviewEngine>) -> Router {
    build_router(ApiContext::new(engine))
}

fn build_router(ctx: ApiContext) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/consultations", post(endpoints::consultations::create))
        .route(
            "/consultations/:id",
            axum::routing::delete(endpoints::consultations::end),
        )
        .route(
            "/consultations/:id/messages",
            post(endpoints::consultations::send_message),
        )
        .route(
            "/consultations/:id/report",
            get(endpoints::consultations::report),
        )
        .route(
            "/consultations/:id/urgency",
            post(endpoints::consultations::override_urgency),
        )
        .with_state(ctx);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .nest("/api", api)
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(cors)
}
