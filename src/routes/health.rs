use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::notification::service::ScreenRegistry;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    message: String,
}

/// Public health check endpoint
///
/// Returns status "ok" if the service is running
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Server is healthy", body = HealthResponse),
    ),
    tag = "health"
)]
pub async fn health_check(State(registry): State<Arc<ScreenRegistry>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            message: format!(
                "Server is running with {} active notification screens and {} connection-owned screens",
                registry.len(),
                registry.owned_len()
            ),
        }),
    )
}

pub fn routes(registry: Arc<ScreenRegistry>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .with_state(registry)
}
