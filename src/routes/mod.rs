pub mod health;
pub mod notifications;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api_doc::ApiDoc;
use crate::notification::service::ScreenRegistry;

/// Full application router
pub fn app(registry: Arc<ScreenRegistry>) -> Router {
    Router::new()
        // API documentation
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(health::routes(registry.clone()))
        .merge(notifications::routes(registry))
        .route("/", get(|| async { "Welcome to the Snaazr notifications API" }))
        // The mobile client calls in from another origin
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}
