use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use crate::notification::controller::{
    activate_screen, clear_notifications, get_notifications, load_notifications,
    mark_notification_read, teardown_screen,
};
use crate::notification::service::ScreenRegistry;
use crate::websocket::notifications::{screen_ws_handler, ws_handler};

/// Create a router for notification screens
pub fn routes(registry: Arc<ScreenRegistry>) -> Router {
    Router::new()
        .route("/api/screens", post(activate_screen))
        .route("/api/screens/:id", delete(teardown_screen))
        .route(
            "/api/screens/:id/notifications",
            get(get_notifications).delete(clear_notifications),
        )
        .route(
            "/api/screens/:id/notifications/load",
            post(load_notifications),
        )
        .route(
            "/api/screens/:id/notifications/:notification_id/read",
            post(mark_notification_read),
        )
        // Socket bound to an existing screen
        .route("/api/screens/:id/ws", get(screen_ws_handler))
        // Socket that owns a screen for the lifetime of the connection
        .route("/api/notifications/ws", get(ws_handler))
        .with_state(registry)
}
