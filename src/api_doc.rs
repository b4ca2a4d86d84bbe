use utoipa::OpenApi;

/// API documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Snaazr Notifications API",
        version = "0.1.0",
        description = "Notification screens for the Snaazr shopping app"
    ),
    paths(
        crate::routes::health::health_check,
        crate::notification::controller::activate_screen,
        crate::notification::controller::get_notifications,
        crate::notification::controller::load_notifications,
        crate::notification::controller::mark_notification_read,
        crate::notification::controller::clear_notifications,
        crate::notification::controller::teardown_screen
    ),
    components(
        schemas(
            crate::routes::health::HealthResponse,
            crate::notification::model::Category,
            crate::notification::model::NotificationRecord,
            crate::notification::model::NotificationSnapshot,
            crate::notification::controller::ScreenResponse,
            crate::notification::controller::ErrorResponse
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "notifications", description = "Notification screen endpoints")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_notification_paths() {
        let json = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let paths = json["paths"].as_object().unwrap();

        assert!(paths.contains_key("/api/screens"));
        assert!(paths.contains_key("/api/screens/{id}/notifications"));
        assert!(paths.contains_key("/api/screens/{id}/notifications/{notification_id}/read"));
        assert!(json["components"]["schemas"]
            .as_object()
            .unwrap()
            .contains_key("NotificationSnapshot"));
    }
}
