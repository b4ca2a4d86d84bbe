use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::notification::model::{NotificationError, NotificationSnapshot};
use crate::notification::service::{LoadOutcome, NotificationScreen, ScreenRegistry};

/// Error body for notification endpoints
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "Screen not found")]
    pub error: String,
    #[schema(example = "SCREEN_NOT_FOUND")]
    pub code: String,
}

/// A freshly activated screen and its first snapshot
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ScreenResponse {
    #[schema(value_type = String, example = "0b6f6c1e-3f2a-4d1b-9a57-2c8e1f4d7a90")]
    pub screen_id: Uuid,
    pub snapshot: NotificationSnapshot,
}

type ApiResult<T> = Result<T, (StatusCode, Json<ErrorResponse>)>;

// Map a NotificationError to the HTTP error body. Load failures never get
// here, they are reported through the snapshot notice.
fn notification_error_to_response(err: NotificationError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, error_message, code) = match err {
        NotificationError::ScreenNotFound => {
            (StatusCode::NOT_FOUND, "Screen not found", "SCREEN_NOT_FOUND")
        }
        other => {
            error!("Unexpected notification error: {}", other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                "INTERNAL_SERVER_ERROR",
            )
        }
    };

    (
        status,
        Json(ErrorResponse {
            error: error_message.to_string(),
            code: code.to_string(),
        }),
    )
}

fn find_screen(
    registry: &ScreenRegistry,
    screen_id: &Uuid,
) -> ApiResult<Arc<NotificationScreen>> {
    registry.get(screen_id).map_err(notification_error_to_response)
}

/// Activate a notification screen
///
/// Creates a screen, loads its notifications and returns the first snapshot.
/// A failed fetch still activates the screen; the snapshot is empty and
/// carries a notice.
#[utoipa::path(
    post,
    path = "/api/screens",
    tag = "notifications",
    responses(
        (status = 201, description = "Screen activated", body = ScreenResponse)
    )
)]
pub async fn activate_screen(State(registry): State<Arc<ScreenRegistry>>) -> impl IntoResponse {
    let screen = registry.activate();
    let snapshot = match screen.load().await {
        LoadOutcome::Applied(snapshot) | LoadOutcome::Failed(snapshot, _) => snapshot,
        LoadOutcome::Discarded => screen.snapshot(),
    };

    (
        StatusCode::CREATED,
        Json(ScreenResponse {
            screen_id: screen.id(),
            snapshot,
        }),
    )
}

/// Get the current notification snapshot of a screen
#[utoipa::path(
    get,
    path = "/api/screens/{id}/notifications",
    tag = "notifications",
    params(
        ("id" = String, Path, description = "Screen identifier")
    ),
    responses(
        (status = 200, description = "Current snapshot", body = NotificationSnapshot),
        (status = 404, description = "Screen not found", body = ErrorResponse)
    )
)]
pub async fn get_notifications(
    Path(screen_id): Path<Uuid>,
    State(registry): State<Arc<ScreenRegistry>>,
) -> ApiResult<Json<NotificationSnapshot>> {
    let screen = find_screen(&registry, &screen_id)?;
    Ok(Json(screen.snapshot()))
}

/// Reload the notifications of a screen
///
/// Replaces the list with a fresh fetch. Fetch failures are not errors here:
/// the list is emptied and the snapshot's `notice` explains why.
#[utoipa::path(
    post,
    path = "/api/screens/{id}/notifications/load",
    tag = "notifications",
    params(
        ("id" = String, Path, description = "Screen identifier")
    ),
    responses(
        (status = 200, description = "Snapshot after the load", body = NotificationSnapshot),
        (status = 404, description = "Screen not found", body = ErrorResponse)
    )
)]
pub async fn load_notifications(
    Path(screen_id): Path<Uuid>,
    State(registry): State<Arc<ScreenRegistry>>,
) -> ApiResult<Json<NotificationSnapshot>> {
    let screen = find_screen(&registry, &screen_id)?;

    match screen.load().await {
        LoadOutcome::Applied(snapshot) => Ok(Json(snapshot)),
        LoadOutcome::Failed(snapshot, e) => {
            info!("Reporting failed load on screen {}: {}", screen_id, e);
            Ok(Json(snapshot))
        }
        LoadOutcome::Discarded if screen.is_torn_down() => Err(
            notification_error_to_response(NotificationError::ScreenNotFound),
        ),
        LoadOutcome::Discarded => Ok(Json(screen.snapshot())),
    }
}

/// Mark one notification as read
///
/// Unknown notification ids are ignored so stale list rows never fail.
#[utoipa::path(
    post,
    path = "/api/screens/{id}/notifications/{notification_id}/read",
    tag = "notifications",
    params(
        ("id" = String, Path, description = "Screen identifier"),
        ("notification_id" = i64, Path, description = "Notification to mark as read")
    ),
    responses(
        (status = 200, description = "Snapshot after the update", body = NotificationSnapshot),
        (status = 404, description = "Screen not found", body = ErrorResponse)
    )
)]
pub async fn mark_notification_read(
    Path((screen_id, notification_id)): Path<(Uuid, i64)>,
    State(registry): State<Arc<ScreenRegistry>>,
) -> ApiResult<Json<NotificationSnapshot>> {
    let screen = find_screen(&registry, &screen_id)?;
    Ok(Json(screen.mark_as_read(notification_id)))
}

/// Clear every notification on a screen
#[utoipa::path(
    delete,
    path = "/api/screens/{id}/notifications",
    tag = "notifications",
    params(
        ("id" = String, Path, description = "Screen identifier")
    ),
    responses(
        (status = 200, description = "Empty snapshot", body = NotificationSnapshot),
        (status = 404, description = "Screen not found", body = ErrorResponse)
    )
)]
pub async fn clear_notifications(
    Path(screen_id): Path<Uuid>,
    State(registry): State<Arc<ScreenRegistry>>,
) -> ApiResult<Json<NotificationSnapshot>> {
    let screen = find_screen(&registry, &screen_id)?;
    Ok(Json(screen.clear_all()))
}

/// Tear down a screen
#[utoipa::path(
    delete,
    path = "/api/screens/{id}",
    tag = "notifications",
    params(
        ("id" = String, Path, description = "Screen identifier")
    ),
    responses(
        (status = 204, description = "Screen torn down"),
        (status = 404, description = "Screen not found", body = ErrorResponse)
    )
)]
pub async fn teardown_screen(
    Path(screen_id): Path<Uuid>,
    State(registry): State<Arc<ScreenRegistry>>,
) -> ApiResult<StatusCode> {
    registry
        .teardown(&screen_id)
        .map_err(notification_error_to_response)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let (status, Json(body)) =
            notification_error_to_response(NotificationError::ScreenNotFound);
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.code, "SCREEN_NOT_FOUND");

        for err in [
            NotificationError::NotFound,
            NotificationError::DuplicateId(4),
            NotificationError::Timeout(std::time::Duration::from_secs(1)),
            NotificationError::InternalError("boom".to_string()),
        ] {
            let (status, Json(body)) = notification_error_to_response(err);
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body.code, "INTERNAL_SERVER_ERROR");
            assert_eq!(body.error, "Internal server error");
        }
    }
}
