use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::{sync::mpsc, time};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::notification::model::{NotificationError, NotificationSnapshot};
use crate::notification::service::{NotificationScreen, ScreenRegistry};

/// Intents a client may send over the socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum ClientIntent {
    Load,
    MarkAsRead { id: i64 },
    ClearAll,
}

/// Messages pushed to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Snapshot {
        screen_id: Uuid,
        snapshot: NotificationSnapshot,
    },
    Error {
        error: String,
    },
}

/// Send an error frame and close
async fn handle_invalid_socket(mut socket: WebSocket, error_message: String) {
    let message = ServerMessage::Error {
        error: error_message,
    };
    match serde_json::to_string(&message) {
        Ok(json) => {
            if let Err(e) = socket.send(Message::Text(json)).await {
                error!("Error sending error message on WS: {}", e);
            }
        }
        Err(e) => error!("Failed to serialize WS error message: {}", e),
    }

    let _ = socket.close().await;
}

async fn send_message(tx: &mpsc::Sender<Message>, message: &ServerMessage) -> Result<(), ()> {
    let json = serde_json::to_string(message).map_err(|e| {
        error!("Failed to serialize WS message: {}", e);
    })?;
    tx.send(Message::Text(json)).await.map_err(|e| {
        debug!("WS outbound channel closed: {}", e);
    })
}

fn apply_intent(
    screen: &Arc<NotificationScreen>,
    intent: ClientIntent,
) -> Result<(), NotificationError> {
    if screen.is_torn_down() {
        return Err(NotificationError::ScreenNotFound);
    }

    match intent {
        ClientIntent::Load => {
            // Loads may suspend; keep reading intents meanwhile
            let screen = screen.clone();
            tokio::spawn(async move {
                screen.load().await;
            });
        }
        ClientIntent::MarkAsRead { id } => {
            screen.mark_as_read(id);
        }
        ClientIntent::ClearAll => {
            screen.clear_all();
        }
    }
    Ok(())
}

/// Drive one socket bound to a screen until the client goes away or the
/// screen is torn down
async fn handle_screen_connection(socket: WebSocket, screen: Arc<NotificationScreen>) {
    let screen_id = screen.id();
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Message>(100);

    // Push the current snapshot, then one per change
    let mut snapshots = screen.subscribe();
    let tx_snapshots = tx.clone();
    let snapshot_task = tokio::spawn(async move {
        loop {
            let snapshot = snapshots.borrow_and_update().clone();
            let message = ServerMessage::Snapshot {
                screen_id,
                snapshot,
            };
            if send_message(&tx_snapshots, &message).await.is_err() {
                break;
            }
            if snapshots.changed().await.is_err() {
                break;
            }
        }
    });

    // Forward messages from channel to WebSocket
    let forward_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_sender.send(message).await {
                error!("Error forwarding message to WebSocket: {}", e);
                break;
            }
        }
    });

    let tx_heartbeat = tx.clone();
    let heartbeat_task = tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(30));
        loop {
            interval.tick().await;
            if let Err(e) = tx_heartbeat.send(Message::Ping(vec![])).await {
                debug!("Stopping heartbeat: {}", e);
                break;
            }
        }
    });

    let torn_down = screen.torn_down();
    tokio::pin!(torn_down);

    let mut ended_by_teardown = false;
    loop {
        let result = tokio::select! {
            _ = &mut torn_down => {
                info!("Screen {} torn down, closing its socket", screen_id);
                ended_by_teardown = true;
                break;
            }
            next = ws_receiver.next() => match next {
                Some(result) => result,
                None => break,
            },
        };

        match result {
            Ok(Message::Text(text)) => {
                let outcome = serde_json::from_str::<ClientIntent>(&text)
                    .map_err(|e| format!("Malformed intent: {}", e))
                    .and_then(|intent| {
                        debug!("Screen {} received intent {:?}", screen_id, intent);
                        apply_intent(&screen, intent).map_err(|e| e.to_string())
                    });

                if let Err(error) = outcome {
                    warn!("Rejected intent on screen {}: {}", screen_id, error);
                    if send_message(&tx, &ServerMessage::Error { error }).await.is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Close(_)) => {
                info!("WebSocket closed by client");
                break;
            }
            Ok(Message::Pong(_)) => {
                debug!("Received pong from client");
            }
            Err(e) => {
                error!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    snapshot_task.abort();
    heartbeat_task.abort();

    if ended_by_teardown {
        let message = ServerMessage::Error {
            error: NotificationError::ScreenNotFound.to_string(),
        };
        if send_message(&tx, &message).await.is_ok() {
            let _ = tx.send(Message::Close(None)).await;
        }
        drop(tx);
        // Let the forwarder flush the error and close frames
        if time::timeout(Duration::from_secs(1), forward_task).await.is_err() {
            debug!("Timed out flushing socket for screen {}", screen_id);
        }
    } else {
        forward_task.abort();
    }

    info!("WebSocket connection closed for screen: {}", screen_id);
}

/// Attach a socket to an existing screen
pub async fn screen_ws_handler(
    ws: WebSocketUpgrade,
    Path(screen_id): Path<Uuid>,
    State(registry): State<Arc<ScreenRegistry>>,
) -> impl IntoResponse {
    match registry.get(&screen_id) {
        Ok(screen) => {
            info!("Client attached to screen {}", screen_id);
            ws.on_upgrade(move |socket| handle_screen_connection(socket, screen))
        }
        Err(e) => {
            let error_message = e.to_string();
            ws.on_upgrade(move |socket| handle_invalid_socket(socket, error_message))
        }
    }
}

/// Open a socket that owns its own screen for as long as it stays connected.
/// The screen is not registered, so no other client can reach it by id.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(registry): State<Arc<ScreenRegistry>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let owned = registry.open_owned();
        let screen = owned.screen().clone();
        if let Err(e) = apply_intent(&screen, ClientIntent::Load) {
            debug!("Initial load skipped for screen {}: {}", screen.id(), e);
        }

        handle_screen_connection(socket, screen).await;

        // Dropping the owner tears the screen down; a load still in flight
        // resolves against it and is discarded
        drop(owned);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::source::FixtureSource;

    #[test]
    fn test_client_intent_parsing() {
        assert_eq!(
            serde_json::from_str::<ClientIntent>(r#"{"intent":"load"}"#).unwrap(),
            ClientIntent::Load
        );
        assert_eq!(
            serde_json::from_str::<ClientIntent>(r#"{"intent":"mark_as_read","id":1}"#).unwrap(),
            ClientIntent::MarkAsRead { id: 1 }
        );
        assert_eq!(
            serde_json::from_str::<ClientIntent>(r#"{"intent":"clear_all"}"#).unwrap(),
            ClientIntent::ClearAll
        );

        assert!(serde_json::from_str::<ClientIntent>(r#"{"intent":"mark_as_read"}"#).is_err());
        assert!(serde_json::from_str::<ClientIntent>(r#"{"intent":"mark_unread","id":1}"#).is_err());
    }

    #[test]
    fn test_error_message_format() {
        let message = ServerMessage::Error {
            error: "Screen not found".to_string(),
        };
        let json = serde_json::to_string(&message).unwrap();
        assert_eq!(json, r#"{"type":"error","error":"Screen not found"}"#);
    }

    #[test]
    fn test_snapshot_message_format() {
        let screen_id = Uuid::parse_str("123e4567-e89b-12d3-a456-426614174000").unwrap();
        let message = ServerMessage::Snapshot {
            screen_id,
            snapshot: NotificationSnapshot {
                records: Vec::new(),
                unread_count: 0,
                revision: 0,
                loaded_at: None,
                notice: None,
            },
        };

        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains(r#""type":"snapshot""#));
        assert!(json.contains(r#""screen_id":"123e4567-e89b-12d3-a456-426614174000""#));
        assert!(json.contains(r#""unread_count":0"#));
    }

    #[tokio::test]
    async fn test_apply_intent_rejects_torn_down_screen() {
        let screen = Arc::new(NotificationScreen::new(Arc::new(FixtureSource::sample())));
        screen.load().await;

        assert!(apply_intent(&screen, ClientIntent::MarkAsRead { id: 1 }).is_ok());
        assert_eq!(screen.snapshot().unread_count, 1);

        screen.teardown();
        assert!(matches!(
            apply_intent(&screen, ClientIntent::ClearAll),
            Err(NotificationError::ScreenNotFound)
        ));
        assert_eq!(screen.snapshot().records.len(), 3);
    }
}
