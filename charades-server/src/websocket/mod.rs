use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use warp::ws::{Message, WebSocket};

use crate::registry::RoomRegistry;
use crate::relay::SignalingRelay;
use charades_types::{ClientMessage, NoticeKind, ServerMessage};

pub mod connection;
pub mod handlers;
pub mod rate_limiter;


pub use connection::{Binding, ConnectionError, ConnectionId, ConnectionManager};
use handlers::MessageHandler;
pub use rate_limiter::RateLimiter;

/// Why the inbound loop stopped reading from a socket.
#[derive(Debug)]
enum Closing {
    RateLimited,
    SenderGone,
}

pub async fn handle_connection(
    websocket: WebSocket,
    connection_manager: Arc<ConnectionManager>,
    registry: Arc<RoomRegistry>,
    relay: Arc<SignalingRelay>,
    rate_limiter: RateLimiter,
) {
    let connection_id = ConnectionId::new();
    info!("New WebSocket connection: {}", connection_id);

    let (mut ws_sender, mut ws_receiver) = websocket.split();

    // Create connection and get receiver for outgoing messages
    let message_receiver = connection_manager.create_connection(connection_id).await;

    let message_handler = MessageHandler::new(
        connection_id,
        connection_manager.clone(),
        registry,
        relay,
    );

    let incoming_handler = {
        let connection_manager = connection_manager.clone();
        let message_handler = message_handler.clone();
        let mut rate_limiter = rate_limiter;

        async move {
            while let Some(result) = ws_receiver.next().await {
                match result {
                    Ok(msg) => {
                        if let Err(closing) =
                            handle_message(msg, &mut rate_limiter, &message_handler).await
                        {
                            if let Closing::RateLimited = closing {
                                let _ = connection_manager
                                    .send_to_connection(
                                        connection_id,
                                        ServerMessage::notice(
                                            NoticeKind::RateLimited,
                                            "Too many messages",
                                        ),
                                    )
                                    .await;
                            }
                            warn!("Closing connection {}: {:?}", connection_id, closing);
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("WebSocket error for {}: {}", connection_id, e);
                        break;
                    }
                }
            }
        }
    };

    let outgoing_handler = async move {
        let mut receiver = message_receiver;

        while let Some(message) = receiver.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize message: {:?}", e);
                    continue;
                }
            };

            if let Err(e) = ws_sender.send(Message::text(json)).await {
                warn!("Failed to send message to {}: {:?}", connection_id, e);
                break;
            }
        }
        let _ = ws_sender.close().await;
    };

    // Outgoing keeps draining after the inbound side stops so a final notice
    // still reaches the client.
    let outgoing = tokio::spawn(outgoing_handler);
    incoming_handler.await;

    info!("Connection {} disconnected", connection_id);
    message_handler.handle_disconnect().await;
    // Removing the connection dropped its sender; the writer finishes on its own.
    if let Err(e) = outgoing.await {
        debug!("Writer task for {} ended abnormally: {}", connection_id, e);
    }
}

async fn handle_message(
    msg: Message,
    rate_limiter: &mut RateLimiter,
    message_handler: &MessageHandler,
) -> Result<(), Closing> {
    if !rate_limiter.check_rate_limit() {
        return Err(Closing::RateLimited);
    }

    // Only handle text messages
    let Ok(text) = msg.to_str() else {
        return Ok(());
    };

    let client_message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            debug!("Malformed message: {}", e);
            return message_handler
                .reject_malformed(format!("Malformed message: {}", e))
                .await
                .map_err(|_| Closing::SenderGone);
        }
    };

    message_handler
        .handle_message(client_message)
        .await
        .map_err(|_| Closing::SenderGone)
}
