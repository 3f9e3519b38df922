//! WebSocket session
//!
//! One task pair per connection: a sender task draining the relay's
//! per-connection channel into the socket, and an input task parsing inbound
//! frames into relay events. Either task ending tears the session down.

use axum::extract::ws::{Message, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::relay::ChatRelay;
use scoutchat_proto::ClientEvent;

pub async fn handle_chat_ws(mut socket: WebSocket, relay: Arc<ChatRelay>) {
    let (connection_id, mut rx) = match relay.connect().await {
        Ok(pair) => pair,
        Err(e) => {
            warn!("Refusing connection: {}", e);
            let _ = socket.close().await;
            return;
        }
    };

    relay.metrics().connection_opened();
    info!(conn_id = %connection_id, "WebSocket connection established");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Task to send relay events to the WebSocket
    let sender_task = async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(j) => j,
                Err(e) => {
                    error!("Failed to serialize event: {}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    };

    // Task to handle incoming frames
    let relay_input = relay.clone();
    let input_task = async move {
        let mut rate_guard = relay_input.rate_guard();
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let event: ClientEvent = match serde_json::from_str(&text) {
                        Ok(ev) => ev,
                        Err(e) => {
                            // Silent drop: the sender gets no error reply.
                            relay_input.metrics().invalid_payload();
                            debug!(conn_id = %connection_id, "Dropping unparseable frame: {}", e);
                            continue;
                        }
                    };
                    if matches!(event, ClientEvent::SendMessage { .. }) && !rate_guard.allow() {
                        relay_input.metrics().rate_limited();
                        debug!(conn_id = %connection_id, "Dropping over-rate message");
                        continue;
                    }
                    relay_input.handle_event(connection_id, event).await;
                }
                Message::Close(_) => break,
                // Binary and ping/pong frames carry no chat events.
                _ => {}
            }
        }
    };

    // Run until either side ends the session
    tokio::select! {
        _ = sender_task => {},
        _ = input_task => {},
    }

    relay.disconnect(connection_id).await;
    relay.metrics().connection_closed();
    info!(conn_id = %connection_id, "WebSocket connection closed");
}
