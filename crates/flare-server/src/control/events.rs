//! WebSocket stream of asset change events.
//!
//! Each connection subscribes to the [`ChangeNotifier`] and forwards every
//! event as a JSON text message. A `connected` message is sent first, once
//! the subscription is live. Clients that fall behind receive a `lagged`
//! message with the number of dropped events and should resynchronize.

use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::State;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use flare_core::notify::{AssetEvent, ChangeNotifier};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;

use crate::utility::tracing_targets::CONTROL as TRACING_TARGET;

/// Source of connection ids for log correlation.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Message sent to control channel clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControlMessage {
    /// The connection is subscribed; later changes will be delivered.
    Connected,
    /// A served asset was written or removed.
    AssetChanged(AssetEvent),
    /// Events were dropped because the client read too slowly.
    Lagged { skipped: u64 },
}

impl ControlMessage {
    fn to_message(&self) -> Result<Message, serde_json::Error> {
        serde_json::to_string(self).map(|text| Message::Text(Utf8Bytes::from(text)))
    }
}

pub(super) async fn subscribe(
    State(notifier): State<ChangeNotifier>,
    upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| forward_events(socket, notifier))
}

async fn send(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ControlMessage,
) -> Result<(), axum::Error> {
    match message.to_message() {
        Ok(message) => sender.send(message).await,
        Err(err) => {
            tracing::error!(target: TRACING_TARGET, error = %err, "Failed to encode control message");
            Ok(())
        }
    }
}

async fn forward_events(socket: WebSocket, notifier: ChangeNotifier) {
    let connection_id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
    let mut events = notifier.subscribe();
    let (mut sender, mut receiver) = socket.split();

    tracing::info!(
        target: TRACING_TARGET,
        connection_id,
        observers = notifier.observer_count(),
        "Control connection established"
    );

    if send(&mut sender, &ControlMessage::Connected).await.is_err() {
        tracing::debug!(target: TRACING_TARGET, connection_id, "Client left before subscribing");
        return;
    }

    let mut sent = 0_usize;
    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Clients only listen; anything else they send is ignored.
                Some(Ok(_)) => {}
            },
            event = events.recv() => {
                let message = match event {
                    Ok(event) => ControlMessage::AssetChanged(event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            target: TRACING_TARGET,
                            connection_id,
                            skipped,
                            "Client lagged behind, events were dropped"
                        );
                        ControlMessage::Lagged { skipped }
                    }
                    Err(RecvError::Closed) => break,
                };

                if send(&mut sender, &message).await.is_err() {
                    tracing::debug!(target: TRACING_TARGET, connection_id, "Client disconnected");
                    break;
                }
                sent += 1;
            }
        }
    }

    tracing::info!(
        target: TRACING_TARGET,
        connection_id,
        messages_sent = sent,
        "Control connection closed"
    );
}
