// WebSocket change feed: clients subscribe to a collection and receive an
// event for every write to it.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::BroadcastStream;

use crate::{error::AppError, AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Freelancers,
    Startups,
    Hackathons,
    Teams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub id: String,
    pub kind: ChangeKind,
}

// Per-collection broadcast channels, created on first use
#[derive(Clone, Default)]
pub struct ChangeFeed {
    channels: Arc<RwLock<HashMap<Collection, broadcast::Sender<ChangeEvent>>>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    async fn sender(&self, collection: Collection) -> broadcast::Sender<ChangeEvent> {
        {
            let channels = self.channels.read().await;
            if let Some(tx) = channels.get(&collection) {
                return tx.clone();
            }
        }

        let mut channels = self.channels.write().await;
        channels
            .entry(collection)
            .or_insert_with(|| broadcast::channel(256).0)
            .clone()
    }

    pub async fn subscribe(&self, collection: Collection) -> broadcast::Receiver<ChangeEvent> {
        self.sender(collection).await.subscribe()
    }

    pub async fn publish(&self, collection: Collection, id: &str, kind: ChangeKind) {
        let event = ChangeEvent {
            collection,
            id: id.to_string(),
            kind,
        };
        // No subscribers is not an error
        let _ = self.sender(collection).await.send(event);
    }
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub collection: String,
}

// Unknown collections are rejected before the upgrade is attempted
pub async fn ws_handler(
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
    ws: std::result::Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let collection: Collection =
        match serde_json::from_value(serde_json::Value::String(query.collection.clone())) {
            Ok(c) => c,
            Err(_) => {
                return AppError::BadRequest(format!("Unknown collection: {}", query.collection))
                    .into_response()
            }
        };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let rx = state.feed.subscribe(collection).await;
    ws.on_upgrade(move |socket| handle_socket(socket, rx))
}

async fn handle_socket(socket: WebSocket, rx: broadcast::Receiver<ChangeEvent>) {
    let (sender, mut receiver) = socket.split();
    let sender = Arc::new(tokio::sync::Mutex::new(sender));
    let sender_clone = sender.clone();

    // Forward feed events to this client; lagged receivers skip ahead
    let forward_task = tokio::spawn(async move {
        let mut events = BroadcastStream::new(rx);
        while let Some(event) = events.next().await {
            let Ok(event) = event else {
                tracing::debug!("change feed subscriber lagged");
                continue;
            };
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            let mut sender = sender_clone.lock().await;
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // The feed is one-way; only keepalive and close are handled
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Close(_) => break,
            Message::Ping(data) => {
                let mut sender = sender.lock().await;
                let _ = sender.send(Message::Pong(data)).await;
            }
            _ => {}
        }
    }

    forward_task.abort();
}
