use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::entities::history::StockAction;
use crate::models::StockSnapshot;

/// Domain events emitted after successful mutations. Consumed by the
/// background processor for structured audit logging; the channel keeps
/// event handling off the request path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    WineCreated {
        wine_id: Uuid,
        name: String,
        operator: String,
    },
    StockMoved {
        wine_id: Uuid,
        action: StockAction,
        change: StockSnapshot,
        operator: String,
    },
    WineDeleted {
        wine_id: Uuid,
        operator: String,
    },
    HistoryCleared {
        deleted_count: u64,
        operator: String,
    },
    UserCreated {
        user_id: Uuid,
        username: String,
    },
    UserDeleted {
        user_id: Uuid,
        username: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Background task draining the event channel. Runs until every sender is
/// dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::WineCreated {
                wine_id,
                name,
                operator,
            } => {
                info!(wine_id = %wine_id, name = %name, operator = %operator, "wine created");
            }
            Event::StockMoved {
                wine_id,
                action,
                change,
                operator,
            } => {
                info!(
                    wine_id = %wine_id,
                    action = action.as_str(),
                    unpackaged = change.unpackaged_boxes,
                    packaged = change.packaged_boxes,
                    water = %change.remaining_water,
                    operator = %operator,
                    "stock moved"
                );
            }
            Event::WineDeleted { wine_id, operator } => {
                info!(wine_id = %wine_id, operator = %operator, "wine deleted");
            }
            Event::HistoryCleared {
                deleted_count,
                operator,
            } => {
                info!(deleted_count, operator = %operator, "history cleared");
            }
            Event::UserCreated { user_id, username } => {
                info!(user_id = %user_id, username = %username, "user created");
            }
            Event::UserDeleted { user_id, username } => {
                info!(user_id = %user_id, username = %username, "user deleted");
            }
        }
    }
}
