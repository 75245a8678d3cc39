use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{ApprovalStatus, RequirementStatus};

pub mod handlers;

pub use handlers::{
    default_handlers, ApprovalStatusUpdater, PriceAggregator, RequirementEventHandler,
    SubmissionNotifier,
};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<RequirementEvent>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<RequirementEvent>) -> Self {
        Self { sender }
    }

    /// Creates a sender together with the receiver half for `process_events`.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<RequirementEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: RequirementEvent) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Facts published by the repository after a batch has been applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequirementEvent {
    RequirementCreated {
        requirement_id: Uuid,
    },
    RequirementUpdated {
        requirement_id: Uuid,
    },
    RequirementDeleted {
        requirement_id: Uuid,
    },
    RequirementStatusChanged {
        requirement_id: Uuid,
        from: RequirementStatus,
        to: RequirementStatus,
        changed_at: DateTime<Utc>,
    },
    ItemAdded {
        requirement_id: Uuid,
        item_id: Uuid,
    },
    ItemUpdated {
        requirement_id: Uuid,
        item_id: Uuid,
    },
    ItemRemoved {
        requirement_id: Uuid,
        item_id: Uuid,
    },
    ApprovalRecorded {
        requirement_id: Uuid,
        approval_id: Uuid,
        status: ApprovalStatus,
    },
}

impl RequirementEvent {
    pub fn requirement_id(&self) -> Uuid {
        match self {
            Self::RequirementCreated { requirement_id }
            | Self::RequirementUpdated { requirement_id }
            | Self::RequirementDeleted { requirement_id }
            | Self::RequirementStatusChanged { requirement_id, .. }
            | Self::ItemAdded { requirement_id, .. }
            | Self::ItemUpdated { requirement_id, .. }
            | Self::ItemRemoved { requirement_id, .. }
            | Self::ApprovalRecorded { requirement_id, .. } => *requirement_id,
        }
    }

    pub fn is_item_change(&self) -> bool {
        matches!(
            self,
            Self::ItemAdded { .. } | Self::ItemUpdated { .. } | Self::ItemRemoved { .. }
        )
    }

    /// Stable name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RequirementCreated { .. } => "requirement_created",
            Self::RequirementUpdated { .. } => "requirement_updated",
            Self::RequirementDeleted { .. } => "requirement_deleted",
            Self::RequirementStatusChanged { .. } => "requirement_status_changed",
            Self::ItemAdded { .. } => "item_added",
            Self::ItemUpdated { .. } => "item_updated",
            Self::ItemRemoved { .. } => "item_removed",
            Self::ApprovalRecorded { .. } => "approval_recorded",
        }
    }
}

/// Drains the event channel, logging every published event.
pub async fn process_events(mut rx: mpsc::Receiver<RequirementEvent>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            RequirementEvent::RequirementStatusChanged {
                requirement_id,
                from,
                to,
                ..
            } => {
                info!(
                    requirement_id = %requirement_id,
                    from = %from,
                    to = %to,
                    "Requirement status changed"
                );
            }
            RequirementEvent::ApprovalRecorded {
                requirement_id,
                approval_id,
                status,
            } => {
                info!(
                    requirement_id = %requirement_id,
                    approval_id = %approval_id,
                    status = %status,
                    "Approval recorded"
                );
            }
            other => {
                info!(
                    event = other.name(),
                    requirement_id = %other.requirement_id(),
                    "Requirement event"
                );
            }
        }
    }

    warn!("Event processing loop has ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sender_delivers_events() {
        let (sender, mut rx) = EventSender::channel(4);
        let id = Uuid::new_v4();
        sender
            .send(RequirementEvent::RequirementCreated { requirement_id: id })
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.requirement_id(), id);
        assert_eq!(received.name(), "requirement_created");
    }

    #[tokio::test]
    async fn send_fails_once_receiver_is_dropped() {
        let (sender, rx) = EventSender::channel(1);
        drop(rx);
        let result = sender
            .send(RequirementEvent::RequirementDeleted {
                requirement_id: Uuid::new_v4(),
            })
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = RequirementEvent::ApprovalRecorded {
            requirement_id: Uuid::nil(),
            approval_id: Uuid::nil(),
            status: ApprovalStatus::Approved,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "approval_recorded");
        assert_eq!(json["status"], "approved");
    }
}
