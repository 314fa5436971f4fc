// Event transport: fire-and-forget publishing of comment events over NATS
// and the background consumer that cascades upstream entity deletions.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};
use crate::infrastructure::store::CommentStore;
use crate::models::events::{CommentEvent, EntityDeletedEvent};

/// Outbound notification channel. Publishing is best-effort: callers log and
/// swallow failures, and no retry happens at this layer.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: &CommentEvent) -> AppResult<()>;
}

/// NATS-backed event sink publishing JSON payloads to per-event subjects.
pub struct NatsEventSink {
    client: async_nats::Client,
    comment_created_subject: String,
    comment_count_subject: String,
}

impl NatsEventSink {
    pub fn new(
        client: async_nats::Client,
        comment_created_subject: String,
        comment_count_subject: String,
    ) -> Self {
        Self {
            client,
            comment_created_subject,
            comment_count_subject,
        }
    }

    fn subject_for(&self, event: &CommentEvent) -> &str {
        match event {
            CommentEvent::Created(_) => &self.comment_created_subject,
            CommentEvent::CountUpdated(_) => &self.comment_count_subject,
        }
    }
}

#[async_trait]
impl EventSink for NatsEventSink {
    async fn publish(&self, event: &CommentEvent) -> AppResult<()> {
        let subject = self.subject_for(event).to_string();
        let payload = serde_json::to_vec(event).map_err(|e| {
            AppError::EventPublishError(format!("Failed to serialize event: {}", e))
        })?;

        self.client
            .publish(subject.clone(), Bytes::from(payload))
            .await
            .map_err(|e| {
                AppError::EventPublishError(format!("Failed to publish to {}: {}", subject, e))
            })?;

        Ok(())
    }
}

/// Consume entity-deleted notifications and cascade-delete the entity's
/// comments. Malformed payloads are logged and dropped, never escalated.
/// Runs until the subscription ends.
pub async fn run_entity_deleted_consumer(
    client: async_nats::Client,
    subject: String,
    store: Arc<dyn CommentStore>,
) {
    let mut subscription = match client.subscribe(subject.clone()).await {
        Ok(subscription) => subscription,
        Err(e) => {
            error!("Failed to subscribe to {}: {}", subject, e);
            return;
        }
    };

    info!("Listening for entity deletions on {}", subject);

    while let Some(message) = subscription.next().await {
        let event: EntityDeletedEvent = match serde_json::from_slice(&message.payload) {
            Ok(event) => event,
            Err(e) => {
                warn!("Ignoring malformed entity-deleted payload: {}", e);
                continue;
            }
        };

        match store
            .delete_by_entity(event.entity_id, event.entity_type)
            .await
        {
            Ok(0) => info!(
                "No comments to delete for {} {}",
                event.entity_type, event.entity_id
            ),
            Ok(deleted) => info!(
                "Deleted {} comments for {} {}",
                deleted, event.entity_type, event.entity_id
            ),
            Err(e) => error!(
                "Failed to delete comments for {} {}: {}",
                event.entity_type, event.entity_id, e
            ),
        }
    }

    warn!("Entity-deleted subscription on {} ended", subject);
}
