// Domain events published after comment writes and consumed from upstream
// entity deletions. Notifications only; no reply is awaited.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::comment::{Comment, EntityType};

pub const SERVICE_NAME: &str = "comment-service";

/// Emitted after a comment is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentCreatedEvent {
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub service: String,
    pub comment_id: i64,
    pub entity_id: i64,
    pub entity_type: EntityType,
    pub author_id: i64,
    pub author_username: String,
    pub parent_id: Option<i64>,
}

/// Emitted after a create with the recomputed total for the entity, so
/// upstream services can keep their counters in sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentCountUpdatedEvent {
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub service: String,
    pub entity_id: i64,
    pub entity_type: EntityType,
    pub comment_count: i64,
}

/// Outbound event envelope handed to the event sink.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CommentEvent {
    Created(CommentCreatedEvent),
    CountUpdated(CommentCountUpdatedEvent),
}

impl CommentEvent {
    pub fn comment_created(comment: &Comment) -> Self {
        CommentEvent::Created(CommentCreatedEvent {
            event_type: "comment_created".to_string(),
            timestamp: Utc::now(),
            service: SERVICE_NAME.to_string(),
            comment_id: comment.id,
            entity_id: comment.entity_id,
            entity_type: comment.entity_type,
            author_id: comment.author_id,
            author_username: comment.author_username.clone(),
            parent_id: comment.parent_id,
        })
    }

    pub fn comment_count_updated(entity_id: i64, entity_type: EntityType, comment_count: i64) -> Self {
        CommentEvent::CountUpdated(CommentCountUpdatedEvent {
            event_type: "comment_count_updated".to_string(),
            timestamp: Utc::now(),
            service: SERVICE_NAME.to_string(),
            entity_id,
            entity_type,
            comment_count,
        })
    }

    pub fn event_type(&self) -> &str {
        match self {
            CommentEvent::Created(e) => &e.event_type,
            CommentEvent::CountUpdated(e) => &e.event_type,
        }
    }
}

/// Inbound notification that an external entity was removed upstream.
/// Tolerates both snake_case and camelCase producers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDeletedEvent {
    #[serde(alias = "entityId")]
    pub entity_id: i64,
    #[serde(alias = "entityType")]
    pub entity_type: EntityType,
}
