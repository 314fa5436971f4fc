// API response shapes for the comment endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::comment::{Comment, EntityType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorView {
    pub id: i64,
    pub username: String,
    pub avatar: Option<String>,
}

/// One comment as rendered to clients: the stored row merged with the
/// per-request enrichment (children count and the viewer's own reaction).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: i64,
    pub author: AuthorView,
    pub date: DateTime<Utc>,
    pub text: String,
    pub is_positive: bool,
    pub rating: i64,
    pub parent_id: Option<i64>,
    pub children_count: i64,
    pub is_liked_by_me: bool,
    pub is_disliked_by_me: bool,
    pub entity_type: EntityType,
}

impl CommentView {
    pub fn compose(
        comment: Comment,
        children_count: i64,
        is_liked_by_me: bool,
        is_disliked_by_me: bool,
    ) -> Self {
        CommentView {
            id: comment.id,
            author: AuthorView {
                id: comment.author_id,
                username: comment.author_username,
                avatar: comment.author_avatar,
            },
            date: DateTime::from_timestamp_millis(comment.time_created).unwrap_or_default(),
            text: comment.text,
            is_positive: comment.is_positive,
            rating: comment.rating,
            parent_id: comment.parent_id,
            children_count,
            is_liked_by_me,
            is_disliked_by_me,
            entity_type: comment.entity_type,
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPage {
    pub items: Vec<CommentView>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommentResponse {
    pub comment: CommentView,
}
