// Comment application service: composes the store and the ledger into the
// read/write use cases and maps domain rows to response views.

use std::sync::Arc;
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::infrastructure::events::EventSink;
use crate::infrastructure::store::{CommentStore, NewComment, ReactionLedger};
use crate::models::comment::{Comment, EntityType, ReactionKind, MAX_COMMENT_TEXT_LEN};
use crate::models::events::CommentEvent;
use crate::models::views::{CommentPage, CommentView};

/// Input for `create_comment`. The author fields are the caller's resolved
/// identity; for replies the entity binding is the parent's, resolved at the
/// request boundary.
#[derive(Debug, Clone)]
pub struct CreateComment {
    pub entity_id: i64,
    pub entity_type: EntityType,
    pub author_id: i64,
    pub author_username: String,
    pub author_avatar: Option<String>,
    pub text: String,
    pub parent_id: Option<i64>,
}

pub struct CommentService {
    store: Arc<dyn CommentStore>,
    ledger: Arc<dyn ReactionLedger>,
    events: Option<Arc<dyn EventSink>>,
    page_size: i64,
}

impl CommentService {
    pub fn new(
        store: Arc<dyn CommentStore>,
        ledger: Arc<dyn ReactionLedger>,
        events: Option<Arc<dyn EventSink>>,
        page_size: i64,
    ) -> Self {
        Self {
            store,
            ledger,
            events,
            page_size: page_size.max(1),
        }
    }

    /// Root comments for an entity, enriched per item with its child count
    /// and, when a viewer is known, the viewer's own reaction flags. One
    /// count plus one reaction lookup per listed comment is accepted: the
    /// page is small.
    pub async fn list_comments(
        &self,
        entity_id: i64,
        entity_type: EntityType,
        cursor: Option<&str>,
        viewer_id: Option<i64>,
    ) -> AppResult<CommentPage> {
        let (comments, next_cursor) = self
            .store
            .list_root_comments(entity_id, entity_type, cursor, self.page_size)
            .await?;

        self.page_from(comments, next_cursor, viewer_id).await
    }

    /// Direct replies to one comment, same enrichment as `list_comments`.
    pub async fn list_children(
        &self,
        parent_id: i64,
        cursor: Option<&str>,
        viewer_id: Option<i64>,
    ) -> AppResult<CommentPage> {
        let (comments, next_cursor) = self
            .store
            .list_children(parent_id, cursor, self.page_size)
            .await?;

        self.page_from(comments, next_cursor, viewer_id).await
    }

    /// Point lookup, used by the reply route to resolve the parent's entity
    /// binding.
    pub async fn get_comment(&self, comment_id: i64) -> AppResult<Option<Comment>> {
        self.store.get_by_id(comment_id).await
    }

    /// Validate and persist a comment, then notify the event sink. Event
    /// delivery is not part of the success contract: failures are logged and
    /// the created comment is returned regardless.
    pub async fn create_comment(&self, request: CreateComment) -> AppResult<CommentView> {
        validate_text(&request.text)?;

        let saved = self
            .store
            .create(NewComment {
                entity_id: request.entity_id,
                entity_type: request.entity_type,
                author_id: request.author_id,
                author_username: request.author_username,
                author_avatar: request.author_avatar,
                text: request.text,
                parent_id: request.parent_id,
            })
            .await?;

        self.emit_created(&saved).await;

        let children_count = self.store.count_children(saved.id).await?;
        Ok(CommentView::compose(saved, children_count, false, false))
    }

    /// Write the viewer's reaction (or clear it with `None`), then reload
    /// and re-enrich the comment for the response.
    pub async fn set_reaction(
        &self,
        comment_id: i64,
        viewer_id: i64,
        reaction: Option<ReactionKind>,
    ) -> AppResult<CommentView> {
        if self.store.get_by_id(comment_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Comment {} not found", comment_id)));
        }

        self.ledger
            .set_user_reaction(comment_id, viewer_id, reaction)
            .await?;

        // The comment may have been deleted between the write and this
        // reload; surface that as not-found rather than a stale view.
        let comment = self
            .store
            .get_by_id(comment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Comment {} not found", comment_id)))?;

        self.enrich(comment, Some(viewer_id)).await
    }

    async fn page_from(
        &self,
        comments: Vec<Comment>,
        next_cursor: Option<String>,
        viewer_id: Option<i64>,
    ) -> AppResult<CommentPage> {
        let mut items = Vec::with_capacity(comments.len());
        for comment in comments {
            items.push(self.enrich(comment, viewer_id).await?);
        }

        Ok(CommentPage {
            items,
            has_more: next_cursor.is_some(),
            next_cursor,
        })
    }

    async fn enrich(&self, comment: Comment, viewer_id: Option<i64>) -> AppResult<CommentView> {
        let children_count = self.store.count_children(comment.id).await?;

        let (is_liked, is_disliked) = match viewer_id {
            Some(user_id) => match self.ledger.get_user_reaction(comment.id, user_id).await? {
                Some(ReactionKind::Like) => (true, false),
                Some(ReactionKind::Dislike) => (false, true),
                None => (false, false),
            },
            None => (false, false),
        };

        Ok(CommentView::compose(comment, children_count, is_liked, is_disliked))
    }

    async fn emit_created(&self, saved: &Comment) {
        let Some(sink) = &self.events else {
            return;
        };

        let created = CommentEvent::comment_created(saved);
        if let Err(e) = sink.publish(&created).await {
            warn!("Failed to publish comment_created for comment {}: {}", saved.id, e);
        }

        match self
            .store
            .count_by_entity(saved.entity_id, saved.entity_type)
            .await
        {
            Ok(comment_count) => {
                let event = CommentEvent::comment_count_updated(
                    saved.entity_id,
                    saved.entity_type,
                    comment_count,
                );
                if let Err(e) = sink.publish(&event).await {
                    warn!(
                        "Failed to publish comment_count_updated for {} {}: {}",
                        saved.entity_type, saved.entity_id, e
                    );
                }
            }
            Err(e) => warn!(
                "Failed to recount comments for {} {}: {}",
                saved.entity_type, saved.entity_id, e
            ),
        }
    }
}

fn validate_text(text: &str) -> AppResult<()> {
    if text.trim().is_empty() {
        return Err(AppError::Validation(
            "Comment text must not be empty".to_string(),
        ));
    }
    if text.chars().count() > MAX_COMMENT_TEXT_LEN {
        return Err(AppError::Validation(format!(
            "Comment text must not exceed {} characters",
            MAX_COMMENT_TEXT_LEN
        )));
    }
    Ok(())
}
