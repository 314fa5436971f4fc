// Storage interface for comments and reactions. This layer converts the
// comment operations directly into SQL queries; the application service
// depends only on these traits.

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::comment::{Comment, EntityType, ReactionKind};

/// Page size used by listings when the caller does not override it.
pub const DEFAULT_PAGE_SIZE: i64 = 5;

/// Current time in milliseconds since Unix epoch.
pub fn current_time_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Input for comment creation. Identity and timestamps are assigned by the
/// store; text is validated by the caller before it gets here.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub entity_id: i64,
    pub entity_type: EntityType,
    pub author_id: i64,
    pub author_username: String,
    pub author_avatar: Option<String>,
    pub text: String,
    pub parent_id: Option<i64>,
}

/// Persistence contract for comment rows. The store is the sole writer of
/// comments and the sole mutator of `rating`/`is_positive`, even when the
/// recompute is triggered by the reaction ledger.
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Persist a new comment, assigning its id and timestamps.
    async fn create(&self, new_comment: NewComment) -> AppResult<Comment>;

    async fn get_by_id(&self, comment_id: i64) -> AppResult<Option<Comment>>;

    /// Root comments for an entity, ordered by creation time (ties broken by
    /// id). A cursor restricts the page to ids strictly greater than the
    /// decoded value; the returned cursor encodes the last returned id and
    /// is present iff a further page exists.
    async fn list_root_comments(
        &self,
        entity_id: i64,
        entity_type: EntityType,
        cursor: Option<&str>,
        limit: i64,
    ) -> AppResult<(Vec<Comment>, Option<String>)>;

    /// Same pagination contract as `list_root_comments`, scoped to the
    /// direct children of one comment.
    async fn list_children(
        &self,
        parent_id: i64,
        cursor: Option<&str>,
        limit: i64,
    ) -> AppResult<(Vec<Comment>, Option<String>)>;

    /// Direct children only, not the full subtree.
    async fn count_children(&self, parent_id: i64) -> AppResult<i64>;

    /// Every comment of the entity, all depths.
    async fn count_by_entity(&self, entity_id: i64, entity_type: EntityType) -> AppResult<i64>;

    /// Remove every comment of the entity and every reaction referencing
    /// them, as one transaction. Returns the number of comments removed.
    async fn delete_by_entity(&self, entity_id: i64, entity_type: EntityType) -> AppResult<u64>;

    /// Write a recomputed rating. Only the reaction ledger's recompute step
    /// calls this.
    async fn update_rating(&self, comment_id: i64, rating: i64, is_positive: bool)
        -> AppResult<()>;
}

/// Persistence contract for reaction rows, at most one per (comment, user).
#[async_trait]
pub trait ReactionLedger: Send + Sync {
    async fn get_user_reaction(
        &self,
        comment_id: i64,
        user_id: i64,
    ) -> AppResult<Option<ReactionKind>>;

    /// Replace the pair's reaction (`None` removes it), then recount likes
    /// and dislikes from the rows and push the derived rating into the
    /// comment row. Runs as a single transaction; partial application is
    /// never observable.
    async fn set_user_reaction(
        &self,
        comment_id: i64,
        user_id: i64,
        reaction: Option<ReactionKind>,
    ) -> AppResult<()>;
}
