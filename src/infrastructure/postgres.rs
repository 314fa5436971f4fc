use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::str::FromStr;

use crate::error::{AppError, AppResult};
use crate::infrastructure::cursor::{decode_cursor, encode_cursor};
use crate::infrastructure::store::{
    current_time_millis, CommentStore, NewComment, ReactionLedger,
};
use crate::models::comment::{Comment, EntityType, ReactionKind};

const COMMENT_COLUMNS: &str = "id, entity_id, entity_type, author_id, author_username, \
     author_avatar, text, parent_id, rating, is_positive, time_created, time_updated";

/// PostgreSQL implementation of the comment store.
pub struct PostgresCommentStore {
    pool: PgPool,
}

impl PostgresCommentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Health check to verify database connectivity.
    pub async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Database health check failed: {}", e)))?;
        Ok(())
    }

    /// Get connection pool statistics.
    pub fn pool_stats(&self) -> (u32, u32) {
        (self.pool.num_idle() as u32, self.pool.size())
    }

    /// Create the comment tables and indexes if they do not exist yet.
    pub async fn initialize(&self) -> AppResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                id BIGSERIAL PRIMARY KEY,
                entity_id BIGINT NOT NULL,
                entity_type VARCHAR(10) NOT NULL,
                author_id BIGINT NOT NULL,
                author_username VARCHAR(255) NOT NULL,
                author_avatar VARCHAR(512),
                text TEXT NOT NULL,
                parent_id BIGINT REFERENCES comments(id) ON DELETE CASCADE,
                rating BIGINT NOT NULL DEFAULT 0,
                is_positive BOOLEAN NOT NULL DEFAULT TRUE,
                time_created BIGINT NOT NULL,
                time_updated BIGINT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create comments table: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comment_reactions (
                comment_id BIGINT NOT NULL REFERENCES comments(id) ON DELETE CASCADE,
                user_id BIGINT NOT NULL,
                reaction VARCHAR(10) NOT NULL,
                time_created BIGINT NOT NULL,
                PRIMARY KEY (comment_id, user_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(format!("Failed to create reactions table: {}", e))
        })?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_comments_entity ON comments(entity_id, entity_type)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create entity index: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments(parent_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to create parent index: {}", e))
            })?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_author ON comments(author_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to create author index: {}", e))
            })?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_comments_time_created ON comments(time_created)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(format!("Failed to create time index: {}", e))
        })?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_reactions_user ON comment_reactions(user_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to create reaction user index: {}", e))
            })?;

        Ok(())
    }

    fn row_to_comment(row: &PgRow) -> AppResult<Comment> {
        let entity_type: String = row.get("entity_type");
        let entity_type = EntityType::from_str(&entity_type).map_err(AppError::DatabaseError)?;

        Ok(Comment {
            id: row.get("id"),
            entity_id: row.get("entity_id"),
            entity_type,
            author_id: row.get("author_id"),
            author_username: row.get("author_username"),
            author_avatar: row.get("author_avatar"),
            text: row.get("text"),
            parent_id: row.get("parent_id"),
            rating: row.get("rating"),
            is_positive: row.get("is_positive"),
            time_created: row.get("time_created"),
            time_updated: row.get("time_updated"),
        })
    }

    fn page_from_rows(rows: Vec<PgRow>, limit: i64) -> AppResult<(Vec<Comment>, Option<String>)> {
        let has_more = rows.len() as i64 > limit;
        let mut comments = Vec::with_capacity(rows.len().min(limit as usize));
        for row in rows.iter().take(limit as usize) {
            comments.push(Self::row_to_comment(row)?);
        }
        let next_cursor = if has_more {
            comments.last().map(|c| encode_cursor(c.id))
        } else {
            None
        };
        Ok((comments, next_cursor))
    }
}

#[async_trait]
impl CommentStore for PostgresCommentStore {
    async fn create(&self, new_comment: NewComment) -> AppResult<Comment> {
        let now = current_time_millis();

        let row = sqlx::query(
            "INSERT INTO comments (entity_id, entity_type, author_id, author_username, \
             author_avatar, text, parent_id, rating, is_positive, time_created, time_updated) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, 0, TRUE, $8, $9) RETURNING id",
        )
        .bind(new_comment.entity_id)
        .bind(new_comment.entity_type.as_str())
        .bind(new_comment.author_id)
        .bind(&new_comment.author_username)
        .bind(&new_comment.author_avatar)
        .bind(&new_comment.text)
        .bind(new_comment.parent_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to insert comment: {}", e)))?;

        Ok(Comment {
            id: row.get("id"),
            entity_id: new_comment.entity_id,
            entity_type: new_comment.entity_type,
            author_id: new_comment.author_id,
            author_username: new_comment.author_username,
            author_avatar: new_comment.author_avatar,
            text: new_comment.text,
            parent_id: new_comment.parent_id,
            rating: 0,
            is_positive: true,
            time_created: now,
            time_updated: now,
        })
    }

    async fn get_by_id(&self, comment_id: i64) -> AppResult<Option<Comment>> {
        let sql = format!("SELECT {} FROM comments WHERE id = $1", COMMENT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(comment_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to fetch comment: {}", e)))?;

        row.as_ref().map(Self::row_to_comment).transpose()
    }

    async fn list_root_comments(
        &self,
        entity_id: i64,
        entity_type: EntityType,
        cursor: Option<&str>,
        limit: i64,
    ) -> AppResult<(Vec<Comment>, Option<String>)> {
        let limit = limit.max(1);

        let rows = match cursor.and_then(decode_cursor) {
            Some(cursor_id) => {
                let sql = format!(
                    "SELECT {} FROM comments \
                     WHERE entity_id = $1 AND entity_type = $2 AND parent_id IS NULL AND id > $3 \
                     ORDER BY time_created ASC, id ASC LIMIT $4",
                    COMMENT_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(entity_id)
                    .bind(entity_type.as_str())
                    .bind(cursor_id)
                    .bind(limit + 1)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM comments \
                     WHERE entity_id = $1 AND entity_type = $2 AND parent_id IS NULL \
                     ORDER BY time_created ASC, id ASC LIMIT $3",
                    COMMENT_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(entity_id)
                    .bind(entity_type.as_str())
                    .bind(limit + 1)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| AppError::DatabaseError(format!("Failed to list root comments: {}", e)))?;

        Self::page_from_rows(rows, limit)
    }

    async fn list_children(
        &self,
        parent_id: i64,
        cursor: Option<&str>,
        limit: i64,
    ) -> AppResult<(Vec<Comment>, Option<String>)> {
        let limit = limit.max(1);

        let rows = match cursor.and_then(decode_cursor) {
            Some(cursor_id) => {
                let sql = format!(
                    "SELECT {} FROM comments WHERE parent_id = $1 AND id > $2 \
                     ORDER BY time_created ASC, id ASC LIMIT $3",
                    COMMENT_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(parent_id)
                    .bind(cursor_id)
                    .bind(limit + 1)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM comments WHERE parent_id = $1 \
                     ORDER BY time_created ASC, id ASC LIMIT $2",
                    COMMENT_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(parent_id)
                    .bind(limit + 1)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| AppError::DatabaseError(format!("Failed to list child comments: {}", e)))?;

        Self::page_from_rows(rows, limit)
    }

    async fn count_children(&self, parent_id: i64) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM comments WHERE parent_id = $1")
            .bind(parent_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to count children: {}", e)))?;

        Ok(row.get("n"))
    }

    async fn count_by_entity(&self, entity_id: i64, entity_type: EntityType) -> AppResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM comments WHERE entity_id = $1 AND entity_type = $2",
        )
        .bind(entity_id)
        .bind(entity_type.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to count comments: {}", e)))?;

        Ok(row.get("n"))
    }

    async fn delete_by_entity(&self, entity_id: i64, entity_type: EntityType) -> AppResult<u64> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to begin transaction: {}", e))
        })?;

        sqlx::query(
            "DELETE FROM comment_reactions WHERE comment_id IN \
             (SELECT id FROM comments WHERE entity_id = $1 AND entity_type = $2)",
        )
        .bind(entity_id)
        .bind(entity_type.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(format!("Failed to delete entity reactions: {}", e))
        })?;

        let result = sqlx::query("DELETE FROM comments WHERE entity_id = $1 AND entity_type = $2")
            .bind(entity_id)
            .bind(entity_type.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to delete entity comments: {}", e))
            })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to commit transaction: {}", e))
        })?;

        Ok(result.rows_affected())
    }

    async fn update_rating(
        &self,
        comment_id: i64,
        rating: i64,
        is_positive: bool,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE comments SET rating = $1, is_positive = $2, time_updated = $3 WHERE id = $4",
        )
        .bind(rating)
        .bind(is_positive)
        .bind(current_time_millis())
        .bind(comment_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to update rating: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl ReactionLedger for PostgresCommentStore {
    async fn get_user_reaction(
        &self,
        comment_id: i64,
        user_id: i64,
    ) -> AppResult<Option<ReactionKind>> {
        let row = sqlx::query(
            "SELECT reaction FROM comment_reactions WHERE comment_id = $1 AND user_id = $2",
        )
        .bind(comment_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to fetch reaction: {}", e)))?;

        match row {
            Some(row) => {
                let value: String = row.get("reaction");
                let kind = ReactionKind::from_str(&value).map_err(AppError::DatabaseError)?;
                Ok(Some(kind))
            }
            None => Ok(None),
        }
    }

    async fn set_user_reaction(
        &self,
        comment_id: i64,
        user_id: i64,
        reaction: Option<ReactionKind>,
    ) -> AppResult<()> {
        let now = current_time_millis();
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to begin transaction: {}", e))
        })?;

        match reaction {
            Some(kind) => {
                // Upsert keyed on (comment_id, user_id): re-setting the same
                // reaction is a no-op in effect, a different one replaces it.
                sqlx::query(
                    "INSERT INTO comment_reactions (comment_id, user_id, reaction, time_created) \
                     VALUES ($1, $2, $3, $4) \
                     ON CONFLICT (comment_id, user_id) DO UPDATE SET reaction = EXCLUDED.reaction",
                )
                .bind(comment_id)
                .bind(user_id)
                .bind(kind.as_str())
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(format!("Failed to upsert reaction: {}", e))
                })?;
            }
            None => {
                sqlx::query(
                    "DELETE FROM comment_reactions WHERE comment_id = $1 AND user_id = $2",
                )
                .bind(comment_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(format!("Failed to delete reaction: {}", e))
                })?;
            }
        }

        // Recompute from the durable rows, not from a delta.
        let likes: i64 = sqlx::query(
            "SELECT COUNT(*) AS n FROM comment_reactions \
             WHERE comment_id = $1 AND reaction = 'like'",
        )
        .bind(comment_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to count likes: {}", e)))?
        .get("n");

        let dislikes: i64 = sqlx::query(
            "SELECT COUNT(*) AS n FROM comment_reactions \
             WHERE comment_id = $1 AND reaction = 'dislike'",
        )
        .bind(comment_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to count dislikes: {}", e)))?
        .get("n");

        sqlx::query(
            "UPDATE comments SET rating = $1, is_positive = $2, time_updated = $3 WHERE id = $4",
        )
        .bind(likes - dislikes)
        .bind(likes >= dislikes)
        .bind(now)
        .bind(comment_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to update rating: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to commit transaction: {}", e))
        })?;

        Ok(())
    }
}
