use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;

use crate::error::{AppError, AppResult};
use crate::infrastructure::cursor::{decode_cursor, encode_cursor};
use crate::infrastructure::store::{
    current_time_millis, CommentStore, NewComment, ReactionLedger,
};
use crate::models::comment::{Comment, EntityType, ReactionKind};

const COMMENT_COLUMNS: &str = "id, entity_id, entity_type, author_id, author_username, \
     author_avatar, text, parent_id, rating, is_positive, time_created, time_updated";

/// SQLite implementation of the comment store for in-memory testing.
pub struct SqliteCommentStore {
    pool: SqlitePool,
}

impl SqliteCommentStore {
    pub async fn new_in_memory() -> AppResult<Self> {
        // One pooled connection, held open: every caller must see the same
        // in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to connect to in-memory SQLite: {}", e))
            })?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Create the comment tables for SQLite.
    pub async fn initialize(&self) -> AppResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entity_id INTEGER NOT NULL,
                entity_type TEXT NOT NULL,
                author_id INTEGER NOT NULL,
                author_username TEXT NOT NULL,
                author_avatar TEXT,
                text TEXT NOT NULL,
                parent_id INTEGER REFERENCES comments(id) ON DELETE CASCADE,
                rating INTEGER NOT NULL DEFAULT 0,
                is_positive BOOLEAN NOT NULL DEFAULT 1,
                time_created INTEGER NOT NULL,
                time_updated INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create comments table: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comment_reactions (
                comment_id INTEGER NOT NULL REFERENCES comments(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL,
                reaction TEXT NOT NULL,
                time_created INTEGER NOT NULL,
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

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_reactions_user ON comment_reactions(user_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to create reaction user index: {}", e))
            })?;

        Ok(())
    }

    fn row_to_comment(row: &SqliteRow) -> AppResult<Comment> {
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

    fn page_from_rows(rows: Vec<SqliteRow>, limit: i64) -> AppResult<(Vec<Comment>, Option<String>)> {
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
impl CommentStore for SqliteCommentStore {
    async fn create(&self, new_comment: NewComment) -> AppResult<Comment> {
        let now = current_time_millis();

        let result = sqlx::query(
            "INSERT INTO comments (entity_id, entity_type, author_id, author_username, \
             author_avatar, text, parent_id, rating, is_positive, time_created, time_updated) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 0, 1, ?, ?)",
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
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to insert comment: {}", e)))?;

        Ok(Comment {
            id: result.last_insert_rowid(),
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
        let sql = format!("SELECT {} FROM comments WHERE id = ?", COMMENT_COLUMNS);
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
                     WHERE entity_id = ? AND entity_type = ? AND parent_id IS NULL AND id > ? \
                     ORDER BY time_created ASC, id ASC LIMIT ?",
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
                     WHERE entity_id = ? AND entity_type = ? AND parent_id IS NULL \
                     ORDER BY time_created ASC, id ASC LIMIT ?",
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
                    "SELECT {} FROM comments WHERE parent_id = ? AND id > ? \
                     ORDER BY time_created ASC, id ASC LIMIT ?",
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
                    "SELECT {} FROM comments WHERE parent_id = ? \
                     ORDER BY time_created ASC, id ASC LIMIT ?",
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
        let row = sqlx::query("SELECT COUNT(*) AS n FROM comments WHERE parent_id = ?")
            .bind(parent_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to count children: {}", e)))?;

        Ok(row.get("n"))
    }

    async fn count_by_entity(&self, entity_id: i64, entity_type: EntityType) -> AppResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM comments WHERE entity_id = ? AND entity_type = ?",
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
             (SELECT id FROM comments WHERE entity_id = ? AND entity_type = ?)",
        )
        .bind(entity_id)
        .bind(entity_type.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(format!("Failed to delete entity reactions: {}", e))
        })?;

        let result = sqlx::query("DELETE FROM comments WHERE entity_id = ? AND entity_type = ?")
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
        sqlx::query("UPDATE comments SET rating = ?, is_positive = ?, time_updated = ? WHERE id = ?")
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
impl ReactionLedger for SqliteCommentStore {
    async fn get_user_reaction(
        &self,
        comment_id: i64,
        user_id: i64,
    ) -> AppResult<Option<ReactionKind>> {
        let row = sqlx::query(
            "SELECT reaction FROM comment_reactions WHERE comment_id = ? AND user_id = ?",
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
                     VALUES (?, ?, ?, ?) \
                     ON CONFLICT (comment_id, user_id) DO UPDATE SET reaction = excluded.reaction",
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
                    "DELETE FROM comment_reactions WHERE comment_id = ? AND user_id = ?",
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
            "SELECT COUNT(*) AS n FROM comment_reactions WHERE comment_id = ? AND reaction = 'like'",
        )
        .bind(comment_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to count likes: {}", e)))?
        .get("n");

        let dislikes: i64 = sqlx::query(
            "SELECT COUNT(*) AS n FROM comment_reactions WHERE comment_id = ? AND reaction = 'dislike'",
        )
        .bind(comment_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to count dislikes: {}", e)))?
        .get("n");

        sqlx::query(
            "UPDATE comments SET rating = ?, is_positive = ?, time_updated = ? WHERE id = ?",
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
