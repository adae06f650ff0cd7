use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::comment::{self, CommentNode, CommentRecord};
use crate::domain::user::PublicUser;
use crate::infra::db::Db;

fn record_from_row(row: &PgRow) -> CommentRecord {
    CommentRecord {
        id: row.get("id"),
        post_id: row.get("post_id"),
        user: PublicUser {
            id: row.get("user_id"),
            username: row.get("username"),
        },
        content: row.get("content"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        parent_id: row.get("parent_id"),
    }
}

#[derive(Clone)]
pub struct CommentService {
    db: Db,
}

impl CommentService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Top-level comments for a post, replies nested, both levels ordered
    /// by created_at ascending.
    pub async fn list_for_post(&self, post_id: Uuid, viewer: Uuid) -> Result<Vec<CommentNode>> {
        let rows = sqlx::query(
            "SELECT c.id, c.post_id, c.user_id, u.username, c.content, \
                    c.created_at, c.updated_at, c.parent_id \
             FROM comments c \
             JOIN users u ON c.user_id = u.id \
             WHERE c.post_id = $1 \
             ORDER BY c.created_at",
        )
        .bind(post_id)
        .fetch_all(self.db.pool())
        .await?;

        let records: Vec<CommentRecord> = rows.iter().map(record_from_row).collect();
        Ok(comment::thread(&records, viewer))
    }

    pub async fn get_comment(&self, comment_id: Uuid) -> Result<Option<CommentRecord>> {
        let row = sqlx::query(
            "SELECT c.id, c.post_id, c.user_id, u.username, c.content, \
                    c.created_at, c.updated_at, c.parent_id \
             FROM comments c \
             JOIN users u ON c.user_id = u.id \
             WHERE c.id = $1",
        )
        .bind(comment_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(record_from_row))
    }

    /// The comment with its direct replies attached, for the detail view.
    pub async fn get_with_replies(
        &self,
        comment_id: Uuid,
        viewer: Uuid,
    ) -> Result<Option<CommentNode>> {
        let Some(record) = self.get_comment(comment_id).await? else {
            return Ok(None);
        };

        let rows = sqlx::query(
            "SELECT c.id, c.post_id, c.user_id, u.username, c.content, \
                    c.created_at, c.updated_at, c.parent_id \
             FROM comments c \
             JOIN users u ON c.user_id = u.id \
             WHERE c.parent_id = $1 \
             ORDER BY c.created_at",
        )
        .bind(comment_id)
        .fetch_all(self.db.pool())
        .await?;

        let mut node = CommentNode::leaf(record, viewer);
        node.replies = rows
            .iter()
            .map(|row| CommentNode::leaf(record_from_row(row), viewer))
            .collect();

        Ok(Some(node))
    }

    pub async fn create_comment(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        content: String,
        parent_id: Option<Uuid>,
    ) -> Result<CommentRecord> {
        let row = sqlx::query(
            "WITH inserted_comment AS ( \
                INSERT INTO comments (post_id, user_id, content, parent_id) \
                VALUES ($1, $2, $3, $4) \
                RETURNING id, post_id, user_id, content, created_at, updated_at, parent_id \
             ) \
             SELECT c.*, u.username \
             FROM inserted_comment c \
             JOIN users u ON c.user_id = u.id",
        )
        .bind(post_id)
        .bind(user_id)
        .bind(content)
        .bind(parent_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(record_from_row(&row))
    }

    pub async fn update_content(&self, comment_id: Uuid, content: String) -> Result<Option<CommentRecord>> {
        let row = sqlx::query(
            "WITH updated_comment AS ( \
                UPDATE comments \
                SET content = $2, updated_at = now() \
                WHERE id = $1 \
                RETURNING id, post_id, user_id, content, created_at, updated_at, parent_id \
             ) \
             SELECT c.*, u.username \
             FROM updated_comment c \
             JOIN users u ON c.user_id = u.id",
        )
        .bind(comment_id)
        .bind(content)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(record_from_row))
    }

    /// Removes the comment; replies go with it via the parent_id cascade.
    pub async fn delete_comment(&self, comment_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
