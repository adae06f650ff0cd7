use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::like::Like;
use crate::domain::user::PublicUser;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct LikeService {
    db: Db,
}

impl LikeService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Atomic like keyed on (user, post). Returns None when the pair
    /// already existed; the unique constraint makes the race between two
    /// concurrent likes produce exactly one row.
    pub async fn like_post(&self, user_id: Uuid, post_id: Uuid) -> Result<Option<Like>> {
        let row = sqlx::query(
            "WITH inserted_like AS ( \
                INSERT INTO likes (user_id, post_id) VALUES ($1, $2) \
                ON CONFLICT DO NOTHING \
                RETURNING id, user_id, post_id, created_at \
             ) \
             SELECT l.id, l.post_id, l.created_at, u.id AS user_id, u.username \
             FROM inserted_like l \
             JOIN users u ON l.user_id = u.id",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?;

        let like = row.map(|row| Like {
            id: row.get("id"),
            user: PublicUser {
                id: row.get("user_id"),
                username: row.get("username"),
            },
            post: row.get("post_id"),
            created_at: row.get("created_at"),
        });

        Ok(like)
    }

    pub async fn unlike_post(&self, user_id: Uuid, post_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM likes WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
