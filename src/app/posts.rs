use std::collections::HashMap;

use anyhow::{anyhow, Result};
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::tags::TagService;
use crate::domain::comment::{self, CommentRecord};
use crate::domain::post::{PostDetail, PostRecord};
use crate::domain::tag::Tag;
use crate::domain::user::PublicUser;
use crate::infra::db::Db;

/// List filters, combined by logical AND.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub author: Option<Uuid>,
    pub published: Option<bool>,
    pub tag_ids: Option<Vec<Uuid>>,
    pub search: Option<String>,
}

/// LIKE metacharacters in a search term match literally, never as
/// wildcards. Backslash is the Postgres default escape character.
fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn record_from_row(row: &PgRow) -> PostRecord {
    PostRecord {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        author: PublicUser {
            id: row.get("author_id"),
            username: row.get("username"),
        },
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        is_published: row.get("is_published"),
    }
}

#[derive(Clone)]
pub struct PostService {
    db: Db,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_post(
        &self,
        author_id: Uuid,
        title: String,
        content: String,
        is_published: bool,
        tag_names: Vec<String>,
    ) -> Result<PostDetail> {
        let mut tx = self.db.pool().begin().await?;

        let post_id: Uuid = sqlx::query_scalar(
            "INSERT INTO posts (title, content, author_id, is_published) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(title)
        .bind(content)
        .bind(author_id)
        .bind(is_published)
        .fetch_one(&mut *tx)
        .await?;

        let tag_service = TagService::new(self.db.clone());
        for name in tag_names {
            let tag = tag_service.get_or_create_with_tx(&name, &mut tx).await?;
            sqlx::query(
                "INSERT INTO post_tags (post_id, tag_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(post_id)
            .bind(tag.id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.get_post(post_id, author_id)
            .await?
            .ok_or_else(|| anyhow!("post {} missing right after insert", post_id))
    }

    pub async fn list_posts(&self, filter: &PostFilter, viewer: Uuid) -> Result<Vec<PostDetail>> {
        let rows = sqlx::query(
            "SELECT p.id, p.title, p.content, p.author_id, u.username, \
                    p.created_at, p.updated_at, p.is_published \
             FROM posts p \
             JOIN users u ON p.author_id = u.id \
             WHERE p.is_deleted = FALSE \
               AND ($1::uuid IS NULL OR p.author_id = $1) \
               AND ($2::boolean IS NULL OR p.is_published = $2) \
               AND ($3::uuid[] IS NULL OR EXISTS ( \
                   SELECT 1 FROM post_tags pt \
                   WHERE pt.post_id = p.id AND pt.tag_id = ANY($3) \
               )) \
               AND ($4::text IS NULL \
                    OR p.title ILIKE '%' || $4 || '%' \
                    OR p.content ILIKE '%' || $4 || '%') \
             ORDER BY p.created_at",
        )
        .bind(filter.author)
        .bind(filter.published)
        .bind(filter.tag_ids.as_deref())
        .bind(filter.search.as_deref().map(escape_like))
        .fetch_all(self.db.pool())
        .await?;

        let records: Vec<PostRecord> = rows.iter().map(record_from_row).collect();
        self.load_details(records, viewer).await
    }

    pub async fn get_post(&self, post_id: Uuid, viewer: Uuid) -> Result<Option<PostDetail>> {
        let row = sqlx::query(
            "SELECT p.id, p.title, p.content, p.author_id, u.username, \
                    p.created_at, p.updated_at, p.is_published \
             FROM posts p \
             JOIN users u ON p.author_id = u.id \
             WHERE p.id = $1 AND p.is_deleted = FALSE",
        )
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let details = self.load_details(vec![record_from_row(&row)], viewer).await?;
        Ok(details.into_iter().next())
    }

    /// Author of a non-deleted post; None doubles as the not-found signal
    /// so handlers can order the 404 check before the 403 one.
    pub async fn author_of(&self, post_id: Uuid) -> Result<Option<Uuid>> {
        let author = sqlx::query_scalar(
            "SELECT author_id FROM posts WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(author)
    }

    pub async fn exists(&self, post_id: Uuid) -> Result<bool> {
        let found: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM posts WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(found.is_some())
    }

    /// Partial update: absent fields keep their current value. Tags are
    /// attached at creation only and never touched here.
    pub async fn update_post(
        &self,
        post_id: Uuid,
        title: Option<String>,
        content: Option<String>,
        is_published: Option<bool>,
        viewer: Uuid,
    ) -> Result<Option<PostDetail>> {
        let updated = sqlx::query(
            "UPDATE posts \
             SET title = COALESCE($2, title), \
                 content = COALESCE($3, content), \
                 is_published = COALESCE($4, is_published), \
                 updated_at = now() \
             WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(post_id)
        .bind(title)
        .bind(content)
        .bind(is_published)
        .execute(self.db.pool())
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_post(post_id, viewer).await
    }

    pub async fn soft_delete(&self, post_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE posts SET is_deleted = TRUE, updated_at = now() \
             WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(post_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// One query-and-group pass per relation (tags, comments, likes) for
    /// the whole batch of posts, instead of per-post round trips.
    async fn load_details(
        &self,
        records: Vec<PostRecord>,
        viewer: Uuid,
    ) -> Result<Vec<PostDetail>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let post_ids: Vec<Uuid> = records.iter().map(|record| record.id).collect();

        let tag_rows = sqlx::query(
            "SELECT pt.post_id, t.id, t.name \
             FROM post_tags pt \
             JOIN tags t ON pt.tag_id = t.id \
             WHERE pt.post_id = ANY($1)",
        )
        .bind(&post_ids)
        .fetch_all(self.db.pool())
        .await?;

        let mut tags_by_post: HashMap<Uuid, Vec<Tag>> = HashMap::new();
        for row in tag_rows {
            tags_by_post
                .entry(row.get("post_id"))
                .or_default()
                .push(Tag {
                    id: row.get("id"),
                    name: row.get("name"),
                });
        }

        let comment_rows = sqlx::query(
            "SELECT c.id, c.post_id, c.user_id, u.username, c.content, \
                    c.created_at, c.updated_at, c.parent_id \
             FROM comments c \
             JOIN users u ON c.user_id = u.id \
             WHERE c.post_id = ANY($1) \
             ORDER BY c.created_at",
        )
        .bind(&post_ids)
        .fetch_all(self.db.pool())
        .await?;

        let mut comments_by_post: HashMap<Uuid, Vec<CommentRecord>> = HashMap::new();
        for row in &comment_rows {
            let record = CommentRecord {
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
            };
            comments_by_post
                .entry(record.post_id)
                .or_default()
                .push(record);
        }

        let like_rows = sqlx::query(
            "SELECT post_id, COUNT(*) AS likes_count \
             FROM likes \
             WHERE post_id = ANY($1) \
             GROUP BY post_id",
        )
        .bind(&post_ids)
        .fetch_all(self.db.pool())
        .await?;

        let mut likes_by_post: HashMap<Uuid, i64> = HashMap::new();
        for row in like_rows {
            likes_by_post.insert(row.get("post_id"), row.get("likes_count"));
        }

        let details = records
            .into_iter()
            .map(|record| {
                let id = record.id;
                let tags = tags_by_post.remove(&id).unwrap_or_default();
                let comments = comments_by_post
                    .remove(&id)
                    .map(|rows| comment::nest(&rows, viewer))
                    .unwrap_or_default();
                let likes_count = likes_by_post.get(&id).copied().unwrap_or(0);
                PostDetail::new(record, tags, comments, likes_count)
            })
            .collect();

        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_neutralizes_wildcards() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("snake_case"), "snake\\_case");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
        assert_eq!(escape_like("%_\\"), "\\%\\_\\\\");
    }
}
