use anyhow::Result;
use sqlx::Row;

use crate::domain::tag::Tag;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct TagService {
    db: Db,
}

impl TagService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn list_tags(&self) -> Result<Vec<Tag>> {
        let rows = sqlx::query("SELECT id, name FROM tags")
            .fetch_all(self.db.pool())
            .await?;

        let tags = rows
            .into_iter()
            .map(|row| Tag {
                id: row.get("id"),
                name: row.get("name"),
            })
            .collect();

        Ok(tags)
    }

    /// Atomic get-or-create by name. The no-op DO UPDATE makes the
    /// statement return the existing row instead of nothing, so two
    /// concurrent callers both land on the same canonical tag.
    pub async fn get_or_create_with_tx(
        &self,
        name: &str,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<Tag> {
        let row = sqlx::query(
            "INSERT INTO tags (name) VALUES ($1) \
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
             RETURNING id, name",
        )
        .bind(name)
        .fetch_one(&mut **tx)
        .await?;

        Ok(Tag {
            id: row.get("id"),
            name: row.get("name"),
        })
    }
}
