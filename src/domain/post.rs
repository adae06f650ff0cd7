use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::comment::CommentNode;
use crate::domain::tag::Tag;
use crate::domain::user::PublicUser;

/// One post row with the author joined in. `is_deleted` stays internal;
/// every read path filters it out before this struct exists.
#[derive(Debug, Clone)]
pub struct PostRecord {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author: PublicUser,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub is_published: bool,
}

/// Wire shape for a post: the record plus its tags, full comment set
/// (replies nested one level) and like count.
#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author: PublicUser,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub is_published: bool,
    pub tags: Vec<Tag>,
    pub comments: Vec<CommentNode>,
    pub likes_count: i64,
}

impl PostDetail {
    pub fn new(
        record: PostRecord,
        tags: Vec<Tag>,
        comments: Vec<CommentNode>,
        likes_count: i64,
    ) -> Self {
        Self {
            id: record.id,
            title: record.title,
            content: record.content,
            author: record.author,
            created_at: record.created_at,
            updated_at: record.updated_at,
            is_published: record.is_published,
            tags,
            comments,
            likes_count,
        }
    }
}
