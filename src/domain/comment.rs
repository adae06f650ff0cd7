use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::user::PublicUser;

/// One comment row as stored, with the author already joined in.
#[derive(Debug, Clone)]
pub struct CommentRecord {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user: PublicUser,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub parent_id: Option<Uuid>,
}

/// Wire shape for a comment: the record plus its nested replies and the
/// per-viewer `can_edit` flag. Replies never carry further replies; the
/// exposed nesting is exactly one level deep.
#[derive(Debug, Clone, Serialize)]
pub struct CommentNode {
    pub id: Uuid,
    pub user: PublicUser,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub parent: Option<Uuid>,
    pub replies: Vec<CommentNode>,
    pub can_edit: bool,
}

impl CommentNode {
    pub fn leaf(record: CommentRecord, viewer: Uuid) -> Self {
        let can_edit = record.user.id == viewer;
        Self {
            id: record.id,
            user: record.user,
            content: record.content,
            created_at: record.created_at,
            updated_at: record.updated_at,
            parent: record.parent_id,
            replies: Vec::new(),
            can_edit,
        }
    }
}

/// Nest a flat, created_at-ascending slice of records one level deep:
/// every record becomes a node, and nodes whose parent is present in the
/// slice additionally appear in that parent's `replies` (input order is
/// preserved in both places).
pub fn nest(records: &[CommentRecord], viewer: Uuid) -> Vec<CommentNode> {
    let mut nodes: Vec<CommentNode> = records
        .iter()
        .map(|record| CommentNode::leaf(record.clone(), viewer))
        .collect();

    for record in records {
        let Some(parent_id) = record.parent_id else {
            continue;
        };
        if let Some(parent) = nodes.iter_mut().find(|node| node.id == parent_id) {
            parent
                .replies
                .push(CommentNode::leaf(record.clone(), viewer));
        }
    }

    nodes
}

/// Like [`nest`], but keeps only top-level comments at the outer level.
/// This is the shape of the comment-list endpoint.
pub fn thread(records: &[CommentRecord], viewer: Uuid) -> Vec<CommentNode> {
    nest(records, viewer)
        .into_iter()
        .filter(|node| node.parent.is_none())
        .collect()
}
