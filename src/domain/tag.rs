use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
}
