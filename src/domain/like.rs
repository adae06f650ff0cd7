use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::user::PublicUser;

#[derive(Debug, Clone, Serialize)]
pub struct Like {
    pub id: Uuid,
    pub user: PublicUser,
    pub post: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
