pub mod auth;
pub mod comments;
pub mod likes;
pub mod posts;
pub mod tags;
