use axum::{routing::delete, routing::get, routing::post, routing::put, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh_token))
        .route("/auth/me", get(handlers::get_current_user))
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route("/posts", get(handlers::list_posts))
        .route("/posts", post(handlers::create_post))
        .route("/posts/:id", get(handlers::get_post))
        .route("/posts/:id", put(handlers::update_post))
        .route("/posts/:id", delete(handlers::delete_post))
        .route("/posts/:id/comments", get(handlers::list_post_comments))
        .route("/posts/:id/comments", post(handlers::create_post_comment))
        .route("/posts/:id/like", post(handlers::like_post))
        .route("/posts/:id/like", delete(handlers::unlike_post))
}

pub fn comments() -> Router<AppState> {
    Router::new()
        .route("/comments/:id", get(handlers::get_comment))
        .route("/comments/:id", put(handlers::update_comment))
        .route("/comments/:id", delete(handlers::delete_comment))
        .route("/comments/:id/reply", post(handlers::create_reply))
}

pub fn tags() -> Router<AppState> {
    Router::new().route("/tags", get(handlers::list_tags))
}
