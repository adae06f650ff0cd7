use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::Query;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::auth::AuthService;
use crate::app::comments::CommentService;
use crate::app::likes::LikeService;
use crate::app::posts::{PostFilter, PostService};
use crate::app::tags::TagService;
use crate::domain::comment::CommentNode;
use crate::domain::like::Like;
use crate::domain::post::PostDetail;
use crate::domain::tag::Tag;
use crate::domain::user::PublicUser;
use crate::http::{AppError, AuthUser};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.db.ping().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse { status })
}

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(
        state.db.clone(),
        state.paseto_access_key,
        state.paseto_refresh_key,
        state.access_ttl_minutes,
        state.refresh_ttl_days,
    )
}

// ---------------------------------------------------------------------------
// Identity & session
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let username = match payload.username {
        Some(username) if !username.trim().is_empty() => username,
        _ => return Err(AppError::validation("username", "This field is required.")),
    };
    let password = match payload.password {
        Some(password) if !password.is_empty() => password,
        _ => return Err(AppError::validation("password", "This field is required.")),
    };

    auth_service(&state)
        .register(username, password)
        .await
        .map_err(|err| {
            if let Some(sqlx_err) = err.downcast_ref::<sqlx::Error>() {
                if let Some(db_err) = sqlx_err.as_database_error() {
                    if db_err.code().as_deref() == Some("23505") {
                        return AppError::validation(
                            "username",
                            "A user with that username already exists.",
                        );
                    }
                }
            }
            tracing::error!(error = ?err, "failed to register user");
            AppError::internal("failed to register user")
        })?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully!",
        }),
    ))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub user: String,
    pub refresh_token: String,
    pub access_token: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    // Missing fields fall through to the same opaque rejection as a bad
    // password; nothing here distinguishes unknown users.
    let username = payload.username.unwrap_or_default();
    let password = payload.password.unwrap_or_default();

    let tokens = auth_service(&state)
        .login(&username, &password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    match tokens {
        Some(tokens) => Ok(Json(LoginResponse {
            user: username,
            refresh_token: tokens.refresh_token,
            access_token: tokens.access_token,
        })),
        None => Err(AppError::unauthorized("Invalid credentials")),
    }
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let tokens = auth_service(&state)
        .refresh(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to refresh token");
            AppError::internal("failed to refresh token")
        })?;

    match tokens {
        Some(tokens) => Ok(Json(RefreshResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        })),
        None => Err(AppError::unauthorized("invalid refresh token")),
    }
}

pub async fn get_current_user(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<PublicUser>, AppError> {
    let user = auth_service(&state)
        .get_current_user(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to fetch current user");
            AppError::internal("failed to fetch current user")
        })?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct PostListQuery {
    pub author: Option<String>,
    pub is_published: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub search: Option<String>,
}

/// Lenient on purpose: anything other than case-insensitive "true" is
/// treated as false, and an empty value drops the filter entirely.
fn parse_published(value: Option<&str>) -> Option<bool> {
    let value = value?;
    if value.is_empty() {
        return None;
    }
    Some(value.eq_ignore_ascii_case("true"))
}

fn parse_author(value: Option<&str>) -> Result<Option<Uuid>, AppError> {
    let Some(value) = value else {
        return Ok(None);
    };
    if value.is_empty() {
        return Ok(None);
    }
    let id = Uuid::parse_str(value).map_err(|_| AppError::bad_request("invalid author id"))?;
    Ok(Some(id))
}

/// Repeated `?tags=a&tags=b` keys; empty values drop out.
fn parse_tag_ids(values: &[String]) -> Result<Option<Vec<Uuid>>, AppError> {
    let ids = values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(Uuid::parse_str)
        .collect::<Result<Vec<Uuid>, _>>()
        .map_err(|_| AppError::bad_request("invalid tag id"))?;

    if ids.is_empty() {
        Ok(None)
    } else {
        Ok(Some(ids))
    }
}

pub async fn list_posts(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PostListQuery>,
) -> Result<Json<Vec<PostDetail>>, AppError> {
    let filter = PostFilter {
        author: parse_author(query.author.as_deref())?,
        published: parse_published(query.is_published.as_deref()),
        tag_ids: parse_tag_ids(&query.tags)?,
        search: query.search.filter(|s| !s.is_empty()),
    };

    let service = PostService::new(state.db.clone());
    let posts = service
        .list_posts(&filter, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list posts");
            AppError::internal("failed to list posts")
        })?;

    Ok(Json(posts))
}

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_published: Option<bool>,
    pub tags: Option<Vec<String>>,
}

pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostDetail>), AppError> {
    let title = match payload.title {
        Some(title) if !title.trim().is_empty() => title,
        _ => return Err(AppError::validation("title", "This field is required.")),
    };
    let content = match payload.content {
        Some(content) if !content.trim().is_empty() => content,
        _ => return Err(AppError::validation("content", "This field is required.")),
    };

    let service = PostService::new(state.db.clone());
    let post = service
        .create_post(
            auth.user_id,
            title,
            content,
            payload.is_published.unwrap_or(false),
            payload.tags.unwrap_or_default(),
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, author_id = %auth.user_id, "failed to create post");
            AppError::internal("failed to create post")
        })?;

    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn get_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<PostDetail>, AppError> {
    let service = PostService::new(state.db.clone());
    let post = service.get_post(id, auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, "failed to fetch post");
        AppError::internal("failed to fetch post")
    })?;

    match post {
        Some(post) => Ok(Json(post)),
        None => Err(AppError::not_found("Post not found.")),
    }
}

#[derive(Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_published: Option<bool>,
}

/// Existence is checked before ownership, so probing an existing post
/// you do not own yields 403, never 404.
async fn require_post_author(
    service: &PostService,
    post_id: Uuid,
    caller: Uuid,
) -> Result<(), AppError> {
    let author = service.author_of(post_id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %post_id, "failed to fetch post author");
        AppError::internal("failed to fetch post")
    })?;

    match author {
        None => Err(AppError::not_found("Post not found.")),
        Some(author) if author != caller => Err(AppError::forbidden(
            "You do not have permission to perform this action.",
        )),
        Some(_) => Ok(()),
    }
}

pub async fn update_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<PostDetail>, AppError> {
    let service = PostService::new(state.db.clone());
    require_post_author(&service, id, auth.user_id).await?;

    let post = service
        .update_post(
            id,
            payload.title,
            payload.content,
            payload.is_published,
            auth.user_id,
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %id, "failed to update post");
            AppError::internal("failed to update post")
        })?;

    match post {
        Some(post) => Ok(Json(post)),
        None => Err(AppError::not_found("Post not found.")),
    }
}

pub async fn delete_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = PostService::new(state.db.clone());
    require_post_author(&service, id, auth.user_id).await?;

    let deleted = service.soft_delete(id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, "failed to delete post");
        AppError::internal("failed to delete post")
    })?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("Post not found."))
    }
}

// ---------------------------------------------------------------------------
// Comments & replies
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub content: Option<String>,
}

fn require_content(content: Option<String>) -> Result<String, AppError> {
    match content {
        Some(content) if !content.trim().is_empty() => Ok(content),
        _ => Err(AppError::validation("content", "This field is required.")),
    }
}

async fn require_post_exists(state: &AppState, post_id: Uuid) -> Result<(), AppError> {
    let exists = PostService::new(state.db.clone())
        .exists(post_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to fetch post");
            AppError::internal("failed to fetch post")
        })?;

    if exists {
        Ok(())
    } else {
        Err(AppError::not_found("Post not found."))
    }
}

pub async fn list_post_comments(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<CommentNode>>, AppError> {
    require_post_exists(&state, id).await?;

    let service = CommentService::new(state.db.clone());
    let comments = service
        .list_for_post(id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %id, "failed to list comments");
            AppError::internal("failed to list comments")
        })?;

    Ok(Json(comments))
}

pub async fn create_post_comment(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentNode>), AppError> {
    require_post_exists(&state, id).await?;
    let content = require_content(payload.content)?;

    let service = CommentService::new(state.db.clone());
    let record = service
        .create_comment(id, auth.user_id, content, None)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %id, "failed to create comment");
            AppError::internal("failed to create comment")
        })?;

    Ok((
        StatusCode::CREATED,
        Json(CommentNode::leaf(record, auth.user_id)),
    ))
}

/// Reply creation checks only that the parent comment exists; the
/// containing post's soft-delete flag is deliberately not consulted.
pub async fn create_reply(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentNode>), AppError> {
    let service = CommentService::new(state.db.clone());
    let parent = service.get_comment(id).await.map_err(|err| {
        tracing::error!(error = ?err, comment_id = %id, "failed to fetch comment");
        AppError::internal("failed to fetch comment")
    })?;

    let parent = parent.ok_or_else(|| AppError::not_found("Comment not found."))?;
    if parent.parent_id.is_some() {
        return Err(AppError::bad_request("Cannot reply to a reply."));
    }
    let content = require_content(payload.content)?;

    let record = service
        .create_comment(parent.post_id, auth.user_id, content, Some(parent.id))
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %id, "failed to create reply");
            AppError::internal("failed to create reply")
        })?;

    Ok((
        StatusCode::CREATED,
        Json(CommentNode::leaf(record, auth.user_id)),
    ))
}

pub async fn get_comment(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<CommentNode>, AppError> {
    let service = CommentService::new(state.db.clone());
    let comment = service
        .get_with_replies(id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %id, "failed to fetch comment");
            AppError::internal("failed to fetch comment")
        })?;

    match comment {
        Some(comment) => Ok(Json(comment)),
        None => Err(AppError::not_found("Comment not found.")),
    }
}

async fn require_comment_author(
    service: &CommentService,
    comment_id: Uuid,
    caller: Uuid,
) -> Result<(), AppError> {
    let comment = service.get_comment(comment_id).await.map_err(|err| {
        tracing::error!(error = ?err, comment_id = %comment_id, "failed to fetch comment");
        AppError::internal("failed to fetch comment")
    })?;

    match comment {
        None => Err(AppError::not_found("Comment not found.")),
        Some(comment) if comment.user.id != caller => Err(AppError::forbidden(
            "You do not have permission to perform this action.",
        )),
        Some(_) => Ok(()),
    }
}

pub async fn update_comment(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<Json<CommentNode>, AppError> {
    let service = CommentService::new(state.db.clone());
    require_comment_author(&service, id, auth.user_id).await?;
    let content = require_content(payload.content)?;

    service.update_content(id, content).await.map_err(|err| {
        tracing::error!(error = ?err, comment_id = %id, "failed to update comment");
        AppError::internal("failed to update comment")
    })?;

    let comment = service
        .get_with_replies(id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %id, "failed to fetch comment");
            AppError::internal("failed to fetch comment")
        })?;

    match comment {
        Some(comment) => Ok(Json(comment)),
        None => Err(AppError::not_found("Comment not found.")),
    }
}

pub async fn delete_comment(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = CommentService::new(state.db.clone());
    require_comment_author(&service, id, auth.user_id).await?;

    let deleted = service.delete_comment(id).await.map_err(|err| {
        tracing::error!(error = ?err, comment_id = %id, "failed to delete comment");
        AppError::internal("failed to delete comment")
    })?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("Comment not found."))
    }
}

// ---------------------------------------------------------------------------
// Likes
// ---------------------------------------------------------------------------

pub async fn like_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Like>), AppError> {
    require_post_exists(&state, id).await?;

    let service = LikeService::new(state.db.clone());
    let like = service.like_post(auth.user_id, id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, user_id = %auth.user_id, "failed to like post");
        AppError::internal("failed to like post")
    })?;

    match like {
        Some(like) => Ok((StatusCode::CREATED, Json(like))),
        None => Err(AppError::bad_request("You have already liked this post.")),
    }
}

pub async fn unlike_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    require_post_exists(&state, id).await?;

    let service = LikeService::new(state.db.clone());
    let removed = service.unlike_post(auth.user_id, id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, user_id = %auth.user_id, "failed to unlike post");
        AppError::internal("failed to unlike post")
    })?;

    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::bad_request("You have not liked this post."))
    }
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<Tag>>, AppError> {
    let service = TagService::new(state.db.clone());
    let tags = service.list_tags().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list tags");
        AppError::internal("failed to list tags")
    })?;

    Ok(Json(tags))
}
