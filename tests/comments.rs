//! Comment threading tests: top-level comments, one-level replies,
//! ordering, ownership and the deliberate soft-delete asymmetry.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn create_comment_on_post() {
    let app = app().await;
    let user = app.create_user("comment_create").await;
    let post_id = app.create_post_for_user(user.id, "commented").await;

    let resp = app
        .post_json(
            &format!("/posts/{}/comments", post_id),
            json!({ "content": "first!" }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::CREATED);
    let body = resp.json();
    assert_eq!(body["content"].as_str().unwrap(), "first!");
    assert_eq!(body["user"]["id"].as_str().unwrap(), user.id.to_string());
    assert!(body["parent"].is_null());
    assert_eq!(body["can_edit"].as_bool().unwrap(), true);
    assert_eq!(body["replies"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn comment_on_missing_or_deleted_post_is_404() {
    let app = app().await;
    let user = app.create_user("comment_missing").await;

    let resp = app
        .post_json(
            &format!("/posts/{}/comments", Uuid::new_v4()),
            json!({ "content": "into the void" }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let post_id = app.create_post_for_user(user.id, "deleted soon").await;
    app.delete(&format!("/posts/{}", post_id), Some(&user.access_token))
        .await;

    let resp = app
        .post_json(
            &format!("/posts/{}/comments", post_id),
            json!({ "content": "too late" }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_returns_ordered_thread() {
    let app = app().await;
    let user = app.create_user("comment_order").await;
    let post_id = app.create_post_for_user(user.id, "threaded").await;

    let top_a = app.create_comment_at(post_id, user.id, None, 10).await;
    let top_b = app.create_comment_at(post_id, user.id, None, 20).await;
    let reply_2 = app
        .create_comment_at(post_id, user.id, Some(top_a), 40)
        .await;
    let reply_1 = app
        .create_comment_at(post_id, user.id, Some(top_a), 30)
        .await;

    let resp = app
        .get(&format!("/posts/{}/comments", post_id), Some(&user.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let body = resp.json();
    let thread = body.as_array().unwrap();
    assert_eq!(thread.len(), 2);
    assert_eq!(thread[0]["id"].as_str().unwrap(), top_a.to_string());
    assert_eq!(thread[1]["id"].as_str().unwrap(), top_b.to_string());

    // Replies are nested under their parent, created_at ascending
    let replies = thread[0]["replies"].as_array().unwrap();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0]["id"].as_str().unwrap(), reply_1.to_string());
    assert_eq!(replies[1]["id"].as_str().unwrap(), reply_2.to_string());
    assert_eq!(thread[1]["replies"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn can_edit_reflects_the_caller() {
    let app = app().await;
    let author = app.create_user("can_edit_author").await;
    let reader = app.create_user("can_edit_reader").await;
    let post_id = app.create_post_for_user(author.id, "whose comment").await;
    app.create_comment_at(post_id, author.id, None, 1).await;

    let resp = app
        .get(
            &format!("/posts/{}/comments", post_id),
            Some(&author.access_token),
        )
        .await;
    assert_eq!(resp.json()[0]["can_edit"].as_bool().unwrap(), true);

    let resp = app
        .get(
            &format!("/posts/{}/comments", post_id),
            Some(&reader.access_token),
        )
        .await;
    assert_eq!(resp.json()[0]["can_edit"].as_bool().unwrap(), false);
}

#[tokio::test]
async fn reply_inherits_parent_and_post() {
    let app = app().await;
    let user = app.create_user("reply_create").await;
    let post_id = app.create_post_for_user(user.id, "reply target").await;
    let comment_id = app.create_comment_at(post_id, user.id, None, 1).await;

    let resp = app
        .post_json(
            &format!("/comments/{}/reply", comment_id),
            json!({ "content": "replying" }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::CREATED);
    let body = resp.json();
    assert_eq!(body["parent"].as_str().unwrap(), comment_id.to_string());

    // The reply lives on the parent's post
    let reply_id = Uuid::parse_str(body["id"].as_str().unwrap()).unwrap();
    let reply_post: Uuid = sqlx::query_scalar("SELECT post_id FROM comments WHERE id = $1")
        .bind(reply_id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(reply_post, post_id);
}

#[tokio::test]
async fn reply_to_a_reply_is_rejected() {
    let app = app().await;
    let user = app.create_user("reply_depth").await;
    let post_id = app.create_post_for_user(user.id, "depth test").await;
    let top = app.create_comment_at(post_id, user.id, None, 1).await;
    let reply = app.create_comment_at(post_id, user.id, Some(top), 2).await;

    let resp = app
        .post_json(
            &format!("/comments/{}/reply", reply),
            json!({ "content": "too deep" }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reply_to_missing_comment_is_404() {
    let app = app().await;
    let user = app.create_user("reply_missing").await;

    let resp = app
        .post_json(
            &format!("/comments/{}/reply", Uuid::new_v4()),
            json!({ "content": "hello?" }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reply_succeeds_under_a_soft_deleted_post() {
    let app = app().await;
    let user = app.create_user("reply_deleted_post").await;
    let post_id = app.create_post_for_user(user.id, "doomed post").await;
    let comment_id = app.create_comment_at(post_id, user.id, None, 1).await;

    app.delete(&format!("/posts/{}", post_id), Some(&user.access_token))
        .await;

    // Only the parent comment is checked; the post's deletion state is not.
    let resp = app
        .post_json(
            &format!("/comments/{}/reply", comment_id),
            json!({ "content": "still here" }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(
        resp.json()["parent"].as_str().unwrap(),
        comment_id.to_string()
    );
}

#[tokio::test]
async fn comment_detail_and_update() {
    let app = app().await;
    let user = app.create_user("comment_update").await;
    let post_id = app.create_post_for_user(user.id, "editable").await;
    let comment_id = app.create_comment_at(post_id, user.id, None, 1).await;
    let reply_id = app
        .create_comment_at(post_id, user.id, Some(comment_id), 2)
        .await;

    let resp = app
        .get(&format!("/comments/{}", comment_id), Some(&user.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["id"].as_str().unwrap(), comment_id.to_string());
    assert_eq!(
        body["replies"][0]["id"].as_str().unwrap(),
        reply_id.to_string()
    );

    let resp = app
        .put_json(
            &format!("/comments/{}", comment_id),
            json!({ "content": "edited" }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["content"].as_str().unwrap(), "edited");
}

#[tokio::test]
async fn comment_mutation_is_author_only() {
    let app = app().await;
    let author = app.create_user("comment_owner").await;
    let stranger = app.create_user("comment_stranger").await;
    let post_id = app.create_post_for_user(author.id, "guarded").await;
    let comment_id = app.create_comment_at(post_id, author.id, None, 1).await;

    let resp = app
        .put_json(
            &format!("/comments/{}", comment_id),
            json!({ "content": "vandalism" }),
            Some(&stranger.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app
        .delete(&format!("/comments/{}", comment_id), Some(&stranger.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deleting_a_comment_cascades_to_replies() {
    let app = app().await;
    let user = app.create_user("comment_cascade").await;
    let post_id = app.create_post_for_user(user.id, "cascade").await;
    let comment_id = app.create_comment_at(post_id, user.id, None, 1).await;
    let reply_id = app
        .create_comment_at(post_id, user.id, Some(comment_id), 2)
        .await;

    let resp = app
        .delete(&format!("/comments/{}", comment_id), Some(&user.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let remaining: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE id = $1 OR id = $2")
            .bind(comment_id)
            .bind(reply_id)
            .fetch_one(app.pool())
            .await
            .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn post_detail_nests_comment_replies() {
    let app = app().await;
    let user = app.create_user("post_detail_comments").await;
    let post_id = app.create_post_for_user(user.id, "with thread").await;
    let top = app.create_comment_at(post_id, user.id, None, 1).await;
    let reply = app.create_comment_at(post_id, user.id, Some(top), 2).await;

    let resp = app
        .get(&format!("/posts/{}", post_id), Some(&user.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let body = resp.json();
    let comments = body["comments"].as_array().unwrap();
    let top_node = comments
        .iter()
        .find(|c| c["id"].as_str() == Some(&top.to_string()))
        .unwrap();
    assert_eq!(
        top_node["replies"][0]["id"].as_str().unwrap(),
        reply.to_string()
    );
}
