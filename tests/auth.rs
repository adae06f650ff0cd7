//! Registration, login, refresh and profile tests.

mod common;

use axum::http::StatusCode;
use common::{app, DEFAULT_PASSWORD};
use serde_json::json;
use uuid::Uuid;

fn unique_username(prefix: &str) -> String {
    format!("{}_{}", prefix, &Uuid::new_v4().simple().to_string()[..8])
}

#[tokio::test]
async fn register_login_me_roundtrip() {
    let app = app().await;
    let username = unique_username("roundtrip");

    let resp = app
        .post_json(
            "/auth/register",
            json!({ "username": username, "password": "hunter22secret" }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(
        resp.json()["message"].as_str().unwrap(),
        "User registered successfully!"
    );

    let resp = app
        .post_json(
            "/auth/login",
            json!({ "username": username, "password": "hunter22secret" }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["user"].as_str().unwrap(), username);
    let access_token = body["access_token"].as_str().unwrap().to_string();
    assert!(body["refresh_token"].is_string());

    let resp = app.get("/auth/me", Some(&access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["username"].as_str().unwrap(), username);
    assert!(body["id"].is_string());
    // The password never crosses the wire in any form
    assert!(body.get("password").is_none());
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn register_duplicate_username() {
    let app = app().await;
    let username = unique_username("dupe");

    let resp = app
        .post_json(
            "/auth/register",
            json!({ "username": username, "password": "firstpassword" }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);

    let resp = app
        .post_json(
            "/auth/register",
            json!({ "username": username, "password": "secondpassword" }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        resp.json()["fields"]["username"][0].as_str().unwrap(),
        "A user with that username already exists."
    );
}

#[tokio::test]
async fn register_missing_fields() {
    let app = app().await;

    let resp = app
        .post_json("/auth/register", json!({ "password": "nouser" }), None)
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.json()["fields"]["username"].is_array());

    let resp = app
        .post_json(
            "/auth/register",
            json!({ "username": unique_username("nopass") }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.json()["fields"]["password"].is_array());
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = app().await;
    let user = app.create_user("login_opaque").await;

    let wrong_password = app
        .post_json(
            "/auth/login",
            json!({ "username": user.username, "password": "not-the-password" }),
            None,
        )
        .await;
    let unknown_user = app
        .post_json(
            "/auth/login",
            json!({ "username": unique_username("ghost"), "password": DEFAULT_PASSWORD }),
            None,
        )
        .await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status, StatusCode::UNAUTHORIZED);
    // Same opaque message for both, no user enumeration
    assert_eq!(wrong_password.error_message(), "Invalid credentials");
    assert_eq!(unknown_user.error_message(), "Invalid credentials");
}

#[tokio::test]
async fn me_requires_valid_token() {
    let app = app().await;

    let resp = app.get("/auth/me", None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = app.get("/auth/me", Some("not-a-real-token")).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_rotates_the_token() {
    let app = app().await;
    let user = app.create_user("refresh").await;

    let resp = app
        .post_json(
            "/auth/refresh",
            json!({ "refresh_token": user.refresh_token }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert!(body["access_token"].is_string());
    let new_refresh = body["refresh_token"].as_str().unwrap().to_string();
    assert_ne!(new_refresh, user.refresh_token);

    // The old refresh token was revoked by the rotation
    let resp = app
        .post_json(
            "/auth/refresh",
            json!({ "refresh_token": user.refresh_token }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    // The new one works
    let resp = app
        .post_json("/auth/refresh", json!({ "refresh_token": new_refresh }), None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);
}
