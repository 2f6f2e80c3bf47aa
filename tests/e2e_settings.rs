//! E2E tests for settings and notifications

mod common;

use common::{TEST_PASSWORD, TestServer};
use serde_json::{Value, json};

#[tokio::test]
async fn test_settings_view_defaults() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;

    let response = server.get(&alice, "/api/settings").await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["account"]["username"], "alice");
    assert_eq!(body["account"]["email"], "alice@example.com");
    assert_eq!(body["theme"], "aurora");
    assert_eq!(body["is_premium"], false);
    assert_eq!(body["payments_ready"], false);
}

#[tokio::test]
async fn test_account_patch_keeps_missing_fields() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;

    let response = server
        .client
        .patch(server.url("/api/settings/account"))
        .bearer_auth(&alice.token)
        .json(&json!({ "first_name": "Alice" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["first_name"], "Alice");
    assert_eq!(body["email"], "alice@example.com");
}

#[tokio::test]
async fn test_privacy_update_marks_sovereignty() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;

    let response = server
        .client
        .put(server.url("/api/settings/privacy"))
        .bearer_auth(&alice.token)
        .json(&json!({ "is_private": true, "tracking_protection": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["is_private"], true);
    assert_eq!(body["tracking_protection"], true);
    assert_eq!(body["recommendation_indexing"], false);
    assert_eq!(body["data_sovereignty_active"], true);
    assert!(body["last_updated"].is_string());

    let response = server.get(&alice, "/api/settings").await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["privacy"]["is_private"], true);
}

#[tokio::test]
async fn test_theme_sets_cookie_and_falls_back() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;

    let response = server.post_empty(&alice, "/api/settings/theme/midnight").await;
    assert_eq!(response.status(), 200);
    let set_cookie = response
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .expect("set-cookie header")
        .to_string();
    assert!(set_cookie.contains("theme=midnight"));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["theme"], "midnight");

    let response = server.post_empty(&alice, "/api/settings/theme/neon").await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["theme"], "aurora");

    let response = server.get(&alice, "/api/settings").await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["theme"], "aurora");
}

#[tokio::test]
async fn test_password_change_requires_old_password() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;

    let response = server
        .post(
            &alice,
            "/api/settings/password",
            json!({
                "old_password": "not-my-password",
                "new_password": "Another-pass-42",
                "new_password_confirm": "Another-pass-42",
            }),
        )
        .await;
    assert_eq!(response.status(), 400);

    let response = server
        .post(
            &alice,
            "/api/settings/password",
            json!({
                "old_password": TEST_PASSWORD,
                "new_password": "Another-pass-42",
                "new_password_confirm": "Another-pass-42",
            }),
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = server
        .client
        .post(server.url("/auth/login"))
        .json(&json!({ "username": "alice", "password": "Another-pass-42" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_deactivate_ends_account_access() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;

    let response = server.post_empty(&alice, "/api/settings/deactivate").await;
    assert_eq!(response.status(), 200);
    let set_cookie = response
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .expect("set-cookie header")
        .to_string();
    assert!(set_cookie.contains("Max-Age=0"));

    // Existing tokens stop working
    let response = server.get(&alice, "/auth/me").await;
    assert_eq!(response.status(), 401);

    let response = server
        .client
        .post(server.url("/auth/login"))
        .json(&json!({ "username": "alice", "password": TEST_PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_notifications_mark_read() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;
    let bob = server.register("bob").await;
    let carol = server.register("carol").await;

    server.post_empty(&bob, "/api/users/alice/follow").await;
    server.post_empty(&carol, "/api/users/alice/follow").await;

    let response = server.get(&alice, "/api/notifications").await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["unread_count"], 2);
    let first = &body["notifications"][0];
    assert_eq!(first["kind"], "follow");
    assert_eq!(first["icon"], "fas fa-user-plus");
    assert_eq!(first["time_ago"], "0m ago");
    let id = first["id"].as_str().unwrap().to_string();

    // Only the recipient can mark it
    let response = server
        .post_empty(&bob, &format!("/api/notifications/{id}/read"))
        .await;
    assert_eq!(response.status(), 404);

    let response = server
        .post_empty(&alice, &format!("/api/notifications/{id}/read"))
        .await;
    assert_eq!(response.status(), 200);

    let response = server.get(&alice, "/api/notifications").await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["unread_count"], 1);

    let response = server.post_empty(&alice, "/api/notifications/read_all").await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["marked"], 1);

    let response = server.get(&alice, "/api/notifications").await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["unread_count"], 0);
}
